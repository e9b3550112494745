use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);
const USER_AGENT: &str = concat!("lexicon-ingest/", env!("CARGO_PKG_VERSION"));

/// How candidate URLs are tried.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RetryPolicy {
    /// Each URL once, in order; fail after the last one fails.
    Fallback,
    /// Keep trying, cycling through the URLs, sleeping `delay` between
    /// attempts. Only cancellation ends an unsuccessful run.
    Infinite { delay: Duration },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no candidate urls to fetch")]
    NoCandidates,
    #[error("building http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },
    #[error("download from {url} ended after {received} of {expected} bytes")]
    Truncated {
        url: String,
        received: u64,
        expected: u64,
    },
    #[error("storing download from {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: io::Error,
    },
    #[error("all {attempts} candidate urls failed; last error: {last}")]
    Exhausted {
        attempts: usize,
        #[source]
        last: Box<FetchError>,
    },
    #[error("fetch cancelled")]
    Cancelled,
}

/// Progress notifications handed to the caller while a fetch runs.
#[derive(Debug)]
pub enum FetchEvent<'a> {
    /// About to request `url`; `attempt` counts from 1 across the whole fetch.
    Attempt { url: &'a str, attempt: u64 },
    /// Response headers arrived; `total` comes from `Content-Length`.
    Started { url: &'a str, total: Option<u64> },
    Progress {
        url: &'a str,
        downloaded: u64,
        total: Option<u64>,
    },
    Finished { url: &'a str, bytes: u64 },
    Failed { url: &'a str, error: &'a FetchError },
}

/// Timeouts and identification for the HTTP client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// The URL that finally answered and how many bytes it delivered.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Fetched {
    pub url: String,
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

enum Destination<'a> {
    Memory(&'a mut Vec<u8>),
    File(&'a Path),
}

enum Staging<'a> {
    Memory(&'a mut Vec<u8>),
    File {
        temp: BufWriter<NamedTempFile>,
        dest: &'a Path,
    },
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fetch the first candidate that succeeds into memory.
    pub async fn fetch(
        &self,
        candidates: &[String],
        policy: RetryPolicy,
        cancel: &CancellationToken,
        on_event: &mut dyn FnMut(FetchEvent<'_>),
    ) -> Result<Vec<u8>, FetchError> {
        let mut buf = Vec::new();
        self.drive(
            candidates,
            policy,
            cancel,
            &mut Destination::Memory(&mut buf),
            on_event,
        )
        .await?;
        Ok(buf)
    }

    /// Fetch the first candidate that succeeds into `dest`.
    ///
    /// Bytes are staged in a temporary file beside `dest` and moved into place
    /// only after the body is complete. A failed, truncated or cancelled
    /// attempt removes its staging file, so `dest` is never left half written.
    pub async fn fetch_to_path(
        &self,
        candidates: &[String],
        dest: &Path,
        policy: RetryPolicy,
        cancel: &CancellationToken,
        on_event: &mut dyn FnMut(FetchEvent<'_>),
    ) -> Result<Fetched, FetchError> {
        self.drive(
            candidates,
            policy,
            cancel,
            &mut Destination::File(dest),
            on_event,
        )
        .await
    }

    async fn drive(
        &self,
        candidates: &[String],
        policy: RetryPolicy,
        cancel: &CancellationToken,
        dest: &mut Destination<'_>,
        on_event: &mut dyn FnMut(FetchEvent<'_>),
    ) -> Result<Fetched, FetchError> {
        if candidates.is_empty() {
            return Err(FetchError::NoCandidates);
        }

        match policy {
            RetryPolicy::Fallback => {
                let mut last = None;
                for (idx, url) in candidates.iter().enumerate() {
                    if cancel.is_cancelled() {
                        return Err(FetchError::Cancelled);
                    }
                    on_event(FetchEvent::Attempt {
                        url,
                        attempt: idx as u64 + 1,
                    });
                    match self.attempt(url, dest, cancel, on_event).await {
                        Ok(bytes) => return Ok(Fetched { url: url.clone(), bytes }),
                        Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
                        Err(err) => {
                            warn!("fetching {url} failed: {err}");
                            on_event(FetchEvent::Failed { url, error: &err });
                            last = Some(err);
                        }
                    }
                }
                match last {
                    Some(last) => Err(FetchError::Exhausted {
                        attempts: candidates.len(),
                        last: Box::new(last),
                    }),
                    None => Err(FetchError::NoCandidates),
                }
            }
            RetryPolicy::Infinite { delay } => {
                let mut attempt = 0u64;
                for url in candidates.iter().cycle() {
                    attempt += 1;
                    if attempt > 1 {
                        info!("retry {} for {url} in {}s", attempt - 1, delay.as_secs_f32());
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    on_event(FetchEvent::Attempt { url, attempt });
                    match self.attempt(url, dest, cancel, on_event).await {
                        Ok(bytes) => return Ok(Fetched { url: url.clone(), bytes }),
                        Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
                        Err(err) => {
                            warn!("fetching {url} failed (attempt {attempt}): {err}");
                            on_event(FetchEvent::Failed { url, error: &err });
                        }
                    }
                }
                Err(FetchError::NoCandidates)
            }
        }
    }

    async fn attempt(
        &self,
        url: &str,
        dest: &mut Destination<'_>,
        cancel: &CancellationToken,
        on_event: &mut dyn FnMut(FetchEvent<'_>),
    ) -> Result<u64, FetchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            res = self.download(url, dest, on_event) => res,
        }
    }

    async fn download(
        &self,
        url: &str,
        dest: &mut Destination<'_>,
        on_event: &mut dyn FnMut(FetchEvent<'_>),
    ) -> Result<u64, FetchError> {
        let request_err = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };
        let io_err = |source| FetchError::Io {
            url: url.to_string(),
            source,
        };

        let mut response = self.client.get(url).send().await.map_err(request_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let total = response.content_length();
        on_event(FetchEvent::Started { url, total });

        let mut staging = dest.stage().map_err(io_err)?;
        let mut downloaded = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(request_err)? {
            staging.write_all(&chunk).map_err(io_err)?;
            downloaded += chunk.len() as u64;
            on_event(FetchEvent::Progress {
                url,
                downloaded,
                total,
            });
        }
        if let Some(expected) = total
            && downloaded < expected
        {
            return Err(FetchError::Truncated {
                url: url.to_string(),
                received: downloaded,
                expected,
            });
        }

        staging.commit().map_err(io_err)?;
        on_event(FetchEvent::Finished {
            url,
            bytes: downloaded,
        });
        Ok(downloaded)
    }
}

impl Destination<'_> {
    fn stage(&mut self) -> io::Result<Staging<'_>> {
        match self {
            Destination::Memory(buf) => {
                buf.clear();
                Ok(Staging::Memory(buf))
            }
            Destination::File(dest) => {
                let dir = match dest.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => parent,
                    _ => Path::new("."),
                };
                fs::create_dir_all(dir)?;
                let temp = NamedTempFile::new_in(dir)?;
                Ok(Staging::File {
                    temp: BufWriter::new(temp),
                    dest,
                })
            }
        }
    }
}

impl Staging<'_> {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Staging::Memory(buf) => {
                buf.extend_from_slice(bytes);
                Ok(())
            }
            Staging::File { temp, .. } => temp.write_all(bytes),
        }
    }

    fn commit(self) -> io::Result<()> {
        match self {
            Staging::Memory(_) => Ok(()),
            Staging::File { temp, dest } => {
                let temp = temp.into_inner().map_err(|e| e.into_error())?;
                temp.persist(dest).map_err(|e| e.error)?;
                Ok(())
            }
        }
    }
}
