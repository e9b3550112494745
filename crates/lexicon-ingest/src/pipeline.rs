//! The three ingestion jobs: fetch or locate sources, merge, emit, convert.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lexicon_formats::{LoadMode, SourceFormat, read_source};
use lexicon_translit::{Cached, Pinyin};
use tempfile::TempDir;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::archive::{ArchiveError, extract_zip};
use crate::convert::{ConvertError, Converter};
use crate::discover::{
    FREQUENCY_LIST_SUFFIXES, LOCAL_SUFFIXES, RIME_DICT_SUFFIXES, describe_tree,
    find_source_files, resolve_source_dir,
};
use crate::emit::{LexiconHeader, emit, write_lexicon_file};
use crate::fetch::{DEFAULT_RETRY_DELAY, FetchConfig, FetchError, FetchEvent, Fetcher, RetryPolicy};
use crate::merge::MergedLexicon;
use crate::sources::{GITHUB_API, RIME_ICE_REPO, THUOCL_BASE_URL, archive_candidates, thuocl_catalog};

pub const LEXICON_VERSION: &str = "1.0";
/// Default folder name for local word-lists, under the output directory.
pub const LOCAL_DIR_NAME: &str = "cihui";
const TREE_DEPTH: usize = 3;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("local directory {} does not exist", .0.display())]
    LocalDirMissing(PathBuf),
    #[error("no source directory found under {}", .0.display())]
    SourceDirNotFound(PathBuf),
    #[error("no source files found in {}", .0.display())]
    NoSourceFiles(PathBuf),
    #[error("none of the {attempted} sources could be read")]
    NoUsableSources { attempted: usize },
    #[error("no entries left to emit")]
    NoEntries,
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Fetch(FetchError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("conversion failed (canonical lexicon kept at {}): {source}", .lexicon.display())]
    Convert {
        lexicon: PathBuf,
        #[source]
        source: ConvertError,
    },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl From<FetchError> for PipelineError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Cancelled => PipelineError::Cancelled,
            other => PipelineError::Fetch(other),
        }
    }
}

impl PipelineError {
    fn io(context: impl Into<String>) -> impl FnOnce(io::Error) -> Self {
        let context = context.into();
        move |source| PipelineError::Io { context, source }
    }
}

/// Which job to run.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Job {
    /// Rime-ice dictionary archive (annotated two-section files).
    RimeIce,
    /// THUOCL frequency lists.
    Thuocl,
    /// Whatever word-lists sit in a local folder.
    Local,
}

impl Job {
    /// File name of the canonical lexicon in the output directory.
    pub fn lexicon_file(self) -> &'static str {
        match self {
            Job::RimeIce => "rime_ice_lexicon.yaml",
            Job::Thuocl | Job::Local => "rime_lexicon.yaml",
        }
    }

    /// `name:` written into the lexicon header.
    pub fn lexicon_name(self) -> &'static str {
        match self {
            Job::RimeIce => "rime_ice_lexicon",
            Job::Thuocl => "thuocl_combined",
            Job::Local => "merged_lexicon",
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Job::RimeIce => "rime-ice",
            Job::Thuocl => "thuocl",
            Job::Local => "local",
        })
    }
}

/// Remote endpoints. Overridable so tests can point at a local server.
#[derive(Debug, Clone)]
pub struct RemoteSources {
    pub thuocl_base_url: String,
    pub github_api: String,
    pub rime_ice_repo: String,
    /// Use these archive URLs instead of asking GitHub.
    pub rime_ice_urls: Option<Vec<String>>,
}

impl Default for RemoteSources {
    fn default() -> Self {
        Self {
            thuocl_base_url: THUOCL_BASE_URL.to_string(),
            github_api: GITHUB_API.to_string(),
            rime_ice_repo: RIME_ICE_REPO.to_string(),
            rime_ice_urls: None,
        }
    }
}

/// Hand-off to the external converter.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub converter: Converter,
    pub output: PathBuf,
}

/// Everything a job needs; nothing is read from the environment.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub output_dir: PathBuf,
    pub load_mode: LoadMode,
    pub fetch: FetchConfig,
    /// Pause between attempts of an infinite-retry fetch.
    pub retry_delay: Duration,
    pub remote: RemoteSources,
    /// `None` stops after writing the canonical lexicon.
    pub conversion: Option<Conversion>,
}

impl IngestConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            load_mode: LoadMode::Mmap,
            fetch: FetchConfig::default(),
            retry_delay: DEFAULT_RETRY_DELAY,
            remote: RemoteSources::default(),
            conversion: None,
        }
    }

    pub fn lexicon_path(&self, job: Job) -> PathBuf {
        self.output_dir.join(job.lexicon_file())
    }
}

/// Counters and artifacts from one run.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RunReport {
    pub resources_loaded: usize,
    pub resources_failed: usize,
    /// Entries the adapters produced, duplicates included.
    pub entries_accepted: usize,
    /// Distinct merge keys.
    pub unique_keys: usize,
    /// Bare words dropped for lack of a transliteration.
    pub untransliterable: usize,
    pub emitted: usize,
    pub lexicon_path: PathBuf,
    pub lexicon_bytes: u64,
    pub converted: Option<PathBuf>,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sources read ({} failed), {} entries, {} unique, {} without transliteration, {} written to {}",
            self.resources_loaded,
            self.resources_failed,
            self.entries_accepted,
            self.unique_keys,
            self.untransliterable,
            self.emitted,
            self.lexicon_path.display()
        )?;
        if let Some(converted) = &self.converted {
            write!(f, ", converted to {}", converted.display())?;
        }
        Ok(())
    }
}

/// Run `job`. `source_dir` replaces the remote download (or, for
/// [`Job::Local`], the default `<output_dir>/cihui` folder).
pub async fn run(
    job: Job,
    config: &IngestConfig,
    source_dir: Option<&Path>,
    cancel: &CancellationToken,
    on_event: &mut dyn FnMut(FetchEvent<'_>),
) -> Result<RunReport, PipelineError> {
    match job {
        Job::RimeIce => run_rime_ice(config, source_dir, cancel, on_event).await,
        Job::Thuocl => run_thuocl(config, source_dir, cancel, on_event).await,
        Job::Local => run_local(config, source_dir, cancel).await,
    }
}

pub async fn run_rime_ice(
    config: &IngestConfig,
    local_dir: Option<&Path>,
    cancel: &CancellationToken,
    on_event: &mut dyn FnMut(FetchEvent<'_>),
) -> Result<RunReport, PipelineError> {
    // The scratch directory holds the download until the job ends.
    let (root, _scratch) = match local_dir {
        Some(dir) => (existing_dir(dir)?, None),
        None => {
            let scratch = scratch_dir("rime_ice_")?;
            let fetcher = Fetcher::new(&config.fetch)?;
            let candidates = match &config.remote.rime_ice_urls {
                Some(urls) => urls.clone(),
                None => tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                    urls = archive_candidates(
                        fetcher.client(),
                        &config.remote.github_api,
                        &config.remote.rime_ice_repo,
                    ) => urls,
                },
            };

            let archive = scratch.path().join("rime-ice.zip");
            let fetched = fetcher
                .fetch_to_path(&candidates, &archive, RetryPolicy::Fallback, cancel, on_event)
                .await
                .inspect_err(|err| {
                    if !matches!(err, FetchError::Cancelled) {
                        warn!(
                            "download rime-ice by hand and pass the extracted folder as LOCAL_DIR"
                        );
                    }
                })?;
            info!("downloaded {} bytes from {}", fetched.bytes, fetched.url);

            let extracted = scratch.path().join("extracted");
            extract_zip(&archive, &extracted).await?;
            (extracted, Some(scratch))
        }
    };

    let Some(resolved) = resolve_source_dir(&root, &["rime", "ice"], RIME_DICT_SUFFIXES) else {
        warn!("directory layout:\n{}", describe_tree(&root, TREE_DEPTH));
        return Err(PipelineError::SourceDirNotFound(root));
    };
    info!(
        "using {} ({:?})",
        resolved.dir.display(),
        resolved.strategy
    );

    let files = find_source_files(&resolved.dir, RIME_DICT_SUFFIXES);
    if files.is_empty() {
        return Err(PipelineError::NoSourceFiles(resolved.dir));
    }

    let mut lexicon = MergedLexicon::new();
    let tally = ingest_files(
        &files,
        Some(SourceFormat::Annotated),
        config.load_mode,
        &mut lexicon,
        cancel,
    )?;
    finish(Job::RimeIce, config, lexicon, tally, cancel).await
}

pub async fn run_thuocl(
    config: &IngestConfig,
    local_dir: Option<&Path>,
    cancel: &CancellationToken,
    on_event: &mut dyn FnMut(FetchEvent<'_>),
) -> Result<RunReport, PipelineError> {
    let mut download_failures = 0usize;
    let (files, _scratch) = match local_dir {
        Some(dir) => {
            let dir = existing_dir(dir)?;
            let files = find_source_files(&dir, FREQUENCY_LIST_SUFFIXES);
            if files.is_empty() {
                return Err(PipelineError::NoSourceFiles(dir));
            }
            (files, None)
        }
        None => {
            let scratch = scratch_dir("thuocl_")?;
            let fetcher = Fetcher::new(&config.fetch)?;
            let policy = RetryPolicy::Infinite {
                delay: config.retry_delay,
            };
            let catalog = thuocl_catalog(&config.remote.thuocl_base_url);
            let total = catalog.len();
            let mut files = Vec::with_capacity(total);
            for (idx, list) in catalog.into_iter().enumerate() {
                info!("[{}/{}] downloading {} ({})", idx + 1, total, list.label, list.file_name);
                let dest = scratch.path().join(&list.file_name);
                match fetcher
                    .fetch_to_path(&[list.url], &dest, policy, cancel, on_event)
                    .await
                {
                    Ok(_) => files.push(dest),
                    Err(FetchError::Cancelled) => return Err(PipelineError::Cancelled),
                    Err(err) => {
                        warn!("{}: giving up: {err}", list.file_name);
                        download_failures += 1;
                    }
                }
            }
            (files, Some(scratch))
        }
    };

    let mut lexicon = MergedLexicon::new();
    let read = ingest_files(
        &files,
        Some(SourceFormat::FrequencyList),
        config.load_mode,
        &mut lexicon,
        cancel,
    );
    let mut tally = match read {
        Err(PipelineError::NoUsableSources { attempted }) => {
            return Err(PipelineError::NoUsableSources {
                attempted: attempted + download_failures,
            });
        }
        other => other?,
    };
    tally.failed += download_failures;
    finish(Job::Thuocl, config, lexicon, tally, cancel).await
}

pub async fn run_local(
    config: &IngestConfig,
    dir: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<RunReport, PipelineError> {
    let default_dir = config.output_dir.join(LOCAL_DIR_NAME);
    let dir = existing_dir(dir.unwrap_or(&default_dir))?;
    let files = find_source_files(&dir, LOCAL_SUFFIXES);
    if files.is_empty() {
        return Err(PipelineError::NoSourceFiles(dir));
    }
    info!("found {} word-lists in {}", files.len(), dir.display());

    let mut lexicon = MergedLexicon::new();
    let tally = ingest_files(&files, None, config.load_mode, &mut lexicon, cancel)?;
    finish(Job::Local, config, lexicon, tally, cancel).await
}

/// How many resources were read and what they produced.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct IngestTally {
    pub loaded: usize,
    pub failed: usize,
    pub accepted: usize,
}

/// Read every file into `lexicon`, skipping (and counting) the ones that fail.
///
/// `format = None` detects the layout per file. Fails only when no file at
/// all could be read, or on cancellation.
pub fn ingest_files(
    files: &[PathBuf],
    format: Option<SourceFormat>,
    mode: LoadMode,
    lexicon: &mut MergedLexicon,
    cancel: &CancellationToken,
) -> Result<IngestTally, PipelineError> {
    let total = files.len();
    let mut tally = IngestTally::default();
    for (idx, path) in files.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        match read_source(path, mode, format, lexicon) {
            Ok(report) => {
                info!("[{}/{}] {name}: {} entries", idx + 1, total, report.accepted);
                if report.has_import_directive() {
                    warn!(
                        "{name} imports other tables ({}); imports are not followed",
                        report.imports.join(", ")
                    );
                }
                if report.format == SourceFormat::Annotated && !report.separator_found {
                    warn!("{name} has no `...` separator; nothing read");
                }
                tally.loaded += 1;
                tally.accepted += report.accepted;
            }
            Err(err) => {
                warn!("[{}/{}] {name}: skipped: {err:#}", idx + 1, total);
                tally.failed += 1;
            }
        }
    }
    if tally.loaded == 0 {
        return Err(PipelineError::NoUsableSources { attempted: total });
    }
    Ok(tally)
}

async fn finish(
    job: Job,
    config: &IngestConfig,
    lexicon: MergedLexicon,
    tally: IngestTally,
    cancel: &CancellationToken,
) -> Result<RunReport, PipelineError> {
    if lexicon.is_empty() {
        return Err(PipelineError::NoEntries);
    }
    let unique_keys = lexicon.len();
    info!(
        "{} entries merged into {} unique keys ({} rejected, {} awaiting transliteration)",
        lexicon.observed(),
        unique_keys,
        lexicon.rejected(),
        lexicon.bare_words()
    );

    let mut translit = Cached::new(Pinyin::new());
    let resolved = lexicon.resolve(&mut translit);
    if resolved.untransliterable > 0 {
        warn!("{} words had no transliteration and were skipped", resolved.untransliterable);
    }
    let entries = emit(resolved.entries);
    if entries.is_empty() {
        return Err(PipelineError::NoEntries);
    }
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    let lexicon_path = config.lexicon_path(job);
    let header = LexiconHeader::new(job.lexicon_name(), LEXICON_VERSION);
    let lexicon_bytes = write_lexicon_file(&lexicon_path, &header, &entries)
        .map_err(PipelineError::io(format!("write {}", lexicon_path.display())))?;
    info!(
        "wrote {} entries ({:.2} MB) to {}",
        entries.len(),
        lexicon_bytes as f64 / 1024.0 / 1024.0,
        lexicon_path.display()
    );

    let converted = match &config.conversion {
        Some(conversion) => {
            let size = conversion
                .converter
                .run(&lexicon_path, &conversion.output)
                .await
                .map_err(|source| PipelineError::Convert {
                    lexicon: lexicon_path.clone(),
                    source,
                })?;
            info!(
                "converted lexicon ({:.2} MB) at {}",
                size as f64 / 1024.0 / 1024.0,
                conversion.output.display()
            );
            Some(conversion.output.clone())
        }
        None => None,
    };

    Ok(RunReport {
        resources_loaded: tally.loaded,
        resources_failed: tally.failed,
        entries_accepted: tally.accepted,
        unique_keys,
        untransliterable: resolved.untransliterable,
        emitted: entries.len(),
        lexicon_path,
        lexicon_bytes,
        converted,
    })
}

fn existing_dir(dir: &Path) -> Result<PathBuf, PipelineError> {
    if dir.is_dir() {
        Ok(dir.to_path_buf())
    } else {
        Err(PipelineError::LocalDirMissing(dir.to_path_buf()))
    }
}

fn scratch_dir(prefix: &str) -> Result<TempDir, PipelineError> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .map_err(PipelineError::io("create scratch directory"))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn ingest_skips_unreadable_sources() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.txt");
        let bad = dir.path().join("bad.txt");
        fs::write(&good, "你好\t30\n世界\tabc\n").unwrap();
        fs::write(&bad, [0xff, 0xfe, 0x00]).unwrap();
        let missing = dir.path().join("missing.txt");

        let mut lexicon = MergedLexicon::new();
        let tally = ingest_files(
            &[good, bad, missing],
            Some(SourceFormat::FrequencyList),
            LoadMode::Owned,
            &mut lexicon,
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(
            tally,
            IngestTally {
                loaded: 1,
                failed: 2,
                accepted: 1
            }
        );
        assert_eq!(lexicon.len(), 1);
    }

    #[test]
    fn ingest_fails_when_nothing_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        let mut lexicon = MergedLexicon::new();
        let err = ingest_files(
            &[dir.path().join("nope.txt")],
            None,
            LoadMode::Mmap,
            &mut lexicon,
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::NoUsableSources { attempted: 1 }));
    }

    #[test]
    fn ingest_stops_when_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = ingest_files(
            &[PathBuf::from("a.txt")],
            None,
            LoadMode::Mmap,
            &mut MergedLexicon::new(),
            &cancel,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }

    #[test]
    fn job_output_names() {
        assert_eq!(Job::RimeIce.lexicon_file(), "rime_ice_lexicon.yaml");
        assert_eq!(Job::Thuocl.lexicon_name(), "thuocl_combined");
        assert_eq!(Job::Local.lexicon_name(), "merged_lexicon");
        let config = IngestConfig::new("/tmp/out");
        assert_eq!(config.lexicon_path(Job::Local), PathBuf::from("/tmp/out/rime_lexicon.yaml"));
    }
}
