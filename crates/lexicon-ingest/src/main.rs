use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use lexicon_formats::LoadMode;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use lexicon_ingest::{
    Conversion, Converter, FetchConfig, FetchEvent, IngestConfig, Job, PipelineError,
    RemoteSources, run,
};

const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "lexicon-ingest", version)]
#[command(about = "Merge word-lists into one canonical input-method lexicon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Where the lexicon is written [default: ~/Desktop, ~/桌面, or the current directory]
    #[arg(long, global = true, env = "LEXICON_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Seconds between attempts when a download is retried indefinitely
    #[arg(long, global = true, env = "LEXICON_RETRY_DELAY", default_value_t = 3)]
    retry_delay_secs: u64,

    #[arg(long, global = true, default_value_t = 10)]
    connect_timeout_secs: u64,

    #[arg(long, global = true, default_value_t = 60)]
    read_timeout_secs: u64,

    /// How source files are read: mmap or owned
    #[arg(long, global = true, env = "LEXICON_LOAD_MODE", default_value = "mmap", value_parser = parse_load_mode)]
    load_mode: LoadMode,

    /// Program that converts the canonical lexicon
    #[arg(long, global = true, default_value = "swift")]
    converter: String,

    /// Argument passed to the converter ahead of the two paths
    #[arg(long, global = true, default_value = "Tools/convert_rime_dict.swift")]
    converter_script: PathBuf,

    /// Destination of the converted lexicon
    #[arg(long, global = true, default_value = "WTRimeKeyboard/Resources/rime_lexicon.sqlite")]
    converted_output: PathBuf,

    /// Stop after writing the canonical lexicon
    #[arg(long, global = true, default_value_t = false)]
    no_convert: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Rime-ice dictionaries, downloaded or from an extracted folder
    RimeIce { local_dir: Option<PathBuf> },
    /// THUOCL frequency lists, downloaded or from a folder
    Thuocl { local_dir: Option<PathBuf> },
    /// Word-lists in a local folder [default: <output-dir>/cihui]
    Local { dir: Option<PathBuf> },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let (job, source_dir) = match &cli.command {
        Commands::RimeIce { local_dir } => (Job::RimeIce, local_dir.clone()),
        Commands::Thuocl { local_dir } => (Job::Thuocl, local_dir.clone()),
        Commands::Local { dir } => (Job::Local, dir.clone()),
    };

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            error!("{err:#}");
            return ExitCode::FAILURE;
        }
    };
    info!("job: {job}");
    info!("output directory: {}", config.output_dir.display());
    if let Some(dir) = &source_dir {
        info!("using local directory {}", dir.display());
    }
    match &config.conversion {
        Some(conversion) => info!("converted output: {}", conversion.output.display()),
        None => info!("conversion disabled"),
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; stopping");
            interrupt.cancel();
        }
    });

    let mut progress = DownloadProgress::default();
    let result = run(
        job,
        &config,
        source_dir.as_deref(),
        &cancel,
        &mut |event| progress.handle(event),
    )
    .await;
    progress.clear();

    match result {
        Ok(report) => {
            info!("{job} done: {report}");
            ExitCode::SUCCESS
        }
        Err(PipelineError::Cancelled) => {
            error!("{job} cancelled; nothing written");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(err) => {
            error!("{job} failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<IngestConfig> {
    let output_dir = cli.output_dir.clone().unwrap_or_else(default_output_dir);
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("create output directory {}", output_dir.display()))?;

    let conversion = (!cli.no_convert).then(|| {
        let mut converter = Converter::new(&cli.converter);
        if !cli.converter_script.as_os_str().is_empty() {
            converter = converter.arg(&cli.converter_script);
        }
        Conversion {
            converter,
            output: cli.converted_output.clone(),
        }
    });

    Ok(IngestConfig {
        output_dir,
        load_mode: cli.load_mode,
        fetch: FetchConfig {
            connect_timeout: Duration::from_secs(cli.connect_timeout_secs),
            read_timeout: Duration::from_secs(cli.read_timeout_secs),
            ..FetchConfig::default()
        },
        retry_delay: Duration::from_secs(cli.retry_delay_secs),
        remote: RemoteSources::default(),
        conversion,
    })
}

fn default_output_dir() -> PathBuf {
    let home = env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from);
    if let Some(home) = home {
        for name in ["Desktop", "桌面"] {
            let candidate = home.join(name);
            if candidate.is_dir() {
                return candidate;
            }
        }
    }
    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn parse_load_mode(raw: &str) -> Result<LoadMode, String> {
    LoadMode::parse(raw).ok_or_else(|| format!("unknown load mode `{raw}` (expected mmap or owned)"))
}

/// Renders fetch events as a byte bar, or a spinner when the size is unknown.
#[derive(Default)]
struct DownloadProgress {
    bar: Option<ProgressBar>,
}

impl DownloadProgress {
    fn handle(&mut self, event: FetchEvent<'_>) {
        match event {
            FetchEvent::Attempt { url, attempt } => debug!("GET {url} (attempt {attempt})"),
            FetchEvent::Started { url, total } => {
                self.clear();
                let bar = match total {
                    Some(total) => {
                        let bar = ProgressBar::new(total);
                        bar.set_style(
                            ProgressStyle::with_template(
                                "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, ETA {eta})",
                            )
                            .map(|style| style.progress_chars("=>-"))
                            .unwrap_or_else(|_| ProgressStyle::default_bar()),
                        );
                        bar
                    }
                    None => {
                        let bar = ProgressBar::new_spinner();
                        bar.set_style(
                            ProgressStyle::with_template("{spinner} {msg} {bytes}")
                                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                        );
                        bar
                    }
                };
                bar.set_message(short_name(url).to_string());
                self.bar = Some(bar);
            }
            FetchEvent::Progress { downloaded, .. } => {
                if let Some(bar) = &self.bar {
                    bar.set_position(downloaded);
                }
            }
            FetchEvent::Finished { url, bytes } => {
                self.clear();
                info!("downloaded {} ({:.2} MB)", short_name(url), bytes as f64 / 1024.0 / 1024.0);
            }
            FetchEvent::Failed { .. } => {
                if let Some(bar) = self.bar.take() {
                    bar.abandon();
                }
            }
        }
    }

    fn clear(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

fn short_name(url: &str) -> &str {
    url.trim_end_matches('/').rsplit('/').next().unwrap_or(url)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let max_level = env_filter
        .max_level_hint()
        .and_then(|hint| hint.into_level())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_max_level(max_level)
        .init();
}
