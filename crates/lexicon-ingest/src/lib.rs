//! Build one canonical input-method lexicon out of many word-lists.
//!
//! A run acquires sources ([`fetch`], [`sources`], [`archive`], [`discover`]),
//! reads them through the adapters of `lexicon-formats`, folds every entry
//! into a [`MergedLexicon`] under the max-weight rule, derives codes for bare
//! words, sorts by weight ([`emit`]) and hands the written file to an external
//! [`Converter`]. [`pipeline`] strings these together as three jobs.
//!
//! # Example
//! ```no_run
//! use lexicon_ingest::{IngestConfig, Job, run};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), lexicon_ingest::PipelineError> {
//! let config = IngestConfig::new("/tmp/lexicon-out");
//! let cancel = CancellationToken::new();
//! let report = run(Job::Local, &config, None, &cancel, &mut |_| {}).await?;
//! println!("{report}");
//! # Ok(()) }
//! ```

pub mod archive;
pub mod convert;
pub mod discover;
pub mod emit;
pub mod fetch;
pub mod merge;
pub mod pipeline;
pub mod sources;

pub use convert::{ConvertError, Converter};
pub use emit::{LexiconHeader, emit, write_lexicon, write_lexicon_file};
pub use fetch::{FetchConfig, FetchError, FetchEvent, Fetched, Fetcher, RetryPolicy};
pub use merge::{MergedLexicon, Resolved, merge};
pub use pipeline::{
    Conversion, IngestConfig, Job, PipelineError, RemoteSources, RunReport, run, run_local,
    run_rime_ice, run_thuocl,
};
