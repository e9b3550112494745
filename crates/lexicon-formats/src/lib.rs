//! Read loosely structured word-lists into lexicon entries.
//!
//! Three layouts are understood, each as a [`FormatAdapter`]:
//!
//! - [`Annotated`]: an unstructured header, a literal `...` line, then
//!   `word<TAB>code[<TAB>weight]` payload (Rime `*.dict.yaml` style).
//! - [`FrequencyList`]: `word<TAB>frequency` lines (THUOCL style). A
//!   non-numeric frequency rejects the line.
//! - [`Heterogeneous`]: local files of unknown delimiter, read leniently.
//!
//! All of them share one delimiter-aware line splitter, [`parse_line`], which
//! tries tab, then whitespace, then comma. Adapters push entries into any
//! [`EntrySink`] as they go and return a [`SourceReport`] with counters.
//!
//! Files are loaded either memory-mapped or into an owned buffer, chosen at
//! runtime via [`LoadMode`]. The whole file must be valid UTF-8 before any
//! entry is produced, so a file that fails to decode contributes nothing.
//!
//! # Example
//! ```no_run
//! use lexicon_formats::{LoadMode, SourceFormat, read_source};
//! use lexicon_types::SourceEntry;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut entries: Vec<SourceEntry> = Vec::new();
//! let report = read_source(
//!     "/path/to/base.dict.yaml",
//!     LoadMode::Mmap,
//!     Some(SourceFormat::Annotated),
//!     &mut entries,
//! )?;
//! println!("{} entries, {} skipped", report.accepted, report.skipped);
//! # Ok(()) }
//! ```
//!
//! For a runnable demo, see `cargo run -p lexicon-formats --example inspect -- <file>`.

pub mod adapter;
pub mod line;

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lexicon_types::EntrySink;
use memmap2::Mmap;
use tracing::debug;

pub use adapter::{
    Annotated, FormatAdapter, FrequencyList, Heterogeneous, SECTION_SEPARATOR, SourceFormat,
    SourceReport,
};
pub use line::{Delimiter, RawLine, parse_line, parse_line_with_delimiter, parse_weight};

/// Strategy for loading source files.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadMode {
    /// Memory-map the file (fast, zero-copy).
    Mmap,
    /// Read the file into an owned buffer (portable fallback).
    Owned,
}

impl LoadMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "mmap" => Some(LoadMode::Mmap),
            "owned" => Some(LoadMode::Owned),
            _ => None,
        }
    }
}

enum Buffer {
    Mmap(Mmap),
    Owned(Vec<u8>),
    Empty,
}

impl Buffer {
    fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Mmap(m) => m.as_ref(),
            Buffer::Owned(v) => v.as_slice(),
            Buffer::Empty => &[],
        }
    }
}

/// Raw bytes of one source resource.
pub struct SourceFile {
    path: PathBuf,
    buffer: Buffer,
}

impl SourceFile {
    pub fn load(path: impl AsRef<Path>, mode: LoadMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let buffer = load_file(&path, mode)?;
        Ok(Self { path, buffer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// Decode as UTF-8, dropping a leading byte-order mark.
    pub fn text(&self) -> Result<&str> {
        let text = std::str::from_utf8(self.bytes())
            .with_context(|| format!("decode {} as utf-8", self.path.display()))?;
        Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
    }
}

/// Load `path` and feed it through the adapter for `format`.
///
/// With `format = None` the adapter is picked by [`SourceFormat::detect`].
pub fn read_source(
    path: impl AsRef<Path>,
    mode: LoadMode,
    format: Option<SourceFormat>,
    sink: &mut dyn EntrySink,
) -> Result<SourceReport> {
    let file = SourceFile::load(path, mode)?;
    let text = file.text()?;
    let format = format.unwrap_or_else(|| SourceFormat::detect(text));
    let report = format.read(text, sink);
    debug!(
        "{} read as {}: {} accepted, {} skipped",
        file.path().display(),
        format,
        report.accepted,
        report.skipped
    );
    Ok(report)
}

fn load_file(path: &Path, mode: LoadMode) -> Result<Buffer> {
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    match mode {
        LoadMode::Mmap => {
            let len = file
                .metadata()
                .with_context(|| format!("stat {}", path.display()))?
                .len();
            // Mapping a zero-length file fails on some platforms.
            if len == 0 {
                return Ok(Buffer::Empty);
            }
            unsafe { Mmap::map(&file) }
                .map(Buffer::Mmap)
                .with_context(|| format!("mmap {}", path.display()))
        }
        LoadMode::Owned => {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)
                .with_context(|| format!("read {}", path.display()))?;
            Ok(Buffer::Owned(buf))
        }
    }
}
