use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;
use zip::ZipArchive;
use zip::result::ZipError;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("open archive {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("extract {path}: {source}")]
    Extract {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("extraction worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Unpack the zip at `archive` into `dest` on a blocking worker.
///
/// Returns the number of archive members.
pub async fn extract_zip(archive: &Path, dest: &Path) -> Result<usize, ArchiveError> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || extract_zip_blocking(&archive, &dest)).await?
}

fn extract_zip_blocking(archive: &Path, dest: &Path) -> Result<usize, ArchiveError> {
    let open_err = |source| ArchiveError::Open {
        path: archive.to_path_buf(),
        source,
    };
    let extract_err = |source| ArchiveError::Extract {
        path: archive.to_path_buf(),
        source,
    };

    fs::create_dir_all(dest).map_err(open_err)?;
    let file = File::open(archive).map_err(open_err)?;
    let mut zip = ZipArchive::new(file).map_err(extract_err)?;
    let members = zip.len();
    zip.extract(dest).map_err(extract_err)?;
    info!("extracted {members} members from {}", archive.display());
    Ok(members)
}
