use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("failed to launch converter {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove previous output {}: {source}", .path.display())]
    Clear {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("converter exited with {status}: {output}")]
    Failed { status: ExitStatus, output: String },
    #[error("converter succeeded but produced no {}", .0.display())]
    MissingOutput(PathBuf),
}

/// External program that turns the canonical lexicon into the binary format.
///
/// It is invoked as `program [leading_args...] <input> <output>` and must
/// create `output`. A previous `output` is removed first so a stale artifact
/// never passes for a fresh one. Nothing about its content is checked.
#[derive(Debug, Clone)]
pub struct Converter {
    program: OsString,
    leading_args: Vec<OsString>,
}

impl Converter {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Argument placed before the two paths, e.g. a script for an interpreter.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.leading_args.push(arg.into());
        self
    }

    pub async fn run(&self, input: &Path, output: &Path) -> Result<u64, ConvertError> {
        if let Some(parent) = output.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| self.launch_err(source))?;
        }
        match tokio::fs::remove_file(output).await {
            Err(err) if err.kind() != io::ErrorKind::NotFound => {
                return Err(ConvertError::Clear {
                    path: output.to_path_buf(),
                    source: err,
                });
            }
            _ => {}
        }

        info!(
            "converting {} -> {} with {}",
            input.display(),
            output.display(),
            self.program.to_string_lossy()
        );
        let result = Command::new(&self.program)
            .args(&self.leading_args)
            .arg(input)
            .arg(output)
            .output()
            .await
            .map_err(|source| self.launch_err(source))?;

        let stdout = String::from_utf8_lossy(&result.stdout);
        let stderr = String::from_utf8_lossy(&result.stderr);
        if !result.status.success() {
            return Err(ConvertError::Failed {
                status: result.status,
                output: format!("{}{}", stdout, stderr).trim().to_string(),
            });
        }
        if !stderr.trim().is_empty() {
            warn!("converter stderr: {}", stderr.trim());
        }

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.is_file() => Ok(meta.len()),
            _ => Err(ConvertError::MissingOutput(output.to_path_buf())),
        }
    }

    fn launch_err(&self, source: io::Error) -> ConvertError {
        ConvertError::Launch {
            program: self.program.to_string_lossy().into_owned(),
            source,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn copies_through_stand_in_converter() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("lexicon.yaml");
        std::fs::write(&input, "name: t\n").unwrap();
        let output = dir.path().join("out/lexicon.bin");

        let size = Converter::new("cp").run(&input, &output).await.unwrap();
        assert_eq!(size, 8);
    }

    #[tokio::test]
    async fn non_zero_exit_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = Converter::new("false")
            .run(&dir.path().join("in"), &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::Failed { .. }));
    }

    #[tokio::test]
    async fn missing_output_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = Converter::new("true")
            .run(&dir.path().join("in"), &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::MissingOutput(_)));
    }

    #[tokio::test]
    async fn stale_output_does_not_count_as_produced() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out");
        std::fs::write(&output, "from an earlier run").unwrap();

        let err = Converter::new("true")
            .run(&dir.path().join("in"), &output)
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::MissingOutput(_)));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn missing_program_fails_to_launch() {
        let dir = tempfile::tempdir().unwrap();
        let err = Converter::new("definitely-not-a-converter-xyz")
            .run(&dir.path().join("in"), &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::Launch { .. }));
    }
}
