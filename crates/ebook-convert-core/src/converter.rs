//! The conversion capability and its subprocess implementation.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::CoreError;
use crate::format::BookFormat;

/// Log file `fb2c` appends to in its working directory on every run.
pub const CONVERTER_LOG: &str = "conversion.log";

/// Exit status and diagnostics of one converter run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOutcome {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stderr: Vec<u8>,
}

impl ConversionOutcome {
    /// A clean run that printed no diagnostics.
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            stderr: Vec::new(),
        }
    }

    /// Any diagnostic output counts as failure, even with exit code 0.
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0) && self.stderr.is_empty()
    }

    pub fn stderr_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}

/// Something that turns the document at `input` into `format`.
///
/// Implementations must leave their result at the input path with the
/// extension replaced by [`BookFormat::extension`]. They report what happened
/// and leave the success decision to the caller.
#[async_trait]
pub trait Converter: Send + Sync + std::fmt::Debug {
    async fn convert(&self, input: &Path, format: BookFormat)
        -> Result<ConversionOutcome, CoreError>;
}

/// Runs the external `fb2c` tool as `fb2c convert --to <format> <input>`.
#[derive(Debug, Clone)]
pub struct Fb2cConverter {
    binary: PathBuf,
    working_dir: Option<PathBuf>,
}

impl Fb2cConverter {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            working_dir: None,
        }
    }

    /// Run the tool from `dir`, so its side files (e.g. [`CONVERTER_LOG`])
    /// land there instead of the server's working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

#[async_trait]
impl Converter for Fb2cConverter {
    async fn convert(
        &self,
        input: &Path,
        format: BookFormat,
    ) -> Result<ConversionOutcome, CoreError> {
        let mut command = Command::new(&self.binary);
        command
            .arg("convert")
            .arg("--to")
            .arg(format.as_ref())
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        debug!(binary = %self.binary.display(), input = %input.display(), %format, "launching converter");

        let output = command.output().await.map_err(|source| CoreError::Spawn {
            binary: self.binary.clone(),
            source,
        })?;

        Ok(ConversionOutcome {
            exit_code: output.status.code(),
            stderr: output.stderr,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn clean_run_succeeds() {
        assert!(ConversionOutcome::success().succeeded());
    }

    #[test]
    fn non_zero_exit_fails() {
        let outcome = ConversionOutcome {
            exit_code: Some(2),
            stderr: Vec::new(),
        };
        assert!(!outcome.succeeded());
    }

    #[test]
    fn stderr_with_zero_exit_fails() {
        let outcome = ConversionOutcome {
            exit_code: Some(0),
            stderr: b"warning: unknown tag".to_vec(),
        };
        assert!(!outcome.succeeded());
        assert_eq!(outcome.stderr_lossy(), "warning: unknown tag");
    }

    #[test]
    fn signal_termination_fails() {
        let outcome = ConversionOutcome {
            exit_code: None,
            stderr: Vec::new(),
        };
        assert!(!outcome.succeeded());
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Fb2cConverter::new(dir.path().join("no-such-fb2c"));
        let err = converter
            .convert(&dir.path().join("in.fb2"), BookFormat::Epub)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Spawn { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    mod subprocess {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        use super::*;

        /// Write an executable shell script standing in for `fb2c`.
        fn fake_tool(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fb2c");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn passes_contract_arguments_and_writes_output() {
            let dir = tempfile::tempdir().unwrap();
            // $1=convert $2=--to $3=<format> $4=<input>
            let tool = fake_tool(
                dir.path(),
                r#"[ "$1" = convert ] && [ "$2" = --to ] || exit 9
cp "$4" "${4%.fb2}.$3""#,
            );
            let input = dir.path().join("book.fb2");
            std::fs::write(&input, b"<FictionBook/>").unwrap();

            let outcome = Fb2cConverter::new(tool)
                .with_working_dir(dir.path())
                .convert(&input, BookFormat::Mobi)
                .await
                .unwrap();

            assert!(outcome.succeeded(), "{outcome:?}");
            assert_eq!(
                std::fs::read(dir.path().join("book.mobi")).unwrap(),
                b"<FictionBook/>"
            );
        }

        #[tokio::test]
        async fn captures_exit_code_and_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let tool = fake_tool(dir.path(), "echo 'bad document' >&2\nexit 3");
            let input = dir.path().join("book.fb2");
            std::fs::write(&input, b"garbage").unwrap();

            let outcome = Fb2cConverter::new(tool)
                .convert(&input, BookFormat::Epub)
                .await
                .unwrap();

            assert_eq!(outcome.exit_code, Some(3));
            assert_eq!(outcome.stderr_lossy().trim(), "bad document");
            assert!(!outcome.succeeded());
        }

        /// `true` once `pid` has exited, whether or not it was reaped yet.
        #[cfg(target_os = "linux")]
        fn process_gone(pid: &str) -> bool {
            match std::fs::read_to_string(format!("/proc/{pid}/status")) {
                Ok(status) => status.lines().any(|l| l.starts_with("State:") && l.contains('Z')),
                Err(_) => true,
            }
        }

        #[cfg(target_os = "linux")]
        #[tokio::test]
        async fn dropping_conversion_kills_the_child() {
            let dir = tempfile::tempdir().unwrap();
            let tool = fake_tool(dir.path(), "echo $$ > \"$4.pid\"\nexec sleep 30");
            let input = dir.path().join("book.fb2");
            std::fs::write(&input, b"x").unwrap();
            let pid_file = dir.path().join("book.fb2.pid");

            let converter = Fb2cConverter::new(tool);
            let mut conversion = Box::pin(converter.convert(&input, BookFormat::Epub));

            let pid = tokio::select! {
                _ = &mut conversion => panic!("conversion should still be running"),
                pid = async {
                    loop {
                        if let Ok(pid) = std::fs::read_to_string(&pid_file) {
                            if !pid.trim().is_empty() {
                                break pid.trim().to_owned();
                            }
                        }
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                } => pid,
            };
            assert!(!process_gone(&pid));

            drop(conversion);

            let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
            while !process_gone(&pid) && tokio::time::Instant::now() < deadline {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            assert!(process_gone(&pid), "child {pid} survived the dropped conversion");
        }

        #[tokio::test]
        async fn runs_in_working_dir() {
            let dir = tempfile::tempdir().unwrap();
            let work = tempfile::tempdir().unwrap();
            let tool = fake_tool(dir.path(), "echo log > conversion.log");
            let input = dir.path().join("book.fb2");
            std::fs::write(&input, b"x").unwrap();

            Fb2cConverter::new(tool)
                .with_working_dir(work.path())
                .convert(&input, BookFormat::Epub)
                .await
                .unwrap();

            assert!(work.path().join("conversion.log").exists());
        }
    }
}
