use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::client::{HighlightError, Highlighter, StyledRun};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// 外部分词进程 / Tokenizer running as a child process.
///
/// The process is invoked as `<program> <args..> <language>`, receives the
/// document on stdin and must print a JSON array of `{"text", "style"}`
/// objects on stdout. The child is killed when a call times out.
#[derive(Debug, Clone)]
pub struct ProcessHighlighter {
    name: String,
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    probe_timeout: Duration,
}

impl ProcessHighlighter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let name = program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.display().to_string());
        Self {
            name,
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    fn spawn_error(&self, err: std::io::Error) -> HighlightError {
        if err.kind() == ErrorKind::NotFound {
            HighlightError::NotInstalled(self.name.clone())
        } else {
            HighlightError::Io(err)
        }
    }
}

#[async_trait]
impl Highlighter for ProcessHighlighter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_installed(&self) -> bool {
        let spawned = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(err) => {
                debug!(target: "highlight", program = %self.name, error = %err, "probe_spawn_failed");
                return false;
            }
        };

        match timeout(self.probe_timeout, child.wait()).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(err)) => {
                debug!(target: "highlight", program = %self.name, error = %err, "probe_wait_failed");
                false
            }
            Err(_) => {
                debug!(target: "highlight", program = %self.name, "probe_timed_out");
                false
            }
        }
    }

    async fn tokenize(
        &self,
        text: &str,
        language: &str,
    ) -> Result<Vec<StyledRun>, HighlightError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(language)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| self.spawn_error(err))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| HighlightError::Process("child stdin unavailable".into()))?;
        let input = text.as_bytes().to_vec();
        let writer = tokio::spawn(async move {
            stdin.write_all(&input).await?;
            stdin.shutdown().await
        });

        // Dropping the future on timeout drops the child, which kills it.
        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                writer.abort();
                return Err(HighlightError::Timeout(self.timeout));
            }
        };

        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) if err.kind() == ErrorKind::BrokenPipe => {}
            Ok(Err(err)) => return Err(HighlightError::Io(err)),
            Err(err) => return Err(HighlightError::Process(format!("stdin writer failed: {err}"))),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HighlightError::Process(format!(
                "{} exited with {}: {}",
                self.name,
                output.status,
                stderr.trim()
            )));
        }

        let runs: Vec<StyledRun> = serde_json::from_slice(&output.stdout)?;
        debug!(target: "highlight", program = %self.name, language, runs = runs.len(), "tokenized");
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HighlightKind;

    const MISSING: &str = "printflow-highlighter-that-does-not-exist";

    #[tokio::test]
    async fn missing_program_is_not_installed() {
        let highlighter = ProcessHighlighter::new(MISSING);
        assert_eq!(highlighter.name(), MISSING);
        assert!(!highlighter.is_installed().await);

        let err = highlighter.tokenize("fn main() {}", "rust").await.unwrap_err();
        assert!(matches!(err, HighlightError::NotInstalled(name) if name == MISSING));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn parses_runs_from_stdout() {
        let highlighter = ProcessHighlighter::new("sh").with_args([
            "-c",
            r#"cat > /dev/null; printf '[{"text":"fn","style":"keyword"},{"text":" x","style":"plain"}]'"#,
        ]);
        let runs = highlighter.tokenize("fn x", "rust").await.unwrap();
        assert_eq!(
            runs,
            vec![
                StyledRun::new("fn", HighlightKind::Keyword),
                StyledRun::new(" x", HighlightKind::Plain),
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_a_process_error() {
        let highlighter = ProcessHighlighter::new("sh")
            .with_args(["-c", "cat > /dev/null; echo boom >&2; exit 3"]);
        let err = highlighter.tokenize("text", "rust").await.unwrap_err();
        assert!(matches!(err, HighlightError::Process(message) if message.contains("boom")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_process_times_out() {
        let highlighter = ProcessHighlighter::new("sh")
            .with_args(["-c", "sleep 5"])
            .with_timeout(Duration::from_millis(100));
        let err = highlighter.tokenize("text", "rust").await.unwrap_err();
        assert!(matches!(err, HighlightError::Timeout(_)));
    }
}
