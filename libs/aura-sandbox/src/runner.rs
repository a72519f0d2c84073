/// Subprocess Runner - one temp file, one child process, one hard timeout
///
/// **Guarantees:**
/// - The source unit is written to a uniquely named temp file with the
///   language's extension and passed to the interpreter as its only argument
/// - Hard timeout: the child is killed and reaped when the limit is hit
/// - The child leads its own process group; the whole group is killed once
///   the run ends, so background processes started by user code never
///   outlive it or hold the output pipes open
/// - Guaranteed cleanup: the temp file is removed on success, timeout, error
///   and when the calling future is dropped (`SourceFileGuard`)
/// - stderr is placed in front of stdout so a parse failure shows the
///   interpreter's own error first
use crate::config::LanguageProfile;
use crate::error::{Result, SandboxError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// How long output pipes may stay open after the child has exited
const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Captured text of one finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub output: String,
    pub elapsed: Duration,
}

/// Seam between the engine and process execution, so the engine can be
/// driven by a fake in tests.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        source: &str,
        profile: &LanguageProfile,
        timeout_ms: u64,
    ) -> Result<RunOutput>;
}

/// Temp file cleanup guard - removes the source file on drop
struct SourceFileGuard {
    file: Option<NamedTempFile>,
}

impl SourceFileGuard {
    fn create(dir: Option<&Path>, extension: &str) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("aura-").suffix(extension);
        let file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(Self { file: Some(file) })
    }

    fn path(&self) -> &Path {
        // `file` is only taken in drop
        self.file
            .as_ref()
            .map(|f| f.path())
            .unwrap_or_else(|| Path::new(""))
    }
}

impl Drop for SourceFileGuard {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let path = file.path().to_path_buf();
            if let Err(e) = file.close() {
                warn!(path = %path.display(), error = %e, "Failed to remove temp source file");
            }
        }
    }
}

/// Runs source units through a local interpreter
#[derive(Debug, Clone, Default)]
pub struct SubprocessRunner {
    temp_dir: Option<PathBuf>,
}

impl SubprocessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place temp source files under `dir` instead of the system temp dir
    pub fn with_temp_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: Some(dir.into()),
        }
    }
}

#[async_trait]
impl ProcessRunner for SubprocessRunner {
    #[tracing::instrument(skip(self, source, profile), fields(language = %profile.language, executable = %profile.executable))]
    async fn run(
        &self,
        source: &str,
        profile: &LanguageProfile,
        timeout_ms: u64,
    ) -> Result<RunOutput> {
        let guard = SourceFileGuard::create(self.temp_dir.as_deref(), &profile.file_extension)?;
        tokio::fs::write(guard.path(), source).await?;

        let start_time = Instant::now();

        let mut command = Command::new(&profile.executable);
        command
            .arg(guard.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| SandboxError::Spawn {
            executable: profile.executable.clone(),
            source,
        })?;
        let pgid = child.id();

        let (Some(mut stdout_pipe), Some(mut stderr_pipe)) = (child.stdout.take(), child.stderr.take()) else {
            kill_process_group(pgid);
            return Err(SandboxError::Io(std::io::Error::other("child output was not captured")));
        };

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let status = {
            let reads = async {
                let (out_res, err_res) = tokio::join!(
                    stdout_pipe.read_to_end(&mut stdout),
                    stderr_pipe.read_to_end(&mut stderr),
                );
                out_res.and(err_res)
            };
            tokio::pin!(reads);
            let mut reads_done = false;

            // Pipes are drained while waiting so a chatty child never blocks on a full pipe
            let waited = tokio::time::timeout(Duration::from_millis(timeout_ms), async {
                loop {
                    tokio::select! {
                        status = child.wait() => return status,
                        res = &mut reads, if !reads_done => {
                            reads_done = true;
                            if let Err(e) = res {
                                return Err(e);
                            }
                        }
                    }
                }
            })
            .await;

            let status = match waited {
                Ok(status) => status?,
                Err(_) => {
                    warn!(timeout_ms, "Execution timed out - killing process group");
                    kill_process_group(pgid);
                    // kill() sends SIGKILL and waits, so the child is reaped here
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "Failed to kill timed-out process");
                    }
                    return Err(SandboxError::Timeout { limit_ms: timeout_ms });
                }
            };

            // Anything user code left running in the background goes with the group
            kill_process_group(pgid);
            if !reads_done {
                match tokio::time::timeout(PIPE_DRAIN_GRACE, &mut reads).await {
                    Ok(res) => {
                        res?;
                    }
                    Err(_) => warn!("Output pipes still open after exit, keeping captured output"),
                }
            }
            status
        };

        let elapsed = start_time.elapsed();
        debug!(
            exit_code = ?status.code(),
            elapsed_ms = elapsed.as_millis() as u64,
            stderr_bytes = stderr.len(),
            "Process finished"
        );

        let stdout = String::from_utf8_lossy(&stdout);
        let output = if stderr.is_empty() {
            stdout.into_owned()
        } else {
            format!("{}\n{}", String::from_utf8_lossy(&stderr), stdout)
        };

        Ok(RunOutput { output, elapsed })
    }
}

/// SIGKILL every process in the group led by the child. An empty group is not an error.
#[cfg(unix)]
fn kill_process_group(pgid: Option<u32>) {
    let Some(pgid) = pgid else {
        return;
    };
    // SAFETY: killpg only sends a signal; no memory is shared with the callee
    if unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) } == -1 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!(pgid, error = %err, "Failed to kill process group");
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: Option<u32>) {}
