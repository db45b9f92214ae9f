// Child process runner shared by the git and engine adapters
// reason: tokio::process for async waits, nix for graceful termination on unix
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Variables inherited from the daemon's environment; everything else is
/// dropped before a child starts
pub const DEFAULT_ENV_ALLOWLIST: &[&str] = &[
    "PATH",
    "HOME",
    "USER",
    "LANG",
    "LC_ALL",
    "TMPDIR",
    "JAVA_HOME",
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "NO_PROXY",
    "http_proxy",
    "https_proxy",
    "no_proxy",
];

/// Time a child gets between SIGTERM and SIGKILL
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Bytes kept per output stream; the rest is drained and discarded
pub const DEFAULT_OUTPUT_LIMIT: usize = 8 * 1024 * 1024;

/// One command invocation
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Explicit additions on top of the allowlisted environment
    pub env: Vec<(String, String)>,
    /// Covers the wait and the output capture together
    pub timeout: Duration,
    pub output_limit: usize,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            timeout,
            output_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn output_limit(mut self, bytes: usize) -> Self {
        self.output_limit = bytes;
        self
    }
}

/// Captured result of a finished child
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// `None` when terminated by a signal
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// Set when the stream went past `CommandSpec::output_limit`
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub duration_ms: u64,
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to spawn {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("Process timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(String),
}

/// Spawns isolated child processes with an allowlisted environment and a
/// hard timeout
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    env_allowlist: Vec<String>,
    grace_period: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(
            DEFAULT_ENV_ALLOWLIST.iter().map(|s| s.to_string()).collect(),
            DEFAULT_GRACE_PERIOD,
        )
    }
}

impl ProcessRunner {
    pub fn new(env_allowlist: Vec<String>, grace_period: Duration) -> Self {
        Self {
            env_allowlist,
            grace_period,
        }
    }

    /// Allowlisted variables present in the current environment
    fn inherited_env(&self) -> Vec<(String, String)> {
        self.env_allowlist
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (key.clone(), value)))
            .collect()
    }

    pub async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        let program = spec.program.display().to_string();
        let started = Instant::now();

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .env_clear()
            .envs(self.inherited_env())
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        // Own process group, so termination reaches grandchildren too
        #[cfg(unix)]
        command.process_group(0);

        debug!(program = %program, args = ?spec.args, timeout = ?spec.timeout, "Spawning process");

        let mut child = command.spawn().map_err(|e| ProcessError::SpawnFailed {
            program: program.clone(),
            reason: e.to_string(),
        })?;

        // The pid doubles as the process group id
        let pgid = child.id();
        let mut stdout = spawn_reader(child.stdout.take(), spec.output_limit);
        let mut stderr = spawn_reader(child.stderr.take(), spec.output_limit);

        // A grandchild can hold the pipes open after the child exits, so the
        // captures run under the same deadline as the wait
        let finished = timeout(spec.timeout, async {
            let status = child
                .wait()
                .await
                .map_err(|e| ProcessError::Io(e.to_string()))?;
            let stdout = collect(&mut stdout).await?;
            let stderr = collect(&mut stderr).await?;
            Ok::<_, ProcessError>((status, stdout, stderr))
        })
        .await;

        let (status, stdout, stderr) = match finished {
            Ok(result) => result?,
            Err(_) => {
                warn!(program = %program, timeout = ?spec.timeout, "Process timed out, terminating");
                self.terminate(&mut child, pgid).await;
                stdout.abort();
                stderr.abort();
                return Err(ProcessError::Timeout(spec.timeout));
            }
        };

        if stdout.truncated || stderr.truncated {
            warn!(
                program = %program,
                limit = spec.output_limit,
                stdout_truncated = stdout.truncated,
                stderr_truncated = stderr.truncated,
                "Process output exceeded limit"
            );
        }

        let output = ProcessOutput {
            exit_code: status.code(),
            success: status.success(),
            stdout: stdout.text(),
            stderr: stderr.text(),
            stdout_truncated: stdout.truncated,
            stderr_truncated: stderr.truncated,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            program = %program,
            exit_code = ?output.exit_code,
            duration_ms = output.duration_ms,
            "Process finished"
        );
        Ok(output)
    }

    /// SIGTERM the process group, then SIGKILL whatever is left of it after
    /// the grace period
    async fn terminate(&self, child: &mut Child, pgid: Option<u32>) {
        #[cfg(unix)]
        if let Some(pid) = pgid {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            let group = Pid::from_raw(pid as i32);
            if let Err(e) = killpg(group, Signal::SIGTERM) {
                debug!(pid, error = %e, "SIGTERM failed");
            }
            if timeout(self.grace_period, child.wait()).await.is_err() {
                warn!(pid, "Process ignored SIGTERM, sending SIGKILL");
            }
            // The child may be gone while grandchildren in its group are not
            if let Err(e) = killpg(group, Signal::SIGKILL) {
                debug!(pid, error = %e, "Process group already gone");
            }
        }
        #[cfg(not(unix))]
        let _ = pgid;

        if let Err(e) = child.kill().await {
            debug!(error = %e, "Kill after timeout failed (process already gone)");
        }
    }
}

/// One output stream, capped at `CommandSpec::output_limit`
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

fn spawn_reader<R>(pipe: Option<R>, limit: usize) -> JoinHandle<std::io::Result<Captured>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut bytes = Vec::new();
        let mut truncated = false;
        if let Some(pipe) = pipe {
            let mut capped = pipe.take(limit as u64);
            capped.read_to_end(&mut bytes).await?;
            // Keep draining so the child never blocks on a full pipe
            let mut rest = capped.into_inner();
            truncated = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await? > 0;
        }
        Ok(Captured { bytes, truncated })
    })
}

async fn collect(
    reader: &mut JoinHandle<std::io::Result<Captured>>,
) -> Result<Captured, ProcessError> {
    reader
        .await
        .map_err(|e| ProcessError::Io(e.to_string()))?
        .map_err(|e| ProcessError::Io(e.to_string()))
}
