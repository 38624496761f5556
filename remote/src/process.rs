//! Running external commands
//!
//! Commands are always spawned directly from an argument vector, never through a local shell.
//! Anything that must be interpreted by a shell (e.g. `mkdir -p ... && rsync`) is interpreted by
//! the *remote* shell, so only the words forwarded to it need quoting, see [`crate::shell_escape`].

use std::ffi::{OsStr, OsString};

use tracing::instrument;

use crate::Error;

/// Program plus structured arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    program: OsString,
    args: Vec<OsString>,
}

impl Command {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    pub fn get_program(&self) -> &OsStr {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }
}

/// Shell-like rendering, used for logs and error messages only.
impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", crate::shell_escape(&self.program.to_string_lossy()))?;
        for arg in &self.args {
            write!(f, " {}", crate::shell_escape(&arg.to_string_lossy()))?;
        }
        Ok(())
    }
}

/// Executes commands to completion and returns their trimmed standard output.
///
/// Implementations must map a non-zero exit status to [`Error::Process`] carrying the exit code
/// and the captured standard error.
pub trait Runner: Send + Sync + 'static {
    fn run(
        &self,
        command: &Command,
    ) -> impl std::future::Future<Output = Result<String, Error>> + Send;
}

/// Spawns real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    #[instrument(skip_all, fields(command = %command))]
    async fn run(&self, command: &Command) -> Result<String, Error> {
        throttle::get_spawn_token().await;
        tracing::debug!("spawning process");
        let output = tokio::process::Command::new(command.get_program())
            .args(command.get_args())
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|source| Error::Spawn {
                command: command.to_string(),
                source,
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            tracing::debug!("process failed: {:?}, stderr: {}", output.status, stderr);
            return Err(Error::Process {
                command: command.to_string(),
                exit_code: output.status.code(),
                stderr,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}
