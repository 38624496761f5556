/// Failure kinds of a single-file transfer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("'{command}' failed with exit code {}: {stderr}", exit_code_text(.exit_code))]
    Process {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to start '{command}'")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{target} already exists, use 'overwrite' to replace or 'resume' to skip")]
    AlreadyExists { target: String },

    #[error("source {path:?} does not exist or is not a regular file")]
    NotFound { path: std::path::PathBuf },

    #[error("failed reading {path:?}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn exit_code_text(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => code.to_string(),
        None => "none (killed by signal)".to_string(),
    }
}

impl Error {
    pub(crate) fn invalid_target(target: &str, reason: impl Into<String>) -> Self {
        Error::InvalidTarget {
            target: target.to_string(),
            reason: reason.into(),
        }
    }
}
