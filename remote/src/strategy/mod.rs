//! Single-file transfer strategies
//!
//! Both strategies implement the same capability, "transfer one local file to one remote
//! target", and are selected by configuration through [`Strategy`]:
//!
//! - [`Strategy::Rsync`] (default): one `rsync --partial` invocation that also creates the remote
//!   parent directory. `overwrite`/`resume` are advisory only, rsync's own partial-transfer
//!   handling decides what is re-sent.
//! - [`Strategy::Ssh`]: probes the remote size with `ssh ... stat` first and applies the
//!   overwrite/resume policy itself, then copies with `scp`. Single host only.

use tracing::instrument;

use crate::{Error, Programs, Runner};

pub mod rsync;
pub mod ssh;

/// One file to transfer. Built per file and not modified during the attempt.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub source: &'a std::path::Path,
    pub target: &'a str,
    pub overwrite: bool,
    pub resume: bool,
    pub verbosity: u8,
    pub programs: &'a Programs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    pub bytes_transferred: u64,
    /// Remote copy already matched and the transfer was skipped
    pub skipped: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Strategy {
    #[default]
    Rsync,
    Ssh,
}

impl Strategy {
    #[instrument(skip(runner))]
    pub async fn transfer_file<R: Runner>(
        self,
        runner: &R,
        request: &Request<'_>,
    ) -> Result<TransferOutcome, Error> {
        match self {
            Strategy::Rsync => rsync::transfer_file(runner, request).await,
            Strategy::Ssh => ssh::transfer_file(runner, request).await,
        }
    }
}

/// Size of the local source, which must be an existing regular file.
pub(crate) async fn local_file_size(source: &std::path::Path) -> Result<u64, Error> {
    match tokio::fs::metadata(source).await {
        Ok(metadata) if metadata.is_file() => Ok(metadata.len()),
        Ok(_) => Err(Error::NotFound {
            path: source.to_path_buf(),
        }),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound {
            path: source.to_path_buf(),
        }),
        Err(error) => Err(Error::Io {
            path: source.to_path_buf(),
            source: error,
        }),
    }
}

pub(crate) fn log_transfer(request: &Request<'_>, size: u64) {
    if request.verbosity > 0 {
        tracing::info!(
            "Uploading {} to {} ({})",
            request.source.display(),
            request.target,
            bytesize::ByteSize(size)
        );
    }
}
