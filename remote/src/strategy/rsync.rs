use tracing::instrument;

use super::{Request, TransferOutcome};
use crate::{Command, Error, Runner, Target};

/// Uploads one file with a single `rsync --partial` invocation.
///
/// The remote parent directory is created by the same invocation: `--rsync-path` makes the
/// remote shell run `mkdir -p DIR && rsync`. No remote probe is done, so `overwrite` and `resume`
/// do not change what is executed.
#[instrument(skip(runner))]
pub async fn transfer_file<R: Runner>(
    runner: &R,
    request: &Request<'_>,
) -> Result<TransferOutcome, Error> {
    let target = Target::parse(request.target)?;
    let host = target.select_host();
    let size = super::local_file_size(request.source).await?;
    super::log_transfer(request, size);
    if request.overwrite || request.resume {
        tracing::debug!(
            "overwrite={} resume={} are advisory with rsync, relying on --partial",
            request.overwrite,
            request.resume
        );
    }
    let mut command = Command::new(&request.programs.rsync).args(["-av", "--partial"]);
    if let Some(dir) = target.parent_dir() {
        command = command.arg(format!(
            "--rsync-path=mkdir -p {} && rsync",
            crate::shell_escape(dir)
        ));
    }
    let command = command
        .arg(request.source)
        .arg(format!("{host}:{}", target.path()));
    runner.run(&command).await?;
    Ok(TransferOutcome {
        bytes_transferred: size,
        skipped: false,
    })
}
