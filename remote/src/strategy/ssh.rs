use tracing::instrument;

use super::{Request, TransferOutcome};
use crate::{Command, Error, Programs, Runner, Target};

/// Uploads one file by probing the remote size over ssh, then copying with scp.
///
/// | remote size   | resume | overwrite | action                 |
/// |---------------|--------|-----------|------------------------|
/// | absent        | any    | any       | copy                   |
/// | == local      | true   | any       | skip                   |
/// | != local      | any    | any       | warn, copy             |
/// | == local      | false  | false     | [`Error::AlreadyExists`] |
/// | == local      | false  | true      | copy                   |
///
/// A failed probe counts as "absent": a remote error cannot be told apart from a missing file.
#[instrument(skip(runner))]
pub async fn transfer_file<R: Runner>(
    runner: &R,
    request: &Request<'_>,
) -> Result<TransferOutcome, Error> {
    let target = Target::parse(request.target)?;
    if target.is_multi_host() {
        return Err(Error::invalid_target(
            request.target,
            "multi-host targets are not supported by the ssh strategy",
        ));
    }
    let host = target.host_spec();
    let size = super::local_file_size(request.source).await?;
    super::log_transfer(request, size);
    if let Some(remote_size) =
        probe_remote_size(runner, request.programs, host, target.path()).await
    {
        if remote_size != size {
            tracing::warn!(
                "{} already exists, but with different size, re-uploading (remote={}, local={})",
                request.target,
                remote_size,
                size
            );
        } else if request.resume {
            tracing::debug!("{} already exists, skipping", request.target);
            return Ok(TransferOutcome {
                bytes_transferred: size,
                skipped: true,
            });
        } else if !request.overwrite {
            return Err(Error::AlreadyExists {
                target: request.target.to_string(),
            });
        }
    }
    if let Some(dir) = target.parent_dir() {
        let mkdir = Command::new(&request.programs.ssh)
            .arg(host)
            .args(["mkdir", "-p"])
            .arg(crate::shell_escape(dir));
        runner.run(&mkdir).await?;
    }
    let copy = Command::new(&request.programs.scp)
        .arg(request.source)
        .arg(format!("{host}:{}", target.path()));
    runner.run(&copy).await?;
    Ok(TransferOutcome {
        bytes_transferred: size,
        skipped: false,
    })
}

async fn probe_remote_size<R: Runner>(
    runner: &R,
    programs: &Programs,
    host: &str,
    path: &str,
) -> Option<u64> {
    let stat = Command::new(&programs.ssh)
        .arg(host)
        .args(["stat", "-c", "%s"])
        .arg(crate::shell_escape(path));
    match runner.run(&stat).await {
        Ok(out) => match out.trim().parse::<u64>() {
            Ok(remote_size) => Some(remote_size),
            Err(error) => {
                tracing::debug!("unexpected stat output {out:?} for {host}:{path}: {error}");
                None
            }
        },
        Err(error) => {
            tracing::debug!("remote probe failed, treating {host}:{path} as absent: {error}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{MockRunner, process_error};
    use tracing_test::traced_test;

    const TARGET: &str = "ssh://hostA:/remote/dir/data.bin";

    fn source_file(dir: &tempfile::TempDir, size: usize) -> std::path::PathBuf {
        let path = dir.path().join("data.bin");
        std::fs::write(&path, vec![1u8; size]).unwrap();
        path
    }

    /// Answers `stat` with `remote_size` (or a failure when absent), everything else succeeds.
    fn remote_with(remote_size: Option<u64>) -> MockRunner {
        MockRunner::with_responder(move |command| {
            let is_stat = command.get_args().iter().any(|arg| arg == "stat");
            match (is_stat, remote_size) {
                (true, Some(size)) => Ok(format!("{size}\n")),
                (true, None) => Err(process_error(
                    command,
                    1,
                    "stat: cannot statx '/remote/dir/data.bin': No such file or directory",
                )),
                (false, _) => Ok(String::new()),
            }
        })
    }

    async fn run_case(
        remote_size: Option<u64>,
        resume: bool,
        overwrite: bool,
    ) -> (Result<TransferOutcome, Error>, MockRunner) {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(&dir, 100);
        let programs = Programs::default();
        let runner = remote_with(remote_size);
        let request = Request {
            source: &source,
            target: TARGET,
            overwrite,
            resume,
            verbosity: 1,
            programs: &programs,
        };
        let result = transfer_file(&runner, &request).await;
        (result, runner)
    }

    #[tokio::test]
    async fn absent_remote_is_copied() {
        for (resume, overwrite) in [(false, false), (true, false), (false, true), (true, true)] {
            let (result, runner) = run_case(None, resume, overwrite).await;
            assert_eq!(
                result.unwrap(),
                TransferOutcome {
                    bytes_transferred: 100,
                    skipped: false
                }
            );
            let calls = runner.calls();
            assert_eq!(calls.len(), 3);
            assert_eq!(
                calls[1].to_string(),
                "ssh hostA mkdir -p /remote/dir",
                "directory is ensured before the copy"
            );
            assert_eq!(runner.calls_to("scp").len(), 1);
        }
    }

    #[tokio::test]
    async fn matching_size_with_resume_is_skipped() {
        for overwrite in [false, true] {
            let (result, runner) = run_case(Some(100), true, overwrite).await;
            assert_eq!(
                result.unwrap(),
                TransferOutcome {
                    bytes_transferred: 100,
                    skipped: true
                }
            );
            assert_eq!(runner.call_count(), 1, "only the probe runs");
            assert!(runner.calls_to("scp").is_empty());
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn different_size_is_warned_and_reuploaded() {
        let (result, runner) = run_case(Some(50), true, false).await;
        assert_eq!(result.unwrap().bytes_transferred, 100);
        assert_eq!(runner.calls_to("scp").len(), 1);
        assert!(logs_contain("different size"));
        assert!(logs_contain("remote=50, local=100"));
        for (resume, overwrite) in [(false, false), (false, true), (true, true)] {
            let (result, runner) = run_case(Some(50), resume, overwrite).await;
            assert!(result.is_ok());
            assert_eq!(runner.calls_to("scp").len(), 1);
        }
    }

    #[tokio::test]
    async fn matching_size_without_flags_already_exists() {
        let (result, runner) = run_case(Some(100), false, false).await;
        match result {
            Err(Error::AlreadyExists { target }) => assert_eq!(target, TARGET),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(runner.calls_to("scp").is_empty());
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn matching_size_with_overwrite_is_copied() {
        let (result, runner) = run_case(Some(100), false, true).await;
        assert!(!result.unwrap().skipped);
        assert_eq!(runner.calls_to("scp").len(), 1);
    }

    #[tokio::test]
    async fn unparsable_probe_output_counts_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(&dir, 100);
        let programs = Programs::default();
        let runner = MockRunner::with_responder(|_| Ok("Welcome to hostA!".to_string()));
        let request = Request {
            source: &source,
            target: TARGET,
            overwrite: false,
            resume: false,
            verbosity: 0,
            programs: &programs,
        };
        transfer_file(&runner, &request).await.unwrap();
        assert_eq!(runner.calls_to("scp").len(), 1);
    }

    #[tokio::test]
    async fn probe_quotes_remote_path() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(&dir, 3);
        let programs = Programs::default();
        let runner = remote_with(None);
        let request = Request {
            source: &source,
            target: "ssh://hostA:/data/a b/$x",
            overwrite: false,
            resume: false,
            verbosity: 0,
            programs: &programs,
        };
        transfer_file(&runner, &request).await.unwrap();
        let calls = runner.calls();
        assert_eq!(calls[0].get_args()[4], "'/data/a b/$x'");
        assert_eq!(calls[1].get_args()[3], "'/data/a b'");
        assert_eq!(calls[2].get_args()[1], "hostA:/data/a b/$x");
    }

    #[tokio::test]
    async fn multi_host_target_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(&dir, 3);
        let programs = Programs::default();
        let runner = MockRunner::new();
        let request = Request {
            source: &source,
            target: "ssh://hostA+hostB:/d/f",
            overwrite: false,
            resume: false,
            verbosity: 0,
            programs: &programs,
        };
        let error = transfer_file(&runner, &request).await.unwrap_err();
        assert!(matches!(error, Error::InvalidTarget { .. }), "{error:?}");
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn copy_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(&dir, 3);
        let programs = Programs::default();
        let runner = MockRunner::with_responder(|command| {
            let is_stat = command.get_args().iter().any(|arg| arg == "stat");
            if command.get_program() == "scp" {
                Err(process_error(command, 1, "scp: Permission denied"))
            } else if is_stat {
                Err(process_error(command, 1, "No such file or directory"))
            } else {
                Ok(String::new())
            }
        });
        let request = Request {
            source: &source,
            target: "ssh://hostA:/d/f",
            overwrite: false,
            resume: false,
            verbosity: 0,
            programs: &programs,
        };
        let error = transfer_file(&runner, &request).await.unwrap_err();
        assert!(error.to_string().contains("Permission denied"), "{error}");
    }
}
