//! Remote-copy plumbing for the `rup` upload tool
//!
//! Files reach the remote host through external tools (`rsync`, `ssh`, `scp`) that are treated
//! as opaque collaborators: authentication and transport are entirely theirs. This crate builds
//! their command lines, runs them and interprets the outcome.
//!
//! - [`target`] parses `ssh://HOST[+HOST...]:PATH` targets and picks a host from multi-host specs.
//! - [`process`] runs commands through the [`Runner`] trait; tests substitute a recording runner.
//! - [`strategy`] implements "transfer one file to one remote target", once on top of rsync and
//!   once as an explicit probe-then-copy over ssh/scp.

pub mod error;
pub mod process;
pub mod strategy;
pub mod target;
#[cfg(any(test, feature = "testutils"))]
pub mod testutils;

pub use error::Error;
pub use process::{Command, Runner, SystemRunner};
pub use strategy::{Request, Strategy, TransferOutcome};
pub use target::{Target, select_host};

/// Names (or paths) of the external programs used for transfers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Programs {
    pub rsync: String,
    pub ssh: String,
    pub scp: String,
}

impl Default for Programs {
    fn default() -> Self {
        Self {
            rsync: "rsync".to_string(),
            ssh: "ssh".to_string(),
            scp: "scp".to_string(),
        }
    }
}

/// Quotes `word` for a POSIX shell; words made only of safe characters are returned as-is.
pub fn shell_escape(word: &str) -> String {
    let is_safe = |c: char| c.is_ascii_alphanumeric() || "_-./:@%+=,".contains(c);
    if !word.is_empty() && word.chars().all(is_safe) {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_words_are_unchanged() {
        assert_eq!(shell_escape("remote/dir-1/file_2.txt"), "remote/dir-1/file_2.txt");
        assert_eq!(shell_escape("user@host:/x"), "user@host:/x");
    }

    #[test]
    fn unsafe_words_are_quoted() {
        assert_eq!(shell_escape(""), "''");
        assert_eq!(shell_escape("a b"), "'a b'");
        assert_eq!(shell_escape("$(rm -rf ~)"), "'$(rm -rf ~)'");
        assert_eq!(shell_escape("it's"), r"'it'\''s'");
    }
}
