//! Upload targets of the form `ssh://HOST[+HOST...]:PATH`

use rand::seq::SliceRandom;

use crate::Error;

pub const SCHEME: &str = "ssh://";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    host_spec: String,
    path: String,
}

impl Target {
    pub fn parse(target: &str) -> Result<Self, Error> {
        let rest = target
            .strip_prefix(SCHEME)
            .ok_or_else(|| Error::invalid_target(target, format!("must start with '{SCHEME}'")))?;
        let (host_spec, path) = rest.split_once(':').ok_or_else(|| {
            Error::invalid_target(target, "expected ':' between host and path")
        })?;
        if path.contains(':') {
            return Err(Error::invalid_target(
                target,
                "host and path must be separated by exactly one ':'",
            ));
        }
        if path.is_empty() {
            return Err(Error::invalid_target(target, "remote path is empty"));
        }
        if host_spec.split('+').any(str::is_empty) {
            return Err(Error::invalid_target(target, "empty host name"));
        }
        Ok(Self {
            host_spec: host_spec.to_string(),
            path: path.to_string(),
        })
    }

    pub fn host_spec(&self) -> &str {
        &self.host_spec
    }

    pub fn hosts(&self) -> Vec<&str> {
        self.host_spec.split('+').collect()
    }

    pub fn is_multi_host(&self) -> bool {
        self.host_spec.contains('+')
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Picks one of the candidate hosts, independently on every call.
    pub fn select_host(&self) -> &str {
        select_host(&self.host_spec)
    }

    /// Directory the remote file lands in, `None` when the path has no directory component.
    ///
    /// Everything before the last `/`, so a trailing slash names the directory itself.
    pub fn parent_dir(&self) -> Option<&str> {
        match self.path.rfind('/') {
            Some(0) => Some("/"),
            Some(pos) => Some(&self.path[..pos]),
            None => None,
        }
    }
}

/// Resolves a host spec to a single host: returned unchanged unless it lists `+`-joined
/// candidates, in which case one is chosen uniformly at random on every call.
pub fn select_host(spec: &str) -> &str {
    if !spec.contains('+') {
        return spec;
    }
    let candidates: Vec<&str> = spec.split('+').collect();
    candidates
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(spec)
}

/// Appends a relative path to a target string, keeping its host spec intact.
///
/// Paths that are not valid UTF-8 are rejected rather than uploaded under a lossy name.
pub fn join_target(target: &str, relative: &std::path::Path) -> Result<String, Error> {
    let Some(relative) = relative.to_str() else {
        return Err(Error::invalid_target(
            &format!("{target}/{}", relative.to_string_lossy()),
            format!("file name {relative:?} is not valid UTF-8"),
        ));
    };
    Ok(format!(
        "{}/{}",
        target.trim_end_matches('/'),
        relative.trim_start_matches('/')
    ))
}
