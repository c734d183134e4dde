//! SCP-style dependency references.
//!
//! A reference names a remote repository the way `scp` and `git` do:
//!
//! ```text
//! [user@]host:path[#ref]
//! git@github.com:u-root/u-root
//! git@github.com:u-root/cpu#main
//! git@[git.example.com:2222]:tools/thing
//! ```
//!
//! Resolution is pure: no network, no filesystem.

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::SourceryError;

/// A parsed reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// The string as given, including any `#ref` suffix.
    pub raw: String,
    pub user: Option<String>,
    /// Hostname without port.
    pub host: String,
    pub port: Option<u16>,
    /// Repository path as written after the `:`.
    pub path: String,
    /// Parent directory of `path`, `.` when there is none.
    pub dir: String,
    /// Final segment of `path`.
    pub leaf: String,
    /// Branch or tag to check out.
    pub git_ref: Option<String>,
}

impl Reference {
    /// What `git clone` is given: the reference without its `#ref` suffix.
    pub fn url(&self) -> &str {
        match self.raw.find('#') {
            Some(i) => &self.raw[..i],
            None => &self.raw,
        }
    }

    /// `host/dir/leaf`, the canonical module identity and clone destination.
    pub fn identity(&self) -> PathBuf {
        let mut p = PathBuf::from(&self.host);
        for part in self.dir.split('/') {
            if !part.is_empty() && part != "." {
                p.push(part);
            }
        }
        p.push(&self.leaf);
        p
    }

    /// [`Reference::identity`] as a module name.
    pub fn module_name(&self) -> String {
        self.identity().to_string_lossy().into_owned()
    }
}

fn scp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:(?P<user>[A-Za-z0-9._~-]+)@)?(?P<host>\[[^\]]+\]|[A-Za-z0-9._-]+):(?P<path>[A-Za-z0-9._~/+-]+?)(?:#(?P<gref>[A-Za-z0-9._/+-]+))?$",
        )
        .expect("static regex")
    })
}

/// Parse one reference.
pub fn resolve(raw: &str) -> Result<Reference, SourceryError> {
    let fail = |reason: &str| SourceryError::Parse {
        reference: raw.to_string(),
        reason: reason.to_string(),
    };

    let raw = raw.trim();
    if !raw.contains(':') {
        return Err(fail("no ':' separating host from path"));
    }
    let caps = scp_regex()
        .captures(raw)
        .ok_or_else(|| fail("not an scp-style [user@]host:path reference"))?;

    let path = caps["path"].to_string();
    if path.starts_with("//") {
        return Err(fail("looks like a URL, not an scp-style reference"));
    }

    let host_field = caps["host"].trim_start_matches('[').trim_end_matches(']');
    let (host, port) = split_host_port(host_field);

    let trimmed = path.trim_end_matches('/');
    let (dir, leaf) = match trimmed.rfind('/') {
        Some(0) => ("/".to_string(), trimmed[1..].to_string()),
        Some(i) => (trimmed[..i].to_string(), trimmed[i + 1..].to_string()),
        None => (".".to_string(), trimmed.to_string()),
    };
    if leaf.is_empty() || leaf == "." || leaf == ".." {
        return Err(fail("path has no final segment"));
    }

    Ok(Reference {
        raw: raw.to_string(),
        user: caps.name("user").map(|m| m.as_str().to_string()),
        host,
        port,
        path,
        dir,
        leaf,
        git_ref: caps.name("gref").map(|m| m.as_str().to_string()),
    })
}

/// Split `host:port`. Anything that does not split cleanly is all host.
fn split_host_port(field: &str) -> (String, Option<u16>) {
    if let Some((host, port)) = field.split_once(':') {
        if !host.is_empty() && !port.contains(':') {
            if let Ok(port) = port.parse::<u16>() {
                return (host.to_string(), Some(port));
            }
        }
    }
    (field.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_reference() {
        let r = resolve("git@github.com:u-root/sourcery").unwrap();
        assert_eq!(r.user.as_deref(), Some("git"));
        assert_eq!(r.host, "github.com");
        assert_eq!(r.port, None);
        assert_eq!(r.dir, "u-root");
        assert_eq!(r.leaf, "sourcery");
        assert_eq!(r.git_ref, None);
        assert_eq!(r.url(), "git@github.com:u-root/sourcery");
        assert_eq!(r.module_name(), "github.com/u-root/sourcery");
    }

    #[test]
    fn test_branch_qualified() {
        let r = resolve("git@github.com:u-root/cpu#v0.1").unwrap();
        assert_eq!(r.leaf, "cpu");
        assert_eq!(r.git_ref.as_deref(), Some("v0.1"));
        assert_eq!(r.url(), "git@github.com:u-root/cpu");
        assert_eq!(r.identity(), PathBuf::from("github.com/u-root/cpu"));
    }

    #[test]
    fn test_nested_path_and_no_user() {
        let r = resolve("example.org:a/b/c/tool/").unwrap();
        assert_eq!(r.user, None);
        assert_eq!(r.dir, "a/b/c");
        assert_eq!(r.leaf, "tool");
        assert_eq!(r.module_name(), "example.org/a/b/c/tool");
    }

    #[test]
    fn test_single_segment_path() {
        let r = resolve("host:repo").unwrap();
        assert_eq!(r.dir, ".");
        assert_eq!(r.leaf, "repo");
        assert_eq!(r.module_name(), "host/repo");
    }

    #[test]
    fn test_absolute_path() {
        let r = resolve("me@box:/srv/git/thing").unwrap();
        assert_eq!(r.dir, "/srv/git");
        assert_eq!(r.module_name(), "box/srv/git/thing");
    }

    #[test]
    fn test_bracketed_host_with_port() {
        let r = resolve("git@[git.example.com:2222]:tools/thing").unwrap();
        assert_eq!(r.host, "git.example.com");
        assert_eq!(r.port, Some(2222));
        assert_eq!(r.module_name(), "git.example.com/tools/thing");
    }

    #[test]
    fn test_unsplittable_host_is_kept_whole() {
        let r = resolve("git@[::1]:repo").unwrap();
        assert_eq!(r.host, "::1");
        assert_eq!(r.port, None);

        let r = resolve("git@[box:notaport]:repo").unwrap();
        assert_eq!(r.host, "box:notaport");
        assert_eq!(r.port, None);
    }

    #[test]
    fn test_deterministic() {
        let a = resolve("git@github.com:nsf/godit").unwrap();
        let b = resolve("git@github.com:nsf/godit").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_malformed_is_parse_error() {
        for bad in [
            "github.com/u-root/u-root",
            "",
            "git@github.com:",
            "https://github.com/u-root/u-root",
            "host:..",
            "bad host:path",
        ] {
            match resolve(bad) {
                Err(SourceryError::Parse { .. }) => {}
                other => panic!("{:?} should be a parse error, got {:?}", bad, other),
            }
        }
    }
}
