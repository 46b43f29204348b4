//! screen/denylist.rs
//!
//! Fixed deny-lists consulted by the pre-screener.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    OsAccess,
    ProcessSpawn,
    Networking,
    FileSystem,
    DynamicImport,
    CompatShim,
    DynamicEval,
    DynamicExec,
    FileOpen,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::OsAccess => "operating-system access",
            Capability::ProcessSpawn => "process spawning",
            Capability::Networking => "networking",
            Capability::FileSystem => "file-system access",
            Capability::DynamicImport => "dynamic import",
            Capability::CompatShim => "environment-compatibility shim",
            Capability::DynamicEval => "dynamic evaluation",
            Capability::DynamicExec => "dynamic execution",
            Capability::FileOpen => "direct file access",
        };
        f.write_str(s)
    }
}

/// Modules matched against every dotted prefix of an imported path,
/// so `os` catches `os.path` and `asyncio.subprocess` catches itself
/// without banning the rest of `asyncio`.
pub const DENIED_MODULES: &[(&str, Capability)] = &[
    ("os", Capability::OsAccess),
    ("sys", Capability::OsAccess),
    ("ctypes", Capability::OsAccess),
    ("subprocess", Capability::ProcessSpawn),
    ("multiprocessing", Capability::ProcessSpawn),
    ("asyncio.subprocess", Capability::ProcessSpawn),
    ("socket", Capability::Networking),
    ("urllib", Capability::Networking),
    ("requests", Capability::Networking),
    ("http", Capability::Networking),
    ("shutil", Capability::FileSystem),
    ("glob", Capability::FileSystem),
    ("pathlib", Capability::FileSystem),
    ("tempfile", Capability::FileSystem),
    ("importlib", Capability::DynamicImport),
    ("__future__", Capability::CompatShim),
];

/// Raw substrings, matched case-insensitively anywhere in the source.
pub const DENIED_TOKENS: &[(&str, Capability)] = &[
    ("eval", Capability::DynamicEval),
    ("exec", Capability::DynamicExec),
    ("__import__", Capability::DynamicImport),
    ("open(", Capability::FileOpen),
];

pub fn denied_module(path: &str) -> Option<(&'static str, Capability)> {
    let segments: Vec<&str> = path.split('.').map(str::trim).collect();

    for end in 1..=segments.len() {
        let prefix = segments[..end].join(".");
        if let Some(hit) = DENIED_MODULES.iter().find(|(name, _)| *name == prefix) {
            return Some(*hit);
        }
    }

    None
}

/// Earliest denied token in the source, if any.
pub fn denied_token(source: &str) -> Option<(&'static str, Capability)> {
    let lower = source.to_lowercase();

    DENIED_TOKENS
        .iter()
        .filter_map(|(tok, cap)| lower.find(tok).map(|at| (at, *tok, *cap)))
        .min_by_key(|(at, _, _)| *at)
        .map(|(_, tok, cap)| (tok, cap))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_prefixes() {
        assert_eq!(denied_module("os"), Some(("os", Capability::OsAccess)));
        assert_eq!(denied_module("os.path"), Some(("os", Capability::OsAccess)));
        assert_eq!(
            denied_module("asyncio.subprocess"),
            Some(("asyncio.subprocess", Capability::ProcessSpawn))
        );
        assert_eq!(denied_module("asyncio"), None);
        assert_eq!(denied_module("math"), None);
        assert_eq!(denied_module("osmosis"), None);
    }

    #[test]
    fn tokens_are_case_insensitive_and_ordered_by_position() {
        assert_eq!(
            denied_token("x = EVAL('1')"),
            Some(("eval", Capability::DynamicEval))
        );
        assert_eq!(
            denied_token("f = open ('x')\ny = exec"),
            Some(("exec", Capability::DynamicExec))
        );
        assert_eq!(
            denied_token("exec('a'); eval('b')"),
            Some(("exec", Capability::DynamicExec))
        );
        assert_eq!(denied_token("def solution(a, b):\n    return a + b\n"), None);
    }
}
