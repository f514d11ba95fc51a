//! Path helpers

use std::path::PathBuf;

/// Expand `~` and make relative paths absolute against the working directory
///
/// `~/.viewledger/viewledger.json` becomes `$HOME/.viewledger/viewledger.json`,
/// `data/viewledger.json` becomes `$PWD/data/viewledger.json`. Absolute paths
/// pass through unchanged. An empty string resolves to the working directory.
pub fn expand_path(path: &str) -> PathBuf {
    let path = path.trim();
    let cwd = || std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    if path.is_empty() {
        return cwd();
    }

    let expanded = match (path, dirs::home_dir()) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    };

    if expanded.is_relative() {
        cwd().join(expanded)
    } else {
        expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_path_absolute() {
        assert_eq!(
            expand_path("/etc/viewledger.json"),
            PathBuf::from("/etc/viewledger.json")
        );
    }

    #[test]
    fn test_expand_path_relative() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(expand_path("viewledger.json"), cwd.join("viewledger.json"));
        assert_eq!(expand_path("  ../cfg  "), cwd.join("../cfg"));
    }

    #[test]
    fn test_expand_path_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~"), home);
            assert_eq!(expand_path("~/.viewledger"), home.join(".viewledger"));
        }
    }

    #[test]
    fn test_expand_path_empty() {
        assert_eq!(expand_path(""), std::env::current_dir().unwrap());
    }
}
