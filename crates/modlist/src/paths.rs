//! Relative path helpers
//!
//! Paths stored in a modlist are relative, `/`-separated strings regardless of
//! the platform the list was compiled on.

use std::path::{Component, Path, PathBuf};

/// Convert a path relative to `root` into modlist form (`a/b/c`)
pub fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let stripped = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = stripped
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Normalize separators and strip leading/trailing slashes
pub fn normalize(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether `relative` is a plain modlist path that stays inside its root:
/// non-empty, `/`-separated, not absolute, no drive prefix and no `.`/`..`
pub fn is_safe_relative(relative: &str) -> bool {
    !relative.is_empty()
        && !relative.contains(['\\', ':', '\0'])
        && relative
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..")
}

/// Resolve a modlist-relative path under an on-disk root
pub fn join(root: &Path, relative: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for part in relative.split('/').filter(|p| !p.is_empty()) {
        path.push(part);
    }
    path
}

/// Last path component
pub fn file_name(relative: &str) -> &str {
    relative.rsplit('/').next().unwrap_or(relative)
}

/// Lowercase extension including the dot, e.g. `.esm`
pub fn extension(relative: &str) -> Option<String> {
    let name = file_name(relative);
    name.rfind('.')
        .filter(|&i| i > 0)
        .map(|i| name[i..].to_ascii_lowercase())
}

/// True when `relative` lives inside directory `dir` (both modlist form)
pub fn is_under(relative: &str, dir: &str) -> bool {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        return true;
    }
    relative.len() > dir.len()
        && relative.as_bytes()[dir.len()] == b'/'
        && relative[..dir.len()].eq_ignore_ascii_case(dir)
}

/// Number of trailing components two paths share, compared case-insensitively
pub fn common_suffix_len(a: &str, b: &str) -> usize {
    a.rsplit('/')
        .zip(b.rsplit('/'))
        .take_while(|(x, y)| x.eq_ignore_ascii_case(y))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_windows_style() {
        assert_eq!(normalize("\\baz\\biz.pex"), "baz/biz.pex");
        assert_eq!(normalize("/baz//./foo.ini"), "baz/foo.ini");
    }

    #[test]
    fn test_is_safe_relative() {
        assert!(is_safe_relative("mods/Test Mod/Data/test.pex"));
        assert!(is_safe_relative("a..b/c."));
        for bad in ["", "/etc/passwd", "../escaped.txt", "mods/../../x", "mods/./x", "mods//x", "mods/x/", "C:/Windows/x", "mods\\x"] {
            assert!(!is_safe_relative(bad), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_is_under() {
        assert!(is_under("Game Folder Files/enbstuff/test.pex", "Game Folder Files"));
        assert!(is_under("mods/Foo/a.txt", "mods/foo/"));
        assert!(!is_under("mods/Foobar/a.txt", "mods/Foo"));
        assert!(!is_under("mods", "mods"));
    }

    #[test]
    fn test_extension_and_suffix() {
        assert_eq!(extension("Data/Update.ESM").as_deref(), Some(".esm"));
        assert_eq!(extension("Data/.hidden"), None);
        assert_eq!(common_suffix_len("mods/A/Data/scripts/x.pex", "Data/Scripts/x.pex"), 3);
        assert_eq!(common_suffix_len("a/x.pex", "b/y.pex"), 0);
    }

    #[test]
    fn test_relative_to_and_join() {
        let root = Path::new("/tmp/root");
        let rel = relative_to(root, &root.join("mods").join("m").join("f.txt")).unwrap();
        assert_eq!(rel, "mods/m/f.txt");
        assert_eq!(join(root, &rel), root.join("mods").join("m").join("f.txt"));
        assert_eq!(relative_to(root, root), None);
    }
}
