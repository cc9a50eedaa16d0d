//! Project-relative path strings.
//!
//! Every file is identified by a forward-slash path relative to the project
//! root (`src/utils/format.ts`). These helpers keep that form canonical.

use std::path::Path;

/// Normalize a path string to use forward slashes.
#[inline]
pub fn normalize_path_string(path: &str) -> String {
    path.replace('\\', "/")
}

/// Convert a Path to a normalized string (forward slashes).
#[inline]
pub fn path_to_normalized_string(path: &Path) -> String {
    normalize_path_string(&path.display().to_string())
}

/// Path of `path` relative to `root`, normalized. Falls back to the full path.
pub fn relative_to(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    path_to_normalized_string(rel)
}

/// Directory part of a project-relative path (`""` for top-level files).
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}

/// File name without directories.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// File name without its (last) extension.
pub fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(i) => &name[..i],
    }
}

/// Extension without the dot, if any.
pub fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(i) => Some(&name[i + 1..]),
    }
}

/// Join `rel` onto `dir` and collapse `.` / `..` segments.
///
/// Returns `None` when `..` would climb above the project root.
pub fn join_normalized(dir: &str, rel: &str) -> Option<String> {
    let mut parts: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for seg in rel.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_backslashes() {
        assert_eq!(normalize_path_string(r"src\a\b.ts"), "src/a/b.ts");
    }

    #[test]
    fn test_relative_to_root() {
        let root = Path::new("/proj");
        assert_eq!(relative_to(root, Path::new("/proj/src/a.ts")), "src/a.ts");
    }

    #[test]
    fn test_parent_and_stem() {
        assert_eq!(parent_dir("src/utils/a.ts"), "src/utils");
        assert_eq!(parent_dir("a.ts"), "");
        assert_eq!(file_stem("src/index.d.ts"), "index.d");
        assert_eq!(file_stem("src/.eslintrc"), ".eslintrc");
        assert_eq!(extension("src/a.tsx"), Some("tsx"));
        assert_eq!(extension("Makefile"), None);
    }

    #[test]
    fn test_join_normalized() {
        assert_eq!(join_normalized("src/a", "./b").as_deref(), Some("src/a/b"));
        assert_eq!(join_normalized("src/a", "../c/d").as_deref(), Some("src/c/d"));
        assert_eq!(join_normalized("", "./x").as_deref(), Some("x"));
        assert_eq!(join_normalized("src", "../../x"), None);
    }
}
