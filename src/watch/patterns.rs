// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::RecursiveMode;

/// Compiled include/exclude glob patterns.
///
/// Patterns are relative to the project root; callers pass relative,
/// forward-slash paths (e.g. `"app/style/app.less"`) into [`matches`].
///
/// [`matches`]: PathMatcher::matches
#[derive(Clone)]
pub struct PathMatcher {
    include: GlobSet,
    exclude: Option<GlobSet>,
}

impl fmt::Debug for PathMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathMatcher")
            .field("include", &self.include.len())
            .field("exclude", &self.exclude.as_ref().map(GlobSet::len))
            .finish()
    }
}

impl PathMatcher {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, globset::Error> {
        let include = build_globset(include)?;
        let exclude = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude)?)
        };
        Ok(Self { include, exclude })
    }

    /// True if `rel_path` is included and not excluded.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.include.is_match(rel_path) && !self.is_excluded(rel_path)
    }

    pub fn is_excluded(&self, rel_path: &str) -> bool {
        self.exclude
            .as_ref()
            .is_some_and(|exclude| exclude.is_match(rel_path))
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(Glob::new(pat)?);
    }
    builder.build()
}

fn has_glob_meta(component: &str) -> bool {
    component.contains(['*', '?', '[', '{'])
}

/// Split a pattern into its literal directory prefix and whether the whole
/// pattern is literal.
///
/// `"app/**/*.elm"` -> `("app", false)`, `"app/server.js"` -> `("app/server.js", true)`.
fn literal_prefix(pattern: &str) -> (String, bool) {
    let mut parts = Vec::new();
    for component in pattern.split('/') {
        if has_glob_meta(component) {
            return (parts.join("/"), false);
        }
        if !component.is_empty() && component != "." {
            parts.push(component);
        }
    }
    (parts.join("/"), true)
}

fn nearest_existing(root: &Path, mut dir: PathBuf) -> PathBuf {
    while !dir.is_dir() {
        match dir.parent() {
            Some(parent) if parent.starts_with(root) => dir = parent.to_path_buf(),
            _ => return root.to_path_buf(),
        }
    }
    dir
}

/// Directories to register with the OS watcher for the given patterns.
///
/// - A fully literal pattern watches its parent directory non-recursively.
/// - A glob pattern watches its literal prefix directory recursively.
/// - Missing directories fall back to the nearest existing ancestor, watched
///   recursively so the target is seen once it is created.
///
/// Directories already covered by a recursive root are dropped.
pub fn watch_roots(root: &Path, patterns: &[String]) -> Vec<(PathBuf, RecursiveMode)> {
    let mut roots: Vec<(PathBuf, RecursiveMode)> = Vec::new();

    for pattern in patterns {
        let (prefix, literal) = literal_prefix(pattern);
        let target = root.join(&prefix);
        let (dir, mode) = if literal {
            let parent = target.parent().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            (parent, RecursiveMode::NonRecursive)
        } else {
            (target, RecursiveMode::Recursive)
        };

        let existing = nearest_existing(root, dir.clone());
        let mode = if existing == dir { mode } else { RecursiveMode::Recursive };

        match roots.iter_mut().find(|(d, _)| *d == existing) {
            Some(entry) => {
                if mode == RecursiveMode::Recursive {
                    entry.1 = RecursiveMode::Recursive;
                }
            }
            None => roots.push((existing, mode)),
        }
    }

    let recursive: Vec<PathBuf> = roots
        .iter()
        .filter(|(_, m)| *m == RecursiveMode::Recursive)
        .map(|(d, _)| d.clone())
        .collect();

    roots.retain(|(dir, _)| {
        !recursive
            .iter()
            .any(|r| r != dir && dir.starts_with(r))
    });
    roots.sort_by(|a, b| a.0.cmp(&b.0));
    roots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exclude_wins_over_include() {
        let m = PathMatcher::new(
            &strings(&["app/**"]),
            &strings(&["app/elm", "app/elm/**", "app/style", "app/style/**"]),
        )
        .unwrap();
        assert!(m.matches("app/index.html"));
        assert!(m.matches("app/server.js"));
        assert!(!m.matches("app/elm/Main.elm"));
        assert!(!m.matches("app/style/app.less"));
        assert!(m.is_excluded("app/elm"));
    }

    #[test]
    fn star_star_crosses_directories() {
        let m = PathMatcher::new(&strings(&["app/style/**/*.less"]), &[]).unwrap();
        assert!(m.matches("app/style/app.less"));
        assert!(m.matches("app/style/parts/nav.less"));
        assert!(!m.matches("app/style/app.css"));
    }

    #[test]
    fn literal_prefix_splits_at_first_glob() {
        assert_eq!(literal_prefix("app/**/*.elm"), ("app".to_string(), false));
        assert_eq!(literal_prefix("app/server.js"), ("app/server.js".to_string(), true));
        assert_eq!(literal_prefix("./app/js/*.ts"), ("app/js".to_string(), false));
        assert_eq!(literal_prefix("**/*.less"), (String::new(), false));
    }

    #[test]
    fn watch_roots_follow_pattern_shape() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("app/style")).unwrap();

        let roots = watch_roots(root, &strings(&["app/server.js"]));
        assert_eq!(roots, vec![(root.join("app"), RecursiveMode::NonRecursive)]);

        let roots = watch_roots(root, &strings(&["app/style/**/*.less"]));
        assert_eq!(roots, vec![(root.join("app/style"), RecursiveMode::Recursive)]);
    }

    #[test]
    fn missing_directory_falls_back_to_existing_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("app")).unwrap();

        let roots = watch_roots(root, &strings(&["app/elm/**/*.elm"]));
        assert_eq!(roots, vec![(root.join("app"), RecursiveMode::Recursive)]);
    }

    #[test]
    fn nested_roots_collapse_into_recursive_parent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("app/js")).unwrap();

        let roots = watch_roots(root, &strings(&["app/**", "app/js/**/*.ts", "app/server.js"]));
        assert_eq!(roots, vec![(root.join("app"), RecursiveMode::Recursive)]);
    }
}
