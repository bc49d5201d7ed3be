use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};

/// Gitignore-style exclude patterns anchored at the watched root.
#[derive(Debug)]
pub struct IgnoreEngine {
    root: PathBuf,
    matcher: Gitignore,
}

#[derive(Debug, Clone, Default)]
pub struct IgnoreOptions {
    /// Inline patterns, one gitignore line each
    pub patterns: Vec<String>,

    /// Paths to additional ignore files
    pub extra_ignore_files: Box<[PathBuf]>,
}

impl IgnoreEngine {
    /// Build an engine rooted at `root` from inline patterns and ignore files.
    pub fn new(root: &Path, options: IgnoreOptions) -> Result<Self, ignore::Error> {
        let mut builder = GitignoreBuilder::new(root);

        for pat in &options.patterns {
            builder.add_line(None, pat)?;
        }

        for path in &*options.extra_ignore_files {
            if let Some(err) = builder.add(path) {
                return Err(err);
            }
        }

        Ok(IgnoreEngine {
            root: root.to_path_buf(),
            matcher: builder.build()?,
        })
    }

    /// An engine that excludes nothing.
    pub fn empty(root: &Path) -> Self {
        IgnoreEngine {
            root: root.to_path_buf(),
            matcher: Gitignore::empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.matcher.is_empty()
    }

    /// Paths outside the root are never excluded.
    #[inline]
    #[must_use]
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        if self.matcher.is_empty() || !path.starts_with(&self.root) {
            return false;
        }

        self.matcher
            .matched_path_or_any_parents(path, is_dir)
            .is_ignore()
    }
}

#[cfg(test)]
#[path = "excludes_tests.rs"]
mod tests;
