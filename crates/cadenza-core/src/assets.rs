//! Asset lookup.
//!
//! Track ids are file base-names. A locator answers "is there a file for
//! this name with this extension"; `resolve_asset` walks the supported
//! extensions in priority order and stops at the first hit.

use std::path::{Path, PathBuf};

/// Supported extensions, highest priority first.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "aac", "ac3", "m4a", "caf"];

pub trait AssetLocator: Send + Sync {
    fn locate(&self, name: &str, extension: &str) -> Option<PathBuf>;
}

/// Looks for `<root>/<name>.<extension>`, like an app bundle's resource directory.
#[derive(Debug, Clone)]
pub struct DirLocator {
    root: PathBuf,
}

impl DirLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetLocator for DirLocator {
    fn locate(&self, name: &str, extension: &str) -> Option<PathBuf> {
        // Names with separators would escape the resource directory
        if name.contains(&['/', '\\'][..]) || name == ".." {
            return None;
        }
        let path = self.root.join(format!("{}.{}", name, extension));
        path.is_file().then_some(path)
    }
}

/// First file found for `name` across `SUPPORTED_EXTENSIONS`.
pub fn resolve_asset(locator: &dyn AssetLocator, name: &str) -> Option<PathBuf> {
    SUPPORTED_EXTENSIONS
        .iter()
        .find_map(|ext| locator.locate(name, ext))
}
