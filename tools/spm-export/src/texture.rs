//! Texture lookup for decoded materials
//!
//! A texture name is resolved, in order, against the names the caller has
//! already loaded, the directory of the SPM file, and finally a recursive
//! walk of an extra search path. Unresolved names get a placeholder.

use hashbrown::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Where a texture name was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureSource {
    /// Already loaded by the caller
    Loaded,
    File(PathBuf),
    /// Not found; the caller substitutes a placeholder image
    Placeholder,
}

#[derive(Debug, Clone, Default)]
pub struct TextureResolver {
    loaded: HashSet<String>,
    working_dir: Option<PathBuf>,
    search_path: Option<PathBuf>,
}

impl TextureResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of images the caller already has
    pub fn with_loaded<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.loaded.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    pub fn resolve(&self, name: &str) -> TextureSource {
        if self.loaded.contains(name) {
            return TextureSource::Loaded;
        }
        if let Some(dir) = &self.working_dir {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return TextureSource::File(candidate);
            }
        }
        self.search_path
            .as_deref()
            .and_then(|root| find_recursive(root, name))
            .map_or(TextureSource::Placeholder, TextureSource::File)
    }
}

fn find_recursive(root: &Path, name: &str) -> Option<PathBuf> {
    let wanted = OsStr::new(name);
    WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .find(|entry| entry.file_type().is_file() && entry.file_name() == wanted)
        .map(|entry| entry.into_path())
}
