//! Output file names.
//!
//! Every artifact of one request shares a stem: the source file stem, plus
//! `_<prefix>` when a prefix was given. The prefix appears once per name.

use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::error::VariationError;

/// Names for the files one request writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactNames {
    stem: String,
}

impl ArtifactNames {
    /// Derives the shared stem from the source image path and the prefix.
    pub fn new(source: &Path, prefix: &str) -> Result<Self, VariationError> {
        let base = source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| {
                VariationError::input(format!("{} has no file name", source.display()))
            })?;

        let prefix = prefix.trim();
        if prefix.contains(['/', '\\']) {
            return Err(VariationError::input(format!(
                "file name prefix can't contain path separators: {prefix}"
            )));
        }
        let stem = if prefix.is_empty() {
            base
        } else {
            format!("{base}_{prefix}")
        };
        if !is_single_file_name(&stem) {
            return Err(VariationError::input(format!(
                "{stem} isn't usable as a file name"
            )));
        }
        Ok(Self { stem })
    }

    /// Shared stem of all artifact names.
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// `<stem>.json`
    pub fn record_file_name(&self) -> String {
        format!("{}.json", self.stem)
    }

    /// `<stem>_<last url path segment>`, or `<stem>_variation-<n>.png` when
    /// the URL has no usable last segment.
    pub fn image_file_name(&self, url: &str, index: usize) -> String {
        let tail = url_tail(url).unwrap_or_else(|| format!("variation-{}.png", index + 1));
        format!("{}_{tail}", self.stem)
    }

    /// Record path inside `dir`.
    pub fn record_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.record_file_name())
    }

    /// Image path inside `dir`.
    pub fn image_path(&self, dir: &Path, url: &str, index: usize) -> PathBuf {
        dir.join(self.image_file_name(url, index))
    }
}

fn is_single_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains('\0')
}

fn url_tail(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let tail = url.path_segments()?.next_back()?;
    (!tail.is_empty()).then(|| tail.to_string())
}
