//! Request and result types for the variation workflow.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::constants::{DEFAULT_VARIATIONS, MAX_VARIATIONS, MIN_VARIATIONS};
use crate::error::VariationError;

/// Size of the generated images.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum ImageSize {
    /// 256x256 pixels.
    #[default]
    #[serde(rename = "256x256")]
    Small,
    /// 512x512 pixels.
    #[serde(rename = "512x512")]
    Medium,
    /// 1024x1024 pixels.
    #[serde(rename = "1024x1024")]
    Large,
}

impl ImageSize {
    /// Value sent in the `size` form field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Small => "256x256",
            Self::Medium => "512x512",
            Self::Large => "1024x1024",
        }
    }

    /// Edge length in pixels, the images are square.
    pub fn pixels(self) -> u32 {
        match self {
            Self::Small => 256,
            Self::Medium => 512,
            Self::Large => 1024,
        }
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of variations to create, always within the API's bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VariationCount(u8);

impl VariationCount {
    /// Checks `count` against the accepted range.
    pub fn new(count: u8) -> Result<Self, VariationError> {
        if (MIN_VARIATIONS..=MAX_VARIATIONS).contains(&count) {
            Ok(Self(count))
        } else {
            Err(VariationError::input(format!(
                "variation count must be between {MIN_VARIATIONS} and {MAX_VARIATIONS}, got {count}"
            )))
        }
    }

    /// The count.
    pub fn get(self) -> u8 {
        self.0
    }
}

/// One "make variations of this image" request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariationRequest {
    /// PNG to vary.
    pub source_image_path: PathBuf,
    /// How many variations to ask for.
    pub count: u8,
    /// Size of the generated images.
    pub size: ImageSize,
    /// Added to every output file name when not empty.
    pub filename_prefix: String,
}

impl VariationRequest {
    /// A request for the default number of small variations of `source_image_path`.
    pub fn new(source_image_path: impl Into<PathBuf>) -> Self {
        Self {
            source_image_path: source_image_path.into(),
            count: DEFAULT_VARIATIONS,
            size: ImageSize::default(),
            filename_prefix: String::new(),
        }
    }

    /// Sets the number of variations.
    pub fn with_count(mut self, count: u8) -> Self {
        self.count = count;
        self
    }

    /// Sets the image size.
    pub fn with_size(mut self, size: ImageSize) -> Self {
        self.size = size;
        self
    }

    /// Sets the file name prefix; surrounding whitespace is dropped.
    pub fn with_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        self.filename_prefix = prefix.as_ref().trim().to_string();
        self
    }
}

/// Why a returned image wasn't saved.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    /// The image host answered with a non-success status.
    #[error("download returned HTTP {0}")]
    Status(u16),
    /// The download failed or was cut off.
    #[error("download failed: {0}")]
    Transport(String),
    /// The response entry carried no URL.
    #[error("response entry has no url")]
    MissingUrl,
}

/// A returned image that wasn't saved; never fatal for the request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadSkip {
    /// Position of the entry in the response.
    pub index: usize,
    /// URL of the entry, if it had one.
    pub url: Option<String>,
    /// What went wrong.
    pub reason: SkipReason,
}

/// Everything one request produced.
#[derive(Clone, Debug)]
pub struct VariationResult {
    /// The service response exactly as received.
    pub raw_response: serde_json::Value,
    /// Image URLs in response order.
    pub image_urls: Vec<String>,
    /// Files written, in response order.
    pub saved_image_paths: Vec<PathBuf>,
    /// Images that couldn't be saved.
    pub skipped: Vec<DownloadSkip>,
    /// Where the raw response was written.
    pub response_record_path: PathBuf,
}

impl VariationResult {
    /// Number of images the response described.
    pub fn requested(&self) -> usize {
        self.saved_image_paths.len() + self.skipped.len()
    }

    /// Number of images that weren't saved.
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// True when every returned image was saved.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    /// The JSON record of this request.
    pub fn response_record_path(&self) -> &Path {
        &self.response_record_path
    }
}
