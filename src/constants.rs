//! Shared constants/defaults for things
//!

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

/// Where the API key is remembered between runs
pub static CONFIG_FILE: LazyLock<PathBuf> = LazyLock::new(|| PathBuf::from("config.json"));

/// The default place we put generated images and response records
pub static OUTPUT_DIR: LazyLock<PathBuf> = LazyLock::new(|| PathBuf::from("variations"));

/// Base of the OpenAI REST API, the variations endpoint is resolved against it.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1/";

/// Path of the variations endpoint relative to [`OPENAI_API_BASE`].
pub const VARIATIONS_PATH: &str = "images/variations";

/// How long a single image download may take.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Smallest number of variations the API will create per request.
pub const MIN_VARIATIONS: u8 = 1;

/// Largest number of variations the API will create per request.
pub const MAX_VARIATIONS: u8 = 10;

/// Number of variations requested when the user doesn't say.
pub const DEFAULT_VARIATIONS: u8 = 3;

/// Content type sent for the source image part.
pub const SOURCE_IMAGE_MIME: &str = "image/png";

/// Shown by the `about` command.
pub const ABOUT: &[(&str, &str)] = &[
    ("version", env!("CARGO_PKG_VERSION")),
    ("author", "ktxo"),
    ("date", "2023-06-14"),
    ("url", "https://github.com/ktxo/openai-variations-gui"),
];

/// Reference documentation listed by the `about` command.
pub const REFERENCES: &[(&str, &str)] = &[
    (
        "OpenAI Image variation",
        "https://platform.openai.com/docs/guides/images/variations",
    ),
    (
        "OpenAI Image variation API",
        "https://platform.openai.com/docs/api-reference/images/create-variation",
    ),
];
