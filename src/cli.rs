//! CLI parser
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::constants::{DEFAULT_VARIATIONS, MAX_VARIATIONS, MIN_VARIATIONS};
use crate::variation::{ImageSize, VariationRequest};

#[derive(Parser, Debug)]
#[command(name = "openai-variations", version)]
#[command(about = "Create OpenAI image variations from a square PNG and save them locally")]
/// CLI Options
pub struct CliOptions {
    #[clap(long, global = true, help = "Enable debug logging", env = "VARIATIONS_DEBUG")]
    /// Enable debug logging. Env: VARIATIONS_DEBUG
    pub debug: bool,

    #[clap(long, global = true)]
    /// Print the outcome as JSON
    pub json: bool,

    #[clap(long, global = true, default_value = "config.json", env = "VARIATIONS_CONFIG")]
    /// Settings file, defaults to `config.json`.
    /// Env: VARIATIONS_CONFIG
    pub config: PathBuf,

    #[clap(long, global = true, default_value = "variations", env = "VARIATIONS_OUTPUT_DIR")]
    /// Where images and response records go, defaults to `variations`.
    /// Env: VARIATIONS_OUTPUT_DIR
    pub output_dir: PathBuf,

    #[command(subcommand)]
    /// What to do
    pub command: Command,
}

#[derive(Subcommand, Debug)]
/// Actions
pub enum Command {
    /// Create variations of an image
    Create(CreateArgs),
    /// Show version and reference links
    About,
}

#[derive(Args, Debug)]
/// Options for `create`
pub struct CreateArgs {
    /// The PNG to vary. Must be square and less than 4MB.
    pub image: PathBuf,

    #[arg(
        short = 'n',
        long,
        default_value_t = DEFAULT_VARIATIONS,
        value_parser = clap::value_parser!(u8).range(i64::from(MIN_VARIATIONS)..=i64::from(MAX_VARIATIONS))
    )]
    /// Number of variations to create (1-10)
    pub count: u8,

    #[arg(short, long, value_enum, default_value = "256x256")]
    /// Size of the generated images
    pub size: SizeArg,

    #[arg(short, long, default_value = "")]
    /// Added to image file names, e.g. `mydrawing`
    pub prefix: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    /// OpenAI API key; saved to the settings file when given
    pub api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", hide = true)]
    /// Alternative API base URL
    pub base_url: Option<String>,
}

impl CreateArgs {
    /// The request these arguments describe.
    pub fn to_request(&self) -> VariationRequest {
        VariationRequest::new(&self.image)
            .with_count(self.count)
            .with_size(self.size.into())
            .with_prefix(&self.prefix)
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
/// Image size choices
pub enum SizeArg {
    #[value(name = "256x256")]
    /// 256x256
    Small,
    #[value(name = "512x512")]
    /// 512x512
    Medium,
    #[value(name = "1024x1024")]
    /// 1024x1024
    Large,
}

impl From<SizeArg> for ImageSize {
    fn from(arg: SizeArg) -> Self {
        match arg {
            SizeArg::Small => ImageSize::Small,
            SizeArg::Medium => ImageSize::Medium,
            SizeArg::Large => ImageSize::Large,
        }
    }
}
