//! The variation workflow: one call to the images API, then the downloads.

mod naming;
mod types;

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::constants::{
    DOWNLOAD_TIMEOUT, OPENAI_API_BASE, OUTPUT_DIR, SOURCE_IMAGE_MIME, VARIATIONS_PATH,
};
use crate::error::VariationError;
use crate::json::to_pretty_vec;

pub use naming::ArtifactNames;
pub use types::{
    DownloadSkip, ImageSize, SkipReason, VariationCount, VariationRequest, VariationResult,
};

/// Builder for [`VariationClient`].
#[derive(Clone, Default)]
pub struct VariationClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    output_dir: Option<PathBuf>,
    download_timeout: Option<Duration>,
}

impl VariationClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key sent as the bearer credential.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the API base URL, `https://api.openai.com/v1/` by default.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets where images and response records are written, `variations` by default.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Sets the per-image download timeout, two minutes by default.
    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = Some(timeout);
        self
    }

    /// Builds the client, checking the key and the base URL.
    pub fn build(self) -> Result<VariationClient, VariationError> {
        let api_key = self
            .api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| VariationError::input("OpenAI API key is empty"))?;

        let mut base = self
            .base_url
            .unwrap_or_else(|| OPENAI_API_BASE.to_string());
        if !base.ends_with('/') {
            base.push('/');
        }
        let endpoint = Url::parse(&base)
            .and_then(|base| base.join(VARIATIONS_PATH))
            .map_err(|err| VariationError::input(format!("invalid API base URL {base}: {err}")))?;

        Ok(VariationClient {
            http: reqwest::Client::new(),
            api_key,
            endpoint,
            output_dir: self.output_dir.unwrap_or_else(|| OUTPUT_DIR.clone()),
            download_timeout: self.download_timeout.unwrap_or(DOWNLOAD_TIMEOUT),
        })
    }
}

/// Creates variations of local images and saves what comes back.
pub struct VariationClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: Url,
    output_dir: PathBuf,
    download_timeout: Duration,
}

impl VariationClient {
    /// Creates a new `VariationClientBuilder`.
    pub fn builder() -> VariationClientBuilder {
        VariationClientBuilder::new()
    }

    /// Directory the artifacts are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Full URL of the variations endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Runs one request end to end.
    ///
    /// Nothing is sent when the request is invalid, and nothing is written
    /// unless the service accepted it. Images that fail to download are
    /// listed in [`VariationResult::skipped`] rather than failing the call.
    pub async fn create_variation(
        &self,
        request: &VariationRequest,
    ) -> Result<VariationResult, VariationError> {
        let count = VariationCount::new(request.count)?;
        let source = &request.source_image_path;
        let image = read_source(source).await?;
        let names = ArtifactNames::new(source, &request.filename_prefix)?;

        info!(
            "Requesting {} variation(s) of {} at {}",
            count.get(),
            source.display(),
            request.size
        );
        let raw_response = self
            .request_variations(source, image, count, request.size)
            .await?;
        let entries: VariationsResponse = serde_json::from_value(raw_response.clone())
            .map_err(|err| VariationError::RemoteService {
                status: None,
                message: format!("unexpected response from the images API: {err}"),
            })?;

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|err| write_error(&self.output_dir, &err))?;

        let response_record_path = names.record_path(&self.output_dir);
        let record = to_pretty_vec(&raw_response)
            .map_err(|err| write_error(&response_record_path, &err))?;
        tokio::fs::write(&response_record_path, record)
            .await
            .map_err(|err| write_error(&response_record_path, &err))?;
        debug!("Wrote response record {}", response_record_path.display());

        let mut image_urls = Vec::with_capacity(entries.data.len());
        let mut saved_image_paths = Vec::with_capacity(entries.data.len());
        let mut skipped = Vec::new();

        for (index, entry) in entries.data.into_iter().enumerate() {
            let Some(url) = entry.url else {
                warn!("Response entry {index} has no url, skipping");
                skipped.push(DownloadSkip {
                    index,
                    url: None,
                    reason: SkipReason::MissingUrl,
                });
                continue;
            };

            let dest = names.image_path(&self.output_dir, &url, index);
            match self.download(&url, &dest).await? {
                Fetched::Saved => {
                    debug!("Saved {}", dest.display());
                    saved_image_paths.push(dest);
                }
                Fetched::Skipped(reason) => {
                    warn!("Skipping image {index}: {reason}");
                    skipped.push(DownloadSkip {
                        index,
                        url: Some(url.clone()),
                        reason,
                    });
                }
            }
            image_urls.push(url);
        }

        info!(
            "Saved {} of {} image(s) to {}",
            saved_image_paths.len(),
            saved_image_paths.len() + skipped.len(),
            self.output_dir.display()
        );

        Ok(VariationResult {
            raw_response,
            image_urls,
            saved_image_paths,
            skipped,
            response_record_path,
        })
    }

    /// The single remote call. Returns the response body as JSON.
    async fn request_variations(
        &self,
        source: &Path,
        image: Vec<u8>,
        count: VariationCount,
        size: ImageSize,
    ) -> Result<serde_json::Value, VariationError> {
        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.png".to_string());
        let image_part = Part::bytes(image)
            .file_name(file_name)
            .mime_str(SOURCE_IMAGE_MIME)
            .map_err(VariationError::transport)?;

        let form = Form::new()
            .part("image", image_part)
            .text("n", count.get().to_string())
            .text("size", size.as_str())
            .text("response_format", "url");

        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(VariationError::transport)?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(VariationError::transport)?;
        if !status.is_success() {
            return Err(remote_error(status, &body));
        }

        serde_json::from_slice(&body).map_err(|err| VariationError::RemoteService {
            status: Some(status.as_u16()),
            message: format!("images API returned invalid JSON: {err}"),
        })
    }

    /// Streams one image to `dest`. Remote trouble is a skip, local trouble an error.
    async fn download(&self, url: &str, dest: &Path) -> Result<Fetched, VariationError> {
        let mut response = match self
            .http
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return Ok(Fetched::Skipped(SkipReason::Transport(err.to_string()))),
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(Fetched::Skipped(SkipReason::Status(status.as_u16())));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|err| write_error(dest, &err))?;
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if let Err(err) = file.write_all(&chunk).await {
                        drop(file);
                        remove_partial(dest).await;
                        return Err(write_error(dest, &err));
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    drop(file);
                    remove_partial(dest).await;
                    return Ok(Fetched::Skipped(SkipReason::Transport(err.to_string())));
                }
            }
        }
        if let Err(err) = file.flush().await {
            drop(file);
            remove_partial(dest).await;
            return Err(write_error(dest, &err));
        }
        Ok(Fetched::Saved)
    }
}

enum Fetched {
    Saved,
    Skipped(SkipReason),
}

#[derive(Debug, Deserialize)]
struct VariationsResponse {
    data: Vec<VariationData>,
}

#[derive(Debug, Deserialize)]
struct VariationData {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

async fn read_source(path: &Path) -> Result<Vec<u8>, VariationError> {
    if path.as_os_str().is_empty() {
        return Err(VariationError::input("Choose an image first"));
    }
    let metadata = tokio::fs::metadata(path).await.map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            VariationError::input(format!("source image not found: {}", path.display()))
        } else {
            VariationError::input(format!("can't read {}: {err}", path.display()))
        }
    })?;
    if !metadata.is_file() {
        return Err(VariationError::input(format!(
            "source image is not a file: {}",
            path.display()
        )));
    }
    tokio::fs::read(path)
        .await
        .map_err(|err| VariationError::input(format!("can't read {}: {err}", path.display())))
}

/// Pulls the message out of an OpenAI error body, falling back to the raw
/// text and then to the status reason.
fn remote_error(status: StatusCode, body: &[u8]) -> VariationError {
    let message = serde_json::from_slice::<ApiErrorBody>(body)
        .map(|parsed| parsed.error.message)
        .ok()
        .or_else(|| {
            let text = String::from_utf8_lossy(body).trim().to_string();
            (!text.is_empty()).then_some(text)
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    VariationError::RemoteService {
        status: Some(status.as_u16()),
        message,
    }
}

fn write_error(path: &Path, err: &dyn std::fmt::Display) -> VariationError {
    VariationError::input(format!("can't write {}: {err}", path.display()))
}

async fn remove_partial(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        debug!("Couldn't remove partial file {}: {err}", path.display());
    }
}
