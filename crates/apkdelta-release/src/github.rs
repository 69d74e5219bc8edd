//! GitHub releases as manifest catalog and artifact store
//!
//! Each published patch is a GitHub release whose assets are the patch
//! artifact plus its JSON manifest. The manifest is recovered from the
//! release body when the body itself parses as one, which saves an asset
//! download per release; otherwise the first `.json` asset is fetched.
//! Releases that yield no manifest are skipped with a warning so one broken
//! release cannot poison the whole catalog.

use crate::error::{ReleaseError, ReleaseResult};
use crate::traits::{ArtifactSink, ManifestSource, ReleaseDraft};
use apkdelta_formats::Manifest;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, trace, warn};
use url::Url;

/// Default maximum retries for catalog and download requests
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default initial backoff in milliseconds
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 100;

/// Default maximum backoff in milliseconds
const DEFAULT_MAX_BACKOFF_MS: u64 = 10_000;

/// Default backoff multiplier
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Default jitter factor (0.0 to 1.0)
const DEFAULT_JITTER_FACTOR: f64 = 0.1;

/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default request timeout
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Default page bound when walking the release list
const DEFAULT_MAX_PAGES: u32 = 5;

/// Default page size when walking the release list
const DEFAULT_PER_PAGE: u32 = 30;

const API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = "apkdelta";

/// Resolve a GitHub token from the conventional environment variables
pub fn token_from_env() -> Option<String> {
    ["GITHUB_TOKEN", "GH_TOKEN", "GITHUB_PAT"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
}

/// GitHub releases client
#[derive(Debug, Clone)]
pub struct GithubReleases {
    client: Client,
    repo: String,
    token: Option<String>,
    api_base: String,
    max_pages: u32,
    per_page: u32,
    max_retries: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
    backoff_multiplier: f64,
    jitter_factor: f64,
}

impl GithubReleases {
    /// Create a client for `owner/name`
    pub fn new(repo: impl Into<String>) -> ReleaseResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            repo: repo.into(),
            token: None,
            api_base: API_BASE.to_string(),
            max_pages: DEFAULT_MAX_PAGES,
            per_page: DEFAULT_PER_PAGE,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        })
    }

    /// Set an explicit token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Pick up a token from the environment, if one is set
    pub fn with_token_from_env(mut self) -> Self {
        self.token = token_from_env();
        self
    }

    /// Override the API base URL (used by tests)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Bound the number of release pages walked by [`Self::catalog`]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Set the release page size
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.clamp(1, 100);
        self
    }

    /// Set the maximum number of retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the initial backoff duration in milliseconds
    pub fn with_initial_backoff_ms(mut self, initial_backoff_ms: u64) -> Self {
        self.initial_backoff_ms = initial_backoff_ms;
        self
    }

    /// Calculate backoff duration with exponential backoff and jitter
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base_backoff =
            self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped_backoff = base_backoff.min(self.max_backoff_ms as f64);

        let jitter_range = capped_backoff * self.jitter_factor;
        let jitter = rand::random::<f64>() * 2.0 * jitter_range - jitter_range;
        let final_backoff = (capped_backoff + jitter).max(0.0) as u64;

        Duration::from_millis(final_backoff)
    }

    /// Build an API URL under `/repos/{owner}/{name}/...`
    fn api_url(&self, segments: &[&str]) -> ReleaseResult<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|_| ReleaseError::invalid_url(&self.api_base))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| ReleaseError::invalid_url(&self.api_base))?;
            path.pop_if_empty();
            path.push("repos");
            path.extend(self.repo.split('/'));
            path.extend(segments);
        }
        Ok(url)
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request
    }

    /// Execute a GET with retry on transient failures, 5xx and 429
    async fn get_with_retry(&self, url: Url) -> ReleaseResult<Response> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.calculate_backoff(attempt - 1);
                debug!("retry attempt {attempt} after {backoff:?} backoff");
                sleep(backoff).await;
            }

            trace!("GET {url} (attempt {})", attempt + 1);
            match self.get(url.clone()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS && attempt < self.max_retries {
                        warn!("rate limited (attempt {}), will retry", attempt + 1);
                        last_error = Some(ReleaseError::Api {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                        continue;
                    }

                    if status.is_server_error() && attempt < self.max_retries {
                        warn!("server error {status} (attempt {}), will retry", attempt + 1);
                        last_error = Some(ReleaseError::Api {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                        continue;
                    }

                    // Client errors are never retried.
                    return Err(ReleaseError::Api {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }
                Err(err) => {
                    let retryable = err.is_connect() || err.is_timeout() || err.is_request();
                    if retryable && attempt < self.max_retries {
                        warn!("request failed (attempt {}): {err}, will retry", attempt + 1);
                        last_error = Some(ReleaseError::Http(err));
                    } else {
                        return Err(ReleaseError::Http(err));
                    }
                }
            }
        }

        Err(last_error.unwrap_or(ReleaseError::Api {
            status: 0,
            url: url.to_string(),
        }))
    }

    /// Fetch one page of releases
    async fn release_page(&self, page: u32) -> ReleaseResult<Vec<ReleaseInfo>> {
        let mut url = self.api_url(&["releases"])?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &self.per_page.to_string());
        Ok(self.get_with_retry(url).await?.json().await?)
    }

    /// Fetch one release by tag
    async fn release_by_tag(&self, tag: &str) -> ReleaseResult<ReleaseInfo> {
        let url = self.api_url(&["releases", "tags", tag])?;
        match self.get_with_retry(url).await {
            Ok(response) => Ok(response.json().await?),
            Err(ReleaseError::Api { status: 404, .. }) => Err(ReleaseError::ReleaseNotFound {
                tag: tag.to_string(),
            }),
            Err(err) => Err(err),
        }
    }

    /// Stream a URL's body into a file
    async fn download_to(&self, url: &str, dest: &Path) -> ReleaseResult<()> {
        let url = Url::parse(url).map_err(|_| ReleaseError::invalid_url(url))?;
        let mut response = self.get_with_retry(url).await?;

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(dest)?;
        while let Some(chunk) = response.chunk().await? {
            std::io::Write::write_all(&mut file, &chunk)?;
        }
        Ok(())
    }

    /// Recover a manifest from a release: body first, then `.json` asset
    async fn manifest_from_release(&self, release: &ReleaseInfo) -> ReleaseResult<Manifest> {
        if let Some(body) = release.body.as_deref() {
            if let Ok(manifest) = Manifest::from_json(body) {
                trace!("manifest for {} recovered from release body", release.tag_name);
                return Ok(manifest);
            }
        }

        let asset = release
            .assets
            .iter()
            .find(|a| a.name.ends_with(".json"))
            .ok_or_else(|| ReleaseError::ManifestNotFound {
                tag: release.tag_name.clone(),
            })?;
        let url = Url::parse(&asset.browser_download_url)
            .map_err(|_| ReleaseError::invalid_url(&asset.browser_download_url))?;
        let body = self.get_with_retry(url).await?.text().await?;
        Ok(Manifest::from_json(&body)?)
    }
}

#[async_trait]
impl ManifestSource for GithubReleases {
    async fn catalog(&self) -> ReleaseResult<Vec<Manifest>> {
        let mut manifests = Vec::new();
        for page in 1..=self.max_pages {
            let releases = self.release_page(page).await?;
            if releases.is_empty() {
                break;
            }
            for release in &releases {
                if release.draft {
                    continue;
                }
                match self.manifest_from_release(release).await {
                    Ok(manifest) => manifests.push(manifest),
                    Err(err) => {
                        warn!("skipping release '{}': {err}", release.tag_name);
                    }
                }
            }
        }
        debug!("catalog for {}: {} manifests", self.repo, manifests.len());
        Ok(manifests)
    }

    async fn fetch_artifact(&self, manifest: &Manifest, dest: &Path) -> ReleaseResult<()> {
        let release = self.release_by_tag(&manifest.tag).await?;
        let asset = release
            .assets
            .iter()
            .find(|a| a.name == manifest.patch_file)
            .ok_or_else(|| ReleaseError::AssetNotFound {
                tag: manifest.tag.clone(),
                asset: manifest.patch_file.clone(),
            })?;
        debug!("downloading {} from {}", asset.name, manifest.tag);
        self.download_to(&asset.browser_download_url, dest).await
    }
}

#[async_trait]
impl ArtifactSink for GithubReleases {
    async fn publish(&self, draft: &ReleaseDraft, assets: &[PathBuf]) -> ReleaseResult<()> {
        let token = self.token.as_ref().ok_or(ReleaseError::MissingToken)?;

        let release = match self.release_by_tag(&draft.tag).await {
            Ok(release) => release,
            Err(ReleaseError::ReleaseNotFound { .. }) => {
                debug!("creating release {}", draft.tag);
                let url = self.api_url(&["releases"])?;
                let response = self
                    .client
                    .post(url.clone())
                    .header("Accept", "application/vnd.github+json")
                    .header("User-Agent", USER_AGENT)
                    .header("X-GitHub-Api-Version", API_VERSION)
                    .bearer_auth(token)
                    .json(&serde_json::json!({
                        "tag_name": draft.tag,
                        "target_commitish": "main",
                        "name": draft.title,
                        "body": draft.notes,
                        "draft": false,
                        "prerelease": true,
                    }))
                    .send()
                    .await?;
                if !response.status().is_success() {
                    return Err(ReleaseError::Api {
                        status: response.status().as_u16(),
                        url: url.to_string(),
                    });
                }
                response.json().await?
            }
            Err(err) => return Err(err),
        };

        let upload_base = release
            .upload_url
            .split('{')
            .next()
            .unwrap_or(&release.upload_url)
            .to_string();

        for asset_path in assets {
            let name = asset_path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| ReleaseError::invalid_url(asset_path.display().to_string()))?;

            // Replace an existing asset of the same name.
            if let Some(existing) = release.assets.iter().find(|a| a.name == name) {
                debug!("deleting existing asset {name}");
                let url = self.api_url(&["releases", "assets", &existing.id.to_string()])?;
                let response = self
                    .client
                    .delete(url.clone())
                    .header("Accept", "application/vnd.github+json")
                    .header("User-Agent", USER_AGENT)
                    .header("X-GitHub-Api-Version", API_VERSION)
                    .bearer_auth(token)
                    .send()
                    .await?;
                if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
                    return Err(ReleaseError::Api {
                        status: response.status().as_u16(),
                        url: url.to_string(),
                    });
                }
            }

            debug!("uploading asset {name}");
            let mut url =
                Url::parse(&upload_base).map_err(|_| ReleaseError::invalid_url(&upload_base))?;
            url.query_pairs_mut().append_pair("name", name);
            let body = std::fs::read(asset_path)?;
            let response = self
                .client
                .post(url.clone())
                .header("Accept", "application/vnd.github+json")
                .header("User-Agent", USER_AGENT)
                .header("X-GitHub-Api-Version", API_VERSION)
                .header("Content-Type", "application/octet-stream")
                .bearer_auth(token)
                .body(body)
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(ReleaseError::Api {
                    status: response.status().as_u16(),
                    url: url.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Release as returned by the GitHub API
#[derive(Debug, Clone, Deserialize)]
struct ReleaseInfo {
    tag_name: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    upload_url: String,
    #[serde(default)]
    assets: Vec<AssetInfo>,
}

/// Release asset as returned by the GitHub API
#[derive(Debug, Clone, Deserialize)]
struct AssetInfo {
    id: u64,
    name: String,
    browser_download_url: String,
}
