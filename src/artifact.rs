//! Model artifact acquisition: download once if missing, verify, install.

use anyhow::{anyhow, bail, Context, Result};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::config::Config;
use crate::logging::{info, obj, v_num, v_str, warn, Domain};
use crate::retry::{is_retryable_http_error, retry_async, Permanent, RetryConfig};

#[derive(Debug, Clone)]
pub struct ArtifactSource {
    pub path: PathBuf,
    pub url: Option<String>,
    /// Lowercase hex SHA-256 the artifact must hash to.
    pub sha256: Option<String>,
    pub retry: RetryConfig,
    pub timeout: Duration,
}

impl ArtifactSource {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            path: cfg.model_path.clone(),
            url: cfg.model_url.clone(),
            sha256: cfg.model_sha256.clone(),
            retry: RetryConfig {
                max_retries: cfg.fetch_retries,
                ..Default::default()
            },
            timeout: Duration::from_secs(cfg.fetch_timeout_secs),
        }
    }
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("reading {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn check_digest(expected: &str, actual: &str, what: &str) -> Result<()> {
    if !expected.eq_ignore_ascii_case(actual) {
        bail!(
            "checksum mismatch for {}: expected sha256 {}, got {}",
            what,
            expected,
            actual
        );
    }
    Ok(())
}

fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("invalid MODEL_URL {:?}", raw))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => bail!("unsupported MODEL_URL scheme {:?}", other),
    }
}

async fn fetch_bytes(client: &Client, url: &Url) -> Result<Vec<u8>> {
    let resp = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("requesting {}", url))?;
    let status = resp.status();
    if !status.is_success() {
        let err = anyhow!("GET {} returned HTTP {}", url, status.as_u16());
        if is_retryable_http_error(status.as_u16()) {
            return Err(err);
        }
        return Err(Permanent(err).into());
    }
    let body = resp
        .bytes()
        .await
        .with_context(|| format!("reading body of {}", url))?;
    if body.is_empty() {
        return Err(anyhow!("GET {} returned an empty body", url));
    }
    Ok(body.to_vec())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// Returns the local artifact path, downloading it first when absent.
/// A configured checksum is enforced on both cached and fresh files.
pub async fn ensure_artifact(src: &ArtifactSource) -> Result<PathBuf> {
    if src.path.exists() {
        if let Some(expected) = &src.sha256 {
            let actual = file_sha256(&src.path)?;
            check_digest(expected, &actual, &src.path.display().to_string())?;
        }
        info(
            Domain::Artifact,
            "artifact_cached",
            obj(&[("path", v_str(&src.path.display().to_string()))]),
        );
        return Ok(src.path.clone());
    }

    let raw = src.url.as_deref().ok_or_else(|| {
        anyhow!(
            "model artifact {} not found and MODEL_URL is not set",
            src.path.display()
        )
    })?;
    let url = parse_url(raw)?;
    if src.sha256.is_none() {
        warn(
            Domain::Artifact,
            "artifact_unverified",
            obj(&[
                ("msg", v_str("MODEL_SHA256 not set, downloaded artifact will not be verified")),
                ("url", v_str(url.as_str())),
            ]),
        );
    }

    let client = Client::builder()
        .timeout(src.timeout)
        .build()
        .context("building HTTP client")?;
    let bytes = retry_async(&src.retry, "model_download", || fetch_bytes(&client, &url))
        .await
        .with_context(|| format!("downloading model artifact from {}", url))?;

    let digest = hex::encode(Sha256::digest(&bytes));
    if let Some(expected) = &src.sha256 {
        check_digest(expected, &digest, url.as_str())?;
    }

    if let Some(parent) = src.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let part = partial_path(&src.path);
    std::fs::write(&part, &bytes).with_context(|| format!("writing {}", part.display()))?;
    if let Err(e) = std::fs::rename(&part, &src.path) {
        let _ = std::fs::remove_file(&part);
        return Err(e).with_context(|| format!("installing {}", src.path.display()));
    }

    info(
        Domain::Artifact,
        "artifact_downloaded",
        obj(&[
            ("path", v_str(&src.path.display().to_string())),
            ("bytes", v_num(bytes.len() as f64)),
            ("sha256", v_str(&digest)),
        ]),
    );
    Ok(src.path.clone())
}
