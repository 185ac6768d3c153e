//! Cloudinary raw-resource uploads.
//!
//! Direct uploads are one signed multipart POST. Chunked uploads send the same
//! signed form per chunk with `Content-Range` and a shared
//! `X-Unique-Upload-Id`; the response to the final chunk carries the URL.

use std::{path::Path, time::Duration};

use {
    async_trait::async_trait,
    reqwest::multipart::{Form, Part},
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    sha2::{Digest, Sha256},
    tracing::{debug, info},
    tunepress_config::CloudinaryConfig,
};

use crate::{Error, Result, blob::BlobStore, fs_store::read_full};

const DEFAULT_API_BASE: &str = "https://api.cloudinary.com/v1_1";

pub struct CloudinaryStore {
    client: reqwest::Client,
    api_base: String,
    cloud_name: String,
    api_key: String,
    api_secret: Secret<String>,
    folder: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
}

impl CloudinaryStore {
    pub fn new(
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: Secret<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.into(),
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret,
            folder: None,
        }
    }

    /// Build from config; all three credentials are required.
    pub fn from_config(cfg: &CloudinaryConfig) -> Result<Self> {
        let (Some(cloud), Some(key), Some(secret)) =
            (&cfg.cloud_name, &cfg.api_key, &cfg.api_secret)
        else {
            return Err(Error::not_configured(
                "cloud_name, api_key and api_secret are required",
            ));
        };
        let mut store = Self::new(cloud.clone(), key.clone(), secret.clone());
        store.folder = cfg.folder.clone();
        if let Some(base) = &cfg.api_base {
            store.api_base = base.trim_end_matches('/').to_string();
        }
        Ok(store)
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/{}/raw/upload", self.api_base, self.cloud_name)
    }

    fn full_public_id(&self, public_id: &str) -> String {
        match &self.folder {
            Some(folder) if !folder.is_empty() => {
                format!("{}/{public_id}", folder.trim_end_matches('/'))
            },
            _ => public_id.to_string(),
        }
    }

    fn signed_form(&self, public_id: &str, timestamp: i64, file: Part) -> Form {
        let timestamp = timestamp.to_string();
        let signature = sign(
            &[("public_id", public_id), ("timestamp", &timestamp)],
            self.api_secret.expose_secret(),
        );
        Form::new()
            .text("api_key", self.api_key.clone())
            .text("public_id", public_id.to_string())
            .text("timestamp", timestamp)
            .text("signature_algorithm", "sha256")
            .text("signature", signature)
            .part("file", file)
    }

    async fn send(
        &self,
        form: Form,
        timeout: Duration,
        headers: &[(&str, String)],
    ) -> Result<UploadResponse> {
        let mut req = self
            .client
            .post(self.endpoint())
            .timeout(timeout)
            .multipart(form);
        for (name, value) in headers {
            req = req.header(*name, value);
        }
        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    secs: timeout.as_secs(),
                }
            } else {
                Error::Http(e)
            }
        })?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::rejected(status.as_u16(), body));
        }
        Ok(resp.json::<UploadResponse>().await?)
    }
}

fn response_url(resp: UploadResponse) -> Result<String> {
    resp.secure_url
        .or(resp.url)
        .ok_or_else(|| Error::message("upload response carried no URL"))
}

/// Cloudinary request signature: SHA-256 over the sorted `k=v` pairs joined
/// with `&`, followed by the API secret.
pub fn sign(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("container.m3ew")
        .to_string()
}

#[async_trait]
impl BlobStore for CloudinaryStore {
    fn name(&self) -> &str {
        "cloudinary"
    }

    async fn upload_direct(
        &self,
        path: &Path,
        public_id: &str,
        timeout: Duration,
    ) -> Result<String> {
        let public_id = self.full_public_id(public_id);
        let bytes = tokio::fs::read(path).await?;
        let part = Part::bytes(bytes).file_name(file_name(path));
        let form = self.signed_form(&public_id, chrono::Utc::now().timestamp(), part);
        let url = response_url(self.send(form, timeout, &[]).await?)?;
        info!(public_id = %public_id, "direct upload complete");
        Ok(url)
    }

    async fn upload_chunked(
        &self,
        path: &Path,
        public_id: &str,
        size_bytes: u64,
        chunk_size: u64,
        timeout: Duration,
    ) -> Result<String> {
        let public_id = self.full_public_id(public_id);
        let upload_id = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp();
        let name = file_name(path);

        let mut file = tokio::fs::File::open(path).await?;
        let mut buf = vec![0u8; chunk_size.max(1) as usize];
        let mut offset = 0u64;
        let mut last = None;
        while offset < size_bytes {
            let n = read_full(&mut file, &mut buf).await?;
            if n == 0 {
                return Err(Error::message(format!(
                    "file ended at {offset} bytes, expected {size_bytes}"
                )));
            }
            let end = offset + n as u64 - 1;
            let range = format!("bytes {offset}-{end}/{size_bytes}");
            debug!(public_id = %public_id, range = %range, "uploading chunk");

            let part = Part::bytes(buf[..n].to_vec()).file_name(name.clone());
            let form = self.signed_form(&public_id, timestamp, part);
            let resp = self
                .send(form, timeout, &[
                    ("X-Unique-Upload-Id", upload_id.clone()),
                    ("Content-Range", range),
                ])
                .await?;
            last = Some(resp);
            offset = end + 1;
        }

        let resp = last.ok_or_else(|| Error::message("nothing to upload"))?;
        let url = response_url(resp)?;
        info!(public_id = %public_id, size_bytes, "chunked upload complete");
        Ok(url)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, mockito::Matcher};

    fn store(server: &mockito::Server) -> CloudinaryStore {
        CloudinaryStore::new("demo", "123", Secret::new("shh".to_string()))
            .with_api_base(server.url())
    }

    fn write(dir: &Path, len: usize) -> std::path::PathBuf {
        let path = dir.join("Song_A.m3ew");
        std::fs::write(&path, vec![7u8; len]).unwrap();
        path
    }

    #[test]
    fn signature_sorts_params_and_appends_secret() {
        let expected = {
            let mut h = Sha256::new();
            h.update(b"public_id=abc&timestamp=1700000000shh");
            format!("{:x}", h.finalize())
        };
        assert_eq!(
            sign(&[("timestamp", "1700000000"), ("public_id", "abc")], "shh"),
            expected
        );
    }

    #[test]
    fn from_config_requires_credentials() {
        assert!(CloudinaryStore::from_config(&CloudinaryConfig::default()).is_err());
        let cfg = CloudinaryConfig {
            cloud_name: Some("demo".into()),
            api_key: Some("123".into()),
            api_secret: Some(Secret::new("shh".into())),
            folder: Some("songs/".into()),
            api_base: None,
        };
        let store = CloudinaryStore::from_config(&cfg).unwrap();
        assert_eq!(store.full_public_id("x"), "songs/x");
        assert_eq!(
            store.endpoint(),
            "https://api.cloudinary.com/v1_1/demo/raw/upload"
        );
    }

    #[tokio::test]
    async fn direct_upload_posts_signed_form() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/demo/raw/upload")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("name=\"api_key\"".into()),
                Matcher::Regex("name=\"signature\"".into()),
                Matcher::Regex("Song_A_1234abcd".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"secure_url":"https://res.cloudinary.com/demo/raw/upload/Song_A_1234abcd"}"#)
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), 32);
        let url = store(&server)
            .upload_direct(&path, "Song_A_1234abcd", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(url, "https://res.cloudinary.com/demo/raw/upload/Song_A_1234abcd");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn chunked_upload_sends_content_ranges() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("POST", "/demo/raw/upload")
            .match_header("content-range", "bytes 0-9/25")
            .match_header("x-unique-upload-id", Matcher::Any)
            .with_status(200)
            .with_body(r#"{"done":false}"#)
            .create_async()
            .await;
        let second = server
            .mock("POST", "/demo/raw/upload")
            .match_header("content-range", "bytes 10-19/25")
            .with_status(200)
            .with_body(r#"{"done":false}"#)
            .create_async()
            .await;
        let last = server
            .mock("POST", "/demo/raw/upload")
            .match_header("content-range", "bytes 20-24/25")
            .with_status(200)
            .with_body(r#"{"secure_url":"https://res.cloudinary.com/demo/raw/upload/big"}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), 25);
        let url = store(&server)
            .upload_chunked(&path, "big", 25, 10, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(url, "https://res.cloudinary.com/demo/raw/upload/big");
        first.assert_async().await;
        second.assert_async().await;
        last.assert_async().await;
    }

    #[tokio::test]
    async fn rejection_surfaces_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/demo/raw/upload")
            .with_status(413)
            .with_body("File size too large")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), 8);
        let err = store(&server)
            .upload_direct(&path, "x", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Rejected { status: 413, .. }));
    }
}
