use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use secrecy::ExposeSecret;
use serde::Deserialize;

use super::auth::FirebaseAuth;
use super::error_for_status;
use crate::common::GatewayError;
use crate::gateway::{MediaStorage, guess_content_type, new_image_key};

/// Cloud Storage for Firebase; objects are addressed by URL-encoded name.
pub struct FirebaseStorage {
    http: reqwest::Client,
    base: Url,
    bucket: String,
    auth: Arc<FirebaseAuth>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    name: String,
    #[serde(default)]
    download_tokens: Option<String>,
}

impl FirebaseStorage {
    pub fn new(
        http: reqwest::Client,
        storage_base: &str,
        bucket: impl Into<String>,
        auth: Arc<FirebaseAuth>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let base = Url::parse(storage_base)?;
        if base.cannot_be_a_base() {
            return Err(format!("storage URL {storage_base} cannot hold paths").into());
        }
        Ok(Self {
            http,
            base,
            bucket: bucket.into(),
            auth,
        })
    }

    /// `{base}/v0/b/{bucket}/o[/{name}]`; `/` inside the name is encoded.
    fn object_url(&self, name: Option<&str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["v0", "b", self.bucket.as_str(), "o"]);
            if let Some(name) = name {
                path.push(name);
            }
        }
        url
    }

    /// Public retrieval URL for an uploaded object.
    fn download_url(&self, name: &str, token: Option<&str>) -> String {
        let mut url = self.object_url(Some(name));
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("alt", "media");
            if let Some(token) = token {
                query.append_pair("token", token);
            }
        }
        url.to_string()
    }
}

#[async_trait]
impl MediaStorage for FirebaseStorage {
    async fn upload(&self, local_path: &Path) -> Result<String, GatewayError> {
        let bytes = tokio::fs::read(local_path).await?;
        let key = new_image_key();
        let token = self.auth.id_token().await?;

        let mut url = self.object_url(None);
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", &key);

        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, format!("Firebase {}", token.expose_secret()))
            .header(CONTENT_TYPE, guess_content_type(local_path))
            .body(bytes)
            .send()
            .await?;
        let uploaded: UploadResponse = error_for_status(response).await?.json().await?;

        // Several tokens may be comma-separated; any of them grants access.
        let token = uploaded
            .download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').next())
            .filter(|token| !token.is_empty());
        log::debug!("Uploaded {} as {}", local_path.display(), uploaded.name);

        Ok(self.download_url(&uploaded.name, token))
    }
}
