use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::json;

use super::credentials::TokenSource;
use crate::common::{DispatchError, PushNotification};
use crate::gateway::{PushFeed, PushTransport};

/// FCM HTTP v1 topic sends plus Instance ID topic registration.
pub struct FcmTransport {
    http: reqwest::Client,
    fcm_base: String,
    iid_base: String,
    project_id: String,
    tokens: Option<Arc<dyn TokenSource>>,
    registration_token: Option<String>,
}

impl FcmTransport {
    pub fn new(
        http: reqwest::Client,
        fcm_base: impl Into<String>,
        iid_base: impl Into<String>,
        project_id: impl Into<String>,
        tokens: Option<Arc<dyn TokenSource>>,
        registration_token: Option<String>,
    ) -> Self {
        Self {
            http,
            fcm_base: fcm_base.into().trim_end_matches('/').to_string(),
            iid_base: iid_base.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            tokens,
            registration_token,
        }
    }

    async fn bearer(&self) -> Result<String, DispatchError> {
        let tokens = self
            .tokens
            .as_ref()
            .ok_or_else(|| DispatchError::Credentials("no service account configured".into()))?;
        Ok(tokens.access_token().await?.expose_secret().clone())
    }
}

/// Request body for a topic-addressed FCM v1 send.
pub fn send_body(notification: &PushNotification) -> serde_json::Value {
    json!({
        "message": {
            "topic": notification.topic,
            "notification": {
                "title": notification.title,
                "body": notification.body,
            }
        }
    })
}

async fn check(response: reqwest::Response) -> Result<(), DispatchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(DispatchError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl PushTransport for FcmTransport {
    async fn send_to_topic(&self, notification: &PushNotification) -> Result<(), DispatchError> {
        let url = format!(
            "{}/v1/projects/{}/messages:send",
            self.fcm_base, self.project_id
        );
        let response = self
            .http
            .post(url)
            .bearer_auth(self.bearer().await?)
            .json(&send_body(notification))
            .send()
            .await?;
        check(response).await
    }

    async fn subscribe_topic(&self, topic: &str) -> Result<(), DispatchError> {
        let Some(registration) = self.registration_token.as_deref() else {
            log::info!("No push registration token configured; not subscribing to {topic}");
            return Ok(());
        };

        let url = format!("{}/iid/v1/{registration}/rel/topics/{topic}", self.iid_base);
        let response = self
            .http
            .post(url)
            .bearer_auth(self.bearer().await?)
            .header("access_token_auth", "true")
            .header(reqwest::header::CONTENT_LENGTH, "0")
            .send()
            .await?;
        check(response).await
    }

    /// Desktop clients have no inbound FCM channel.
    fn incoming(&self) -> Option<PushFeed> {
        None
    }
}
