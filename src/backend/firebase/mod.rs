//! Firebase backend over its public REST surfaces.

mod auth;
mod credentials;
mod database;
mod messaging;
mod push_id;
mod storage;
mod stream;

use std::path::Path;
use std::sync::Arc;

use auth::FirebaseAuth;
use credentials::{MESSAGING_SCOPE, ServiceAccountKey, ServiceAccountTokenSource, TokenSource};
use database::FirebaseDatabase;
use messaging::FcmTransport;
use storage::FirebaseStorage;

use super::Backend;
use crate::common::GatewayError;
use crate::config::FirebaseConfig;

pub(crate) async fn error_for_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::Backend {
        status: status.as_u16(),
        body,
    })
}

pub fn open(config: &FirebaseConfig) -> Result<Backend, Box<dyn std::error::Error>> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("rust_channel_chat/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let endpoints = &config.endpoints;

    let auth = Arc::new(FirebaseAuth::new(
        http.clone(),
        &config.api_key,
        &endpoints.identity_toolkit,
        &endpoints.secure_token,
    ));
    let database = Arc::new(FirebaseDatabase::new(
        http.clone(),
        &config.database_url,
        Arc::clone(&auth),
    )?);
    let storage = FirebaseStorage::new(
        http.clone(),
        &endpoints.storage,
        &config.storage_bucket,
        Arc::clone(&auth),
    )?;

    let tokens = config
        .service_account_path
        .as_deref()
        .and_then(|path| match ServiceAccountKey::from_file(Path::new(path)) {
            Ok(key) => Some(Arc::new(ServiceAccountTokenSource::new(
                http.clone(),
                key,
                MESSAGING_SCOPE,
            )) as Arc<dyn TokenSource>),
            Err(err) => {
                log::warn!("Push notifications disabled: {err}");
                None
            }
        });
    if config.service_account_path.is_none() {
        log::warn!("Push notifications disabled: no service account configured");
    }

    let push = FcmTransport::new(
        http,
        &endpoints.fcm,
        &endpoints.iid,
        &config.project_id,
        tokens,
        config.registration_token.clone(),
    );

    log::info!(
        "Firebase backend for project {} ({})",
        config.project_id,
        config.database_url
    );

    Ok(Backend {
        session: auth,
        messages: database.clone(),
        media: Arc::new(storage),
        channels: database,
        push: Arc::new(push),
    })
}
