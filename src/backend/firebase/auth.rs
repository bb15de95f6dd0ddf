use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret, SecretString};
use serde::Deserialize;
use serde_json::json;

use super::error_for_status;
use crate::common::{AuthError, GatewayError, UserProfile};
use crate::gateway::SessionProvider;

/// ID tokens are refreshed this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Email/password accounts through the Identity Toolkit REST API.
pub struct FirebaseAuth {
    http: reqwest::Client,
    api_key: String,
    identity_toolkit: String,
    secure_token: String,
    state: RwLock<Option<AuthState>>,
}

struct AuthState {
    profile: UserProfile,
    id_token: SecretString,
    refresh_token: SecretString,
    expires_at: Instant,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    display_name: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

fn lifetime(expires_in: &str) -> Duration {
    Duration::from_secs(expires_in.parse().unwrap_or(3600))
}

impl FirebaseAuth {
    pub fn new(
        http: reqwest::Client,
        api_key: impl Into<String>,
        identity_toolkit: impl Into<String>,
        secure_token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            identity_toolkit: identity_toolkit.into().trim_end_matches('/').to_string(),
            secure_token: secure_token.into().trim_end_matches('/').to_string(),
            state: RwLock::new(None),
        }
    }

    async fn accounts_call(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<AccountResponse, AuthError> {
        let url = format!("{}/v1/accounts:{method}", self.identity_toolkit);
        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let response = error_for_status(response)
            .await
            .map_err(|err| AuthError::Failed(err.to_string()))?;
        Ok(response.json().await?)
    }

    fn store(&self, account: AccountResponse, fallback_name: &str) -> UserProfile {
        let profile = UserProfile {
            id: account.local_id,
            display_name: account
                .display_name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| fallback_name.to_string()),
        };
        let state = AuthState {
            profile: profile.clone(),
            id_token: Secret::new(account.id_token),
            refresh_token: Secret::new(account.refresh_token),
            expires_at: Instant::now() + lifetime(&account.expires_in),
        };
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Some(state);
        profile
    }

    /// Current ID token, refreshed first when close to expiry.
    pub async fn id_token(&self) -> Result<SecretString, GatewayError> {
        let refresh_token = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            let state = state.as_ref().ok_or(GatewayError::Unauthenticated)?;
            if Instant::now() + REFRESH_MARGIN < state.expires_at {
                return Ok(Secret::new(state.id_token.expose_secret().clone()));
            }
            state.refresh_token.expose_secret().clone()
        };

        log::debug!("Refreshing ID token");
        let response = self
            .http
            .post(format!("{}/v1/token", self.secure_token))
            .query(&[("key", self.api_key.as_str())])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ])
            .send()
            .await?;
        let refreshed: RefreshResponse = error_for_status(response).await?.json().await?;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let state = state.as_mut().ok_or(GatewayError::Unauthenticated)?;
        state.id_token = Secret::new(refreshed.id_token.clone());
        state.refresh_token = Secret::new(refreshed.refresh_token);
        state.expires_at = Instant::now() + lifetime(&refreshed.expires_in);
        Ok(Secret::new(refreshed.id_token))
    }
}

#[async_trait]
impl SessionProvider for FirebaseAuth {
    fn current_user(&self) -> Option<UserProfile> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|state| state.profile.clone())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile, AuthError> {
        let account = self
            .accounts_call(
                "signInWithPassword",
                json!({"email": email, "password": password, "returnSecureToken": true}),
            )
            .await?;
        Ok(self.store(account, ""))
    }

    async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, AuthError> {
        let created = self
            .accounts_call(
                "signUp",
                json!({"email": email, "password": password, "returnSecureToken": true}),
            )
            .await?;
        let updated = self
            .accounts_call(
                "update",
                json!({
                    "idToken": created.id_token,
                    "displayName": username,
                    "returnSecureToken": true
                }),
            )
            .await?;
        Ok(self.store(updated, username))
    }

    fn sign_out(&self) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn auth(server: &mockito::Server) -> FirebaseAuth {
        FirebaseAuth::new(reqwest::Client::new(), "test-key", server.url(), server.url())
    }

    fn account_body(name: &str, token: &str, expires_in: &str) -> String {
        json!({
            "localId": "uid-1",
            "email": "alice@example.com",
            "displayName": name,
            "idToken": token,
            "refreshToken": "refresh-1",
            "expiresIn": expires_in
        })
        .to_string()
    }

    #[tokio::test]
    async fn sign_in_stores_profile_and_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/accounts:signInWithPassword")
            .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
            .match_body(Matcher::PartialJson(json!({
                "email": "alice@example.com",
                "password": "pw",
                "returnSecureToken": true
            })))
            .with_body(account_body("Alice", "id-1", "3600"))
            .create_async()
            .await;

        let auth = auth(&server);
        let profile = auth.sign_in("alice@example.com", "pw").await.unwrap();

        mock.assert_async().await;
        assert_eq!(profile.display_name, "Alice");
        assert_eq!(auth.current_user(), Some(profile));
        assert_eq!(auth.id_token().await.unwrap().expose_secret(), "id-1");
    }

    #[tokio::test]
    async fn sign_up_sets_display_name() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/accounts:signUp")
            .match_query(Matcher::Any)
            .with_body(account_body("", "id-new", "3600"))
            .create_async()
            .await;
        let update = server
            .mock("POST", "/v1/accounts:update")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({
                "idToken": "id-new",
                "displayName": "alice"
            })))
            .with_body(account_body("alice", "id-2", "3600"))
            .create_async()
            .await;

        let auth = auth(&server);
        let profile = auth.sign_up("alice", "alice@example.com", "pw").await.unwrap();

        update.assert_async().await;
        assert_eq!(profile.display_name, "alice");
    }

    #[tokio::test]
    async fn rejected_credentials_are_a_generic_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/accounts:signInWithPassword")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"code":400,"message":"INVALID_LOGIN_CREDENTIALS"}}"#)
            .create_async()
            .await;

        let auth = auth(&server);
        let result = auth.sign_in("alice@example.com", "bad").await;
        assert!(matches!(result, Err(AuthError::Failed(_))));
        assert!(auth.current_user().is_none());
        assert!(matches!(
            auth.id_token().await,
            Err(GatewayError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn expiring_token_is_refreshed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/accounts:signInWithPassword")
            .match_query(Matcher::Any)
            .with_body(account_body("Alice", "id-old", "30"))
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/v1/token")
            .match_query(Matcher::Any)
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "refresh-1".into()),
            ]))
            .with_body(r#"{"id_token":"id-fresh","refresh_token":"refresh-2","expires_in":"3600"}"#)
            .create_async()
            .await;

        let auth = auth(&server);
        auth.sign_in("alice@example.com", "pw").await.unwrap();
        let token = auth.id_token().await.unwrap();

        refresh.assert_async().await;
        assert_eq!(token.expose_secret(), "id-fresh");
    }
}
