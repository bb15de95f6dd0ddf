use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use reqwest::Url;
use reqwest::header::ACCEPT;
use secrecy::ExposeSecret;
use serde_json::{Value, json};

use super::auth::FirebaseAuth;
use super::error_for_status;
use super::push_id::PushIdGenerator;
use super::stream::{SseDecoder, SseEvent, apply_event, messages_from_tree};
use crate::common::types::now_millis;
use crate::common::{Channel, GatewayError, Message};
use crate::gateway::{ChannelDirectory, MessageFeed, MessageStore, validate_channel_id};

const MESSAGES_NODE: &str = "messages";
const CHANNELS_NODE: &str = "channel";

/// Realtime Database over REST; messages live at `messages/{channel}/{id}`,
/// channels at `channel/{id}`.
pub struct FirebaseDatabase {
    http: reqwest::Client,
    base: Url,
    auth: Arc<FirebaseAuth>,
    ids: PushIdGenerator,
}

impl FirebaseDatabase {
    pub fn new(
        http: reqwest::Client,
        database_url: &str,
        auth: Arc<FirebaseAuth>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let base = Url::parse(database_url)?;
        if base.cannot_be_a_base() {
            return Err(format!("database URL {database_url} cannot hold paths").into());
        }
        Ok(Self {
            http,
            base,
            auth,
            ids: PushIdGenerator::new(),
        })
    }

    /// `{base}/{segments...}.json?auth={id token}`
    async fn node_url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let token = self.auth.id_token().await?;
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            if let Some((last, parents)) = segments.split_last() {
                path.extend(parents);
                path.push(&format!("{last}.json"));
            }
        }
        url.query_pairs_mut().append_pair("auth", token.expose_secret());
        Ok(url)
    }

    async fn put(&self, segments: &[&str], body: &Value) -> Result<(), GatewayError> {
        let url = self.node_url(segments).await?;
        let response = self.http.put(url).json(body).send().await?;
        error_for_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl MessageStore for FirebaseDatabase {
    fn allocate_id(&self) -> Option<String> {
        Some(self.ids.generate(now_millis()))
    }

    async fn append(&self, channel_id: &str, message: &Message) -> Result<(), GatewayError> {
        validate_channel_id(channel_id)?;
        let body = serde_json::to_value(message)?;
        self.put(&[MESSAGES_NODE, channel_id, &message.id], &body)
            .await
    }

    async fn watch(&self, channel_id: &str) -> Result<MessageFeed, GatewayError> {
        validate_channel_id(channel_id)?;
        let url = self.node_url(&[MESSAGES_NODE, channel_id]).await?;
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = error_for_status(response).await?;
        log::debug!("Listening on messages/{channel_id}");

        let state = ListenState {
            body: response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
                .boxed(),
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            tree: Value::Null,
            last: None,
            done: false,
        };
        Ok(stream::unfold(state, next_snapshot).boxed())
    }
}

struct ListenState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<SseEvent>,
    tree: Value,
    last: Option<Vec<Message>>,
    done: bool,
}

async fn next_snapshot(
    mut state: ListenState,
) -> Option<(Result<Vec<Message>, GatewayError>, ListenState)> {
    if state.done {
        return None;
    }

    loop {
        while let Some(event) = state.pending.pop_front() {
            match apply_event(&mut state.tree, &event) {
                Ok(true) => {
                    let messages = messages_from_tree(&state.tree);
                    if state.last.as_ref() != Some(&messages) {
                        state.last = Some(messages.clone());
                        return Some((Ok(messages), state));
                    }
                }
                Ok(false) => {}
                Err(err) => {
                    state.done = true;
                    return Some((Err(err), state));
                }
            }
        }

        match state.body.next().await {
            Some(Ok(chunk)) => {
                let events = state.decoder.feed(&chunk);
                state.pending.extend(events);
            }
            Some(Err(err)) => {
                state.done = true;
                return Some((Err(err.into()), state));
            }
            None => {
                state.done = true;
                return Some((
                    Err(GatewayError::SubscriptionEnded("stream closed".into())),
                    state,
                ));
            }
        }
    }
}

/// Channel records are `{name, createAt}` objects; older records hold only
/// the name as a bare string.
fn channels_from_node(node: Value) -> Vec<Channel> {
    let Value::Object(children) = node else {
        return Vec::new();
    };
    children
        .into_iter()
        .filter_map(|(id, value)| match value {
            Value::String(name) => Some(Channel {
                id,
                name,
                create_at: 0,
            }),
            Value::Object(record) => Some(Channel {
                name: record
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                create_at: record
                    .get("createAt")
                    .and_then(Value::as_i64)
                    .unwrap_or_default(),
                id,
            }),
            other => {
                log::debug!("Skipping channel {id} with value {other}");
                None
            }
        })
        .collect()
}

#[async_trait]
impl ChannelDirectory for FirebaseDatabase {
    async fn list(&self) -> Result<Vec<Channel>, GatewayError> {
        let url = self.node_url(&[CHANNELS_NODE]).await?;
        let response = error_for_status(self.http.get(url).send().await?).await?;
        let node: Value = response.json().await?;
        Ok(channels_from_node(node))
    }

    async fn create(&self, name: &str) -> Result<Channel, GatewayError> {
        let create_at = now_millis();
        let channel = Channel {
            id: self.ids.generate(create_at),
            name: name.to_string(),
            create_at,
        };
        self.put(
            &[CHANNELS_NODE, &channel.id],
            &json!({"name": channel.name, "createAt": channel.create_at}),
        )
        .await?;
        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::SessionProvider;
    use mockito::Matcher;

    async fn signed_in(server: &mut mockito::Server) -> Arc<FirebaseAuth> {
        server
            .mock("POST", "/v1/accounts:signInWithPassword")
            .match_query(Matcher::Any)
            .with_body(
                json!({
                    "localId": "uid-1",
                    "displayName": "Alice",
                    "idToken": "id-1",
                    "refreshToken": "r",
                    "expiresIn": "3600"
                })
                .to_string(),
            )
            .create_async()
            .await;
        let auth = Arc::new(FirebaseAuth::new(
            reqwest::Client::new(),
            "key",
            server.url(),
            server.url(),
        ));
        auth.sign_in("alice@example.com", "pw").await.unwrap();
        auth
    }

    fn database(server: &mockito::Server, auth: Arc<FirebaseAuth>) -> FirebaseDatabase {
        FirebaseDatabase::new(reqwest::Client::new(), &server.url(), auth).unwrap()
    }

    #[tokio::test]
    async fn append_puts_record_under_its_key() {
        let mut server = mockito::Server::new_async().await;
        let auth = signed_in(&mut server).await;
        let mock = server
            .mock("PUT", "/messages/general/m-1.json")
            .match_query(Matcher::UrlEncoded("auth".into(), "id-1".into()))
            .match_body(Matcher::Json(json!({
                "id": "m-1",
                "senderId": "uid-1",
                "senderName": "Alice",
                "message": "hi",
                "createAt": 42
            })))
            .with_body("{}")
            .create_async()
            .await;

        let message = Message {
            id: "m-1".into(),
            sender_id: "uid-1".into(),
            sender_name: "Alice".into(),
            message: Some("hi".into()),
            image_url: None,
            create_at: 42,
        };
        database(&server, auth).append("general", &message).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn watch_replays_stream_events_as_ordered_snapshots() {
        let mut server = mockito::Server::new_async().await;
        let auth = signed_in(&mut server).await;
        let body = concat!(
            "event: put\n",
            "data: {\"path\":\"/\",\"data\":{\"-b\":{\"id\":\"b\",\"senderId\":\"u\",\"senderName\":\"n\",\"message\":\"second\",\"createAt\":20}}}\n\n",
            "event: keep-alive\ndata: null\n\n",
            "event: put\n",
            "data: {\"path\":\"/-a\",\"data\":{\"id\":\"a\",\"senderId\":\"u\",\"senderName\":\"n\",\"message\":\"first\",\"createAt\":10}}\n\n",
            "event: cancel\ndata: permission denied\n\n",
        );
        server
            .mock("GET", "/messages/general.json")
            .match_query(Matcher::Any)
            .match_header("accept", "text/event-stream")
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let mut feed = database(&server, auth).watch("general").await.unwrap();

        let first = feed.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 1);
        let second = feed.next().await.unwrap().unwrap();
        let ids: Vec<_> = second.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert!(matches!(
            feed.next().await,
            Some(Err(GatewayError::SubscriptionEnded(_)))
        ));
        assert!(feed.next().await.is_none());
    }

    #[tokio::test]
    async fn list_reads_both_channel_shapes() {
        let mut server = mockito::Server::new_async().await;
        let auth = signed_in(&mut server).await;
        server
            .mock("GET", "/channel.json")
            .match_query(Matcher::Any)
            .with_body(r#"{"-a":{"name":"general","createAt":5},"legacy":"random"}"#)
            .create_async()
            .await;

        let channels = database(&server, auth).list().await.unwrap();
        assert_eq!(
            channels,
            vec![
                Channel {
                    id: "-a".into(),
                    name: "general".into(),
                    create_at: 5
                },
                Channel {
                    id: "legacy".into(),
                    name: "random".into(),
                    create_at: 0
                },
            ]
        );
    }

    #[tokio::test]
    async fn empty_channel_node_lists_nothing() {
        let mut server = mockito::Server::new_async().await;
        let auth = signed_in(&mut server).await;
        server
            .mock("GET", "/channel.json")
            .match_query(Matcher::Any)
            .with_body("null")
            .create_async()
            .await;

        assert!(database(&server, auth).list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn requests_require_a_session() {
        let server = mockito::Server::new_async().await;
        let auth = Arc::new(FirebaseAuth::new(
            reqwest::Client::new(),
            "key",
            server.url(),
            server.url(),
        ));
        let result = database(&server, auth).list().await;
        assert!(matches!(result, Err(GatewayError::Unauthenticated)));
    }
}
