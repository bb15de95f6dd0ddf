//! Realtime Database streaming: `text/event-stream` framing and the local
//! mirror of the watched node.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::common::{GatewayError, Message};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental decoder; chunks may split lines or UTF-8 sequences anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            let line = line.strip_suffix('\r').unwrap_or(&line);

            if line.is_empty() {
                if self.event.is_some() || !self.data.is_empty() {
                    events.push(SseEvent {
                        event: self.event.take().unwrap_or_else(|| "message".to_string()),
                        data: self.data.join("\n"),
                    });
                    self.data.clear();
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }

        events
    }
}

#[derive(Debug, Deserialize)]
struct NodeChange {
    path: String,
    data: Value,
}

/// Applies one server event to the mirror. `Ok(true)` when the mirror changed.
pub fn apply_event(tree: &mut Value, event: &SseEvent) -> Result<bool, GatewayError> {
    match event.event.as_str() {
        "put" => {
            let change: NodeChange = serde_json::from_str(&event.data)?;
            apply_put(tree, &change.path, change.data);
            Ok(true)
        }
        "patch" => {
            let change: NodeChange = serde_json::from_str(&event.data)?;
            apply_patch(tree, &change.path, change.data);
            Ok(true)
        }
        "keep-alive" => Ok(false),
        "cancel" => Err(GatewayError::SubscriptionEnded(format!(
            "cancelled: {}",
            event.data
        ))),
        "auth_revoked" => Err(GatewayError::SubscriptionEnded("auth revoked".into())),
        other => {
            log::debug!("Ignoring stream event `{other}`");
            Ok(false)
        }
    }
}

/// Replaces the node at `path`; `null` removes it.
pub fn apply_put(tree: &mut Value, path: &str, data: Value) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        *tree = data;
        return;
    };

    let mut node = tree;
    for segment in parents {
        node = ensure_object(node)
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    let parent = ensure_object(node);
    if data.is_null() {
        parent.remove(*last);
    } else {
        parent.insert(last.to_string(), data);
    }
}

/// Merges each child of `data` into the node at `path`.
pub fn apply_patch(tree: &mut Value, path: &str, data: Value) {
    let Value::Object(children) = data else {
        apply_put(tree, path, data);
        return;
    };
    let base = path.trim_end_matches('/');
    for (key, value) in children {
        apply_put(tree, &format!("{base}/{key}"), value);
    }
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced by an object"),
    }
}

/// Ordered view of a channel node: ascending `createAt`, key as tie-break.
/// Children that are not message records are skipped.
pub fn messages_from_tree(tree: &Value) -> Vec<Message> {
    let Value::Object(children) = tree else {
        return Vec::new();
    };

    let mut messages: Vec<(String, Message)> = children
        .iter()
        .filter_map(|(key, value)| match serde_json::from_value::<Message>(value.clone()) {
            Ok(mut message) => {
                if message.id.is_empty() {
                    message.id = key.clone();
                }
                Some((key.clone(), message))
            }
            Err(err) => {
                log::debug!("Skipping malformed message {key}: {err}");
                None
            }
        })
        .collect();

    messages.sort_by(|(a_key, a), (b_key, b)| {
        a.create_at.cmp(&b.create_at).then_with(|| a_key.cmp(b_key))
    });
    messages.into_iter().map(|(_, message)| message).collect()
}
