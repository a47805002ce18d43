//! Bounded completion cache keyed by a SHA-256 digest of the request.

use magnet_core::provider::{ProviderRequest, ProviderResponse};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// FIFO-evicting response cache, safe to share between invocations.
pub struct ResponseCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, ProviderResponse>,
    order: VecDeque<String>,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn get(&self, key: &str) -> Option<ProviderResponse> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.get(key).cloned()
    }

    pub fn insert(&self, key: String, response: ProviderResponse) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.entries.contains_key(&key) {
            inner.entries.insert(key, response);
            return;
        }
        while inner.order.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
        inner.order.push_back(key.clone());
        inner.entries.insert(key, response);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Digest of the parts of a request that determine the response.
///
/// Message ids and timestamps are excluded so identical conversations
/// share a key.
pub fn cache_key(request: &ProviderRequest) -> String {
    let messages: Vec<serde_json::Value> = request
        .messages
        .iter()
        .map(|m| {
            serde_json::json!({
                "role": m.role,
                "content": m.content,
                "tool_calls": m.tool_calls,
                "tool_call_id": m.tool_call_id,
            })
        })
        .collect();

    let material = serde_json::json!({
        "model": request.model,
        "messages": messages,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
        "tools": request.tools,
        "tool_choice": request.tool_choice,
        "stop": request.stop,
    });

    let mut hasher = Sha256::new();
    hasher.update(material.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use magnet_core::message::Message;
    use magnet_core::provider::ToolChoice;

    fn request(question: &str) -> ProviderRequest {
        ProviderRequest {
            model: "gpt-4o".into(),
            messages: vec![Message::system("prompt"), Message::user(question)],
            temperature: 0.2,
            max_tokens: None,
            tools: vec![],
            tool_choice: Some(ToolChoice::Required),
            stop: vec![],
        }
    }

    fn response(text: &str) -> ProviderResponse {
        ProviderResponse {
            message: Message::assistant(text),
            usage: None,
            model: "gpt-4o".into(),
        }
    }

    #[test]
    fn key_ignores_message_identity() {
        assert_eq!(cache_key(&request("refunds?")), cache_key(&request("refunds?")));
        assert_ne!(cache_key(&request("refunds?")), cache_key(&request("shipping?")));
    }

    #[test]
    fn key_depends_on_tool_choice() {
        let mut other = request("refunds?");
        other.tool_choice = Some(ToolChoice::Auto);
        assert_ne!(cache_key(&request("refunds?")), cache_key(&other));
    }

    #[test]
    fn evicts_oldest_first() {
        let cache = ResponseCache::new(2);
        cache.insert("a".into(), response("A"));
        cache.insert("b".into(), response("B"));
        cache.insert("c".into(), response("C"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("c").unwrap().message.content, "C");
    }

    #[test]
    fn reinsert_does_not_grow() {
        let cache = ResponseCache::new(2);
        cache.insert("a".into(), response("A"));
        cache.insert("a".into(), response("A2"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").unwrap().message.content, "A2");
    }
}
