use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::model::{VisionModel, VisionRequest, VisionResponse};

/// A vision model that returns queued canned replies, for dry runs and tests.
///
/// Replies are consumed in order; the last one repeats once the queue is
/// down to a single entry.
pub struct CannedModel {
    name: String,
    replies: Mutex<VecDeque<Result<String, String>>>,
    last_request: Mutex<Option<VisionRequest>>,
}

impl CannedModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replies: Mutex::new(VecDeque::new()),
            last_request: Mutex::new(None),
        }
    }

    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.push(Ok(response.into()));
        self
    }

    pub fn with_error(self, error: impl Into<String>) -> Self {
        self.push(Err(error.into()));
        self
    }

    fn push(&self, reply: Result<String, String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// The most recent request this model saw.
    pub fn last_request(&self) -> Option<VisionRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl VisionModel for CannedModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &VisionRequest) -> Result<VisionResponse> {
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }
        let reply = {
            let mut replies = self
                .replies
                .lock()
                .map_err(|_| anyhow!("canned reply queue poisoned"))?;
            if replies.len() > 1 {
                replies.pop_front()
            } else {
                replies.front().cloned()
            }
        };
        match reply {
            Some(Ok(content)) => Ok(VisionResponse {
                content,
                model: request.model.clone(),
                tokens_used: 0,
                latency_ms: 0,
            }),
            Some(Err(e)) => Err(anyhow!(e)),
            None => Err(anyhow!("no canned reply configured for '{}'", self.name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> VisionRequest {
        VisionRequest {
            model: "m".into(),
            system_prompt: String::new(),
            user_prompt: String::new(),
            image_base64: String::new(),
            mime_type: "image/png".into(),
            max_tokens: 10,
            temperature: 0.0,
        }
    }

    #[tokio::test]
    async fn replies_in_order_then_repeats_last() {
        let model = CannedModel::new("c").with_response("one").with_response("two");
        assert_eq!(model.complete(&request()).await.unwrap().content, "one");
        assert_eq!(model.complete(&request()).await.unwrap().content, "two");
        assert_eq!(model.complete(&request()).await.unwrap().content, "two");
    }

    #[tokio::test]
    async fn empty_queue_is_an_error() {
        assert!(CannedModel::new("c").complete(&request()).await.is_err());
    }
}
