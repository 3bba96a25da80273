//! Scripted backend used by unit tests in place of the remote API.

use crate::error::{RemoteError, Result};
use crate::image::provider::{
    ContentRequest, ContentResponse, ImageBackend, InlineImage, ResponsePart,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Semaphore;

pub(crate) fn text_part(text: &str) -> ResponsePart {
    ResponsePart {
        text: Some(text.to_string()),
        inline_image: None,
    }
}

pub(crate) fn image_part(mime_type: &str, data: &str) -> ResponsePart {
    ResponsePart {
        text: None,
        inline_image: Some(InlineImage {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        }),
    }
}

enum Script {
    Reply(Vec<ResponsePart>),
    Fail { status: u16, message: String },
}

/// Replies with the same scripted outcome to every request.
///
/// When gated, each request waits for a permit released by [`release`].
///
/// [`release`]: ScriptedBackend::release
pub(crate) struct ScriptedBackend {
    script: Script,
    gate: Option<Semaphore>,
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, ContentRequest)>>,
}

impl ScriptedBackend {
    pub(crate) fn replying(parts: Vec<ResponsePart>) -> Self {
        Self {
            script: Script::Reply(parts),
            gate: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(status: u16, message: &str) -> Self {
        Self {
            script: Script::Fail {
                status,
                message: message.to_string(),
            },
            ..Self::replying(Vec::new())
        }
    }

    /// Holds every request until a permit is released.
    pub(crate) fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    /// Lets one held request complete.
    pub(crate) fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<(String, ContentRequest)> {
        self.requests.lock().unwrap().clone()
    }

    /// Yields until at least `n` requests have reached the backend.
    pub(crate) async fn wait_for_calls(&self, n: usize) {
        while self.calls() < n {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl ImageBackend for ScriptedBackend {
    async fn generate_content(
        &self,
        api_key: &str,
        request: &ContentRequest,
    ) -> Result<ContentResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((api_key.to_string(), request.clone()));
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        match &self.script {
            Script::Reply(parts) => Ok(ContentResponse {
                parts: parts.clone(),
            }),
            Script::Fail { status: 429, message } => Err(RemoteError::RateLimited {
                message: message.clone(),
                retry_after: None,
            }
            .into()),
            Script::Fail { status, message } => Err(RemoteError::Api {
                status: *status,
                message: message.clone(),
            }
            .into()),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
