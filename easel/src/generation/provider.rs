//! HTTP clients for upstream model providers.
//!
//! Both the prompt optimizer and the image models live behind OpenAI-style
//! endpoints. The trait keeps the pipeline testable without a network; the
//! mock records every call and replays queued responses.

use async_trait::async_trait;
use base64::Engine as _;
use serde_json::{Value, json};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider request timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("provider response missing {0}")]
    Malformed(String),

    #[error("source image is not valid base64")]
    BadSourceImage(#[from] base64::DecodeError),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Where to send a request: the active configuration's endpoint.
#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    pub base_url: String,
    pub api_key: String,
}

impl ProviderEndpoint {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

/// A chat completion request for the prompt optimizer.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

/// An image generation request for one model.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    /// Requested output dimensions, e.g. "1024x1024".
    pub size: Option<String>,
    /// Requested image file format, e.g. "png".
    pub output_format: Option<String>,
    /// Base64-encoded source image; routes the call to the edits endpoint.
    pub source_image_b64: Option<String>,
    pub timeout: Duration,
}

#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Run a chat completion and return the assistant message text.
    async fn complete_text(
        &self,
        endpoint: &ProviderEndpoint,
        request: &ChatRequest,
    ) -> ProviderResult<String>;

    /// Run an image generation (or edit) and return the raw response body.
    async fn generate_image(
        &self,
        endpoint: &ProviderEndpoint,
        request: &ImageRequest,
    ) -> ProviderResult<Value>;
}

/// Production client backed by reqwest.
#[derive(Debug, Clone, Default)]
pub struct ReqwestProviderClient {
    client: reqwest::Client,
}

impl ReqwestProviderClient {
    pub fn new() -> Self {
        Self::default()
    }

    async fn check_status(response: reqwest::Response) -> ProviderResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let body = body.chars().take(512).collect();
        Err(ProviderError::Status {
            status: status.as_u16(),
            body,
        })
    }

    fn map_send_error(err: reqwest::Error, timeout: Duration) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(timeout)
        } else {
            ProviderError::Transport(err)
        }
    }
}

/// JSON body for the generations endpoint. Always one image; `size` and
/// `output_format` are forwarded only when the caller set them.
fn generation_body(request: &ImageRequest) -> Value {
    let mut body = json!({
        "model": request.model,
        "prompt": request.prompt,
        "n": 1,
    });
    if let Some(size) = &request.size {
        body["size"] = json!(size);
    }
    if let Some(format) = &request.output_format {
        body["output_format"] = json!(format);
    }
    body
}

#[async_trait]
impl ProviderClient for ReqwestProviderClient {
    async fn complete_text(
        &self,
        endpoint: &ProviderEndpoint,
        request: &ChatRequest,
    ) -> ProviderResult<String> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system_prompt {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": request.user_prompt}));

        let response = self
            .client
            .post(endpoint.url("/v1/chat/completions"))
            .bearer_auth(&endpoint.api_key)
            .timeout(request.timeout)
            .json(&json!({
                "model": request.model,
                "messages": messages,
                "max_tokens": request.max_tokens,
                "temperature": request.temperature,
            }))
            .send()
            .await
            .map_err(|e| Self::map_send_error(e, request.timeout))?;

        let body: Value = Self::check_status(response).await?.json().await?;
        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Malformed("choices[0].message.content".to_string()))
    }

    async fn generate_image(
        &self,
        endpoint: &ProviderEndpoint,
        request: &ImageRequest,
    ) -> ProviderResult<Value> {
        let builder = match &request.source_image_b64 {
            // Image-to-image goes to the edits endpoint as multipart
            Some(source_b64) => {
                let bytes = base64::engine::general_purpose::STANDARD.decode(source_b64)?;
                let part = reqwest::multipart::Part::bytes(bytes)
                    .file_name("image.png")
                    .mime_str("image/png")?;
                let mut form = reqwest::multipart::Form::new()
                    .text("model", request.model.clone())
                    .text("prompt", request.prompt.clone())
                    .text("n", "1")
                    .part("image", part);
                // The edits endpoint takes no format field, only a size
                if let Some(size) = &request.size {
                    form = form.text("size", size.clone());
                }
                self.client
                    .post(endpoint.url("/v1/images/edits"))
                    .multipart(form)
            }
            None => self
                .client
                .post(endpoint.url("/v1/images/generations"))
                .json(&generation_body(request)),
        };

        let response = builder
            .bearer_auth(&endpoint.api_key)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| Self::map_send_error(e, request.timeout))?;

        Ok(Self::check_status(response).await?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_request() -> ImageRequest {
        ImageRequest {
            model: "m1".to_string(),
            prompt: "a lighthouse at dusk".to_string(),
            size: Some("1024x1024".to_string()),
            output_format: Some("png".to_string()),
            source_image_b64: None,
            timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn generation_body_sends_the_output_format_key() {
        let body = generation_body(&image_request());

        assert_eq!(body["model"], "m1");
        assert_eq!(body["prompt"], "a lighthouse at dusk");
        assert_eq!(body["n"], 1);
        assert_eq!(body["size"], "1024x1024");
        assert_eq!(body["output_format"], "png");
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn unset_options_are_omitted_from_the_body() {
        let mut request = image_request();
        request.size = None;
        request.output_format = None;

        let body = generation_body(&request);

        assert!(body.get("size").is_none());
        assert!(body.get("output_format").is_none());
    }
}

#[cfg(test)]
pub use mock::MockProviderClient;

#[cfg(test)]
mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::{HashMap, VecDeque};

    /// Test double that replays queued responses and records every call it
    /// receives. Image responses are keyed by model name because the fan-out
    /// runs model calls concurrently, so arrival order is not deterministic.
    #[derive(Default)]
    pub struct MockProviderClient {
        text_responses: Mutex<VecDeque<ProviderResult<String>>>,
        image_responses: Mutex<HashMap<String, VecDeque<ProviderResult<Value>>>>,
        text_calls: Mutex<Vec<ChatRequest>>,
        image_calls: Mutex<Vec<ImageRequest>>,
    }

    impl MockProviderClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn queue_text(&self, response: ProviderResult<String>) {
            self.text_responses.lock().push_back(response);
        }

        pub fn queue_image(&self, model: &str, response: ProviderResult<Value>) {
            self.image_responses
                .lock()
                .entry(model.to_string())
                .or_default()
                .push_back(response);
        }

        pub fn text_calls(&self) -> Vec<ChatRequest> {
            self.text_calls.lock().clone()
        }

        pub fn image_calls(&self) -> Vec<ImageRequest> {
            self.image_calls.lock().clone()
        }
    }

    #[async_trait]
    impl ProviderClient for MockProviderClient {
        async fn complete_text(
            &self,
            _endpoint: &ProviderEndpoint,
            request: &ChatRequest,
        ) -> ProviderResult<String> {
            self.text_calls.lock().push(request.clone());
            self.text_responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Malformed("no queued text response".into())))
        }

        async fn generate_image(
            &self,
            _endpoint: &ProviderEndpoint,
            request: &ImageRequest,
        ) -> ProviderResult<Value> {
            self.image_calls.lock().push(request.clone());
            self.image_responses
                .lock()
                .get_mut(&request.model)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Err(ProviderError::Malformed("no queued image response".into())))
        }
    }
}
