//! Gemini API integration.
//!
//! Implements the GenerativeBackend trait against the Generative Language REST API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    BackendReply, GatewayError, GenerateCall, GenerativeBackend, InlineImage, OutputKind,
    ReplyPart, VideoCall, VideoJob, VideoStatus,
};
use crate::core::{Config, GatewayConfig};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini API backend.
#[derive(Clone)]
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl GeminiBackend {
    /// Create a backend with an explicit API key.
    pub fn new(api_key: impl Into<String>, config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create from configuration, reading the API key from the configured env var.
    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        let api_key = config
            .api_key()
            .ok_or_else(|| GatewayError::MissingCredentials(config.gateway.api_key_env.clone()))?;
        Self::new(api_key, &config.gateway)
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<String, GatewayError> {
        let response =
            self.client.post(url).header(API_KEY_HEADER, &self.api_key).json(body).send().await?;
        read_body(response).await
    }
}

async fn read_body(response: reqwest::Response) -> Result<String, GatewayError> {
    let status = response.status();
    let payload = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(GatewayError::Api {
            status: status.as_u16(),
            message: extract_api_error(&payload),
        });
    }
    Ok(payload)
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    async fn generate(&self, call: GenerateCall) -> Result<BackendReply, GatewayError> {
        let url = self.model_url(&call.model, "generateContent");
        let body = generate_body(&call);

        tracing::debug!(model = %call.model, images = call.images.len(), "Gemini generateContent");
        let payload = self.post_json(&url, &body).await?;

        let parsed: GenerateResponse = serde_json::from_str(&payload)
            .map_err(|e| GatewayError::Parse(format!("generateContent response: {e}")))?;
        Ok(parsed.into_reply())
    }

    async fn start_video(&self, call: VideoCall) -> Result<VideoJob, GatewayError> {
        let url = self.model_url(&call.model, "predictLongRunning");
        let mut instance = json!({
            "prompt": call.prompt,
            "image": video_frame(&call.image),
        });
        if let Some(last) = &call.last_frame {
            instance["lastFrame"] = video_frame(last);
        }
        let body = json!({ "instances": [instance] });

        tracing::debug!(model = %call.model, "Gemini predictLongRunning");
        let payload = self.post_json(&url, &body).await?;

        let operation: Operation = serde_json::from_str(&payload)
            .map_err(|e| GatewayError::Parse(format!("video operation: {e}")))?;
        Ok(VideoJob { name: operation.name })
    }

    async fn poll_video(&self, job: &VideoJob) -> Result<VideoStatus, GatewayError> {
        let url = format!("{}/{}", self.base_url, job.name);
        let response = self.client.get(&url).header(API_KEY_HEADER, &self.api_key).send().await?;
        let payload = read_body(response).await?;

        let operation: Operation = serde_json::from_str(&payload)
            .map_err(|e| GatewayError::Parse(format!("video operation: {e}")))?;
        Ok(operation.status())
    }

    async fn download(&self, uri: &str) -> Result<Vec<u8>, GatewayError> {
        let response = self.client.get(uri).header(API_KEY_HEADER, &self.api_key).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message: extract_api_error(&body),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

fn generate_body(call: &GenerateCall) -> Value {
    let mut parts = vec![json!({ "text": call.prompt })];
    parts.extend(call.images.iter().map(|image| {
        json!({ "inlineData": { "mimeType": image.mime_type, "data": image.data } })
    }));

    let mut body = json!({ "contents": [{ "role": "user", "parts": parts }] });
    match &call.output {
        OutputKind::Text => {}
        OutputKind::Json(schema) => {
            body["generationConfig"] = json!({
                "responseMimeType": "application/json",
                "responseSchema": schema,
            });
        }
        OutputKind::Image(ratio) => {
            body["generationConfig"] = json!({
                "responseModalities": ["IMAGE", "TEXT"],
                "imageConfig": { "aspectRatio": ratio.as_str() },
            });
        }
    }
    body
}

fn video_frame(image: &InlineImage) -> Value {
    json!({ "bytesBase64Encoded": image.data, "mimeType": image.mime_type })
}

/// Pull the human-readable message out of an API error body.
fn extract_api_error(body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: Option<ErrorBody>,
    }
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        status: Option<String>,
    }

    match serde_json::from_str::<Envelope>(body) {
        Ok(Envelope { error: Some(err) }) => {
            let message = err.message.unwrap_or_else(|| "unknown error".to_string());
            match err.status {
                Some(status) => format!("{message} (status={status})"),
                None => message,
            }
        }
        _ => body.to_string(),
    }
}

/// generateContent response structure.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

impl GenerateResponse {
    fn into_reply(self) -> BackendReply {
        let parts = self
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| match (part.inline_data, part.text) {
                (Some(data), _) => Some(ReplyPart::Image(InlineImage::new(data.mime_type, data.data))),
                (None, Some(text)) => Some(ReplyPart::Text(text)),
                (None, None) => None,
            })
            .collect();
        BackendReply { parts }
    }
}

/// Long-running operation structure.
#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    error: Option<OperationError>,
    response: Option<OperationResponse>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    generate_video_response: Option<VideoResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResponse {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    video: Option<VideoFile>,
}

#[derive(Debug, Deserialize)]
struct VideoFile {
    uri: Option<String>,
}

impl Operation {
    fn status(self) -> VideoStatus {
        if let Some(error) = self.error {
            return VideoStatus::Failed {
                message: error.message.unwrap_or_else(|| "unknown error".to_string()),
            };
        }
        if !self.done {
            return VideoStatus::Pending;
        }
        let uri = self
            .response
            .and_then(|r| r.generate_video_response)
            .and_then(|r| r.generated_samples.into_iter().next())
            .and_then(|sample| sample.video)
            .and_then(|video| video.uri);
        match uri {
            Some(uri) => VideoStatus::Done { uri },
            None => VideoStatus::Failed { message: "operation finished without a video".to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AspectRatio;

    fn backend(server: &mockito::Server) -> GeminiBackend {
        let config = GatewayConfig { base_url: server.url(), ..GatewayConfig::default() };
        GeminiBackend::new("fake-key", &config).unwrap()
    }

    fn call(output: OutputKind) -> GenerateCall {
        GenerateCall {
            model: "gemini-2.5-flash".to_string(),
            prompt: "hello".to_string(),
            images: Vec::new(),
            output,
        }
    }

    #[test]
    fn test_json_body_carries_schema() {
        let body = generate_body(&call(OutputKind::Json(json!({"type": "OBJECT"}))));
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
    }

    #[test]
    fn test_image_body_carries_references() {
        let mut request = call(OutputKind::Image(AspectRatio::Story));
        request.images.push(InlineImage::new("image/png", "AAAA"));

        let body = generate_body(&request);
        assert_eq!(body["generationConfig"]["imageConfig"]["aspectRatio"], "9:16");
        assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["data"], "AAAA");
    }

    #[test]
    fn test_extract_api_error() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(extract_api_error(body), "API key not valid (status=INVALID_ARGUMENT)");
        assert_eq!(extract_api_error("plain"), "plain");
    }

    #[test]
    fn test_inline_data_reply_becomes_image_part() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"image/jpeg","data":"/9j/"}}]}}]}"#,
        )
        .unwrap();

        let reply = response.into_reply();
        assert_eq!(reply.parts, vec![ReplyPart::Image(InlineImage::new("image/jpeg", "/9j/"))]);
    }

    #[test]
    fn test_operation_status() {
        let pending: Operation = serde_json::from_str(r#"{"name":"op/1"}"#).unwrap();
        assert_eq!(pending.status(), VideoStatus::Pending);

        let done: Operation = serde_json::from_str(
            r#"{"name":"op/1","done":true,"response":{"generateVideoResponse":{"generatedSamples":[{"video":{"uri":"https://x/v.mp4"}}]}}}"#,
        )
        .unwrap();
        assert_eq!(done.status(), VideoStatus::Done { uri: "https://x/v.mp4".to_string() });

        let failed: Operation =
            serde_json::from_str(r#"{"name":"op/1","done":true,"error":{"message":"blocked"}}"#)
                .unwrap();
        assert_eq!(failed.status(), VideoStatus::Failed { message: "blocked".to_string() });
    }

    #[tokio::test]
    async fn test_generate_parses_text_and_image_parts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .match_header("x-goog-api-key", "fake-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"candidates":[{"content":{"parts":[{"text":"caption"},{"inlineData":{"mimeType":"image/png","data":"AAAA"}}]}}]}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let reply = backend(&server).generate(call(OutputKind::Text)).await.unwrap();
        assert_eq!(reply.joined_text(), "caption");
        assert_eq!(reply.first_image().unwrap().data, "AAAA");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_maps_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .with_status(429)
            .with_body(r#"{"error":{"message":"quota exceeded"}}"#)
            .create_async()
            .await;

        let err = backend(&server).generate(call(OutputKind::Text)).await.unwrap_err();
        match err {
            GatewayError::Api { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_video_job_lifecycle() {
        let mut server = mockito::Server::new_async().await;
        let _start = server
            .mock("POST", "/models/veo:predictLongRunning")
            .with_status(200)
            .with_body(r#"{"name":"models/veo/operations/abc"}"#)
            .create_async()
            .await;
        let _poll = server
            .mock("GET", "/models/veo/operations/abc")
            .with_status(200)
            .with_body(format!(
                r#"{{"name":"models/veo/operations/abc","done":true,"response":{{"generateVideoResponse":{{"generatedSamples":[{{"video":{{"uri":"{}/files/v.mp4"}}}}]}}}}}}"#,
                server.url()
            ))
            .create_async()
            .await;
        let _file = server
            .mock("GET", "/files/v.mp4")
            .with_status(200)
            .with_body("video-bytes")
            .create_async()
            .await;

        let backend = backend(&server);
        let job = backend
            .start_video(VideoCall {
                model: "veo".to_string(),
                prompt: "slow zoom".to_string(),
                image: InlineImage::new("image/png", "AAAA"),
                last_frame: None,
            })
            .await
            .unwrap();
        assert_eq!(job.name, "models/veo/operations/abc");

        let VideoStatus::Done { uri } = backend.poll_video(&job).await.unwrap() else {
            panic!("expected finished job");
        };
        assert_eq!(backend.download(&uri).await.unwrap(), b"video-bytes");
    }
}
