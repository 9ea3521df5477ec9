//! Chat request builder for OpenAI-compatible `/chat/completions`.
//! One system instruction, one user turn with text plus the screenshot at low detail.
//! Streaming is always on; the reply is consumed by `stream::read_stream`.

use serde::{Deserialize, Serialize};

use crate::settings::Settings;

const SYSTEM_PROMPT: &str = "You are a helpful assistant capable of analyzing images.";
const DEFAULT_QUESTION: &str = "What's in this image?";
const MAX_TOKENS: u32 = 300;

// *************** Request Types ***************

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub presence_penalty: f64,
    pub frequency_penalty: f64,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrlDetail },
}

#[derive(Debug, Serialize)]
pub struct ImageUrlDetail {
    pub url: String,
    pub detail: String,
}

// *************** Stream Chunk Types ***************

/// One streamed completion chunk: `{"choices":[{"delta":{"content":"..."}}]}`.
#[derive(Debug, Deserialize)]
pub struct ChatChunk {
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChunkChoice {
    pub delta: ChunkDelta,
}

#[derive(Debug, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

// *************** Public API ***************

/// Endpoint for the configured host. A trailing slash on the host is ignored.
pub fn completions_url(api_host: &str) -> String {
    format!("{}/chat/completions", api_host.trim_end_matches('/'))
}

/// Builds the streaming request. Sampling parameters are copied from `settings` as-is,
/// NaN included.
pub fn build_request(user_text: &str, image_base64: &str, settings: &Settings) -> ChatRequest {
    let question = if user_text.trim().is_empty() {
        DEFAULT_QUESTION
    } else {
        user_text
    };

    ChatRequest {
        model: settings.model.clone(),
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: MessageContent::Text(SYSTEM_PROMPT.to_string()),
            },
            ChatMessage {
                role: "user".to_string(),
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: question.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrlDetail {
                            url: format!("data:image/jpeg;base64,{}", image_base64),
                            detail: "low".to_string(),
                        },
                    },
                ]),
            },
        ],
        max_tokens: MAX_TOKENS,
        temperature: settings.temperature,
        top_p: settings.top_p,
        presence_penalty: settings.presence_penalty,
        frequency_penalty: settings.frequency_penalty,
        stream: true,
    }
}

// *************** Tests ***************
