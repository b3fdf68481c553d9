/// Content envelope and Result Serialiser (spec §4.4).
///
/// A tool handler returns a plain `serde_json::Value`; this module turns
/// that into the wire-level `ToolCallResult` the MCP client expects, sniffing
/// base64 image payloads by magic bytes and falling back to JSON text for
/// anything else.
use base64::Engine;
use serde::Serialize;
use serde_json::Value;

/// Logged (not enforced) — result payloads above this size get a
/// `tracing::warn!` so oversized tool output doesn't go unnoticed.
const LARGE_TEXT_WARN_THRESHOLD: usize = 10_000;

const PNG_MAGIC: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];
const JPEG_MAGIC: [u8; 2] = [0xFF, 0xD8];

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum Content {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    ImageBase64 { data: String, mime_type: String },
    #[serde(rename = "image_url")]
    ImageUrl {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolCallResult {
    pub content: Vec<Content>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn ok(content: Vec<Content>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }
}

/// Serialise a handler's raw return value into a `ToolCallResult` (spec
/// §4.4). Never fails: anything unrecognised falls back to pretty-printed
/// JSON text.
pub fn serialize_result(value: Value) -> ToolCallResult {
    let content = to_content(value);
    ToolCallResult::ok(vec![content])
}

fn to_content(value: Value) -> Content {
    match value {
        Value::Null => Content::Text {
            text: "Tool executed successfully with no output".to_string(),
        },
        Value::String(s) => {
            if let Some(content) = sniff_base64_image(&s) {
                content
            } else {
                warn_if_large(&s);
                Content::Text { text: s }
            }
        }
        Value::Number(n) => Content::Text {
            text: n.to_string(),
        },
        Value::Bool(b) => Content::Text {
            text: b.to_string(),
        },
        Value::Array(_) | Value::Object(_) => {
            let text = serde_json::to_string_pretty(&value)
                .unwrap_or_else(|_| value.to_string());
            warn_if_large(&text);
            Content::Text { text }
        }
    }
}

fn warn_if_large(text: &str) {
    if text.len() > LARGE_TEXT_WARN_THRESHOLD {
        tracing::warn!(
            length = text.len(),
            "tool result text exceeds {LARGE_TEXT_WARN_THRESHOLD} characters"
        );
    }
}

/// Decide whether `s` is plausibly a base64-encoded image (spec §4.4: any of
/// length > ~1000, decodes as base64, or a `data:image/…` prefix) and if so
/// sniff its mime type from magic bytes, defaulting to PNG.
fn sniff_base64_image(s: &str) -> Option<Content> {
    let trimmed = s.trim();

    if let Some(rest) = trimmed.strip_prefix("data:image/") {
        let (mime, payload) = rest.split_once(';').unwrap_or((rest, ""));
        let data = payload
            .split_once("base64,")
            .map(|(_, d)| d)
            .unwrap_or(payload);
        return Some(Content::ImageBase64 {
            data: data.to_string(),
            mime_type: format!("image/{mime}"),
        });
    }

    if trimmed.len() < 8 {
        return None;
    }

    let looks_like_image = trimmed.len() > 1000
        || base64::engine::general_purpose::STANDARD.decode(trimmed).is_ok();
    if !looks_like_image {
        return None;
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(trimmed)
        .ok()?;
    let mime_type = if bytes.starts_with(&JPEG_MAGIC) {
        "image/jpeg"
    } else {
        "image/png"
    };
    Some(Content::ImageBase64 {
        data: trimmed.to_string(),
        mime_type: mime_type.to_string(),
    })
}

/// Build an `ImageContentUrl` content block (spec §3) for handlers that
/// return a reference to an already-hosted image rather than inline bytes.
pub fn image_url(url: impl Into<String>, mime_type: Option<String>, alt: Option<String>) -> Content {
    Content::ImageUrl {
        url: url.into(),
        mime_type,
        alt,
    }
}

/// Encode raw bytes (e.g. a tool that produces a screenshot) as a base64
/// image content block, sniffing the same magic bytes used on decode.
pub fn encode_image_bytes(bytes: &[u8]) -> Content {
    let mime_type = if bytes.starts_with(&PNG_MAGIC) {
        "image/png"
    } else if bytes.starts_with(&JPEG_MAGIC) {
        "image/jpeg"
    } else {
        "application/octet-stream"
    };
    Content::ImageBase64 {
        data: base64::engine::general_purpose::STANDARD.encode(bytes),
        mime_type: mime_type.to_string(),
    }
}
