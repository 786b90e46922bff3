//! Decides whether a request body is plain text, a JSON-encoded
//! multimodal payload, or caller-supplied streaming multimodal data.

use conduit_core::{read_to_vec, Request};

use crate::error::AgentError;
use crate::options::AgentOptions;
use crate::types::{ClassifiedInput, ClassifiedKind, MultimodalInput};

/// Reads `req` fully and classifies its body against `opts`.
///
/// Streaming multimodal data supplied directly on the options always
/// wins, since it carries byte-stream parts that cannot be reconstructed
/// from a JSON body. Otherwise a cheap substring sniff on the raw bytes
/// guards the more expensive JSON decode: only bodies that look like
/// they could be a multimodal envelope are ever parsed as one, and only
/// a payload with at least one part carrying inline bytes is accepted —
/// a plain-text body that happens to mention "parts" and "type" must
/// still classify as `Text`.
pub async fn classify(req: &mut Request, opts: &AgentOptions) -> Result<ClassifiedInput, AgentError> {
    let bytes = read_to_vec(req).await?;

    if let Some(data) = &opts.multimodal_data {
        return Ok(ClassifiedInput {
            kind: ClassifiedKind::MultimodalStreaming(data.clone()),
            original: bytes,
        });
    }

    if looks_like_multimodal(&bytes) {
        if let Ok(parsed) = serde_json::from_slice::<MultimodalInput>(&bytes) {
            if !parsed.parts.is_empty() && parsed.has_any_inline_bytes() {
                return Ok(ClassifiedInput {
                    kind: ClassifiedKind::MultimodalJson(parsed),
                    original: bytes,
                });
            }
        }
    }

    Ok(ClassifiedInput {
        kind: ClassifiedKind::Text,
        original: bytes,
    })
}

fn looks_like_multimodal(bytes: &[u8]) -> bool {
    if serde_json::from_slice::<serde_json::Value>(bytes).is_err() {
        return false;
    }
    let text = String::from_utf8_lossy(bytes);
    text.contains("parts") && text.contains("type")
}
