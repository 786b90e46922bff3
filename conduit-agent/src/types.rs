//! Multimodal input shapes and the tagged union the classifier produces.

use serde::{Deserialize, Serialize};

/// Base64 encodes `inline_bytes` on the wire as `data`, matching the
/// external multimodal JSON shape. The in-memory representation stays
/// raw bytes; only the serialized form is base64 text.
mod inline_data {
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        match encoded {
            Some(s) => base64::engine::general_purpose::STANDARD
                .decode(s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

/// One part of a multimodal payload. Exactly one of `text`, `inline_bytes`
/// is ever set on a value produced by [`crate::classifier::classify`];
/// `byte_stream` parts exist only for caller-constructed
/// [`MultimodalInput`] values passed in via
/// [`crate::options::AgentOptions::multimodal_data`] and are never
/// serialised — they are materialised lazily at the provider boundary,
/// so they are represented out-of-band rather than as a struct field
/// here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: ContentPartKind,
    pub text: Option<String>,
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none", with = "inline_data")]
    pub inline_bytes: Option<Vec<u8>>,
    #[serde(rename = "mime_type", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentPartKind {
    Text,
    Image,
    Audio,
    Video,
}

impl ContentPart {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: ContentPartKind::Text,
            text: Some(text.into()),
            inline_bytes: None,
            mime_type: None,
        }
    }

    #[must_use]
    pub fn inline(kind: ContentPartKind, bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            kind,
            text: None,
            inline_bytes: Some(bytes),
            mime_type: Some(mime_type.into()),
        }
    }

    /// Whether this part carries inline bytes rather than text.
    #[must_use]
    pub fn has_inline_bytes(&self) -> bool {
        self.inline_bytes.is_some()
    }
}

/// An ordered sequence of content parts, supplied by callers directly
/// (via [`crate::options::AgentOptions::multimodal_data`]) or decoded
/// from a JSON request body during classification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultimodalInput {
    pub parts: Vec<ContentPart>,
}

impl MultimodalInput {
    #[must_use]
    pub fn new(parts: Vec<ContentPart>) -> Self {
        Self { parts }
    }

    /// Whether at least one part carries inline bytes rather than text,
    /// the signal the classifier uses to accept a JSON decode as a
    /// genuine multimodal payload rather than incidental JSON that
    /// happens to contain the words "parts" and "type".
    #[must_use]
    pub fn has_any_inline_bytes(&self) -> bool {
        self.parts.iter().any(ContentPart::has_inline_bytes)
    }
}

/// Which of the three input shapes a request was classified as.
#[derive(Debug, Clone)]
pub enum ClassifiedKind {
    Text,
    MultimodalJson(MultimodalInput),
    MultimodalStreaming(MultimodalInput),
}

/// The outcome of classifying a request body: the tagged union plus the
/// original bytes the classification was derived from, since the
/// request they were read from is consumed and cannot be re-read by a
/// later stage.
#[derive(Debug, Clone)]
pub struct ClassifiedInput {
    pub kind: ClassifiedKind,
    pub original: Vec<u8>,
}

impl ClassifiedInput {
    #[must_use]
    pub fn is_multimodal(&self) -> bool {
        !matches!(self.kind, ClassifiedKind::Text)
    }
}
