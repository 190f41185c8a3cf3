use base64::engine::general_purpose::STANDARD;
use base64::Engine;

const DATA_URL_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// Binary image bytes plus their media type, as carried in a note's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            bytes,
        }
    }

    pub fn png(bytes: Vec<u8>) -> Self {
        Self::new("image/png", bytes)
    }

    /// Inline form stored in `Note::content`: `data:<type>;base64,<payload>`.
    pub fn to_data_url(&self) -> String {
        format!(
            "{}{}{}{}",
            DATA_URL_PREFIX,
            self.media_type,
            BASE64_MARKER,
            STANDARD.encode(&self.bytes)
        )
    }

    pub fn from_data_url(content: &str) -> Option<Self> {
        let rest = content.strip_prefix(DATA_URL_PREFIX)?;
        let (media_type, payload) = rest.split_once(BASE64_MARKER)?;
        if media_type.is_empty() {
            return None;
        }
        let bytes = STANDARD.decode(payload.trim()).ok()?;
        Some(Self::new(media_type, bytes))
    }
}
