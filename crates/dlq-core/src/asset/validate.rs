//! Payload checks applied to downloaded and cached bytes.

/// Decides whether a payload is usable. Returns a short reason when it is not.
pub trait PayloadValidator: Send + Sync {
    fn validate(&self, payload: &[u8]) -> Result<(), String>;
}

/// Accepts any non-empty payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyPayload;

impl PayloadValidator for AnyPayload {
    fn validate(&self, payload: &[u8]) -> Result<(), String> {
        if payload.is_empty() {
            return Err("empty payload".to_string());
        }
        Ok(())
    }
}

/// Accepts payloads that start with a known image signature.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageSignature;

impl ImageSignature {
    const PNG: &'static [u8] = b"\x89PNG\r\n\x1a\n";
    const JPEG: &'static [u8] = b"\xff\xd8\xff";
    const GIF87: &'static [u8] = b"GIF87a";
    const GIF89: &'static [u8] = b"GIF89a";

    /// Name of the detected format, if any.
    pub fn detect(payload: &[u8]) -> Option<&'static str> {
        if payload.starts_with(Self::PNG) {
            Some("png")
        } else if payload.starts_with(Self::JPEG) {
            Some("jpeg")
        } else if payload.starts_with(Self::GIF87) || payload.starts_with(Self::GIF89) {
            Some("gif")
        } else if payload.len() >= 12 && &payload[..4] == b"RIFF" && &payload[8..12] == b"WEBP" {
            Some("webp")
        } else {
            None
        }
    }
}

impl PayloadValidator for ImageSignature {
    fn validate(&self, payload: &[u8]) -> Result<(), String> {
        match Self::detect(payload) {
            Some(_) => Ok(()),
            None if payload.is_empty() => Err("empty payload".to_string()),
            None => Err("not a PNG, JPEG, GIF or WebP image".to_string()),
        }
    }
}
