//! Appearance descriptor decoding.
//!
//! The game launcher stores a player's skin as a base64-encoded JSON
//! document (the same shape as Mojang texture properties):
//!
//! ```json
//! { "textures": { "SKIN": { "url": "https://..." } } }
//! ```

use base64::Engine;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use serde::Deserialize;

/// Standard alphabet, padding optional. Launchers disagree on padding.
const DESCRIPTOR_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors that can occur while decoding an appearance descriptor.
#[derive(Debug, thiserror::Error)]
pub enum AppearanceError {
    #[error("descriptor is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("descriptor is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("descriptor is not valid texture JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("descriptor has no skin texture")]
    MissingSkin,
}

#[derive(Deserialize)]
struct TexturePayload {
    textures: Textures,
}

#[derive(Deserialize)]
struct Textures {
    #[serde(rename = "SKIN")]
    skin: Option<Texture>,
}

#[derive(Deserialize)]
struct Texture {
    url: String,
}

/// Extract the skin URL from an encoded appearance descriptor.
///
/// # Errors
///
/// Returns `AppearanceError` if any decoding layer fails or the descriptor
/// has no `textures.SKIN.url`.
pub fn skin_url_from_descriptor(encoded: &str) -> Result<String, AppearanceError> {
    let bytes = DESCRIPTOR_ENGINE.decode(encoded.trim())?;
    let json = String::from_utf8(bytes)?;
    let payload: TexturePayload = serde_json::from_str(&json)?;

    payload
        .textures
        .skin
        .map(|t| t.url)
        .filter(|url| !url.is_empty())
        .ok_or(AppearanceError::MissingSkin)
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};

    use super::*;

    const SKIN: &str = "http://textures.minecraft.net/texture/abc123";

    fn encode(engine: &GeneralPurpose, json: &str) -> String {
        engine.encode(json.as_bytes())
    }

    #[test]
    fn test_decodes_nested_skin_url() {
        let descriptor = encode(
            &STANDARD,
            &format!(r#"{{"timestamp":1,"textures":{{"SKIN":{{"url":"{SKIN}"}}}}}}"#),
        );
        assert_eq!(skin_url_from_descriptor(&descriptor).expect("decode"), SKIN);
    }

    #[test]
    fn test_accepts_unpadded_input() {
        let descriptor = encode(
            &STANDARD_NO_PAD,
            &format!(r#"{{"textures":{{"SKIN":{{"url":"{SKIN}"}}}}}}"#),
        );
        assert_eq!(skin_url_from_descriptor(&descriptor).expect("decode"), SKIN);
    }

    #[test]
    fn test_missing_skin_is_an_error() {
        let descriptor = encode(&STANDARD, r#"{"textures":{"CAPE":{"url":"x"}}}"#);
        assert!(matches!(
            skin_url_from_descriptor(&descriptor),
            Err(AppearanceError::MissingSkin)
        ));
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(matches!(
            skin_url_from_descriptor("%%% not base64 %%%"),
            Err(AppearanceError::Base64(_))
        ));
        let not_json = encode(&STANDARD, "hello");
        assert!(matches!(
            skin_url_from_descriptor(&not_json),
            Err(AppearanceError::Json(_))
        ));
    }
}
