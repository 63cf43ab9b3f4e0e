//! Embed decoding
//!
//! Post views carry an open-ended `embed` object whose shape depends on the
//! post type. It is decoded once, at the transport boundary, into the closed
//! [`EmbedKind`] set so that classification is a plain `match`.
//!
//! Decoding goes by `$type` first and falls back to probing the shape when the
//! type tag is missing or unknown. Anything that cannot be recognised decodes
//! to [`EmbedKind::None`], which never qualifies as media.

use serde_json::Value;

const IMAGES: &str = "app.bsky.embed.images";
const VIDEO: &str = "app.bsky.embed.video";
const EXTERNAL: &str = "app.bsky.embed.external";
const RECORD: &str = "app.bsky.embed.record";
const RECORD_WITH_MEDIA: &str = "app.bsky.embed.recordWithMedia";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedKind {
    /// Non-empty image list
    Images(usize),
    Video,
    /// Link card with a thumbnail
    ExternalThumb,
    /// Quote of another record, no media
    RecordQuote,
    /// Quote of another record plus attached media
    RecordWithMedia { has_media: bool },
    None,
}

impl EmbedKind {
    /// Decode an embed view (or record embed) into its kind
    pub fn decode(embed: Option<&Value>) -> Self {
        let Some(embed) = embed.filter(|v| v.is_object()) else {
            return EmbedKind::None;
        };

        match type_tag(embed) {
            Some(IMAGES) => decode_images(embed),
            Some(VIDEO) => EmbedKind::Video,
            Some(EXTERNAL) => decode_external(embed),
            Some(RECORD) => EmbedKind::RecordQuote,
            Some(RECORD_WITH_MEDIA) => EmbedKind::RecordWithMedia {
                has_media: Self::decode_media(embed.get("media")).has_media(),
            },
            _ => probe_shape(embed),
        }
    }

    /// Decode the media half of a record-with-media embed
    ///
    /// A nested quote is not media.
    fn decode_media(media: Option<&Value>) -> Self {
        match Self::decode(media) {
            EmbedKind::RecordQuote | EmbedKind::RecordWithMedia { .. } => EmbedKind::None,
            kind => kind,
        }
    }

    /// Carries an image, a video or a link thumbnail
    pub fn has_media(&self) -> bool {
        match self {
            EmbedKind::Images(count) => *count > 0,
            EmbedKind::Video | EmbedKind::ExternalThumb => true,
            EmbedKind::RecordWithMedia { has_media } => *has_media,
            EmbedKind::RecordQuote | EmbedKind::None => false,
        }
    }

    /// Carries a quoted record
    pub fn is_quote(&self) -> bool {
        matches!(
            self,
            EmbedKind::RecordQuote | EmbedKind::RecordWithMedia { .. }
        )
    }
}

/// `$type` without the `#view` / `#main` fragment
fn type_tag(embed: &Value) -> Option<&str> {
    embed
        .get("$type")
        .and_then(Value::as_str)
        .map(|t| t.split('#').next().unwrap_or(t))
}

fn present(value: Option<&Value>) -> bool {
    matches!(value, Some(v) if !v.is_null())
}

fn decode_images(embed: &Value) -> EmbedKind {
    match embed.get("images").and_then(Value::as_array) {
        Some(images) if !images.is_empty() => EmbedKind::Images(images.len()),
        _ => EmbedKind::None,
    }
}

fn decode_external(embed: &Value) -> EmbedKind {
    if present(embed.get("external").and_then(|e| e.get("thumb"))) {
        EmbedKind::ExternalThumb
    } else {
        EmbedKind::None
    }
}

fn probe_shape(embed: &Value) -> EmbedKind {
    if present(embed.get("record")) {
        if present(embed.get("media")) {
            return EmbedKind::RecordWithMedia {
                has_media: EmbedKind::decode_media(embed.get("media")).has_media(),
            };
        }
        return EmbedKind::RecordQuote;
    }

    if let EmbedKind::Images(count) = decode_images(embed) {
        return EmbedKind::Images(count);
    }

    if present(embed.get("playlist")) {
        return EmbedKind::Video;
    }

    if present(embed.get("media")) {
        return EmbedKind::decode_media(embed.get("media"));
    }

    decode_external(embed)
}
