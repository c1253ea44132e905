//! Content negotiation between request media types and codec hooks.
//!
//! The negotiator picks which codec hook handles a body; it never
//! second-guesses the codec's own verdict. A decoder that inspects the
//! content type and rejects it surfaces 415, and an encoder that cannot
//! satisfy the Accept preferences surfaces 406, untouched.

use bytes::Bytes;

use crate::hooks::{HookError, HookRegistry, HookValue};

/// Content type assumed when a request does not declare one, and the type
/// used for pass-through responses when no encoder is registered.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// One media range from an Accept header, ordered by preference.
#[derive(Debug, Clone)]
struct MediaRange {
    mime: mime::Mime,
    quality: f32,
}

impl MediaRange {
    fn parse(entry: &str) -> Option<Self> {
        let mime: mime::Mime = entry.trim().parse().ok()?;
        let quality = mime
            .get_param("q")
            .and_then(|q| q.as_str().parse::<f32>().ok())
            .unwrap_or(1.0);
        Some(Self { mime, quality })
    }

    /// `type/subtype` beats `type/*` beats `*/*` at equal quality.
    fn specificity(&self) -> u8 {
        if self.mime.type_() == mime::STAR {
            0
        } else if self.mime.subtype() == mime::STAR {
            1
        } else {
            2
        }
    }

    fn matches(&self, offer: &mime::Mime) -> bool {
        if self.quality <= 0.0 {
            return false;
        }
        (self.mime.type_() == mime::STAR || self.mime.type_() == offer.type_())
            && (self.mime.subtype() == mime::STAR || self.mime.subtype() == offer.subtype())
    }
}

/// The client's Accept header as an ordered preference list.
///
/// Passed whole to the output-encode hook: the encoder owns the decision of
/// which concrete type to produce, this type only answers "would the client
/// take it".
#[derive(Debug, Clone)]
pub struct AcceptPreferences {
    ranges: Vec<MediaRange>,
}

impl AcceptPreferences {
    /// Parse an Accept header. A missing header means the client takes
    /// anything (`*/*`); unparseable entries are skipped.
    pub fn parse(header: Option<&str>) -> Self {
        let header = match header {
            Some(h) if !h.trim().is_empty() => h,
            _ => "*/*",
        };

        let mut ranges: Vec<MediaRange> = header.split(',').filter_map(MediaRange::parse).collect();
        if ranges.is_empty() {
            ranges.push(MediaRange {
                mime: mime::STAR_STAR,
                quality: 1.0,
            });
        }
        // Stable sort keeps the header's own order among equal entries.
        ranges.sort_by(|a, b| {
            b.quality
                .total_cmp(&a.quality)
                .then(b.specificity().cmp(&a.specificity()))
        });
        Self { ranges }
    }

    /// Whether the client accepts the given concrete content type.
    pub fn accepts(&self, content_type: &str) -> bool {
        let Ok(offer) = content_type.parse::<mime::Mime>() else {
            return false;
        };
        self.ranges.iter().any(|r| r.matches(&offer))
    }

    /// The most preferred media range, as a string.
    pub fn first(&self) -> String {
        self.ranges[0].mime.essence_str().to_string()
    }

    /// Media ranges in preference order.
    pub fn iter(&self) -> impl Iterator<Item = &mime::Mime> {
        self.ranges.iter().map(|r| &r.mime)
    }
}

impl std::fmt::Display for AcceptPreferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", range.mime)?;
        }
        Ok(())
    }
}

/// Decode a request body via the registered input hook.
///
/// With no decoder registered the raw bytes pass through unmodified; the
/// predict hook receives exactly what arrived on the wire.
pub async fn decode_input(
    registry: &HookRegistry,
    body: Bytes,
    content_type: &str,
) -> std::result::Result<HookValue, HookError> {
    match registry.input_decode() {
        Some(decoder) => decoder.decode(body, content_type).await,
        None => Ok(HookValue::Bytes(body)),
    }
}

/// Encode a prediction via the registered output hook.
///
/// With no encoder registered the prediction must already be bytes and is
/// sent as `application/octet-stream`.
pub async fn encode_output(
    registry: &HookRegistry,
    prediction: HookValue,
    accept: &AcceptPreferences,
) -> std::result::Result<(Bytes, String), HookError> {
    match registry.output_encode() {
        Some(encoder) => encoder.encode(prediction, accept).await,
        None => match prediction {
            HookValue::Bytes(bytes) => Ok((bytes, OCTET_STREAM.to_string())),
            other => Err(HookError::ExecutionFailed {
                hook: crate::hooks::HookKind::OutputEncode.name(),
                reason: format!(
                    "no output_fn hook is registered and the prediction is {}, not bytes",
                    other.type_name()
                ),
            }),
        },
    }
}
