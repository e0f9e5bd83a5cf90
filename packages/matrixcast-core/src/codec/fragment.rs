//! Protocol fragments and their wire rendering.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::pixel::Rgb;
use super::CodecError;
use crate::protocol_constants::{ANIMATION_FRAGMENT_ENDPOINT, PICTURE_ENDPOINT};

/// Pixel data carried by one fragment.
///
/// Serialized (and stored) as `{"kind":"key","start":..,"colors":[..]}` or
/// `{"kind":"delta","changes":[[id,"rrggbb"],..]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FragmentPayload {
    /// Colors for the contiguous id range `start..start + colors.len()`.
    Key { start: u32, colors: Vec<Rgb> },
    /// Colors for individual ids that changed since the previous frame.
    Delta { changes: Vec<(u32, Rgb)> },
}

impl FragmentPayload {
    /// Number of color entries.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Key { colors, .. } => colors.len(),
            Self::Delta { changes } => changes.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_key(&self) -> bool {
        matches!(self, Self::Key { .. })
    }

    /// Byte length of the serialized payload.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        serde_json::to_vec(self).map_or(usize::MAX, |bytes| bytes.len())
    }

    /// Writes this payload's colors onto a canvas indexed by pixel id.
    ///
    /// Ids outside the canvas are ignored.
    pub fn apply_to(&self, canvas: &mut [Rgb]) {
        match self {
            Self::Key { start, colors } => {
                for (offset, color) in colors.iter().enumerate() {
                    if let Some(slot) = canvas.get_mut(*start as usize + offset) {
                        *slot = *color;
                    }
                }
            }
            Self::Delta { changes } => {
                for (id, color) in changes {
                    if let Some(slot) = canvas.get_mut(*id as usize) {
                        *slot = *color;
                    }
                }
            }
        }
    }

    /// `seg.i` list: `[start, "rrggbb", ...]` or `[id, "rrggbb", id, ...]`.
    fn seg_entries(&self) -> Vec<Value> {
        match self {
            Self::Key { start, colors } => {
                let mut entries = Vec::with_capacity(colors.len() + 1);
                entries.push(json!(start));
                entries.extend(colors.iter().map(|c| json!(c.to_hex())));
                entries
            }
            Self::Delta { changes } => changes
                .iter()
                .flat_map(|(id, c)| [json!(id), json!(c.to_hex())])
                .collect(),
        }
    }

    /// Animation `frame` list: `[[id, r, g, b], ...]`.
    fn frame_entries(&self) -> Vec<[u32; 4]> {
        let entry = |id: u32, c: &Rgb| [id, c.r as u32, c.g as u32, c.b as u32];
        match self {
            Self::Key { start, colors } => colors
                .iter()
                .zip(*start..)
                .map(|(c, id)| entry(id, c))
                .collect(),
            Self::Delta { changes } => changes.iter().map(|(id, c)| entry(*id, c)).collect(),
        }
    }
}

/// A self-describing protocol unit, as stored in a picture record.
///
/// `delay` is a placeholder at encode time; delivery fills it from the
/// device speed in effect when the picture is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    /// Number of frames in the animation (1 for static pictures).
    pub frame_count: u32,
    /// Transition this fragment belongs to.
    pub ordinal: u32,
    /// Playback delay, resolved at send time.
    #[serde(skip)]
    pub delay: Option<Duration>,
    pub payload: FragmentPayload,
}

impl Fragment {
    #[must_use]
    pub fn new(frame_count: u32, ordinal: u32, payload: FragmentPayload) -> Self {
        Self {
            frame_count,
            ordinal,
            delay: None,
            payload,
        }
    }

    /// Resolves the playback delay placeholder.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// A fragment rendered into a controller request.
#[derive(Debug, Clone, PartialEq)]
pub struct WireFragment {
    endpoint: &'static str,
    body: Value,
}

impl WireFragment {
    /// Renders a static picture fragment: `{"seg":{"i":[...]}}`.
    #[must_use]
    pub fn picture(fragment: &Fragment) -> Self {
        Self {
            endpoint: PICTURE_ENDPOINT,
            body: json!({ "seg": { "i": fragment.payload.seg_entries() } }),
        }
    }

    /// Renders an animation fragment envelope.
    ///
    /// # Errors
    /// Returns [`CodecError::UnresolvedDelay`] if the delay placeholder was
    /// never resolved.
    pub fn animation(fragment: &Fragment) -> Result<Self, CodecError> {
        let delay = fragment.delay.ok_or(CodecError::UnresolvedDelay {
            ordinal: fragment.ordinal,
        })?;

        Ok(Self {
            endpoint: ANIMATION_FRAGMENT_ENDPOINT,
            body: json!({
                "frameCount": fragment.frame_count,
                "frameFragment": fragment.ordinal,
                "frameDelay": delay.as_millis() as u64,
                "frame": fragment.payload.frame_entries(),
            }),
        })
    }

    /// Controller path this body is posted to.
    #[must_use]
    pub fn endpoint(&self) -> &'static str {
        self.endpoint
    }

    #[must_use]
    pub fn body(&self) -> &Value {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red() -> Rgb {
        Rgb::new(255, 0, 0)
    }

    #[test]
    fn key_renders_start_then_colors() {
        let fragment = Fragment::new(
            1,
            0,
            FragmentPayload::Key {
                start: 16,
                colors: vec![red(), Rgb::BLACK],
            },
        );

        let wire = WireFragment::picture(&fragment);
        assert_eq!(wire.endpoint(), "/setPicture");
        assert_eq!(wire.body(), &json!({"seg": {"i": [16, "ff0000", "000000"]}}));
    }

    #[test]
    fn delta_renders_id_color_pairs() {
        let fragment = Fragment::new(
            1,
            0,
            FragmentPayload::Delta {
                changes: vec![(3, red()), (9, Rgb::new(0, 1, 2))],
            },
        );

        let wire = WireFragment::picture(&fragment);
        assert_eq!(wire.body(), &json!({"seg": {"i": [3, "ff0000", 9, "000102"]}}));
    }

    #[test]
    fn animation_envelope_uses_resolved_delay() {
        let fragment = Fragment::new(
            4,
            2,
            FragmentPayload::Key {
                start: 5,
                colors: vec![red(), Rgb::new(1, 2, 3)],
            },
        )
        .with_delay(Duration::from_millis(250));

        let wire = WireFragment::animation(&fragment).unwrap();
        assert_eq!(wire.endpoint(), "/setAnimationFragment");
        assert_eq!(
            wire.body(),
            &json!({
                "frameCount": 4,
                "frameFragment": 2,
                "frameDelay": 250,
                "frame": [[5, 255, 0, 0], [6, 1, 2, 3]],
            })
        );
    }

    #[test]
    fn animation_without_delay_is_rejected() {
        let fragment = Fragment::new(2, 1, FragmentPayload::Delta { changes: vec![] });
        assert!(matches!(
            WireFragment::animation(&fragment),
            Err(CodecError::UnresolvedDelay { ordinal: 1 })
        ));
    }

    #[test]
    fn stored_form_never_contains_delay() {
        let fragment = Fragment::new(2, 0, FragmentPayload::Delta { changes: vec![] })
            .with_delay(Duration::from_secs(1));
        let json = fragment.to_json().unwrap();

        assert!(!json.contains("delay"));
        let restored = Fragment::from_json(&json).unwrap();
        assert_eq!(restored.delay, None);
        assert_eq!(restored.payload, fragment.payload);
    }

    #[test]
    fn apply_ignores_ids_outside_canvas() {
        let mut canvas = vec![Rgb::BLACK; 2];
        FragmentPayload::Delta {
            changes: vec![(1, red()), (7, red())],
        }
        .apply_to(&mut canvas);
        assert_eq!(canvas, vec![Rgb::BLACK, red()]);
    }
}
