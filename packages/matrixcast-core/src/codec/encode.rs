//! Key and delta encoding of pixel grids.
//!
//! Both encoders always return at least one payload, so every frame
//! transition reaches the controller even when nothing changed.

use super::fragment::FragmentPayload;
use super::pixel::{PixelGrid, Rgb};
use super::CodecError;

/// Encodes every pixel of `grid` as key payloads of at most `max_elements`
/// colors, each covering the next contiguous id range.
#[must_use]
pub fn key_encode(grid: &PixelGrid, max_elements: usize) -> Vec<FragmentPayload> {
    let bound = max_elements.max(1);

    if grid.is_empty() {
        return vec![FragmentPayload::Key {
            start: 0,
            colors: Vec::new(),
        }];
    }

    grid.pixels()
        .chunks(bound)
        .map(|chunk| FragmentPayload::Key {
            start: chunk[0].id,
            colors: chunk.iter().map(|p| p.wire_color()).collect(),
        })
        .collect()
}

/// Encodes only the pixels whose color or opacity changed from `previous`
/// to `current`, as delta payloads of at most `max_elements` entries.
///
/// # Errors
/// Returns [`CodecError::GridSizeMismatch`] if the grids differ in length.
pub fn delta_encode(
    previous: &PixelGrid,
    current: &PixelGrid,
    max_elements: usize,
) -> Result<Vec<FragmentPayload>, CodecError> {
    if previous.len() != current.len() {
        return Err(CodecError::GridSizeMismatch {
            previous: previous.len(),
            current: current.len(),
        });
    }

    let changed: Vec<(u32, Rgb)> = previous
        .pixels()
        .iter()
        .zip(current.pixels())
        .filter(|(before, after)| before.differs_from(after))
        .map(|(_, after)| (after.id, after.wire_color()))
        .collect();

    if changed.is_empty() {
        return Ok(vec![FragmentPayload::Delta {
            changes: Vec::new(),
        }]);
    }

    Ok(changed
        .chunks(max_elements.max(1))
        .map(|chunk| FragmentPayload::Delta {
            changes: chunk.to_vec(),
        })
        .collect())
}

/// Picks the smaller of the key encoding of `current` and the delta
/// encoding of `previous → current`. Ties go to the delta.
///
/// # Errors
/// Returns [`CodecError::GridSizeMismatch`] if the grids differ in length.
pub fn best_of(
    previous: &PixelGrid,
    current: &PixelGrid,
    max_elements: usize,
) -> Result<Vec<FragmentPayload>, CodecError> {
    let delta = delta_encode(previous, current, max_elements)?;
    let key = key_encode(current, max_elements);
    Ok(smaller(key, delta))
}

fn smaller(key: Vec<FragmentPayload>, delta: Vec<FragmentPayload>) -> Vec<FragmentPayload> {
    if encoded_len(&key) < encoded_len(&delta) {
        key
    } else {
        delta
    }
}

fn encoded_len(payloads: &[FragmentPayload]) -> usize {
    payloads
        .iter()
        .map(FragmentPayload::encoded_len)
        .fold(0, usize::saturating_add)
}
