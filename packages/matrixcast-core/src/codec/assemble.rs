//! Animation assembly: turns decoded frames into ordered transitions.

use super::encode::{best_of, key_encode};
use super::fragment::{Fragment, FragmentPayload};
use super::pixel::PixelGrid;
use super::CodecError;

/// Fragments of one picture grouped by transition.
///
/// A static picture has one transition. An animation of `N` frames has
/// `N + 1`: frame 0 as a key frame, one per following frame, and a final
/// wrap-around back to frame 0. A transition spans several fragments only
/// when its encoding exceeds the per-fragment element bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAnimation {
    frame_count: u32,
    transitions: Vec<Vec<Fragment>>,
}

impl EncodedAnimation {
    #[must_use]
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    #[must_use]
    pub fn is_animated(&self) -> bool {
        self.frame_count > 1
    }

    #[must_use]
    pub fn transitions(&self) -> &[Vec<Fragment>] {
        &self.transitions
    }

    #[must_use]
    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    /// All fragments in send order.
    pub fn fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.transitions.iter().flatten()
    }

    #[must_use]
    pub fn into_fragments(self) -> Vec<Fragment> {
        self.transitions.into_iter().flatten().collect()
    }
}

/// Encodes an ordered list of frames.
///
/// Delays are left unresolved on every fragment.
///
/// # Errors
/// Returns [`CodecError::NoFrames`] for an empty list and
/// [`CodecError::GridSizeMismatch`] if the frames differ in size.
pub fn assemble(grids: &[PixelGrid], max_elements: usize) -> Result<EncodedAnimation, CodecError> {
    let (first, rest) = grids.split_first().ok_or(CodecError::NoFrames)?;
    let frame_count = u32::try_from(grids.len()).map_err(|_| CodecError::NoFrames)?;

    let stamp = |ordinal: u32, payloads: Vec<FragmentPayload>| -> Vec<Fragment> {
        payloads
            .into_iter()
            .map(|payload| Fragment::new(frame_count, ordinal, payload))
            .collect()
    };

    let mut transitions = Vec::with_capacity(grids.len() + 1);
    transitions.push(stamp(0, key_encode(first, max_elements)));

    if rest.is_empty() {
        return Ok(EncodedAnimation {
            frame_count,
            transitions,
        });
    }

    for (ordinal, pair) in (1..).zip(grids.windows(2)) {
        transitions.push(stamp(ordinal, best_of(&pair[0], &pair[1], max_elements)?));
    }

    // Wrap-around from the last frame back to the first.
    let last = &grids[grids.len() - 1];
    transitions.push(stamp(frame_count, best_of(last, first, max_elements)?));

    Ok(EncodedAnimation {
        frame_count,
        transitions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::pixel::Rgb;

    fn frame(width: u32, height: u32, f: impl Fn(u32) -> [u8; 4]) -> PixelGrid {
        let samples: Vec<[u8; 4]> = (0..width * height).map(f).collect();
        PixelGrid::from_samples(width, height, &samples)
    }

    /// A dot walking across a dark 4x4 field.
    fn walking_dot(frames: u32) -> Vec<PixelGrid> {
        (0..frames)
            .map(|step| {
                frame(4, 4, |id| {
                    if id == step * 3 % 16 {
                        [255, 255, 0, 255]
                    } else {
                        [0, 0, 40, 255]
                    }
                })
            })
            .collect()
    }

    #[test]
    fn static_picture_is_one_key_transition() {
        let grid = frame(3, 3, |_| [1, 2, 3, 255]);
        let encoded = assemble(std::slice::from_ref(&grid), 256).unwrap();

        assert_eq!(encoded.frame_count(), 1);
        assert!(!encoded.is_animated());
        assert_eq!(encoded.transition_count(), 1);
        assert!(encoded.fragments().all(|f| f.payload.is_key()));
    }

    #[test]
    fn animation_has_one_more_transition_than_frames() {
        for n in 2..6 {
            let encoded = assemble(&walking_dot(n), 256).unwrap();
            assert_eq!(encoded.transition_count(), n as usize + 1);
            // Every transition fits one fragment at this size.
            assert_eq!(encoded.fragments().count(), n as usize + 1);
        }
    }

    #[test]
    fn fragments_are_stamped_with_count_and_ordinal() {
        let encoded = assemble(&walking_dot(3), 256).unwrap();

        for (ordinal, transition) in encoded.transitions().iter().enumerate() {
            for fragment in transition {
                assert_eq!(fragment.frame_count, 3);
                assert_eq!(fragment.ordinal, ordinal as u32);
                assert_eq!(fragment.delay, None);
            }
        }
        assert!(encoded.transitions()[0][0].payload.is_key());
    }

    #[test]
    fn replay_closes_the_loop() {
        let frames = walking_dot(5);
        let encoded = assemble(&frames, 3).unwrap();

        let mut canvas = vec![Rgb::new(9, 9, 9); 16];
        for (ordinal, transition) in encoded.transitions().iter().enumerate() {
            for fragment in transition {
                fragment.payload.apply_to(&mut canvas);
            }
            let expected = &frames[ordinal % frames.len()];
            assert_eq!(canvas, expected.wire_colors(), "after transition {ordinal}");
        }
    }

    #[test]
    fn bound_splits_transitions_but_keeps_ordinals() {
        let frames = vec![frame(4, 4, |_| [255, 0, 0, 255]), frame(4, 4, |_| [0, 255, 0, 255])];
        let encoded = assemble(&frames, 5).unwrap();

        assert_eq!(encoded.transition_count(), 3);
        assert!(encoded.fragments().all(|f| f.payload.len() <= 5));
        assert_eq!(encoded.transitions()[0].len(), 4);
        let ordinals: Vec<u32> = encoded.fragments().map(|f| f.ordinal).collect();
        assert!(ordinals.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn unchanged_frames_still_produce_a_transition() {
        let still = frame(2, 2, |_| [5, 5, 5, 255]);
        let encoded = assemble(&[still.clone(), still], 256).unwrap();

        assert_eq!(encoded.transition_count(), 3);
        assert!(encoded.transitions()[1][0].payload.is_empty());
        assert!(encoded.transitions()[2][0].payload.is_empty());
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(assemble(&[], 256), Err(CodecError::NoFrames)));
    }

    #[test]
    fn mixed_sizes_are_rejected() {
        let frames = vec![frame(2, 2, |_| [0, 0, 0, 255]), frame(3, 3, |_| [0, 0, 0, 255])];
        assert!(matches!(
            assemble(&frames, 256),
            Err(CodecError::GridSizeMismatch { .. })
        ));
    }
}
