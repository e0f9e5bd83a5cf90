//! Frame encoding: raster decode, key/delta fragment encoding, and
//! animation assembly.
//!
//! Data flows leaves-first through the submodules:
//!
//! - [`extract`]: raster file → [`PixelGrid`] (row-major, stable pixel ids)
//! - [`encode`]: grid(s) → size-bounded [`FragmentPayload`]s
//! - [`assemble`]: all frames of an animation → [`EncodedAnimation`]
//!
//! Everything here is pure and synchronous; callers that run inside the
//! async runtime move encoding onto a blocking thread.

pub mod assemble;
pub mod encode;
pub mod extract;
pub mod fragment;
pub mod pixel;

pub use assemble::{assemble, EncodedAnimation};
pub use encode::{best_of, delta_encode, key_encode};
pub use extract::{
    decode_frames, decode_frames_from_memory, decode_grid, extract_grid, DecodeError,
};
pub use fragment::{Fragment, FragmentPayload, WireFragment};
pub use pixel::{Pixel, PixelGrid, Rgb};

use thiserror::Error;

/// Errors raised while encoding grids into fragments.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Previous and current grid differ in length. All frames of one
    /// animation share one resolution, so this indicates a bug upstream.
    #[error("previous grid has {previous} pixels, current grid has {current}")]
    GridSizeMismatch { previous: usize, current: usize },

    /// An animation needs at least one frame.
    #[error("cannot assemble an animation without frames")]
    NoFrames,

    /// An animation fragment was rendered before its playback delay was resolved.
    #[error("fragment {ordinal} has no resolved playback delay")]
    UnresolvedDelay { ordinal: u32 },
}
