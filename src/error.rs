//! Error types and result utilities for track engine operations.
//!
//! The WAV codec keeps its own error type ([`crate::wav::WavError`]); malformed
//! file input is never reported through [`AudioTrackError`].

use crate::store::TrackId;
use thiserror::Error;

/// Convenience type alias for results that may contain an [`AudioTrackError`].
pub type AudioTrackResult<T> = Result<T, AudioTrackError>;

/// Error types that can occur during track engine operations.
///
/// Every engine operation fails closed: when one of these errors is returned,
/// the tracks involved are left exactly as they were before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioTrackError {
    /// A read, write, delete, or insert addressed samples beyond a track's
    /// current length.
    #[error(
        "range starting at {pos} with length {len} is out of bounds for {track} of length {track_len}"
    )]
    OutOfRange {
        /// The track whose address space was exceeded.
        track: TrackId,
        /// Starting logical offset of the requested range.
        pos: usize,
        /// Length of the requested range in samples.
        len: usize,
        /// The track's current total length.
        track_len: usize,
    },

    /// A delete would remove samples that another live track still aliases.
    ///
    /// The range overlaps at least one outgoing share edge; the dependent
    /// track must be resolved (or the edge otherwise broken) first.
    #[error("cannot delete {len} samples at {pos} from {track}: range is shared out to another track")]
    RangeInUse {
        /// The track the delete was attempted on.
        track: TrackId,
        /// Starting logical offset of the delete.
        pos: usize,
        /// Length of the delete in samples.
        len: usize,
    },

    /// An operation was given an unknown or already-destroyed track handle.
    #[error("unknown or destroyed track handle {track}")]
    InvalidTrack {
        /// The offending handle.
        track: TrackId,
    },

    /// Backing sample storage could not be allocated.
    #[error("failed to allocate storage for {samples} samples")]
    Allocation {
        /// Number of samples the failed allocation asked for.
        samples: usize,
    },
}

impl AudioTrackError {
    /// Creates an [`AudioTrackError::OutOfRange`] for the given request.
    pub(crate) fn out_of_range(track: TrackId, pos: usize, len: usize, track_len: usize) -> Self {
        Self::OutOfRange {
            track,
            pos,
            len,
            track_len,
        }
    }

    /// Creates an [`AudioTrackError::InvalidTrack`] for the given handle.
    pub(crate) fn invalid_track(track: TrackId) -> Self {
        Self::InvalidTrack { track }
    }
}
