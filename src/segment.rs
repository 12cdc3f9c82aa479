//! Segments: contiguous views into sample buffers.
//!
//! A [`Segment`] maps one contiguous logical range of a track onto one
//! contiguous range of a [`SampleBuffer`]. Segments come in two provenances:
//! owned (the track may mutate the view in place, subject to the buffer's
//! aliasing guard) and shared (a read-only alias of another track's data,
//! tied to exactly one live share edge).

use crate::buffer::SampleBuffer;
use crate::error::AudioTrackResult;
use crate::graph::EdgeId;
use crate::store::TrackId;

/// Where a segment's samples come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Provenance {
    /// The segment's track is the sole logical owner of this view.
    Owned,
    /// The view aliases data provided by another track (or, for a self-insert,
    /// this track). `provider` is bookkeeping only and never implies
    /// ownership; `edge` names the share edge describing this alias.
    Shared {
        /// Track the data was shared from.
        provider: TrackId,
        /// The share edge this segment belongs to.
        edge: EdgeId,
    },
}

/// One contiguous logical range of a track, backed by part of a buffer.
#[derive(Debug, Clone)]
pub(crate) struct Segment {
    buffer: SampleBuffer,
    start: usize,
    len: usize,
    provenance: Provenance,
}

impl Segment {
    /// Creates an owned segment covering all of `buffer`.
    pub(crate) fn owned(buffer: SampleBuffer) -> Self {
        let len = buffer.len();
        Self {
            buffer,
            start: 0,
            len,
            provenance: Provenance::Owned,
        }
    }

    /// Creates a shared segment over `buffer[start..start + len]`.
    pub(crate) fn shared(
        buffer: SampleBuffer,
        start: usize,
        len: usize,
        provider: TrackId,
        edge: EdgeId,
    ) -> Self {
        debug_assert!(start + len <= buffer.len());
        Self {
            buffer,
            start,
            len,
            provenance: Provenance::Shared { provider, edge },
        }
    }

    /// Number of samples the segment covers.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// The segment's samples.
    pub(crate) fn as_slice(&self) -> &[i16] {
        &self.buffer.as_slice()[self.start..self.start + self.len]
    }

    /// The share edge this segment belongs to, if it is shared.
    pub(crate) fn edge(&self) -> Option<EdgeId> {
        match self.provenance {
            Provenance::Owned => None,
            Provenance::Shared { edge, .. } => Some(edge),
        }
    }

    /// Re-ties a shared segment to a different edge.
    ///
    /// Used when an edge is split by a structural edit and the tail half of
    /// the shared material moves to a fresh edge.
    pub(crate) fn relabel(&mut self, edge: EdgeId) {
        if let Provenance::Shared { provider, .. } = self.provenance {
            self.provenance = Provenance::Shared { provider, edge };
        }
    }

    /// Splits the segment at local offset `at`, keeping `[0, at)` in `self`
    /// and returning the tail. Both halves keep the provenance and alias the
    /// same buffer.
    pub(crate) fn split_off(&mut self, at: usize) -> Segment {
        debug_assert!(at > 0 && at < self.len);
        let tail = Segment {
            buffer: self.buffer.clone(),
            start: self.start + at,
            len: self.len - at,
            provenance: self.provenance,
        };
        self.len = at;
        tail
    }

    /// Returns a handle on the backing buffer plus the buffer offset of local
    /// position `offset`, for building an aliasing view over this segment.
    pub(crate) fn buffer_view(&self, offset: usize, len: usize) -> (SampleBuffer, usize) {
        debug_assert!(offset + len <= self.len);
        (self.buffer.clone(), self.start + offset)
    }

    /// Returns an owned replacement holding a copy of this segment's current
    /// samples. The allocation is the only fallible step, so callers can stage
    /// materializations before committing a structural edit.
    pub(crate) fn materialized(&self) -> AudioTrackResult<Segment> {
        Ok(Segment::owned(SampleBuffer::from_samples(self.as_slice())?))
    }

    /// Overwrites `data.len()` samples starting at local offset `offset`.
    ///
    /// Goes through the buffer's aliasing guard: if the backing storage is
    /// still referenced elsewhere it is cloned first, so the other holders
    /// keep their bytes.
    pub(crate) fn write_at(&mut self, offset: usize, data: &[i16]) {
        debug_assert!(offset + data.len() <= self.len);
        let base = self.start + offset;
        self.buffer.make_mut()[base..base + data.len()].copy_from_slice(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(samples: &[i16]) -> Segment {
        Segment::owned(SampleBuffer::from_samples(samples).unwrap())
    }

    #[test]
    fn split_preserves_view_arithmetic() {
        let mut head = seg(&[1, 2, 3, 4, 5]);
        let tail = head.split_off(2);
        assert_eq!(head.as_slice(), &[1, 2]);
        assert_eq!(tail.as_slice(), &[3, 4, 5]);
        assert_eq!(head.edge(), None);
        assert_eq!(tail.edge(), None);
    }

    #[test]
    fn split_shared_keeps_provenance() {
        let buf = SampleBuffer::from_samples(&[7, 8, 9]).unwrap();
        let mut head = Segment::shared(buf, 0, 3, TrackId(1), EdgeId(4));
        let tail = head.split_off(1);
        assert_eq!(head.edge(), Some(EdgeId(4)));
        assert_eq!(tail.edge(), Some(EdgeId(4)));
        assert_eq!(tail.as_slice(), &[8, 9]);
    }

    #[test]
    fn write_through_split_siblings_diverges() {
        let mut head = seg(&[1, 2, 3, 4]);
        let tail = head.split_off(2);
        // Both halves alias one buffer; writing one must not disturb the other.
        head.write_at(0, &[9, 9]);
        assert_eq!(head.as_slice(), &[9, 9]);
        assert_eq!(tail.as_slice(), &[3, 4]);
    }

    #[test]
    fn materialized_copy_is_independent() {
        let buf = SampleBuffer::from_samples(&[5, 6]).unwrap();
        let shared = Segment::shared(buf, 0, 2, TrackId(0), EdgeId(0));
        let mut owned = shared.materialized().unwrap();
        assert_eq!(owned.as_slice(), &[5, 6]);
        assert_eq!(owned.edge(), None);
        owned.write_at(1, &[0]);
        assert_eq!(shared.as_slice(), &[5, 6]);
    }
}
