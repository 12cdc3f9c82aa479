//! Per-track segment list mechanics.
//!
//! A [`Track`] is an ordered sequence of [`Segment`]s; the order is the sole
//! source of logical addressing, so every lookup walks the list from the head
//! accumulating offsets. The track also caches the total length, which must
//! equal the sum of segment lengths after every structural edit.

use crate::graph::EdgeId;
use crate::segment::Segment;

/// The ordered segment list of one track plus its cached total length.
#[derive(Debug, Default)]
pub(crate) struct Track {
    segments: Vec<Segment>,
    total_len: usize,
}

impl Track {
    /// Creates an empty track.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Cached total length in samples.
    pub(crate) fn len(&self) -> usize {
        self.total_len
    }

    /// Read-only access to the segment list.
    pub(crate) fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Mutable access to one segment.
    pub(crate) fn segment_mut(&mut self, index: usize) -> &mut Segment {
        &mut self.segments[index]
    }

    /// Replaces one segment wholesale (used when committing a staged COW).
    pub(crate) fn replace_segment(&mut self, index: usize, segment: Segment) {
        debug_assert_eq!(self.segments[index].len(), segment.len());
        self.segments[index] = segment;
    }

    /// Copies `out.len()` samples starting at logical `pos` into `out`.
    ///
    /// The caller must have validated `pos + out.len() <= self.len()`.
    pub(crate) fn read_into(&self, mut pos: usize, out: &mut [i16]) {
        debug_assert!(pos + out.len() <= self.total_len);
        let mut filled = 0;
        for segment in &self.segments {
            if pos >= segment.len() {
                pos -= segment.len();
                continue;
            }
            let take = (segment.len() - pos).min(out.len() - filled);
            out[filled..filled + take].copy_from_slice(&segment.as_slice()[pos..pos + take]);
            filled += take;
            pos = 0;
            if filled == out.len() {
                break;
            }
        }
        debug_assert_eq!(filled, out.len());
    }

    /// Ensures a segment boundary exists at logical `pos` and returns the
    /// index of the first segment starting there. `pos == len()` yields the
    /// one-past-the-end index. Splitting changes no logical content.
    pub(crate) fn boundary_index(&mut self, pos: usize) -> usize {
        debug_assert!(pos <= self.total_len);
        let mut logical = 0;
        for index in 0..self.segments.len() {
            if logical == pos {
                return index;
            }
            let seg_len = self.segments[index].len();
            if pos < logical + seg_len {
                let tail = self.segments[index].split_off(pos - logical);
                self.segments.insert(index + 1, tail);
                return index + 1;
            }
            logical += seg_len;
        }
        self.segments.len()
    }

    /// Appends a segment at the end of the track.
    pub(crate) fn push_segment(&mut self, segment: Segment) {
        self.total_len += segment.len();
        self.segments.push(segment);
    }

    /// Splices a segment in so that it starts at logical `pos`.
    pub(crate) fn insert_segment(&mut self, pos: usize, segment: Segment) {
        let index = self.boundary_index(pos);
        self.total_len += segment.len();
        self.segments.insert(index, segment);
    }

    /// Removes the segments covering exactly `[pos, pos + len)`, splitting the
    /// boundary segments first. Graph bookkeeping for removed shared segments
    /// is the caller's job (the edge windows already describe the cut).
    pub(crate) fn remove_range(&mut self, pos: usize, len: usize) {
        if len == 0 {
            return;
        }
        let first = self.boundary_index(pos);
        let last = self.boundary_index(pos + len);
        self.segments.drain(first..last);
        self.total_len -= len;
    }

    /// Repoints shared segments from edge `old` to edge `new` for every
    /// segment whose logical start is at or past `from`.
    pub(crate) fn relabel_edge(&mut self, old: EdgeId, new: EdgeId, from: usize) {
        let mut logical = 0;
        for segment in &mut self.segments {
            if logical >= from && segment.edge() == Some(old) {
                segment.relabel(new);
            }
            logical += segment.len();
        }
    }

    /// Indices of every segment currently tied to `edge`.
    pub(crate) fn segments_of_edge(&self, edge: EdgeId) -> Vec<usize> {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.edge() == Some(edge))
            .map(|(i, _)| i)
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let sum: usize = self.segments.iter().map(Segment::len).sum();
        assert_eq!(sum, self.total_len, "cached length drifted from segments");
        assert!(
            self.segments.iter().all(|s| s.len() > 0),
            "zero-length segment left in list"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SampleBuffer;

    fn owned(samples: &[i16]) -> Segment {
        Segment::owned(SampleBuffer::from_samples(samples).unwrap())
    }

    fn contents(track: &Track) -> Vec<i16> {
        let mut out = vec![0; track.len()];
        track.read_into(0, &mut out);
        out
    }

    #[test]
    fn read_spans_segments() {
        let mut track = Track::new();
        track.push_segment(owned(&[1, 2]));
        track.push_segment(owned(&[3]));
        track.push_segment(owned(&[4, 5, 6]));
        track.assert_consistent();

        assert_eq!(contents(&track), vec![1, 2, 3, 4, 5, 6]);
        let mut mid = vec![0; 3];
        track.read_into(1, &mut mid);
        assert_eq!(mid, vec![2, 3, 4]);
    }

    #[test]
    fn boundary_index_splits_mid_segment() {
        let mut track = Track::new();
        track.push_segment(owned(&[1, 2, 3, 4]));
        let index = track.boundary_index(2);
        assert_eq!(index, 1);
        assert_eq!(track.segments().len(), 2);
        track.assert_consistent();
        assert_eq!(contents(&track), vec![1, 2, 3, 4]);

        // Existing boundaries are reused, not re-split.
        assert_eq!(track.boundary_index(2), 1);
        assert_eq!(track.segments().len(), 2);
        assert_eq!(track.boundary_index(0), 0);
        assert_eq!(track.boundary_index(4), 2);
    }

    #[test]
    fn insert_segment_mid_track() {
        let mut track = Track::new();
        track.push_segment(owned(&[1, 2, 3, 4]));
        track.insert_segment(2, owned(&[9, 9]));
        track.assert_consistent();
        assert_eq!(contents(&track), vec![1, 2, 9, 9, 3, 4]);
    }

    #[test]
    fn remove_range_straddling_segments() {
        let mut track = Track::new();
        track.push_segment(owned(&[1, 2, 3]));
        track.push_segment(owned(&[4, 5, 6]));
        track.remove_range(2, 2);
        track.assert_consistent();
        assert_eq!(contents(&track), vec![1, 2, 5, 6]);
    }

    #[test]
    fn relabel_respects_the_cut_offset() {
        let buf = SampleBuffer::from_samples(&[1, 2, 3, 4]).unwrap();
        let mut track = Track::new();
        track.push_segment(Segment::shared(buf.clone(), 0, 2, crate::store::TrackId(0), EdgeId(7)));
        track.push_segment(Segment::shared(buf, 2, 2, crate::store::TrackId(0), EdgeId(7)));

        track.relabel_edge(EdgeId(7), EdgeId(8), 2);
        assert_eq!(track.segments()[0].edge(), Some(EdgeId(7)));
        assert_eq!(track.segments()[1].edge(), Some(EdgeId(8)));
    }
}
