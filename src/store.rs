//! The track store: the public face of the segment storage engine.
//!
//! A [`TrackStore`] is a registry of tracks addressed by [`TrackId`] handles,
//! together with the dependency graph recording which track ranges are backed
//! by which other tracks. All engine operations (read, write, delete, insert,
//! resolve, identify) live here; they validate their addressing
//! against the handle's current length and fail closed, leaving every track
//! exactly as it was when an error is returned.

use crate::buffer::SampleBuffer;
use crate::error::{AudioTrackError, AudioTrackResult};
use crate::graph::{DependencyGraph, EdgeId, EdgeRelabel, ShareEdge};
use crate::identify::{self, MatchSpan};
use crate::segment::Segment;
use crate::track::Track;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Handle for one track in a [`TrackStore`].
///
/// Handles are never reused; operations on a destroyed handle fail with
/// [`AudioTrackError::InvalidTrack`]. Handle order is creation order, which
/// also fixes the pair ordering used by [`TrackStore::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub(crate) u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track #{}", self.0)
    }
}

/// A mutable, shareable collection of 16-bit PCM tracks.
///
/// Tracks support cheap structural edits and zero-copy cross-track
/// composition: [`TrackStore::insert`] splices a range of one track into
/// another by reference, and copy-on-write keeps both sides isolated once
/// either is mutated. [`TrackStore::resolve`] flattens the remaining aliasing
/// into independent copies.
#[derive(Debug, Default)]
pub struct TrackStore {
    tracks: HashMap<TrackId, Track>,
    graph: DependencyGraph,
    next_track: u64,
}

impl TrackStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty track and returns its handle.
    pub fn create(&mut self) -> TrackId {
        let id = TrackId(self.next_track);
        self.next_track += 1;
        self.tracks.insert(id, Track::new());
        debug!(%id, "track created");
        id
    }

    /// Destroys a track.
    ///
    /// If other live tracks still depend on this one, those dependents are
    /// materialized first (as if the affected edges had been resolved), so no
    /// alias is ever left dangling. Incoming edges are simply dropped.
    pub fn destroy(&mut self, id: TrackId) -> AudioTrackResult<()> {
        if !self.tracks.contains_key(&id) {
            return Err(AudioTrackError::invalid_track(id));
        }
        for edge in self.graph.outgoing_of(id) {
            if edge.consumer == id {
                continue; // a self-edge dies with the track
            }
            let data = self.read(id, edge.provider_start, edge.len)?;
            self.write(edge.consumer, edge.consumer_start, &data)?;
            self.graph.detach(edge.id);
        }
        self.graph.remove_track(id);
        self.tracks.remove(&id);
        debug!(%id, "track destroyed");
        Ok(())
    }

    /// True if `id` refers to a live track.
    pub fn contains(&self, id: TrackId) -> bool {
        self.tracks.contains_key(&id)
    }

    /// Number of live tracks.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Current total length of a track in samples. O(1).
    pub fn len(&self, id: TrackId) -> AudioTrackResult<usize> {
        Ok(self.track(id)?.len())
    }

    /// Copies `len` samples starting at logical `pos` out of a track.
    pub fn read(&self, id: TrackId, pos: usize, len: usize) -> AudioTrackResult<Vec<i16>> {
        let track = self.track(id)?;
        match pos.checked_add(len) {
            Some(end) if end <= track.len() => {}
            _ => return Err(AudioTrackError::out_of_range(id, pos, len, track.len())),
        }
        let mut out = Vec::new();
        out.try_reserve_exact(len)
            .map_err(|_| AudioTrackError::Allocation { samples: len })?;
        out.resize(len, 0);
        track.read_into(pos, &mut out);
        Ok(out)
    }

    /// Overwrites `data.len()` samples starting at logical `pos`.
    ///
    /// Writing past the current end extends the track; a gap between the old
    /// end and `pos` is zero-filled. Shared segments overlapped by the write
    /// are materialized first (copy-on-write) and their share edges detached,
    /// so the write never leaks into the providing track. All allocations are
    /// staged before any sample is changed, so an allocation failure leaves
    /// the track's contents untouched.
    pub fn write(&mut self, id: TrackId, pos: usize, data: &[i16]) -> AudioTrackResult<()> {
        if !self.tracks.contains_key(&id) {
            return Err(AudioTrackError::invalid_track(id));
        }
        if data.is_empty() {
            return Ok(());
        }

        let track = self.tracks.get_mut(&id).expect("checked above");
        let total = track.len();
        let gap = pos.saturating_sub(total);
        let in_range = data.len().min(total.saturating_sub(pos));
        let overhang = data.len() - in_range;

        // Stage every fallible allocation before mutating anything visible.
        let gap_buffer = if gap > 0 {
            Some(SampleBuffer::zeroed(gap)?)
        } else {
            None
        };
        let overhang_buffer = if overhang > 0 {
            Some(SampleBuffer::from_samples(&data[in_range..])?)
        } else {
            None
        };

        if in_range > 0 {
            let first = track.boundary_index(pos);
            let last = track.boundary_index(pos + in_range);

            // Copy-on-write at edge granularity: any overlapped shared
            // segment pulls every sibling of its edge along, so the edge and
            // the shared status disappear together.
            let mut cow_edges: Vec<EdgeId> = Vec::new();
            for segment in &track.segments()[first..last] {
                if let Some(edge) = segment.edge()
                    && !cow_edges.contains(&edge)
                {
                    cow_edges.push(edge);
                }
            }
            let mut staged: Vec<(usize, Segment)> = Vec::new();
            for &edge in &cow_edges {
                for index in track.segments_of_edge(edge) {
                    staged.push((index, track.segments()[index].materialized()?));
                }
            }

            for (index, replacement) in staged {
                track.replace_segment(index, replacement);
            }
            for edge in cow_edges {
                debug!(%id, ?edge, "copy-on-write detached share edge");
                self.graph.detach(edge);
            }

            let mut written = 0;
            let mut index = first;
            while written < in_range {
                let take = track.segments()[index].len().min(in_range - written);
                track.segment_mut(index).write_at(0, &data[written..written + take]);
                written += take;
                index += 1;
            }
        }

        if let Some(buffer) = gap_buffer {
            track.push_segment(Segment::owned(buffer));
        }
        if let Some(buffer) = overhang_buffer {
            track.push_segment(Segment::owned(buffer));
        }
        Ok(())
    }

    /// Removes the logical range `[pos, pos + len)` from a track.
    ///
    /// Fails with [`AudioTrackError::RangeInUse`] if any other live track
    /// still aliases part of that range. Deleting a zero-length range is a
    /// no-op that always succeeds on a live track.
    pub fn delete_range(&mut self, id: TrackId, pos: usize, len: usize) -> AudioTrackResult<()> {
        let track_len = self.len(id)?;
        if len == 0 {
            return Ok(());
        }
        match pos.checked_add(len) {
            Some(end) if end <= track_len => {}
            _ => return Err(AudioTrackError::out_of_range(id, pos, len, track_len)),
        }
        if self.graph.overlapping_outgoing(id, pos, len) {
            return Err(AudioTrackError::RangeInUse { track: id, pos, len });
        }

        let track = self.tracks.get_mut(&id).expect("validated by len()");
        track.remove_range(pos, len);
        let relabels = self.graph.note_delete(id, pos, len);
        self.apply_relabels(relabels);
        debug!(%id, pos, len, "range deleted");
        Ok(())
    }

    /// Splices `len` samples of `src` (starting at `src_pos`) into `dest` at
    /// `dest_pos` by reference.
    ///
    /// No sample data is copied when the source range lies within a single
    /// segment; a range straddling segments is first gathered into one fresh
    /// buffer and then shared. Either way `dest` gains one shared segment and
    /// one share edge is recorded. Inserting a track into itself is allowed.
    pub fn insert(
        &mut self,
        dest: TrackId,
        dest_pos: usize,
        src: TrackId,
        src_pos: usize,
        len: usize,
    ) -> AudioTrackResult<()> {
        let src_len = self.len(src)?;
        let dest_len = self.len(dest)?;
        match src_pos.checked_add(len) {
            Some(end) if end <= src_len => {}
            _ => return Err(AudioTrackError::out_of_range(src, src_pos, len, src_len)),
        }
        if dest_pos > dest_len {
            return Err(AudioTrackError::out_of_range(dest, dest_pos, 0, dest_len));
        }
        if len == 0 {
            return Ok(());
        }

        let (buffer, buffer_start) = self.source_view(src, src_pos, len)?;
        let relabels = self.graph.note_insert(dest, dest_pos, len);

        // Edge windows are recorded in post-splice coordinates. A self-insert
        // shifts the source material along with everything at or past the
        // splice point; landing *inside* the source range even tears it in
        // two, so that case gets one edge per remaining contiguous piece.
        // (provider_start, consumer_start, piece length)
        let pieces: Vec<(usize, usize, usize)> =
            if src == dest && src_pos < dest_pos && dest_pos < src_pos + len {
                let front = dest_pos - src_pos;
                vec![
                    (src_pos, dest_pos, front),
                    (dest_pos + len, dest_pos + front, len - front),
                ]
            } else if src == dest && dest_pos <= src_pos {
                vec![(src_pos + len, dest_pos, len)]
            } else {
                vec![(src_pos, dest_pos, len)]
            };

        let mut offset = 0;
        for (provider_start, consumer_start, piece_len) in pieces {
            let edge = self
                .graph
                .add_edge(src, dest, provider_start, consumer_start, piece_len);
            let segment = Segment::shared(
                buffer.clone(),
                buffer_start + offset,
                piece_len,
                src,
                edge,
            );
            self.tracks
                .get_mut(&dest)
                .expect("validated by len()")
                .insert_segment(consumer_start, segment);
            offset += piece_len;
        }
        self.apply_relabels(relabels);
        debug!(%src, src_pos, %dest, dest_pos, len, "range shared into track");
        Ok(())
    }

    /// Makes the given tracks mutually independent.
    ///
    /// For every edge between two tracks of the set (self-edges included),
    /// the provider's current bytes for the edge's range are copied into the
    /// consumer and the edge is removed from both sides. Pairs are visited in
    /// handle (creation) order, so the outcome is deterministic. Resolving an
    /// already-independent set is a no-op.
    pub fn resolve(&mut self, ids: &[TrackId]) -> AudioTrackResult<()> {
        let mut ids: Vec<TrackId> = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        for &id in &ids {
            if !self.tracks.contains_key(&id) {
                return Err(AudioTrackError::invalid_track(id));
            }
        }

        for &provider in &ids {
            for &consumer in &ids {
                for edge in self.graph.edges_between(provider, consumer) {
                    let data = self.read(provider, edge.provider_start, edge.len)?;
                    // A plain write: it materializes the consumer's shared
                    // segments and detaches the edge through the COW path.
                    self.write(consumer, edge.consumer_start, &data)?;
                    self.graph.detach(edge.id);
                    debug!(%provider, %consumer, "share edge resolved");
                }
            }
        }
        Ok(())
    }

    /// Locates occurrences of `reference`'s data inside `target` by
    /// normalized cross-correlation. See [`identify::find_occurrences`] for
    /// the matching rules.
    pub fn identify(
        &self,
        target: TrackId,
        reference: TrackId,
    ) -> AudioTrackResult<Vec<MatchSpan>> {
        let target_samples = self.read(target, 0, self.len(target)?)?;
        let reference_samples = self.read(reference, 0, self.len(reference)?)?;
        Ok(identify::find_occurrences(
            &target_samples,
            &reference_samples,
        ))
    }

    /// Edges where the given track is the data provider, in creation order.
    pub fn outgoing_edges(&self, id: TrackId) -> AudioTrackResult<Vec<ShareEdge>> {
        self.track(id)?;
        Ok(self.graph.outgoing_of(id))
    }

    /// Edges where the given track is the data consumer, in creation order.
    pub fn incoming_edges(&self, id: TrackId) -> AudioTrackResult<Vec<ShareEdge>> {
        self.track(id)?;
        Ok(self.graph.incoming_of(id))
    }

    fn track(&self, id: TrackId) -> AudioTrackResult<&Track> {
        self.tracks
            .get(&id)
            .ok_or_else(|| AudioTrackError::invalid_track(id))
    }

    /// Builds the contiguous buffer view backing an insert: a direct alias
    /// when the source range sits inside one segment, a materialized copy
    /// when it straddles several.
    fn source_view(
        &self,
        src: TrackId,
        src_pos: usize,
        len: usize,
    ) -> AudioTrackResult<(SampleBuffer, usize)> {
        let track = self.track(src)?;
        let mut remaining = src_pos;
        for segment in track.segments() {
            if remaining >= segment.len() {
                remaining -= segment.len();
                continue;
            }
            if segment.len() - remaining >= len {
                return Ok(segment.buffer_view(remaining, len));
            }
            break;
        }
        let gathered = self.read(src, src_pos, len)?;
        Ok((SampleBuffer::from_samples(&gathered)?, 0))
    }

    fn apply_relabels(&mut self, relabels: Vec<EdgeRelabel>) {
        for relabel in relabels {
            if let Some(track) = self.tracks.get_mut(&relabel.consumer) {
                // A provider-side split lands mid-window with no structural
                // edit on the consumer, so the consumer segment may straddle
                // the seam; split it there before repointing by start offset.
                track.boundary_index(relabel.from);
                track.relabel_edge(relabel.old, relabel.new, relabel.from);
            }
        }
    }

    /// Exhaustive internal consistency check used by the test suite.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        for (id, track) in &self.tracks {
            track.assert_consistent();
            for segment in track.segments() {
                if let Some(edge_id) = segment.edge() {
                    let edge = self
                        .graph
                        .edge(edge_id)
                        .expect("shared segment references a dead edge");
                    assert_eq!(edge.consumer, *id, "segment labeled with foreign edge");
                }
            }
        }
        for (id, _) in &self.tracks {
            for edge in self.graph.incoming_of(*id) {
                let consumer = &self.tracks[id];
                assert!(
                    edge.consumer_start + edge.len <= consumer.len(),
                    "edge window escapes consumer address space"
                );
                let provider = self
                    .tracks
                    .get(&edge.provider)
                    .expect("edge references destroyed provider");
                assert!(
                    edge.provider_start + edge.len <= provider.len(),
                    "edge window escapes provider address space"
                );
                // The consumer's segments for this edge must tile its window.
                let mut covered = 0;
                let mut cursor = edge.consumer_start;
                let mut logical = 0;
                for segment in consumer.segments() {
                    if segment.edge() == Some(edge.id) {
                        assert_eq!(logical, cursor, "edge window fragmented");
                        cursor += segment.len();
                        covered += segment.len();
                    }
                    logical += segment.len();
                }
                assert_eq!(covered, edge.len, "edge window not fully backed");
            }
        }
    }
}
