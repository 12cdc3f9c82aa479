//! The cross-track sharing dependency graph.
//!
//! Every insert records one [`ShareEdge`]: "the consumer's logical range
//! `[consumer_start, consumer_start + len)` is backed by the provider's range
//! `[provider_start, provider_start + len)`". Edges are stored symmetrically,
//! once in the provider's outgoing set and once in the consumer's incoming
//! set.
//!
//! Edge windows are kept in *current* logical coordinates: structural edits on
//! either endpoint shift a window (edit strictly before it), shrink or remove
//! it (consumer-side delete overlapping it), or split it in two (edit strictly
//! inside it). Splitting mirrors segment splitting: the tail half of the
//! shared material moves to a fresh edge, and the caller relabels the
//! affected segments with the returned [`EdgeRelabel`] instructions.

use crate::store::TrackId;
use std::collections::HashMap;
use tracing::debug;

/// Opaque identifier tying shared segments to the edge describing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct EdgeId(pub(crate) u64);

/// A recorded dependency: one track's logical range is backed by another
/// track's buffer range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareEdge {
    pub(crate) id: EdgeId,
    pub(crate) provider: TrackId,
    pub(crate) consumer: TrackId,
    pub(crate) provider_start: usize,
    pub(crate) consumer_start: usize,
    pub(crate) len: usize,
}

impl ShareEdge {
    /// The track providing the data.
    pub fn provider(&self) -> TrackId {
        self.provider
    }

    /// The track consuming the data.
    pub fn consumer(&self) -> TrackId {
        self.consumer
    }

    /// Current start of the shared range in the provider's address space.
    pub fn provider_start(&self) -> usize {
        self.provider_start
    }

    /// Current start of the shared range in the consumer's address space.
    pub fn consumer_start(&self) -> usize {
        self.consumer_start
    }

    /// Length of the shared range in samples.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the shared range is empty (never stored; edges with an empty
    /// window are removed on the spot).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Instruction to repoint a consumer's shared segments after an edge split:
/// segments tied to `old` starting at or past `from` belong to `new`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EdgeRelabel {
    pub(crate) consumer: TrackId,
    pub(crate) old: EdgeId,
    pub(crate) new: EdgeId,
    pub(crate) from: usize,
}

/// Bidirectional share-edge bookkeeping for all tracks in a store.
#[derive(Debug, Default)]
pub(crate) struct DependencyGraph {
    edges: HashMap<EdgeId, ShareEdge>,
    outgoing: HashMap<TrackId, Vec<EdgeId>>,
    incoming: HashMap<TrackId, Vec<EdgeId>>,
    next_edge: u64,
}

impl DependencyGraph {
    /// Records a new edge in both endpoint sets.
    pub(crate) fn add_edge(
        &mut self,
        provider: TrackId,
        consumer: TrackId,
        provider_start: usize,
        consumer_start: usize,
        len: usize,
    ) -> EdgeId {
        let id = EdgeId(self.next_edge);
        self.next_edge += 1;
        debug!(
            ?id,
            %provider,
            %consumer,
            provider_start,
            consumer_start,
            len,
            "share edge added"
        );
        self.edges.insert(
            id,
            ShareEdge {
                id,
                provider,
                consumer,
                provider_start,
                consumer_start,
                len,
            },
        );
        self.outgoing.entry(provider).or_default().push(id);
        self.incoming.entry(consumer).or_default().push(id);
        id
    }

    /// Removes an edge from both endpoint sets. Removing an already-detached
    /// edge is a no-op, which keeps resolve idempotent.
    pub(crate) fn detach(&mut self, id: EdgeId) -> Option<ShareEdge> {
        let edge = self.edges.remove(&id)?;
        if let Some(out) = self.outgoing.get_mut(&edge.provider) {
            out.retain(|&e| e != id);
        }
        if let Some(inc) = self.incoming.get_mut(&edge.consumer) {
            inc.retain(|&e| e != id);
        }
        debug!(?id, %edge.provider, %edge.consumer, "share edge detached");
        Some(edge)
    }

    #[cfg(test)]
    pub(crate) fn edge(&self, id: EdgeId) -> Option<&ShareEdge> {
        self.edges.get(&id)
    }

    /// True if any outgoing edge of `track` overlaps `[pos, pos + len)`,
    /// i.e. some other live track still depends on bytes in that range.
    pub(crate) fn overlapping_outgoing(&self, track: TrackId, pos: usize, len: usize) -> bool {
        self.ids_of(&self.outgoing, track).iter().any(|id| {
            let e = &self.edges[id];
            e.provider_start < pos + len && e.provider_start + e.len > pos
        })
    }

    /// Every edge where `track` provides data, ordered by creation.
    pub(crate) fn outgoing_of(&self, track: TrackId) -> Vec<ShareEdge> {
        self.sorted(self.ids_of(&self.outgoing, track))
    }

    /// Every edge where `track` consumes data, ordered by creation.
    pub(crate) fn incoming_of(&self, track: TrackId) -> Vec<ShareEdge> {
        self.sorted(self.ids_of(&self.incoming, track))
    }

    /// Edges from `provider` to `consumer`, ordered by creation.
    pub(crate) fn edges_between(&self, provider: TrackId, consumer: TrackId) -> Vec<ShareEdge> {
        let ids: Vec<EdgeId> = self
            .ids_of(&self.outgoing, provider)
            .into_iter()
            .filter(|id| self.edges[id].consumer == consumer)
            .collect();
        self.sorted(ids)
    }

    /// Updates edge windows for an insertion of `len` samples at `pos` into
    /// `track`, in both of the track's roles. Windows starting at or past the
    /// insertion point shift right; a window containing the insertion point
    /// splits in two.
    pub(crate) fn note_insert(&mut self, track: TrackId, pos: usize, len: usize) -> Vec<EdgeRelabel> {
        let mut relabels = Vec::new();
        if len == 0 {
            return relabels;
        }
        // Consumer windows first: a provider-side split derives its relabel
        // offset from the consumer window, which must already be in
        // post-insert coordinates.
        for id in self.ids_of(&self.incoming, track) {
            self.adjust_consumer_for_insert(id, pos, len, &mut relabels);
        }
        // Re-collect: a consumer-side split of a self-edge may have created
        // edges that also provide from this track.
        for id in self.ids_of(&self.outgoing, track) {
            self.adjust_provider_for_insert(id, pos, len, &mut relabels);
        }
        relabels
    }

    /// Updates edge windows for a deletion of `[pos, pos + len)` from `track`.
    ///
    /// The caller has already rejected deletions overlapping outgoing
    /// windows, so in the provider role windows only shift. In the consumer
    /// role a window may shift, shrink from either end, split around an
    /// interior cut, or disappear entirely.
    pub(crate) fn note_delete(&mut self, track: TrackId, pos: usize, len: usize) -> Vec<EdgeRelabel> {
        let mut relabels = Vec::new();
        if len == 0 {
            return relabels;
        }
        for id in self.ids_of(&self.outgoing, track) {
            let e = self.edges.get_mut(&id).expect("outgoing id is live");
            debug_assert!(
                e.provider_start + e.len <= pos || e.provider_start >= pos + len,
                "delete overlapping an outgoing edge must be rejected first"
            );
            if e.provider_start >= pos + len {
                e.provider_start -= len;
            }
        }
        for id in self.ids_of(&self.incoming, track) {
            self.adjust_consumer_for_delete(id, pos, len, &mut relabels);
        }
        relabels
    }

    /// Detaches every edge touching `track`. Used by destroy after its
    /// dependents have been materialized.
    pub(crate) fn remove_track(&mut self, track: TrackId) {
        let mut ids = self.ids_of(&self.outgoing, track);
        ids.extend(self.ids_of(&self.incoming, track));
        for id in ids {
            self.detach(id);
        }
        self.outgoing.remove(&track);
        self.incoming.remove(&track);
    }

    /// Total number of live edges.
    #[cfg(test)]
    pub(crate) fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn ids_of(&self, side: &HashMap<TrackId, Vec<EdgeId>>, track: TrackId) -> Vec<EdgeId> {
        side.get(&track).cloned().unwrap_or_default()
    }

    fn sorted(&self, mut ids: Vec<EdgeId>) -> Vec<ShareEdge> {
        ids.sort_unstable();
        ids.iter().map(|id| self.edges[id].clone()).collect()
    }

    fn adjust_provider_for_insert(
        &mut self,
        id: EdgeId,
        pos: usize,
        len: usize,
        relabels: &mut Vec<EdgeRelabel>,
    ) {
        let e = self.edges.get_mut(&id).expect("edge id is live");
        if pos <= e.provider_start {
            e.provider_start += len;
        } else if pos < e.provider_start + e.len {
            // Interior insert on the provider side: the shared material is no
            // longer contiguous there, so the edge splits at the seam.
            let front_len = pos - e.provider_start;
            let (provider, consumer) = (e.provider, e.consumer);
            let tail_provider_start = pos + len;
            let tail_consumer_start = e.consumer_start + front_len;
            let tail_len = e.len - front_len;
            e.len = front_len;
            let new = self.add_edge(
                provider,
                consumer,
                tail_provider_start,
                tail_consumer_start,
                tail_len,
            );
            relabels.push(EdgeRelabel {
                consumer,
                old: id,
                new,
                from: tail_consumer_start,
            });
        }
    }

    fn adjust_consumer_for_insert(
        &mut self,
        id: EdgeId,
        pos: usize,
        len: usize,
        relabels: &mut Vec<EdgeRelabel>,
    ) {
        let e = self.edges.get_mut(&id).expect("edge id is live");
        if pos <= e.consumer_start {
            e.consumer_start += len;
        } else if pos < e.consumer_start + e.len {
            let front_len = pos - e.consumer_start;
            let (provider, consumer) = (e.provider, e.consumer);
            let tail_provider_start = e.provider_start + front_len;
            let tail_consumer_start = pos + len;
            let tail_len = e.len - front_len;
            e.len = front_len;
            let new = self.add_edge(
                provider,
                consumer,
                tail_provider_start,
                tail_consumer_start,
                tail_len,
            );
            relabels.push(EdgeRelabel {
                consumer,
                old: id,
                new,
                from: tail_consumer_start,
            });
        }
    }

    fn adjust_consumer_for_delete(
        &mut self,
        id: EdgeId,
        pos: usize,
        len: usize,
        relabels: &mut Vec<EdgeRelabel>,
    ) {
        let e = self.edges.get_mut(&id).expect("edge id is live");
        let (cs, ce) = (e.consumer_start, e.consumer_start + e.len);
        let (ds, de) = (pos, pos + len);
        if de <= cs {
            e.consumer_start -= len;
            return;
        }
        if ds >= ce {
            return;
        }
        let front_keep = ds.saturating_sub(cs);
        let tail_keep = ce.saturating_sub(de);
        if front_keep == 0 && tail_keep == 0 {
            // The whole shared window was deleted with its segments.
            self.detach(id);
        } else if tail_keep == 0 {
            e.len = front_keep;
        } else if front_keep == 0 {
            let cut = e.len - tail_keep;
            e.provider_start += cut;
            e.consumer_start = ds;
            e.len = tail_keep;
        } else {
            // Interior cut: front keeps the id, tail moves to a fresh edge.
            let cut = e.len - front_keep - tail_keep;
            let (provider, consumer) = (e.provider, e.consumer);
            let tail_provider_start = e.provider_start + front_keep + cut;
            e.len = front_keep;
            let new = self.add_edge(provider, consumer, tail_provider_start, ds, tail_keep);
            relabels.push(EdgeRelabel {
                consumer,
                old: id,
                new,
                from: ds,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: TrackId = TrackId(0);
    const B: TrackId = TrackId(1);

    #[test]
    fn edges_stored_symmetrically() {
        let mut g = DependencyGraph::default();
        let id = g.add_edge(A, B, 2, 0, 3);
        assert_eq!(g.outgoing_of(A).len(), 1);
        assert_eq!(g.incoming_of(B).len(), 1);
        assert_eq!(g.edges_between(A, B).len(), 1);
        assert!(g.edges_between(B, A).is_empty());

        g.detach(id);
        assert_eq!(g.edge_count(), 0);
        assert!(g.outgoing_of(A).is_empty());
        assert!(g.incoming_of(B).is_empty());
        // Detaching twice is a no-op.
        assert!(g.detach(id).is_none());
    }

    #[test]
    fn overlap_check_is_exact() {
        let mut g = DependencyGraph::default();
        g.add_edge(A, B, 4, 0, 3); // provider window [4, 7)
        assert!(g.overlapping_outgoing(A, 4, 3));
        assert!(g.overlapping_outgoing(A, 6, 5));
        assert!(g.overlapping_outgoing(A, 0, 5));
        assert!(!g.overlapping_outgoing(A, 0, 4));
        assert!(!g.overlapping_outgoing(A, 7, 2));
        assert!(!g.overlapping_outgoing(B, 4, 3));
    }

    #[test]
    fn insert_before_window_shifts_it() {
        let mut g = DependencyGraph::default();
        g.add_edge(A, B, 5, 3, 2);
        assert!(g.note_insert(A, 1, 4).is_empty());
        assert!(g.note_insert(B, 3, 2).is_empty());
        let e = &g.edges_between(A, B)[0];
        assert_eq!(e.provider_start(), 9);
        assert_eq!(e.consumer_start(), 5);
    }

    #[test]
    fn insert_inside_provider_window_splits_edge() {
        let mut g = DependencyGraph::default();
        g.add_edge(A, B, 2, 10, 6); // provider [2, 8), consumer [10, 16)
        let relabels = g.note_insert(A, 4, 3);
        assert_eq!(relabels.len(), 1);
        assert_eq!(relabels[0].from, 12);

        let edges = g.edges_between(A, B);
        assert_eq!(edges.len(), 2);
        assert_eq!(
            (edges[0].provider_start(), edges[0].consumer_start(), edges[0].len()),
            (2, 10, 2)
        );
        assert_eq!(
            (edges[1].provider_start(), edges[1].consumer_start(), edges[1].len()),
            (7, 12, 4)
        );
    }

    #[test]
    fn delete_of_whole_consumer_window_removes_edge() {
        let mut g = DependencyGraph::default();
        g.add_edge(A, B, 0, 2, 4);
        let relabels = g.note_delete(B, 1, 6);
        assert!(relabels.is_empty());
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn interior_consumer_delete_splits_edge() {
        let mut g = DependencyGraph::default();
        g.add_edge(A, B, 0, 2, 8); // consumer [2, 10)
        let relabels = g.note_delete(B, 4, 3); // cut [4, 7)
        assert_eq!(relabels.len(), 1);
        assert_eq!(relabels[0].from, 4);

        let edges = g.edges_between(A, B);
        assert_eq!(edges.len(), 2);
        assert_eq!(
            (edges[0].provider_start(), edges[0].consumer_start(), edges[0].len()),
            (0, 2, 2)
        );
        assert_eq!(
            (edges[1].provider_start(), edges[1].consumer_start(), edges[1].len()),
            (5, 4, 3)
        );
    }

    #[test]
    fn consumer_delete_shrinks_edge_from_either_end() {
        let mut g = DependencyGraph::default();
        g.add_edge(A, B, 0, 4, 6); // consumer [4, 10)
        g.note_delete(B, 8, 4); // trims the tail
        let e = g.edges_between(A, B)[0].clone();
        assert_eq!((e.provider_start(), e.consumer_start(), e.len()), (0, 4, 4));

        g.note_delete(B, 2, 4); // trims the front, window now starts at 2
        let e = g.edges_between(A, B)[0].clone();
        assert_eq!((e.provider_start(), e.consumer_start(), e.len()), (2, 2, 2));
    }

    #[test]
    fn remove_track_clears_both_roles() {
        let mut g = DependencyGraph::default();
        g.add_edge(A, B, 0, 0, 2);
        g.add_edge(B, A, 1, 1, 1);
        g.remove_track(A);
        assert_eq!(g.edge_count(), 0);
    }
}
