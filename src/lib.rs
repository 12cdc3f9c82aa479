// Correctness and logic
#![warn(clippy::unit_cmp)]
#![warn(clippy::match_same_arms)]
// Performance-focused
#![warn(clippy::inefficient_to_string)]
#![warn(clippy::map_clone)]
#![warn(clippy::unnecessary_to_owned)]
#![warn(clippy::needless_collect)]
// Style and idiomatic Rust
#![warn(clippy::redundant_clone)]
#![warn(clippy::needless_return)]
#![warn(clippy::manual_map)]
#![warn(clippy::unwrap_used)]
// Maintainability
#![warn(clippy::missing_panics_doc)]
#![deny(missing_docs)]

//! # AudioTracks
//!
//! A mutable, shareable sequence store for 16-bit PCM sample data with cheap
//! structural edits and zero-copy cross-track composition.
//!
//! ## Overview
//!
//! Each track in a [`TrackStore`] is a contiguous logical sequence of samples
//! backed by an ordered list of segments, each a view into a reference-counted
//! sample buffer. Structural edits (insert, delete, overwrite) manipulate
//! the segment list rather than the samples, so they cost O(segments), not
//! O(samples). A range of one track can be spliced into another *by
//! reference* with [`TrackStore::insert`]; copy-on-write keeps both sides
//! isolated once either is mutated, and [`TrackStore::resolve`] flattens the
//! remaining aliasing into independent copies.
//!
//! ## Quick Start
//!
//! ```rust
//! use audio_tracks::TrackStore;
//!
//! let mut store = TrackStore::new();
//! let a = store.create();
//! store.write(a, 0, &[1, 2, 3, 4, 5]).unwrap();
//!
//! // Splice three samples of `a` into a fresh track, by reference.
//! let b = store.create();
//! store.insert(b, 0, a, 1, 3).unwrap();
//! assert_eq!(store.read(b, 0, 3).unwrap(), vec![2, 3, 4]);
//!
//! // Writing into the shared range copies first; `a` is untouched.
//! store.write(b, 1, &[10]).unwrap();
//! assert_eq!(store.read(b, 0, 3).unwrap(), vec![2, 10, 4]);
//! assert_eq!(store.read(a, 1, 3).unwrap(), vec![2, 3, 4]);
//! ```
//!
//! ## Sharing and resolution
//!
//! Every [`TrackStore::insert`] records a [`ShareEdge`] describing which
//! provider range backs which consumer range. Edges guard deletion (removing
//! samples that another live track still aliases fails with
//! [`AudioTrackError::RangeInUse`]) and drive [`TrackStore::resolve`], which
//! copies each aliased range into the consuming track and removes the edges,
//! leaving the tracks mutually independent.
//!
//! ## Pattern matching
//!
//! [`TrackStore::identify`] locates occurrences of a short reference track
//! inside a longer target using normalized cross-correlation; see
//! [`identify::find_occurrences`] for the matching rules.
//!
//! ## File I/O
//!
//! The [`wav`] module reads and writes mono 16-bit PCM WAV containers into
//! flat sample arrays. It is a collaborator, not part of the engine: the
//! store only ever consumes plain sample slices.
//!
//! ## Error Handling
//!
//! Engine operations return [`AudioTrackResult`]; every failure leaves the
//! tracks involved exactly as they were. Codec failures surface separately as
//! [`wav::WavError`].
//!
//! ## Concurrency
//!
//! The store is single-threaded by design (`!Send`): buffers are
//! reference-counted with `Rc` and there is no internal locking. Wrap the
//! whole store in external synchronization if you need cross-thread access.

mod buffer;
mod error;
mod graph;
mod segment;
mod store;
mod track;

pub mod identify;
pub mod wav;

pub use crate::error::{AudioTrackError, AudioTrackResult};
pub use crate::graph::ShareEdge;
pub use crate::identify::{MatchFloat, MatchSpan, find_occurrences};
pub use crate::store::{TrackId, TrackStore};
