//! Reference-counted sample storage.
//!
//! A [`SampleBuffer`] is the unit of physical storage: a flat array of signed
//! 16-bit samples. Buffers are cheap to share between segments (and across
//! tracks); mutation goes through [`SampleBuffer::make_mut`], which clones the
//! storage first whenever any other segment still holds a handle to it. That
//! makes in-place mutation of aliased data impossible by construction rather
//! than by convention.

use crate::error::{AudioTrackError, AudioTrackResult};
use std::rc::Rc;

/// A shared, flat array of signed 16-bit samples.
///
/// Cloning a `SampleBuffer` clones the handle, not the samples. The storage is
/// freed when the last handle is dropped, so a segment can never free samples
/// that another segment still references.
#[derive(Debug, Clone)]
pub(crate) struct SampleBuffer {
    samples: Rc<Vec<i16>>,
}

impl SampleBuffer {
    /// Allocates a buffer holding a copy of `samples`.
    pub(crate) fn from_samples(samples: &[i16]) -> AudioTrackResult<Self> {
        let mut storage = Vec::new();
        storage
            .try_reserve_exact(samples.len())
            .map_err(|_| AudioTrackError::Allocation {
                samples: samples.len(),
            })?;
        storage.extend_from_slice(samples);
        Ok(Self {
            samples: Rc::new(storage),
        })
    }

    /// Allocates a zero-filled buffer of `len` samples.
    pub(crate) fn zeroed(len: usize) -> AudioTrackResult<Self> {
        let mut storage = Vec::new();
        storage
            .try_reserve_exact(len)
            .map_err(|_| AudioTrackError::Allocation { samples: len })?;
        storage.resize(len, 0);
        Ok(Self {
            samples: Rc::new(storage),
        })
    }

    /// Number of samples in the buffer.
    pub(crate) fn len(&self) -> usize {
        self.samples.len()
    }

    /// Read-only view of the whole buffer.
    pub(crate) fn as_slice(&self) -> &[i16] {
        &self.samples
    }

    /// Mutable view of the whole buffer.
    ///
    /// If any other handle to this buffer exists the storage is cloned first
    /// and this handle is repointed at the clone; the other holders keep the
    /// original bytes. This is the engine's structural copy-on-write guard.
    pub(crate) fn make_mut(&mut self) -> &mut [i16] {
        Rc::make_mut(&mut self.samples).as_mut_slice()
    }

    /// True if another segment currently holds a handle to this storage.
    #[cfg(test)]
    pub(crate) fn is_aliased(&self) -> bool {
        Rc::strong_count(&self.samples) > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_samples_copies_input() {
        let buf = SampleBuffer::from_samples(&[1, 2, 3]).unwrap();
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.as_slice(), &[1, 2, 3]);
        assert!(!buf.is_aliased());
    }

    #[test]
    fn zeroed_is_silent() {
        let buf = SampleBuffer::zeroed(4).unwrap();
        assert_eq!(buf.as_slice(), &[0, 0, 0, 0]);
    }

    #[test]
    fn make_mut_clones_only_when_aliased() {
        let mut a = SampleBuffer::from_samples(&[1, 2, 3]).unwrap();
        let b = a.clone();
        assert!(a.is_aliased());

        a.make_mut()[0] = 9;
        assert_eq!(a.as_slice(), &[9, 2, 3]);
        assert_eq!(b.as_slice(), &[1, 2, 3]);
        assert!(!a.is_aliased());

        // Unaliased mutation happens in place.
        let mut c = SampleBuffer::from_samples(&[5]).unwrap();
        c.make_mut()[0] = 6;
        assert_eq!(c.as_slice(), &[6]);
    }
}
