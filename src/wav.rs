//! WAV codec collaborator: mono 16-bit PCM container I/O.
//!
//! This module converts between `.wav` files and flat in-memory sample
//! arrays. It is the engine's only file-format collaborator; the segment
//! store itself never sees a file. Codec failures are reported through
//! [`WavError`], which is deliberately distinct from the engine's
//! [`crate::AudioTrackError`].

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Sample rate written by [`save`].
pub const SAMPLE_RATE: u32 = 44_100;

const RIFF: [u8; 4] = *b"RIFF";
const WAVE: [u8; 4] = *b"WAVE";
const FMT: [u8; 4] = *b"fmt ";
const DATA: [u8; 4] = *b"data";
const FMT_CHUNK_LEN: u32 = 16;
const PCM_FORMAT: u16 = 1;

/// Convenience type alias for results that may contain a [`WavError`].
pub type WavResult<T> = Result<T, WavError>;

/// Errors produced while parsing or writing a WAV container.
#[derive(Error, Debug)]
pub enum WavError {
    /// The underlying file could not be read or written.
    #[error("wav i/o failed: {0}")]
    Io(#[from] io::Error),

    /// The file does not start with a `RIFF` header.
    #[error("not a RIFF file")]
    NotRiff,

    /// The RIFF form type is not `WAVE`.
    #[error("not a WAVE file")]
    NotWave,

    /// The `data` chunk appeared before any `fmt ` chunk.
    #[error("found data chunk before fmt chunk")]
    DataBeforeFmt,

    /// The file ended without a `data` chunk.
    #[error("missing data chunk")]
    MissingData,

    /// A chunk promised more bytes than the file holds.
    #[error("short read in {chunk} chunk: expected {expected} bytes, got {got}")]
    ShortRead {
        /// Four-character id of the truncated chunk.
        chunk: String,
        /// Bytes the chunk header promised.
        expected: usize,
        /// Bytes actually present.
        got: usize,
    },

    /// The format chunk describes audio this codec does not handle
    /// (anything but mono 16-bit integer PCM).
    #[error("unsupported format: tag {format}, {channels} channel(s), {bits_per_sample} bits per sample")]
    UnsupportedFormat {
        /// PCM format tag (1 = integer PCM).
        format: u16,
        /// Channel count.
        channels: u16,
        /// Bits per sample.
        bits_per_sample: u16,
    },
}

/// Loads a mono 16-bit PCM WAV file into a flat sample array.
///
/// Walks the chunk list skipping unrecognized chunks, requires `fmt ` before
/// `data`, tolerates oversized format chunks, and validates that the format
/// is mono 16-bit integer PCM.
pub fn load(path: impl AsRef<Path>) -> WavResult<Vec<i16>> {
    let mut reader = BufReader::new(File::open(path)?);

    let (riff_id, _riff_size) = read_chunk_header(&mut reader).map_err(|_| WavError::NotRiff)?;
    if riff_id != RIFF {
        return Err(WavError::NotRiff);
    }
    let mut wave_id = [0u8; 4];
    reader.read_exact(&mut wave_id).map_err(|_| WavError::NotWave)?;
    if wave_id != WAVE {
        return Err(WavError::NotWave);
    }

    let mut format: Option<(u16, u16, u16)> = None;
    loop {
        let (chunk_id, chunk_size) = match read_chunk_header(&mut reader) {
            Ok(header) => header,
            Err(_) => return Err(WavError::MissingData),
        };
        debug!(
            chunk = %String::from_utf8_lossy(&chunk_id),
            size = chunk_size,
            "wav chunk"
        );

        if chunk_id == FMT {
            let mut fmt = [0u8; 16];
            reader.read_exact(&mut fmt).map_err(|_| WavError::ShortRead {
                chunk: "fmt ".into(),
                expected: chunk_size as usize,
                got: 0,
            })?;
            let tag = u16::from_le_bytes([fmt[0], fmt[1]]);
            let channels = u16::from_le_bytes([fmt[2], fmt[3]]);
            let bits = u16::from_le_bytes([fmt[14], fmt[15]]);
            if tag != PCM_FORMAT || channels != 1 || bits != 16 {
                return Err(WavError::UnsupportedFormat {
                    format: tag,
                    channels,
                    bits_per_sample: bits,
                });
            }
            format = Some((tag, channels, bits));
            if chunk_size > FMT_CHUNK_LEN {
                reader.seek(SeekFrom::Current(i64::from(chunk_size - FMT_CHUNK_LEN)))?;
            }
        } else if chunk_id == DATA {
            if format.is_none() {
                return Err(WavError::DataBeforeFmt);
            }
            let expected = chunk_size as usize;
            let mut bytes = vec![0u8; expected];
            let mut got = 0;
            while got < expected {
                let n = reader.read(&mut bytes[got..])?;
                if n == 0 {
                    return Err(WavError::ShortRead {
                        chunk: "data".into(),
                        expected,
                        got,
                    });
                }
                got += n;
            }
            let samples = bytes
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                .collect::<Vec<i16>>();
            debug!(samples = samples.len(), "wav data loaded");
            return Ok(samples);
        } else {
            reader.seek(SeekFrom::Current(i64::from(chunk_size)))?;
        }
    }
}

/// Saves samples as a mono 16-bit PCM WAV file at 44 100 Hz.
pub fn save(path: impl AsRef<Path>, samples: &[i16]) -> WavResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let data_size = (samples.len() * 2) as u32;

    writer.write_all(&RIFF)?;
    writer.write_all(&(36 + data_size).to_le_bytes())?;
    writer.write_all(&WAVE)?;

    writer.write_all(&FMT)?;
    writer.write_all(&FMT_CHUNK_LEN.to_le_bytes())?;
    writer.write_all(&PCM_FORMAT.to_le_bytes())?;
    writer.write_all(&1u16.to_le_bytes())?; // channels
    writer.write_all(&SAMPLE_RATE.to_le_bytes())?;
    writer.write_all(&(SAMPLE_RATE * 2).to_le_bytes())?; // byte rate
    writer.write_all(&2u16.to_le_bytes())?; // block align
    writer.write_all(&16u16.to_le_bytes())?; // bits per sample

    writer.write_all(&DATA)?;
    writer.write_all(&data_size.to_le_bytes())?;
    for sample in samples {
        writer.write_all(&sample.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

fn read_chunk_header(reader: &mut impl Read) -> io::Result<([u8; 4], u32)> {
    let mut id = [0u8; 4];
    reader.read_exact(&mut id)?;
    let mut size = [0u8; 4];
    reader.read_exact(&mut size)?;
    Ok((id, u32::from_le_bytes(size)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("audio_tracks_wav_{name}_{}", std::process::id()));
        path
    }

    #[test]
    fn save_then_load_round_trips() {
        let path = temp_path("roundtrip.wav");
        let samples: Vec<i16> = vec![0, 100, -100, i16::MAX, i16::MIN, 42];
        save(&path, &samples).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, samples);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn rejects_non_riff_input() {
        let path = temp_path("notriff.wav");
        std::fs::write(&path, b"JUNKJUNKJUNKJUNK").unwrap();
        assert!(matches!(load(&path), Err(WavError::NotRiff)));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn rejects_missing_data_chunk() {
        let path = temp_path("nodata.wav");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(load(&path), Err(WavError::MissingData)));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn rejects_truncated_data_chunk() {
        let path = temp_path("shortdata.wav");
        save(&path, &[1, 2, 3, 4]).unwrap();
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.truncate(bytes.len() - 4); // drop two samples, keep the header
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(load(&path), Err(WavError::ShortRead { .. })));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn rejects_stereo_input() {
        let path = temp_path("stereo.wav");
        save(&path, &[1, 2, 3, 4]).unwrap();
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[22] = 2; // channel count lives at offset 22 in the canonical header
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            load(&path),
            Err(WavError::UnsupportedFormat { channels: 2, .. })
        ));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn skips_unknown_chunks() {
        let path = temp_path("extrachunk.wav");
        let samples: Vec<i16> = vec![10, -20, 30];
        save(&path, &samples).unwrap();
        let bytes = std::fs::read(&path).unwrap();

        // Rebuild the file with a LIST chunk wedged between fmt and data.
        let mut patched = Vec::new();
        patched.extend_from_slice(&bytes[..36]); // RIFF header + fmt chunk
        patched.extend_from_slice(b"LIST");
        patched.extend_from_slice(&6u32.to_le_bytes());
        patched.extend_from_slice(b"ignore");
        patched.extend_from_slice(&bytes[36..]); // data chunk
        let riff_size = (patched.len() - 8) as u32;
        patched[4..8].copy_from_slice(&riff_size.to_le_bytes());
        std::fs::write(&path, &patched).unwrap();

        assert_eq!(load(&path).unwrap(), samples);
        std::fs::remove_file(&path).ok();
    }
}
