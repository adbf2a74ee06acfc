//! Sampled content fingerprints.
//!
//! A [`ContentHash`] detects silent content change cheaply, including on very
//! large media files. It is not cryptographic.
//!
//! # Layout
//!
//! 16 bytes: the file length (`u64`, little endian) followed by an `XxHash64`
//! (seed 0) digest of the sampled content.
//!
//! - Files up to [`SAMPLE_THRESHOLD`] bytes are hashed in full.
//! - Larger files hash three [`SAMPLE_SIZE`] windows: start, middle and end.
//!
//! Folding the length in means truncation or growth is always detected even
//! when every sampled window is unchanged.

use std::fmt;
use std::fs::File;
use std::hash::Hasher as _;
use std::io::{self, Read, Seek, SeekFrom};

use camino::Utf8Path;
use twox_hash::XxHash64;

/// Files at or below this size are hashed in full.
pub const SAMPLE_THRESHOLD: u64 = 128 * 1024;

/// Size of each sampled window for larger files.
pub const SAMPLE_SIZE: usize = 16 * 1024;

/// Read buffer for whole-file hashing.
const CHUNK_SIZE: usize = 64 * 1024;

/// A deterministic fingerprint of a file's content.
///
/// # Examples
///
/// ```
/// use mc_core::ContentHash;
///
/// let a = ContentHash::of_bytes(b"same bytes");
/// let b = ContentHash::of_bytes(b"same bytes");
/// assert_eq!(a, b);
/// assert_ne!(a, ContentHash::of_bytes(b"same byteZ"));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Fingerprints the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened or read.
    pub fn of_file(path: &Utf8Path) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        Self::of_reader(&mut file, len)
    }

    /// Fingerprints an in-memory buffer with the same layout as [`of_file`](Self::of_file).
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut cursor = io::Cursor::new(bytes);
        // Reading from a cursor over a slice cannot fail.
        Self::of_reader(&mut cursor, bytes.len() as u64).unwrap_or(Self([0; 16]))
    }

    /// Fingerprints `len` bytes of a seekable reader.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if seeking or reading fails.
    pub fn of_reader<R: Read + Seek>(reader: &mut R, len: u64) -> io::Result<Self> {
        let mut hasher = XxHash64::with_seed(0);

        if len <= SAMPLE_THRESHOLD {
            let mut buf = vec![0u8; CHUNK_SIZE];
            reader.seek(SeekFrom::Start(0))?;
            loop {
                let read = reader.read(&mut buf)?;
                if read == 0 {
                    break;
                }
                hasher.write(&buf[..read]);
            }
        } else {
            let mut buf = vec![0u8; SAMPLE_SIZE];
            let sample = SAMPLE_SIZE as u64;
            for offset in [0, len / 2 - sample / 2, len - sample] {
                reader.seek(SeekFrom::Start(offset))?;
                reader.read_exact(&mut buf)?;
                hasher.write(&buf);
            }
        }

        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&len.to_le_bytes());
        bytes[8..].copy_from_slice(&hasher.finish().to_le_bytes());
        Ok(Self(bytes))
    }

    /// Rebuilds a hash from its stored bytes.
    ///
    /// Returns `None` if `bytes` is not exactly 16 bytes long.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 16]>::try_from(bytes).ok().map(Self)
    }

    /// Returns the raw bytes for storage.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({self})")
    }
}
