//! Content classification from a bounded file prefix.
//!
//! [`classify`] looks only at the first [`PREFIX_LEN`] bytes of a file.
//! Container signatures live in headers, so reading the whole file is never
//! needed.
//!
//! # Precedence
//!
//! ```text
//! audio ─► video ─► image ─► document ─► plain text ─► unknown
//! ```
//!
//! Audio and video always win: media files regularly carry embedded cover
//! art or text that a naive sniffer would pick up first.

use std::fs::File;
use std::io::{self, Read};

use camino::Utf8Path;
use mc_core::ContentKind;

/// Number of leading bytes read for classification.
pub const PREFIX_LEN: usize = 33_000;

/// MPEG transport stream sync byte.
const TS_SYNC: u8 = 0x47;

/// MPEG-TS packet size.
const TS_PACKET: usize = 188;

/// Blu-ray M2TS packet size (4-byte timecode + TS packet).
const M2TS_PACKET: usize = 192;

/// Number of leading bytes inspected for binary control characters.
const TEXT_SNIFF_LEN: usize = 512;

/// Reads up to [`PREFIX_LEN`] bytes from the start of a file.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be opened or read.
pub fn read_prefix(path: &Utf8Path) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut buf = Vec::with_capacity(PREFIX_LEN);
    file.take(PREFIX_LEN as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

/// Decides the broad content kind of a file from its leading bytes.
///
/// # Examples
///
/// ```
/// use mc_core::ContentKind;
/// use mc_probe::classify;
///
/// assert_eq!(classify(b"fLaC\0\0\0\x22"), ContentKind::Audio);
/// assert_eq!(classify(b"1\n00:00:01,000 --> 00:00:02,000\nHello\n"), ContentKind::PlainText);
/// assert_eq!(classify(&[0x00, 0x01, 0x02, 0x03]), ContentKind::Unknown);
/// ```
#[must_use]
pub fn classify(buf: &[u8]) -> ContentKind {
    if infer::is_audio(buf) {
        ContentKind::Audio
    } else if is_video(buf) {
        ContentKind::Video
    } else if infer::is_image(buf) {
        ContentKind::Image
    } else if infer::is_document(buf) || infer::is_book(buf) {
        ContentKind::Document
    } else if is_plain_text(buf) {
        ContentKind::PlainText
    } else {
        ContentKind::Unknown
    }
}

fn is_video(buf: &[u8]) -> bool {
    infer::is_video(buf) || is_mpeg_ts(buf) || is_m2ts(buf)
}

/// Transport streams carry no magic number beyond the packet sync byte, so
/// two consecutive packets must both start with it.
fn is_mpeg_ts(buf: &[u8]) -> bool {
    buf.first() == Some(&TS_SYNC) && buf.get(TS_PACKET) == Some(&TS_SYNC)
}

fn is_m2ts(buf: &[u8]) -> bool {
    buf.get(4) == Some(&TS_SYNC) && buf.get(M2TS_PACKET + 4) == Some(&TS_SYNC)
}

/// UTF-8 without binary control characters.
///
/// A multi-byte character cut off by the prefix boundary is tolerated.
fn is_plain_text(buf: &[u8]) -> bool {
    if buf.is_empty() {
        return false;
    }

    let sniff = &buf[..buf.len().min(TEXT_SNIFF_LEN)];
    if sniff.iter().any(|&b| is_binary_control(b)) {
        return false;
    }

    match std::str::from_utf8(buf) {
        Ok(_) => true,
        Err(err) => err.error_len().is_none() && buf.len() - err.valid_up_to() < 4,
    }
}

const fn is_binary_control(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}
