//! Domain types for mediacheck.
//!
//! # Module Organization
//!
//! - `content` - Broad content kind sniffed from a file prefix
//! - `media` - Container and stream metadata reported by the prober
//! - `status` - Policy verdicts and failure reasons
//! - `record` - Persisted bad-file records and their owning service
//! - `event` - Notification event kinds
//! - `stats` - Persisted run statistics
//!
//! All public types are re-exported at this module level and at the crate root:
//!
//! ```
//! use mc_core::{ContentKind, FailureReason, Verdict};
//! ```

mod content;
mod event;
mod media;
mod record;
mod stats;
mod status;

pub use content::ContentKind;
pub use event::EventKind;
pub use media::{CodecType, MediaMetadata, MediaStream};
pub use record::{BadFileEntry, BadFileRecord, OwnerKind};
pub use stats::StatsSnapshot;
pub use status::{FailureReason, Verdict};
