//! Concurrent password search over detected encrypted containers.
//!
//! A [`job::CrackJob`] owns one [`forge_formats::FormatDescriptor`] for the
//! duration of a run: it assembles candidate passwords from the configured
//! sources, subtracts candidates already tried in earlier runs, partitions
//! the rest across a fixed pool of worker threads, and stops on the first
//! confirmed hit. All host-side concerns (file access, artifact persistence,
//! tags, notifications, progress) enter through the ports in [`host`], so
//! the whole engine runs against in-memory fakes in tests.

pub mod attrs;
pub mod enumerate;
pub mod host;
pub mod job;
pub mod sources;
pub mod wordlists;

pub use enumerate::{EnumerationError, PasswordSpace};
pub use host::{ArtifactStore, AttrValue, FileId, FileStore, Notifier, Ports, Progress, Scope, TagStore};
pub use job::{CrackJob, CrackOptions, CrackOutcome, EnumerationConfig};
pub use sources::CandidateConfig;

/// Errors that abort a crack job outright.
///
/// Most per-source failures are deliberately *not* here: an unreadable
/// wordlist or one odd file in the string-harvest scope is skipped with a
/// notification, and the job keeps going.
#[derive(Debug, thiserror::Error)]
pub enum CrackError {
    #[error(transparent)]
    Verify(#[from] forge_verify::VerifyError),
    #[error(transparent)]
    Enumeration(#[from] enumerate::EnumerationError),
    #[error("failed to prepare {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}
