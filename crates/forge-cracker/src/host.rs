//! Host platform ports.
//!
//! The engine never talks to a case database, tag manager, or UI directly;
//! it consumes these narrow traits instead. The forensic platform embedding
//! the engine provides real implementations, tests provide in-memory ones.
//! All methods take `&self`: implementations are expected to manage their
//! own interior mutability, which keeps the orchestrator free to hold the
//! ports alongside worker threads.

use std::io;
use std::path::PathBuf;

/// Opaque id of an object in the host's file/artifact store.
pub type FileId = u64;

/// Where to harvest candidate strings from, relative to the target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Files sharing the target's parent folder.
    Folder,
    /// Files in the target's data source.
    DataSource,
    /// Files in every data source of the target's host.
    Hostname,
    /// Every file in the case.
    All,
}

/// Attribute values the engine reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Int(i64),
    Str(String),
    /// JSON-encoded structured value (e.g. the key-protector list).
    Json(String),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) | AttrValue::Json(s) => Some(s),
            AttrValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

/// File access and navigation.
pub trait FileStore {
    /// Whole-file contents. Harvesting reads are bounded by the host.
    fn read(&self, id: FileId) -> io::Result<Vec<u8>>;
    /// Local filesystem path of the object, when it has one (needed for the
    /// container re-reads done by the ZIP verifiers and the export hook).
    fn local_path(&self, id: FileId) -> Option<PathBuf>;
    /// Resolve a harvest scope around `origin` to concrete files.
    fn find_files(&self, scope: Scope, origin: FileId) -> Vec<FileId>;
    fn parent(&self, id: FileId) -> Option<FileId>;
    fn mime_of(&self, id: FileId) -> String;
    fn extension_of(&self, id: FileId) -> String;
    fn name_of(&self, id: FileId) -> String;
}

/// Persistent per-object attributes (the host's artifact/blackboard store).
pub trait ArtifactStore {
    fn get_attribute(&self, object: FileId, name: &str) -> Option<AttrValue>;
    fn put_attribute(&self, object: FileId, name: &str, value: AttrValue);
}

/// Content tags applied by the analyst.
pub trait TagStore {
    fn files_tagged(&self, tag_name: &str) -> Vec<FileId>;
}

/// User-facing notifications.
pub trait Notifier {
    fn info(&self, title: &str, detail: &str);
    fn warn(&self, title: &str, detail: &str);
    fn error(&self, title: &str, detail: &str);
}

/// Progress reporting and cooperative cancellation.
///
/// The orchestrator polls [`Progress::cancel_requested`] while it pumps
/// worker progress, so a UI cancel button needs only to flip a flag.
pub trait Progress {
    fn start(&self, label: &str);
    fn determinate(&self, total: u64);
    fn indeterminate(&self, label: &str);
    fn advance(&self, n: u64, label: &str);
    fn finish(&self);
    fn cancel_requested(&self) -> bool;
}

/// The full set of ports a crack job needs.
#[derive(Clone, Copy)]
pub struct Ports<'a> {
    pub files: &'a dyn FileStore,
    pub artifacts: &'a dyn ArtifactStore,
    pub tags: &'a dyn TagStore,
    pub notifier: &'a dyn Notifier,
    pub progress: &'a dyn Progress,
}
