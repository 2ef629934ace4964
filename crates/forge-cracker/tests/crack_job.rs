//! End-to-end crack-job runs against a real ZipCrypto archive, with the host
//! ports backed by in-memory fakes.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use forge_cracker::attrs::{FORGE_PASSWORD, FORGE_TRIED_PASSWORD};
use forge_cracker::{
    ArtifactStore, AttrValue, CandidateConfig, CrackJob, CrackOptions, CrackOutcome,
    EnumerationConfig, FileId, FileStore, Notifier, Ports, Progress, Scope, TagStore,
};
use forge_formats::zip::parse_archive;
use forge_formats::FormatDescriptor;

const TARGET: FileId = 42;

#[derive(Default)]
struct FakeFiles {
    paths: HashMap<FileId, PathBuf>,
}

impl FileStore for FakeFiles {
    fn read(&self, id: FileId) -> io::Result<Vec<u8>> {
        let path = self
            .paths
            .get(&id)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "unknown file id"))?;
        std::fs::read(path)
    }
    fn local_path(&self, id: FileId) -> Option<PathBuf> {
        self.paths.get(&id).cloned()
    }
    fn find_files(&self, _scope: Scope, _origin: FileId) -> Vec<FileId> {
        Vec::new()
    }
    fn parent(&self, _id: FileId) -> Option<FileId> {
        None
    }
    fn mime_of(&self, _id: FileId) -> String {
        "application/zip".to_string()
    }
    fn extension_of(&self, _id: FileId) -> String {
        "zip".to_string()
    }
    fn name_of(&self, _id: FileId) -> String {
        "secrets.zip".to_string()
    }
}

#[derive(Default)]
struct FakeArtifacts {
    attributes: Mutex<HashMap<(FileId, String), AttrValue>>,
}

impl FakeArtifacts {
    fn get(&self, object: FileId, name: &str) -> Option<AttrValue> {
        self.attributes
            .lock()
            .unwrap()
            .get(&(object, name.to_string()))
            .cloned()
    }

    fn seed(&self, object: FileId, name: &str, value: AttrValue) {
        self.attributes
            .lock()
            .unwrap()
            .insert((object, name.to_string()), value);
    }
}

impl ArtifactStore for FakeArtifacts {
    fn get_attribute(&self, object: FileId, name: &str) -> Option<AttrValue> {
        self.get(object, name)
    }
    fn put_attribute(&self, object: FileId, name: &str, value: AttrValue) {
        self.seed(object, name, value);
    }
}

#[derive(Default)]
struct FakeTags;
impl TagStore for FakeTags {
    fn files_tagged(&self, _tag_name: &str) -> Vec<FileId> {
        Vec::new()
    }
}

#[derive(Default)]
struct FakeNotifier {
    messages: Mutex<Vec<String>>,
}
impl Notifier for FakeNotifier {
    fn info(&self, title: &str, detail: &str) {
        self.messages.lock().unwrap().push(format!("{title}: {detail}"));
    }
    fn warn(&self, title: &str, detail: &str) {
        self.messages.lock().unwrap().push(format!("{title}: {detail}"));
    }
    fn error(&self, title: &str, detail: &str) {
        self.messages.lock().unwrap().push(format!("{title}: {detail}"));
    }
}

#[derive(Default)]
struct FakeProgress {
    cancel: bool,
}
impl Progress for FakeProgress {
    fn start(&self, _label: &str) {}
    fn determinate(&self, _total: u64) {}
    fn indeterminate(&self, _label: &str) {}
    fn advance(&self, _n: u64, _label: &str) {}
    fn finish(&self) {}
    fn cancel_requested(&self) -> bool {
        self.cancel
    }
}

struct Host {
    files: FakeFiles,
    artifacts: FakeArtifacts,
    tags: FakeTags,
    notifier: FakeNotifier,
    progress: FakeProgress,
}

impl Host {
    fn new(archive: &Path) -> Self {
        let mut files = FakeFiles::default();
        files.paths.insert(TARGET, archive.to_path_buf());
        Host {
            files,
            artifacts: FakeArtifacts::default(),
            tags: FakeTags,
            notifier: FakeNotifier::default(),
            progress: FakeProgress::default(),
        }
    }

    fn ports(&self) -> Ports<'_> {
        Ports {
            files: &self.files,
            artifacts: &self.artifacts,
            tags: &self.tags,
            notifier: &self.notifier,
            progress: &self.progress,
        }
    }
}

/// Test-only ZipCrypto archive writer, byte-exact per APPNOTE §6.1 so the
/// generated fixture exercises the same header/check-byte layout the
/// verifier implements. Entries are stored uncompressed.
mod zipcrypto_writer {
    fn crc_table() -> [u32; 256] {
        let mut table = [0u32; 256];
        for (i, slot) in table.iter_mut().enumerate() {
            let mut r = i as u32;
            for _ in 0..8 {
                r = if r & 1 != 0 { (r >> 1) ^ 0xEDB8_8320 } else { r >> 1 };
            }
            *slot = r;
        }
        table
    }

    pub fn crc32(data: &[u8]) -> u32 {
        let table = crc_table();
        let mut crc = 0xFFFF_FFFFu32;
        for &b in data {
            crc = (crc >> 8) ^ table[((crc ^ u32::from(b)) & 0xFF) as usize];
        }
        !crc
    }

    struct Keys {
        table: [u32; 256],
        k0: u32,
        k1: u32,
        k2: u32,
    }

    impl Keys {
        fn new(password: &[u8]) -> Self {
            let mut keys = Keys {
                table: crc_table(),
                k0: 0x1234_5678,
                k1: 0x2345_6789,
                k2: 0x3456_7890,
            };
            for &b in password {
                keys.update(b);
            }
            keys
        }

        fn step(&self, crc: u32, byte: u8) -> u32 {
            (crc >> 8) ^ self.table[((crc ^ u32::from(byte)) & 0xFF) as usize]
        }

        fn update(&mut self, byte: u8) {
            self.k0 = self.step(self.k0, byte);
            self.k1 = (self.k1.wrapping_add(self.k0 & 0xFF))
                .wrapping_mul(134_775_813)
                .wrapping_add(1);
            self.k2 = self.step(self.k2, (self.k1 >> 24) as u8);
        }

        fn encrypt_byte(&mut self, plain: u8) -> u8 {
            let temp = (self.k2 | 2) as u16;
            let cipher = plain ^ (temp.wrapping_mul(temp ^ 1) >> 8) as u8;
            self.update(plain);
            cipher
        }

        fn decrypt_byte(&mut self, cipher: u8) -> u8 {
            let temp = (self.k2 | 2) as u16;
            let plain = cipher ^ (temp.wrapping_mul(temp ^ 1) >> 8) as u8;
            self.update(plain);
            plain
        }
    }

    /// Search for a wrong password whose decryption of the 12-byte header
    /// happens to end in the expected check byte (roughly 1 in 256 do).
    pub fn find_check_byte_collision(archive: &[u8], real_password: &str, check_byte: u8) -> String {
        // The encryption header of the single stored entry starts right
        // after the local header (30 bytes fixed + 16-byte entry name).
        let header = &archive[30 + 16..30 + 16 + 12];
        for i in 0u32.. {
            let candidate = format!("not-it-{i}");
            if candidate == real_password {
                continue;
            }
            let mut keys = Keys::new(candidate.as_bytes());
            let mut last = 0u8;
            for &b in header {
                last = keys.decrypt_byte(b);
            }
            if last == check_byte {
                return candidate;
            }
        }
        unreachable!("collision search is unbounded");
    }

    /// One stored, ZipCrypto-encrypted entry with the CRC high byte as the
    /// header check byte (no data descriptor).
    pub fn build_archive(name: &str, password: &str, plaintext: &[u8]) -> Vec<u8> {
        const MOD_TIME: u16 = 0x6C5A;
        const MOD_DATE: u16 = 0x58A3;
        let crc = crc32(plaintext);

        let mut keys = Keys::new(password.as_bytes());
        let mut data = Vec::with_capacity(12 + plaintext.len());
        let mut header = [0xA4u8; 12];
        header[11] = (crc >> 24) as u8;
        for &b in &header {
            data.push(keys.encrypt_byte(b));
        }
        for &b in plaintext {
            data.push(keys.encrypt_byte(b));
        }

        let comp_size = data.len() as u32;
        let uncomp_size = plaintext.len() as u32;

        let mut out = Vec::new();
        out.extend_from_slice(&0x0403_4B50u32.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // encrypted
        out.extend_from_slice(&0u16.to_le_bytes()); // stored
        out.extend_from_slice(&MOD_TIME.to_le_bytes());
        out.extend_from_slice(&MOD_DATE.to_le_bytes());
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&comp_size.to_le_bytes());
        out.extend_from_slice(&uncomp_size.to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&data);

        let cd_offset = out.len() as u32;
        out.extend_from_slice(&0x0201_4B50u32.to_le_bytes());
        out.extend_from_slice(&0x031Eu16.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&MOD_TIME.to_le_bytes());
        out.extend_from_slice(&MOD_DATE.to_le_bytes());
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&comp_size.to_le_bytes());
        out.extend_from_slice(&uncomp_size.to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // extra
        out.extend_from_slice(&0u16.to_le_bytes()); // comment
        out.extend_from_slice(&0u16.to_le_bytes()); // disk
        out.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
        out.extend_from_slice(&0u32.to_le_bytes()); // external attrs
        out.extend_from_slice(&0u32.to_le_bytes()); // local header offset
        out.extend_from_slice(name.as_bytes());
        let cd_size = out.len() as u32 - cd_offset;

        out.extend_from_slice(&0x0605_4B50u32.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&cd_size.to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }
}

const PLAINTEXT: &[u8] = b"quarterly report draft\nrevenue 1042\ncosts 733\nheadcount 12\n";

/// Write a single-entry ZipCrypto archive and return the crackable
/// descriptor for its entry.
fn zipcrypto_fixture(dir: &Path, password: &str) -> (PathBuf, FormatDescriptor) {
    let archive_path = dir.join("secrets.zip");
    let bytes = zipcrypto_writer::build_archive("notes/report.txt", password, PLAINTEXT);
    std::fs::write(&archive_path, bytes).unwrap();

    let mut file = std::fs::File::open(&archive_path).unwrap();
    let archive = parse_archive(&mut file).expect("parse generated archive");
    let entry = archive
        .entries
        .iter()
        .find(|e| e.encrypted())
        .expect("encrypted entry");
    let descriptor = entry
        .descriptor(&archive_path)
        .expect("crackable descriptor");
    assert!(matches!(descriptor, FormatDescriptor::ZipCrypto(_)));
    (archive_path, descriptor)
}

fn wordlist(dir: &Path, words: &[&str]) -> PathBuf {
    let path = dir.join("wordlist.txt");
    std::fs::write(&path, words.join("\n")).unwrap();
    path
}

#[test]
fn finds_password_from_wordlist_and_persists_it() {
    let dir = tempfile::tempdir().unwrap();
    let (archive_path, descriptor) = zipcrypto_fixture(dir.path(), "autumn-leaf");
    let host = Host::new(&archive_path);

    let options = CrackOptions {
        workers: 3,
        candidates: CandidateConfig {
            wordlist: Some(wordlist(
                dir.path(),
                &["wrong-one", "also-wrong", "autumn-leaf", "never-reached-maybe"],
            )),
            ..CandidateConfig::default()
        },
        ..CrackOptions::default()
    };

    let job = CrackJob::new(descriptor, TARGET, options, host.ports());
    let outcome = job.run().expect("job runs");
    assert_eq!(outcome, CrackOutcome::Found("autumn-leaf".to_string()));

    let password = host.artifacts.get(TARGET, FORGE_PASSWORD).unwrap();
    assert_eq!(password.as_str(), Some("autumn-leaf"));

    // ZIP results also land on the tried list so a re-run can skip a
    // possibly colliding hit.
    let tried = host.artifacts.get(TARGET, FORGE_TRIED_PASSWORD).unwrap();
    assert!(tried.as_str().unwrap().split(',').any(|t| t == "autumn-leaf"));
}

#[test]
fn previously_tried_candidates_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let (archive_path, descriptor) = zipcrypto_fixture(dir.path(), "autumn-leaf");
    let host = Host::new(&archive_path);
    // Everything in the wordlist was already tried in an earlier run.
    host.artifacts.seed(
        TARGET,
        FORGE_TRIED_PASSWORD,
        AttrValue::Str("autumn-leaf,also-wrong".to_string()),
    );

    let options = CrackOptions {
        workers: 2,
        candidates: CandidateConfig {
            wordlist: Some(wordlist(dir.path(), &["also-wrong", "autumn-leaf"])),
            ..CandidateConfig::default()
        },
        ..CrackOptions::default()
    };

    let job = CrackJob::new(descriptor, TARGET, options, host.ports());
    assert_eq!(job.run().unwrap(), CrackOutcome::Exhausted);
    assert!(host.artifacts.get(TARGET, FORGE_PASSWORD).is_none());
    let messages = host.notifier.messages.lock().unwrap();
    assert!(
        messages.iter().any(|m| m.contains("no password found")),
        "{messages:?}"
    );
}

#[test]
fn colliding_candidate_is_rejected_by_full_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let (archive_path, descriptor) = zipcrypto_fixture(dir.path(), "autumn-leaf");
    let host = Host::new(&archive_path);

    // A wrong password that survives the one-byte header check; only the
    // library extraction (CRC over the decrypted entry) can reject it.
    let archive_bytes = std::fs::read(&archive_path).unwrap();
    let check_byte = (zipcrypto_writer::crc32(PLAINTEXT) >> 24) as u8;
    let collider =
        zipcrypto_writer::find_check_byte_collision(&archive_bytes, "autumn-leaf", check_byte);

    let options = CrackOptions {
        workers: 1,
        candidates: CandidateConfig {
            wordlist: Some(wordlist(dir.path(), &[&collider])),
            ..CandidateConfig::default()
        },
        ..CrackOptions::default()
    };

    let job = CrackJob::new(descriptor, TARGET, options, host.ports());
    assert_eq!(job.run().unwrap(), CrackOutcome::Exhausted);
    assert!(host.artifacts.get(TARGET, FORGE_PASSWORD).is_none());
}

#[test]
fn exhaustive_enumeration_finds_short_password() {
    let dir = tempfile::tempdir().unwrap();
    let (archive_path, descriptor) = zipcrypto_fixture(dir.path(), "zz");
    let host = Host::new(&archive_path);

    let options = CrackOptions {
        workers: 2,
        enumeration: Some(EnumerationConfig {
            charset: vec!['z'],
            min_len: 1,
            max_len: 2,
        }),
        ..CrackOptions::default()
    };

    let job = CrackJob::new(descriptor, TARGET, options, host.ports());
    assert_eq!(job.run().unwrap(), CrackOutcome::Found("zz".to_string()));
}

#[test]
fn external_cancellation_stops_the_search() {
    let dir = tempfile::tempdir().unwrap();
    let (archive_path, descriptor) = zipcrypto_fixture(dir.path(), "autumn-leaf");
    let mut host = Host::new(&archive_path);
    host.progress.cancel = true;

    // A space far too large to exhaust; only cancellation can end this run.
    let options = CrackOptions {
        workers: 2,
        enumeration: Some(EnumerationConfig {
            charset: ('a'..='z').collect(),
            min_len: 1,
            max_len: 8,
        }),
        ..CrackOptions::default()
    };

    let job = CrackJob::new(descriptor, TARGET, options, host.ports());
    assert_eq!(job.run().unwrap(), CrackOutcome::Cancelled);
    let messages = host.notifier.messages.lock().unwrap();
    assert!(messages.iter().any(|m| m.contains("cancelled")), "{messages:?}");
}

#[test]
fn auto_decrypt_exports_the_entry() {
    let dir = tempfile::tempdir().unwrap();
    let (archive_path, descriptor) = zipcrypto_fixture(dir.path(), "autumn-leaf");
    let host = Host::new(&archive_path);
    let export_dir = dir.path().join("export");

    let options = CrackOptions {
        workers: 1,
        candidates: CandidateConfig {
            wordlist: Some(wordlist(dir.path(), &["autumn-leaf"])),
            ..CandidateConfig::default()
        },
        auto_decrypt: true,
        export_dir: Some(export_dir.clone()),
        ..CrackOptions::default()
    };

    let job = CrackJob::new(descriptor, TARGET, options, host.ports());
    assert_eq!(
        job.run().unwrap(),
        CrackOutcome::Found("autumn-leaf".to_string())
    );
    let exported = std::fs::read(export_dir.join("report.txt")).expect("exported plaintext");
    assert_eq!(exported, PLAINTEXT);
}
