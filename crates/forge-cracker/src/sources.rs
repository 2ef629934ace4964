//! Candidate password assembly.
//!
//! Candidates come from any combination of four sources: a bundled
//! common-password list, an analyst-supplied wordlist file, strings harvested
//! from files in a configurable scope, and strings from files the analyst
//! tagged as cracker sources. Duplicates are dropped while preserving first
//! insertion order, so cheap sources tried first stay first.

use std::collections::HashSet;
use std::path::PathBuf;

use forge_formats::strings;

use crate::attrs::CRACKER_SOURCE_TAG;
use crate::host::{FileId, Ports, Scope};
use crate::wordlists;

/// Which candidate sources a job draws from.
#[derive(Debug, Clone, Default)]
pub struct CandidateConfig {
    /// Size of the bundled common-password list to include (10, 100, ...).
    pub common: Option<usize>,
    /// Analyst-supplied wordlist; must be plain text.
    pub wordlist: Option<PathBuf>,
    /// Harvest printable strings from every file in this scope.
    pub strings_scope: Option<Scope>,
    /// Harvest from files tagged "FORGE Cracker Source".
    pub tagged: bool,
}

/// Assemble the ordered, deduplicated candidate list.
///
/// Unreadable files and sources are reported and skipped; assembly itself
/// never fails.
pub fn collect_candidates(
    config: &CandidateConfig,
    ports: Ports<'_>,
    origin: FileId,
) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut candidates: Vec<String> = Vec::new();
    let push = |candidate: &str, seen: &mut HashSet<String>, out: &mut Vec<String>| {
        let candidate = candidate.trim_end_matches(['\r', '\n']);
        if candidate.is_empty() {
            return;
        }
        if seen.insert(candidate.to_string()) {
            out.push(candidate.to_string());
        }
    };

    if let Some(count) = config.common {
        let lines = wordlists::bundled_lines(count);
        if lines.is_empty() {
            ports.notifier.warn(
                "Common password list",
                &format!("no bundled list for size {count}"),
            );
        }
        for line in &lines {
            push(line, &mut seen, &mut candidates);
        }
    }

    if let Some(scope) = config.strings_scope {
        for id in ports.files.find_files(scope, origin) {
            harvest_file(ports, id, &mut |line| push(line, &mut seen, &mut candidates));
        }
    }

    if config.tagged {
        for id in ports.tags.files_tagged(CRACKER_SOURCE_TAG) {
            harvest_file(ports, id, &mut |line| push(line, &mut seen, &mut candidates));
        }
    }

    if let Some(path) = &config.wordlist {
        match std::fs::read(path) {
            Ok(bytes) if looks_like_text(&bytes) => {
                for line in String::from_utf8_lossy(&bytes).lines() {
                    push(line, &mut seen, &mut candidates);
                }
            }
            Ok(_) => {
                ports.notifier.error(
                    "Error reading wordlist file",
                    &format!("{} is not a text file", path.display()),
                );
            }
            Err(err) => {
                ports.notifier.error(
                    "Error reading wordlist file",
                    &format!("{}: {err}", path.display()),
                );
            }
        }
    }

    candidates
}

fn harvest_file(ports: Ports<'_>, id: FileId, push: &mut dyn FnMut(&str)) {
    let bytes = match ports.files.read(id) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::debug!("skipping unreadable harvest source {id}: {err}");
            return;
        }
    };
    let mime = ports.files.mime_of(id);
    let ext = ports.files.extension_of(id);
    for line in strings::extract_strings(&bytes, &mime, &ext) {
        push(&line);
    }
}

/// Plain-text check for analyst wordlists: reject anything with NUL bytes in
/// its leading chunk (a cheap stand-in for content-type probing).
fn looks_like_text(bytes: &[u8]) -> bool {
    !bytes.iter().take(8192).any(|&b| b == 0)
}
