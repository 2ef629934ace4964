//! The crack-job orchestrator.
//!
//! One job owns one descriptor. It assembles candidates, subtracts the ones
//! recorded as already tried, deals the rest across a fixed pool of worker
//! threads round-robin, and optionally chases the dictionary with an
//! exhaustive enumeration tail. Workers share exactly two pieces of mutable
//! state: a cancellation flag and a write-once result slot. The winning
//! worker installs its password *before* raising the flag, so losers can
//! only ever observe a flag with the result already present. Progress flows
//! back over a channel and is forwarded to the host from the orchestrator
//! thread; workers never touch a port.

use std::collections::HashSet;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, OnceLock};
use std::time::Duration;

use forge_formats::FormatDescriptor;
use forge_verify::{Verifier, VerifyError};

use crate::attrs::{FORGE_PASSWORD, FORGE_TRIED_PASSWORD};
use crate::enumerate::PasswordSpace;
use crate::host::{AttrValue, FileId, Ports};
use crate::sources::{collect_candidates, CandidateConfig};
use crate::CrackError;

/// Workers probe the cancellation flag and report progress every this many
/// verification attempts.
const REPORT_EVERY: usize = 50;

/// Exhaustive-enumeration tail configuration.
#[derive(Debug, Clone)]
pub struct EnumerationConfig {
    pub charset: Vec<char>,
    pub min_len: usize,
    pub max_len: usize,
}

#[derive(Debug, Clone)]
pub struct CrackOptions {
    /// Worker thread count, at least 1.
    pub workers: usize,
    pub candidates: CandidateConfig,
    /// Exhaustive enumeration after the candidate lists run dry.
    pub enumeration: Option<EnumerationConfig>,
    /// Decrypt and export the payload once a password is found.
    pub auto_decrypt: bool,
    /// Where decrypted payloads are exported; required for `auto_decrypt`.
    pub export_dir: Option<PathBuf>,
}

impl Default for CrackOptions {
    fn default() -> Self {
        CrackOptions {
            workers: 1,
            candidates: CandidateConfig::default(),
            enumeration: None,
            auto_decrypt: false,
            export_dir: None,
        }
    }
}

/// The three ways a finished job is reported to the analyst.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrackOutcome {
    Found(String),
    Exhausted,
    Cancelled,
}

pub struct CrackJob<'a> {
    descriptor: FormatDescriptor,
    target: FileId,
    options: CrackOptions,
    ports: Ports<'a>,
}

impl<'a> CrackJob<'a> {
    pub fn new(
        descriptor: FormatDescriptor,
        target: FileId,
        options: CrackOptions,
        ports: Ports<'a>,
    ) -> Self {
        CrackJob {
            descriptor,
            target,
            options,
            ports,
        }
    }

    /// Run the search to completion, cancellation, or first confirmed hit.
    pub fn run(&self) -> Result<CrackOutcome, CrackError> {
        // Scratch extractions live here; the directory is removed on every
        // exit path when the handle drops.
        let scratch = tempfile::tempdir().map_err(|source| CrackError::Io {
            context: "scratch directory",
            source,
        })?;
        let verifier = Verifier::for_descriptor(&self.descriptor, scratch.path())?;
        let space = match &self.options.enumeration {
            Some(cfg) => Some(PasswordSpace::new(
                cfg.charset.clone(),
                cfg.min_len,
                cfg.max_len,
            )?),
            None => None,
        };

        let progress = self.ports.progress;
        progress.start("Generating password list");

        let previously_tried = self.read_tried_passwords();
        let mut candidates = collect_candidates(&self.options.candidates, self.ports, self.target);
        if !previously_tried.is_empty() {
            candidates.retain(|candidate| !previously_tried.contains(candidate));
        }

        let workers = self.options.workers.max(1);
        let lists = round_robin(&candidates, workers);
        let ranges = match &space {
            Some(space) => space.worker_ranges(workers),
            None => vec![0..0; workers],
        };

        let list_total = candidates.len() as u64;
        progress.determinate(list_total);

        let cancelled = AtomicBool::new(false);
        let found: OnceLock<String> = OnceLock::new();
        let (tx, rx) = mpsc::channel::<u64>();

        let attempted: Vec<usize> = std::thread::scope(|s| {
            let mut handles = Vec::with_capacity(workers);
            for (list, range) in lists.iter().zip(&ranges) {
                let tx = tx.clone();
                let verifier = &verifier;
                let cancelled = &cancelled;
                let found = &found;
                let tried = &previously_tried;
                let space = space.as_ref();
                handles.push(s.spawn(move || {
                    run_worker(
                        |pwd| verifier.verify(pwd),
                        list,
                        range.clone(),
                        space,
                        tried,
                        cancelled,
                        found,
                        &tx,
                    )
                }));
            }
            drop(tx);

            self.pump_progress(rx, &cancelled, list_total);
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or(0))
                .collect()
        });

        // All workers have returned; nothing mutates shared state past here.
        let outcome = if let Some(password) = found.get() {
            CrackOutcome::Found(password.clone())
        } else if cancelled.load(Ordering::Acquire) {
            CrackOutcome::Cancelled
        } else {
            CrackOutcome::Exhausted
        };

        self.persist_tried_passwords(&previously_tried, &lists, &attempted, &outcome);
        self.report(&verifier, &outcome);
        progress.finish();
        Ok(outcome)
    }

    /// Forward worker progress to the host until every sender is gone,
    /// polling for external cancellation in between.
    fn pump_progress(&self, rx: mpsc::Receiver<u64>, cancelled: &AtomicBool, list_total: u64) {
        let progress = self.ports.progress;
        let mut overall: u64 = 0;
        let mut enumerating = false;
        loop {
            match rx.recv_timeout(Duration::from_millis(200)) {
                Ok(n) => {
                    overall += n;
                    let label = format!("Tried {overall} passwords");
                    // Past the end of the candidate lists the workers are in
                    // the open-ended enumeration tail.
                    if overall > list_total && !enumerating {
                        enumerating = true;
                        progress.indeterminate(&label);
                    } else if enumerating {
                        progress.indeterminate(&label);
                    } else {
                        progress.advance(n, &label);
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
            if progress.cancel_requested() {
                cancelled.store(true, Ordering::Release);
            }
        }
    }

    /// Previously tried candidates for this object, recorded as a
    /// comma-joined attribute.
    fn read_tried_passwords(&self) -> HashSet<String> {
        self.ports
            .artifacts
            .get_attribute(self.target, FORGE_TRIED_PASSWORD)
            .and_then(|value| value.as_str().map(str::to_string))
            .map(|joined| {
                joined
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Write back every candidate that was definitely verified this run, so
    /// a re-run skips them. Enumeration-tail candidates are not recorded; the
    /// enumeration restarts from its index range instead.
    fn persist_tried_passwords(
        &self,
        previously_tried: &HashSet<String>,
        lists: &[Vec<String>],
        attempted: &[usize],
        outcome: &CrackOutcome,
    ) {
        let mut tried: Vec<String> = previously_tried.iter().cloned().collect();
        tried.sort_unstable();
        for (list, &count) in lists.iter().zip(attempted) {
            for candidate in &list[..count.min(list.len())] {
                if !previously_tried.contains(candidate) {
                    tried.push(candidate.clone());
                }
            }
        }
        // ZipCrypto and WinZip AES can report false positives, so a future
        // re-run must skip a found password and keep searching.
        if let CrackOutcome::Found(password) = outcome {
            let is_zip = matches!(
                self.descriptor,
                FormatDescriptor::ZipCrypto(_) | FormatDescriptor::ZipAes(_)
            );
            if is_zip && !tried.iter().any(|t| t == password) {
                tried.push(password.clone());
            }
        }
        self.ports.artifacts.put_attribute(
            self.target,
            FORGE_TRIED_PASSWORD,
            AttrValue::Str(tried.join(",")),
        );
    }

    fn report(&self, verifier: &Verifier, outcome: &CrackOutcome) {
        let notifier = self.ports.notifier;
        let label = verifier.label();
        let name = self.ports.files.name_of(self.target);
        match outcome {
            CrackOutcome::Exhausted => {
                notifier.info(
                    &format!("{label}: no password found"),
                    &format!("{label} did not find a password for {name}"),
                );
            }
            CrackOutcome::Cancelled => {
                notifier.info(
                    &format!("{label} cancelled"),
                    &format!("{label} on {name} was cancelled"),
                );
            }
            CrackOutcome::Found(password) => {
                notifier.info(
                    &format!("{name}: password found"),
                    &format!("{label} found the password for {name}: {password}"),
                );
                self.ports.artifacts.put_attribute(
                    self.target,
                    FORGE_PASSWORD,
                    AttrValue::Str(password.clone()),
                );
                if self.options.auto_decrypt {
                    self.export_decrypted(verifier, password);
                }
            }
        }
    }

    fn export_decrypted(&self, verifier: &Verifier, password: &str) {
        let Some(export_dir) = &self.options.export_dir else {
            self.ports.notifier.warn(
                "Decryption skipped",
                "auto-decrypt is enabled but no export directory is configured",
            );
            return;
        };
        let source = self
            .ports
            .files
            .local_path(self.target)
            .unwrap_or_default();
        match verifier.decrypt(password, &source, export_dir) {
            Ok(path) => {
                log::debug!("exported decrypted payload to {path:?}");
            }
            Err(err) => {
                self.ports.notifier.error(
                    &format!("{}: failed to decrypt", verifier.label()),
                    &err.to_string(),
                );
            }
        }
    }
}

/// Deal candidates across workers: candidate `i` goes to worker `i mod N`.
/// Size-balanced, and early common passwords spread over all workers instead
/// of serializing onto one.
fn round_robin(candidates: &[String], workers: usize) -> Vec<Vec<String>> {
    let mut lists = vec![Vec::with_capacity(candidates.len() / workers + 1); workers];
    for (i, candidate) in candidates.iter().enumerate() {
        lists[i % workers].push(candidate.clone());
    }
    lists
}

/// One worker: its share of the candidate list, then its slice of the
/// enumeration space. Returns how many *list* candidates were verified, so
/// the orchestrator can persist exactly what was tried.
#[allow(clippy::too_many_arguments)]
fn run_worker<F>(
    verify: F,
    list: &[String],
    range: Range<u128>,
    space: Option<&PasswordSpace>,
    tried: &HashSet<String>,
    cancelled: &AtomicBool,
    found: &OnceLock<String>,
    progress: &mpsc::Sender<u64>,
) -> usize
where
    F: Fn(&str) -> Result<bool, VerifyError>,
{
    for (i, password) in list.iter().enumerate() {
        if (i + 1) % REPORT_EVERY == 0 {
            if cancelled.load(Ordering::Acquire) {
                return i;
            }
            let _ = progress.send(REPORT_EVERY as u64);
        }
        match verify(password) {
            Ok(false) => {}
            Ok(true) => {
                // First writer wins; the flag is raised only after the
                // result is installed.
                let _ = found.set(password.clone());
                cancelled.store(true, Ordering::Release);
                return i + 1;
            }
            Err(err) => {
                log::warn!("verifier error, stopping this worker: {err}");
                return i;
            }
        }
    }

    let attempted = list.len();
    let Some(space) = space else {
        return attempted;
    };
    for (iteration, index) in range.enumerate() {
        if (iteration + 1) % REPORT_EVERY == 0 {
            if cancelled.load(Ordering::Acquire) {
                return attempted;
            }
            let _ = progress.send(REPORT_EVERY as u64);
        }
        let password = space.password_at(index);
        if tried.contains(&password) {
            continue;
        }
        match verify(&password) {
            Ok(false) => {}
            Ok(true) => {
                let _ = found.set(password);
                cancelled.store(true, Ordering::Release);
                return attempted;
            }
            Err(err) => {
                log::warn!("verifier error, stopping this worker: {err}");
                return attempted;
            }
        }
    }
    attempted
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn round_robin_deals_by_index_mod_workers() {
        let candidates = strings(&["a", "b", "c", "d", "e"]);
        let lists = round_robin(&candidates, 3);
        assert_eq!(lists[0], strings(&["a", "d"]));
        assert_eq!(lists[1], strings(&["b", "e"]));
        assert_eq!(lists[2], strings(&["c"]));
    }

    #[test]
    fn workers_examine_every_candidate_exactly_once() {
        let candidates: Vec<String> = (0..157).map(|i| format!("pw{i}")).collect();
        let lists = round_robin(&candidates, 4);
        let examined: Mutex<Vec<String>> = Mutex::new(Vec::new());
        let cancelled = AtomicBool::new(false);
        let found = OnceLock::new();
        let (tx, _rx) = mpsc::channel();

        let mut attempted = Vec::new();
        for list in &lists {
            attempted.push(run_worker(
                |pwd| {
                    examined.lock().unwrap().push(pwd.to_string());
                    Ok(false)
                },
                list,
                0..0,
                None,
                &HashSet::new(),
                &cancelled,
                &found,
                &tx,
            ));
        }

        assert_eq!(attempted.iter().sum::<usize>(), candidates.len());
        let mut examined = examined.into_inner().unwrap();
        examined.sort();
        let mut expected = candidates.clone();
        expected.sort();
        assert_eq!(examined, expected);
        assert!(!cancelled.load(Ordering::Acquire));
        assert!(found.get().is_none());
    }

    #[test]
    fn match_installs_result_before_raising_the_flag() {
        let list = strings(&["miss", "hit", "never-reached"]);
        let cancelled = AtomicBool::new(false);
        let found = OnceLock::new();
        let (tx, _rx) = mpsc::channel();

        let attempted = run_worker(
            |pwd| {
                // The shared-state contract seen by a concurrent reader: if
                // the flag is up, the result must already be present.
                if cancelled.load(Ordering::Acquire) {
                    panic!("verify ran after cancellation");
                }
                Ok(pwd == "hit")
            },
            &list,
            0..0,
            None,
            &HashSet::new(),
            &cancelled,
            &found,
            &tx,
        );

        assert_eq!(attempted, 2);
        assert_eq!(found.get().map(String::as_str), Some("hit"));
        assert!(cancelled.load(Ordering::Acquire));
    }

    #[test]
    fn second_match_does_not_overwrite_the_first() {
        let cancelled = AtomicBool::new(false);
        let found = OnceLock::new();
        let (tx, _rx) = mpsc::channel();

        run_worker(
            |_| Ok(true),
            &strings(&["first"]),
            0..0,
            None,
            &HashSet::new(),
            &cancelled,
            &found,
            &tx,
        );
        cancelled.store(false, Ordering::Release);
        run_worker(
            |_| Ok(true),
            &strings(&["second"]),
            0..0,
            None,
            &HashSet::new(),
            &cancelled,
            &found,
            &tx,
        );
        assert_eq!(found.get().map(String::as_str), Some("first"));
    }

    #[test]
    fn pre_cancelled_worker_stops_at_the_next_probe() {
        let candidates: Vec<String> = (0..500).map(|i| format!("pw{i}")).collect();
        let cancelled = AtomicBool::new(true);
        let found = OnceLock::new();
        let (tx, _rx) = mpsc::channel();

        let attempted = run_worker(
            |_| Ok(false),
            &candidates,
            0..0,
            None,
            &HashSet::new(),
            &cancelled,
            &found,
            &tx,
        );
        // The flag is probed every REPORT_EVERY attempts; the worker never
        // makes it past the first probe.
        assert_eq!(attempted, REPORT_EVERY - 1);
    }

    #[test]
    fn verifier_error_halts_the_worker_without_a_result() {
        let candidates = strings(&["a", "b", "c"]);
        let cancelled = AtomicBool::new(false);
        let found = OnceLock::new();
        let (tx, _rx) = mpsc::channel();

        let attempted = run_worker(
            |pwd| {
                if pwd == "b" {
                    Err(VerifyError::Crypto("cipher exploded".to_string()))
                } else {
                    Ok(false)
                }
            },
            &candidates,
            0..0,
            None,
            &HashSet::new(),
            &cancelled,
            &found,
            &tx,
        );
        assert_eq!(attempted, 1);
        assert!(found.get().is_none());
        // A crypto failure halts one worker; it does not cancel the others.
        assert!(!cancelled.load(Ordering::Acquire));
    }

    #[test]
    fn enumeration_tail_skips_already_tried_passwords() {
        let space = PasswordSpace::new(vec!['a', 'b'], 1, 2).unwrap();
        let tried: HashSet<String> = ["b".to_string()].into();
        let examined: Mutex<Vec<String>> = Mutex::new(Vec::new());
        let cancelled = AtomicBool::new(false);
        let found = OnceLock::new();
        let (tx, _rx) = mpsc::channel();

        run_worker(
            |pwd| {
                examined.lock().unwrap().push(pwd.to_string());
                Ok(false)
            },
            &[],
            space.index_range(),
            Some(&space),
            &tried,
            &cancelled,
            &found,
            &tx,
        );
        assert_eq!(
            examined.into_inner().unwrap(),
            strings(&["a", "aa", "ab", "ba", "bb"])
        );
    }

    #[test]
    fn enumeration_match_terminates_the_worker() {
        let space = PasswordSpace::new(vec!['a', 'b'], 1, 3).unwrap();
        let cancelled = AtomicBool::new(false);
        let found = OnceLock::new();
        let (tx, _rx) = mpsc::channel();

        run_worker(
            |pwd| Ok(pwd == "ba"),
            &[],
            space.index_range(),
            Some(&space),
            &HashSet::new(),
            &cancelled,
            &found,
            &tx,
        );
        assert_eq!(found.get().map(String::as_str), Some("ba"));
        assert!(cancelled.load(Ordering::Acquire));
    }
}
