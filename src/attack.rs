//! Cancellable multi-target dictionary attack.
//!
//! An [`AttackController`] runs at most one job at a time. Each job lives on
//! its own worker thread: it streams the wordlist, hashes every candidate and
//! credits every remaining target whose NTLM hash matches. Progress, matches
//! and the final summary are sent over a channel held by the [`JobHandle`].

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use crate::config::AttackConfig;
use crate::error::{CrackError, Result};
use crate::ntlm_logic;
use crate::records::{RecordId, SharedStore, Target};
use crate::wordlist::{self, Wordlist};

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    /// Every target was cracked or the wordlist ran out.
    Completed,
    /// The job was cancelled; matches found so far are kept.
    Cancelled,
    /// Reading the wordlist failed mid-stream; matches found so far are kept.
    Aborted,
}

#[derive(Debug, Clone)]
pub struct AttackSummary {
    pub cracked: usize,
    pub tested: u64,
    /// Candidates whose line held invalid UTF-8 and was decoded lossily.
    pub lossy_lines: u64,
    pub state: TerminalState,
    /// The read failure behind an [`TerminalState::Aborted`] job.
    pub error: Option<Arc<io::Error>>,
}

/// Notifications sent from the worker thread.
#[derive(Debug, Clone)]
pub enum AttackEvent {
    Progress {
        tested: u64,
        total: Option<u64>,
        percent: Option<f64>,
    },
    Match {
        id: RecordId,
        user: String,
        plaintext: String,
    },
    /// Always the last event of a job.
    Complete(AttackSummary),
}

/// Cooperative cancellation flag, checked once per candidate.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Calling it more than once has no further effect.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Exclusive hold on a controller and its record store for one job.
///
/// Released on drop, including when the worker unwinds.
struct JobLease {
    running: Arc<AtomicBool>,
    store: SharedStore,
}

impl JobLease {
    fn acquire(
        running: &Arc<AtomicBool>,
        store: &SharedStore,
        targets: &[Target],
    ) -> Result<Self> {
        if running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CrackError::JobConflict);
        }

        let mut guard = store.lock();
        if guard.is_busy() {
            drop(guard);
            running.store(false, Ordering::Release);
            return Err(CrackError::JobConflict);
        }
        if !guard.is_current(targets) {
            drop(guard);
            running.store(false, Ordering::Release);
            return Err(CrackError::StaleTargets);
        }
        guard.set_busy(true);
        drop(guard);

        Ok(Self {
            running: Arc::clone(running),
            store: Arc::clone(store),
        })
    }
}

impl Drop for JobLease {
    fn drop(&mut self) {
        self.store.lock().set_busy(false);
        self.running.store(false, Ordering::Release);
    }
}

/// Handle to a running attack job.
pub struct JobHandle {
    cancel: CancelToken,
    receiver: Receiver<AttackEvent>,
    thread_handle: JoinHandle<AttackSummary>,
}

impl JobHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A clone of the job's cancellation flag, usable from other threads.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Blocks until an event is received.
    /// Returns `None` once the job has finished and every event was drained.
    pub fn recv(&self) -> Option<AttackEvent> {
        self.receiver.recv().ok()
    }

    pub fn try_recv(&self) -> Option<AttackEvent> {
        self.receiver.try_recv().ok()
    }

    /// Blocking iterator over the remaining events, ending after
    /// [`AttackEvent::Complete`].
    pub fn events(&self) -> crossbeam_channel::Iter<'_, AttackEvent> {
        self.receiver.iter()
    }

    pub fn is_finished(&self) -> bool {
        self.thread_handle.is_finished()
    }

    /// Waits for the job to end and returns its summary.
    ///
    /// Undrained events are discarded, so a worker blocked on a bounded
    /// channel can still finish.
    pub fn join(self) -> Result<AttackSummary> {
        let Self {
            receiver,
            thread_handle,
            ..
        } = self;
        drop(receiver);
        thread_handle.join().map_err(|_| CrackError::WorkerPanicked)
    }
}

pub struct AttackController {
    config: AttackConfig,
    running: Arc<AtomicBool>,
}

impl AttackController {
    pub fn new(config: AttackConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &AttackConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Starts attacking `targets` with the wordlist at `path`.
    ///
    /// # Errors
    /// * [`CrackError::JobConflict`] if a job is already running on this
    ///   controller or on `store`.
    /// * [`CrackError::StaleTargets`] if `store` was reloaded after `targets`
    ///   were taken.
    /// * [`CrackError::Configuration`] if the wordlist cannot be opened. The
    ///   controller stays idle.
    ///
    /// The pre-scan, when enabled, runs on the worker thread.
    pub fn start(
        &self,
        store: &SharedStore,
        targets: Vec<Target>,
        path: impl AsRef<Path>,
    ) -> Result<JobHandle> {
        let path = path.as_ref();
        let lease = JobLease::acquire(&self.running, store, &targets)?;
        let wordlist = Wordlist::open(path)?;
        info!("wordlist {} opened", path.display());
        let total = if self.config.prescan {
            Total::Prescan(path_prescan(path.to_path_buf()))
        } else {
            Total::Known(None)
        };
        self.spawn(lease, targets, wordlist, total)
    }

    /// Starts attacking `targets` with an already opened wordlist.
    ///
    /// `total_estimate` only feeds the progress percentage.
    pub fn start_with(
        &self,
        store: &SharedStore,
        targets: Vec<Target>,
        wordlist: Wordlist,
        total_estimate: Option<u64>,
    ) -> Result<JobHandle> {
        let lease = JobLease::acquire(&self.running, store, &targets)?;
        self.spawn(lease, targets, wordlist, Total::Known(total_estimate))
    }

    fn spawn(
        &self,
        lease: JobLease,
        targets: Vec<Target>,
        wordlist: Wordlist,
        total: Total,
    ) -> Result<JobHandle> {
        let (sender, receiver) = match self.config.event_capacity {
            Some(capacity) => crossbeam_channel::bounded(capacity),
            None => crossbeam_channel::unbounded(),
        };
        let cancel = CancelToken::new();

        let (total, prescan) = match total {
            Total::Known(total) => (total, None),
            Total::Prescan(prescan) => (None, Some(prescan)),
        };
        let job = AttackJob {
            targets,
            wordlist,
            tested: 0,
            total,
            prescan,
            cracked: 0,
            lossy_lines: 0,
            progress_interval: self.config.progress_interval,
            cancel: cancel.clone(),
            store: Arc::clone(&lease.store),
            sender,
        };

        let thread_handle = thread::Builder::new()
            .name("ntcrack-attack".to_string())
            .spawn(move || job.run(lease))?;

        Ok(JobHandle {
            cancel,
            receiver,
            thread_handle,
        })
    }
}

/// Counts the candidates of a wordlist for the progress percentage.
type Prescan = Box<dyn FnOnce() -> Option<u64> + Send>;

fn path_prescan(path: PathBuf) -> Prescan {
    Box::new(move || wordlist::count_candidates(path))
}

enum Total {
    Known(Option<u64>),
    /// Counted by the worker before the scan starts.
    Prescan(Prescan),
}

/// State of one job, owned by its worker thread until the terminal
/// transition.
struct AttackJob {
    targets: Vec<Target>,
    wordlist: Wordlist,
    tested: u64,
    total: Option<u64>,
    prescan: Option<Prescan>,
    cracked: usize,
    lossy_lines: u64,
    progress_interval: u64,
    cancel: CancelToken,
    store: SharedStore,
    sender: Sender<AttackEvent>,
}

impl AttackJob {
    fn run(mut self, lease: JobLease) -> AttackSummary {
        if let Some(prescan) = self.prescan.take() {
            self.total = prescan();
        }
        info!(
            "starting attack on {} target(s), {} candidate(s) expected",
            self.targets.len(),
            self.total.map_or_else(|| "unknown".to_string(), |t| t.to_string())
        );

        let (state, error) = self.scan();

        let summary = AttackSummary {
            cracked: self.cracked,
            tested: self.tested,
            lossy_lines: self.lossy_lines,
            state,
            error,
        };
        match summary.state {
            TerminalState::Aborted => warn!(
                "attack aborted after {} candidate(s): {}",
                summary.tested,
                summary
                    .error
                    .as_ref()
                    .map_or_else(String::new, |e| e.to_string())
            ),
            _ => info!(
                "attack {:?}: {} cracked, {} tested",
                summary.state, summary.cracked, summary.tested
            ),
        }

        // The controller and store are free again before the consumer hears
        // about completion.
        drop(lease);
        let _ = self.sender.send(AttackEvent::Complete(summary.clone()));
        summary
    }

    fn scan(&mut self) -> (TerminalState, Option<Arc<io::Error>>) {
        loop {
            if self.cancel.is_cancelled() {
                return (TerminalState::Cancelled, None);
            }
            if self.targets.is_empty() {
                return (TerminalState::Completed, None);
            }

            let candidate = match self.wordlist.next_candidate() {
                Ok(Some(candidate)) => candidate,
                Ok(None) => return (TerminalState::Completed, None),
                Err(e) => return (TerminalState::Aborted, Some(Arc::new(e))),
            };
            self.tested += 1;
            if candidate.lossy {
                self.lossy_lines += 1;
            }

            let digest = ntlm_logic::ntlm_bytes(&candidate.text);
            if self.targets.iter().any(|t| t.digest == digest) {
                let (hits, remaining): (Vec<_>, Vec<_>) = self
                    .targets
                    .drain(..)
                    .partition(|t| t.digest == digest);
                self.targets = remaining;
                for target in hits {
                    self.credit(target, &candidate.text);
                }
            }

            if self.tested % self.progress_interval == 0 {
                let percent = self
                    .total
                    .filter(|total| *total > 0)
                    .map(|total| (self.tested as f64 * 100.0 / total as f64).min(100.0));
                let _ = self.sender.send(AttackEvent::Progress {
                    tested: self.tested,
                    total: self.total,
                    percent,
                });
            }
        }
    }

    fn credit(&mut self, target: Target, plaintext: &str) {
        if let Err(e) = self.store.lock().mark_cracked(target.id, plaintext) {
            warn!("could not record match for '{}': {}", target.user, e);
            return;
        }
        self.cracked += 1;
        debug!("cracked '{}' after {} candidate(s)", target.user, self.tested);
        let _ = self.sender.send(AttackEvent::Match {
            id: target.id,
            user: target.user,
            plaintext: plaintext.to_string(),
        });
    }
}
