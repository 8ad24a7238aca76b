//! The pull orchestrator.
//!
//! A pull resolves a node, fetches its export, validates the archive and
//! hands it to the replace engine:
//!
//! ```text
//! Idle ──pull(name)──▶ Running ──▶ Succeeded
//!                         │
//!                         └──────▶ Failed
//! ```
//!
//! Every failure before the replace commit leaves local state untouched.
//! Only one pull runs per instance at a time; a second one fails fast with
//! [`PullError::PullInProgress`].

use crate::config::PullConfig;
use crate::error::PullError;
use crate::http::{HttpClient, HttpResponse};
use drawmirror_core::{now_millis, read_manifest, Archive, ReplaceEngine};
use drawmirror_sync_protocol::{
    is_archive_content_type, ExportManifest, PullReport, PullState, PullStatus,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Cancels a pull that has not reached its commit point.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), PullError> {
        if self.is_cancelled() {
            Err(PullError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Summary of a successful pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullResult {
    /// Node the archive came from (or the import label).
    pub source_node: String,
    /// Drawings now held locally.
    pub record_count: usize,
    /// Drawings held before the pull.
    pub previous_count: usize,
    /// Registry entries learned from the archive.
    pub nodes_added: Vec<String>,
    /// Registry merge failure, if any. The dataset was still replaced.
    pub registry_error: Option<String>,
    /// Hex SHA-256 of the applied archive.
    pub checksum: String,
    /// Archive size in bytes.
    pub bytes: usize,
    /// Wall time of the pull.
    pub duration: Duration,
}

impl PullResult {
    /// Converts into the operator-facing report.
    pub fn to_report(&self) -> PullReport {
        PullReport {
            source_node: self.source_node.clone(),
            record_count: self.record_count,
            previous_count: self.previous_count,
            nodes_added: self.nodes_added.clone(),
            checksum: self.checksum.clone(),
        }
    }
}

/// Counters over the lifetime of an orchestrator.
#[derive(Debug, Clone, Default)]
pub struct PullStats {
    /// Pulls that got past the in-progress check.
    pub pulls_started: u64,
    /// Pulls that replaced the dataset.
    pub pulls_succeeded: u64,
    /// Pulls that ended in an error.
    pub pulls_failed: u64,
    /// Pulls refused because another was running.
    pub pulls_rejected: u64,
    /// Drawings applied across all successful pulls.
    pub records_applied: u64,
    /// Archive bytes received across all pulls.
    pub bytes_received: u64,
    /// Message of the most recent failure.
    pub last_error: Option<String>,
    /// Duration of the most recent successful pull.
    pub last_duration: Option<Duration>,
}

/// Clears the in-progress flag when dropped.
struct PullGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for PullGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Runs pulls against the local instance.
pub struct PullOrchestrator<C: HttpClient> {
    config: PullConfig,
    client: C,
    engine: ReplaceEngine,
    in_progress: Arc<AtomicBool>,
    status: RwLock<PullStatus>,
    stats: RwLock<PullStats>,
}

impl<C: HttpClient> PullOrchestrator<C> {
    /// Creates an orchestrator.
    pub fn new(config: PullConfig, client: C, engine: ReplaceEngine) -> Self {
        Self {
            config,
            client,
            engine,
            in_progress: Arc::new(AtomicBool::new(false)),
            status: RwLock::new(PullStatus::default()),
            stats: RwLock::new(PullStats::default()),
        }
    }

    /// The configuration.
    pub fn config(&self) -> &PullConfig {
        &self.config
    }

    /// The replace engine (and through it, store and registry).
    pub fn engine(&self) -> &ReplaceEngine {
        &self.engine
    }

    /// Current status.
    pub fn status(&self) -> PullStatus {
        self.status.read().clone()
    }

    /// Current counters.
    pub fn stats(&self) -> PullStats {
        self.stats.read().clone()
    }

    /// Returns true while a pull or import is running.
    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Pulls from the named node and replaces the local dataset.
    ///
    /// # Errors
    ///
    /// See [`PullError`]. Local state is unchanged unless the error is
    /// `ReplaceFailed` with `rolled_back` unset.
    pub fn pull(&self, name: &str) -> Result<PullResult, PullError> {
        self.pull_with_cancel(name, &CancelToken::new())
    }

    /// Like [`pull`](Self::pull), abandoning the pull if `token` is
    /// cancelled before the replace begins.
    ///
    /// # Errors
    ///
    /// As [`pull`](Self::pull), plus `Cancelled`.
    pub fn pull_with_cancel(
        &self,
        name: &str,
        token: &CancelToken,
    ) -> Result<PullResult, PullError> {
        let _guard = self.begin()?;
        self.tracked(name, || self.fetch_and_apply(name, token))
    }

    /// Applies an archive received out of band, e.g. an uploaded file.
    ///
    /// Shares the validation and replace path of a network pull.
    /// `source` labels the archive in status and logs.
    ///
    /// # Errors
    ///
    /// `PullInProgress`, archive errors, or `ReplaceFailed`.
    pub fn pull_from_bytes(&self, source: &str, bytes: &[u8]) -> Result<PullResult, PullError> {
        let _guard = self.begin()?;
        self.tracked(source, || {
            let started = Instant::now();
            self.apply(source, bytes, None, &CancelToken::new(), started)
        })
    }

    fn begin(&self) -> Result<PullGuard, PullError> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.stats.write().pulls_rejected += 1;
            tracing::warn!("pull refused: another pull is in progress");
            return Err(PullError::PullInProgress);
        }
        Ok(PullGuard {
            flag: Arc::clone(&self.in_progress),
        })
    }

    /// Wraps a pull body with status and stats bookkeeping.
    fn tracked(
        &self,
        source: &str,
        body: impl FnOnce() -> Result<PullResult, PullError>,
    ) -> Result<PullResult, PullError> {
        self.set_status(PullState::Running, format!("pulling from {source}"), source, None);
        self.stats.write().pulls_started += 1;

        let result = body();
        match &result {
            Ok(pulled) => {
                {
                    let mut stats = self.stats.write();
                    stats.pulls_succeeded += 1;
                    stats.records_applied += pulled.record_count as u64;
                    stats.bytes_received += pulled.bytes as u64;
                    stats.last_duration = Some(pulled.duration);
                }
                self.set_status(
                    PullState::Succeeded,
                    format!("pulled {} drawings from {source}", pulled.record_count),
                    source,
                    Some(pulled.record_count),
                );
                tracing::info!(
                    node = source,
                    records = pulled.record_count,
                    previous = pulled.previous_count,
                    checksum = %pulled.checksum,
                    elapsed_ms = pulled.duration.as_millis() as u64,
                    "pull complete"
                );
            }
            Err(e) => {
                {
                    let mut stats = self.stats.write();
                    stats.pulls_failed += 1;
                    stats.last_error = Some(e.to_string());
                }
                self.set_status(PullState::Failed, e.to_string(), source, None);
                if e.is_safe_to_retry() {
                    tracing::warn!(node = source, error = %e, kind = e.kind(), "pull failed, local state unchanged");
                } else {
                    tracing::error!(node = source, error = %e, "pull failed and local state must be verified");
                }
            }
        }
        result
    }

    fn fetch_and_apply(&self, name: &str, token: &CancelToken) -> Result<PullResult, PullError> {
        let started = Instant::now();
        let node = self.engine.registry().get(name)?;
        token.check()?;

        let url = node.url_for(&self.config.export_path);
        tracing::info!(node = %node.name, url = %url, "fetching export");
        let response = self.client.get(&url, self.config.timeout)?;
        token.check()?;

        check_response(&self.config, &response)?;

        let header_manifest = if self.config.verify_manifest_headers {
            ExportManifest::from_headers(|name| response.header(name))
                .map_err(|e| PullError::corrupt(format!("manifest headers: {e}")))?
        } else {
            None
        };

        self.apply(&node.name, &response.body, header_manifest, token, started)
    }

    fn apply(
        &self,
        source: &str,
        bytes: &[u8],
        header_manifest: Option<ExportManifest>,
        token: &CancelToken,
        started: Instant,
    ) -> Result<PullResult, PullError> {
        let manifest = read_manifest(bytes)?;
        if let Some(expected) = header_manifest {
            expected
                .check(&manifest)
                .map_err(|e| PullError::corrupt(e.to_string()))?;
        }
        let archive = Archive::decode(bytes)?;
        tracing::debug!(
            source,
            records = archive.record_count(),
            nodes = archive.nodes.len(),
            "archive validated"
        );

        // Last point at which a cancel has no effect on local state.
        token.check()?;
        let outcome = self.engine.replace(archive)?;

        Ok(PullResult {
            source_node: source.to_string(),
            record_count: outcome.record_count,
            previous_count: outcome.previous_count,
            nodes_added: outcome.nodes_added,
            registry_error: outcome.registry_error,
            checksum: manifest.checksum_hex(),
            bytes: bytes.len(),
            duration: started.elapsed(),
        })
    }

    fn set_status(&self, state: PullState, message: String, node: &str, record_count: Option<usize>) {
        *self.status.write() = PullStatus {
            state,
            message,
            node: Some(node.to_string()),
            record_count,
            updated_at: now_millis(),
        };
    }
}

impl<C: HttpClient + 'static> PullOrchestrator<C> {
    /// Starts a pull on a background thread and returns at once.
    ///
    /// The in-progress check and node lookup happen before returning, so
    /// those failures are reported directly. Everything else is reported
    /// through [`status`](Self::status).
    ///
    /// # Errors
    ///
    /// `PullInProgress`, `UnknownNode`, or `Local` if no thread could be
    /// spawned.
    pub fn start_pull(self: &Arc<Self>, name: &str) -> Result<CancelToken, PullError> {
        let guard = self.begin()?;
        let node = self.engine.registry().get(name)?;

        let token = CancelToken::new();
        let this = Arc::clone(self);
        let thread_token = token.clone();
        self.set_status(
            PullState::Running,
            format!("pulling from {}", node.name),
            &node.name,
            None,
        );

        let source = node.name.clone();
        let spawned = thread::Builder::new()
            .name(format!("pull-{source}"))
            .spawn(move || {
                let _guard = guard;
                let name = node.name;
                let _ = this.tracked(&name, || this.fetch_and_apply(&name, &thread_token));
            });
        match spawned {
            Ok(_) => Ok(token),
            Err(e) => Err(self.abandon_start(&source, e)),
        }
    }
}

impl<C: HttpClient> PullOrchestrator<C> {
    /// Records a background pull that never started.
    ///
    /// The in-progress guard went down with the unspawned closure; this
    /// clears the `Running` status set for it.
    fn abandon_start(&self, source: &str, err: std::io::Error) -> PullError {
        let err = PullError::Local(err.into());
        {
            let mut stats = self.stats.write();
            stats.pulls_failed += 1;
            stats.last_error = Some(err.to_string());
        }
        self.set_status(PullState::Failed, err.to_string(), source, None);
        tracing::warn!(node = source, error = %err, "could not start background pull");
        err
    }
}

impl<C: HttpClient> std::fmt::Debug for PullOrchestrator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PullOrchestrator")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .field("status", &self.status.read().state)
            .finish_non_exhaustive()
    }
}

fn check_response(config: &PullConfig, response: &HttpResponse) -> Result<(), PullError> {
    if !response.is_success() {
        return Err(PullError::Remote {
            status: response.status,
            message: response.body_excerpt(200),
        });
    }
    if config.require_archive_content_type {
        let content_type = response.content_type().unwrap_or("");
        if !is_archive_content_type(content_type) {
            return Err(PullError::Remote {
                status: response.status,
                message: format!("unexpected content type {content_type:?}"),
            });
        }
    }
    Ok(())
}
