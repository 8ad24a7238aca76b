//! Integration tests for the pull orchestrator.

use drawmirror_core::{read_manifest, Archive, Dataset, DrawingId};
use drawmirror_sync_engine::{
    HttpResponse, LoopbackClient, LoopbackServer, PullConfig, PullError, PullOrchestrator,
    ReqwestClient,
};
use drawmirror_sync_protocol::{ExportManifest, PullState, ARCHIVE_CONTENT_TYPE, EXPORT_PATH};
use drawmirror_testkit::{archive_strategy, sample_archive, sample_node, TestInstance};
use proptest::prelude::*;
use parking_lot::Mutex;
use std::net::TcpListener;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Builds the response a healthy peer sends for `bytes`.
fn export_response(bytes: Vec<u8>) -> HttpResponse {
    let mut response =
        HttpResponse::new(200, bytes.clone()).with_header("Content-Type", ARCHIVE_CONTENT_TYPE);
    if let Ok(manifest) = read_manifest(&bytes) {
        for (name, value) in ExportManifest::from(&manifest).to_headers() {
            response = response.with_header(name, value);
        }
    }
    response
}

/// A peer that answers every export request with a fixed response.
struct Peer {
    response: HttpResponse,
}

impl Peer {
    fn serving(bytes: Vec<u8>) -> Self {
        Self {
            response: export_response(bytes),
        }
    }
}

impl LoopbackServer for Peer {
    fn handle_get(&self, path: &str) -> HttpResponse {
        if path == EXPORT_PATH {
            self.response.clone()
        } else {
            HttpResponse::new(404, b"not found".to_vec())
        }
    }
}

/// A peer that holds each request until the test releases it.
struct GatedPeer {
    bytes: Vec<u8>,
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl LoopbackServer for GatedPeer {
    fn handle_get(&self, _path: &str) -> HttpResponse {
        let _ = self.entered.lock().send(());
        let _ = self.release.lock().recv();
        export_response(self.bytes.clone())
    }
}

fn orchestrator<S: LoopbackServer>(
    local: &TestInstance,
    peer: S,
) -> PullOrchestrator<LoopbackClient<S>> {
    local.registry().add("peer", "http://peer:3002").unwrap();
    PullOrchestrator::new(
        PullConfig::new(),
        LoopbackClient::new(peer),
        local.replace_engine(),
    )
}

fn drawings_only(dataset: &Dataset) -> Vec<u8> {
    Archive::from_dataset(dataset, &[]).encode().unwrap()
}

fn wait_until_idle<C: drawmirror_sync_engine::HttpClient>(orchestrator: &PullOrchestrator<C>) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while orchestrator.is_running() {
        assert!(Instant::now() < deadline, "pull did not finish");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn pull_replaces_three_with_five() {
    let local = TestInstance::populated(3);
    let local_ids = local.store().snapshot().ids();
    let remote = TestInstance::memory();
    let remote_ids = remote.fill(5, "remote");

    let orchestrator = orchestrator(&local, Peer::serving(remote.export_bytes()));
    let result = orchestrator.pull("peer").unwrap();

    assert_eq!(result.record_count, 5);
    assert_eq!(result.previous_count, 3);
    assert_eq!(result.source_node, "peer");

    let snapshot = local.store().snapshot();
    assert_eq!(snapshot.len(), 5);
    for id in &remote_ids {
        assert_eq!(
            snapshot.get(id).unwrap(),
            remote.store().snapshot().get(id).unwrap()
        );
    }
    assert!(local_ids.iter().all(|id| !snapshot.contains(id)));

    let status = orchestrator.status();
    assert_eq!(status.state, PullState::Succeeded);
    assert_eq!(status.record_count, Some(5));
}

#[test]
fn pulling_twice_is_idempotent() {
    let local = TestInstance::populated(2);
    let remote = TestInstance::memory();
    remote.fill(4, "remote");
    let expected = drawings_only(&remote.store().snapshot());

    let orchestrator = orchestrator(&local, Peer::serving(remote.export_bytes()));
    orchestrator.pull("peer").unwrap();
    let first = drawings_only(&local.store().snapshot());
    orchestrator.pull("peer").unwrap();
    let second = drawings_only(&local.store().snapshot());

    assert_eq!(first, expected);
    assert_eq!(second, expected);
    assert_eq!(orchestrator.stats().pulls_succeeded, 2);
}

#[test]
fn pull_from_empty_peer_empties_local() {
    let local = TestInstance::populated(3);
    let empty = TestInstance::memory();

    let orchestrator = orchestrator(&local, Peer::serving(empty.export_bytes()));
    let result = orchestrator.pull("peer").unwrap();

    assert_eq!(result.record_count, 0);
    assert!(local.store().is_empty());
}

#[test]
fn pull_merges_nodes_and_keeps_local_entries() {
    let local = TestInstance::populated(1);
    let archive = sample_archive(
        2,
        vec![
            sample_node("peer", "http://elsewhere:9999"),
            sample_node("third", "http://third:3002"),
        ],
    );

    let orchestrator = orchestrator(&local, Peer::serving(archive.encode().unwrap()));
    let result = orchestrator.pull("peer").unwrap();

    assert_eq!(result.nodes_added, vec!["third"]);
    assert!(result.registry_error.is_none());
    assert_eq!(
        local.registry().get("peer").unwrap().endpoint,
        "http://peer:3002"
    );
    assert!(local.registry().get("third").is_ok());
}

#[test]
fn unknown_node_is_rejected() {
    let local = TestInstance::populated(1);
    let orchestrator = orchestrator(&local, Peer::serving(Vec::new()));

    let err = orchestrator.pull("nobody").unwrap_err();
    assert!(matches!(err, PullError::UnknownNode { ref name } if name == "nobody"));
    assert_eq!(local.store().len(), 1);
}

#[test]
fn remote_failure_leaves_dataset_untouched() {
    let local = TestInstance::populated(3);
    let before = local.store().snapshot();
    let peer = Peer {
        response: HttpResponse::new(500, b"database is on fire".to_vec()),
    };

    let orchestrator = orchestrator(&local, peer);
    let err = orchestrator.pull("peer").unwrap_err();

    match err {
        PullError::Remote { status, message } => {
            assert_eq!(status, 500);
            assert!(message.contains("on fire"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(local.store().snapshot().same_content(&before));
    assert_eq!(orchestrator.status().state, PullState::Failed);
    assert_eq!(orchestrator.stats().pulls_failed, 1);
}

#[test]
fn wrong_content_type_is_rejected() {
    let local = TestInstance::populated(3);
    let before = local.store().snapshot();
    let remote = TestInstance::populated(5);
    let peer = Peer {
        response: HttpResponse::new(200, remote.export_bytes())
            .with_header("Content-Type", "text/html"),
    };

    let orchestrator = orchestrator(&local, peer);
    let err = orchestrator.pull("peer").unwrap_err();

    assert!(matches!(err, PullError::Remote { status: 200, .. }));
    assert!(local.store().snapshot().same_content(&before));
}

#[test]
fn truncated_archive_is_rejected() {
    let local = TestInstance::populated(3);
    let before = local.store().snapshot();
    let mut bytes = TestInstance::populated(5).export_bytes();
    bytes.truncate(bytes.len() / 2);

    let orchestrator = orchestrator(&local, Peer::serving(bytes));
    let err = orchestrator.pull("peer").unwrap_err();

    assert!(matches!(err, PullError::CorruptArchive { .. }));
    assert!(local.store().snapshot().same_content(&before));
}

#[test]
fn flipped_byte_is_rejected() {
    let local = TestInstance::populated(3);
    let before = local.store().snapshot();
    let mut bytes = TestInstance::populated(5).export_bytes();
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0x40;
    // Served without manifest headers so the body itself must catch it.
    let peer = Peer {
        response: HttpResponse::new(200, bytes).with_header("Content-Type", ARCHIVE_CONTENT_TYPE),
    };

    let orchestrator = orchestrator(&local, peer);
    let err = orchestrator.pull("peer").unwrap_err();

    assert!(matches!(err, PullError::CorruptArchive { .. }));
    assert!(local.store().snapshot().same_content(&before));
}

#[test]
fn newer_archive_version_is_rejected() {
    let local = TestInstance::populated(3);
    let before = local.store().snapshot();
    let mut bytes = TestInstance::populated(5).export_bytes();
    bytes[4..6].copy_from_slice(&2u16.to_le_bytes());

    let orchestrator = orchestrator(&local, Peer::serving(bytes));
    let err = orchestrator.pull("peer").unwrap_err();

    assert!(matches!(
        err,
        PullError::UnsupportedVersion {
            found: 2,
            supported: 1
        }
    ));
    assert!(local.store().snapshot().same_content(&before));
}

#[test]
fn header_mismatch_is_rejected() {
    let local = TestInstance::populated(3);
    let before = local.store().snapshot();
    let body = TestInstance::populated(5).export_bytes();
    let other = TestInstance::populated(4).export_bytes();

    let mut response =
        HttpResponse::new(200, body).with_header("Content-Type", ARCHIVE_CONTENT_TYPE);
    let manifest = read_manifest(&other).unwrap();
    for (name, value) in ExportManifest::from(&manifest).to_headers() {
        response = response.with_header(name, value);
    }

    let orchestrator = orchestrator(&local, Peer { response });
    let err = orchestrator.pull("peer").unwrap_err();

    assert!(matches!(err, PullError::CorruptArchive { .. }));
    assert!(local.store().snapshot().same_content(&before));
}

#[test]
fn slow_peer_times_out_without_changes() {
    let local = TestInstance::populated(3);
    let before = local.store().snapshot();

    // Accepts connections (via the backlog) but never answers.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    local
        .registry()
        .add("silent", &format!("http://{addr}"))
        .unwrap();

    let orchestrator = PullOrchestrator::new(
        PullConfig::new().with_timeout(Duration::from_millis(300)),
        ReqwestClient::new().unwrap(),
        local.replace_engine(),
    );
    let err = orchestrator.pull("silent").unwrap_err();

    assert!(matches!(err, PullError::Network { .. }), "{err:?}");
    assert!(err.is_safe_to_retry());
    assert!(local.store().snapshot().same_content(&before));
    drop(listener);
}

#[test]
fn second_pull_fails_fast_while_one_runs() {
    let local = TestInstance::populated(3);
    let remote = TestInstance::populated(5);
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let peer = GatedPeer {
        bytes: remote.export_bytes(),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    };

    let orchestrator = Arc::new(orchestrator(&local, peer));
    orchestrator.start_pull("peer").unwrap();
    entered_rx.recv_timeout(Duration::from_secs(10)).unwrap();

    assert!(orchestrator.is_running());
    assert_eq!(orchestrator.status().state, PullState::Running);
    let err = orchestrator.pull("peer").unwrap_err();
    assert!(matches!(err, PullError::PullInProgress));
    assert_eq!(orchestrator.stats().pulls_rejected, 1);

    release_tx.send(()).unwrap();
    wait_until_idle(&*orchestrator);

    assert_eq!(orchestrator.status().state, PullState::Succeeded);
    assert_eq!(local.store().len(), 5);
}

#[test]
fn cancel_before_commit_leaves_dataset() {
    let local = TestInstance::populated(3);
    let before = local.store().snapshot();
    let remote = TestInstance::populated(5);
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let peer = GatedPeer {
        bytes: remote.export_bytes(),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    };

    let orchestrator = Arc::new(orchestrator(&local, peer));
    let token = orchestrator.start_pull("peer").unwrap();
    entered_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    token.cancel();
    release_tx.send(()).unwrap();
    wait_until_idle(&*orchestrator);

    let status = orchestrator.status();
    assert_eq!(status.state, PullState::Failed);
    assert!(status.message.contains("cancelled"));
    assert!(local.store().snapshot().same_content(&before));
}

#[test]
fn start_pull_reports_unknown_node_directly() {
    let local = TestInstance::populated(1);
    let orchestrator = Arc::new(orchestrator(&local, Peer::serving(Vec::new())));

    let err = orchestrator.start_pull("ghost").unwrap_err();
    assert!(matches!(err, PullError::UnknownNode { .. }));
    assert!(!orchestrator.is_running());
}

#[test]
fn failed_commit_rolls_back() {
    let (engine, plan) = drawmirror_testkit::faulty_engine();
    engine.store().create("keep").unwrap();
    let before = engine.store().snapshot();
    engine
        .registry()
        .add("peer", "http://peer:3002")
        .unwrap();

    let remote = TestInstance::populated(5);
    let orchestrator = PullOrchestrator::new(
        PullConfig::new(),
        LoopbackClient::new(Peer::serving(remote.export_bytes())),
        engine,
    );
    plan.lock().fail_commit = true;
    let err = orchestrator.pull("peer").unwrap_err();

    assert!(matches!(
        err,
        PullError::ReplaceFailed {
            rolled_back: true,
            ..
        }
    ));
    assert!(err.is_safe_to_retry());
    assert!(orchestrator
        .engine()
        .store()
        .snapshot()
        .same_content(&before));
}

#[test]
fn import_from_bytes_shares_the_pull_path() {
    let local = TestInstance::populated(3);
    let remote = TestInstance::memory();
    let ids: Vec<DrawingId> = remote.fill(2, "imported");

    let orchestrator = orchestrator(&local, Peer::serving(Vec::new()));
    let result = orchestrator
        .pull_from_bytes("backup.archive", &remote.export_bytes())
        .unwrap();

    assert_eq!(result.source_node, "backup.archive");
    assert_eq!(result.record_count, 2);
    assert_eq!(local.store().snapshot().ids().len(), 2);
    assert!(ids.iter().all(|id| local.store().snapshot().contains(id)));

    let err = orchestrator
        .pull_from_bytes("garbage", b"not an archive")
        .unwrap_err();
    assert!(matches!(err, PullError::CorruptArchive { .. }));
    assert_eq!(local.store().len(), 2);
}

#[test]
fn pull_survives_restart() {
    let local = TestInstance::file();
    local.fill(3, "local");
    let remote = TestInstance::populated(5);
    let expected = drawings_only(&remote.store().snapshot());

    {
        let orchestrator = orchestrator(&local, Peer::serving(remote.export_bytes()));
        orchestrator.pull("peer").unwrap();
    }

    let local = local.reopen();
    assert_eq!(drawings_only(&local.store().snapshot()), expected);
    assert!(local.registry().get("peer").is_ok());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn archive_bytes_ignore_input_order(archive in archive_strategy(12, 4), turn in 0usize..16) {
        let mut shuffled = archive.clone();
        shuffled.drawings.reverse();
        shuffled.nodes.reverse();
        if !shuffled.drawings.is_empty() {
            let by = turn % shuffled.drawings.len();
            shuffled.drawings.rotate_left(by);
        }
        prop_assert_eq!(archive.encode().unwrap(), shuffled.encode().unwrap());
    }

    #[test]
    fn pulled_dataset_is_exactly_the_peer_archive(archive in archive_strategy(12, 4)) {
        let bytes = archive.encode().unwrap();
        let local = TestInstance::populated(2);
        let orchestrator = orchestrator(&local, Peer::serving(bytes.clone()));

        let first = orchestrator.pull("peer").unwrap();
        prop_assert_eq!(first.record_count, archive.record_count());
        let after_first = drawings_only(&local.store().snapshot());

        orchestrator.pull("peer").unwrap();
        let after_second = drawings_only(&local.store().snapshot());

        let expected = Archive { drawings: archive.drawings.clone(), nodes: vec![] };
        prop_assert_eq!(&after_first, &expected.encode().unwrap());
        prop_assert_eq!(after_first, after_second);
        prop_assert!(local.registry().get("peer").is_ok());
    }
}
