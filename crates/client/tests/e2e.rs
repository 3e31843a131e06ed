//! End-to-end client/server tests
//!
//! Each test stands up the real axum router on an ephemeral port over a
//! scratch data directory, drives datasets through the admin engine, and
//! exercises the client over HTTP.

use std::path::Path;

use blindfeed_client::{Client, ClientError, QueryResult, ServerEndpoint};
use blindfeed_oprf as crypto;
use blindfeed_protocol::{EventKind, SyncMode};
use blindfeed_server::{routes, AppState, DatasetStore, ServerConfig, Storage, ALGORITHM_CLASSIC};

async fn spawn_server(data_dir: &Path) -> String {
    let config = ServerConfig {
        bind_addr: "127.0.0.1".to_string(),
        port: 0,
        data_dir: data_dir.to_path_buf(),
    };
    let state = AppState::new(config);
    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("127.0.0.1:{}", addr.port())
}

fn admin(data_dir: &Path) -> DatasetStore {
    DatasetStore::new(Storage::new(data_dir))
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, Vec<u8>)> {
    items
        .iter()
        .map(|(ioc, meta)| (ioc.to_string(), meta.as_bytes().to_vec()))
        .collect()
}

#[tokio::test]
async fn query_match_and_no_match() {
    let data_dir = tempfile::tempdir().unwrap();
    let state_dir = tempfile::tempdir().unwrap();

    let store = admin(data_dir.path());
    store.create_dataset("ds1", ALGORITHM_CLASSIC, "30d").unwrap();
    store
        .sync_from_source("ds1", pairs(&[("evil.com", r#"{"desc":"known bad domain"}"#)]))
        .unwrap();

    let server = spawn_server(data_dir.path()).await;
    let client = Client::new(&server, state_dir.path());

    let result = client.query("ds1", "evil.com").await.unwrap();
    assert_eq!(
        result,
        QueryResult::Match(br#"{"desc":"known bad domain"}"#.to_vec())
    );

    let result = client.query("ds1", "benign.com").await.unwrap();
    assert_eq!(result, QueryResult::NoMatch);

    // The match was recorded locally.
    let matches = std::fs::read_to_string(
        client.mirror("ds1").dir().join("matches.txt"),
    )
    .unwrap();
    assert!(matches.starts_with("evil.com,"));
}

#[tokio::test]
async fn delta_sync_tracks_source_changes() {
    let data_dir = tempfile::tempdir().unwrap();
    let state_dir = tempfile::tempdir().unwrap();

    let store = admin(data_dir.path());
    store.create_dataset("ds1", ALGORITHM_CLASSIC, "30d").unwrap();
    store
        .sync_from_source("ds1", pairs(&[("evil.com", r#"{"desc":"known bad domain"}"#)]))
        .unwrap();

    let server = spawn_server(data_dir.path()).await;
    let client = Client::new(&server, state_dir.path());

    let report = client.sync("ds1").await.unwrap();
    assert_eq!(report.mode, SyncMode::Full);
    assert_eq!(report.applied, 1);

    // Source update: one addition, one removal.
    store
        .sync_from_source("ds1", pairs(&[("1.2.3.4", r#"{"as":"AS64500","type":"ip"}"#)]))
        .unwrap();

    let report = client.sync("ds1").await.unwrap();
    assert_eq!(report.mode, SyncMode::Delta);
    assert_eq!(report.applied, 2);

    let records = client.mirror("ds1").load_records().unwrap().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[1].kind, EventKind::Added);
    assert_eq!(records[2].kind, EventKind::Removed);

    assert_eq!(
        client.query("ds1", "evil.com").await.unwrap(),
        QueryResult::NoMatch
    );
    assert_eq!(
        client.query("ds1", "1.2.3.4").await.unwrap(),
        QueryResult::Match(br#"{"as":"AS64500","type":"ip"}"#.to_vec())
    );
}

#[tokio::test]
async fn rekey_forces_full_resync_and_invalidates_old_ciphertexts() {
    let data_dir = tempfile::tempdir().unwrap();
    let state_dir = tempfile::tempdir().unwrap();

    let store = admin(data_dir.path());
    store.create_dataset("ds1", ALGORITHM_CLASSIC, "30d").unwrap();
    let source = pairs(&[("evil.com", r#"{"desc":"known bad domain"}"#)]);
    store.sync_from_source("ds1", source.clone()).unwrap();

    let server = spawn_server(data_dir.path()).await;
    let client = Client::new(&server, state_dir.path());
    client.sync("ds1").await.unwrap();

    // Keep the pre-rekey ciphertext around, simulating a client that
    // refuses to resync.
    let old_records = client.mirror("ds1").load_records().unwrap().unwrap();
    let stale_meta = old_records[0].enc_meta.clone().unwrap();

    store.rekey("ds1", source).unwrap();

    // The stale tip is unknown to the server now: full replay.
    let report = client.sync("ds1").await.unwrap();
    assert_eq!(report.mode, SyncMode::Full);
    assert_eq!(report.applied, 1);

    // Post-resync queries succeed.
    assert_eq!(
        client.query("ds1", "evil.com").await.unwrap(),
        QueryResult::Match(br#"{"desc":"known bad domain"}"#.to_vec())
    );

    // The pre-rekey ciphertext fails to decrypt even with the IOC known and
    // a fresh OPRF execution under the new key.
    let endpoint = ServerEndpoint::new(&server);
    let blinding = crypto::blind(b"evil.com");
    let evaluated = endpoint.evaluate("ds1", blinding.blinded()).await.unwrap();
    let q = crypto::unblind(&blinding, &evaluated).unwrap();
    let prf = crypto::finalize(b"evil.com", &q);
    let key = crypto::derive_key(&prf, &q, "ds1");
    assert!(matches!(
        crypto::open(&key, b"evil.com", &stale_meta.nonce, &stale_meta.ciphertext),
        Err(crypto::CryptoError::AuthFailed)
    ));
}

#[tokio::test]
async fn malformed_blinded_elements_are_http_400() {
    let data_dir = tempfile::tempdir().unwrap();
    let store = admin(data_dir.path());
    store.create_dataset("ds1", ALGORITHM_CLASSIC, "30d").unwrap();

    let server = spawn_server(data_dir.path()).await;
    let endpoint = ServerEndpoint::new(&server);

    // 31 bytes.
    match endpoint.evaluate("ds1", &[0u8; 31]).await {
        Err(ClientError::Server { status: 400, .. }) => {}
        other => panic!("expected 400, got {other:?}"),
    }

    // 32 bytes that are not a canonical encoding.
    match endpoint.evaluate("ds1", &[0xFF; 32]).await {
        Err(ClientError::Server { status: 400, .. }) => {}
        other => panic!("expected 400, got {other:?}"),
    }

    // Unknown dataset.
    match endpoint.evaluate("nope", &[0u8; 32]).await {
        Err(ClientError::Server { status: 404, .. }) => {}
        other => panic!("expected 404, got {other:?}"),
    }
}

#[tokio::test]
async fn tampered_local_log_recovers_via_full_resync() {
    let data_dir = tempfile::tempdir().unwrap();
    let state_dir = tempfile::tempdir().unwrap();

    let store = admin(data_dir.path());
    store.create_dataset("ds1", ALGORITHM_CLASSIC, "30d").unwrap();
    store
        .sync_from_source("ds1", pairs(&[("a.example", "{}"), ("b.example", "{}")]))
        .unwrap();

    let server = spawn_server(data_dir.path()).await;
    let client = Client::new(&server, state_dir.path());
    client.sync("ds1").await.unwrap();

    // Flip one hex digit in the middle of the first mirrored line. The tip
    // line stays valid, so the next sync asks for a delta.
    let log_path = client.mirror("ds1").dir().join("changes.log");
    let mut body = std::fs::read_to_string(&log_path).unwrap();
    let flipped = if &body[10..11] == "a" { "b" } else { "a" };
    body.replace_range(10..11, flipped);
    std::fs::write(&log_path, body).unwrap();

    // New server-side event so the delta is non-trivial.
    store
        .sync_from_source(
            "ds1",
            pairs(&[("a.example", "{}"), ("b.example", "{}"), ("c.example", "{}")]),
        )
        .unwrap();

    // Replay detects the chain mismatch and falls back to a full resync.
    let report = client.sync("ds1").await.unwrap();
    assert_eq!(report.mode, SyncMode::Full);
    assert_eq!(report.applied, 3);

    assert_eq!(
        client.query("ds1", "c.example").await.unwrap(),
        QueryResult::Match(b"{}".to_vec())
    );
}

#[tokio::test]
async fn concurrent_client_syncs_during_server_sync() {
    let data_dir = tempfile::tempdir().unwrap();
    let state_a = tempfile::tempdir().unwrap();
    let state_b = tempfile::tempdir().unwrap();

    let store = admin(data_dir.path());
    store.create_dataset("ds1", ALGORITHM_CLASSIC, "30d").unwrap();
    let initial: Vec<(String, Vec<u8>)> = (0..20)
        .map(|i| (format!("host{i}.example"), b"{}".to_vec()))
        .collect();
    store.sync_from_source("ds1", initial.clone()).unwrap();

    let server = spawn_server(data_dir.path()).await;
    let client_a = Client::new(&server, state_a.path());
    let client_b = Client::new(&server, state_b.path());
    client_a.sync("ds1").await.unwrap();

    // Server-side sync runs while both clients pull: one from its stale tip,
    // one from scratch. Every applied prefix is chain-verified by the
    // mirror, so completing at all means no torn or inconsistent state was
    // observed.
    let grown: Vec<(String, Vec<u8>)> = (0..40)
        .map(|i| (format!("host{i}.example"), b"{}".to_vec()))
        .collect();
    let writer = tokio::task::spawn_blocking(move || store.sync_from_source("ds1", grown));

    let (a, b, w) = tokio::join!(client_a.sync("ds1"), client_b.sync("ds1"), writer);
    a.unwrap();
    b.unwrap();
    w.unwrap().unwrap();

    // Once the dust settles, both clients converge on the final state.
    client_a.sync("ds1").await.unwrap();
    client_b.sync("ds1").await.unwrap();
    assert_eq!(
        client_a.query("ds1", "host39.example").await.unwrap(),
        QueryResult::Match(b"{}".to_vec())
    );
    assert_eq!(
        client_b.mirror("ds1").load_records().unwrap().unwrap().len(),
        40
    );
}
