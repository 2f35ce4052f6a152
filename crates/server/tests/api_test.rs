use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use quorumchain_chain::{Blockchain, ChainTransport, LocalTransport};
use quorumchain_server::{build_router, AppState};
use quorumchain_storage::{ChainStore, Storage};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn node(id: &str) -> AppState {
    AppState::new(id, Blockchain::new(), Arc::new(LocalTransport::new()))
}

fn node_with_transport(id: &str, transport: LocalTransport) -> AppState {
    let transport: Arc<dyn ChainTransport> = Arc::new(transport);
    AppState::new(id, Blockchain::new(), transport)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_get_chain_starts_at_genesis() {
    let app = build_router(node("a"));

    let (status, body) = send(&app, Method::GET, "/chain", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["length"], 1);
    assert_eq!(body["chain"][0]["index"], 0);
    assert_eq!(body["chain"][0]["timestamp"], 0);
}

#[tokio::test]
async fn test_transaction_then_mine() {
    let app = build_router(node("miner-a"));

    let (status, body) = send(
        &app,
        Method::POST,
        "/transactions/new",
        Some(json!({"sender": "alice", "recipient": "bob", "amount": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Transaction will be added to Block 1");

    let (status, body) = send(&app, Method::POST, "/mine", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "New Block Forged");
    assert_eq!(body["index"], 1);
    assert_eq!(body["transactions"].as_array().unwrap().len(), 2);
    assert_eq!(body["transactions"][1]["sender"], "0");
    assert_eq!(body["transactions"][1]["recipient"], "miner-a");

    let (_, chain) = send(&app, Method::GET, "/chain", None).await;
    assert_eq!(chain["length"], 2);
}

#[tokio::test]
async fn test_invalid_transaction_rejected() {
    let app = build_router(node("a"));

    let (status, body) = send(
        &app,
        Method::POST,
        "/transactions/new",
        Some(json!({"sender": "", "recipient": "bob", "amount": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_register_nodes() {
    let app = build_router(node("a"));

    let (status, _) = send(&app, Method::POST, "/nodes/register", Some(json!({"nodes": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/nodes/register",
        Some(json!({"nodes": ["http://127.0.0.1:5002", "127.0.0.1:5001"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["total_nodes"], json!(["127.0.0.1:5001", "127.0.0.1:5002"]));
}

#[tokio::test]
async fn test_resolve_adopts_longer_peer_chain() {
    let peer = Blockchain::new().into_shared();
    for _ in 0..3 {
        peer.write().mine("peer").unwrap();
    }

    let mut transport = LocalTransport::new();
    transport.insert("peer:5001", peer.clone());
    let app = build_router(node_with_transport("a", transport));

    send(&app, Method::POST, "/nodes/register", Some(json!({"nodes": ["peer:5001"]}))).await;

    let (status, body) = send(&app, Method::POST, "/nodes/resolve", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Our chain was replaced");
    assert_eq!(body["chain"].as_array().unwrap().len(), 4);

    let (_, body) = send(&app, Method::POST, "/nodes/resolve", None).await;
    assert_eq!(body["message"], "Our chain is authoritative");
    assert_eq!(body["replaced"], false);
}

#[tokio::test]
async fn test_quorum_block_exchange() {
    let ids = ["a", "b", "c"];
    let apps: Vec<Router> = ids
        .iter()
        .map(|id| {
            let state = node(id);
            for peer in ids.iter().filter(|peer| *peer != id) {
                state.register_peer(peer).unwrap();
            }
            build_router(state)
        })
        .collect();

    let (status, block) = send(
        &apps[0],
        Method::POST,
        "/blocks/propose",
        Some(json!({"transactions": [{"sender": "alice", "recipient": "bob", "amount": 3}]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let hash = block["hash"].as_str().unwrap().to_string();
    assert_eq!(block["signatures"]["a"], "signed");

    // b already sees a's signature plus its own: two of three.
    let (status, staged) = send(&apps[1], Method::POST, "/blocks", Some(block.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(staged["signatures"], 2);
    assert_eq!(staged["required"], 2);
    assert_eq!(staged["accepted"], true);

    // a has only its own signature until b's arrives.
    let commit_uri = format!("/blocks/{hash}/commit");
    let (status, _) = send(&apps[0], Method::POST, &commit_uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let signature_uri = format!("/blocks/{hash}/signatures");
    let (status, _) = send(
        &apps[0],
        Method::POST,
        &signature_uri,
        Some(json!({"signer": "mallory"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, staged) = send(
        &apps[0],
        Method::POST,
        &signature_uri,
        Some(json!({"signer": "b"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(staged["accepted"], true);

    let (status, committed) = send(&apps[0], Method::POST, &commit_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(committed["hash"], hash.as_str());

    let (_, ledger) = send(&apps[0], Method::GET, "/ledger", None).await;
    assert_eq!(ledger["length"], 2);
    assert_eq!(ledger["pending"], 0);

    // c never saw the block.
    let (status, _) = send(&apps[2], Method::POST, &commit_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_block_on_wrong_parent_rejected() {
    let app = build_router(node("a"));

    let (_, block) = send(&app, Method::POST, "/blocks/propose", Some(json!({}))).await;
    let hash = block["hash"].as_str().unwrap().to_string();
    let (status, _) = send(&app, Method::POST, &format!("/blocks/{hash}/commit"), None).await;
    assert_eq!(status, StatusCode::OK);

    // The same block no longer extends the tail.
    let (status, body) = send(&app, Method::POST, "/blocks", Some(block)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("rejected"));
}

#[tokio::test]
async fn test_malformed_hash_in_path() {
    let app = build_router(node("a"));
    let (status, _) = send(&app, Method::POST, "/blocks/not-a-hash/commit", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_signers_on_received_block_do_not_count() {
    let state = node("a");
    for peer in ["b", "c", "d", "e"] {
        state.register_peer(peer).unwrap();
    }
    let mut block = state.ledger.propose_block(vec![]);
    block.add_signature("mallory1".into());
    block.add_signature("mallory2".into());
    let hash = block.hash().to_hex();
    let app = build_router(state);

    let (status, staged) = send(&app, Method::POST, "/blocks", Some(block.to_dict())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(staged["signatures"], 1);
    assert_eq!(staged["required"], 3);
    assert_eq!(staged["accepted"], false);

    let (status, _) = send(&app, Method::POST, &format!("/blocks/{hash}/commit"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, ledger) = send(&app, Method::GET, "/ledger", None).await;
    assert_eq!(ledger["length"], 1);
}

#[tokio::test]
async fn test_mine_with_full_buffer_still_forges() {
    let config = quorumchain_chain::BlockchainConfig {
        mempool: quorumchain_chain::MempoolConfig {
            max_transactions: 1,
        },
        ..Default::default()
    };
    let state = AppState::new(
        "miner-a",
        Blockchain::with_config(config),
        Arc::new(LocalTransport::new()),
    );
    let app = build_router(state);

    let tx = json!({"sender": "alice", "recipient": "bob", "amount": 5});
    let (status, _) = send(&app, Method::POST, "/transactions/new", Some(tx.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, Method::POST, "/transactions/new", Some(tx)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, Method::POST, "/mine", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transactions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_store_write_leaves_chain_unchanged() {
    let storage = Storage::open_temporary().unwrap();
    let store = ChainStore::new(&storage);
    store.init_genesis().unwrap();

    // The store is already one block ahead of the node.
    let elsewhere = Blockchain::new().into_shared();
    let foreign = elsewhere.write().mine("elsewhere").unwrap();
    store.append_block(&foreign).unwrap();

    let mut state = node("miner-a");
    state.storage = Some(storage.clone());
    let app = build_router(state.clone());

    send(
        &app,
        Method::POST,
        "/transactions/new",
        Some(json!({"sender": "alice", "recipient": "bob", "amount": 5})),
    )
    .await;

    let (status, body) = send(&app, Method::POST, "/mine", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().starts_with("storage"));

    let (_, chain) = send(&app, Method::GET, "/chain", None).await;
    assert_eq!(chain["length"], 1);
    assert_eq!(state.blockchain.read().pending_transactions().len(), 1);
    assert_eq!(store.get_height().unwrap(), 1);
}

#[tokio::test]
async fn test_resolve_writes_adopted_chain_to_store() {
    let peer = Blockchain::new().into_shared();
    for _ in 0..2 {
        peer.write().mine("peer").unwrap();
    }
    let mut transport = LocalTransport::new();
    transport.insert("peer:5001", peer.clone());

    let storage = Storage::open_temporary().unwrap();
    ChainStore::new(&storage).init_genesis().unwrap();
    let mut state = node_with_transport("a", transport);
    state.storage = Some(storage.clone());
    state.register_peer("peer:5001").unwrap();
    let app = build_router(state);

    let (status, body) = send(&app, Method::POST, "/nodes/resolve", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["replaced"], true);

    let stored = ChainStore::new(&storage).load_chain().unwrap();
    assert_eq!(stored, peer.read().blocks());
}
