#![allow(dead_code)]

//! Shared fixtures for daemon integration tests: a daemon bound to a
//! temporary socket, scripted providers, and frame helpers.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lantern_daemon::{update_item, Config, Server};
use lantern_protocol::{
    decode, encode, read_frame, request, response, write_frame, ActivateRequest, Frame, FrameSink,
    FuzzyInfo, Item, QueryRequest, QueryResponse, SubscribeRequest,
};
use lantern_providers::{Provider, Registry};
use tokio::net::UnixStream;
use tokio::sync::broadcast;

pub struct TestDaemon {
    pub socket: PathBuf,
    pub provider_updated: broadcast::Sender<String>,
    _dir: tempfile::TempDir,
}

impl TestDaemon {
    pub async fn start(providers: Vec<Arc<dyn Provider>>) -> Self {
        Self::start_with(providers, |_| {}).await
    }

    pub async fn start_with(
        providers: Vec<Arc<dyn Provider>>,
        tweak: impl FnOnce(&mut Config),
    ) -> Self {
        let dir = tempfile::tempdir().expect("tempdir for daemon socket");
        let socket = dir.path().join("lantern.sock");
        let mut config = Config {
            socket_path: socket.clone(),
            healthcheck_interval: None,
            max_global_websearch_items: 0,
        };
        tweak(&mut config);

        let registry = Registry::build(providers).await;
        let server = Server::bind(&config, registry).expect("bind test daemon");
        let provider_updated = server.provider_updated();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        Self {
            socket,
            provider_updated,
            _dir: dir,
        }
    }

    pub async fn connect(&self) -> UnixStream {
        UnixStream::connect(&self.socket)
            .await
            .expect("connect to test daemon")
    }
}

pub fn item(provider: &str, text: &str, score: i32) -> Item {
    Item {
        identifier: format!("{provider}:{text}"),
        provider: provider.to_string(),
        text: text.to_string(),
        score,
        ..Item::default()
    }
}

pub async fn send_query(stream: &mut UnixStream, req: &QueryRequest) {
    let payload = encode(req).expect("encode query request");
    write_frame(stream, request::QUERY, &payload)
        .await
        .expect("write query request");
}

pub async fn send_activate(stream: &mut UnixStream, req: &ActivateRequest) {
    let payload = encode(req).expect("encode activate request");
    write_frame(stream, request::ACTIVATE, &payload)
        .await
        .expect("write activate request");
}

pub async fn send_subscribe(stream: &mut UnixStream, req: &SubscribeRequest) {
    let payload = encode(req).expect("encode subscribe request");
    write_frame(stream, request::SUBSCRIBE, &payload)
        .await
        .expect("write subscribe request");
}

/// Next frame, failing the test after five seconds.
pub async fn next_frame(stream: &mut UnixStream) -> Frame {
    next_frame_within(stream, Duration::from_secs(5))
        .await
        .expect("expected a frame before the timeout")
}

/// Next frame within `wait`, or `None` when the peer stays silent.
pub async fn next_frame_within(stream: &mut UnixStream, wait: Duration) -> Option<Frame> {
    match tokio::time::timeout(wait, read_frame(stream)).await {
        Ok(frame) => Some(
            frame
                .expect("read frame")
                .expect("daemon closed the connection"),
        ),
        Err(_) => None,
    }
}

/// Frames observed for one query, up to and including `QUERY_DONE`.
pub struct QueryOutcome {
    pub items: Vec<QueryResponse>,
    pub no_results: bool,
}

impl QueryOutcome {
    pub fn texts(&self) -> Vec<&str> {
        self.items.iter().map(|r| r.item.text.as_str()).collect()
    }
}

pub async fn collect_query(stream: &mut UnixStream) -> QueryOutcome {
    let mut items = Vec::new();
    let mut no_results = false;
    loop {
        let frame = next_frame(stream).await;
        match frame.tag {
            response::QUERY_DONE => break,
            response::QUERY_NO_RESULTS => {
                assert!(frame.payload.is_empty(), "status frames carry no payload");
                no_results = true;
            }
            response::QUERY_ITEM => {
                items.push(decode::<QueryResponse>(&frame.payload).expect("decode query item"));
            }
            other => panic!("unexpected frame tag {other} during query"),
        }
    }
    QueryOutcome { items, no_results }
}

/// Returns a fixed item set and records what it was asked.
pub struct StaticProvider {
    name: String,
    items: Vec<Item>,
    pub seen_queries: Mutex<Vec<String>>,
    pub seen_single: Mutex<Vec<bool>>,
}

impl StaticProvider {
    pub fn new(name: &str, items: Vec<Item>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            items,
            seen_queries: Mutex::new(Vec::new()),
            seen_single: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Provider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(
        &self,
        _conn: &Arc<FrameSink>,
        query: &str,
        single: bool,
        _exact: bool,
    ) -> Vec<Item> {
        self.seen_queries.lock().unwrap().push(query.to_string());
        self.seen_single.lock().unwrap().push(single);
        self.items.clone()
    }

    async fn activate(&self, _identifier: &str, _action: &str, _query: &str, _args: &str) {}
}

/// Sleeps before answering; for superseding-query races.
pub struct SlowProvider {
    name: String,
    delay: Duration,
    items: Vec<Item>,
}

impl SlowProvider {
    pub fn new(name: &str, delay: Duration, items: Vec<Item>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            delay,
            items,
        })
    }
}

#[async_trait]
impl Provider for SlowProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(
        &self,
        _conn: &Arc<FrameSink>,
        _query: &str,
        _single: bool,
        _exact: bool,
    ) -> Vec<Item> {
        tokio::time::sleep(self.delay).await;
        self.items.clone()
    }

    async fn activate(&self, _identifier: &str, _action: &str, _query: &str, _args: &str) {}
}

/// Returns the n-th configured result set on its n-th call, sticking to
/// the last one afterwards. Drives subscription change detection.
pub struct SequenceProvider {
    name: String,
    sets: Vec<Vec<Item>>,
    calls: AtomicUsize,
}

impl SequenceProvider {
    pub fn new(name: &str, sets: Vec<Vec<Item>>) -> Arc<Self> {
        assert!(!sets.is_empty());
        Arc::new(Self {
            name: name.to_string(),
            sets,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Provider for SequenceProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(
        &self,
        _conn: &Arc<FrameSink>,
        _query: &str,
        _single: bool,
        _exact: bool,
    ) -> Vec<Item> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.sets[call.min(self.sets.len() - 1)].clone()
    }

    async fn activate(&self, _identifier: &str, _action: &str, _query: &str, _args: &str) {}
}

/// Records activations; queries return nothing.
pub struct RecordingProvider {
    name: String,
    pub activations: Mutex<Vec<(String, String, String, String)>>,
}

impl RecordingProvider {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            activations: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Provider for RecordingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(
        &self,
        _conn: &Arc<FrameSink>,
        _query: &str,
        _single: bool,
        _exact: bool,
    ) -> Vec<Item> {
        Vec::new()
    }

    async fn activate(&self, identifier: &str, action: &str, query: &str, args: &str) {
        self.activations.lock().unwrap().push((
            identifier.to_string(),
            action.to_string(),
            query.to_string(),
            args.to_string(),
        ));
    }
}

/// Ranks its candidate names with the fuzzy scorer, the way real
/// providers do.
pub struct FuzzyProvider {
    name: String,
    candidates: Vec<String>,
}

impl FuzzyProvider {
    pub fn new(name: &str, candidates: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
        })
    }
}

#[async_trait]
impl Provider for FuzzyProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(
        &self,
        _conn: &Arc<FrameSink>,
        query: &str,
        _single: bool,
        exact: bool,
    ) -> Vec<Item> {
        self.candidates
            .iter()
            .filter_map(|candidate| {
                let scored = lantern_search::score(query, candidate, exact);
                if scored.score == 0 {
                    return None;
                }
                let mut entry = item(&self.name, candidate, scored.score);
                entry.fuzzy_info = Some(FuzzyInfo {
                    field: "text".to_string(),
                    start: scored.start,
                    positions: scored.positions,
                });
                Some(entry)
            })
            .collect()
    }

    async fn activate(&self, _identifier: &str, _action: &str, _query: &str, _args: &str) {}
}

/// Contributes nothing to the main stream, then replaces an item through
/// the async update path.
pub struct AsyncUpdateProvider {
    name: String,
    update: Item,
}

impl AsyncUpdateProvider {
    pub fn new(name: &str, update: Item) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            update,
        })
    }
}

#[async_trait]
impl Provider for AsyncUpdateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(
        &self,
        conn: &Arc<FrameSink>,
        query: &str,
        _single: bool,
        _exact: bool,
    ) -> Vec<Item> {
        let conn = conn.clone();
        let query = query.to_string();
        let update = self.update.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            update_item(&query, &conn, update).await;
        });
        Vec::new()
    }

    async fn activate(&self, _identifier: &str, _action: &str, _query: &str, _args: &str) {}
}

/// Panics inside `query`; the dispatcher must contain it.
pub struct PanickingProvider {
    name: String,
}

impl PanickingProvider {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl Provider for PanickingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(
        &self,
        _conn: &Arc<FrameSink>,
        _query: &str,
        _single: bool,
        _exact: bool,
    ) -> Vec<Item> {
        panic!("provider blew up");
    }

    async fn activate(&self, _identifier: &str, _action: &str, _query: &str, _args: &str) {
        panic!("activation blew up");
    }
}
