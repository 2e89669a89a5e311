//! Query dispatch: fan one query out across providers, rank the combined
//! results, and stream them back to the client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use lantern_protocol::{
    decode, encode, response, FrameSink, Item, QueryRequest, QueryResponse,
};
use tokio::task::JoinSet;

use crate::server::State;

/// Cooperative cancellation handle for one in-flight query.
///
/// The dispatcher checks it at the join barrier and before every item
/// write; a cancelled query stops emitting without a `QUERY_DONE`.
#[derive(Clone, Default)]
pub(crate) struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-connection cancellation table: at most one live query per
/// connection.
#[derive(Default)]
pub(crate) struct Cancellations {
    inner: Mutex<HashMap<u64, CancelFlag>>,
}

impl Cancellations {
    fn table(&self) -> MutexGuard<'_, HashMap<u64, CancelFlag>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Cancel the connection's previous query and install a fresh handle
    /// for the one about to run. Both steps happen under one lock so two
    /// racing queries on the same connection cannot both stay live.
    pub fn begin(&self, cid: u64) -> CancelFlag {
        let mut table = self.table();
        if let Some(previous) = table.get(&cid) {
            previous.cancel();
        }
        let flag = CancelFlag::default();
        table.insert(cid, flag.clone());
        flag
    }

    /// Connection closed: cancel whatever is in flight and forget the
    /// entry.
    pub fn close(&self, cid: u64) {
        if let Some(flag) = self.table().remove(&cid) {
            flag.cancel();
        }
    }
}

/// Ranking order shared by the dispatcher and the subscription pollers:
/// score descending, ties broken by case-sensitive text compare.
pub(crate) fn sort_items(items: &mut [Item]) {
    items.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.text.cmp(&b.text)));
}

// "menus:settings" addresses the "menus" provider with the menu name
// folded into the query it receives.
fn resolve_provider_entry(entry: &str, query: &str) -> (String, String) {
    match entry.strip_prefix("menus:") {
        Some(menu) => ("menus".to_string(), format!("{menu}:{query}")),
        None => (entry.to_string(), query.to_string()),
    }
}

pub(crate) async fn handle_query(
    state: &Arc<State>,
    cid: u64,
    sink: &Arc<FrameSink>,
    payload: &[u8],
) {
    let req: QueryRequest = match decode(payload) {
        Ok(req) => req,
        Err(err) => {
            log::error!("query request decode failed: {err}");
            return;
        }
    };

    let qid = state.next_qid();
    let started = Instant::now();

    let ws_prefix = if req.providers.iter().any(|p| p == "websearch") {
        state.websearch.prefix_for(&req.query)
    } else {
        None
    };

    let cancel = state.cancellations.begin(cid);

    let single = req.providers.len() == 1;
    let mut tasks = JoinSet::new();
    for entry in &req.providers {
        let (name, query) = resolve_provider_entry(entry, &req.query);
        let Some(provider) = state.registry.get(&name) else {
            log::debug!("query {qid} names unknown provider {name}");
            continue;
        };
        let sink = sink.clone();
        let exact = req.exact_search;
        tasks.spawn(async move { provider.query(&sink, &query, single, exact).await });
    }

    // Join barrier: every provider has contributed or failed before
    // ranking starts. A panicking provider contributes zero items.
    let mut entries: Vec<Item> = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(items) => entries.extend(items),
            Err(err) => log::error!("query {qid} provider task failed: {err}"),
        }
    }

    if cancel.is_cancelled() {
        log::debug!("query {qid} cancelled at the barrier");
        return;
    }

    sort_items(&mut entries);

    if entries.is_empty() {
        if let Err(err) = sink.send_status(response::QUERY_NO_RESULTS).await {
            log::debug!("query {qid} write failed: {err}");
            return;
        }
        if let Err(err) = sink.send_status(response::QUERY_DONE).await {
            log::debug!("query {qid} write failed: {err}");
        }
        log::info!("query {qid}: 0 results in {:?}", started.elapsed());
        return;
    }

    entries.truncate(req.max_results as usize);

    let hide_websearch =
        req.providers.len() > 1 && entries.len() > state.websearch.max_global_items();

    let ranked = entries.len();
    for item in entries {
        if cancel.is_cancelled() {
            log::debug!("query {qid} cancelled mid-stream");
            return;
        }

        if hide_websearch
            && item.provider == "websearch"
            && ws_prefix.as_deref() != Some(item.text.as_str())
        {
            continue;
        }

        let resp = QueryResponse {
            qid,
            query: req.query.clone(),
            item,
        };
        let payload = match encode(&resp) {
            Ok(payload) => payload,
            Err(err) => {
                log::error!("query {qid} item encode failed, skipping: {err}");
                continue;
            }
        };
        if let Err(err) = sink.send_raw(response::QUERY_ITEM, &payload).await {
            log::debug!("query {qid} write failed: {err}");
            return;
        }
    }

    if let Err(err) = sink.send_status(response::QUERY_DONE).await {
        log::debug!("query {qid} write failed: {err}");
        return;
    }

    log::info!(
        "query {qid} {:?}: {ranked} results in {:?}",
        req.query,
        started.elapsed()
    );
}

/// Replace an already-delivered item in place.
///
/// Providers call this for items they marked async, at any time, even
/// after the query's `QUERY_DONE`. Clients correlate the update with the
/// original item by its identifier.
pub async fn update_item(query: &str, conn: &Arc<FrameSink>, item: Item) {
    let resp = QueryResponse {
        qid: 0,
        query: query.to_string(),
        item,
    };
    let payload = match encode(&resp) {
        Ok(payload) => payload,
        Err(err) => {
            log::debug!("async item encode failed: {err}");
            return;
        }
    };
    if let Err(err) = conn.send_raw(response::QUERY_ASYNC_ITEM, &payload).await {
        log::debug!("async item write failed: {err}");
    }
}
