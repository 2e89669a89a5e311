//! Subscriptions: push provider data to clients, either on interval polls
//! or on provider-announced change events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use lantern_protocol::{
    decode, response, FrameSink, Item, SubscribeRequest, SubscribeResponse,
};
use lantern_providers::{Provider, Registry};
use tokio::sync::broadcast;

use crate::dispatch::sort_items;

/// Subscription ids start far above query ids so the two id spaces cannot
/// collide from a client's point of view.
const SID_BASE: u32 = 100_000_000;

struct Subscription {
    sid: u32,
    cid: u64,
    interval_ms: u32,
    provider: String,
    query: String,
    last_results: Vec<Item>,
    sink: Arc<FrameSink>,
}

pub(crate) struct Subscriptions {
    subs: Mutex<HashMap<u32, Subscription>>,
    sid: AtomicU32,
    provider_updated: broadcast::Sender<String>,
}

impl Subscriptions {
    /// Start the manager and its background tasks: the broadcast-event
    /// reader and, when configured, the liveness probe loop.
    pub fn start(healthcheck: Option<Duration>) -> Arc<Self> {
        let (provider_updated, events) = broadcast::channel(64);
        let manager = Arc::new(Self {
            subs: Mutex::new(HashMap::new()),
            sid: AtomicU32::new(SID_BASE),
            provider_updated,
        });

        tokio::spawn({
            let manager = manager.clone();
            async move { manager.run_event_reader(events).await }
        });

        if let Some(interval) = healthcheck {
            tokio::spawn({
                let manager = manager.clone();
                async move { manager.run_healthcheck(interval).await }
            });
        }

        manager
    }

    /// Sender providers use to announce "my data changed" with their
    /// provider tag, optionally suffixed `:subkind`.
    pub fn provider_updated(&self) -> broadcast::Sender<String> {
        self.provider_updated.clone()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<u32, Subscription>> {
        match self.subs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn handle_subscribe(
        manager: &Arc<Self>,
        registry: &Registry,
        cid: u64,
        sink: &Arc<FrameSink>,
        payload: &[u8],
    ) {
        let req: SubscribeRequest = match decode(payload) {
            Ok(req) => req,
            Err(err) => {
                log::error!("subscribe request decode failed: {err}");
                return;
            }
        };

        let sid = manager.sid.fetch_add(1, Ordering::Relaxed) + 1;
        manager.table().insert(
            sid,
            Subscription {
                sid,
                cid,
                interval_ms: req.interval,
                provider: req.provider.clone(),
                query: req.query.clone(),
                last_results: Vec::new(),
                sink: sink.clone(),
            },
        );
        log::info!(
            "subscription {sid}: provider {} interval {}ms",
            req.provider,
            req.interval
        );

        if req.interval > 0 {
            match registry.get(&req.provider) {
                Some(provider) => {
                    let manager = manager.clone();
                    tokio::spawn(async move { manager.run_poller(sid, provider, req).await });
                }
                None => {
                    log::warn!("subscription {sid} polls unknown provider {}", req.provider)
                }
            }
        }
    }

    /// Interval poller: re-evaluate the query every tick and push when the
    /// tracked fields change. Terminates when the subscription is gone.
    async fn run_poller(self: Arc<Self>, sid: u32, provider: Arc<dyn Provider>, req: SubscribeRequest) {
        let interval = Duration::from_millis(u64::from(req.interval));
        loop {
            tokio::time::sleep(interval).await;

            // Re-read our own entry each tick; unsubscription shows up as
            // removal from the map.
            let sink = match self.table().get(&sid) {
                Some(sub) => sub.sink.clone(),
                None => return,
            };

            let mut results = provider.query(&sink, &req.query, true, false).await;
            sort_items(&mut results);

            let changed = {
                let mut table = self.table();
                let Some(sub) = table.get_mut(&sid) else { return };
                if results_changed(&sub.last_results, &results) {
                    sub.last_results = results;
                    true
                } else {
                    false
                }
            };

            if changed && !self.push(sid, &sink, "").await {
                return;
            }
        }
    }

    /// Broadcast reader: fan each provider-updated event out to the
    /// event-driven subscribers of that provider.
    async fn run_event_reader(self: Arc<Self>, mut events: broadcast::Receiver<String>) {
        loop {
            let tag = match events.recv().await {
                Ok(tag) => tag,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    log::warn!("provider update reader lagged, {missed} events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return,
            };

            let provider = normalize_provider_tag(&tag);
            let targets: Vec<(u32, Arc<FrameSink>)> = self
                .table()
                .values()
                .filter(|s| s.interval_ms == 0 && s.query.is_empty() && s.provider == provider)
                .map(|s| (s.sid, s.sink.clone()))
                .collect();

            for (sid, sink) in targets {
                // Subscribers see the original tag, subkind included.
                self.push(sid, &sink, &tag).await;
            }
        }
    }

    /// Liveness probe for silent peers: a zero-payload frame per
    /// subscription; a failed write drops the subscription.
    async fn run_healthcheck(self: Arc<Self>, interval: Duration) {
        loop {
            tokio::time::sleep(interval).await;

            let targets: Vec<(u32, Arc<FrameSink>)> = self
                .table()
                .values()
                .map(|s| (s.sid, s.sink.clone()))
                .collect();

            for (sid, sink) in targets {
                if let Err(err) = sink.send_status(response::SUBSCRIPTION_HEALTHCHECK).await {
                    log::debug!("subscription {sid} healthcheck failed, dropping: {err}");
                    self.table().remove(&sid);
                }
            }
        }
    }

    /// Connection closed: forget its subscriptions. Pollers notice the
    /// removal on their next tick and terminate.
    pub fn drop_connection(&self, cid: u64) {
        self.table().retain(|_, sub| sub.cid != cid);
    }

    async fn push(&self, sid: u32, sink: &Arc<FrameSink>, value: &str) -> bool {
        let resp = SubscribeResponse {
            value: value.to_string(),
        };
        match sink.send(response::SUBSCRIPTION_DATA_CHANGED, &resp).await {
            Ok(()) => true,
            Err(err) => {
                log::debug!("subscription {sid} push failed, dropping: {err}");
                self.table().remove(&sid);
                false
            }
        }
    }
}

// Multi-kind providers announce as "menus:settings" or
// "bluetooth:connect"; subscriptions are registered under the bare name.
fn normalize_provider_tag(tag: &str) -> &str {
    match tag.split_once(':') {
        Some((head @ ("menus" | "bluetooth"), _)) => head,
        _ => tag,
    }
}

/// A push is warranted when lengths differ or any positional element
/// differs in a tracked field. The remaining fields are cosmetic and
/// deliberately excluded from the comparison.
fn results_changed(previous: &[Item], current: &[Item]) -> bool {
    if previous.len() != current.len() {
        return true;
    }
    previous.iter().zip(current).any(|(a, b)| {
        a.icon != b.icon || a.text != b.text || a.subtext != b.subtext || a.score != b.score
    })
}
