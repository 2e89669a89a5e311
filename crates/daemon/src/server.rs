//! Connection server: accept clients on the Unix socket and route their
//! framed requests to the dispatcher, activation handler, or subscription
//! manager.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use lantern_protocol::{read_frame, request, FrameSink};
use lantern_providers::Registry;
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;

use crate::activation;
use crate::config::Config;
use crate::dispatch::{self, Cancellations};
use crate::subscriptions::Subscriptions;
use crate::websearch::WebsearchPolicy;

/// Process-wide state shared by every connection.
pub(crate) struct State {
    pub registry: Registry,
    pub cancellations: Cancellations,
    pub subscriptions: Arc<Subscriptions>,
    pub websearch: WebsearchPolicy,
    qid: AtomicU32,
}

impl State {
    pub fn next_qid(&self) -> u32 {
        self.qid.fetch_add(1, Ordering::Relaxed) + 1
    }
}

pub struct Server {
    listener: UnixListener,
    state: Arc<State>,
    next_cid: AtomicU64,
}

impl Server {
    /// Bind the daemon socket, unlinking a stale socket file first, and
    /// start the subscription background tasks.
    pub fn bind(config: &Config, registry: Registry) -> Result<Self> {
        let path = &config.socket_path;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create socket directory {}", parent.display()))?;
        }
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("remove stale socket {}", path.display()))?;
        }
        let listener =
            UnixListener::bind(path).with_context(|| format!("bind {}", path.display()))?;
        log::info!("listening on {}", path.display());

        let state = Arc::new(State {
            registry,
            cancellations: Cancellations::default(),
            subscriptions: Subscriptions::start(config.healthcheck_interval),
            websearch: WebsearchPolicy::new(config.max_global_websearch_items),
            qid: AtomicU32::new(0),
        });

        Ok(Self {
            listener,
            state,
            next_cid: AtomicU64::new(0),
        })
    }

    /// Sender for provider change announcements. Providers publish their
    /// tag here; event-driven subscribers get it pushed through.
    pub fn provider_updated(&self) -> broadcast::Sender<String> {
        self.state.subscriptions.provider_updated()
    }

    /// Websearch visibility policy, populated during provider setup.
    pub fn websearch(&self) -> &WebsearchPolicy {
        &self.state.websearch
    }

    /// Accept connections until the listener fails. Each connection runs
    /// on its own task.
    pub async fn run(self) -> Result<()> {
        loop {
            let (stream, _) = self.listener.accept().await.context("accept connection")?;
            let cid = self.next_cid.fetch_add(1, Ordering::Relaxed) + 1;
            let state = self.state.clone();
            tokio::spawn(async move {
                handle_connection(state, cid, stream).await;
            });
        }
    }
}

async fn handle_connection(state: Arc<State>, cid: u64, stream: UnixStream) {
    log::debug!("connection {cid} opened");

    let (read_half, write_half) = stream.into_split();
    let sink = FrameSink::new(write_half);
    let mut reader = BufReader::new(read_half);

    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(err) => {
                log::debug!("connection {cid} read failed: {err}");
                break;
            }
        };

        match frame.tag {
            // Queries and activations run on their own tasks so the loop
            // keeps reading: a follow-up query must be able to cancel the
            // one in flight.
            request::QUERY => {
                let state = state.clone();
                let sink = sink.clone();
                tokio::spawn(async move {
                    dispatch::handle_query(&state, cid, &sink, &frame.payload).await;
                });
            }
            request::ACTIVATE => {
                let state = state.clone();
                let sink = sink.clone();
                tokio::spawn(async move {
                    activation::handle_activate(&state, &sink, &frame.payload).await;
                });
            }
            request::SUBSCRIBE => {
                Subscriptions::handle_subscribe(
                    &state.subscriptions,
                    &state.registry,
                    cid,
                    &sink,
                    &frame.payload,
                );
            }
            other => {
                // A malformed request has no correlation id to answer to;
                // drop it and keep the connection.
                log::warn!("connection {cid}: unknown request tag {other}, frame dropped");
            }
        }
    }

    // The connection is gone: stop its in-flight query and forget its
    // subscriptions.
    state.cancellations.close(cid);
    state.subscriptions.drop_connection(cid);
    log::debug!("connection {cid} closed");
}
