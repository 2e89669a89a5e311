//! Activation: look up a provider by name and forward the chosen action.

use std::sync::Arc;

use lantern_protocol::{decode, response, ActivateRequest, FrameSink};

use crate::server::State;

pub(crate) async fn handle_activate(state: &Arc<State>, sink: &Arc<FrameSink>, payload: &[u8]) {
    let req: ActivateRequest = match decode(payload) {
        Ok(req) => req,
        Err(err) => {
            log::error!("activate request decode failed: {err}");
            return;
        }
    };

    // The menu name travels inside the identifier; "menus:settings" and
    // plain "menus" address the same provider.
    let name = if req.provider.starts_with("menus:") {
        "menus"
    } else {
        req.provider.as_str()
    };

    match state.registry.get(name) {
        Some(provider) => {
            // Run the provider on its own task so a panic is contained and
            // the client still gets its completion frame.
            let req = req.clone();
            let guarded = tokio::spawn(async move {
                provider
                    .activate(&req.identifier, &req.action, &req.query, &req.arguments)
                    .await;
            });
            if let Err(err) = guarded.await {
                log::error!("provider {name} activation failed: {err}");
            }
        }
        None => {
            log::debug!("activation for unknown provider {}", req.provider);
        }
    }

    // Fire-and-forget from the client's point of view: always exactly one
    // completion, provider known or not.
    if let Err(err) = sink.send_status(response::ACTIVATION_FINISHED).await {
        log::debug!("activation ack write failed: {err}");
    }
}
