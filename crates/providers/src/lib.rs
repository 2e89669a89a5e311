//! The provider contract and the registry that holds live providers.
//!
//! A provider converts a query string into ranked [`Item`]s and can
//! activate them. Providers run inside the daemon process and are the only
//! point of polymorphism in the system; the registry stores them by name
//! and is immutable once built.

use std::sync::Arc;

use async_trait::async_trait;
use lantern_protocol::{FrameSink, Item, ProviderState};

mod registry;

pub use registry::Registry;

/// Contract every provider satisfies.
///
/// `query` and `activate` are called concurrently from many connections;
/// implementations hold their own state behind their own synchronization.
/// The `conn` handle passed to `query` is the write half of the client
/// connection, kept so providers can emit async item updates later. A
/// provider must never close it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier used in requests.
    fn name(&self) -> &str;

    /// May the provider run in this environment? Called once at startup;
    /// providers reporting `false` are never set up or queried.
    fn available(&self) -> bool {
        true
    }

    /// One-time initialization, run only for available providers. May
    /// block; the registry runs setups concurrently and waits for all.
    async fn setup(&self) {}

    /// Return unsorted candidate items for `query`. `single` is true iff
    /// this provider is the only one named in the request. Errors are the
    /// provider's to log; a failed query contributes zero items.
    async fn query(&self, conn: &Arc<FrameSink>, query: &str, single: bool, exact: bool)
        -> Vec<Item>;

    /// Perform the action the user chose for an item. May spawn external
    /// processes; must not block on them.
    async fn activate(&self, identifier: &str, action: &str, query: &str, args: &str);

    /// Icon hint for UIs.
    fn icon(&self) -> String {
        String::new()
    }

    /// Actions and state tags this provider can attach to items, for UIs
    /// and provider-list front-ends.
    fn state(&self, _query: &str) -> ProviderState {
        ProviderState::default()
    }
}
