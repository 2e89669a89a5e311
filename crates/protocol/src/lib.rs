//! Wire types shared by the lantern daemon and its clients.
//!
//! Every message on the socket is a frame: `tag:u8 ‖ length:u32be ‖
//! payload[length]`. Payloads are bincode-encoded structs from this crate;
//! status frames (`QUERY_DONE`, `ACTIVATION_FINISHED`, ...) carry a zero
//! length and no payload. See [`codec`] for the framing itself.

use serde::{Deserialize, Serialize};

mod codec;

pub use codec::{decode, encode, read_frame, write_frame, CodecError, Frame, FrameSink};

/// Request tags accepted by the daemon.
pub mod request {
    pub const QUERY: u8 = 0;
    pub const ACTIVATE: u8 = 1;
    pub const SUBSCRIBE: u8 = 2;
}

/// Response tags emitted by the daemon.
///
/// The tag namespace is per-direction and per-request-kind: `QUERY_ITEM`
/// and `SUBSCRIPTION_DATA_CHANGED` share the byte value because a client
/// knows which request it issued on which connection.
pub mod response {
    pub const QUERY_ITEM: u8 = 0;
    pub const QUERY_ASYNC_ITEM: u8 = 1;
    pub const ACTIVATION_FINISHED: u8 = 2;
    pub const SUBSCRIPTION_DATA_CHANGED: u8 = 0;
    pub const SUBSCRIPTION_HEALTHCHECK: u8 = 230;
    pub const QUERY_NO_RESULTS: u8 = 254;
    pub const QUERY_DONE: u8 = 255;
}

/// One ranked result as streamed to the client.
///
/// `identifier` is provider-scoped and opaque to the daemon; it round-trips
/// back on activation. `provider` may carry a `:subkind` suffix (for
/// example `menus:files`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub identifier: String,
    pub provider: String,
    pub text: String,
    pub subtext: String,
    pub icon: String,
    pub preview: String,
    pub preview_type: String,
    pub score: i32,
    pub actions: Vec<String>,
    pub state: Vec<String>,
    pub fuzzy_info: Option<FuzzyInfo>,
    pub item_type: i32,
}

/// Match metadata attached to an item when a fuzzy score contributed to its
/// ranking. `positions` are byte indices into the matched field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzyInfo {
    pub field: String,
    pub start: i32,
    pub positions: Vec<u32>,
}

/// Run a query against one or more providers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub providers: Vec<String>,
    pub max_results: u32,
    pub exact_search: bool,
}

/// Invoke one of an item's actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateRequest {
    pub provider: String,
    pub identifier: String,
    pub action: String,
    pub query: String,
    pub arguments: String,
}

/// Register interest in a provider's data. `interval = 0` means
/// event-driven only; non-zero means poll this often (milliseconds).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub interval: u32,
    pub provider: String,
    pub query: String,
}

/// Payload of `QUERY_ITEM` and `QUERY_ASYNC_ITEM` frames. Async updates
/// carry `qid = 0`; clients correlate them by the item's identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub qid: u32,
    pub query: String,
    pub item: Item,
}

/// Payload of `SUBSCRIPTION_DATA_CHANGED` frames. `value` is empty for
/// interval polls and carries the provider tag for broadcast events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeResponse {
    pub value: String,
}

/// Provider metadata reported to UIs and provider-list front-ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderState {
    pub actions: Vec<String>,
    pub states: Vec<String>,
}
