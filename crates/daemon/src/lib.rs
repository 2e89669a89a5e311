//! The lantern daemon: a request/response engine for launcher front-ends.
//!
//! Clients connect over a local Unix stream socket and submit typed
//! requests: run a query across providers, activate a selected item, or
//! subscribe to a data source for push updates. The daemon answers with a
//! length-prefixed, tag-framed binary stream of result items and status
//! codes. Wire format lives in `lantern-protocol`, the provider contract
//! in `lantern-providers`.

mod activation;
mod config;
mod dispatch;
mod server;
mod subscriptions;
mod websearch;

pub use config::Config;
pub use dispatch::update_item;
pub use server::Server;
pub use websearch::WebsearchPolicy;
