//! animica-rpc — the node's JSON-RPC 2.0 surface.
//!
//! One uniform envelope over HTTP (`POST /rpc`) and WebSocket (`/ws`),
//! namespaced with dotted method names (`tx.sendRawTransaction`,
//! `chain.getHead`, …). Subscriptions ride per-topic broadcast channels
//! with bounded client queues; a lagging client gets an `overflow`
//! notice with the dropped count and is expected to reconcile over HTTP.

pub mod api;
pub mod context;
pub mod error;
pub mod hub;
pub mod server;
pub mod types;

pub use context::{PendingBlobs, RpcContext};
pub use hub::{SubscriptionHub, Topic};
pub use server::RpcServer;
