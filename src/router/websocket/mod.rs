//! WebSocket module
//!
//! Real-time console, stats, and state-change push for a single server.

mod handler;

pub use handler::{ws_handler, WebsocketHandler, WsIncoming, WsOutgoing, WsQuery};
