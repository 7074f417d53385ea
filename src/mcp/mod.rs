//! Model Context Protocol (MCP) integration.
//!
//! Exposes the memory connector to editors and agent hosts as two tools, prefixed with the
//! backend name:
//!
//! - `<prefix>-store`: embed a piece of information (plus optional metadata) and persist it.
//!   Hidden when the server runs read-only.
//! - `<prefix>-find`: return the memories closest in meaning to a query.
//!
//! Handlers, schemas, and formatting helpers live in focused submodules.

mod format;
pub mod handlers;
mod registry;
mod schemas;
mod server;

pub use format::format_entry;
pub use server::VectorDbMcpServer;
