//! RCAE MCP dispatcher library.
//!
//! Exposes the JSON-RPC protocol types, the tool/resource dispatch surface,
//! and the [`context::EngineContext`] that wires a project's storage,
//! embedder, vector backend, and retrieval/assembly engines together. Split
//! out from `main.rs` so `src/bin/cli.rs` can reuse the same context
//! construction without duplicating it.

pub mod context;
pub mod protocol;
pub mod server;
pub mod tools;
