//! MCP tool surface: one module per tool group, each exposing a
//! `schema()` JSON-schema literal and an `execute(ctx, args)` entry point.

pub mod codegraph;
pub mod context;
pub mod graphrag;
pub mod memory;
pub mod relations;

/// Shorthand for a tool argument fetch-with-default chain.
pub(crate) fn arg_str<'a>(args: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

pub(crate) fn require_str<'a>(args: &'a serde_json::Value, key: &str) -> Result<&'a str, String> {
    arg_str(args, key).ok_or_else(|| format!("missing required argument `{key}`"))
}
