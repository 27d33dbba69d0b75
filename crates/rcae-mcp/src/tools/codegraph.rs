//! Code graph tools (§4.2): scanning, watching, node/edge inspection, and
//! summary maintenance. Only functional when the `codegraph` feature is
//! enabled; `execute_*` otherwise returns an explanatory error so
//! `tools/list` can still advertise the schema.

use crate::context::EngineContext;
use serde_json::{json, Value};

use super::require_str;

const FEATURE_DISABLED: &str = "codegraph feature not enabled in this build";

pub fn schema_scan() -> Value {
    json!({
        "name": "scan_code",
        "description": "Discovers and parses source files under a root, incrementally updating the code graph.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "root": {"type": "string"},
                "embed": {"type": "boolean", "default": true}
            }
        }
    })
}

#[cfg(feature = "codegraph")]
pub async fn execute_scan(ctx: &EngineContext, args: Option<Value>) -> Result<Value, String> {
    use rcae_core::codegraph::{CodeGraphBuilder, ScanOptions};

    let root = args
        .as_ref()
        .and_then(|a| a.get("root"))
        .and_then(|v| v.as_str())
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| ctx.paths.root.clone());
    let embed = args
        .as_ref()
        .and_then(|a| a.get("embed"))
        .and_then(|v| v.as_bool())
        .unwrap_or(true);

    let storage = ctx.storage.clone();
    let embedder = ctx.embedder.clone();
    let vectors = ctx.vectors.clone();
    let stats = tokio::task::spawn_blocking(move || {
        let builder = CodeGraphBuilder::new(storage).with_embedder(std::sync::Arc::new(EmbedderAdapter(embedder)));
        let options = ScanOptions {
            root,
            embed,
            ..ScanOptions::default()
        };
        let stats = builder.scan(&options)?;
        for (node_id, vector) in &stats.embedded {
            vectors.upsert(
                &format!("code:{node_id}"),
                vector,
                rcae_core::model::VectorPayload::CodeUnit {
                    node_id: node_id.clone(),
                    file_path: String::new(),
                    name: String::new(),
                },
            );
        }
        Ok::<_, rcae_core::codegraph::ScanError>(stats)
    })
    .await
    .map_err(|e| e.to_string())?
    .map_err(|e| e.to_string())?;

    Ok(json!({
        "added": stats.added,
        "updated": stats.updated,
        "deleted": stats.deleted,
        "unchanged": stats.unchanged,
    }))
}

#[cfg(feature = "codegraph")]
struct EmbedderAdapter(std::sync::Arc<dyn rcae_core::capability::Embedder>);

#[cfg(feature = "codegraph")]
impl rcae_core::codegraph::SymbolEmbedder for EmbedderAdapter {
    fn embed_batch(&self, texts: &[String]) -> Vec<Option<Vec<f32>>> {
        self.0.embed_batch(texts)
    }
}

#[cfg(not(feature = "codegraph"))]
pub async fn execute_scan(_ctx: &EngineContext, _args: Option<Value>) -> Result<Value, String> {
    Err(FEATURE_DISABLED.to_string())
}

pub fn schema_stop_watch() -> Value {
    json!({
        "name": "stop_code_watch",
        "description": "Stops the background file watcher, if running.",
        "inputSchema": {"type": "object", "properties": {}}
    })
}

#[cfg(feature = "codegraph")]
pub async fn execute_stop_watch(_ctx: &EngineContext, _args: Option<Value>) -> Result<Value, String> {
    rcae_core::codegraph::watcher::stop_watch();
    Ok(json!({"watching": rcae_core::codegraph::watcher::is_watching()}))
}

#[cfg(not(feature = "codegraph"))]
pub async fn execute_stop_watch(_ctx: &EngineContext, _args: Option<Value>) -> Result<Value, String> {
    Err(FEATURE_DISABLED.to_string())
}

pub fn schema_get_node() -> Value {
    json!({
        "name": "get_code_node",
        "description": "Fetches a code node by id.",
        "inputSchema": {
            "type": "object",
            "properties": {"id": {"type": "string"}},
            "required": ["id"]
        }
    })
}

pub async fn execute_get_node(ctx: &EngineContext, args: Option<Value>) -> Result<Value, String> {
    let args = args.ok_or("missing arguments")?;
    let id = require_str(&args, "id")?;
    let node = ctx.storage.get_code_node(id).map_err(|e| e.to_string())?;
    serde_json::to_value(&node).map_err(|e| e.to_string())
}

pub fn schema_update_summary() -> Value {
    json!({
        "name": "update_node_summary",
        "description": "Sets a code node's summary and confidence.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "id": {"type": "string"},
                "summary": {"type": "string"},
                "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0}
            },
            "required": ["id", "summary", "confidence"]
        }
    })
}

pub async fn execute_update_summary(ctx: &EngineContext, args: Option<Value>) -> Result<Value, String> {
    let args = args.ok_or("missing arguments")?;
    let id = require_str(&args, "id")?;
    let summary = require_str(&args, "summary")?;
    let confidence = args
        .get("confidence")
        .and_then(|v| v.as_f64())
        .ok_or("missing required argument `confidence`")? as f32;

    ctx.storage
        .update_node_summary(id, summary, confidence)
        .map_err(|e| e.to_string())?;
    Ok(json!({"updated": id}))
}

pub fn schema_call_graph() -> Value {
    json!({
        "name": "get_call_graph",
        "description": "Walks outbound `calls` edges from a node up to a depth.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "nodeId": {"type": "string"},
                "depth": {"type": "integer", "minimum": 1, "default": 2}
            },
            "required": ["nodeId"]
        }
    })
}

pub async fn execute_call_graph(ctx: &EngineContext, args: Option<Value>) -> Result<Value, String> {
    walk_edges(ctx, args, "calls", Direction::Outbound).await
}

pub fn schema_find_implementations() -> Value {
    json!({
        "name": "find_implementations",
        "description": "Finds nodes whose `implements` edge points at an interface/type node.",
        "inputSchema": {
            "type": "object",
            "properties": {"nodeId": {"type": "string"}},
            "required": ["nodeId"]
        }
    })
}

pub async fn execute_find_implementations(ctx: &EngineContext, args: Option<Value>) -> Result<Value, String> {
    walk_edges(ctx, args, "implements", Direction::Inbound).await
}

pub fn schema_dependency_tree() -> Value {
    json!({
        "name": "get_dependency_tree",
        "description": "Walks outbound `imports` edges from a node up to a depth.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "nodeId": {"type": "string"},
                "depth": {"type": "integer", "minimum": 1, "default": 3}
            },
            "required": ["nodeId"]
        }
    })
}

pub async fn execute_dependency_tree(ctx: &EngineContext, args: Option<Value>) -> Result<Value, String> {
    walk_edges(ctx, args, "imports", Direction::Outbound).await
}

pub fn schema_analyze_impact() -> Value {
    json!({
        "name": "analyze_impact",
        "description": "Walks inbound edges of any kind from a node up to a depth, to find what would be affected by a change.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "nodeId": {"type": "string"},
                "depth": {"type": "integer", "minimum": 1, "default": 2}
            },
            "required": ["nodeId"]
        }
    })
}

pub async fn execute_analyze_impact(ctx: &EngineContext, args: Option<Value>) -> Result<Value, String> {
    let args = args.ok_or("missing arguments")?;
    let node_id = require_str(&args, "nodeId")?.to_string();
    let depth = args.get("depth").and_then(|v| v.as_u64()).unwrap_or(2) as usize;

    let mut visited = std::collections::HashSet::new();
    let mut frontier = vec![node_id.clone()];
    let mut affected = Vec::new();
    visited.insert(node_id);

    for _ in 0..depth {
        let mut next_frontier = Vec::new();
        for id in &frontier {
            let (_outgoing, incoming) = ctx.storage.get_edges_for_node(id).map_err(|e| e.to_string())?;
            for edge in incoming {
                if visited.insert(edge.from_node.clone()) {
                    affected.push(edge.from_node.clone());
                    next_frontier.push(edge.from_node);
                }
            }
        }
        if next_frontier.is_empty() {
            break;
        }
        frontier = next_frontier;
    }

    Ok(json!({"affectedNodeIds": affected}))
}

enum Direction {
    Inbound,
    Outbound,
}

async fn walk_edges(
    ctx: &EngineContext,
    args: Option<Value>,
    edge_type: &str,
    direction: Direction,
) -> Result<Value, String> {
    let args = args.ok_or("missing arguments")?;
    let node_id = require_str(&args, "nodeId")?.to_string();
    let depth = args.get("depth").and_then(|v| v.as_u64()).unwrap_or(2) as usize;

    let mut visited = std::collections::HashSet::new();
    let mut frontier = vec![node_id.clone()];
    let mut reached = Vec::new();
    visited.insert(node_id);

    for _ in 0..depth.max(1) {
        let mut next_frontier = Vec::new();
        for id in &frontier {
            let (outgoing, incoming) = ctx.storage.get_edges_for_node(id).map_err(|e| e.to_string())?;
            let edges = match direction {
                Direction::Outbound => outgoing,
                Direction::Inbound => incoming,
            };
            for edge in edges {
                if edge.edge_type.as_str() != edge_type {
                    continue;
                }
                let next_id = match direction {
                    Direction::Outbound => edge.to_node.clone(),
                    Direction::Inbound => edge.from_node.clone(),
                };
                if visited.insert(next_id.clone()) {
                    reached.push(next_id.clone());
                    next_frontier.push(next_id);
                }
            }
        }
        if next_frontier.is_empty() {
            break;
        }
        frontier = next_frontier;
    }

    Ok(json!({"nodeIds": reached}))
}

pub fn schema_summarize() -> Value {
    json!({
        "name": "summarize_code",
        "description": "Re-runs heuristic summary generation for a node from its file's current content.",
        "inputSchema": {
            "type": "object",
            "properties": {"nodeId": {"type": "string"}},
            "required": ["nodeId"]
        }
    })
}

#[cfg(feature = "codegraph")]
pub async fn execute_summarize(ctx: &EngineContext, args: Option<Value>) -> Result<Value, String> {
    let args = args.ok_or("missing arguments")?;
    let node_id = require_str(&args, "nodeId")?;

    let mut node = ctx.storage.get_code_node(node_id).map_err(|e| e.to_string())?;
    let file_path = ctx.paths.root.join(&node.file_path);
    let content = std::fs::read_to_string(&file_path).map_err(|e| e.to_string())?;

    rcae_core::codegraph::summarize(&mut node, &content);
    ctx.storage
        .update_node_summary(
            &node.id,
            node.summary.as_deref().unwrap_or_default(),
            node.summary_confidence,
        )
        .map_err(|e| e.to_string())?;

    Ok(json!({
        "id": node.id,
        "summary": node.summary,
        "confidence": node.summary_confidence,
    }))
}

#[cfg(not(feature = "codegraph"))]
pub async fn execute_summarize(_ctx: &EngineContext, _args: Option<Value>) -> Result<Value, String> {
    Err(FEATURE_DISABLED.to_string())
}

pub fn schema_unsummarized() -> Value {
    json!({
        "name": "get_unsummarized",
        "description": "Lists code nodes still missing a summary, for batching through an external summarizer.",
        "inputSchema": {
            "type": "object",
            "properties": {"limit": {"type": "integer", "minimum": 1, "default": 50}}
        }
    })
}

pub async fn execute_unsummarized(ctx: &EngineContext, args: Option<Value>) -> Result<Value, String> {
    let limit = args
        .as_ref()
        .and_then(|a| a.get("limit"))
        .and_then(|v| v.as_u64())
        .unwrap_or(50) as u32;
    let nodes = ctx.storage.get_unsummarized_nodes(limit).map_err(|e| e.to_string())?;
    serde_json::to_value(&nodes).map_err(|e| e.to_string())
}

pub fn schema_batch_update_summaries() -> Value {
    json!({
        "name": "batch_update_summaries",
        "description": "Applies a batch of externally-generated summaries to code nodes.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "string"},
                            "summary": {"type": "string"},
                            "confidence": {"type": "number"}
                        },
                        "required": ["id", "summary", "confidence"]
                    }
                }
            },
            "required": ["items"]
        }
    })
}

pub async fn execute_batch_update_summaries(ctx: &EngineContext, args: Option<Value>) -> Result<Value, String> {
    let args = args.ok_or("missing arguments")?;
    let items = args
        .get("items")
        .and_then(|v| v.as_array())
        .ok_or("missing required argument `items`")?;

    let mut updated = 0u32;
    let mut failed = Vec::new();
    for item in items {
        let id = item.get("id").and_then(|v| v.as_str());
        let summary = item.get("summary").and_then(|v| v.as_str());
        let confidence = item.get("confidence").and_then(|v| v.as_f64());
        let (Some(id), Some(summary), Some(confidence)) = (id, summary, confidence) else {
            failed.push(item.clone());
            continue;
        };
        match ctx.storage.update_node_summary(id, summary, confidence as f32) {
            Ok(()) => updated += 1,
            Err(_) => failed.push(item.clone()),
        }
    }

    Ok(json!({"updated": updated, "failed": failed}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_unsummarized_on_empty_project_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = EngineContext::open(dir.path()).unwrap();
        let result = execute_unsummarized(&ctx, None).await.unwrap();
        assert!(result.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_update_summaries_reports_malformed_items_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = EngineContext::open(dir.path()).unwrap();
        let result = execute_batch_update_summaries(
            &ctx,
            Some(json!({"items": [{"id": "missing-node", "summary": "s", "confidence": 0.5}]})),
        )
        .await
        .unwrap();
        assert_eq!(result["updated"], 0);
        assert_eq!(result["failed"].as_array().unwrap().len(), 1);
    }
}
