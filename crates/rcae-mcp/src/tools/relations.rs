//! Relation tools: manual memory linking, traversal, pending-suggestion
//! listing (§4.8). Approve/reject of auto-detected suggestions is the
//! review UI's responsibility; these tools only read and manually link.

use crate::context::EngineContext;
use rcae_core::model::RelationDetectionMethod;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};

use super::require_str;

pub fn schema_link() -> Value {
    json!({
        "name": "link_memories",
        "description": "Manually creates a relation between two memories.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "sourceId": {"type": "string"},
                "targetId": {"type": "string"},
                "relationType": {"type": "string"},
                "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0, "default": 1.0}
            },
            "required": ["sourceId", "targetId", "relationType"]
        }
    })
}

pub async fn execute_link(ctx: &EngineContext, args: Option<Value>) -> Result<Value, String> {
    let args = args.ok_or("missing arguments")?;
    let source_id = require_str(&args, "sourceId")?;
    let target_id = require_str(&args, "targetId")?;
    let relation_type = require_str(&args, "relationType")?;
    let confidence = args.get("confidence").and_then(|v| v.as_f64()).unwrap_or(1.0) as f32;

    let relation = ctx
        .storage
        .upsert_memory_relation(
            source_id,
            target_id,
            relation_type,
            confidence,
            RelationDetectionMethod::KeywordMatch,
            true,
        )
        .map_err(|e| e.to_string())?;

    serde_json::to_value(&relation).map_err(|e| e.to_string())
}

pub fn schema_get_related() -> Value {
    json!({
        "name": "get_related",
        "description": "Lists memory-memory and memory-code relations touching a memory.",
        "inputSchema": {
            "type": "object",
            "properties": {"memoryId": {"type": "string"}},
            "required": ["memoryId"]
        }
    })
}

pub async fn execute_get_related(ctx: &EngineContext, args: Option<Value>) -> Result<Value, String> {
    let args = args.ok_or("missing arguments")?;
    let memory_id = require_str(&args, "memoryId")?;

    let memory_relations = ctx
        .storage
        .memory_relations_for(memory_id)
        .map_err(|e| e.to_string())?;
    let cross_layer: Vec<_> = ctx
        .storage
        .list_cross_layer_relations()
        .map_err(|e| e.to_string())?
        .into_iter()
        .filter(|r| r.memory_id == memory_id)
        .collect();

    Ok(json!({
        "memoryRelations": memory_relations,
        "crossLayerRelations": cross_layer,
    }))
}

pub fn schema_find_path() -> Value {
    json!({
        "name": "find_path",
        "description": "Finds the shortest memory-relation path between two memories.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "fromId": {"type": "string"},
                "toId": {"type": "string"},
                "maxDepth": {"type": "integer", "minimum": 1, "default": 6}
            },
            "required": ["fromId", "toId"]
        }
    })
}

pub async fn execute_find_path(ctx: &EngineContext, args: Option<Value>) -> Result<Value, String> {
    let args = args.ok_or("missing arguments")?;
    let from_id = require_str(&args, "fromId")?.to_string();
    let to_id = require_str(&args, "toId")?.to_string();
    let max_depth = args.get("maxDepth").and_then(|v| v.as_u64()).unwrap_or(6) as usize;

    if from_id == to_id {
        return Ok(json!({"path": [from_id], "found": true}));
    }

    let mut visited: HashMap<String, String> = HashMap::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    queue.push_back((from_id.clone(), 0));
    visited.insert(from_id.clone(), from_id.clone());

    let mut found = false;
    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let relations = ctx
            .storage
            .memory_relations_for(&current)
            .map_err(|e| e.to_string())?;
        for relation in relations {
            let next = if relation.source_memory_id == current {
                relation.target_memory_id
            } else {
                relation.source_memory_id
            };
            if visited.contains_key(&next) {
                continue;
            }
            visited.insert(next.clone(), current.clone());
            if next == to_id {
                found = true;
                break;
            }
            queue.push_back((next, depth + 1));
        }
        if found {
            break;
        }
    }

    if !found {
        return Ok(json!({"path": Value::Array(vec![]), "found": false}));
    }

    let mut path = vec![to_id.clone()];
    let mut cursor = to_id;
    while cursor != from_id {
        cursor = visited.get(&cursor).cloned().unwrap_or_else(|| cursor.clone());
        path.push(cursor.clone());
        if path.len() > max_depth + 2 {
            break;
        }
    }
    path.reverse();

    Ok(json!({"path": path, "found": true}))
}

pub fn schema_delete() -> Value {
    json!({
        "name": "delete_relation",
        "description": "Deletes a memory-memory or memory-code relation by id.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "id": {"type": "string"},
                "kind": {"type": "string", "enum": ["memory", "cross_layer"]}
            },
            "required": ["id", "kind"]
        }
    })
}

pub async fn execute_delete(ctx: &EngineContext, args: Option<Value>) -> Result<Value, String> {
    let args = args.ok_or("missing arguments")?;
    let id = require_str(&args, "id")?;
    let kind = require_str(&args, "kind")?;

    match kind {
        "memory" => ctx.storage.delete_memory_relation(id).map_err(|e| e.to_string())?,
        "cross_layer" => ctx
            .storage
            .delete_cross_layer_relation(id)
            .map_err(|e| e.to_string())?,
        other => return Err(format!("unknown relation kind `{other}`")),
    }

    Ok(json!({"deleted": id}))
}

pub fn schema_list_pending() -> Value {
    json!({
        "name": "list_pending",
        "description": "Lists auto-detected memory-memory relations awaiting review.",
        "inputSchema": {"type": "object", "properties": {}}
    })
}

pub async fn execute_list_pending(ctx: &EngineContext, _args: Option<Value>) -> Result<Value, String> {
    let pending = ctx
        .storage
        .list_pending_memory_relations()
        .map_err(|e| e.to_string())?;
    serde_json::to_value(&pending).map_err(|e| e.to_string())
}

pub fn schema_list_cross_layer_suggestions() -> Value {
    json!({
        "name": "list_cross_layer_suggestions",
        "description": "Lists detected memory-to-code relations awaiting review.",
        "inputSchema": {"type": "object", "properties": {}}
    })
}

pub async fn execute_list_cross_layer_suggestions(
    ctx: &EngineContext,
    _args: Option<Value>,
) -> Result<Value, String> {
    let relations = ctx
        .storage
        .list_cross_layer_relations()
        .map_err(|e| e.to_string())?;
    serde_json::to_value(&relations).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ctx() -> (EngineContext, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = EngineContext::open(dir.path()).unwrap();
        (ctx, dir)
    }

    async fn new_memory(ctx: &EngineContext, title: &str) -> String {
        super::super::memory::execute_create(
            ctx,
            Some(json!({"memoryType": "note", "title": title, "content": "c"})),
        )
        .await
        .unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_find_path_direct_link() {
        let (ctx, _dir) = test_ctx();
        let a = new_memory(&ctx, "a").await;
        let b = new_memory(&ctx, "b").await;
        execute_link(
            &ctx,
            Some(json!({"sourceId": a, "targetId": b, "relationType": "relates_to"})),
        )
        .await
        .unwrap();

        let result = execute_find_path(&ctx, Some(json!({"fromId": a, "toId": b}))).await.unwrap();
        assert_eq!(result["found"], true);
        assert_eq!(result["path"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_find_path_no_connection_reports_not_found() {
        let (ctx, _dir) = test_ctx();
        let a = new_memory(&ctx, "a").await;
        let b = new_memory(&ctx, "b").await;

        let result = execute_find_path(&ctx, Some(json!({"fromId": a, "toId": b}))).await.unwrap();
        assert_eq!(result["found"], false);
    }

    #[tokio::test]
    async fn test_delete_relation_removes_link() {
        let (ctx, _dir) = test_ctx();
        let a = new_memory(&ctx, "a").await;
        let b = new_memory(&ctx, "b").await;
        let relation = execute_link(
            &ctx,
            Some(json!({"sourceId": a.clone(), "targetId": b, "relationType": "relates_to"})),
        )
        .await
        .unwrap();
        let id = relation["id"].as_str().unwrap().to_string();

        execute_delete(&ctx, Some(json!({"id": id, "kind": "memory"}))).await.unwrap();
        let related = execute_get_related(&ctx, Some(json!({"memoryId": a}))).await.unwrap();
        assert!(related["memoryRelations"].as_array().unwrap().is_empty());
    }
}
