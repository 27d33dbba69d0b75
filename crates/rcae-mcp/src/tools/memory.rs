//! Memory CRUD tools: `create_memory`, `get_memory`, `update_memory`,
//! `delete_memory`, `list_memories`.

use crate::context::EngineContext;
use rcae_core::model::VectorPayload;
use rcae_core::MemoryInput;
use serde_json::{json, Value};

use super::require_str;

pub fn schema_create() -> Value {
    json!({
        "name": "create_memory",
        "description": "Stores a new memory and embeds it for retrieval.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "memoryType": {"type": "string"},
                "title": {"type": "string"},
                "content": {"type": "string"},
                "tags": {"type": "array", "items": {"type": "string"}},
                "relatedFiles": {"type": "array", "items": {"type": "string"}},
                "importance": {"type": "number", "minimum": 0.0, "maximum": 1.0}
            },
            "required": ["memoryType", "title", "content"]
        }
    })
}

pub async fn execute_create(ctx: &EngineContext, args: Option<Value>) -> Result<Value, String> {
    let args = args.ok_or("missing arguments")?;
    let input = MemoryInput {
        memory_type: require_str(&args, "memoryType")?.to_string(),
        title: require_str(&args, "title")?.to_string(),
        content: require_str(&args, "content")?.to_string(),
        tags: string_array(&args, "tags"),
        related_files: string_array(&args, "relatedFiles"),
        importance: args.get("importance").and_then(|v| v.as_f64()).unwrap_or(0.5),
    };

    let memory = ctx.storage.create_memory(input).map_err(|e| e.to_string())?;
    embed_and_upsert(ctx, &memory);

    Ok(json!({
        "id": memory.id,
        "memoryType": memory.memory_type,
        "title": memory.title,
        "createdAt": memory.created_at.to_rfc3339(),
    }))
}

fn embed_and_upsert(ctx: &EngineContext, memory: &rcae_core::model::Memory) {
    let Some(vector) = ctx.embedder.embed(&format!("{}\n{}", memory.title, memory.content)) else {
        return;
    };
    ctx.vectors.upsert(
        &memory.qdrant_id,
        &vector,
        VectorPayload::Memory {
            memory_id: memory.id.clone(),
            title: memory.title.clone(),
            tags: memory.tags.clone(),
            related_files: memory.related_files.clone(),
            importance: memory.importance,
        },
    );
}

fn string_array(args: &Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(|v| v.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default()
}

pub fn schema_get() -> Value {
    json!({
        "name": "get_memory",
        "description": "Fetches a memory by id.",
        "inputSchema": {
            "type": "object",
            "properties": {"id": {"type": "string"}},
            "required": ["id"]
        }
    })
}

pub async fn execute_get(ctx: &EngineContext, args: Option<Value>) -> Result<Value, String> {
    let args = args.ok_or("missing arguments")?;
    let id = require_str(&args, "id")?;
    let memory = ctx.storage.get_memory(id).map_err(|e| e.to_string())?;
    serde_json::to_value(&memory).map_err(|e| e.to_string())
}

pub fn schema_update() -> Value {
    json!({
        "name": "update_memory",
        "description": "Updates an existing memory, re-embedding when title or content changes.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "id": {"type": "string"},
                "title": {"type": "string"},
                "content": {"type": "string"},
                "tags": {"type": "array", "items": {"type": "string"}},
                "relatedFiles": {"type": "array", "items": {"type": "string"}},
                "importance": {"type": "number", "minimum": 0.0, "maximum": 1.0}
            },
            "required": ["id"]
        }
    })
}

pub async fn execute_update(ctx: &EngineContext, args: Option<Value>) -> Result<Value, String> {
    let args = args.ok_or("missing arguments")?;
    let id = require_str(&args, "id")?;
    let title = args.get("title").and_then(|v| v.as_str()).map(String::from);
    let content = args.get("content").and_then(|v| v.as_str()).map(String::from);
    let tags = args.get("tags").map(|_| string_array(&args, "tags"));
    let related_files = args.get("relatedFiles").map(|_| string_array(&args, "relatedFiles"));
    let importance = args.get("importance").and_then(|v| v.as_f64());

    let (memory, needs_reembed) = ctx
        .storage
        .update_memory(id, title, content, tags, related_files, importance)
        .map_err(|e| e.to_string())?;

    if needs_reembed {
        ctx.vectors.remove_by_memory_id(&memory.id);
        embed_and_upsert(ctx, &memory);
    }

    serde_json::to_value(&memory).map_err(|e| e.to_string())
}

pub fn schema_delete() -> Value {
    json!({
        "name": "delete_memory",
        "description": "Deletes a memory and its vector, entity links, and relation rows.",
        "inputSchema": {
            "type": "object",
            "properties": {"id": {"type": "string"}},
            "required": ["id"]
        }
    })
}

pub async fn execute_delete(ctx: &EngineContext, args: Option<Value>) -> Result<Value, String> {
    let args = args.ok_or("missing arguments")?;
    let id = require_str(&args, "id")?;

    ctx.storage
        .cascade_delete_memory_graph_links(id)
        .map_err(|e| e.to_string())?;
    ctx.vectors.remove_by_memory_id(id);
    ctx.storage.delete_memory(id).map_err(|e| e.to_string())?;

    Ok(json!({"deleted": id}))
}

pub fn schema_list() -> Value {
    json!({
        "name": "list_memories",
        "description": "Lists memories, most recent storage order first, paginated.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "limit": {"type": "integer", "minimum": 1, "maximum": 500, "default": 50},
                "offset": {"type": "integer", "minimum": 0, "default": 0}
            }
        }
    })
}

pub async fn execute_list(ctx: &EngineContext, args: Option<Value>) -> Result<Value, String> {
    let limit = args
        .as_ref()
        .and_then(|a| a.get("limit"))
        .and_then(|v| v.as_u64())
        .unwrap_or(50) as u32;
    let offset = args
        .as_ref()
        .and_then(|a| a.get("offset"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;

    let memories = ctx.storage.list_memories(limit, offset).map_err(|e| e.to_string())?;
    serde_json::to_value(&memories).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_context() -> (EngineContext, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = EngineContext::open(dir.path()).unwrap();
        (ctx, dir)
    }

    #[tokio::test]
    async fn test_create_then_get_roundtrip() {
        let (ctx, _dir) = test_context();
        let created = execute_create(
            &ctx,
            Some(json!({"memoryType": "note", "title": "t", "content": "c"})),
        )
        .await
        .unwrap();
        let id = created["id"].as_str().unwrap().to_string();

        let fetched = execute_get(&ctx, Some(json!({"id": id}))).await.unwrap();
        assert_eq!(fetched["title"], "t");
    }

    #[tokio::test]
    async fn test_delete_removes_memory() {
        let (ctx, _dir) = test_context();
        let created = execute_create(
            &ctx,
            Some(json!({"memoryType": "note", "title": "t", "content": "c"})),
        )
        .await
        .unwrap();
        let id = created["id"].as_str().unwrap().to_string();

        execute_delete(&ctx, Some(json!({"id": id.clone()}))).await.unwrap();
        assert!(execute_get(&ctx, Some(json!({"id": id}))).await.is_err());
    }
}
