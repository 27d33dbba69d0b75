//! GraphRAG tools: `graphrag_build`, `graphrag_search`, `graphrag_status`.

use crate::context::EngineContext;
use rcae_core::GraphragBuildOptions;
use serde_json::{json, Value};

use super::require_str;

pub fn schema_build() -> Value {
    json!({
        "name": "graphrag_build",
        "description": "Extracts entities/relationships from memories, then rebuilds communities and community reports.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "memoryIds": {"type": "array", "items": {"type": "string"}},
                "reindexAll": {"type": "boolean", "default": false}
            }
        }
    })
}

pub async fn execute_build(ctx: &EngineContext, args: Option<Value>) -> Result<Value, String> {
    let memory_ids = args
        .as_ref()
        .and_then(|a| a.get("memoryIds"))
        .and_then(|v| v.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect());
    let reindex_all = args
        .as_ref()
        .and_then(|a| a.get("reindexAll"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let result = ctx
        .graphrag
        .build(&GraphragBuildOptions {
            memory_ids,
            reindex_all,
        })
        .map_err(|e| e.to_string())?;

    Ok(json!({
        "entitiesProcessed": result.entities_processed,
        "relationshipsCreated": result.relationships_created,
        "communitiesBuilt": result.communities_built,
        "reportsGenerated": result.reports_generated,
        "noOp": result.no_op,
    }))
}

pub fn schema_search() -> Value {
    json!({
        "name": "graphrag_search",
        "description": "Searches the entity/community graph: local (entity neighborhood), global (community reports), or drift (iterative local+global).",
        "inputSchema": {
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "mode": {"type": "string", "enum": ["local", "global", "drift"], "default": "local"}
            },
            "required": ["query"]
        }
    })
}

pub async fn execute_search(ctx: &EngineContext, args: Option<Value>) -> Result<Value, String> {
    let args = args.ok_or("missing arguments")?;
    let query = require_str(&args, "query")?;
    let mode = args.get("mode").and_then(|v| v.as_str()).unwrap_or("local");

    match mode {
        "global" => {
            let result = ctx.retriever.global_search(query).map_err(|e| e.to_string())?;
            Ok(json!({
                "mode": "global",
                "reports": result.reports.iter().map(|r| json!({
                    "id": r.id, "title": r.title, "summary": r.summary,
                    "score": result.scores.get(&r.id).copied().unwrap_or(0.0),
                })).collect::<Vec<_>>(),
            }))
        }
        "drift" => {
            let result = ctx.retriever.drift_search(query).map_err(|e| e.to_string())?;
            let final_result = result.final_result();
            Ok(json!({
                "mode": "drift",
                "entities": final_result.entities.iter().map(|e| json!({
                    "id": e.id, "canonicalName": e.canonical_name,
                    "score": final_result.scores.get(&e.id).copied().unwrap_or(0.0),
                })).collect::<Vec<_>>(),
                "iterationCount": result.iterations.len(),
                "converged": result.converged,
            }))
        }
        _ => {
            let result = ctx.retriever.local_search(query).map_err(|e| e.to_string())?;
            Ok(json!({
                "mode": "local",
                "entities": result.entities.iter().map(|e| json!({
                    "id": e.id, "canonicalName": e.canonical_name, "entityType": e.entity_type,
                    "score": result.scores.get(&e.id).copied().unwrap_or(0.0),
                })).collect::<Vec<_>>(),
            }))
        }
    }
}

pub fn schema_status() -> Value {
    json!({
        "name": "graphrag_status",
        "description": "Reports entity/relationship/community/report counts in the graph.",
        "inputSchema": {"type": "object", "properties": {}}
    })
}

pub async fn execute_status(ctx: &EngineContext, _args: Option<Value>) -> Result<Value, String> {
    let entities = ctx.storage.all_entities().map_err(|e| e.to_string())?;
    let communities = ctx.storage.all_communities().map_err(|e| e.to_string())?;
    let reports = ctx.storage.all_community_reports().map_err(|e| e.to_string())?;
    let relationships = ctx
        .storage
        .relationships_above_threshold(0.0)
        .map_err(|e| e.to_string())?;

    Ok(json!({
        "entities": entities.len(),
        "relationships": relationships.len(),
        "communities": communities.len(),
        "reports": reports.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_on_empty_project_is_all_zero() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = EngineContext::open(dir.path()).unwrap();
        let status = execute_status(&ctx, None).await.unwrap();
        assert_eq!(status["entities"], 0);
        assert_eq!(status["communities"], 0);
    }

    #[tokio::test]
    async fn test_build_then_status_reflects_extracted_entities() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = EngineContext::open(dir.path()).unwrap();
        ctx.storage
            .create_memory(rcae_core::MemoryInput {
                memory_type: "note".into(),
                title: "note".into(),
                content: "`Redis` caches results for `OrderService`.".into(),
                tags: Vec::new(),
                related_files: Vec::new(),
                importance: 0.5,
            })
            .unwrap();

        execute_build(&ctx, None).await.unwrap();
        let status = execute_status(&ctx, None).await.unwrap();
        assert!(status["entities"].as_u64().unwrap() >= 2);
    }
}
