//! `assemble_context`: the Context Assembler (§4.7) entry point.

use crate::context::EngineContext;
use rcae_core::{AssembledContext, ContextBudget, ContextTemplate};
use serde_json::{json, Value};

use super::require_str;

pub fn schema() -> Value {
    json!({
        "name": "assemble_context",
        "description": "Assembles a token-bounded context pack from memories, code, and the entity/community graph for a query.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "tokenBudget": {"type": "integer", "minimum": 1, "default": 8000},
                "template": {"type": "string", "enum": ["default", "markdown", "compact"], "default": "default"},
                "includeCode": {"type": "boolean", "default": true},
                "includeGraph": {"type": "boolean", "default": true}
            },
            "required": ["query"]
        }
    })
}

pub async fn execute(ctx: &EngineContext, args: Option<Value>) -> Result<Value, String> {
    let args = args.ok_or("missing arguments")?;
    let query = require_str(&args, "query")?;
    let total_tokens = args
        .get("tokenBudget")
        .and_then(|v| v.as_u64())
        .unwrap_or(ctx.config.context_token_budget as u64) as usize;

    let template = match args.get("template").and_then(|v| v.as_str()) {
        Some("markdown") => ContextTemplate::Markdown,
        Some("compact") => ContextTemplate::Compact,
        _ => ContextTemplate::Default,
    };
    let options = rcae_core::assembler::AssembleOptions {
        include_code: args.get("includeCode").and_then(|v| v.as_bool()).unwrap_or(true),
        include_graph: args.get("includeGraph").and_then(|v| v.as_bool()).unwrap_or(true),
    };

    let budget = ContextBudget::from_fractions(total_tokens, ctx.config.budget);
    let assembled: AssembledContext = ctx
        .assembler
        .assemble(query, budget, template, options)
        .map_err(|e| e.to_string())?;

    Ok(json!({
        "query": assembled.query,
        "text": assembled.text,
        "tokensUsed": assembled.tokens_used,
        "evidenceCount": assembled.evidence.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_assemble_context_empty_project_returns_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = EngineContext::open(dir.path()).unwrap();
        let result = execute(&ctx, Some(json!({"query": "anything"}))).await.unwrap();
        assert_eq!(result["evidenceCount"], 0);
    }
}
