//! Shared end-to-end test harness: one isolated project per test, wrapping
//! an [`rcae_mcp::context::EngineContext`] over a temp directory so each
//! scenario starts from a clean `.rcae/` store.

use rcae_mcp::context::EngineContext;
use std::path::Path;
use tempfile::TempDir;

pub struct TestProject {
    pub ctx: EngineContext,
    pub dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp project dir");
        let ctx = EngineContext::open(dir.path()).expect("failed to open engine context");
        Self { ctx, dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Writes a source file relative to the project root, creating parent
    /// directories as needed.
    pub fn write_file(&self, relative_path: &str, content: &str) -> std::path::PathBuf {
        let path = self.root().join(relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        std::fs::write(&path, content).expect("failed to write fixture file");
        path
    }

    pub async fn remember(&self, title: &str, content: &str) -> serde_json::Value {
        rcae_mcp::tools::memory::execute_create(
            &self.ctx,
            Some(serde_json::json!({
                "memoryType": "note",
                "title": title,
                "content": content,
            })),
        )
        .await
        .expect("create_memory failed")
    }

    pub async fn scan(&self) -> serde_json::Value {
        rcae_mcp::tools::codegraph::execute_scan(&self.ctx, None)
            .await
            .expect("scan_code failed")
    }

    pub async fn assemble(&self, query: &str, token_budget: usize) -> serde_json::Value {
        rcae_mcp::tools::context::execute(
            &self.ctx,
            Some(serde_json::json!({"query": query, "tokenBudget": token_budget})),
        )
        .await
        .expect("assemble_context failed")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}
