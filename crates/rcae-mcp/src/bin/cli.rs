//! RCAE CLI
//!
//! Command-line interface for driving the retrieval and context assembly
//! engine without an MCP client: scan a repository, build the entity graph,
//! assemble a context pack, or inspect project stats directly from a shell.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use rcae_mcp::context::{default_project_root, EngineContext};

/// rcae - Retrieval & Context Assembly Engine CLI
#[derive(Parser)]
#[command(name = "rcae")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CLI for the RCAE retrieval and context assembly engine")]
struct Cli {
    /// Project root (defaults to RCAE_PROJECT_ROOT or the current directory)
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the repository and update the code graph
    Scan {
        /// Root to scan, relative to the project (defaults to the project root)
        #[arg(long)]
        root: Option<PathBuf>,
        /// Skip embedding newly discovered/changed symbols
        #[arg(long)]
        no_embed: bool,
    },

    /// Extract entities/relationships from memories and rebuild communities
    GraphragBuild {
        /// Rebuild the whole graph instead of only touched memories
        #[arg(long)]
        reindex_all: bool,
    },

    /// Assemble a token-bounded context pack for a query
    Assemble {
        /// The query text
        query: String,
        /// Total token budget for the assembled pack
        #[arg(long, default_value = "8000")]
        budget: usize,
    },

    /// Record a memory (note, decision, fact, ...)
    Remember {
        /// Memory title
        title: String,
        /// Memory content
        content: String,
        /// Memory type
        #[arg(long, default_value = "note")]
        memory_type: String,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },

    /// List recorded memories
    ListMemories {
        #[arg(long, default_value = "50")]
        limit: u32,
    },

    /// Show project statistics: memory/entity/community/report counts
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let project_root = cli.project.unwrap_or_else(default_project_root);
    let ctx = EngineContext::open(&project_root)?;

    match cli.command {
        Commands::Scan { root, no_embed } => run_scan(&ctx, root, !no_embed).await,
        Commands::GraphragBuild { reindex_all } => run_graphrag_build(&ctx, reindex_all).await,
        Commands::Assemble { query, budget } => run_assemble(&ctx, query, budget).await,
        Commands::Remember {
            title,
            content,
            memory_type,
            tags,
        } => run_remember(&ctx, title, content, memory_type, tags).await,
        Commands::ListMemories { limit } => run_list_memories(&ctx, limit).await,
        Commands::Stats => run_stats(&ctx).await,
    }
}

async fn run_scan(ctx: &EngineContext, root: Option<PathBuf>, embed: bool) -> anyhow::Result<()> {
    let mut args = serde_json::json!({"embed": embed});
    if let Some(root) = root {
        args["root"] = serde_json::Value::String(root.display().to_string());
    }

    let result = rcae_mcp::tools::codegraph::execute_scan(ctx, Some(args))
        .await
        .map_err(anyhow::Error::msg)?;

    println!("{}", "=== Code Graph Scan ===".cyan().bold());
    println!("{}: {}", "Added".green(), result["added"]);
    println!("{}: {}", "Updated".yellow(), result["updated"]);
    println!("{}: {}", "Deleted".red(), result["deleted"]);
    println!("{}: {}", "Unchanged".dimmed(), result["unchanged"]);
    Ok(())
}

async fn run_graphrag_build(ctx: &EngineContext, reindex_all: bool) -> anyhow::Result<()> {
    let args = serde_json::json!({"reindexAll": reindex_all});
    let result = rcae_mcp::tools::graphrag::execute_build(ctx, Some(args))
        .await
        .map_err(anyhow::Error::msg)?;

    println!("{}", "=== GraphRAG Build ===".cyan().bold());
    if result["noOp"].as_bool().unwrap_or(false) {
        println!("{}", "No new or changed memories to process.".dimmed());
        return Ok(());
    }
    println!("{}: {}", "Entities processed".white().bold(), result["entitiesProcessed"]);
    println!("{}: {}", "Relationships created".white().bold(), result["relationshipsCreated"]);
    println!("{}: {}", "Communities built".white().bold(), result["communitiesBuilt"]);
    println!("{}: {}", "Reports generated".white().bold(), result["reportsGenerated"]);
    Ok(())
}

async fn run_assemble(ctx: &EngineContext, query: String, budget: usize) -> anyhow::Result<()> {
    let args = serde_json::json!({"query": query, "tokenBudget": budget});
    let result = rcae_mcp::tools::context::execute(ctx, Some(args))
        .await
        .map_err(anyhow::Error::msg)?;

    println!("{}", "=== Assembled Context ===".cyan().bold());
    println!(
        "{}: {} / {}",
        "Tokens used".white().bold(),
        result["tokensUsed"],
        budget
    );
    println!("{}: {}", "Evidence items".white().bold(), result["evidenceCount"]);
    println!();
    println!("{}", result["text"].as_str().unwrap_or_default());
    Ok(())
}

async fn run_remember(
    ctx: &EngineContext,
    title: String,
    content: String,
    memory_type: String,
    tags: Option<String>,
) -> anyhow::Result<()> {
    let tags: Vec<String> = tags
        .map(|t| t.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let args = serde_json::json!({
        "memoryType": memory_type,
        "title": title,
        "content": content,
        "tags": tags,
    });
    let result = rcae_mcp::tools::memory::execute_create(ctx, Some(args))
        .await
        .map_err(anyhow::Error::msg)?;

    println!(
        "{} {}",
        "Recorded memory".green().bold(),
        result["id"].as_str().unwrap_or_default()
    );
    Ok(())
}

async fn run_list_memories(ctx: &EngineContext, limit: u32) -> anyhow::Result<()> {
    let args = serde_json::json!({"limit": limit});
    let result = rcae_mcp::tools::memory::execute_list(ctx, Some(args))
        .await
        .map_err(anyhow::Error::msg)?;

    let memories = result.as_array().cloned().unwrap_or_default();
    println!("{}", format!("=== Memories ({}) ===", memories.len()).cyan().bold());
    for memory in memories {
        println!(
            "  {} {} — {}",
            memory["id"].as_str().unwrap_or_default().dimmed(),
            memory["memoryType"].as_str().unwrap_or_default().yellow(),
            memory["title"].as_str().unwrap_or_default()
        );
    }
    Ok(())
}

async fn run_stats(ctx: &EngineContext) -> anyhow::Result<()> {
    let status = rcae_mcp::tools::graphrag::execute_status(ctx, None)
        .await
        .map_err(anyhow::Error::msg)?;
    let memories = rcae_mcp::tools::memory::execute_list(ctx, Some(serde_json::json!({"limit": 500})))
        .await
        .map_err(anyhow::Error::msg)?;

    println!("{}", "=== RCAE Project Stats ===".cyan().bold());
    println!(
        "{}: {}",
        "Memories".white().bold(),
        memories.as_array().map(|a| a.len()).unwrap_or(0)
    );
    println!("{}: {}", "Entities".white().bold(), status["entities"]);
    println!("{}: {}", "Relationships".white().bold(), status["relationships"]);
    println!("{}: {}", "Communities".white().bold(), status["communities"]);
    println!("{}: {}", "Community reports".white().bold(), status["reports"]);
    Ok(())
}
