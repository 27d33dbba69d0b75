//! RCAE MCP Server
//!
//! Exposes a project-local retrieval and context assembly engine over the
//! Model Context Protocol: a symbolic code graph, a semantic vector index,
//! and a community-clustered entity graph, fused by a hybrid retriever into
//! token-bounded context packs.
//!
//! Core modules:
//! - Storage & schema (SQLite, one `.rcae/rcae.db` per project)
//! - Code graph: tree-sitter parsing, incremental scanning, file watching
//! - Chunker & tokenizer for memory and code text
//! - Vector index (HNSW via usearch) and local embeddings
//! - GraphRAG: entity/relationship extraction, community detection, reports
//! - Hybrid retriever: local/global/drift search, weighted RRF fusion
//! - Context assembler: budget-capped context pack assembly
//! - Relation detectors: memory-memory and memory-code cross-linking

use rcae_mcp::context::{default_project_root, EngineContext};
use rcae_mcp::protocol::stdio::StdioTransport;
use rcae_mcp::server::McpServer;
use std::io;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

struct Args {
    data_dir: Option<PathBuf>,
    http_port: Option<u16>,
}

/// Parse command-line arguments.
/// Exits the process if `--help` or `--version` is requested.
fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut data_dir: Option<PathBuf> = None;
    let mut http_port: Option<u16> = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!("rcae-mcp {}", env!("CARGO_PKG_VERSION"));
                println!();
                println!("Project-local retrieval and context assembly engine, exposed over MCP.");
                println!();
                println!("USAGE:");
                println!("    rcae-mcp [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help              Print help information");
                println!("    -V, --version           Print version information");
                println!("    --data-dir <PATH>       Project root (defaults to RCAE_PROJECT_ROOT or cwd)");
                println!("    --http <PORT>           Serve over HTTP instead of stdio");
                println!();
                println!("ENVIRONMENT:");
                println!("    RUST_LOG                Log level filter (e.g., debug, info, warn, error)");
                println!("    RCAE_PROJECT_ROOT       Project root when --data-dir is not given");
                println!();
                println!("EXAMPLES:");
                println!("    rcae-mcp");
                println!("    rcae-mcp --data-dir /path/to/project");
                println!("    RUST_LOG=debug rcae-mcp");
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("rcae-mcp {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--data-dir" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --data-dir requires a path argument");
                    eprintln!("Usage: rcae-mcp --data-dir <PATH>");
                    std::process::exit(1);
                }
                data_dir = Some(PathBuf::from(&args[i]));
            }
            arg if arg.starts_with("--data-dir=") => {
                let path = arg.strip_prefix("--data-dir=").unwrap_or("");
                if path.is_empty() {
                    eprintln!("error: --data-dir requires a path argument");
                    eprintln!("Usage: rcae-mcp --data-dir <PATH>");
                    std::process::exit(1);
                }
                data_dir = Some(PathBuf::from(path));
            }
            "--http" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --http requires a port argument");
                    std::process::exit(1);
                }
                http_port = match args[i].parse() {
                    Ok(port) => Some(port),
                    Err(_) => {
                        eprintln!("error: --http port must be a number, got '{}'", args[i]);
                        std::process::exit(1);
                    }
                };
            }
            arg if arg.starts_with("--http=") => {
                let port = arg.strip_prefix("--http=").unwrap_or("");
                http_port = match port.parse() {
                    Ok(port) => Some(port),
                    Err(_) => {
                        eprintln!("error: --http port must be a number, got '{}'", port);
                        std::process::exit(1);
                    }
                };
            }
            arg => {
                eprintln!("error: unknown argument '{}'", arg);
                eprintln!("Usage: rcae-mcp [OPTIONS]");
                eprintln!("Try 'rcae-mcp --help' for more information.");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    Args { data_dir, http_port }
}

#[tokio::main]
async fn main() {
    let args = parse_args();
    let project_root = args.data_dir.unwrap_or_else(default_project_root);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    info!("rcae-mcp v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(project_root = %project_root.display(), "opening project");

    let context = match EngineContext::open(&project_root) {
        Ok(ctx) => {
            info!("engine context ready");
            ctx
        }
        Err(e) => {
            error!("failed to open project: {}", e);
            std::process::exit(1);
        }
    };

    #[cfg(feature = "http")]
    if let Some(port) = args.http_port {
        use rcae_mcp::protocol::http::{HttpTransport, HttpTransportConfig};
        let transport = HttpTransport::new(HttpTransportConfig {
            port,
            ..HttpTransportConfig::default()
        });
        info!(port, "starting MCP server on HTTP...");
        if let Err(e) = transport.run(context).await {
            error!("server error: {}", e);
            std::process::exit(1);
        }
        info!("rcae-mcp shutting down");
        return;
    }
    #[cfg(not(feature = "http"))]
    if args.http_port.is_some() {
        error!("--http requires the `http` feature");
        std::process::exit(1);
    }

    let server = McpServer::new(context);
    let transport = StdioTransport::new();

    info!("starting MCP server on stdio...");
    if let Err(e) = transport.run(server).await {
        error!("server error: {}", e);
        std::process::exit(1);
    }

    info!("rcae-mcp shutting down");
}
