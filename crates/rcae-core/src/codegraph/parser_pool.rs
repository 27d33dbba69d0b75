//! Thread-safe tree-sitter parser pool (§5 "CPU-heavy parsing runs on a
//! dedicated worker-thread pool fed via channel, not on the async runtime")
//!
//! `tree_sitter::Parser` is not `Send`, so each worker thread owns its own
//! parser and requests are dispatched over a channel rather than shared
//! across threads.

use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use tree_sitter::{Language, Parser, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    C,
    Cpp,
}

impl SourceLanguage {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "rs" => Some(Self::Rust),
            "py" => Some(Self::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "ts" | "tsx" => Some(Self::TypeScript),
            "go" => Some(Self::Go),
            "java" => Some(Self::Java),
            "c" | "h" => Some(Self::C),
            "cc" | "cpp" | "cxx" | "hpp" | "hh" => Some(Self::Cpp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Go => "go",
            Self::Java => "java",
            Self::C => "c",
            Self::Cpp => "cpp",
        }
    }

    fn grammar(&self) -> Language {
        match self {
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Go => tree_sitter_go::LANGUAGE.into(),
            Self::Java => tree_sitter_java::LANGUAGE.into(),
            Self::C => tree_sitter_c::LANGUAGE.into(),
            Self::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        }
    }
}

pub struct ParseRequest {
    pub language: SourceLanguage,
    pub content: String,
    pub path: PathBuf,
}

pub struct ParseResult {
    pub tree: Tree,
    pub content: String,
}

struct WorkerRequest {
    request: ParseRequest,
    response: mpsc::Sender<Option<ParseResult>>,
}

/// A pool of dedicated parser threads, one parser per thread, dispatched by
/// a shared channel.
pub struct ParserPool {
    sender: mpsc::Sender<WorkerRequest>,
}

impl ParserPool {
    pub fn new(num_workers: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<WorkerRequest>();
        let receiver = Arc::new(Mutex::new(receiver));

        for id in 0..num_workers.max(1) {
            let receiver = receiver.clone();
            std::thread::spawn(move || Self::worker_loop(id, receiver));
        }

        Self { sender }
    }

    fn worker_loop(id: usize, receiver: Arc<Mutex<mpsc::Receiver<WorkerRequest>>>) {
        tracing::debug!(worker = id, "parser worker started");
        let mut parser = Parser::new();
        loop {
            let WorkerRequest { request, response } = match receiver.lock().unwrap().recv() {
                Ok(req) => req,
                Err(_) => break,
            };
            if parser.set_language(&request.language.grammar()).is_err() {
                let _ = response.send(None);
                continue;
            }
            let parsed = parser.parse(&request.content, None).map(|tree| ParseResult {
                tree,
                content: request.content,
            });
            let _ = response.send(parsed);
        }
        tracing::debug!(worker = id, "parser worker stopped");
    }

    /// Parses synchronously, blocking the calling thread until a worker
    /// picks up the request.
    pub fn parse_blocking(&self, request: ParseRequest) -> Option<ParseResult> {
        let (tx, rx) = mpsc::channel();
        if self.sender.send(WorkerRequest { request, response: tx }).is_err() {
            return None;
        }
        rx.recv().ok().flatten()
    }

    /// Parses on the pool from an async context via `spawn_blocking`.
    pub async fn parse(&self, request: ParseRequest) -> Option<ParseResult> {
        let sender = self.sender.clone();
        tokio::task::spawn_blocking(move || {
            let (tx, rx) = mpsc::channel();
            if sender.send(WorkerRequest { request, response: tx }).is_err() {
                return None;
            }
            rx.recv().ok().flatten()
        })
        .await
        .unwrap_or(None)
    }
}

impl Clone for ParserPool {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

pub fn create_parser_pool() -> ParserPool {
    let num_workers = std::thread::available_parallelism()
        .map(|n| n.get().max(2))
        .unwrap_or(2);
    ParserPool::new(num_workers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rust_blocking() {
        let pool = create_parser_pool();
        let result = pool
            .parse_blocking(ParseRequest {
                language: SourceLanguage::Rust,
                content: "fn main() {}".to_string(),
                path: PathBuf::from("main.rs"),
            })
            .unwrap();
        assert_eq!(result.tree.root_node().kind(), "source_file");
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(SourceLanguage::from_extension("rs"), Some(SourceLanguage::Rust));
        assert_eq!(SourceLanguage::from_extension("tsx"), Some(SourceLanguage::TypeScript));
        assert_eq!(SourceLanguage::from_extension("md"), None);
    }
}
