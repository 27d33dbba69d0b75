//! Budget-capped context assembly (§4.7)
//!
//! Pulls ranked evidence from memories, code, and the entity/community
//! graph, greedily packs each into its share of the token budget, and
//! renders the result through a [`ContextTemplate`].

mod budget;
mod cache;
mod evidence;
mod template;

pub use budget::ContextBudget;
pub use cache::reset_context_cache;
pub use evidence::{Evidence, EvidenceSection};
pub use template::ContextTemplate;

use crate::capability::{Embedder, SearchFilter, VectorBackend};
use crate::model::VectorPayload;
use crate::retriever::HybridRetriever;
use crate::storage::{Storage, StorageError};
use cache::ContextCacheKey;
use std::sync::Arc;

/// Which optional sections to populate; memories are always fetched.
#[derive(Debug, Clone, Copy)]
pub struct AssembleOptions {
    pub include_code: bool,
    pub include_graph: bool,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            include_code: true,
            include_graph: true,
        }
    }
}

/// The packed, rendered result of [`ContextAssembler::assemble`].
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub query: String,
    pub text: String,
    pub evidence: Vec<Evidence>,
    pub budget: ContextBudget,
    pub template: ContextTemplate,
    pub tokens_used: usize,
}

/// Builds token-bounded context packs from memories, code, and the
/// entity/community graph (§4.7).
pub struct ContextAssembler {
    storage: Arc<Storage>,
    embedder: Arc<dyn Embedder>,
    vectors: Arc<dyn VectorBackend>,
    retriever: HybridRetriever,
}

impl ContextAssembler {
    pub fn new(storage: Arc<Storage>, embedder: Arc<dyn Embedder>, vectors: Arc<dyn VectorBackend>) -> Self {
        let retriever = HybridRetriever::new(storage.clone(), embedder.clone(), vectors.clone());
        Self {
            storage,
            embedder,
            vectors,
            retriever,
        }
    }

    /// Runs the §4.7 pipeline: embed once, fetch candidate evidence per
    /// section, score-blend, greedily pack each section's share of the
    /// budget, and render through `template`. Cached by
    /// `(query, budget, template, options)`.
    pub fn assemble(
        &self,
        query: &str,
        budget: ContextBudget,
        template: ContextTemplate,
        options: AssembleOptions,
    ) -> Result<AssembledContext, StorageError> {
        let cache_key = ContextCacheKey::new(query, budget, template, options.include_code, options.include_graph);
        if let Some(cached) = cache::get_cached(cache_key) {
            return Ok(cached);
        }

        let mut evidence = Vec::new();
        evidence.extend(self.fetch_memories(query)?);
        if options.include_code {
            evidence.extend(self.fetch_code(query)?);
        }
        if options.include_graph {
            evidence.extend(self.fetch_graph(query)?);
            evidence.extend(self.fetch_reports(query)?);
        }

        let packed = pack_by_section(evidence, budget);
        let tokens_used = packed.iter().map(|e| e.tokens).sum();
        let text = template::render(template, &packed);

        let result = AssembledContext {
            query: query.to_string(),
            text,
            evidence: packed,
            budget,
            template,
            tokens_used,
        };
        cache::put_cached(cache_key, result.clone());
        Ok(result)
    }

    fn fetch_memories(&self, query: &str) -> Result<Vec<Evidence>, StorageError> {
        let Some(vector) = self.embedder.embed(query) else {
            return Ok(Vec::new());
        };
        let hits = self.vectors.search(
            &vector,
            64,
            &SearchFilter {
                type_tag: Some("memory"),
                min_importance: None,
            },
        );
        let mut evidence = Vec::new();
        let mut seen_ids: std::collections::HashSet<String> = std::collections::HashSet::new();
        for hit in hits {
            let Some(VectorPayload::Memory {
                memory_id,
                importance,
                ..
            }) = hit.payload
            else {
                continue;
            };
            let Ok(memory) = self.storage.get_memory(&memory_id) else {
                continue;
            };
            let score = hit.score * (1.0 + (importance as f32) * 0.2);
            seen_ids.insert(memory.id.clone());
            evidence.push(Evidence::new(
                EvidenceSection::Memories,
                memory.id.clone(),
                memory.title.clone(),
                memory.content.clone(),
                score,
            ));
        }

        // Pull in memories directly linked to a vector hit even when the link
        // target doesn't itself score well against the query text — the link
        // is evidence of relevance in its own right (§8 scenario 3).
        let directly_matched: Vec<String> = seen_ids.iter().cloned().collect();
        for memory_id in directly_matched {
            for relation in self.storage.memory_relations_for(&memory_id)? {
                let linked_id = if relation.source_memory_id == memory_id {
                    relation.target_memory_id
                } else {
                    relation.source_memory_id
                };
                if seen_ids.contains(&linked_id) {
                    continue;
                }
                let Ok(memory) = self.storage.get_memory(&linked_id) else {
                    continue;
                };
                seen_ids.insert(memory.id.clone());
                evidence.push(Evidence::new(
                    EvidenceSection::Memories,
                    memory.id.clone(),
                    memory.title.clone(),
                    memory.content.clone(),
                    relation.confidence,
                ));
            }
        }
        Ok(evidence)
    }

    fn fetch_code(&self, query: &str) -> Result<Vec<Evidence>, StorageError> {
        let Some(vector) = self.embedder.embed(query) else {
            return Ok(Vec::new());
        };
        let hits = self.vectors.search(
            &vector,
            64,
            &SearchFilter {
                type_tag: Some("code_unit"),
                min_importance: None,
            },
        );
        let mut evidence = Vec::new();
        for hit in hits {
            let Some(VectorPayload::CodeUnit { node_id, .. }) = hit.payload else {
                continue;
            };
            let Ok(node) = self.storage.get_code_node(&node_id) else {
                continue;
            };
            let text = node
                .summary
                .clone()
                .or_else(|| node.signature.clone())
                .unwrap_or_else(|| node.name.clone());
            evidence.push(Evidence::new(
                EvidenceSection::Code,
                node.id.clone(),
                format!("{} ({})", node.name, node.file_path),
                text,
                hit.score,
            ));
        }
        Ok(evidence)
    }

    fn fetch_graph(&self, query: &str) -> Result<Vec<Evidence>, StorageError> {
        let local = self.retriever.local_search(query)?;
        let evidence = local
            .entities
            .into_iter()
            .map(|entity| {
                let score = local.scores.get(&entity.id).copied().unwrap_or(0.0);
                let boost = 1.0 + (entity.mention_count as f32).ln_1p() * 0.1;
                Evidence::new(
                    EvidenceSection::Graph,
                    entity.id.clone(),
                    entity.canonical_name.clone(),
                    format!("{} ({}): {}", entity.canonical_name, entity.entity_type, entity.description),
                    score * boost,
                )
            })
            .collect();
        Ok(evidence)
    }

    fn fetch_reports(&self, query: &str) -> Result<Vec<Evidence>, StorageError> {
        let global = self.retriever.global_search(query)?;
        let evidence = global
            .reports
            .into_iter()
            .map(|report| {
                let score = global.scores.get(&report.id).copied().unwrap_or(0.0);
                Evidence::new(
                    EvidenceSection::Reports,
                    report.id.clone(),
                    report.title.clone(),
                    report.summary.clone(),
                    score,
                )
            })
            .collect();
        Ok(evidence)
    }
}

/// Greedily packs each section's ranked evidence into its share of the
/// budget: highest score first, skipping (not stopping on) items that would
/// overflow the remaining section budget so smaller lower-ranked items still
/// get a chance to fit. A second pass then promotes any section's unused
/// allocation into a shared pool that the other sections can spend on items
/// that didn't fit their own share (§4.7 step 4).
fn pack_by_section(mut evidence: Vec<Evidence>, budget: ContextBudget) -> Vec<Evidence> {
    evidence.sort_by(|a, b| {
        section_order(a.section)
            .cmp(&section_order(b.section))
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.id.cmp(&b.id))
    });

    let sections = [
        EvidenceSection::Memories,
        EvidenceSection::Code,
        EvidenceSection::Graph,
        EvidenceSection::Reports,
    ];

    let mut packed: Vec<Evidence> = Vec::new();
    let mut packed_ids: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut leftover = 0usize;

    for section in sections {
        let section_budget = tokens_for_section(budget, section);
        let mut used = 0usize;
        for item in evidence.iter().filter(|e| e.section == section) {
            if used + item.tokens > section_budget {
                continue;
            }
            used += item.tokens;
            packed_ids.insert(item.id.clone());
            packed.push(item.clone());
        }
        leftover += section_budget.saturating_sub(used);
    }

    if leftover > 0 {
        for section in sections {
            for item in evidence.iter().filter(|e| e.section == section) {
                if packed_ids.contains(&item.id) {
                    continue;
                }
                if item.tokens <= leftover {
                    leftover -= item.tokens;
                    packed_ids.insert(item.id.clone());
                    packed.push(item.clone());
                }
            }
        }
        packed.sort_by(|a, b| {
            section_order(a.section)
                .cmp(&section_order(b.section))
                .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| a.id.cmp(&b.id))
        });
    }

    packed
}

fn section_order(section: EvidenceSection) -> u8 {
    match section {
        EvidenceSection::Memories => 0,
        EvidenceSection::Code => 1,
        EvidenceSection::Graph => 2,
        EvidenceSection::Reports => 3,
    }
}

fn tokens_for_section(budget: ContextBudget, section: EvidenceSection) -> usize {
    match section {
        EvidenceSection::Memories => budget.memories_tokens,
        EvidenceSection::Code => budget.code_tokens,
        EvidenceSection::Graph => budget.graph_tokens,
        EvidenceSection::Reports => budget.reports_tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(section: EvidenceSection, id: &str, tokens_text: &str, score: f32) -> Evidence {
        Evidence::new(section, id, id, tokens_text, score)
    }

    #[test]
    fn test_pack_by_section_skips_oversized_then_fits_smaller() {
        let budget = ContextBudget {
            total_tokens: 10,
            memories_tokens: 5,
            code_tokens: 0,
            graph_tokens: 0,
            reports_tokens: 0,
        };
        let big_text = "word ".repeat(20);
        let evidence = vec![
            item(EvidenceSection::Memories, "big", &big_text, 0.9),
            item(EvidenceSection::Memories, "small", "ok", 0.5),
        ];
        let packed = pack_by_section(evidence, budget);
        assert_eq!(packed.len(), 1);
        assert_eq!(packed[0].id, "small");
    }

    #[test]
    fn test_assemble_with_empty_storage_returns_empty_context() {
        struct NullEmbedder;
        impl Embedder for NullEmbedder {
            fn embed(&self, _text: &str) -> Option<Vec<f32>> {
                None
            }
        }
        struct NullVectors;
        impl VectorBackend for NullVectors {
            fn upsert(&self, _key: &str, _vector: &[f32], _payload: VectorPayload) -> bool {
                true
            }
            fn search(&self, _query: &[f32], _limit: usize, _filter: &SearchFilter) -> Vec<crate::capability::VectorMatch> {
                Vec::new()
            }
            fn remove_by_memory_id(&self, _memory_id: &str) -> usize {
                0
            }
            fn remove_key(&self, _key: &str) -> bool {
                false
            }
        }

        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let assembler = ContextAssembler::new(storage, Arc::new(NullEmbedder), Arc::new(NullVectors));
        let result = assembler
            .assemble("query", ContextBudget::default(), ContextTemplate::Default, AssembleOptions::default())
            .unwrap();
        assert!(result.evidence.is_empty());
    }
}
