//! Global search: semantic search over community reports at a configured
//! hierarchy level (§4.6 global search).

use crate::capability::{Embedder, SearchFilter, VectorBackend};
use crate::model::{CommunityReport, VectorPayload};
use crate::storage::{Storage, StorageError};
use std::collections::{HashMap, HashSet};

pub const DEFAULT_LEVEL: u32 = 1;
pub const DEFAULT_LIMIT: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct GlobalSearchResult {
    pub reports: Vec<CommunityReport>,
    /// Report id -> semantic similarity score.
    pub scores: HashMap<String, f32>,
}

/// Embeds `query`, searches `graphrag_report` vectors, then narrows the
/// ranked hits down to reports for communities at `level` (falling back to
/// unfiltered ranked hits when no report matches that level exactly).
pub fn global_search(
    storage: &Storage,
    embedder: &dyn Embedder,
    vectors: &dyn VectorBackend,
    query: &str,
    level: u32,
    limit: usize,
) -> Result<GlobalSearchResult, StorageError> {
    let Some(query_vector) = embedder.embed(query) else {
        return Ok(GlobalSearchResult::default());
    };

    let level_ids: HashSet<String> = storage
        .communities_at_level(level)?
        .into_iter()
        .map(|community| community.id)
        .collect();

    let hits = vectors.search(
        &query_vector,
        limit.max(1) * 4,
        &SearchFilter {
            type_tag: Some("graphrag_report"),
            min_importance: None,
        },
    );

    let mut scored: Vec<(String, f32, bool)> = hits
        .into_iter()
        .filter_map(|hit| {
            hit.payload.as_ref().and_then(|payload| match payload {
                VectorPayload::GraphragReport {
                    report_id,
                    community_id,
                    ..
                } => Some((report_id.clone(), hit.score, level_ids.contains(community_id))),
                _ => None,
            })
        })
        .collect();

    // Prefer exact-level matches, but don't discard everything if the level
    // has no reports yet.
    scored.sort_by(|a, b| {
        b.2.cmp(&a.2)
            .then_with(|| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal))
    });
    scored.truncate(limit);

    let mut reports = Vec::with_capacity(scored.len());
    let mut scores = HashMap::new();
    let all_reports = storage.all_community_reports()?;
    let by_id: HashMap<&str, &CommunityReport> =
        all_reports.iter().map(|r| (r.id.as_str(), r)).collect();
    for (report_id, score, _) in scored {
        if let Some(report) = by_id.get(report_id.as_str()) {
            reports.push((*report).clone());
            scores.insert(report_id, score);
        }
    }

    Ok(GlobalSearchResult { reports, scores })
}
