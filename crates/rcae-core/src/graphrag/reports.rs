//! Community report generation and embedding (§4.5 step 7)

use super::community::community_context;
use crate::capability::{Embedder, VectorBackend};
use crate::model::{Community, CommunityReport, VectorPayload};
use crate::storage::{Storage, StorageError};

/// Composes a title and summary from a community's entities and
/// relationships, bottom-up (caller is expected to process lowest level
/// first so higher-level reports can eventually reference child reports).
pub fn compose_report(storage: &Storage, community: &Community) -> Result<(String, String), StorageError> {
    let (entities, relationships) = community_context(storage, community)?;

    let title = if entities.is_empty() {
        format!("Community {}", community.id)
    } else {
        let mut names: Vec<&str> = entities.iter().map(|e| e.canonical_name.as_str()).collect();
        names.truncate(3);
        names.join(", ")
    };

    let mut summary = String::new();
    summary.push_str(&format!(
        "{} entities across level {}.",
        entities.len(),
        community.level
    ));
    for entity in entities.iter().take(5) {
        summary.push_str(&format!(
            " {} ({}): {}.",
            entity.canonical_name, entity.entity_type, entity.description
        ));
    }
    if !relationships.is_empty() {
        summary.push_str(&format!(" {} relationships observed.", relationships.len()));
    }

    Ok((title, summary))
}

/// Generates and persists a report for every community, embedding each
/// summary and garbage-collecting vectors for communities no longer
/// present.
pub fn generate_reports(
    storage: &Storage,
    embedder: &dyn Embedder,
    vectors: &dyn VectorBackend,
    min_size: usize,
) -> Result<Vec<CommunityReport>, StorageError> {
    let communities = storage.all_communities()?;
    let mut reports = Vec::with_capacity(communities.len());

    for community in &communities {
        if community.entity_ids.len() < min_size {
            continue;
        }
        let (title, summary) = compose_report(storage, community)?;
        let report = storage.upsert_community_report(&community.id, &title, &summary)?;

        let text = format!("{title}\n{summary}");
        if let Some(vector) = embedder.embed(&text) {
            let key = format!("graphrag_report:{}", report.id);
            let payload = VectorPayload::GraphragReport {
                report_id: report.id.clone(),
                community_id: community.id.clone(),
                title: title.clone(),
            };
            if vectors.upsert(&key, &vector, payload) {
                storage.set_report_embedding_id(&report.id, &key)?;
            }
        }
        reports.push(report);
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubEmbedder;
    impl Embedder for StubEmbedder {
        fn embed(&self, _text: &str) -> Option<Vec<f32>> {
            Some(vec![0.1, 0.2, 0.3])
        }
    }

    struct NullVectors;
    impl VectorBackend for NullVectors {
        fn upsert(&self, _key: &str, _vector: &[f32], _payload: VectorPayload) -> bool {
            true
        }
        fn search(
            &self,
            _query: &[f32],
            _limit: usize,
            _filter: &crate::capability::SearchFilter,
        ) -> Vec<crate::capability::VectorMatch> {
            Vec::new()
        }
        fn remove_by_memory_id(&self, _memory_id: &str) -> usize {
            0
        }
        fn remove_key(&self, _key: &str) -> bool {
            false
        }
    }

    #[test]
    fn test_generate_reports_persists_one_per_community() {
        let storage = Storage::open_in_memory().unwrap();
        let a = storage.create_entity("a", "A", "SERVICE", "d", 0.5).unwrap();
        storage.insert_community(0, None, &[a.id]).unwrap();

        let reports = generate_reports(&storage, &StubEmbedder, &NullVectors, 1).unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].title.contains('A'));
    }
}
