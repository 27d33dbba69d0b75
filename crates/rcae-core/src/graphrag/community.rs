//! Community detection over the entity/relationship graph (§4.5 step 6)
//!
//! No Leiden/Louvain implementation exists anywhere in the corpus this
//! engine is grounded on, so connected-components over the
//! strength-thresholded undirected projection is the deterministic
//! fallback used at every level (see DESIGN.md Open Question).

use crate::model::{Community, Entity, Relationship};
use crate::storage::{Storage, StorageError};
use petgraph::unionfind::UnionFind;
use std::collections::HashMap;

pub const DEFAULT_MAX_LEVEL: u32 = 3;
pub const DEFAULT_MIN_EDGE_STRENGTH: f32 = 3.0;

fn connected_components<T: Eq + std::hash::Hash + Clone>(
    nodes: &[T],
    edges: &[(T, T)],
) -> Vec<Vec<T>> {
    let index_of: HashMap<&T, usize> = nodes.iter().enumerate().map(|(i, n)| (n, i)).collect();
    let mut uf = UnionFind::new(nodes.len());
    for (a, b) in edges {
        if let (Some(&ia), Some(&ib)) = (index_of.get(a), index_of.get(b)) {
            uf.union(ia, ib);
        }
    }
    let labels = uf.into_labeling();
    let mut groups: HashMap<usize, Vec<T>> = HashMap::new();
    for (i, node) in nodes.iter().enumerate() {
        groups.entry(labels[i]).or_default().push(node.clone());
    }
    groups.into_values().collect()
}

/// Clears and rebuilds the community hierarchy from entities and
/// relationships currently persisted, returning the number of levels built.
pub fn rebuild_communities(
    storage: &Storage,
    max_level: u32,
    min_edge_strength: f32,
) -> Result<u32, StorageError> {
    storage.clear_communities()?;

    let entities = storage.all_entities()?;
    if entities.is_empty() {
        return Ok(0);
    }
    let relationships = storage.relationships_above_threshold(min_edge_strength)?;

    let entity_ids: Vec<String> = entities.iter().map(|e| e.id.clone()).collect();
    let edges: Vec<(String, String)> = relationships
        .iter()
        .map(|r| (r.source_entity_id.clone(), r.target_entity_id.clone()))
        .collect();

    let level0_groups = connected_components(&entity_ids, &edges);
    let mut level0_ids = Vec::new();
    for group in &level0_groups {
        let community = storage.insert_community(0, None, group)?;
        level0_ids.push(community.id);
    }

    let mut current_level = 0;
    let mut current_communities: Vec<(String, Vec<String>)> = level0_ids
        .iter()
        .cloned()
        .zip(level0_groups.iter().cloned())
        .collect();

    while current_level + 1 < max_level && current_communities.len() > 1 {
        let membership: HashMap<&str, usize> = current_communities
            .iter()
            .enumerate()
            .flat_map(|(i, (_, entities))| entities.iter().map(move |e| (e.as_str(), i)))
            .collect();

        let community_indices: Vec<usize> = (0..current_communities.len()).collect();
        let mut contracted_edges = Vec::new();
        for relationship in &relationships {
            if let (Some(&a), Some(&b)) = (
                membership.get(relationship.source_entity_id.as_str()),
                membership.get(relationship.target_entity_id.as_str()),
            ) {
                if a != b {
                    contracted_edges.push((a, b));
                }
            }
        }

        let next_groups = connected_components(&community_indices, &contracted_edges);
        if next_groups.len() == current_communities.len() {
            break;
        }

        let next_level = current_level + 1;
        let mut next_communities = Vec::new();
        for group in &next_groups {
            let merged_entities: Vec<String> = group
                .iter()
                .flat_map(|&i| current_communities[i].1.clone())
                .collect();
            let parent = storage.insert_community(next_level, None, &merged_entities)?;
            for &child_index in group {
                storage.set_community_parent(&current_communities[child_index].0, &parent.id)?;
            }
            next_communities.push((parent.id.clone(), merged_entities));
        }

        current_communities = next_communities;
        current_level = next_level;
    }

    Ok(current_level + 1)
}

/// Resolves the [`Entity`]/[`Relationship`] rows backing a community, for
/// report composition.
pub fn community_context(
    storage: &Storage,
    community: &Community,
) -> Result<(Vec<Entity>, Vec<Relationship>), StorageError> {
    let mut entities = Vec::new();
    for id in &community.entity_ids {
        if let Ok(entity) = storage.get_entity(id) {
            entities.push(entity);
        }
    }
    let mut relationships = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for id in &community.entity_ids {
        for relationship in storage.relationships_for_entity(id, 0.0)? {
            if seen.insert(relationship.id.clone()) {
                relationships.push(relationship);
            }
        }
    }
    Ok((entities, relationships))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_communities_groups_connected_entities() {
        let storage = Storage::open_in_memory().unwrap();
        let a = storage.create_entity("a", "A", "SERVICE", "d", 0.5).unwrap();
        let b = storage.create_entity("b", "B", "SERVICE", "d", 0.5).unwrap();
        let c = storage.create_entity("c", "C", "SERVICE", "d", 0.5).unwrap();
        storage
            .upsert_relationship(&a.id, &b.id, "USES", "d", 5.0, "mem1")
            .unwrap();

        let levels = rebuild_communities(&storage, DEFAULT_MAX_LEVEL, DEFAULT_MIN_EDGE_STRENGTH).unwrap();
        assert!(levels >= 1);
        let level0 = storage.communities_at_level(0).unwrap();
        assert_eq!(level0.len(), 2);
        let ab_community = level0
            .iter()
            .find(|comm| comm.entity_ids.contains(&a.id))
            .unwrap();
        assert!(ab_community.entity_ids.contains(&b.id));
        assert!(!ab_community.entity_ids.contains(&c.id));
    }

    #[test]
    fn test_rebuild_communities_noop_with_no_entities() {
        let storage = Storage::open_in_memory().unwrap();
        let levels = rebuild_communities(&storage, DEFAULT_MAX_LEVEL, DEFAULT_MIN_EDGE_STRENGTH).unwrap();
        assert_eq!(levels, 0);
    }
}
