//! Entity merging and relationship recording (§4.5 steps 2-4)

use crate::capability::{ExtractedEntity, ExtractedRelationship};
use crate::model::{Entity, Relationship};
use crate::storage::{Storage, StorageError};
use std::collections::HashMap;

/// Lowercases, strips brackets/punctuation, and collapses separators to a
/// single space so `"Postgres_DB"`, `"(Postgres DB)"`, and `"postgres db"`
/// resolve to the same alias key.
pub fn normalize_alias(name: &str) -> String {
    let stripped: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Finds or creates the entity for `extracted`, merging mentions into an
/// existing match via fuzzy alias lookup (§4.5 step 3).
pub fn merge_or_create_entity(
    storage: &Storage,
    extracted: &ExtractedEntity,
) -> Result<Entity, StorageError> {
    let alias = normalize_alias(&extracted.canonical_name);
    if alias.is_empty() {
        return storage.create_entity(
            &extracted.canonical_name.to_lowercase(),
            &extracted.canonical_name,
            &extracted.entity_type,
            &extracted.description,
            extracted.confidence,
        );
    }
    match storage.find_entity_fuzzy(&alias)? {
        Some(existing) => storage.merge_entity_mention(&existing.id, &extracted.description, extracted.confidence),
        None => storage.create_entity(
            &alias,
            &extracted.canonical_name,
            &extracted.entity_type,
            &extracted.description,
            extracted.confidence,
        ),
    }
}

/// Resolves an extracted relationship's entity names to ids using the
/// per-batch alias map built during this pass, falling back to a global
/// fuzzy lookup, and records it. Self-loops are rejected (§4.5 step 4).
pub fn record_relationship(
    storage: &Storage,
    extracted: &ExtractedRelationship,
    alias_map: &HashMap<String, String>,
    memory_id: &str,
) -> Result<Option<Relationship>, StorageError> {
    let source_id = resolve_entity_id(storage, &extracted.source_name, alias_map)?;
    let target_id = resolve_entity_id(storage, &extracted.target_name, alias_map)?;
    let (Some(source_id), Some(target_id)) = (source_id, target_id) else {
        return Ok(None);
    };
    if source_id == target_id {
        return Ok(None);
    }
    let description = format!(
        "{} {} {}",
        extracted.source_name, extracted.relationship_type, extracted.target_name
    );
    let relationship = storage.upsert_relationship(
        &source_id,
        &target_id,
        &extracted.relationship_type,
        if extracted.description.is_empty() {
            &description
        } else {
            &extracted.description
        },
        extracted.strength,
        memory_id,
    )?;
    Ok(Some(relationship))
}

fn resolve_entity_id(
    storage: &Storage,
    name: &str,
    alias_map: &HashMap<String, String>,
) -> Result<Option<String>, StorageError> {
    let alias = normalize_alias(name);
    if let Some(id) = alias_map.get(&alias) {
        return Ok(Some(id.clone()));
    }
    Ok(storage.find_entity_fuzzy(&alias)?.map(|e| e.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_alias_collapses_punctuation_and_case() {
        assert_eq!(normalize_alias("Postgres_DB"), "postgres db");
        assert_eq!(normalize_alias("(Postgres DB)"), "postgres db");
        assert_eq!(normalize_alias("  Postgres   DB  "), "postgres db");
    }

    #[test]
    fn test_merge_or_create_creates_new_entity() {
        let storage = Storage::open_in_memory().unwrap();
        let extracted = ExtractedEntity {
            canonical_name: "PostgreSQL".into(),
            entity_type: "SERVICE".into(),
            description: "a database".into(),
            confidence: 0.6,
            mention_text: "PostgreSQL".into(),
        };
        let entity = merge_or_create_entity(&storage, &extracted).unwrap();
        assert_eq!(entity.canonical_name, "PostgreSQL");
        assert_eq!(entity.mention_count, 1);
    }

    #[test]
    fn test_merge_or_create_merges_existing_by_fuzzy_alias() {
        let storage = Storage::open_in_memory().unwrap();
        let first = ExtractedEntity {
            canonical_name: "Postgres DB".into(),
            entity_type: "SERVICE".into(),
            description: "short".into(),
            confidence: 0.4,
            mention_text: "Postgres DB".into(),
        };
        let created = merge_or_create_entity(&storage, &first).unwrap();

        let second = ExtractedEntity {
            canonical_name: "Postgres_DB".into(),
            entity_type: "SERVICE".into(),
            description: "a much longer description of the database".into(),
            confidence: 0.8,
            mention_text: "Postgres_DB".into(),
        };
        let merged = merge_or_create_entity(&storage, &second).unwrap();
        assert_eq!(merged.id, created.id);
        assert_eq!(merged.mention_count, 2);
        assert_eq!(merged.extraction_confidence, 0.8);
    }

    #[test]
    fn test_record_relationship_rejects_self_loop() {
        let storage = Storage::open_in_memory().unwrap();
        let entity = storage
            .create_entity("x", "X", "SERVICE", "d", 0.5)
            .unwrap();
        let extracted = ExtractedRelationship {
            source_name: "X".into(),
            target_name: "X".into(),
            relationship_type: "USES".into(),
            description: "".into(),
            strength: 5.0,
        };
        let mut alias_map = HashMap::new();
        alias_map.insert("x".to_string(), entity.id.clone());
        let result = record_relationship(&storage, &extracted, &alias_map, "mem1").unwrap();
        assert!(result.is_none());
    }
}
