//! Property-style invariants that must hold regardless of input shape:
//! token accounting round-trips, chunk coverage, vector store
//! upsert/search/delete symmetry, and entity alias normalization.

use rcae_core::capability::{ExtractedEntity, SearchFilter, VectorPayload};
use rcae_core::chunker::{count_tokens, split_into_token_chunks, truncate_to_tokens, MarkdownChunker};
use rcae_core::graphrag::{merge_or_create_entity, normalize_alias};
use rcae_e2e_tests::TestProject;

#[test]
fn truncate_to_tokens_never_exceeds_the_requested_budget() {
    let samples = [
        "",
        "a short sentence",
        "The quick brown fox jumps over the lazy dog, repeatedly, for a while.",
        &"token ".repeat(500),
    ];
    for text in samples {
        for budget in [0, 1, 5, 50] {
            let truncated = truncate_to_tokens(text, budget);
            assert!(
                count_tokens(&truncated) <= budget,
                "truncate_to_tokens({text:?}, {budget}) produced {} tokens",
                count_tokens(&truncated)
            );
        }
    }
}

#[test]
fn truncate_to_tokens_is_a_no_op_under_budget() {
    let text = "short text well under any budget";
    let truncated = truncate_to_tokens(text, 1000);
    assert_eq!(truncated, text);
}

#[test]
fn split_into_token_chunks_covers_every_token_with_no_gaps() {
    let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa ".repeat(20);
    let chunks = split_into_token_chunks(&text, 32, 8);
    assert!(!chunks.is_empty());
    for chunk in &chunks {
        assert!(count_tokens(chunk) <= 32);
    }
    let first_word = text.split_whitespace().next().unwrap();
    let last_word = text.split_whitespace().last().unwrap();
    assert!(chunks.first().unwrap().contains(first_word));
    assert!(chunks.last().unwrap().contains(last_word));
}

#[test]
fn split_into_token_chunks_on_empty_text_is_empty() {
    assert!(split_into_token_chunks("", 32, 8).is_empty());
}

#[test]
fn split_into_token_chunks_on_short_text_is_a_single_chunk() {
    let text = "just a few words";
    let chunks = split_into_token_chunks(text, 1000, 100);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0], text);
}

#[tokio::test]
async fn vector_upsert_then_search_finds_the_key_with_near_unity_score() {
    let project = TestProject::new();
    let vector = vec![1.0_f32, 0.0, 0.0, 0.0];
    let inserted = project.ctx.vectors.upsert(
        "memory:fixture-1",
        &vector,
        VectorPayload::Memory {
            memory_id: "fixture-1".to_string(),
            title: "fixture".to_string(),
            tags: Vec::new(),
            related_files: Vec::new(),
            importance: 0.5,
        },
    );
    assert!(inserted);

    let hits = project.ctx.vectors.search(&vector, 5, &SearchFilter::default());
    let hit = hits
        .iter()
        .find(|h| h.key == "memory:fixture-1")
        .expect("expected the just-inserted vector to come back from search");
    assert!(hit.score >= 0.99, "expected near-unity score for an identical query vector, got {}", hit.score);
}

#[tokio::test]
async fn vector_delete_excludes_it_from_later_searches() {
    let project = TestProject::new();
    let vector = vec![0.0_f32, 1.0, 0.0, 0.0];
    project.ctx.vectors.upsert(
        "memory:fixture-2",
        &vector,
        VectorPayload::Memory {
            memory_id: "fixture-2".to_string(),
            title: "fixture".to_string(),
            tags: Vec::new(),
            related_files: Vec::new(),
            importance: 0.5,
        },
    );
    let removed = project.ctx.vectors.remove_by_memory_id("fixture-2");
    assert!(removed >= 1);

    let hits = project.ctx.vectors.search(&vector, 5, &SearchFilter::default());
    assert!(!hits.iter().any(|h| h.key == "memory:fixture-2"));
}

#[tokio::test]
async fn entity_merge_collapses_case_and_punctuation_variants_to_one_entity() {
    let project = TestProject::new();
    let variants = ["Acme Corp.", "acme corp", "ACME-CORP", "  acme   corp  "];

    let mut ids = Vec::new();
    for name in variants {
        let extracted = ExtractedEntity {
            canonical_name: name.to_string(),
            entity_type: "ORGANIZATION".to_string(),
            description: "a company".to_string(),
            confidence: 0.9,
            mention_text: name.to_string(),
        };
        let entity = merge_or_create_entity(&project.ctx.storage, &extracted).unwrap();
        ids.push(entity.id);
    }

    assert!(
        ids.iter().all(|id| *id == ids[0]),
        "expected every case/punctuation variant to resolve to the same entity, got {:?}",
        ids
    );
}

#[test]
fn normalize_alias_collapses_separators_and_case() {
    assert_eq!(normalize_alias("Acme Corp."), normalize_alias("acme-corp"));
    assert_eq!(normalize_alias("  Foo_Bar  "), normalize_alias("foo bar"));
    assert_eq!(normalize_alias(""), "");
}

#[test]
fn markdown_chunks_cover_every_line_exactly_once() {
    let doc = "# Title\n\nIntro paragraph.\n\n## Section One\n\nSome content here.\nMore content.\n\n## Section Two\n\nFinal content.\n";
    let line_count = doc.lines().count();

    let chunks = MarkdownChunker::new(512).chunk(doc);
    assert!(!chunks.is_empty());

    let mut coverage = vec![0u32; line_count + 1];
    for chunk in &chunks {
        assert!(chunk.start_line <= chunk.end_line);
        for line in chunk.start_line..=chunk.end_line {
            assert!(line <= line_count, "chunk range {}..={} exceeds document length {}", chunk.start_line, chunk.end_line, line_count);
            coverage[line] += 1;
        }
    }
    for (line, count) in coverage.iter().enumerate().skip(1) {
        assert_eq!(*count, 1, "line {line} of the document is covered by {count} chunks, expected exactly one");
    }
}
