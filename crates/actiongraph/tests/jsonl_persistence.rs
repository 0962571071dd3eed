//! Integration tests for JSONL persistence.
//!
//! # Test Coverage
//!
//! - Save/reload round-trip of actions, both edge kinds, and derived fields
//! - Resilient loading: malformed lines, invalid and duplicate actions,
//!   orphaned, duplicate, second-parent and circular edges
//! - Engine recovery when a save fails

mod common;

use actiongraph::domain::{ActionId, DerivedFields, Edge, EdgeFilter, EdgeKind, NewAction};
use actiongraph::engine::ActionGraph;
use actiongraph::error::Error;
use actiongraph::store::memory::{load_from_jsonl, LoadWarning};
use actiongraph::store::{ActionStore, StoreBackend};
use chrono::Utc;
use common::{create, set_done};
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

// =============================================================================
// Test Helpers
// =============================================================================

fn create_temp_jsonl_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write to temp file");
    file.flush().expect("Failed to flush temp file");
    file
}

fn action_line(id: &str, title: &str) -> String {
    let now = Utc::now().to_rfc3339();
    format!(
        concat!(
            r#"{{"record":"action","id":"{id}","title":"{title}","version":1,"#,
            r#""created_at":"{now}","updated_at":"{now}"}}"#
        ),
        id = id,
        title = title,
        now = now
    )
}

fn edge_line(src: &str, dst: &str, kind: &str) -> String {
    format!(r#"{{"record":"edge","src":"{src}","dst":"{dst}","kind":"{kind}"}}"#)
}

async fn open(path: &std::path::Path) -> ActionGraph {
    ActionGraph::open(StoreBackend::Jsonl(path.to_path_buf()), "act".to_string())
        .await
        .unwrap()
}

// =============================================================================
// Round-trip
// =============================================================================

#[tokio::test]
async fn test_round_trip_preserves_graph_and_derived_fields() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("actions.jsonl");

    let mut graph = open(&path).await;
    let root = create(&mut graph, "Plan the offsite", None).await;
    let venue = create(&mut graph, "Book venue", Some(&root)).await;
    let date = create(&mut graph, "Pick date", Some(&root)).await;
    graph.add_dependency(&venue, &date).await.unwrap();
    set_done(&mut graph, &date, true).await;
    graph
        .update_derived(
            &venue,
            DerivedFields {
                node_summary: Some("Find a room for twenty".to_string()),
                embedding: Some(vec![0.25, -1.0]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let before = graph.list_actions().await.unwrap();
    graph.close().await.unwrap();

    let graph = open(&path).await;
    assert_eq!(graph.list_actions().await.unwrap(), before);

    let edges = graph
        .store()
        .list_edges(&EdgeFilter::default())
        .await
        .unwrap();
    assert_eq!(edges.len(), 3);
    assert!(edges.contains(&Edge::family(&root, &venue)));
    assert!(edges.contains(&Edge::family(&root, &date)));
    assert!(edges.contains(&Edge::depends_on(&date, &venue)));

    let titles: Vec<String> = graph
        .compute_workable()
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.title)
        .collect();
    assert_eq!(titles, vec!["Book venue"]);
}

#[tokio::test]
async fn test_save_is_deterministic() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("actions.jsonl");

    let mut graph = open(&path).await;
    let a = create(&mut graph, "A", None).await;
    create(&mut graph, "B", Some(&a)).await;
    graph.close().await.unwrap();
    let first = std::fs::read_to_string(&path).unwrap();

    let graph = open(&path).await;
    graph.close().await.unwrap();
    let second = std::fs::read_to_string(&path).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.lines().count(), 3);
    assert!(first.lines().last().unwrap().contains(r#""record":"edge""#));
    assert!(!path.with_extension("jsonl.tmp").exists());
}

#[tokio::test]
async fn test_non_finite_embedding_is_rejected_before_it_reaches_disk() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("actions.jsonl");

    let mut graph = open(&path).await;
    let parent = create(&mut graph, "Parent", None).await;
    let child = create(&mut graph, "Child", Some(&parent)).await;

    for value in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
        let result = graph
            .update_derived(
                &parent,
                DerivedFields {
                    embedding: Some(vec![0.5, value]),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }
    graph.close().await.unwrap();
    assert!(!std::fs::read_to_string(&path).unwrap().contains("embedding"));

    let graph = open(&path).await;
    assert_eq!(graph.list_actions().await.unwrap().len(), 2);
    let reloaded = graph.get_action(&parent).await.unwrap().unwrap();
    assert!(reloaded.derived.embedding.is_none());
    assert_eq!(graph.ancestor_chain(&child).await.unwrap()[0].id, parent);
}

// =============================================================================
// Resilient loading
// =============================================================================

#[tokio::test]
async fn test_malformed_and_invalid_lines_are_skipped() {
    let content = [
        action_line("act-1", "Valid"),
        "{not json".to_string(),
        action_line("act-2", "   "),
        action_line("act-1", "Duplicate id"),
        String::new(),
        action_line("act-3", "Also valid"),
    ]
    .join("\n");
    let file = create_temp_jsonl_file(&content);

    let (store, warnings) = load_from_jsonl(file.path(), "act".to_string())
        .await
        .unwrap();

    let titles: Vec<String> = store
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.title)
        .collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"Valid".to_string()));
    assert!(titles.contains(&"Also valid".to_string()));

    assert_eq!(warnings.len(), 3);
    assert!(matches!(
        warnings[0],
        LoadWarning::MalformedRecord { line_number: 2, .. }
    ));
    assert!(matches!(
        &warnings[1],
        LoadWarning::InvalidAction { action_id, line_number: 3, .. }
            if action_id.as_str() == "act-2"
    ));
    assert!(matches!(
        warnings[2],
        LoadWarning::DuplicateAction { line_number: 4, .. }
    ));
}

#[tokio::test]
async fn test_invariant_breaking_edges_are_skipped() {
    let content = [
        action_line("act-a", "A"),
        action_line("act-b", "B"),
        action_line("act-c", "C"),
        edge_line("act-a", "act-b", "family"),
        edge_line("act-a", "act-b", "family"),
        edge_line("act-c", "act-b", "family"),
        edge_line("act-b", "act-a", "family"),
        edge_line("act-a", "act-ghost", "depends_on"),
        edge_line("act-a", "act-c", "depends_on"),
        edge_line("act-c", "act-a", "depends_on"),
        edge_line("act-c", "act-c", "depends_on"),
    ]
    .join("\n");
    let file = create_temp_jsonl_file(&content);

    let (store, warnings) = load_from_jsonl(file.path(), "act".to_string())
        .await
        .unwrap();

    let edges = store.list_edges(&EdgeFilter::default()).await.unwrap();
    let id = |s: &str| ActionId::new(s);
    assert_eq!(
        edges,
        vec![
            Edge::family(&id("act-a"), &id("act-b")),
            Edge::depends_on(&id("act-a"), &id("act-c")),
        ]
    );

    assert_eq!(
        warnings,
        vec![
            LoadWarning::DuplicateEdge(Edge::family(&id("act-a"), &id("act-b"))),
            LoadWarning::SecondParent(Edge::family(&id("act-c"), &id("act-b"))),
            LoadWarning::CircularEdge(Edge::family(&id("act-b"), &id("act-a"))),
            LoadWarning::OrphanedEdge(Edge::depends_on(&id("act-a"), &id("act-ghost"))),
            LoadWarning::CircularEdge(Edge::depends_on(&id("act-c"), &id("act-a"))),
            LoadWarning::CircularEdge(Edge::depends_on(&id("act-c"), &id("act-c"))),
        ]
    );
}

#[tokio::test]
async fn test_edges_before_actions_still_resolve() {
    let content = [
        edge_line("act-a", "act-b", "family"),
        action_line("act-a", "A"),
        action_line("act-b", "B"),
    ]
    .join("\n");
    let file = create_temp_jsonl_file(&content);

    let (store, warnings) = load_from_jsonl(file.path(), "act".to_string())
        .await
        .unwrap();
    assert!(warnings.is_empty());
    assert_eq!(
        store
            .list_edges(&EdgeFilter::kind(EdgeKind::Family))
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_loaded_store_keeps_generating_ids() {
    let file = create_temp_jsonl_file(&action_line("act-1", "Existing"));

    let (mut store, _) = load_from_jsonl(file.path(), "act".to_string())
        .await
        .unwrap();
    let created = store.create(NewAction::titled("Fresh")).await.unwrap();

    assert!(created.id.as_str().starts_with("act-"));
    assert_eq!(store.list().await.unwrap().len(), 2);
}

// =============================================================================
// Save failure
// =============================================================================

#[tokio::test]
async fn test_failed_save_reloads_persisted_state() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("missing-dir").join("actions.jsonl");

    let mut graph = open(&path).await;
    let result = graph.create_action(NewAction::titled("Never saved")).await;

    assert!(matches!(result, Err(Error::Io(_))));
    assert!(graph.list_actions().await.unwrap().is_empty());
}
