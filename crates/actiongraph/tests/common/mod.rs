//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use actiongraph::domain::{Action, ActionId, ActionUpdate, Edge, EdgeFilter, NewAction};
use actiongraph::engine::ActionGraph;
use actiongraph::store::{ActionStore, StoreBackend};
use std::path::Path;
use std::process::{Command, Output};

/// Fresh in-memory engine.
pub async fn new_graph() -> ActionGraph {
    ActionGraph::open(StoreBackend::InMemory, "act".to_string())
        .await
        .expect("in-memory store")
}

/// Create an action and return its ID.
pub async fn create(graph: &mut ActionGraph, title: &str, parent: Option<&ActionId>) -> ActionId {
    let new_action = NewAction {
        parent_id: parent.cloned(),
        ..NewAction::titled(title)
    };
    graph
        .create_action(new_action)
        .await
        .expect("create action")
        .id
}

/// Set the done flag using the current version.
pub async fn set_done(graph: &mut ActionGraph, id: &ActionId, done: bool) {
    let current = graph.get_action(id).await.unwrap().expect("action exists");
    graph
        .update_action(id, ActionUpdate::done(done), current.version)
        .await
        .expect("update done flag");
}

/// Titles of the workable actions, sorted.
pub async fn workable_titles(graph: &ActionGraph) -> Vec<String> {
    let mut titles: Vec<String> = graph
        .compute_workable()
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.title)
        .collect();
    titles.sort();
    titles
}

/// Every action and every edge, for before/after comparisons.
pub async fn graph_rows(graph: &ActionGraph) -> (Vec<Action>, Vec<Edge>) {
    let actions = graph.list_actions().await.unwrap();
    let edges = graph
        .store()
        .list_edges(&EdgeFilter::default())
        .await
        .unwrap();
    (actions, edges)
}

/// Run the compiled binary in `dir`.
pub fn run_actiongraph_in_dir(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_actiongraph"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute actiongraph")
}
