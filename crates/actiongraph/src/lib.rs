//! Actiongraph - hierarchical action tracking.
//!
//! Actions form two graphs over one set of nodes: a containment forest
//! (`family` edges, at most one parent each) and a prerequisite DAG
//! (`depends_on` edges). The [`engine::ActionGraph`] keeps both acyclic under
//! every mutation and answers which actions are workable right now.

#![forbid(unsafe_code)]

// Core model and storage
pub mod domain;
pub mod error;
pub mod id_generation;
pub mod invariants;
pub mod store;

// Graph operations
pub mod dependency;
pub mod engine;
pub mod maintenance;
pub mod mutation;
pub mod workable;

// CLI surface
pub mod app;
pub mod cli;
pub mod commands;
pub mod output;
