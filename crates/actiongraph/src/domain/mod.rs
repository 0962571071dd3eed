//! Domain types for action tracking.
//!
//! This module contains the core domain types for the actiongraph engine:
//! actions, the two edge kinds that connect them, and the request types used
//! to create, update and delete actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for action titles
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum length for action descriptions and visions
pub const MAX_TEXT_LENGTH: usize = 10_000;

/// Maximum length for an action ID
pub const MAX_ID_LENGTH: usize = 64;

/// Unique identifier for an action.
///
/// IDs are opaque to the engine. Generated IDs look like `act-4f2k`, but any
/// non-empty token without whitespace is accepted when parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    /// Create a new action ID without validation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse and validate an action ID supplied by a caller.
    ///
    /// # Errors
    ///
    /// Returns a message describing why the ID is malformed: empty, too long,
    /// or containing whitespace/control characters.
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Action ID cannot be empty".to_string());
        }
        if s.len() > MAX_ID_LENGTH {
            return Err(format!(
                "Action ID cannot exceed {MAX_ID_LENGTH} characters"
            ));
        }
        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(format!(
                "Action ID '{s}' must not contain whitespace or control characters"
            ));
        }
        Ok(Self(s.to_string()))
    }

    /// Get the string representation of this ID
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ActionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ActionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Derived fields owned by an external collaborator.
///
/// Embeddings and cached summaries are computed elsewhere. The engine stores
/// them, persists them and carries them through every operation, but never
/// reads their contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedFields {
    /// Embedding vector for similarity-based placement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Summary of the action itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_summary: Option<String>,

    /// Summary of the action's subtree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtree_summary: Option<String>,

    /// Summary of the ancestor chain's context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_context_summary: Option<String>,

    /// Summary of the ancestor chain's vision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_vision_summary: Option<String>,

    /// When the collaborator last wrote these fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DerivedFields {
    /// Returns `true` if the collaborator has not produced any summary yet.
    pub fn is_missing(&self) -> bool {
        self.node_summary.is_none() && self.embedding.is_none()
    }

    /// Validate the derived fields.
    ///
    /// JSON has no encoding for `NaN` or infinities, so an embedding holding
    /// one could not be read back after a save.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first non-finite embedding component.
    pub fn validate(&self) -> Result<(), String> {
        let non_finite = self
            .embedding
            .iter()
            .flatten()
            .position(|value| !value.is_finite());
        match non_finite {
            Some(index) => Err(format!("Embedding value at index {index} is not finite")),
            None => Ok(()),
        }
    }
}

/// A unit of work in the action graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier for the action
    pub id: ActionId,

    /// Action title
    pub title: String,

    /// Longer description of the work
    #[serde(default)]
    pub description: Option<String>,

    /// What the finished state looks like
    #[serde(default)]
    pub vision: Option<String>,

    /// Completion flag
    #[serde(default)]
    pub done: bool,

    /// Optimistic concurrency counter, starts at 1
    pub version: u64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// When the action was last marked done
    #[serde(default)]
    pub done_at: Option<DateTime<Utc>>,

    /// Collaborator-owned derived columns
    #[serde(default)]
    pub derived: DerivedFields,
}

impl Action {
    /// Validate the action's content fields.
    ///
    /// # Errors
    ///
    /// Returns a message if the title is empty, any field exceeds its limit,
    /// or the derived embedding holds a non-finite value.
    pub fn validate(&self) -> Result<(), String> {
        validate_content(
            &self.title,
            self.description.as_deref(),
            self.vision.as_deref(),
        )?;
        self.derived.validate()
    }
}

fn validate_content(
    title: &str,
    description: Option<&str>,
    vision: Option<&str>,
) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("Title cannot be empty".to_string());
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(format!(
            "Title cannot exceed {MAX_TITLE_LENGTH} characters"
        ));
    }
    if description.is_some_and(|d| d.chars().count() > MAX_TEXT_LENGTH) {
        return Err(format!(
            "Description cannot exceed {MAX_TEXT_LENGTH} characters"
        ));
    }
    if vision.is_some_and(|v| v.chars().count() > MAX_TEXT_LENGTH) {
        return Err(format!("Vision cannot exceed {MAX_TEXT_LENGTH} characters"));
    }
    Ok(())
}

/// Kind of relationship an edge expresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Containment: `src` is the parent of `dst`
    Family,

    /// Prerequisite: `src` must be done before `dst` is workable
    DependsOn,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Family => write!(f, "family"),
            EdgeKind::DependsOn => write!(f, "depends_on"),
        }
    }
}

/// A directed edge between two actions.
///
/// The triple `(src, dst, kind)` is the identity of the edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    /// Source action (parent for `family`, prerequisite for `depends_on`)
    pub src: ActionId,

    /// Destination action (child for `family`, dependent for `depends_on`)
    pub dst: ActionId,

    /// Relationship kind
    pub kind: EdgeKind,
}

impl Edge {
    /// Build a `family` edge: `parent` contains `child`.
    pub fn family(parent: &ActionId, child: &ActionId) -> Self {
        Self {
            src: parent.clone(),
            dst: child.clone(),
            kind: EdgeKind::Family,
        }
    }

    /// Build a `depends_on` edge: `before` must be done before `after`.
    pub fn depends_on(before: &ActionId, after: &ActionId) -> Self {
        Self {
            src: before.clone(),
            dst: after.clone(),
            kind: EdgeKind::DependsOn,
        }
    }

    /// Returns `true` if `id` is either endpoint of this edge.
    pub fn touches(&self, id: &ActionId) -> bool {
        &self.src == id || &self.dst == id
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.src, self.kind, self.dst)
    }
}

/// Filter for querying edges.
///
/// All set fields must match. The default filter matches every edge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeFilter {
    /// Only edges of this kind
    pub kind: Option<EdgeKind>,

    /// Only edges with this source
    pub src: Option<ActionId>,

    /// Only edges with this destination
    pub dst: Option<ActionId>,

    /// Only edges with this action at either end
    pub touching: Option<ActionId>,
}

impl EdgeFilter {
    /// Match every edge of one kind.
    pub fn kind(kind: EdgeKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Match edges of `kind` with `id` at either end.
    pub fn touching(kind: EdgeKind, id: &ActionId) -> Self {
        Self {
            kind: Some(kind),
            touching: Some(id.clone()),
            ..Self::default()
        }
    }

    /// Check whether an edge satisfies this filter.
    pub fn matches(&self, edge: &Edge) -> bool {
        self.kind.is_none_or(|k| edge.kind == k)
            && self.src.as_ref().is_none_or(|s| &edge.src == s)
            && self.dst.as_ref().is_none_or(|d| &edge.dst == d)
            && self.touching.as_ref().is_none_or(|t| edge.touches(t))
    }
}

/// Data for creating a new action
#[derive(Debug, Clone, Default)]
pub struct NewAction {
    /// Action title
    pub title: String,

    /// Description (optional)
    pub description: Option<String>,

    /// Vision (optional)
    pub vision: Option<String>,

    /// Initial parent, attached atomically with creation
    pub parent_id: Option<ActionId>,

    /// Initial prerequisites, attached atomically with creation
    pub depends_on_ids: Vec<ActionId>,
}

impl NewAction {
    /// Create a standalone action request with just a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Validate the new action data.
    ///
    /// # Errors
    ///
    /// Returns a message for an empty/oversized title, oversized text fields,
    /// or a prerequisite list that names the same action twice.
    pub fn validate(&self) -> Result<(), String> {
        validate_content(
            &self.title,
            self.description.as_deref(),
            self.vision.as_deref(),
        )?;

        let mut seen = std::collections::HashSet::new();
        for id in &self.depends_on_ids {
            if !seen.insert(id) {
                return Err(format!("Prerequisite '{id}' listed more than once"));
            }
        }
        Ok(())
    }
}

/// Data for updating an existing action.
///
/// Only fields that are `Some` are modified. `description` and `vision` use
/// a nested option so callers can clear them with `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionUpdate {
    /// New title (if updating)
    pub title: Option<String>,

    /// New description (if updating, `Some(None)` to clear)
    pub description: Option<Option<String>>,

    /// New vision (if updating, `Some(None)` to clear)
    pub vision: Option<Option<String>>,

    /// New completion flag (if updating)
    pub done: Option<bool>,
}

impl ActionUpdate {
    /// An update that only toggles the completion flag.
    pub fn done(done: bool) -> Self {
        Self {
            done: Some(done),
            ..Self::default()
        }
    }

    /// Returns `true` if no field is set.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.vision.is_none()
            && self.done.is_none()
    }
}

/// What happens to an action's subtree when it is deleted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy", content = "new_parent_id")]
pub enum DeletePolicy {
    /// Delete only the action; its children become roots
    #[default]
    Orphan,

    /// Delete the action and every descendant
    DeleteRecursive,

    /// Move the action's children under another parent, then delete it
    Reparent(ActionId),
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeletePolicy::Orphan => write!(f, "orphan"),
            DeletePolicy::DeleteRecursive => write!(f, "delete_recursive"),
            DeletePolicy::Reparent(id) => write!(f, "reparent({id})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("act-4f2k")]
    #[case("  act-4f2k  ")]
    #[case("9b1d5c1e-uuid-like")]
    fn test_parse_valid_ids(#[case] input: &str) {
        let id = ActionId::parse(input).unwrap();
        assert_eq!(id.as_str(), input.trim());
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("act 4f2k")]
    #[case("act\t1")]
    fn test_parse_invalid_ids(#[case] input: &str) {
        assert!(ActionId::parse(input).is_err());
    }

    #[test]
    fn test_parse_rejects_overlong_id() {
        let long = "a".repeat(MAX_ID_LENGTH + 1);
        assert!(ActionId::parse(&long).is_err());
    }

    #[test]
    fn test_new_action_rejects_blank_title() {
        let new_action = NewAction::titled("   ");
        assert_eq!(new_action.validate().unwrap_err(), "Title cannot be empty");
    }

    #[test]
    fn test_new_action_rejects_duplicate_prerequisites() {
        let new_action = NewAction {
            depends_on_ids: vec![ActionId::new("a"), ActionId::new("a")],
            ..NewAction::titled("Write report")
        };
        assert!(new_action.validate().unwrap_err().contains("more than once"));
    }

    #[test]
    fn test_title_length_counts_characters() {
        let title = "é".repeat(MAX_TITLE_LENGTH);
        assert!(NewAction::titled(title).validate().is_ok());
        let title = "é".repeat(MAX_TITLE_LENGTH + 1);
        assert!(NewAction::titled(title).validate().is_err());
    }

    #[test]
    fn test_edge_filter_matching() {
        let a = ActionId::new("a");
        let b = ActionId::new("b");
        let c = ActionId::new("c");
        let family = Edge::family(&a, &b);
        let dep = Edge::depends_on(&b, &c);

        assert!(EdgeFilter::default().matches(&family));
        assert!(EdgeFilter::kind(EdgeKind::Family).matches(&family));
        assert!(!EdgeFilter::kind(EdgeKind::Family).matches(&dep));
        assert!(EdgeFilter::touching(EdgeKind::DependsOn, &b).matches(&dep));
        assert!(!EdgeFilter::touching(EdgeKind::DependsOn, &a).matches(&dep));

        let by_dst = EdgeFilter {
            dst: Some(b.clone()),
            ..EdgeFilter::default()
        };
        assert!(by_dst.matches(&family));
        assert!(!by_dst.matches(&dep));
    }

    #[test]
    fn test_edge_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&EdgeKind::DependsOn).unwrap(),
            "\"depends_on\""
        );
        assert_eq!(
            serde_json::to_string(&EdgeKind::Family).unwrap(),
            "\"family\""
        );
    }

    #[test]
    fn test_delete_policy_defaults_to_orphan() {
        assert_eq!(DeletePolicy::default(), DeletePolicy::Orphan);
        assert_eq!(
            DeletePolicy::Reparent(ActionId::new("act-1")).to_string(),
            "reparent(act-1)"
        );
    }

    #[test]
    fn test_derived_fields_missing() {
        let mut derived = DerivedFields::default();
        assert!(derived.is_missing());
        derived.node_summary = Some("Summary".to_string());
        assert!(!derived.is_missing());
    }

    #[rstest]
    #[case::nan(f32::NAN)]
    #[case::infinity(f32::INFINITY)]
    #[case::negative_infinity(f32::NEG_INFINITY)]
    fn test_derived_rejects_non_finite_embedding(#[case] value: f32) {
        let derived = DerivedFields {
            embedding: Some(vec![0.5, value]),
            ..DerivedFields::default()
        };
        assert_eq!(
            derived.validate().unwrap_err(),
            "Embedding value at index 1 is not finite"
        );
    }

    #[test]
    fn test_derived_accepts_finite_embedding() {
        let derived = DerivedFields {
            embedding: Some(vec![0.5, -1.25, 0.0]),
            ..DerivedFields::default()
        };
        assert!(derived.validate().is_ok());
        assert!(DerivedFields::default().validate().is_ok());
    }
}
