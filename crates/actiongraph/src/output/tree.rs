//! Containment tree rendering for `actiongraph tree` output.

use std::collections::{HashMap, HashSet};
use std::io::{self, Write};

use colored::Colorize;
use serde::Serialize;

use super::color::{colorize_id, done_icon};
use super::OutputConfig;
use crate::domain::{Action, ActionId, Edge, EdgeKind};

/// A node in the containment tree for rendering purposes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    /// Action ID
    pub id: ActionId,
    /// Action title
    pub title: String,
    /// Completion flag
    pub done: bool,
    /// Whether the action is currently workable
    pub workable: bool,
    /// Child nodes
    pub children: Vec<TreeNode>,
}

/// Build the containment forest from a snapshot.
///
/// With `root` set, only that action's subtree is returned; otherwise every
/// root (action without a parent) heads its own tree. Siblings keep the order
/// of `actions`.
pub fn build_forest(
    actions: &[Action],
    edges: &[Edge],
    workable: &HashSet<ActionId>,
    root: Option<&ActionId>,
) -> Vec<TreeNode> {
    let by_id: HashMap<&ActionId, &Action> = actions.iter().map(|a| (&a.id, a)).collect();
    let position: HashMap<&ActionId, usize> =
        actions.iter().enumerate().map(|(i, a)| (&a.id, i)).collect();

    let mut children: HashMap<&ActionId, Vec<&ActionId>> = HashMap::new();
    let mut has_parent: HashSet<&ActionId> = HashSet::new();
    for edge in edges.iter().filter(|e| e.kind == EdgeKind::Family) {
        children.entry(&edge.src).or_default().push(&edge.dst);
        has_parent.insert(&edge.dst);
    }
    for list in children.values_mut() {
        list.sort_by_key(|id| position.get(id).copied().unwrap_or(usize::MAX));
    }

    let roots: Vec<&ActionId> = match root {
        Some(id) => vec![id],
        None => actions
            .iter()
            .map(|a| &a.id)
            .filter(|id| !has_parent.contains(id))
            .collect(),
    };

    let mut visited = HashSet::new();
    roots
        .into_iter()
        .filter_map(|id| build_node(id, &by_id, &children, workable, &mut visited))
        .collect()
}

fn build_node<'a>(
    id: &'a ActionId,
    by_id: &HashMap<&ActionId, &Action>,
    children: &HashMap<&'a ActionId, Vec<&'a ActionId>>,
    workable: &HashSet<ActionId>,
    visited: &mut HashSet<&'a ActionId>,
) -> Option<TreeNode> {
    let action = by_id.get(id)?;
    if !visited.insert(id) {
        return None;
    }

    let child_nodes = children
        .get(id)
        .map(|ids| {
            ids.iter()
                .filter_map(|child| build_node(*child, by_id, children, workable, visited))
                .collect()
        })
        .unwrap_or_default();

    Some(TreeNode {
        id: id.clone(),
        title: action.title.clone(),
        done: action.done,
        workable: workable.contains(id),
        children: child_nodes,
    })
}

/// Render a forest with Unicode (or ASCII) connectors.
///
/// ```text
/// ○ act-4f2k Plan the offsite
/// ├── ✓ act-9x1m Pick a date
/// └── ○ act-2b7q Book a venue *
/// ```
///
/// Workable actions are marked with `*`.
pub fn write_forest<W: Write>(
    w: &mut W,
    forest: &[TreeNode],
    config: &OutputConfig,
) -> io::Result<()> {
    if forest.is_empty() {
        return writeln!(w, "No actions found.");
    }
    for root in forest {
        writeln!(w, "{}", node_label(root, config))?;
        write_children(w, &root.children, &[], config)?;
    }
    Ok(())
}

fn node_label(node: &TreeNode, config: &OutputConfig) -> String {
    let marker = if node.workable {
        if config.use_colors {
            " *".yellow().to_string()
        } else {
            " *".to_string()
        }
    } else {
        String::new()
    };
    format!(
        "{} {} {}{}",
        done_icon(node.done, config),
        colorize_id(node.id.as_str(), config),
        node.title,
        marker
    )
}

/// `prefix_segments` tracks which ancestor levels still have siblings below.
fn write_children<W: Write>(
    w: &mut W,
    children: &[TreeNode],
    prefix_segments: &[bool],
    config: &OutputConfig,
) -> io::Result<()> {
    let (branch, corner, pipe, space) = if config.use_ascii {
        ("|-- ", "`-- ", "|   ", "    ")
    } else {
        ("├── ", "└── ", "│   ", "    ")
    };

    for (i, child) in children.iter().enumerate() {
        let is_last = i == children.len() - 1;

        let mut prefix = String::new();
        for &has_more in prefix_segments {
            prefix.push_str(if has_more { pipe } else { space });
        }
        prefix.push_str(if is_last { corner } else { branch });
        let prefix = if config.use_colors {
            prefix.dimmed().to_string()
        } else {
            prefix
        };

        writeln!(w, "{prefix}{}", node_label(child, config))?;

        if !child.children.is_empty() {
            let mut next_segments = prefix_segments.to_vec();
            next_segments.push(!is_last);
            write_children(w, &child.children, &next_segments, config)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn action(id: &str, done: bool) -> Action {
        let now = Utc::now();
        Action {
            id: ActionId::new(id),
            title: id.to_uppercase(),
            description: None,
            vision: None,
            done,
            version: 1,
            created_at: now,
            updated_at: now,
            done_at: None,
            derived: Default::default(),
        }
    }

    fn render(forest: &[TreeNode], ascii: bool) -> String {
        let mut out = Vec::new();
        write_forest(&mut out, forest, &OutputConfig::new(80, ascii, false)).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn sample() -> (Vec<Action>, Vec<Edge>) {
        let actions = vec![
            action("r", false),
            action("a", true),
            action("b", false),
            action("c", false),
        ];
        let id = |s: &str| ActionId::new(s);
        let edges = vec![
            Edge::family(&id("r"), &id("a")),
            Edge::family(&id("r"), &id("b")),
            Edge::family(&id("a"), &id("c")),
            Edge::depends_on(&id("a"), &id("b")),
        ];
        (actions, edges)
    }

    #[test]
    fn test_unicode_rendering() {
        let (actions, edges) = sample();
        let workable = HashSet::from([ActionId::new("c")]);
        let forest = build_forest(&actions, &edges, &workable, None);

        let expected = "\
○ r R
├── ✓ a A
│   └── ○ c C *
└── ○ b B
";
        assert_eq!(render(&forest, false), expected);
    }

    #[test]
    fn test_ascii_subtree() {
        let (actions, edges) = sample();
        let forest = build_forest(&actions, &edges, &HashSet::new(), Some(&ActionId::new("a")));

        assert_eq!(render(&forest, true), "+ a A\n`-- o c C\n");
    }

    #[test]
    fn test_empty_forest() {
        assert_eq!(render(&[], false), "No actions found.\n");
    }
}
