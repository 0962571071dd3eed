//! Output formatting for CLI commands.
//!
//! Every printer has a text form for people and a JSON form (`--json`) for
//! scripts. Text printers write to any `io::Write` so they can be tested
//! against a buffer; the public `print_*` functions lock stdout.
//!
//! Submodules:
//! - [`color`]: Color and styling helpers
//! - [`tree`]: Containment tree rendering with ASCII/Unicode connectors

pub mod color;
pub mod tree;

use crate::domain::{Action, Edge, EdgeKind};
use serde::Serialize;
use std::env;
use std::io::{self, Write};

pub use color::{error, success, warning};
pub use tree::{build_forest, TreeNode};

use color::{bold, colorize_id, cyan, dimmed, done_icon};

// ============================================================================
// Output Configuration
// ============================================================================

const DEFAULT_TERMINAL_WIDTH: u16 = 80;
const DEFAULT_MAX_CONTENT_WIDTH: usize = 80;

/// Configuration for output formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Maximum content width for text wrapping.
    pub max_width: usize,
    /// Whether to use ASCII-only icons instead of Unicode.
    pub use_ascii: bool,
    /// Whether to use colors in output.
    pub use_colors: bool,
}

impl OutputConfig {
    /// Create a new OutputConfig with explicit values.
    pub fn new(max_width: usize, use_ascii: bool, use_colors: bool) -> Self {
        Self {
            max_width,
            use_ascii,
            use_colors,
        }
    }

    /// Create an OutputConfig by reading from environment variables.
    ///
    /// Reads:
    /// - `ACTIONGRAPH_MAX_WIDTH`: Maximum content width (default: 80)
    /// - `ACTIONGRAPH_ASCII`: "1" or "true" for ASCII-only icons
    /// - `NO_COLOR`: Standard env var to disable colors (any value)
    /// - `ACTIONGRAPH_COLOR`: "0" or "false" to disable colors
    pub fn from_env() -> Self {
        let max_width = match env::var("ACTIONGRAPH_MAX_WIDTH") {
            Ok(s) if !s.is_empty() => s.parse().unwrap_or_else(|_| {
                tracing::warn!(
                    env_var = "ACTIONGRAPH_MAX_WIDTH",
                    value = %s,
                    default = DEFAULT_MAX_CONTENT_WIDTH,
                    "Invalid value, using default"
                );
                DEFAULT_MAX_CONTENT_WIDTH
            }),
            _ => DEFAULT_MAX_CONTENT_WIDTH,
        };

        let use_ascii = env::var("ACTIONGRAPH_ASCII")
            .is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));

        // https://no-color.org/
        let use_colors = env::var("NO_COLOR").is_err()
            && env::var("ACTIONGRAPH_COLOR")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true);

        Self {
            max_width,
            use_ascii,
            use_colors,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_CONTENT_WIDTH,
            use_ascii: false,
            use_colors: true,
        }
    }
}

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

/// Get the current terminal width, falling back to default if detection fails.
fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map_or(usize::from(DEFAULT_TERMINAL_WIDTH), |(w, _)| usize::from(w.0))
}

fn wrap_text(text: &str, width: usize) -> Vec<String> {
    textwrap::wrap(text, width.max(20))
        .into_iter()
        .map(|line| line.into_owned())
        .collect()
}

/// Everything `show` displays about one action.
#[derive(Debug, Clone, Serialize)]
pub struct ActionDetails {
    /// The action itself
    #[serde(flatten)]
    pub action: Action,
    /// Its parent, if any
    pub parent: Option<Action>,
    /// Direct children
    pub children: Vec<Action>,
    /// Direct prerequisites
    pub prerequisites: Vec<Action>,
    /// Direct dependents
    pub dependents: Vec<Action>,
}

// ============================================================================
// Public Dispatch Functions
// ============================================================================

fn with_stdout(
    f: impl FnOnce(&mut io::StdoutLock<'_>, &OutputConfig) -> io::Result<()>,
) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    f(&mut handle, &OutputConfig::from_env())
}

/// Print a JSON-formatted result for any serializable value
pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    with_stdout(|w, _| write_json(w, value))
}

/// Print a simple message
pub fn print_message(msg: &str) -> io::Result<()> {
    with_stdout(|w, _| writeln!(w, "{msg}"))
}

/// Print one action as a single line (or JSON object).
pub fn print_action(action: &Action, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(action),
        OutputMode::Text => with_stdout(|w, config| write_action_line(w, action, config)),
    }
}

/// Print a list of actions.
pub fn print_actions(actions: &[Action], mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(&actions),
        OutputMode::Text => with_stdout(|w, config| write_actions(w, actions, config)),
    }
}

/// Print an action with its neighbourhood (for the `show` command).
pub fn print_action_details(details: &ActionDetails, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(details),
        OutputMode::Text => with_stdout(|w, config| write_action_details(w, details, config)),
    }
}

/// Print edges as `src -[kind]-> dst` lines.
pub fn print_edges(edges: &[Edge], mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(&edges),
        OutputMode::Text => with_stdout(|w, config| write_edges(w, edges, config)),
    }
}

/// Print a containment forest.
pub fn print_tree(forest: &[TreeNode], mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(&forest),
        OutputMode::Text => with_stdout(|w, config| tree::write_forest(w, forest, config)),
    }
}

// ============================================================================
// Writers
// ============================================================================

fn write_json<W: Write, T: Serialize>(w: &mut W, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    writeln!(w, "{json}")
}

fn write_action_line<W: Write>(
    w: &mut W,
    action: &Action,
    config: &OutputConfig,
) -> io::Result<()> {
    writeln!(
        w,
        "{} {}  {}",
        done_icon(action.done, config),
        colorize_id(action.id.as_str(), config),
        action.title
    )
}

fn write_actions<W: Write>(w: &mut W, actions: &[Action], config: &OutputConfig) -> io::Result<()> {
    if actions.is_empty() {
        return writeln!(w, "No actions found.");
    }

    writeln!(w, "Found {} action(s):", actions.len())?;
    writeln!(w)?;
    for action in actions {
        write_action_line(w, action, config)?;
    }
    Ok(())
}

fn write_section<W: Write>(
    w: &mut W,
    title: &str,
    content: Option<&str>,
    width: usize,
    config: &OutputConfig,
) -> io::Result<()> {
    let Some(content) = content.filter(|c| !c.is_empty()) else {
        return Ok(());
    };
    writeln!(w)?;
    writeln!(w, "{}:", bold(title, config))?;
    for line in wrap_text(content, width.saturating_sub(2)) {
        writeln!(w, "  {line}")?;
    }
    Ok(())
}

fn write_related<W: Write>(
    w: &mut W,
    title: &str,
    arrow: &str,
    actions: &[Action],
    config: &OutputConfig,
) -> io::Result<()> {
    if actions.is_empty() {
        return Ok(());
    }
    writeln!(w)?;
    writeln!(w, "{} ({}):", bold(title, config), actions.len())?;
    for action in actions {
        writeln!(
            w,
            "  {} {} {} {}",
            cyan(arrow, config),
            done_icon(action.done, config),
            colorize_id(action.id.as_str(), config),
            action.title
        )?;
    }
    Ok(())
}

fn write_action_details<W: Write>(
    w: &mut W,
    details: &ActionDetails,
    config: &OutputConfig,
) -> io::Result<()> {
    let width = terminal_width().min(config.max_width);
    let action = &details.action;

    writeln!(
        w,
        "{} {}: {}",
        done_icon(action.done, config),
        colorize_id(action.id.as_str(), config),
        action.title
    )?;
    writeln!(
        w,
        "{} {}    {} {}    {} {}",
        dimmed("Version:", config),
        action.version,
        dimmed("Created:", config),
        action.created_at.format("%Y-%m-%d %H:%M"),
        dimmed("Updated:", config),
        action.updated_at.format("%Y-%m-%d %H:%M")
    )?;
    if let Some(done_at) = action.done_at {
        writeln!(w, "{} {}", dimmed("Done:", config), done_at.format("%Y-%m-%d %H:%M"))?;
    }
    if let Some(parent) = &details.parent {
        writeln!(
            w,
            "{} {} {}",
            dimmed("Parent:", config),
            colorize_id(parent.id.as_str(), config),
            parent.title
        )?;
    }

    write_section(w, "Description", action.description.as_deref(), width, config)?;
    write_section(w, "Vision", action.vision.as_deref(), width, config)?;

    let (down, up) = if config.use_ascii { ("->", "<-") } else { ("→", "←") };
    write_related(w, "Children", down, &details.children, config)?;
    write_related(w, "Depends on", up, &details.prerequisites, config)?;
    write_related(w, "Required by", down, &details.dependents, config)?;
    Ok(())
}

fn write_edges<W: Write>(w: &mut W, edges: &[Edge], config: &OutputConfig) -> io::Result<()> {
    if edges.is_empty() {
        return writeln!(w, "No edges found.");
    }
    for edge in edges {
        let label = match edge.kind {
            EdgeKind::Family => "contains",
            EdgeKind::DependsOn => "before",
        };
        writeln!(
            w,
            "{} {} {}",
            colorize_id(edge.src.as_str(), config),
            dimmed(label, config),
            colorize_id(edge.dst.as_str(), config)
        )?;
    }
    Ok(())
}
