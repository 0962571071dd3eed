//! Command execution logic.
//!
//! Each `execute_*` function runs one command against an opened [`App`].
//! The engine persists after every successful mutation, so commands only
//! need to close the app when they finish.

use anyhow::Result;
use std::collections::HashSet;

use super::args::{
    CreateArgs, DeleteArgs, DepAction, DepArgs, DoneArgs, IdArgs, InitArgs, ListArgs, MoveArgs,
    ShowArgs, TreeArgs, UpdateArgs,
};
use super::types::{BatchError, BatchResult};
use crate::app::App;
use crate::domain::{Action, ActionId, ActionUpdate, EdgeFilter, NewAction};
use crate::output::{self, ActionDetails, OutputConfig, OutputMode};

/// Execute the init command
pub async fn execute_init(args: &InitArgs) -> Result<()> {
    use crate::commands::init;

    let current_dir = std::env::current_dir()?;

    if !args.quiet {
        println!(
            "Initializing actiongraph workspace{}...",
            args.prefix
                .as_ref()
                .map(|p| format!(" with prefix '{p}'"))
                .unwrap_or_default()
        );
    }

    let result = init::init(&current_dir, args.prefix.as_deref()).await?;

    if !args.quiet {
        println!("Initialized actiongraph in {}", result.actiongraph_dir.display());
        println!("  Config:    {}", result.config_file.display());
        println!("  Actions:   {}", result.actions_file.display());
        println!("  ID prefix: {}", result.prefix);
    }

    Ok(())
}

/// Execute the create command
pub async fn execute_create(
    app: &mut App,
    args: &CreateArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let new_action = NewAction {
        title: args.title.clone(),
        description: args.description.clone(),
        vision: args.vision.clone(),
        parent_id: args.parent.clone(),
        depends_on_ids: args.deps.clone(),
    };

    let action = app.graph_mut().create_action(new_action).await?;

    match output_mode {
        OutputMode::Json => output::print_json(&action)?,
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            println!(
                "{} {}",
                output::success("Created action:", &config),
                action.id
            );
        }
    }

    Ok(())
}

/// Execute the show command
pub async fn execute_show(app: &App, args: &ShowArgs, output_mode: OutputMode) -> Result<()> {
    let graph = app.graph();
    let action = get_or_not_found(app, &args.id).await?;

    let parent = graph.ancestor_chain(&args.id).await?.into_iter().next();
    let children = graph.children(&args.id).await?;

    let mut prerequisites = Vec::new();
    let mut dependents = Vec::new();
    for edge in graph.list_dependency_edges(&args.id).await? {
        if edge.dst == args.id {
            prerequisites.push(get_or_not_found(app, &edge.src).await?);
        } else {
            dependents.push(get_or_not_found(app, &edge.dst).await?);
        }
    }

    let details = ActionDetails {
        action,
        parent,
        children,
        prerequisites,
        dependents,
    };
    output::print_action_details(&details, output_mode)?;

    Ok(())
}

/// Execute the list command
pub async fn execute_list(app: &App, args: &ListArgs, output_mode: OutputMode) -> Result<()> {
    let mut actions = match &args.parent {
        Some(parent) => app.graph().children(parent).await?,
        None => app.graph().list_actions().await?,
    };

    if args.done {
        actions.retain(|a| a.done);
    } else if args.pending {
        actions.retain(|a| !a.done);
    }

    output::print_actions(&actions, output_mode)?;
    Ok(())
}

/// Execute the update command
pub async fn execute_update(
    app: &mut App,
    args: &UpdateArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let clearable = |text: &Option<String>| {
        text.as_ref()
            .map(|t| if t.is_empty() { None } else { Some(t.clone()) })
    };
    let updates = ActionUpdate {
        title: args.title.clone(),
        description: clearable(&args.description),
        vision: clearable(&args.vision),
        done: None,
    };
    if updates.is_empty() {
        anyhow::bail!("Nothing to update: pass --title, --description or --vision");
    }

    let current = get_or_not_found(app, &args.id).await?;
    let action = app
        .graph_mut()
        .update_action(&args.id, updates, current.version)
        .await?;

    match output_mode {
        OutputMode::Json => output::print_json(&action)?,
        OutputMode::Text => println!("Updated action: {}", action.id),
    }
    Ok(())
}

/// Execute the done and undone commands
///
/// Every ID is processed independently; failures are reported together and
/// make the command exit non-zero.
pub async fn execute_set_done(
    app: &mut App,
    args: &DoneArgs,
    done: bool,
    output_mode: OutputMode,
) -> Result<()> {
    let mut result = BatchResult::default();

    for id in &args.ids {
        match set_done(app, id, done).await {
            Ok(action) => result.succeeded.push(action),
            Err(e) => result.failed.push(BatchError {
                action_id: id.clone(),
                error: e.to_string(),
            }),
        }
    }

    let verb = if done { "Completed" } else { "Reopened" };
    output_batch_result(&result, verb, output_mode)?;

    if result.has_failures() {
        anyhow::bail!(
            "{} of {} action(s) failed",
            result.failed.len(),
            result.total()
        );
    }
    Ok(())
}

async fn set_done(app: &mut App, id: &ActionId, done: bool) -> crate::error::Result<Action> {
    let current = get_or_not_found(app, id).await?;
    app.graph_mut()
        .update_action(id, ActionUpdate::done(done), current.version)
        .await
}

fn output_batch_result(result: &BatchResult, verb: &str, output_mode: OutputMode) -> Result<()> {
    match output_mode {
        OutputMode::Json => output::print_json(result)?,
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            if !result.succeeded.is_empty() {
                let ids: Vec<_> = result.succeeded.iter().map(|a| a.id.to_string()).collect();
                println!(
                    "{} {} action(s): {}",
                    output::success(verb, &config),
                    result.succeeded.len(),
                    ids.join(", ")
                );
            }
            if !result.failed.is_empty() {
                eprintln!(
                    "{} {} action(s):",
                    output::error("Failed", &config),
                    result.failed.len()
                );
                for err in &result.failed {
                    eprintln!("  {}: {}", err.action_id, err.error);
                }
            }
        }
    }
    Ok(())
}

/// Execute the delete command
pub async fn execute_delete(
    app: &mut App,
    args: &DeleteArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let policy = args
        .policy
        .into_policy(args.new_parent.clone())
        .map_err(anyhow::Error::msg)?;

    let removed = app.graph_mut().delete_action(&args.id, &policy).await?;

    match output_mode {
        OutputMode::Json => output::print_json(&serde_json::json!({
            "policy": policy,
            "deleted": removed,
        }))?,
        OutputMode::Text => {
            let ids: Vec<_> = removed.iter().map(ToString::to_string).collect();
            println!("Deleted {} action(s): {}", removed.len(), ids.join(", "));
        }
    }
    Ok(())
}

/// Execute the move command
pub async fn execute_move(app: &mut App, args: &MoveArgs, output_mode: OutputMode) -> Result<()> {
    let edge = app.graph_mut().move_action(&args.id, &args.new_parent).await?;

    match output_mode {
        OutputMode::Json => output::print_json(&edge)?,
        OutputMode::Text => println!("Moved {} under {}", edge.dst, edge.src),
    }
    Ok(())
}

/// Execute the detach command
pub async fn execute_detach(app: &mut App, args: &IdArgs, output_mode: OutputMode) -> Result<()> {
    let removed = app.graph_mut().detach_action(&args.id).await?;

    match output_mode {
        OutputMode::Json => output::print_json(&serde_json::json!({
            "action_id": args.id,
            "removed": removed,
        }))?,
        OutputMode::Text => match removed {
            Some(edge) => println!("Detached {} from {}", args.id, edge.src),
            None => println!("{} is already a root", args.id),
        },
    }
    Ok(())
}

/// Execute the dep command
pub async fn execute_dep(app: &mut App, args: &DepArgs, output_mode: OutputMode) -> Result<()> {
    match &args.action {
        DepAction::Add { action, depends_on } => {
            let edge = app.graph_mut().add_dependency(action, depends_on).await?;
            match output_mode {
                OutputMode::Json => output::print_json(&edge)?,
                OutputMode::Text => println!("Added dependency: {action} depends on {depends_on}"),
            }
        }
        DepAction::Rm { action, depends_on } => {
            let edge = app.graph_mut().remove_dependency(action, depends_on).await?;
            match output_mode {
                OutputMode::Json => output::print_json(&edge)?,
                OutputMode::Text => {
                    println!("Removed dependency: {action} no longer depends on {depends_on}")
                }
            }
        }
        DepAction::List { action } => {
            get_or_not_found(app, action).await?;
            let edges = app.graph().list_dependency_edges(action).await?;
            output::print_edges(&edges, output_mode)?;
        }
    }
    Ok(())
}

/// Execute the ready command
pub async fn execute_ready(app: &App, output_mode: OutputMode) -> Result<()> {
    let workable = app.graph().compute_workable().await?;
    output::print_actions(&workable, output_mode)?;
    Ok(())
}

/// Execute the tree command
pub async fn execute_tree(app: &App, args: &TreeArgs, output_mode: OutputMode) -> Result<()> {
    let graph = app.graph();
    if let Some(root) = &args.root {
        get_or_not_found(app, root).await?;
    }

    let actions = graph.list_actions().await?;
    let edges = graph.store().list_edges(&EdgeFilter::default()).await?;
    let workable: HashSet<ActionId> = graph
        .compute_workable()
        .await?
        .into_iter()
        .map(|a| a.id)
        .collect();

    let forest = output::build_forest(&actions, &edges, &workable, args.root.as_ref());
    output::print_tree(&forest, output_mode)?;
    Ok(())
}

/// Execute the ancestors command
pub async fn execute_ancestors(app: &App, args: &IdArgs, output_mode: OutputMode) -> Result<()> {
    let chain = app.graph().ancestor_chain(&args.id).await?;
    output::print_actions(&chain, output_mode)?;
    Ok(())
}

/// Execute the repair-mirrors command
pub async fn execute_repair_mirrors(app: &mut App, output_mode: OutputMode) -> Result<()> {
    let report = app.graph_mut().repair_family_mirrors().await?;

    match output_mode {
        OutputMode::Json => output::print_json(&report)?,
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            println!(
                "Checked {} family edge(s), added {} mirror(s)",
                report.checked,
                report.added.len()
            );
            for edge in &report.added {
                println!("  {} {edge}", output::success("+", &config));
            }
            for edge in &report.skipped {
                println!(
                    "  {} {edge} (would create a cycle)",
                    output::warning("skipped", &config)
                );
            }
        }
    }
    Ok(())
}

async fn get_or_not_found(app: &App, id: &ActionId) -> crate::error::Result<Action> {
    crate::store::require_action(app.graph().store(), id).await
}
