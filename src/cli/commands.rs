//! Command dispatch

use std::io;
use std::path::PathBuf;

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::services::{Placement, TreeService};
use crate::application::ApplicationError;
use crate::cli::args::{Cli, Commands, ConfigCommands, PayloadArgs, PlacementArg};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::cli::render::TreeRender;
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::{DumpEntry, Nested, Node, NodeKey, Partition, TreeId, TreeMode};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage("no command given, see --help".into()));
    };

    match command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            return Ok(());
        }
        Commands::Config { command } => return cmd_config(cli, command),
        _ => {}
    }

    let container = ServiceContainer::new(load_settings(cli)?)?;
    let trees = &container.trees;

    match command {
        Commands::Root { payload } => cmd_root(trees, payload),
        Commands::Add {
            target,
            placement,
            payload,
        } => cmd_add(trees, *target, *placement, payload),
        Commands::Move {
            node,
            target,
            placement,
        } => cmd_move(trees, *node, *target, (*placement).into()),
        Commands::Delete {
            node,
            keep_children,
        } => cmd_delete(trees, *node, *keep_children),
        Commands::DropTree { tree, all } => cmd_drop_tree(trees, *tree, *all),
        Commands::Show { tree, node } => cmd_show(trees, *tree, *node),
        Commands::Dump {
            tree,
            node,
            no_root,
        } => cmd_dump(trees, *tree, *node, !*no_root),
        Commands::Info { node } => cmd_info(trees, *node),
        Commands::Check { tree } => cmd_check(trees, *tree),
        Commands::Config { .. } | Commands::Completion { .. } => Ok(()),
    }
}

fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_file(path)?,
        None => Settings::load(Some(&working_dir()))?,
    };
    if let Some(store) = &cli.store {
        settings.store_path = store.clone();
    }
    debug!("store: {}", settings.store_path.display());
    Ok(settings)
}

fn node_from(payload: &PayloadArgs) -> Node {
    let mut node = Node::new();
    node.title = payload.title.clone();
    for (name, value) in &payload.attributes {
        node.attributes.insert(name.clone(), value.clone());
    }
    node
}

fn find(trees: &TreeService, key: u64) -> CliResult<Node> {
    trees
        .find(NodeKey(key))?
        .ok_or_else(|| CliError::NotFound(format!("node {}", key)))
}

/// Partition named on the command line, or the configured default.
fn partition(trees: &TreeService, tree: Option<TreeId>) -> CliResult<Partition> {
    match (trees.mode(), tree) {
        (TreeMode::Single, None) => Ok(Partition::Whole),
        (TreeMode::Single, Some(_)) => Err(CliError::InvalidArgs(
            "--tree needs a store with tree_field configured".into(),
        )),
        (TreeMode::Multi, tree) => Ok(trees.resolve(tree.map(Partition::Tree))?),
    }
}

/// Subtree root for show/dump: an explicit node or the root of a tree.
fn subtree_root(trees: &TreeService, tree: Option<TreeId>, node: Option<u64>) -> CliResult<Node> {
    if let Some(key) = node {
        return find(trees, key);
    }
    let partition = partition(trees, tree)?;
    trees
        .root(Some(partition))?
        .ok_or_else(|| CliError::NotFound(format!("root of {}", partition)))
}

#[instrument(skip(trees))]
fn cmd_root(trees: &TreeService, payload: &PayloadArgs) -> CliResult<()> {
    let mut node = node_from(payload);
    let key = trees.new_root(&mut node)?;
    match node.tree_id() {
        Some(tree_id) => output::action("Created", &format!("root {} of tree {}", key, tree_id)),
        None => output::action("Created", &format!("root {}", key)),
    }
    Ok(())
}

#[instrument(skip(trees, payload))]
fn cmd_add(
    trees: &TreeService,
    target: u64,
    placement: PlacementArg,
    payload: &PayloadArgs,
) -> CliResult<()> {
    let placement = Placement::from(placement);
    let mut node = node_from(payload);
    trees.insert(&mut node, placement, &find(trees, target)?)?;
    output::action("Added", &format!("{} as {} #{}", node, placement, target));
    Ok(())
}

#[instrument(skip(trees))]
fn cmd_move(trees: &TreeService, node: u64, target: u64, placement: Placement) -> CliResult<()> {
    let mut moving = find(trees, node)?;
    let target = find(trees, target)?;
    trees.move_to(&mut moving, placement, &target)?;
    output::action("Moved", &moving);
    Ok(())
}

#[instrument(skip(trees))]
fn cmd_delete(trees: &TreeService, node: u64, keep_children: bool) -> CliResult<()> {
    let node = find(trees, node)?;
    if keep_children {
        trees.delete_node(&node)?;
        output::action("Deleted", &node);
    } else {
        let deleted = trees.delete_subtree(&node)?;
        output::action("Deleted", &format!("{} ({} rows)", node, deleted));
    }
    Ok(())
}

#[instrument(skip(trees))]
fn cmd_drop_tree(trees: &TreeService, tree: Option<TreeId>, all: bool) -> CliResult<()> {
    let deleted = if all {
        trees.delete_all_trees()?
    } else {
        let partition = partition(trees, tree)?;
        trees.delete_tree(partition)?
    };
    output::action("Dropped", &format!("{} rows", deleted));
    Ok(())
}

fn collect_dump(trees: &TreeService, root: &Node, include_root: bool) -> CliResult<Vec<DumpEntry>> {
    let entries = trees
        .dump(root, include_root)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(ApplicationError::from)?;
    Ok(entries)
}

#[instrument(skip(trees))]
fn cmd_show(trees: &TreeService, tree: Option<TreeId>, node: Option<u64>) -> CliResult<()> {
    let every_tree = trees.mode() == TreeMode::Multi
        && trees.config().tree_value.is_none()
        && tree.is_none()
        && node.is_none();
    if every_tree {
        let ids = trees.tree_ids()?;
        if ids.is_empty() {
            output::warning("store holds no trees");
        }
        for id in ids {
            show_subtree(trees, &subtree_root(trees, Some(id), None)?, Some(id))?;
        }
        return Ok(());
    }
    let root = subtree_root(trees, tree, node)?;
    show_subtree(trees, &root, root.tree_id())
}

fn show_subtree(trees: &TreeService, root: &Node, tree: Option<TreeId>) -> CliResult<()> {
    if let Some(id) = tree {
        output::header(&format!("tree {}", id));
    }
    let entries = collect_dump(trees, root, true)?;
    if let Some(rendered) = entries.to_tree_string() {
        output::info(&rendered);
    }
    Ok(())
}

#[instrument(skip(trees))]
fn cmd_dump(
    trees: &TreeService,
    tree: Option<TreeId>,
    node: Option<u64>,
    include_root: bool,
) -> CliResult<()> {
    let root = subtree_root(trees, tree, node)?;
    for entry in collect_dump(trees, &root, include_root)? {
        output::info(&output::dump_row(&entry));
    }
    Ok(())
}

#[instrument(skip(trees))]
fn cmd_info(trees: &TreeService, key: u64) -> CliResult<()> {
    let node = find(trees, key)?;
    let mode = trees.mode();
    let nav = trees.navigator();

    output::header(&node);
    if let Some(tree_id) = node.tree_id() {
        output::detail(&format!("tree: {}", tree_id));
    }
    output::detail(&format!("depth: {}", nav.depth(&node)?));
    let descendants = mode.child_count(&node).map_err(ApplicationError::from)?;
    output::detail(&format!("descendants: {}", descendants));
    output::detail(&format!("children: {}", nav.children(&node)?.len()));
    let describe = |n: Option<Node>| n.map(|n| n.to_string()).unwrap_or_else(|| "-".into());
    output::detail(&format!("parent: {}", describe(nav.parent(&node)?)));
    output::detail(&format!("previous sibling: {}", describe(nav.previous_sibling(&node)?)));
    output::detail(&format!("next sibling: {}", describe(nav.next_sibling(&node)?)));
    for (name, value) in &node.attributes {
        output::detail(&format!("{} = {}", name, value));
    }
    Ok(())
}

#[instrument(skip(trees))]
fn cmd_check(trees: &TreeService, tree: Option<TreeId>) -> CliResult<()> {
    let partition = match tree {
        Some(_) => partition(trees, tree)?,
        None => Partition::Whole,
    };
    match trees.verify(partition) {
        Ok(rows) => {
            output::success(&format!("{}: {} rows consistent", partition, rows));
            Ok(())
        }
        Err(e) => {
            output::failure(&e);
            Err(e.into())
        }
    }
}

fn cmd_config(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = load_settings(cli)?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Path => {
            let global = global_config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".into());
            output::detail(&format!("global: {}", global));
            let local = local_config_path(&working_dir());
            output::detail(&format!("local: {}", local.display()));
        }
        ConfigCommands::Init { global } => {
            let path = if *global {
                global_config_path().ok_or_else(|| {
                    CliError::Usage("cannot determine the global config directory".into())
                })?
            } else {
                local_config_path(&working_dir())
            };
            if path.exists() {
                return Err(CliError::Usage(format!("{} already exists", path.display())));
            }
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)
                    .map_err(|e| InfraError::io(format!("create {}", dir.display()), e))?;
            }
            std::fs::write(&path, Settings::template())
                .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
            output::action("Created", &path.display());
        }
    }
    Ok(())
}

fn working_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
