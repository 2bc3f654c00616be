//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum, ValueHint};

use crate::application::services::Placement;
use crate::domain::TreeId;

/// Nested-set tree engine: hierarchies stored as flat left/right indexed rows
#[derive(Parser, Debug)]
#[command(name = "nestset")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output, repeat for more (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Row store file (overrides store_path from config)
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub store: Option<PathBuf>,

    /// Read settings from this file instead of the layered config
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the root of a new tree
    Root {
        #[command(flatten)]
        payload: PayloadArgs,
    },

    /// Insert a new node relative to an existing one
    Add {
        /// Key of the node to insert relative to
        target: u64,
        /// Position relative to the target
        #[arg(long = "as", value_enum, default_value_t = PlacementArg::LastChild)]
        placement: PlacementArg,
        #[command(flatten)]
        payload: PayloadArgs,
    },

    /// Move a node and its subtree
    Move {
        /// Key of the node to move
        node: u64,
        /// Key of the node to move relative to
        target: u64,
        /// Position relative to the target
        #[arg(long = "as", value_enum, default_value_t = PlacementArg::LastChild)]
        placement: PlacementArg,
    },

    /// Delete a node with its subtree
    Delete {
        /// Key of the node to delete
        node: u64,
        /// Delete only the node; its children move up one level
        #[arg(short, long)]
        keep_children: bool,
    },

    /// Delete whole trees
    DropTree {
        /// Tree to delete (default: configured tree_value)
        #[arg(short, long, conflicts_with = "all")]
        tree: Option<TreeId>,
        /// Delete every tree in the store
        #[arg(long)]
        all: bool,
    },

    /// Show a tree
    Show {
        /// Tree to show (default: configured tree_value)
        #[arg(short, long)]
        tree: Option<TreeId>,
        /// Show the subtree under this node instead
        #[arg(short, long, conflicts_with = "tree")]
        node: Option<u64>,
    },

    /// Print a subtree as annotated rows (level, key, parent, flags, path)
    Dump {
        /// Tree to dump (default: configured tree_value)
        #[arg(short, long)]
        tree: Option<TreeId>,
        /// Dump the subtree under this node instead
        #[arg(short, long, conflicts_with = "tree")]
        node: Option<u64>,
        /// Leave out the subtree root itself
        #[arg(long)]
        no_root: bool,
    },

    /// Show position and relationships of a node
    Info {
        /// Key of the node
        node: u64,
    },

    /// Verify the nested-set numbering
    Check {
        /// Tree to check (default: every tree)
        #[arg(short, long)]
        tree: Option<TreeId>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Title and attributes of a new node.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct PayloadArgs {
    /// Node title
    #[arg(short = 'T', long)]
    pub title: Option<String>,
    /// Attribute as name=value, repeatable
    #[arg(short, long = "attr", value_parser = parse_attribute)]
    pub attributes: Vec<(String, String)>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Create config template
    Init {
        /// Create global config
        #[arg(short, long)]
        global: bool,
    },

    /// Show config paths
    Path,
}

/// Placement as typed on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementArg {
    NextSibling,
    PreviousSibling,
    FirstChild,
    LastChild,
}

impl From<PlacementArg> for Placement {
    fn from(arg: PlacementArg) -> Self {
        match arg {
            PlacementArg::NextSibling => Placement::NextSiblingOf,
            PlacementArg::PreviousSibling => Placement::PreviousSiblingOf,
            PlacementArg::FirstChild => Placement::FirstChildOf,
            PlacementArg::LastChild => Placement::LastChildOf,
        }
    }
}

fn parse_attribute(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("attribute name is empty in '{}'", s));
    }
    Ok((name.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn given_move_with_placement_when_parsing_then_maps_to_placement() {
        let cli = Cli::parse_from(["nestset", "move", "4", "2", "--as", "first-child"]);
        match cli.command {
            Some(Commands::Move {
                node,
                target,
                placement,
            }) => {
                assert_eq!((node, target), (4, 2));
                assert_eq!(Placement::from(placement), Placement::FirstChildOf);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn given_attribute_without_equals_when_parsing_then_rejected() {
        assert!(parse_attribute("color").is_err());
        assert!(parse_attribute("=red").is_err());
        assert_eq!(
            parse_attribute("color=dark=red").unwrap(),
            ("color".to_string(), "dark=red".to_string())
        );
    }
}
