use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// hirforge - build and inspect SSA high-level IR from bytecode listings
#[derive(Debug, Parser)]
#[command(name = "hirforge", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Output format of the `hir` subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HirFormat {
    /// Block-by-block listing of phis and instructions
    Text,
    /// Graphviz digraph
    Dot,
    /// Per-block summary as JSON
    Json,
}

/// Builder switches shared by the subcommands that build a graph.
#[derive(Debug, Clone, Parser)]
pub struct BuildOptions {
    /// Disable constant folding and algebraic simplification.
    #[arg(long)]
    pub no_idealize: bool,

    /// Disable local value numbering.
    #[arg(long)]
    pub no_lvn: bool,

    /// Reject methods whose last block falls off the end of the code.
    #[arg(long)]
    pub strict: bool,

    /// Print every event the builder recorded after the output.
    #[arg(long)]
    pub events: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build the HIR of a method and print it.
    Hir {
        /// Path to the method listing.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Method to build (defaults to the only method in the listing).
        #[arg(long, value_name = "NAME")]
        method: Option<String>,

        /// Output format: text, dot, json.
        #[arg(long, value_enum, default_value = "text")]
        format: HirFormat,

        #[command(flatten)]
        build: BuildOptions,
    },

    /// Build the HIR of a method and print the copies that resolve its phis.
    Moves {
        /// Path to the method listing.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Method to build (defaults to the only method in the listing).
        #[arg(long, value_name = "NAME")]
        method: Option<String>,

        #[command(flatten)]
        build: BuildOptions,
    },

    /// List the basic blocks discovered in a method.
    Blocks {
        /// Path to the method listing.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Method to inspect (defaults to the only method in the listing).
        #[arg(long, value_name = "NAME")]
        method: Option<String>,
    },
}
