//! # Trellis CLI Module
//!
//! Command-line access to a graph document.
//!
//! ## Available Commands
//!
//! - `init` - Create an empty graph document
//! - `status` - Show entity and group counts
//! - `get` - Read attributes through the indexer
//! - `set` - Write one value through the indexer
//! - `delete` - Remove attributes through the indexer
//! - `query` - Run a predicate query
//!
//! Selectors use the indexer's string syntax: `:` for everything, `[a,b]` for
//! a key list, anything else is a single key.

mod commands;

use crate::config::Settings;
use crate::error::CliError;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Trellis - attribute store over nodes, edges and groups
#[derive(Parser, Debug)]
#[command(name = "trellis")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the graph document [default: trellis.json]
    #[arg(short = 'g', long, global = true)]
    pub graph: Option<PathBuf>,

    /// Path to a TOML config file [default: trellis.toml if present]
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Log every hooked mutation to the `trellis::audit` target
    #[arg(long, global = true)]
    pub audit: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Entity axis argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EntityArg {
    Node,
    Edge,
}

/// Reduction argument for singular queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReduceArg {
    Max,
    Min,
    First,
    Last,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an empty graph document
    Init {
        /// Overwrite an existing document
        #[arg(short, long)]
        force: bool,
    },

    /// Show graph status
    Status,

    /// Read attributes
    Get {
        #[arg(value_enum)]
        entity: EntityArg,

        /// Entity selector
        selector: String,

        /// Attribute selector
        #[arg(default_value = ":")]
        attributes: String,
    },

    /// Create or overwrite attributes with one value
    Set {
        #[arg(value_enum)]
        entity: EntityArg,

        /// Entity selector
        selector: String,

        /// Attribute selector
        attributes: String,

        /// JSON value; bare words are strings
        value: String,

        /// Print the resulting document instead of saving it
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove attributes
    Delete {
        #[arg(value_enum)]
        entity: EntityArg,

        /// Entity selector
        selector: String,

        /// Attribute selector
        #[arg(default_value = ":")]
        attributes: String,

        /// Print the resulting document instead of saving it
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a predicate query
    Query {
        #[arg(value_enum)]
        entity: EntityArg,

        /// Only members of this group
        #[arg(long)]
        group: Option<String>,

        /// Only entities carrying this attribute (repeatable)
        #[arg(long = "has")]
        has: Vec<String>,

        /// Attribute condition such as `age>=30` (repeatable)
        #[arg(short = 'w', long = "where")]
        conditions: Vec<String>,

        /// Return the values of this attribute instead of indices
        #[arg(long, conflicts_with = "attributes")]
        values: Option<String>,

        /// Return full attribute sets instead of indices
        #[arg(long)]
        attributes: bool,

        /// Reduce to a single result
        #[arg(long, value_enum, conflicts_with_all = ["count", "attributes"])]
        reduce: Option<ReduceArg>,

        /// Count entities carrying the `--values` attribute
        #[arg(long, requires = "values")]
        count: bool,

        /// Evaluate once per group
        #[arg(long)]
        grouped: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments and layered settings.
pub fn execute(command: Option<Commands>, settings: &Settings) -> Result<(), CliError> {
    match command {
        Some(Commands::Init { force }) => cmd_init(settings, force),
        Some(Commands::Status) | None => cmd_status(settings),
        Some(Commands::Get {
            entity,
            selector,
            attributes,
        }) => cmd_get(settings, entity, &selector, &attributes),
        Some(Commands::Set {
            entity,
            selector,
            attributes,
            value,
            dry_run,
        }) => cmd_set(settings, entity, &selector, &attributes, &value, dry_run),
        Some(Commands::Delete {
            entity,
            selector,
            attributes,
            dry_run,
        }) => cmd_delete(settings, entity, &selector, &attributes, dry_run),
        Some(Commands::Query {
            entity,
            group,
            has,
            conditions,
            values,
            attributes,
            reduce,
            count,
            grouped,
        }) => {
            let request = QueryRequest {
                entity,
                group,
                has,
                conditions,
                values,
                attributes,
                reduce,
                count,
                grouped,
            };
            cmd_query(settings, &request)
        }
    }
}
