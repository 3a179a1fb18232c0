pub mod app;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tablemap")]
#[command(about = "Inspect and edit a persisted key/value collection")]
pub struct Cli {
    /// Collection name (sanitized into the table name)
    #[arg(long)]
    pub name: String,

    /// PostgreSQL connection string; falls back to PGUSER/PGPASSWORD/PGHOST/PGPORT/PGDATABASE
    #[arg(long, env = "DATABASE_URL")]
    pub url: Option<String>,

    /// Skip loading every row on startup
    #[arg(long)]
    pub lazy: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print every row
    Dump,
    /// Print the value stored under KEY
    Get { key: String },
    /// Store VALUE under KEY
    Set {
        key: String,
        value: String,
        /// Parse VALUE as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove KEY
    Delete { key: String },
    /// Report whether KEY exists
    Has { key: String },
    /// Print the number of rows
    Count,
    /// Remove every row
    Clear {
        /// Confirm the irreversible truncate
        #[arg(long)]
        yes: bool,
    },
}
