use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "keepsake",
    about = "Inspect and edit Keepsake save files",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Base directory holding the save directory
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// TOML file with [backend] and [controller] tables
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// List save slots
    List,
    /// List the chunks of a save with their record counts
    Chunks(SlotArgs),
    /// Print the records of a save
    Show(ShowArgs),
    /// Print one record's payload
    Get(RecordArgs),
    /// Write a JSON value into a record, creating the save if needed
    Put(PutArgs),
    /// Remove one record
    Rm(RecordArgs),
    /// Delete a save slot
    Delete(SlotArgs),
}

#[derive(Args)]
pub struct SlotArgs {
    pub slot: String,
}

#[derive(Args)]
pub struct ShowArgs {
    pub slot: String,
    /// Only show this chunk
    #[arg(short, long)]
    pub chunk: Option<String>,
}

#[derive(Args)]
pub struct RecordArgs {
    pub slot: String,
    pub object: String,
    /// Chunk id; the default chunk when omitted
    #[arg(short, long)]
    pub chunk: Option<String>,
}

#[derive(Args)]
pub struct PutArgs {
    pub slot: String,
    pub object: String,
    /// JSON value to store
    pub value: String,
    /// Chunk id; the default chunk when omitted
    #[arg(short, long)]
    pub chunk: Option<String>,
}
