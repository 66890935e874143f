use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tp", about = concat!("taskpad v", env!("CARGO_PKG_VERSION"), " - a small local task list"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory holding the task list and config.toml (default: ./.taskpad)
    #[arg(short = 'C', long = "data-dir", global = true)]
    pub data_dir: Option<String>,

    /// Fetch the first-run seed list from this URL instead of the configured one
    #[arg(long, global = true)]
    pub seed_url: Option<String>,

    /// Never fetch the seed list, even when the task list is empty
    #[arg(long, global = true)]
    pub no_seed: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List tasks (default when no subcommand is given)
    List,
    /// Add a task to the end of the list
    Add(AddArgs),
    /// Toggle a task between done and not done
    Toggle(IdArg),
    /// Delete a task
    #[command(alias = "rm")]
    Delete(IdArg),
    /// Show completion progress
    Stats,
}

#[derive(Args)]
pub struct AddArgs {
    /// Task title (trimmed, 1-100 characters)
    pub title: String,
}

#[derive(Args)]
pub struct IdArg {
    /// Task ID
    pub id: i64,
}
