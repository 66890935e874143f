use std::error::Error;
use std::path::PathBuf;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::cli::validate::validate_title;
use crate::io::config_io;
use crate::io::seed::HttpSeedSource;
use crate::io::storage::FileStore;
use crate::model::config::SeedConfig;
use crate::ops::task_ops;
use crate::store::{StoreError, TaskStore};

/// Data directory used when `-C` is not given
pub const DEFAULT_DATA_DIR: &str = ".taskpad";

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), Box<dyn Error>> {
    let json = cli.json;
    let settings = Settings::from_cli(&cli)?;

    match cli.command.unwrap_or(Commands::List) {
        Commands::List => cmd_list(&settings, json),
        Commands::Add(args) => cmd_add(&settings, args, json),
        Commands::Toggle(args) => cmd_toggle(&settings, args, json),
        Commands::Delete(args) => cmd_delete(&settings, args, json),
        Commands::Stats => cmd_stats(&settings, json),
    }
}

// ---------------------------------------------------------------------------
// Session setup
// ---------------------------------------------------------------------------

/// Resolved data directory and seed settings for one invocation
struct Settings {
    data_dir: PathBuf,
    seed: SeedConfig,
}

impl Settings {
    fn from_cli(cli: &Cli) -> Result<Self, Box<dyn Error>> {
        let data_dir = match cli.data_dir {
            Some(ref dir) => PathBuf::from(dir),
            None => std::env::current_dir()?.join(DEFAULT_DATA_DIR),
        };
        let mut seed = config_io::read_config(&data_dir)?.seed;
        if let Some(ref url) = cli.seed_url {
            seed.url = url.clone();
        }
        if cli.no_seed {
            seed.enabled = false;
        }
        Ok(Settings { data_dir, seed })
    }
}

/// Open the task list and run first-run seeding.
fn open_store(settings: &Settings) -> Result<TaskStore<FileStore>, StoreError> {
    let mut store =
        TaskStore::open(FileStore::new(&settings.data_dir)).with_seed_limit(settings.seed.limit);

    if !settings.seed.enabled {
        store.skip_seed();
        return Ok(store);
    }
    if store.needs_seed() {
        eprintln!("Loading your tasks...");
    }
    store.initialize(&HttpSeedSource::from_config(&settings.seed))?;
    Ok(store)
}

/// Open the store, reporting a failed seed as a warning instead of failing
/// the command.
fn open_store_lenient(settings: &Settings) -> Result<TaskStore<FileStore>, StoreError> {
    let store = open_store(settings)?;
    if let Some(err) = store.error() {
        eprintln!("warning: {}", err);
    }
    Ok(store)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Read command handlers
// ---------------------------------------------------------------------------

fn cmd_list(settings: &Settings, json: bool) -> Result<(), Box<dyn Error>> {
    let store = open_store(settings)?;
    let stats = store.stats();

    if json {
        print_json(&ListJson {
            tasks: store.tasks(),
            stats: stats_to_json(&stats),
            error: store.error(),
        })?;
    } else if store.error().is_none() {
        for line in format_task_list(store.tasks(), &stats) {
            println!("{}", line);
        }
    }

    // The error replaces the list view
    match store.error() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn cmd_stats(settings: &Settings, json: bool) -> Result<(), Box<dyn Error>> {
    let store = open_store_lenient(settings)?;
    let stats = store.stats();
    if json {
        print_json(&stats_to_json(&stats))?;
    } else {
        println!("{}", format_progress(&stats));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write command handlers
// ---------------------------------------------------------------------------

fn cmd_add(settings: &Settings, args: AddArgs, json: bool) -> Result<(), Box<dyn Error>> {
    // Reject bad input before touching storage or the network
    let title = validate_title(&args.title)?;

    let mut store = open_store_lenient(settings)?;
    let task = store.add_task(title)?;

    if json {
        print_json(&task)?;
    } else {
        println!("{}", task.id);
    }
    Ok(())
}

fn cmd_toggle(settings: &Settings, args: IdArg, json: bool) -> Result<(), Box<dyn Error>> {
    let mut store = open_store_lenient(settings)?;
    let changed = store.toggle_task(args.id)?;
    let completed = task_ops::find_task(store.tasks(), args.id).map(|t| t.completed);

    if json {
        print_json(&ChangeJson {
            id: args.id,
            changed,
            completed,
        })?;
    } else {
        match completed {
            Some(true) => println!("{} → done", args.id),
            Some(false) => println!("{} → todo", args.id),
            None => eprintln!("no task with id {}", args.id),
        }
    }
    Ok(())
}

fn cmd_delete(settings: &Settings, args: IdArg, json: bool) -> Result<(), Box<dyn Error>> {
    let mut store = open_store_lenient(settings)?;
    let changed = store.delete_task(args.id)?;

    if json {
        print_json(&ChangeJson {
            id: args.id,
            changed,
            completed: None,
        })?;
    } else if changed {
        println!("deleted {}", args.id);
    } else {
        eprintln!("no task with id {}", args.id);
    }
    Ok(())
}
