// Forbid unwrap() in production code to prevent panics from corrupt data.
// Test code is allowed to use unwrap() for convenience.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use triedb::config::CliConfig;
use triedb::storage::{CacheStorage, FileStorage};
use triedb::trie::{Trie, TrieOptions};

const USAGE: &str = "usage: triedb <file> <command>

commands:
  init                 create an empty trie file
  get <key>            print the value stored under <key>
  set <key> <value>    store <value> under <key>
  delete <key>         remove <key>
  list [prefix]        print every key starting with [prefix]
  count                print the number of stored keys";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Init,
    Get(String),
    Set(String, String),
    Delete(String),
    List(String),
    Count,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "triedb=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match CliConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (path, command) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(message) => {
            eprintln!("{message}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    tracing::debug!(
        "Loaded configuration: page_size={}, node_cache={:?}, consistency_check={}",
        config.page_size,
        config.node_cache_capacity,
        config.consistency_check
    );

    match run(&path, command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}: {e}", path.display());
            ExitCode::FAILURE
        }
    }
}

fn parse_args(args: &[String]) -> Result<(PathBuf, Command), String> {
    let [path, name, rest @ ..] = args else {
        return Err("missing file or command".to_string());
    };
    let command = match (name.as_str(), rest) {
        ("init", []) => Command::Init,
        ("get", [key]) => Command::Get(key.clone()),
        ("set", [key, value]) => Command::Set(key.clone(), value.clone()),
        ("delete", [key]) => Command::Delete(key.clone()),
        ("list", []) => Command::List(String::new()),
        ("list", [prefix]) => Command::List(prefix.clone()),
        ("count", []) => Command::Count,
        _ => return Err(format!("invalid command: {}", args[1..].join(" "))),
    };
    Ok((PathBuf::from(path), command))
}

fn run(path: &Path, command: Command, config: &CliConfig) -> Result<(), Box<dyn std::error::Error>> {
    if command == Command::Init {
        let file = FileStorage::create(path)?;
        let storage = CacheStorage::with_page_size(file, config.page_size);
        let trie = Trie::init(storage, TrieOptions::default())?;
        trie.into_storage().close()?;
        println!("initialized {}", path.display());
        return Ok(());
    }

    let file = FileStorage::open(path)?;
    let storage = CacheStorage::with_page_size(file, config.page_size);
    let mut trie = Trie::open(storage, config.trie_options())?;

    match command {
        Command::Init => {}
        Command::Get(key) => match trie.get(key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(not found)"),
        },
        Command::Set(key, value) => {
            trie.set(key.as_bytes(), value.as_bytes())?;
        }
        Command::Delete(key) => {
            if !trie.delete(key.as_bytes())? {
                println!("(not found)");
            }
        }
        Command::List(prefix) => {
            for row in trie.enumerate_starting_with(prefix.as_bytes()) {
                let row = row?;
                println!("{}", String::from_utf8_lossy(&row.key));
            }
        }
        Command::Count => println!("{}", trie.record_count()),
    }

    trie.into_storage().close()?;
    Ok(())
}
