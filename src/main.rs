//! haddb - single-directory table store with a buffered page engine

use anyhow::{anyhow, Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use haddb::database::{Database, DatabaseConfig};
use haddb::storage::{Predicate, Tuple};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// haddb - a minimal page-based table store
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data directory
    #[arg(short = 'D', long, default_value = "./haddb_data")]
    data_dir: PathBuf,

    /// Buffer frames per table
    #[arg(short, long, default_value = "64")]
    pool_size: usize,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a table from `column:type` pairs
    CreateTable {
        name: String,
        #[arg(required = true)]
        columns: Vec<String>,
    },
    /// Drop a table and its files
    DropTable { name: String },
    /// List tables
    Tables,
    /// Insert one row from `column=value` pairs
    Insert {
        table: String,
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Print rows, optionally filtered by `column=value`
    Select {
        table: String,
        #[arg(short = 'w', long = "where")]
        filter: Option<String>,
    },
    /// Set `column=value` pairs on matching rows
    Update {
        table: String,
        #[arg(required = true)]
        set: Vec<String>,
        #[arg(short = 'w', long = "where")]
        filter: Option<String>,
    },
    /// Delete matching rows (all rows without --where)
    Delete {
        table: String,
        #[arg(short = 'w', long = "where")]
        filter: Option<String>,
    },
    /// Show the buffer pool frames of a table after loading it
    BufferState { table: String },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = DatabaseConfig {
        data_dir: args.data_dir,
        pool_size: args.pool_size,
    };
    let mut database = Database::open_or_create(config).context("Failed to open database")?;

    match args.command {
        Command::CreateTable { name, columns } => {
            let schema = columns
                .iter()
                .map(|column| split_pair(column, ':'))
                .collect::<Result<BTreeMap<_, _>>>()?;
            database.create_table(&name, schema)?;
            println!("Table '{}' created.", name);
        }
        Command::DropTable { name } => {
            database.drop_table(&name)?;
            println!("Table '{}' dropped.", name);
        }
        Command::Tables => {
            for name in database.list_tables() {
                println!("{}", name);
            }
        }
        Command::Insert { table, values } => {
            let pairs = parse_pairs(&values)?;
            let borrowed: Vec<(&str, &str)> =
                pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            let id = database.insert(&table, &borrowed)?;
            println!("Inserted row with id {}.", id);
        }
        Command::Select { table, filter } => {
            let rows = database.select(&table, &parse_predicate(filter.as_deref())?)?;
            print_tuples(&rows);
        }
        Command::Update { table, set, filter } => {
            let pairs = parse_pairs(&set)?;
            let borrowed: Vec<(&str, &str)> =
                pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            let count = database.update(&table, &parse_predicate(filter.as_deref())?, &borrowed)?;
            println!("{} row(s) updated.", count);
        }
        Command::Delete { table, filter } => {
            let count = database.delete(&table, &parse_predicate(filter.as_deref())?)?;
            println!("{} row(s) deleted.", count);
        }
        Command::BufferState { table } => {
            database.select(&table, &Predicate::All)?;
            print!("{}", database.buffer_state(&table)?);
        }
    }

    database.flush()?;
    Ok(())
}

fn split_pair(input: &str, separator: char) -> Result<(String, String)> {
    let (key, value) = input
        .split_once(separator)
        .ok_or_else(|| anyhow!("Expected '<name>{}<value>', got '{}'", separator, input))?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}

fn parse_pairs(inputs: &[String]) -> Result<Vec<(String, String)>> {
    inputs.iter().map(|input| split_pair(input, '=')).collect()
}

fn parse_predicate(filter: Option<&str>) -> Result<Predicate> {
    match filter {
        Some(filter) => {
            let (key, value) = split_pair(filter, '=')?;
            Ok(Predicate::equals(key, value))
        }
        None => Ok(Predicate::All),
    }
}

fn print_tuples(tuples: &[Tuple]) {
    if tuples.is_empty() {
        println!("No tuples to display.");
        return;
    }

    let rule = "-".repeat(30);
    println!("{:<15}{:<15}", "Key", "Value");
    println!("{}", rule);
    for tuple in tuples {
        for attr in tuple.attributes() {
            println!("{:<15}{:<15}", attr.key, attr.value);
        }
        println!("{}", rule);
    }
}
