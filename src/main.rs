use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use log::{error, LevelFilter};

use bptree_store::db::Database;
use bptree_store::page::Value;

/// A single-file disk-backed B+ tree index.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Path to the database file (created if it does not exist).
    path: PathBuf,

    /// Bulk-load `<key> <value>` pairs from this file before entering the
    /// REPL.
    #[arg(long)]
    load: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let mut db = Database::new();
    let table_id = match db.open_table(&cli.path) {
        Ok(id) => id,
        Err(e) => {
            error!("failed to open {}: {e}", cli.path.display());
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    if let Some(load_path) = &cli.load {
        if let Err(e) = bulk_load(&mut db, table_id, load_path) {
            error!("bulk load from {} failed: {e}", load_path.display());
            eprintln!("error: {e}");
        }
    }

    repl(&mut db, table_id);
}

fn bulk_load(db: &mut Database, table_id: usize, path: &PathBuf) -> io::Result<()> {
    let file = fs::File::open(path)?;
    let mut count = 0usize;
    for line in io::BufReader::new(file).lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let (Some(key_str), Some(value_str)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Ok(key) = key_str.parse::<i64>() else {
            continue;
        };
        match db.insert(table_id, key, Value::from(value_str)) {
            Ok(_) => count += 1,
            Err(e) => error!("load: insert({key}) failed: {e}"),
        }
    }
    println!("loaded {count} records from {}", path.display());
    Ok(())
}

const HELP: &str = "\
i <key> <value>   insert a record
f <key>           find a record
d <key>           delete a record
r <k1> <k2>       range scan [k1, k2]
t                 print tree depth
l                 list all keys in order
v                 toggle verbose logging
x                 print page/free-list stats
q                 quit
?                 print this summary";

fn repl(db: &mut Database, table_id: usize) {
    let mut verbose = false;
    let stdin = io::stdin();
    print!("> ");
    let _ = io::stdout().flush();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let mut parts = line.trim().split_whitespace();
        match parts.next() {
            Some("i") => match (parts.next(), parts.next()) {
                (Some(k), Some(v)) => match k.parse::<i64>() {
                    Ok(key) => match db.insert(table_id, key, Value::from(v)) {
                        Ok(true) => println!("ok"),
                        Ok(false) => println!("duplicate, ignored"),
                        Err(e) => println!("error: {e}"),
                    },
                    Err(_) => println!("usage: i <key> <value>"),
                },
                _ => println!("usage: i <key> <value>"),
            },
            Some("f") => match parts.next().and_then(|s| s.parse::<i64>().ok()) {
                Some(key) => match db.find(table_id, key) {
                    Ok(Some(value)) => println!("{value}"),
                    Ok(None) => println!("not found"),
                    Err(e) => println!("error: {e}"),
                },
                None => println!("usage: f <key>"),
            },
            Some("d") => match parts.next().and_then(|s| s.parse::<i64>().ok()) {
                Some(key) => match db.delete(table_id, key) {
                    Ok(true) => println!("ok"),
                    Ok(false) => println!("not found"),
                    Err(e) => println!("error: {e}"),
                },
                None => println!("usage: d <key>"),
            },
            Some("r") => match (
                parts.next().and_then(|s| s.parse::<i64>().ok()),
                parts.next().and_then(|s| s.parse::<i64>().ok()),
            ) {
                (Some(k1), Some(k2)) => match db.find_range(table_id, k1, k2) {
                    Ok(hits) => {
                        for (k, v) in hits {
                            println!("{k}\t{v}");
                        }
                    }
                    Err(e) => println!("error: {e}"),
                },
                _ => println!("usage: r <k1> <k2>"),
            },
            Some("t") => match db.depth(table_id) {
                Ok(Some(depth)) => println!("depth {depth}"),
                Ok(None) => println!("empty"),
                Err(e) => println!("error: {e}"),
            },
            Some("l") => match db.find_range(table_id, i64::MIN, i64::MAX) {
                Ok(hits) => {
                    for (k, v) in hits {
                        println!("{k}\t{v}");
                    }
                }
                Err(e) => println!("error: {e}"),
            },
            Some("v") => {
                verbose = !verbose;
                log::set_max_level(if verbose { LevelFilter::Debug } else { LevelFilter::Warn });
                println!("verbose = {verbose}");
            }
            Some("x") => match db.stats(table_id) {
                Ok(stats) => println!(
                    "page_count={} free_pages={} depth={:?}",
                    stats.page_count, stats.free_page_count, stats.depth
                ),
                Err(e) => println!("error: {e}"),
            },
            Some("q") => break,
            Some("?") | None => println!("{HELP}"),
            Some(other) => println!("unknown command {other:?}; try ?"),
        }
        print!("> ");
        let _ = io::stdout().flush();
    }
}
