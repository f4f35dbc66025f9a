//! Import a directory hierarchy into a database and print it as an outline.
//!
//! ```text
//! cargo run --example outline -- import src --db outline.redb
//! cargo run --example outline -- show --db outline.redb --depth 1
//! ```
use std::{collections::HashMap, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nested_set_store::{NestedSet, NestedSetRead, NodeId, RedbStore};
use tracing::info;
use walkdir::WalkDir;

#[derive(Parser, Debug)]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replace the contents of the database with a directory tree.
    Import {
        root: PathBuf,
        #[clap(long)]
        db: PathBuf,
    },
    /// Print the stored tree, or the subtree below a node.
    Show {
        #[clap(long)]
        db: PathBuf,
        #[clap(long)]
        node: Option<u64>,
        /// Number of generations to print, 0 for all.
        #[clap(long, default_value_t = 0)]
        depth: u64,
    },
}

fn import(root: PathBuf, db: PathBuf) -> Result<()> {
    let store = RedbStore::<String>::new(&db)?;
    let mut batch = store.txn()?;
    if let Some(top) = batch.find_all()?.first() {
        batch.delete(top.id)?;
    }
    let mut ids: HashMap<PathBuf, NodeId> = HashMap::new();
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let id = match entry.path().parent().and_then(|p| ids.get(p)) {
            Some(&parent) if entry.depth() > 0 => batch.insert_as_last_child(parent, name)?,
            _ => batch.insert_as_root(name)?,
        };
        ids.insert(entry.path().to_owned(), id);
    }
    batch.commit()?;
    info!("imported {} entries from {}", ids.len(), root.display());
    Ok(())
}

fn show(db: PathBuf, node: Option<u64>, depth: u64) -> Result<()> {
    let store = RedbStore::<String>::new(&db)?;
    let snapshot = store.snapshot()?;
    let top = match node {
        Some(id) => snapshot.get_node(NodeId::from(id))?,
        None => match snapshot.find_all()?.into_iter().next() {
            Some(root) => root,
            None => {
                println!("empty");
                return Ok(());
            }
        },
    };
    let mut rows = vec![top.clone()];
    rows.extend(snapshot.get_descendants(top.id, depth)?);
    for row in rows {
        let indent = usize::try_from(row.level() - top.level()).context("level")?;
        println!("{:width$}{} {}", "", row.value, row.id, width = indent * 2);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    match args.command {
        Command::Import { root, db } => import(root, db),
        Command::Show { db, node, depth } => show(db, node, depth),
    }
}
