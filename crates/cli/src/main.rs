//! Thin line-editing front end over `engine::Engine`. Grounded on
//! `wcygan-sql-database/crates/client-cli/src/main.rs`'s `Args`/`DefaultEditor`
//! shape, adapted to call the engine in-process rather than over a network
//! connection -- this design has no server (SPEC_FULL.md §4.8).

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use common::{Config, pretty};
use engine::{Engine, ExecResult};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

const DEFAULT_DATA_DIR: &str = "./db_data";

#[derive(Parser, Debug)]
#[command(name = "storedb", about = "Embedded relational storage engine shell")]
struct Args {
    /// Directory holding the data file and WAL
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Execute the provided statement and exit
    #[arg(short = 'e', long)]
    execute: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = Config::builder()
        .db_path(args.data_dir.join("data.db"))
        .wal_path(args.data_dir.join("wal.log"))
        .build();

    let mut engine = Engine::open(config)?;
    tracing::info!(data_dir = %args.data_dir.display(), "opened database");

    if let Some(stmt) = args.execute {
        execute_and_print(&mut engine, &stmt);
        return Ok(());
    }

    interactive_loop(&mut engine)
}

/// Execute one statement and print its result or error, never aborting.
fn execute_and_print(engine: &mut Engine, stmt: &str) {
    match engine.execute(stmt) {
        Ok(result) => print_result(&result),
        Err(e) => eprintln!("Error: {e}"),
    }
}

/// Process a line of input from the REPL.
/// Returns true to continue the loop, false to exit.
fn process_line(engine: &mut Engine, line: &str) -> bool {
    if line.is_empty() {
        return true;
    }

    if line == ".quit" || line == ".exit" {
        return false;
    }

    if line == ".help" {
        print_help();
        return true;
    }

    execute_and_print(engine, line);
    true
}

/// Handle readline errors. Returns true to continue the loop, false to exit.
fn handle_readline_error(error: ReadlineError) -> bool {
    match error {
        ReadlineError::Interrupted => {
            println!("^C");
            false
        }
        ReadlineError::Eof => {
            println!("^D");
            false
        }
        err => {
            eprintln!("Error: {err:?}");
            false
        }
    }
}

fn interactive_loop(engine: &mut Engine) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    println!();
    println!("Type statements or .quit to exit");
    println!();

    loop {
        let readline = rl.readline("> ");

        let should_continue = match readline {
            Ok(line) => {
                let line = line.trim();
                let _ = rl.add_history_entry(line);
                process_line(engine, line)
            }
            Err(e) => handle_readline_error(e),
        };

        if !should_continue {
            break;
        }
    }

    Ok(())
}

fn print_result(result: &ExecResult) {
    match result {
        ExecResult::Rows(batch) => {
            let rendered = pretty::render_record_batch(batch, pretty::TableStyleKind::Modern);
            println!("{rendered}");
        }
        ExecResult::Count { affected } => {
            println!("{affected} row(s) affected");
        }
        ExecResult::Empty => {
            println!("OK");
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  .help    Show this help");
    println!("  .quit    Exit the shell");
    println!();
    println!("Or enter a statement: BEGIN, COMMIT, ROLLBACK, CREATE TABLE, CREATE INDEX,");
    println!("DROP INDEX, INSERT, UPDATE, DELETE, SELECT.");
}
