use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use rusqlite::Connection;

use rollbook::cli::args::{Cli, Commands};
use rollbook::cli::handlers::{self, Ctx};
use rollbook::config::AppConfig;
use rollbook::db::migrations::run_migrations;

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        return handlers::handle_init();
    }

    let config = AppConfig::load().context("Loading config")?;

    // Every date comparison in this run uses the same UTC calendar day.
    let today = match cli.today.as_deref() {
        Some(s) => handlers::parse_date_arg(s).context("Parsing --today")?,
        None => Utc::now().date_naive(),
    };
    log::debug!("today is {}", today);

    AppConfig::ensure_data_dir()?;
    let db_path = AppConfig::db_path()?;
    let mut conn = Connection::open(&db_path)
        .with_context(|| format!("Opening database at {:?}", db_path))?;

    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    // Run migrations on every startup
    run_migrations(&conn)?;

    let ctx = Ctx::new(config, today);

    match &cli.command {
        Commands::Init => unreachable!(),
        Commands::Faculty { action } => handlers::handle_faculty(&conn, &ctx, action)?,
        Commands::Batch { action } => handlers::handle_batch(&conn, &ctx, action)?,
        Commands::Student { action } => handlers::handle_student(&conn, &ctx, action)?,
        Commands::Attendance { action } => handlers::handle_attendance(&mut conn, &ctx, action)?,
        Commands::Fee { action } => handlers::handle_fee(&conn, &ctx, action)?,
    }

    Ok(())
}
