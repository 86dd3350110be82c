//! # CLI Layer
//!
//! This module is **one possible client** for cardvault, not the application
//! itself. It is the only place that:
//! - Knows about terminal I/O (stdout, stderr)
//! - Installs a `tracing` subscriber
//! - Decides who the caller is
//!
//! ## Identity and Scope
//!
//! The caller is `--user` (or `CARDVAULT_USER`), with admin rights when
//! `--admin` is given. `--scope` picks whose cards to act on:
//!
//! - `self` (default): your own cards plus public ones
//! - `all`: every card, admins only
//! - `<user>`: that user's cards; other users need `--admin`
//!
//! `cardvault --admin add Mew` with no `--user` adds a public card.
//!
//! ## Configuration
//!
//! Backend and database location come from [`CardVaultConfig`]: environment,
//! then `--config` (or the default config file), then defaults.

mod commands;
mod render;
mod setup;

use anyhow::{Context, Result};
use cardvault::config::CardVaultConfig;
use cardvault::model::OwnerId;
use cardvault::scope::{Caller, ScopeToken};
use cardvault::store;
use clap::Parser;
use setup::Cli;
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = CardVaultConfig::load(cli.config.as_deref()).context("failed to load config")?;
    init_logging(cli.verbose, &config.log_level);

    let caller = Caller {
        identity: cli.user.as_deref().map(OwnerId::new).transpose()?,
        is_admin: cli.admin,
    };
    let token: ScopeToken = cli.scope.parse()?;
    let scope = caller.resolve(&token)?;
    debug!(scope = %scope, backend = ?config.backend, "resolved caller");

    let repo = store::open(&config).with_context(|| {
        format!(
            "failed to open card store at {}",
            config.database_path.display()
        )
    })?;
    let output = commands::execute(&repo, &scope, cli.command, cli.json);
    repo.close().context("failed to close card store")?;

    println!("{}", output?);
    Ok(())
}

/// Log to stderr. `RUST_LOG` wins over `-v`, which wins over the config.
fn init_logging(verbose: bool, level: &str) {
    let default = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
