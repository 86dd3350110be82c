//! # Cardvault CLI
//!
//! The binary is intentionally thin: the CLI lives in `src/cli/`, while this
//! file only invokes `cli::run()` and handles process termination.
//!
//! ## Workspace Structure
//!
//! - `crates/cardvault/`: Core library: model, validation, scoping, storage
//! - `crates/cardvault-cli/`: This CLI tool, depends on the `cardvault` library
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (crates/cardvault-cli/src/cli/)                  │
//! │  - clap argument parsing (setup.rs)                         │
//! │  - Scope resolution (mod.rs), dispatch (commands.rs)        │
//! │  - Text / JSON output (render.rs)                           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Repository (cardvault::store)                              │
//! │  - Validation, visibility, dedup-upsert, stats              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only the CLI layer touches stdout, stderr and exit codes. Logs go to
//! stderr so `--json` output on stdout stays machine-readable.

mod cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
