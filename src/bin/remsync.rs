//! Remsync CLI Binary
//!
//! Command-line interface for syncing a reMarkable tablet.

use clap::Parser;
use remsync::cli::{self, Cli};
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli::run(cli).await {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            process::exit(1);
        }
    }
}
