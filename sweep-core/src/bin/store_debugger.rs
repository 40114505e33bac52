//! Inspect an encrypted wallet store file without running a sweep.

use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::Password;
use sweep_core::EncryptedWalletStore;

#[derive(Parser)]
struct Args {
    #[arg(short, long)]
    file: String,
    #[arg(short, long)]
    password: Option<String>,
    /// Also print disabled records
    #[arg(long)]
    all: bool,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    println!("Reading store: {}", args.file);

    let password = match args
        .password
        .or_else(|| std::env::var("WALLET_PASSWORD").ok())
    {
        Some(p) => Some(p),
        None => Some(
            Password::new()
                .with_prompt("Store password (empty for plaintext store)")
                .allow_empty_password(true)
                .interact()
                .context("Failed to read password")?,
        ),
    };
    let password = password.filter(|p| !p.is_empty());

    let store = EncryptedWalletStore::load(&args.file, password.as_deref())?;
    println!("Loaded {} record(s).", store.count());

    for record in store.records() {
        if record.enabled || args.all {
            println!(
                "  {} [{}] {} <{}>",
                record.address,
                if record.enabled { "enabled" } else { "disabled" },
                record.name,
                record.contact
            );
        }
    }

    Ok(())
}
