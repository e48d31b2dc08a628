//! Parking monitor control client
//!
//! Usage:
//!   cargo run --bin monitorctl -- trigger
//!   cargo run --bin monitorctl -- mapping
//!   cargo run --bin monitorctl -- last
//!   cargo run --bin monitorctl -- push-vehicles config/vehicles.json
//!   cargo run --bin monitorctl -- --url http://10.0.0.5:8080 push-regions regions.json

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "monitorctl", version, about = "Control client for a running parking-monitor")]
struct Args {
    /// Base URL of the parking-monitor API
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Request timeout in milliseconds
    #[arg(long, default_value = "10000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a matching pass
    Trigger,
    /// Print the current occupancy
    Mapping,
    /// Print the summary of the most recent pass
    Last,
    /// Upload vehicle positions from a JSON array file
    PushVehicles { file: PathBuf },
    /// Upload regions from a JSON array file
    PushRegions { file: PathBuf },
}

/// Read a JSON array file, checking it parses before sending
fn read_json_array(path: &Path) -> anyhow::Result<String> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    if !value.is_array() {
        bail!("{} must contain a JSON array", path.display());
    }
    Ok(value.to_string())
}

/// Pretty-print a JSON body, or print it as-is if it is not JSON
fn print_body(body: &str) {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(pretty) => println!("{pretty}"),
            Err(_) => println!("{body}"),
        },
        Err(_) => println!("{body}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let base = args.url.trim_end_matches('/');

    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(args.timeout_ms))
        .http1_only()
        .build()
        .context("Failed to build HTTP client")?;

    let request = match &args.command {
        Command::Trigger => client.post(format!("{base}/mapping/trigger")),
        Command::Mapping => client.get(format!("{base}/mapping")),
        Command::Last => client.get(format!("{base}/mapping/last")),
        Command::PushVehicles { file } => client
            .post(format!("{base}/vehicles"))
            .header("Content-Type", "application/json")
            .body(read_json_array(file)?),
        Command::PushRegions { file } => client
            .post(format!("{base}/regions"))
            .header("Content-Type", "application/json")
            .body(read_json_array(file)?),
    };

    let resp = request.send().await.with_context(|| format!("Request to {base} failed"))?;
    let status = resp.status();
    let body = resp.text().await.context("Failed to read response body")?;

    print_body(&body);

    if !status.is_success() {
        bail!("server answered {status}");
    }
    Ok(())
}
