use anyhow::{bail, Context, Result};
use clap::Parser;
use prisme::uaparser::{UserAgentClassifier, WootheeClassifier};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "prisme-uaparser")]
#[command(about = "Classify user agents the way the ingestion server does", long_about = None)]
struct Cli {
    /// User agent strings to classify
    user_agents: Vec<String>,

    /// JSON list of `{"ua": "..."}` objects, as exported by useragents.me
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Pretty print the JSON output
    #[arg(short, long)]
    pretty: bool,
}

#[derive(Deserialize)]
struct UserAgentEntry {
    ua: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut user_agents = cli.user_agents;
    if let Some(path) = cli.file {
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let entries: Vec<UserAgentEntry> = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a JSON list of user agents", path.display()))?;
        user_agents.extend(entries.into_iter().map(|entry| entry.ua));
    }

    if user_agents.is_empty() {
        bail!("no user agent given, pass them as arguments or with --file");
    }

    let classifier = WootheeClassifier::new();
    let clients: Vec<_> = user_agents
        .iter()
        .map(|ua| classifier.parse_user_agent(ua))
        .collect();

    let output = if cli.pretty {
        serde_json::to_string_pretty(&clients)?
    } else {
        serde_json::to_string(&clients)?
    };
    println!("{}", output);

    Ok(())
}
