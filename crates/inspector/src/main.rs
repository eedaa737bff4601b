use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use redemption_sdk::{
    JsonStateStore, PersistedState, TotalsUserDataBuilder, UnblindedPaymentToken,
    NEXT_TOKEN_REDEMPTION_AT_PREF,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "redemption-inspect")]
#[command(about = "Inspect the unblinded payment token backlog of a redeemer state file")]
struct Args {
    #[arg(short, long, default_value = "~/.config/redeemer/state.json")]
    state: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Token count, totals and the next redemption deadline
    Summary,
    /// One line per stored token
    Tokens {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

fn load(path: &str) -> Result<PersistedState> {
    let path = PathBuf::from(shellexpand::tilde(path).to_string());
    if !path.exists() {
        return Err(anyhow!("No state file at {}", path.display()));
    }
    Ok(JsonStateStore::open(path)?.snapshot()?)
}

fn format_remaining(remaining: Duration) -> String {
    let (prefix, remaining) = if remaining < Duration::zero() {
        ("overdue by ", -remaining)
    } else {
        ("in ", remaining)
    };

    let hours = remaining.num_hours();
    let minutes = remaining.num_minutes() % 60;
    let seconds = remaining.num_seconds() % 60;
    let body = if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    };

    format!("{}{}", prefix, body)
}

fn summary_lines(state: &PersistedState, now: DateTime<Utc>) -> Vec<String> {
    let tokens = &state.unblinded_payment_tokens;
    let mut lines = vec![format!("Unblinded payment tokens: {}", tokens.len())];

    if let Some(totals) = TotalsUserDataBuilder::totals(tokens).as_array() {
        for entry in totals {
            let Some(fields) = entry.as_object() else {
                continue;
            };
            let ad_format = fields
                .get("ad_format")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            let counts: Vec<String> = fields
                .iter()
                .filter(|(key, _)| key.as_str() != "ad_format")
                .map(|(key, count)| format!("{}={}", key, count.as_str().unwrap_or("?")))
                .collect();
            lines.push(format!("  {}: {}", ad_format, counts.join(" ")));
        }
    }

    match state.prefs.get(NEXT_TOKEN_REDEMPTION_AT_PREF) {
        Some(at) => lines.push(format!(
            "Next redemption: {} ({})",
            at.format("%Y-%m-%d %H:%M:%S UTC"),
            format_remaining(*at - now)
        )),
        None => lines.push("Next redemption: not scheduled".to_string()),
    }

    lines
}

fn short_key(key: &str) -> String {
    if key.chars().count() <= 12 {
        return key.to_string();
    }
    let head: String = key.chars().take(8).collect();
    format!("{}...", head)
}

fn token_lines(tokens: &[UnblindedPaymentToken], limit: usize) -> Vec<String> {
    let mut lines: Vec<String> = tokens
        .iter()
        .take(limit)
        .map(|token| {
            format!(
                "{} | {:<20} | {:<10} | {}",
                token.transaction_id,
                token.ad_type.as_str(),
                token.confirmation_type.as_str(),
                short_key(&token.public_key)
            )
        })
        .collect();

    if tokens.len() > limit {
        lines.push(format!("... and {} more", tokens.len() - limit));
    }
    lines
}

fn main() -> Result<()> {
    let args = Args::parse();
    let state = load(&args.state)?;

    let lines = match args.command {
        Command::Summary => summary_lines(&state, Utc::now()),
        Command::Tokens { limit } => token_lines(&state.unblinded_payment_tokens, limit),
    };
    for line in lines {
        println!("{}", line);
    }

    Ok(())
}
