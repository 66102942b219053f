use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "mesh-cli")]
#[command(about = "Admin CLI for the booking mesh", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Admin API key; falls back to MESH_ADMIN_KEY.
    #[arg(short, long, env = "MESH_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Service status, uptime and token expiry
    Status,
    /// Circuit breaker state per dependency
    Breakers,
    /// Rate limiter settings and tracked keys
    RateLimits,
}

impl Commands {
    fn path(&self) -> &'static str {
        match self {
            Commands::Status => "/admin/status",
            Commands::Breakers => "/admin/breakers",
            Commands::RateLimits => "/admin/rate-limits",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let url = format!("{}{}", cli.url.trim_end_matches('/'), cli.command.path());
    let res = client.get(url).headers(headers).send().await?;

    if matches!(cli.command, Commands::Breakers) {
        print_breakers(res).await
    } else {
        print_response(res).await
    }
}

async fn ensure_success(res: reqwest::Response) -> Result<reqwest::Response, Box<dyn std::error::Error>> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let text = res.text().await.unwrap_or_default();
    Err(format!("admin API returned status {status}: {text}").into())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let res = ensure_success(res).await?;
    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn print_breakers(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let res = ensure_success(res).await?;
    let breakers: Vec<Value> = res.json().await?;
    println!("{:<16} {:<10} {:>8} {:>10}", "DEPENDENCY", "STATE", "FAILURES", "PROBES");
    for b in &breakers {
        println!(
            "{:<16} {:<10} {:>8} {:>10}",
            b["dependency"].as_str().unwrap_or("?"),
            b["state"].as_str().unwrap_or("?"),
            b["failure_count"].as_u64().unwrap_or(0),
            b["half_open_attempts"].as_u64().unwrap_or(0),
        );
    }
    Ok(())
}
