//! Operator client for the tower admission server.
//!
//! Mirrors the tower console workflow: load reference data, inspect
//! flight plans, queue operations, request decisions and pull the
//! decision report.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use twr_core::models::{EngineStatus, OperationKind, OperationRequest};

#[derive(Parser)]
#[command(name = "twr", about = "Tower admission control client", version)]
struct Cli {
    /// Server base URL
    #[arg(long, default_value = "http://localhost:3000", global = true)]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reload the reference snapshot from the server's configured path
    Import,
    /// List known flight plans
    Flights,
    /// Queue an operation request for a flight
    Enqueue {
        flight: String,
        /// takeoff or landing
        kind: OperationKind,
        /// Preferred runway, e.g. 10/28
        #[arg(long)]
        runway: Option<String>,
    },
    /// Decide the next eligible operation
    Authorize {
        /// Decision time, RFC 3339 (defaults to now on the server)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Report an authorized operation as completed
    Complete {
        flight: String,
        kind: OperationKind,
    },
    /// Show queue depths, counters and field state
    Status,
    /// Print the decision report, newest first
    Report {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Command::Import => import(&client, &cli.url).await,
        Command::Flights => flights(&client, &cli.url).await,
        Command::Enqueue {
            flight,
            kind,
            runway,
        } => enqueue(&client, &cli.url, &flight, kind, runway).await,
        Command::Authorize { at } => authorize(&client, &cli.url, at).await,
        Command::Complete { flight, kind } => complete(&client, &cli.url, &flight, kind).await,
        Command::Status => status(&client, &cli.url).await,
        Command::Report { limit } => report(&client, &cli.url, limit).await,
    }
}

async fn import(client: &reqwest::Client, url: &str) -> Result<()> {
    let res = client
        .post(format!("{url}/v1/reference/reload"))
        .send()
        .await
        .context("server unreachable")?;
    let body: Value = check(res).await?;
    println!(
        "reference loaded: {} runways, {} aircraft, {} pilots, {} flight plans, {} metars, {} notams",
        body["runways"], body["fleet"], body["pilots"], body["flight_plans"], body["metars"], body["notams"]
    );
    Ok(())
}

async fn flights(client: &reqwest::Client, url: &str) -> Result<()> {
    let res = client
        .get(format!("{url}/v1/flights"))
        .send()
        .await
        .context("server unreachable")?;
    let plans: Vec<Value> = check(res).await?;
    if plans.is_empty() {
        println!("no flight plans loaded");
        return Ok(());
    }
    for plan in plans {
        println!(
            "{}  {} -> {}  {}  pilot {}  priority {}",
            plan["flight"].as_str().unwrap_or("?"),
            plan["origin"].as_str().unwrap_or("?"),
            plan["destination"].as_str().unwrap_or("?"),
            plan["aircraft_type"].as_str().unwrap_or("?"),
            plan["pilot_id"].as_str().unwrap_or("?"),
            plan["priority"].as_str().unwrap_or("?"),
        );
    }
    Ok(())
}

async fn enqueue(
    client: &reqwest::Client,
    url: &str,
    flight: &str,
    kind: OperationKind,
    runway: Option<String>,
) -> Result<()> {
    let mut body = json!({ "flight": flight, "kind": kind });
    if let Some(runway) = runway {
        body["runway_hint"] = json!(runway);
    }
    let res = client
        .post(format!("{url}/v1/queue"))
        .json(&body)
        .send()
        .await
        .context("server unreachable")?;
    let request: OperationRequest = check(res).await?;
    println!(
        "queued {} ({} priority, submitted {})",
        request.id, request.priority, request.submitted_at
    );
    Ok(())
}

async fn authorize(
    client: &reqwest::Client,
    url: &str,
    at: Option<DateTime<Utc>>,
) -> Result<()> {
    let mut body = json!({});
    if let Some(at) = at {
        body["decision_time"] = json!(at);
    }
    let res = client
        .post(format!("{url}/v1/decisions"))
        .json(&body)
        .send()
        .await
        .context("server unreachable")?;
    let decision: Value = check(res).await?;
    match decision["status"].as_str() {
        Some("no_operation_pending") => println!("no operation pending"),
        Some("decided") => print_result(&decision["result"]),
        other => bail!("unexpected decision payload: {:?}", other),
    }
    Ok(())
}

async fn complete(
    client: &reqwest::Client,
    url: &str,
    flight: &str,
    kind: OperationKind,
) -> Result<()> {
    let res = client
        .post(format!("{url}/v1/operations/complete"))
        .json(&json!({ "flight": flight, "kind": kind }))
        .send()
        .await
        .context("server unreachable")?;
    let body: Value = check(res).await?;
    if body["released"] == json!(true) {
        println!("{flight} {kind} completed, low-visibility slot released");
    } else {
        println!("{flight} {kind} completed");
    }
    Ok(())
}

async fn status(client: &reqwest::Client, url: &str) -> Result<()> {
    let res = client
        .get(format!("{url}/v1/status"))
        .send()
        .await
        .context("server unreachable")?;
    let body: Value = check(res).await?;
    let engine: EngineStatus = serde_json::from_value(body["engine"].clone())
        .context("malformed status payload")?;

    println!(
        "queues: {} takeoff, {} landing",
        engine.takeoff_queue_depth, engine.landing_queue_depth
    );
    println!(
        "decisions: {} authorized, {} denied",
        engine.authorized, engine.denied
    );
    for (reason, count) in &engine.denied_by_reason {
        println!("  denied/{reason}: {count}");
    }
    match &engine.weather_slot {
        Some(holder) => println!("low-visibility slot held by {holder}"),
        None => println!("low-visibility slot free"),
    }
    if let Some(runways) = body["runways"].as_array() {
        for runway in runways {
            let blocked = runway["notam_blocked"] == json!(true);
            println!(
                "runway {}  {}m  {}{}",
                runway["id"].as_str().unwrap_or("?"),
                runway["length_m"],
                runway["status"].as_str().unwrap_or("?"),
                if blocked { "  [notam]" } else { "" }
            );
        }
    }
    if let Some(metar) = body["metar"].as_object() {
        match metar["visibility_km"].as_f64() {
            Some(vis) => println!("metar: visibility {vis} km"),
            None => println!("metar: visibility unknown"),
        }
    }
    Ok(())
}

async fn report(client: &reqwest::Client, url: &str, limit: usize) -> Result<()> {
    let res = client
        .get(format!("{url}/v1/audit?limit={limit}"))
        .send()
        .await
        .context("server unreachable")?;
    let entries: Vec<Value> = check(res).await?;
    if entries.is_empty() {
        println!("no decisions recorded");
        return Ok(());
    }
    for entry in entries {
        print_result(&entry);
    }
    Ok(())
}

fn print_result(result: &Value) {
    let flight = result["request"]["flight"].as_str().unwrap_or("?");
    let kind = result["request"]["kind"].as_str().unwrap_or("?");
    let decided_at = result["decided_at"].as_str().unwrap_or("?");
    match result["decision"].as_str() {
        Some("authorized") => println!(
            "{decided_at}  AUTHORIZED  {flight} {kind} on runway {}",
            result["runway"].as_str().unwrap_or("?")
        ),
        Some("denied") => println!(
            "{decided_at}  DENIED      {flight} {kind}: {}",
            result["reason"]["code"].as_str().unwrap_or("?")
        ),
        _ => println!("{decided_at}  ?           {flight} {kind}"),
    }
}

/// Surface non-2xx responses with the server's error body.
async fn check<T: serde::de::DeserializeOwned>(res: reqwest::Response) -> Result<T> {
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        bail!("server returned {status}: {body}");
    }
    res.json().await.context("malformed response body")
}
