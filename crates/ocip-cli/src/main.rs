//! Command-line inspector for an OCI-P provisioning server
//!
//! Connects, logs in, reports the server version and user count, then
//! offers to dump the directory, inspect a single user (directory entry,
//! shared-call-appearance endpoints, service assignments), or sweep all
//! users for SCA endpoints.

mod workflows;

use std::io::{self, BufRead, Write};

use anyhow::Result;
use clap::Parser;
use ocip_client::{OciConnection, OciSession};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ocip", version, about = "OCI-P provisioning inspector")]
struct Args {
    /// Host to connect to
    #[arg(long)]
    host: String,

    /// Port for OCI-P requests
    #[arg(long, default_value_t = 2208)]
    port: u16,

    /// Username of the provisioning session
    #[arg(long)]
    user: String,

    /// Password of the provisioning session
    #[arg(long, env = "OCIP_PASSWORD")]
    pass: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let conn = OciConnection::connect(&args.host, args.port).await?;
    println!("connected to {}", conn.peer());

    let session = conn.start_session(&args.user, &args.pass).await?;
    println!("logged in");

    let outcome = run(&session).await;
    conn.close(true).await;
    debug!("connection closed");
    outcome
}

async fn run(session: &OciSession) -> Result<()> {
    println!("version: {}", workflows::system_version(session).await?);

    let users = workflows::users(session).await?;
    println!("{} users found", users.len());

    if prompt("list users [y/n]: ")?.eq_ignore_ascii_case("y") {
        for user in &users {
            println!("{}", serde_json::to_string(user)?);
        }
    }

    let target = prompt("inspect one user (blank to sweep for SCA): ")?;
    if !target.is_empty() {
        inspect_user(session, &target).await
    } else {
        sweep_sca(session, &users).await
    }
}

/// Print everything known about one user
async fn inspect_user(session: &OciSession, user_id: &str) -> Result<()> {
    let user = workflows::find_user(session, user_id).await?;
    println!("user: {}", serde_json::to_string_pretty(&user)?);

    let full_id = user.get("User Id").map(String::as_str).unwrap_or(user_id);

    let endpoints = workflows::sca_endpoints(session, full_id).await?;
    println!("sca: {}", serde_json::to_string_pretty(&endpoints)?);
    if let Some(details) = workflows::sca_endpoint_details(session, full_id, &endpoints).await? {
        println!("sca endpoint details: {}", details.body());
    }

    let services = workflows::user_services(session, full_id).await?;
    println!(
        "service packs: {}",
        serde_json::to_string_pretty(&services.service_packs)?
    );
    println!(
        "services: {}",
        serde_json::to_string_pretty(&services.services)?
    );
    Ok(())
}

/// Report every user that has at least one SCA endpoint
async fn sweep_sca(session: &OciSession, users: &[workflows::Row]) -> Result<()> {
    for user in users {
        let Some(user_id) = user.get("User Id") else {
            continue;
        };
        let endpoints = workflows::sca_endpoints(session, user_id).await?;
        if !endpoints.is_empty() {
            println!("user with sca: {user_id}");
        }
    }
    Ok(())
}

fn prompt(question: &str) -> Result<String> {
    print!("{question}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().to_string())
}
