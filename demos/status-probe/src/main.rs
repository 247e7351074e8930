//! Starts the helper, optionally connects to a peripheral, and prints the
//! helper's status record and link state as JSON.
//!
//! ```text
//! RUST_LOG=blelink=debug status-probe --helper ./bluepy-helper --connect C4:BE:84:70:69:09
//! ```

use std::process::ExitCode;
use std::time::Duration;

use blelink::prelude::*;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "status-probe")]
#[command(about = "Query a BLE helper daemon for its link status")]
#[command(version)]
struct Args {
    /// Helper executable
    #[arg(long, env = "BLELINK_HELPER", default_value = "bluepy-helper")]
    helper: String,

    /// Extra arguments passed to the helper (repeatable)
    #[arg(long = "helper-arg")]
    helper_args: Vec<String>,

    /// Peripheral address to connect to before probing
    #[arg(long)]
    connect: Option<String>,

    /// Address type for --connect
    #[arg(long, default_value = "public")]
    addr_type: String,

    /// Seconds to wait for each response
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(kind = %e.kind(), error = %e, "probe failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), BlelinkError> {
    let timeout = Duration::from_secs(args.timeout);

    let mut helper_config = HelperConfig::new(&args.helper);
    for arg in &args.helper_args {
        helper_config = helper_config.arg(arg);
    }
    let helper = HelperProcess::spawn(helper_config)?;
    let client = Client::start(helper, ClientConfig::default().default_timeout(Some(timeout))).await?;

    let probed = probe(&client, &args, timeout).await;

    client.shutdown().await;
    let status = client.transport().stop().await?;
    tracing::debug!(%status, "helper exit status");
    probed
}

async fn probe(
    client: &Client<HelperProcess>,
    args: &Args,
    timeout: Duration,
) -> Result<(), BlelinkError> {
    if let Some(addr) = &args.connect {
        let mut link = client.watch_link_state();
        let conn = Command::new("conn").symbol(addr).symbol(&args.addr_type);
        client.send(&conn, "stat").await?;

        match tokio::time::timeout(timeout, link.wait_for(LinkState::is_connected)).await {
            Ok(Ok(_)) => tracing::info!(%addr, "connected"),
            Ok(Err(_)) => return Err(BlelinkError::Disconnected),
            Err(_) => return Err(ContinuationError::Timeout(timeout).into()),
        }
    }

    let stat = client.request(&Command::new("stat"), "stat").await?;
    print_json("stat", &stat);
    print_json("link", &client.link_state());

    if args.connect.is_some() {
        client.request(&Command::new("disc"), "stat").await?;
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(label: &str, value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{label}: {json}"),
        Err(e) => tracing::warn!(label, error = %e, "cannot render as JSON"),
    }
}
