//! Entry point for the hwcast viewer. Parses args, connects and prints updates.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use hwcast::render::summary_line;
use hwcast::{connect, next_frame, parse_url, request_status, ServerFrame};

#[derive(Debug, Parser)]
#[command(name = "hwcast", version, about = "Print hardware snapshots pushed by hwcast_agent")]
struct Args {
    /// Agent address: ws://HOST:PORT/ws or HOST:PORT
    #[arg(default_value = "ws://127.0.0.1:8888/ws", env = "HWCAST_URL")]
    url: String,

    /// Request one full status snapshot, print it as JSON and exit
    #[arg(short, long)]
    status: bool,

    /// With --status: sample now instead of using the agent's cache
    #[arg(long, requires = "status")]
    fresh: bool,

    /// Exit after this many updates (0 = run until the agent goes away)
    #[arg(short = 'n', long, default_value_t = 0)]
    count: u64,

    /// Give up when nothing arrives for this many seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let url = parse_url(&args.url)?;
    let wait = Duration::from_secs(args.timeout.max(1));

    let mut ws = connect(&url)
        .await
        .with_context(|| format!("connecting to {url}"))?;

    if args.status {
        let data = request_status(&mut ws, args.fresh, wait).await?;
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    let mut seen = 0u64;
    loop {
        let frame = tokio::select! {
            f = next_frame(&mut ws, wait) => f?,
            _ = tokio::signal::ctrl_c() => break,
        };
        match frame {
            Some(ServerFrame::Connected { subscriber }) => {
                eprintln!("connected to {url} as subscriber #{subscriber}");
            }
            Some(ServerFrame::MonitoringUpdate { timestamp, data }) => {
                println!("{}", summary_line(timestamp, &data));
                seen += 1;
                if args.count > 0 && seen >= args.count {
                    break;
                }
            }
            Some(ServerFrame::ServerShutdown { message }) => {
                eprintln!("agent shutting down: {message}");
                break;
            }
            Some(ServerFrame::Error { message }) => eprintln!("agent error: {message}"),
            Some(_) => {}
            None => {
                eprintln!("connection closed");
                break;
            }
        }
    }
    let _ = ws.close(None).await;
    Ok(())
}
