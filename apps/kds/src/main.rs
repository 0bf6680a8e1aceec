use std::{sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use kitchen_core::{
    HttpKitchenOrderApi, KitchenCoordinator, KitchenEvent, WebSocketPushChannel,
};
use shared::domain::{ChefId, ChefRef, OrderItemId, ProductId};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast,
};
use tracing::{info, warn};

mod config;
mod render;

#[derive(Parser, Debug)]
struct Args {
    /// Order backend base URL; overrides the config file.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    chef_id: i64,
    #[arg(long)]
    chef_name: String,
    #[arg(long, default_value = "kds.toml")]
    config: String,
    /// Poll interval in seconds; overrides the config file.
    #[arg(long)]
    poll_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(&args.config);
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(poll_secs) = args.poll_secs {
        settings.poll_secs = poll_secs;
    }

    let identity = ChefRef {
        chef_id: ChefId(args.chef_id),
        username: args.chef_name,
    };
    let api = Arc::new(HttpKitchenOrderApi::new(
        settings.server_url.clone(),
        identity.chef_id,
    ));
    let push = Arc::new(WebSocketPushChannel::new(&settings.server_url)?);
    let bell = Arc::new(render::TerminalBell::new(settings.bell_enabled));

    let coordinator = KitchenCoordinator::new_with_poll_interval(
        api,
        push,
        bell,
        identity.clone(),
        Duration::from_secs(settings.poll_secs.max(1)),
    );
    coordinator.start().await?;
    info!(
        chef = %identity.username,
        server_url = %settings.server_url,
        "kitchen display started"
    );

    let mut events = coordinator.subscribe_events();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(KitchenEvent::SnapshotUpdated(snapshot)) => {
                    render::redraw_screen(&snapshot, &identity);
                }
                Ok(KitchenEvent::ClaimRejected { item_id, reason }) => {
                    println!("claim on item {} rejected: {reason}", item_id.0);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "display lagged behind coordinator events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match handle_command(&coordinator, line.trim()).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(err) => println!("{err}"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    coordinator.shutdown().await;
    Ok(())
}

/// Returns `Ok(false)` when the operator asked to quit.
async fn handle_command(coordinator: &KitchenCoordinator, line: &str) -> Result<bool> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(true);
    };
    match verb {
        "quit" | "q" => return Ok(false),
        "claim" => {
            coordinator.claim_item(OrderItemId(parse_id(parts.next())?)).await?;
        }
        "done" => {
            coordinator
                .complete_item(OrderItemId(parse_id(parts.next())?))
                .await?;
        }
        "focus" => {
            coordinator.set_focus(ProductId(parse_id(parts.next())?)).await;
        }
        other => {
            println!("unknown command: {other} (claim <item> | done <item> | focus <product> | quit)");
        }
    }
    Ok(true)
}

fn parse_id(arg: Option<&str>) -> Result<i64> {
    let arg = arg.ok_or_else(|| anyhow::anyhow!("missing id argument"))?;
    arg.parse()
        .map_err(|_| anyhow::anyhow!("invalid id: {arg}"))
}
