use std::sync::Arc;

use carebridge_core::{CarebridgeConfig, ConversationRouter, spawn_stale_sweep};
use miette::{IntoDiagnostic, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::bot::{ConsoleBot, LineError, parse_line};
use crate::console::ConsoleNotifier;
use crate::output::Output;

/// Read `<user id> <text>` lines from stdin until EOF or Ctrl-C
pub async fn run(config: &CarebridgeConfig) -> Result<()> {
    let output = Output::new();
    let router = Arc::new(ConversationRouter::from_config(config).await?);
    let notifier = Arc::new(ConsoleNotifier);

    let sweep = spawn_stale_sweep(
        router.clone(),
        notifier.clone(),
        config.routing.sweep_interval(),
        config.routing.stale_after(),
    );

    output.section("Carebridge console");
    output.status("Type `<user id> <text>`, e.g. `42 /start`. Ctrl-D or Ctrl-C to quit.");
    println!();

    let mut bot = ConsoleBot::new(router, notifier);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.into_diagnostic()?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };

        match parse_line(&line) {
            Ok((user, text)) => {
                for message in bot.handle(user, text).await {
                    println!("{message}");
                }
            }
            Err(LineError::Empty) => {}
            Err(e) => {
                warn!(error = %e, "Ignoring line");
                output.warning(&e.to_string());
            }
        }
    }

    sweep.abort();
    info!("Console transport stopped");
    Ok(())
}
