use carebridge_core::config::{self, CarebridgeConfig};
use carebridge_core::{Handoff, RequestCategory};
use miette::{IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use std::path::Path;

use crate::output::Output;

/// Print where the configuration came from, the staff rooms in use and the full TOML
pub async fn show(config: &CarebridgeConfig, source: Option<&Path>) -> Result<()> {
    let output = Output::new();

    output.section("Carebridge configuration");
    match source {
        Some(path) => output.kv("Loaded from", &path.display().to_string()),
        None => output.kv("Loaded from", "built-in defaults (no config file found)"),
    }
    let overrides = config::env_overrides_in_effect();
    if !overrides.is_empty() {
        output.kv("Environment", &overrides.join(", "));
    }
    output.kv(
        "Capacity",
        &format!("{} conversations", config.routing.capacity),
    );
    output.kv(
        "Reminders",
        &format!(
            "after {} minutes, checked every {}s",
            config.routing.stale_after_minutes, config.routing.sweep_interval_seconds
        ),
    );
    rooms(&output, config);

    println!();
    let toml_str = toml::to_string_pretty(config).into_diagnostic()?;
    println!("{}", toml_str);

    Ok(())
}

/// Write the effective configuration, environment overrides included
pub async fn save(config: &CarebridgeConfig, path: &Path) -> Result<()> {
    let output = Output::new();

    if path.exists() {
        output.warning(&format!("Overwriting {}", path.display()));
    }
    let overrides = config::env_overrides_in_effect();
    if !overrides.is_empty() {
        output.warning(&format!(
            "Room overrides from {} are written into the file",
            overrides.join(", ")
        ));
    }

    config::save_config(config, path).await?;
    output.success(&format!("Saved configuration to {}", path.display()));
    rooms(&output, config);

    println!();
    println!("Check the triage data, then start the console bot:");
    for command in ["validate", "run"] {
        println!(
            "  {} --config {} {}",
            "carebridge-cli".bright_green(),
            path.display(),
            command
        );
    }

    Ok(())
}

fn rooms(output: &Output, config: &CarebridgeConfig) {
    output.status("Staff rooms");
    for category in RequestCategory::ALL {
        let route = config.categories.route(category);
        output.list_item(&format!("{category} → {} ({})", route.room, route.room_label));
    }
    let route = config.categories.handoff(Handoff::NewMembers);
    output.list_item(&format!(
        "{} → {} ({})",
        Handoff::NewMembers,
        route.room,
        route.room_label
    ));
}
