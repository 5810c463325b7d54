use std::sync::Arc;

use carebridge_core::{CarebridgeConfig, QuestionGraph, StringCatalog, TriageWalker};
use miette::Result;
use tracing::info;

use crate::output::Output;

/// Load the question graph and catalogs and run every startup check
pub async fn validate(config: &CarebridgeConfig) -> Result<()> {
    let output = Output::new();
    output.section("Validating triage data");

    let graph = QuestionGraph::load(&config.triage.graph_path).await?;
    let catalog = StringCatalog::load_dir(&config.triage.strings_dir).await?;
    let languages: Vec<String> = catalog.languages().into_iter().map(str::to_string).collect();

    let graph = Arc::new(graph);
    TriageWalker::new(graph.clone(), Arc::new(catalog), config.triage.settings())?;
    info!(questions = graph.len(), "Triage data is valid");

    output.kv("Graph", &config.triage.graph_path.display().to_string());
    output.kv("Strings", &config.triage.strings_dir.display().to_string());
    output.kv("Start", graph.start().as_str());
    output.kv("Nodes", &graph.len().to_string());
    output.kv("Languages", &languages.join(", "));

    let terminals: Vec<_> = graph
        .nodes()
        .filter(|node| graph.is_terminal(node.id.as_str()))
        .collect();
    output.kv("Endings", &terminals.len().to_string());
    for node in terminals {
        let destination = match (node.category, node.handoff) {
            (Some(category), _) => config.categories.route(category).room_label.as_str(),
            (None, Some(handoff)) => config.categories.handoff(handoff).room_label.as_str(),
            (None, None) => "no request",
        };
        output.list_item(&format!("{} → {}", node.id, destination));
    }

    println!();
    output.success("Question graph and string catalogs are valid");
    Ok(())
}
