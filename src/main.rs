//! pathway-engine - loads a pathway definition, publishes it and prints the
//! resulting structure.
//!
//! ```text
//! pathway-engine path/to/definition.yaml
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use pathway_engine::adapters::{
    InMemoryBadgeFacts, InMemoryEventBus, InMemoryGroupDirectory, InMemoryPathwayRepository, InMemoryProgressStore,
};
use pathway_engine::application::{BadgeEventHandler, LineageLocks, ProgressEngine, VersionStore};
use pathway_engine::config::AppConfig;
use pathway_engine::domain::foundation::{DomainError, OrganizationId, StepId};
use pathway_engine::domain::pathway::{PathwayDefinition, PathwayVersion};

#[tokio::main]
async fn main() {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(2);
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {}", e);
        std::process::exit(2);
    }
    config.logging.init_tracing();

    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        error!("usage: pathway-engine <definition.yaml>");
        std::process::exit(2);
    };

    if let Err(e) = run(&config, path).await {
        error!(code = %e.code, "{}", e.message);
        std::process::exit(1);
    }
}

async fn run(config: &AppConfig, path: PathBuf) -> Result<(), DomainError> {
    let pathways = Arc::new(InMemoryPathwayRepository::new());
    let progress = Arc::new(InMemoryProgressStore::new());
    let badges = Arc::new(InMemoryBadgeFacts::new());
    let groups = Arc::new(InMemoryGroupDirectory::new());
    let bus = Arc::new(InMemoryEventBus::new());
    let locks = Arc::new(LineageLocks::new());

    let versions = VersionStore::new(pathways.clone(), bus.clone(), locks.clone());
    let engine = Arc::new(ProgressEngine::new(
        pathways,
        progress,
        badges,
        groups,
        bus.clone(),
        locks,
        config.engine.clone(),
    ));
    BadgeEventHandler::register(engine, bus.as_ref());

    let definition = PathwayDefinition::from_path(&path)?;
    info!(path = %path.display(), name = %definition.name, "loaded pathway definition");

    let imported = versions.import_definition(OrganizationId::new(), &definition).await?;
    let published = versions.publish(imported.pathway.id()).await?;

    info!(
        pathway_id = %published.pathway_id(),
        version_id = %published.id(),
        version = published.version(),
        steps = published.step_count(),
        countable = published.countable_leaves().len(),
        events = bus.event_count(),
        "pathway published"
    );
    print_tree(&published, None, 0);
    Ok(())
}

fn print_tree(version: &PathwayVersion, parent: Option<StepId>, depth: usize) {
    for step in version.children(parent) {
        let marker = if step.is_milestone() { " [milestone]" } else { "" };
        println!("{}{}. {}{}", "  ".repeat(depth), step.order_index() + 1, step.title(), marker);
        if let Some(rule) = step.prerequisite() {
            println!("{}   unlocks when {}", "  ".repeat(depth), rule);
        }
        if let Some(rule) = step.requirement() {
            println!("{}   completes when {}", "  ".repeat(depth), rule);
        }
        print_tree(version, Some(step.id()), depth + 1);
    }
}
