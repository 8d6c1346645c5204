//! CLI command definitions and handlers

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;

use deskgraph::classify::{ClassificationGateway, ScorerClient};
use deskgraph::config::{self, EngineConfig, CONFIG_FILE_NAME};
use deskgraph::graph::{GraphStore, NodeKind};
use deskgraph::models::{ClassificationStatus, SearchCriteria, SortDir, SortKey};
use deskgraph::search::SearchFacade;
use deskgraph::sync::RelationshipSynchronizer;

/// Deskgraph - graph-powered ticket management
#[derive(Parser, Debug)]
#[command(name = "deskgraph")]
#[command(
    version,
    about = "Graph-powered ticket management engine — relationship sync, confidence-gated classification, keyword-ranked search",
    after_help = "\
Examples:
  deskgraph reinit                     Rederive every relationship kind
  deskgraph reinit --quick             Fast repair (category/creator/assignee)
  deskgraph classify T-1042            Classify one ticket synchronously
  deskgraph search \"database timeout\"  Keyword-ranked ticket search
  deskgraph similar T-1042 --limit 3   Related-ticket discovery
  deskgraph stats                      Classification workflow counts"
)]
pub struct Cli {
    /// Path to the data directory (default: current directory)
    #[arg(long, global = true, default_value = ".")]
    pub path: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter deskgraph.toml with example settings
    Init,

    /// Rederive relationships for the whole graph (pure upserts, safe to repeat)
    Reinit {
        /// Only repair category, creator and assignee links
        #[arg(long)]
        quick: bool,
    },

    /// Classify one ticket synchronously against the scorer
    Classify {
        ticket_id: String,
    },

    /// Classify tickets through the async worker pool (defaults to all
    /// unclassified tickets)
    BatchClassify {
        ticket_ids: Vec<String>,
    },

    /// Manually set a ticket's category, superseding any automatic result
    Override {
        ticket_id: String,
        /// Category id or name
        category: String,
    },

    /// Keyword-ranked search over tickets (or articles)
    Search {
        query: String,
        /// Search knowledge articles instead of tickets
        #[arg(long)]
        articles: bool,
    },

    /// Find tickets similar to the given one
    Similar {
        ticket_id: String,
        #[arg(long, default_value = "5")]
        limit: usize,
    },

    /// Exact conjunctive filtering over tickets
    Filter {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
        /// Case-insensitive substring over title and description
        #[arg(long)]
        text: Option<String>,
        #[arg(long, default_value = "createdat", value_parser = ["createdat", "priority", "title", "status"])]
        sort: String,
        #[arg(long)]
        asc: bool,
    },

    /// Classification workflow statistics
    Stats,

    /// Delete every edge in the store (destructive)
    DeleteEdges {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

const STARTER_CONFIG: &str = "\
# deskgraph.toml

[scorer]
base_url = \"http://127.0.0.1:8750\"
timeout_secs = 10

[classification]
confidence_threshold = 0.75
workers = 3

[search]
accept_threshold = 0.3
similarity_threshold = 0.4
ticket_limit = 20
article_limit = 10

[sync]
similar_fanout = 5
bulk_similar_fanout = 20
";

pub fn run(cli: Cli) -> Result<()> {
    if let Commands::Init = cli.command {
        return init(&cli.path);
    }

    let config = config::load_config(&cli.path);
    let store = Arc::new(
        GraphStore::new(&cli.path.join(".deskgraph")).context("Failed to open graph store")?,
    );
    let sync = Arc::new(RelationshipSynchronizer::new(
        Arc::clone(&store),
        config.sync.clone(),
    ));

    match cli.command {
        Commands::Init => unreachable!("handled above"),

        Commands::Reinit { quick } => {
            let report = if quick {
                sync.quick_reinitialize()
            } else {
                sync.reinitialize_all()
            };
            store.save()?;
            println!("{} {}", style("✓").green().bold(), report.summary());
        }

        Commands::Classify { ticket_id } => {
            let gateway = build_gateway(&store, &sync, &config);
            match gateway.classify(&ticket_id) {
                Ok(result) => {
                    store.save()?;
                    println!(
                        "{} {} → {} ({}, confidence {:.2})",
                        style("✓").green().bold(),
                        ticket_id,
                        result.category_name,
                        result.predicted_category,
                        result.confidence,
                    );
                }
                Err(e) => {
                    store.save()?;
                    bail!("classification failed: {e}");
                }
            }
        }

        Commands::BatchClassify { ticket_ids } => {
            let ids = if ticket_ids.is_empty() {
                unclassified_tickets(&store)
            } else {
                ticket_ids
            };
            if ids.is_empty() {
                println!("Nothing to classify.");
                return Ok(());
            }

            let gateway = build_gateway(&store, &sync, &config);
            let classified = gateway.batch_classify(&ids);
            store.save()?;
            println!(
                "{} {}/{} tickets classified",
                style("✓").green().bold(),
                classified,
                ids.len()
            );
        }

        Commands::Override {
            ticket_id,
            category,
        } => {
            let gateway = build_gateway(&store, &sync, &config);
            gateway.override_classification(&ticket_id, &category)?;
            store.save()?;
            println!(
                "{} {} → {} (manual)",
                style("✓").green().bold(),
                ticket_id,
                category
            );
        }

        Commands::Search { query, articles } => {
            let kind = if articles {
                NodeKind::KnowledgeArticle
            } else {
                NodeKind::Ticket
            };
            let facade = SearchFacade::new(Arc::clone(&store), config.search.clone());
            let results = facade.search(&query, kind);
            if results.is_empty() {
                println!("No matches.");
            }
            for (node, score) in results {
                println!(
                    "{:>5.2}  {}  {}",
                    score,
                    style(&node.id).cyan(),
                    node.display_name()
                );
            }
        }

        Commands::Similar { ticket_id, limit } => {
            let facade = SearchFacade::new(Arc::clone(&store), config.search.clone());
            let results = facade.find_similar(&ticket_id, limit);
            if results.is_empty() {
                println!("No similar tickets.");
            }
            for (node, similarity) in results {
                println!(
                    "{:>5.2}  {}  {}",
                    similarity,
                    style(&node.id).cyan(),
                    node.display_name()
                );
            }
        }

        Commands::Filter {
            status,
            priority,
            category,
            assignee,
            text,
            sort,
            asc,
        } => {
            let criteria = SearchCriteria {
                status,
                priority,
                category,
                assignee,
                text,
                sort_by: match sort.as_str() {
                    "priority" => SortKey::Priority,
                    "title" => SortKey::Title,
                    "status" => SortKey::Status,
                    _ => SortKey::CreatedAt,
                },
                direction: if asc { SortDir::Asc } else { SortDir::Desc },
                ..Default::default()
            };
            let facade = SearchFacade::new(Arc::clone(&store), config.search.clone());
            let results = facade.advanced_search(&criteria);
            println!("{} tickets", results.len());
            for node in results {
                println!(
                    "{}  [{}] [{}]  {}",
                    style(&node.id).cyan(),
                    node.get_str("status").unwrap_or("-"),
                    node.get_str("priority").unwrap_or("-"),
                    node.display_name()
                );
            }
        }

        Commands::Stats => {
            let gateway = build_gateway(&store, &sync, &config);
            let stats = gateway.statistics();
            println!("{}", stats.summary());
            for (key, value) in store.stats() {
                println!("  {key}: {value}");
            }
        }

        Commands::DeleteEdges { yes } => {
            if !yes {
                bail!("refusing to delete every edge without --yes");
            }
            let removed = sync.delete_all_edges();
            store.save()?;
            println!(
                "{} {} edges deleted",
                style("✓").yellow().bold(),
                removed
            );
        }
    }

    Ok(())
}

fn init(path: &std::path::Path) -> Result<()> {
    let config_path = path.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        bail!("{} already exists", config_path.display());
    }
    std::fs::write(&config_path, STARTER_CONFIG)?;
    println!(
        "{} wrote {}",
        style("✓").green().bold(),
        config_path.display()
    );
    Ok(())
}

fn build_gateway(
    store: &Arc<GraphStore>,
    sync: &Arc<RelationshipSynchronizer>,
    config: &EngineConfig,
) -> ClassificationGateway {
    ClassificationGateway::new(
        Arc::clone(store),
        Arc::clone(sync),
        ScorerClient::new(&config.scorer),
        config.classification.clone(),
    )
}

fn unclassified_tickets(store: &GraphStore) -> Vec<String> {
    store
        .get_nodes_by_kind(NodeKind::Ticket)
        .into_iter()
        .filter(|t| {
            t.get_str("classificationStatus")
                .and_then(ClassificationStatus::parse)
                .unwrap_or_default()
                == ClassificationStatus::Unclassified
        })
        .map(|t| t.id)
        .collect()
}
