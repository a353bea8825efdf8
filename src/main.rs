use std::sync::Arc;

use clap::{Parser, ValueEnum};
use fluxview::provider::ReloadOutcome;
use fluxview::tree::{NodePayload, ReconcileStatus};
use fluxview::{AppConfig, Category, ClusterFetcher, FluxViewApp, NodeId, Tree};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(about, version)]
struct Cli {
    /// Load dependency trees of every Kustomization and HelmRelease
    #[arg(long)]
    deps: bool,

    /// kubeconfig context to use instead of the configured one
    #[arg(long, value_name = "name")]
    context: Option<String>,

    /// Trees to print; all of them when omitted
    #[arg(value_enum, value_name = "tree")]
    categories: Vec<CategoryArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CategoryArg {
    Sources,
    Workloads,
    Clusters,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Sources => Category::Sources,
            CategoryArg::Workloads => Category::Workloads,
            CategoryArg::Clusters => Category::Clusters,
        }
    }
}

fn status_marker(status: Option<ReconcileStatus>) -> &'static str {
    match status {
        Some(ReconcileStatus::Ready) => "✓",
        Some(ReconcileStatus::Progressing) => "…",
        Some(ReconcileStatus::Failed) => "✗",
        None => " ",
    }
}

fn print_tree(category: Category, tree: &Tree) {
    println!("{}", category.title());
    for (depth, node) in tree.walk() {
        let indent = "  ".repeat(depth + 1);
        match &node.description {
            Some(description) => println!(
                "{}{} {}  ({})",
                indent,
                status_marker(node.status),
                node.label,
                description
            ),
            None => println!("{}{} {}", indent, status_marker(node.status), node.label),
        }
    }
}

/// Expandable workload nodes at any depth
fn expandable_nodes(app: &FluxViewApp) -> Vec<NodeId> {
    let tree = app.provider(Category::Workloads).snapshot();
    tree.walk()
        .into_iter()
        .filter(|(_, node)| match &node.payload {
            NodePayload::Resource(resource) => app.registry().is_expandable(&resource.kind),
            _ => false,
        })
        .map(|(_, node)| node.id)
        .collect()
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting fluxview v{}", env!("CARGO_PKG_VERSION"));

    // kube's TLS stack needs a process-wide crypto provider
    if rustls::crypto::aws_lc_rs::default_provider().install_default().is_err() {
        tracing::debug!("rustls crypto provider already installed");
    }

    let mut categories: Vec<Category> = cli.categories.iter().copied().map(Category::from).collect();
    if categories.is_empty() {
        categories = vec![Category::Sources, Category::Workloads, Category::Clusters];
    }
    categories.dedup();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::error!("Failed to load config: {}", e);
        AppConfig::default()
    });
    if cli.context.is_some() {
        config.kube_context = cli.context;
    }
    let fetcher = Arc::new(ClusterFetcher::new(&config));
    let app = match FluxViewApp::new(config, fetcher) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let outcomes = app.reload_all().await;
    for (category, outcome) in &outcomes {
        if *outcome == ReloadOutcome::Failed {
            tracing::warn!("{} failed to load", category.title());
        }
    }

    if cli.deps && categories.contains(&Category::Workloads) {
        let workloads = app.provider(Category::Workloads);
        let expansions = expandable_nodes(&app).into_iter().map(|id| workloads.expand(id));
        for result in futures::future::join_all(expansions).await {
            if let Err(e) = result {
                tracing::warn!("Failed to expand workload: {}", e);
            }
        }
    }

    let mut first = true;
    for category in categories {
        if !first {
            println!();
        }
        first = false;
        print_tree(category, &app.provider(category).snapshot());
    }

    tracing::debug!("{} tree events emitted", app.events().len());
}
