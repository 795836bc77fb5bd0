use clap::Parser;
use lookup::model::{EntryId, SiteId, UserId};
use lookup::provider::in_memory::{GraphFixture, InMemoryGraph};
use lookup::provider::Providers;
use lookup::{Error, EvalContext, FunctionRegistry, LookupConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Evaluate lookup expressions against a graph fixture", long_about = None)]
struct Cli {
    /// Path to a JSON graph fixture
    #[arg(short, long)]
    graph: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, default_value = "lookup.json")]
    config: PathBuf,

    /// Site to evaluate in; defaults to the fixture's site
    #[arg(short, long)]
    site: Option<String>,

    /// Entry bound to `this`
    #[arg(short, long)]
    entry: Option<String>,

    /// User evaluating the expression
    #[arg(short, long)]
    user: Option<String>,

    /// Page size for lazy results
    #[arg(long)]
    page_size: Option<usize>,

    /// Print the canonical form of the expression instead of evaluating it
    #[arg(long)]
    canonical: bool,

    /// List the available functions and exit
    #[arg(long)]
    functions: bool,

    /// The expression
    expression: Option<String>,
}

async fn run(cli: &Cli) -> Result<(), Error> {
    let mut config = if cli.config.exists() {
        LookupConfig::from_file(&cli.config)?
    } else {
        LookupConfig::default()
    };
    if let Some(page_size) = cli.page_size {
        config = config.with_page_size(page_size);
    }
    debug!("config: {:?}", config);

    let graph = match &cli.graph {
        Some(path) => GraphFixture::from_file(path)?.into_graph()?,
        None => InMemoryGraph::new(cli.site.as_deref().unwrap_or("default")),
    };
    let site = cli
        .site
        .clone()
        .map(SiteId::new)
        .unwrap_or_else(|| graph.site().clone());
    info!("graph loaded for site {}", site);

    let providers = Providers::from_backend(Arc::new(graph));
    let ctx = EvalContext::new(&providers, config, site)
        .await?
        .with_user(cli.user.as_deref().map(UserId::from))
        .with_entry(cli.entry.as_deref().map(EntryId::from));

    if cli.functions {
        print_functions(ctx.functions());
        return Ok(());
    }

    let Some(text) = &cli.expression else {
        return Err(Error::Config("an expression is required".to_string()));
    };

    if cli.canonical {
        println!("{}", ctx.parse(text)?);
        return Ok(());
    }

    let value = ctx.evaluate_text(text).await?.make_concrete().await?;
    let json = serde_json::to_string_pretty(&value.to_json())
        .map_err(|e| Error::internal(format!("Failed to render result: {}", e)))?;
    println!("{}", json);
    Ok(())
}

fn print_functions(registry: &FunctionRegistry) {
    for function in registry.describe() {
        println!(
            "{}{}  [{}] {}",
            function.name, function.signature, function.origin, function.description
        );
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
