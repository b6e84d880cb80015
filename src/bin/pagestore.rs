//! pagestore command line
//!
//! Drives the page service against a JSON file backed table.
//!
//! # Examples
//!
//! ```bash
//! # Create and publish a page
//! pagestore create --title "About us" --path /about
//! pagestore publish 1f0c...#0001
//!
//! # Resolve the published page of a path
//! pagestore get-by-path /about
//!
//! # List latest pages tagged "news", newest first
//! pagestore list --tags news --sort createdOn_DESC --limit 10
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use pagestore::config::StoreConfig;
use pagestore::metrics;
use pagestore::operations::{ListParams, PageStorageOperations};
use pagestore::page::{GeneralSettings, PageSettings};
use pagestore::query::{ListWhere, SortSpec, TagsRule};
use pagestore::service::{CreatePageInput, PageService, UpdatePageInput};
use pagestore::storage::FileTable;
use pagestore::{FieldRegistry, PageScope, Response, Table};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Single-table page storage
#[derive(Parser, Debug)]
#[command(name = "pagestore")]
#[command(version = pagestore::VERSION)]
#[command(about = "Single-table storage operations for page builder pages", long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Table snapshot file
    #[arg(
        long,
        global = true,
        default_value = "data/pages.json",
        env = "PAGESTORE_TABLE_FILE"
    )]
    table_file: PathBuf,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, global = true, env = "PAGESTORE_CONFIG")]
    config: Option<PathBuf>,

    /// Tenant the pages belong to
    #[arg(long, global = true, default_value = "root", env = "PAGESTORE_TENANT")]
    tenant: String,

    /// Locale the pages belong to
    #[arg(long, global = true, default_value = "en-US", env = "PAGESTORE_LOCALE")]
    locale: String,

    /// Log directory path
    #[arg(long, global = true, default_value = "logs", env = "PAGESTORE_LOG_DIR")]
    log_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn", env = "RUST_LOG")]
    log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new page
    Create(CreateArgs),

    /// Create a new revision from an existing one
    CreateFrom {
        /// Revision id (`pid#0001`) or pid
        id: String,
    },

    /// Update a revision
    Update(UpdateArgs),

    /// Publish a revision
    Publish { id: String },

    /// Unpublish the published revision
    Unpublish { id: String },

    /// Request a review of a revision
    RequestReview { id: String },

    /// Request changes on a revision under review
    RequestChanges { id: String },

    /// Delete a revision, or the whole page when given a pid
    Delete { id: String },

    /// Get a revision, the latest revision, or the published page
    Get {
        id: String,
        /// Load the published page
        #[arg(long)]
        published: bool,
    },

    /// Get the published page of a path
    GetByPath { path: String },

    /// List pages
    List(ListArgs),

    /// List all revisions of a page
    Revisions { pid: String },

    /// List distinct tags
    Tags {
        /// Case-insensitive pattern
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Print Prometheus metrics of this run
    Metrics,

    /// Show version
    Version,
}

#[derive(Args, Debug)]
struct CreateArgs {
    #[arg(short, long)]
    title: Option<String>,

    #[arg(short, long)]
    path: Option<String>,

    #[arg(short, long, default_value = "static")]
    category: String,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    id: String,

    #[arg(short, long)]
    title: Option<String>,

    #[arg(short, long)]
    path: Option<String>,

    #[arg(short, long)]
    category: Option<String>,

    #[arg(long)]
    snippet: Option<String>,

    /// Comma separated tags
    #[arg(long, value_delimiter = ',')]
    tags: Option<Vec<String>>,

    /// Page content as JSON
    #[arg(long)]
    content: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TagsRuleArg {
    Any,
    All,
}

impl From<TagsRuleArg> for TagsRule {
    fn from(rule: TagsRuleArg) -> Self {
        match rule {
            TagsRuleArg::Any => TagsRule::Any,
            TagsRuleArg::All => TagsRule::All,
        }
    }
}

#[derive(Args, Debug)]
struct ListArgs {
    /// List published pages instead of latest revisions
    #[arg(long)]
    published: bool,

    /// List latest revisions (default)
    #[arg(long)]
    latest: bool,

    /// Free text search over title and snippet
    #[arg(short, long)]
    search: Option<String>,

    /// Comma separated tags
    #[arg(long, value_delimiter = ',')]
    tags: Vec<String>,

    #[arg(long, value_enum, default_value = "all")]
    tags_rule: TagsRuleArg,

    /// Sort keys such as `createdOn_DESC`
    #[arg(long)]
    sort: Vec<String>,

    #[arg(short, long)]
    limit: Option<usize>,

    /// Cursor returned by the previous call
    #[arg(short, long)]
    after: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let _guard = setup_logging(&cli)?;

    if let Commands::Version = cli.command {
        println!("pagestore {}", pagestore::VERSION);
        return Ok(());
    }

    metrics::init_metrics();
    let config = StoreConfig::load(cli.config.as_deref())?;
    let scope = PageScope::new(cli.tenant.clone(), cli.locale.clone())?;

    let engine = FileTable::open(&cli.table_file, config.max_batch_size, config.query_page_size).await?;
    info!(
        table = %config.table_name,
        file = %cli.table_file.display(),
        "Opened page table"
    );
    let table = Arc::new(Table::new(config.table_name.clone(), Box::new(engine)));
    let operations = PageStorageOperations::from_config(table, FieldRegistry::with_defaults(), &config);
    let service = PageService::new(operations);

    run(&service, &scope, cli.command).await
}

async fn run(service: &PageService, scope: &PageScope, command: Commands) -> anyhow::Result<()> {
    debug!(?command, "Running command");
    match command {
        Commands::Create(args) => {
            let input = CreatePageInput {
                title: args.title,
                path: args.path,
                category: args.category,
                created_by: None,
            };
            print(service.create(scope, input).await)
        }
        Commands::CreateFrom { id } => print(service.create_from(scope, &id).await),
        Commands::Update(args) => {
            let id = args.id.clone();
            let input = update_input(service, scope, args).await?;
            print(service.update(scope, &id, input).await)
        }
        Commands::Publish { id } => print(service.publish(scope, &id).await),
        Commands::Unpublish { id } => print(service.unpublish(scope, &id).await),
        Commands::RequestReview { id } => print(service.request_review(scope, &id).await),
        Commands::RequestChanges { id } => print(service.request_changes(scope, &id).await),
        Commands::Delete { id } => print(service.delete(scope, &id).await),
        Commands::Get { id, published } => {
            let result = if published {
                service.get_published(scope, &id).await
            } else {
                service.get(scope, &id).await
            };
            print(result)
        }
        Commands::GetByPath { path } => print(service.get_published_by_path(scope, &path).await),
        Commands::List(args) => {
            let result = match list_params(scope, args) {
                Ok(params) => service.list(params).await,
                Err(e) => Err(e),
            };
            print(result)
        }
        Commands::Revisions { pid } => print(service.list_revisions(scope, &pid).await),
        Commands::Tags { search } => print(service.list_tags(scope, search).await),
        Commands::Metrics => {
            print!("{}", metrics::export_metrics());
            Ok(())
        }
        Commands::Version => Ok(()),
    }
}

/// Settings are replaced as a whole, so unchanged values are carried over.
async fn update_input(
    service: &PageService,
    scope: &PageScope,
    args: UpdateArgs,
) -> anyhow::Result<UpdatePageInput> {
    let content = args
        .content
        .as_deref()
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()?;

    let settings = if args.snippet.is_some() || args.tags.is_some() {
        let current = service.get(scope, &args.id).await?.settings.general;
        Some(PageSettings {
            general: GeneralSettings {
                snippet: args.snippet.or(current.snippet),
                tags: args.tags.unwrap_or(current.tags),
                image: current.image,
            },
        })
    } else {
        None
    };

    Ok(UpdatePageInput {
        title: args.title,
        path: args.path,
        category: args.category,
        settings,
        content,
    })
}

fn list_params(scope: &PageScope, args: ListArgs) -> pagestore::Result<ListParams> {
    let mut builder = ListWhere::builder(scope.clone())
        .latest(args.latest)
        .published(args.published)
        .tags(args.tags, args.tags_rule.into());
    if let Some(search) = args.search {
        builder = builder.search(search);
    }

    let sort = args
        .sort
        .iter()
        .map(|s| s.parse::<SortSpec>())
        .collect::<pagestore::Result<Vec<_>>>()?;

    Ok(ListParams {
        where_: builder.build()?,
        sort,
        limit: args.limit,
        after: args.after,
    })
}

fn print<T: Serialize>(result: pagestore::Result<T>) -> anyhow::Result<()> {
    let response = Response::from(result);
    println!("{}", serde_json::to_string_pretty(&response)?);
    if let Some(error) = &response.error {
        anyhow::bail!("{}: {}", error.code, error.message);
    }
    Ok(())
}

/// Setup logging with rolling files and stderr output
fn setup_logging(cli: &Cli) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(&cli.log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &cli.log_dir, "pagestore.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::WARN);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!cli.no_color)
                .compact(),
        )
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(guard)
}
