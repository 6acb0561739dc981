mod commands;
mod pipeline;
mod run;
#[cfg(test)]
mod testing;

use chrono::Datelike;
use clap::{Parser, Subcommand};
use pipeline::{Pipeline, StageCache};
use quill_core::{
    config::{self, Config},
    prompts::PromptConfig,
    traits::Generator,
};
use quill_providers::AnthropicGenerator;
use quill_sources::SourceLoader;
use quill_store::{ArticleWriter, Store};
use run::{RunOptions, Runner};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "quill",
    version,
    about = "Quill: landing-page article generation with graded validation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "quill.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate articles for pending queue entries.
    Generate {
        /// Process at most N subjects.
        #[arg(long)]
        limit: Option<usize>,
        /// Only these slug bases, comma-separated exact match (e.g. python,vue-js).
        #[arg(long, value_delimiter = ',')]
        tech: Vec<String>,
        /// Only pages whose URL contains this text.
        #[arg(long)]
        page: Option<String>,
        /// Ignore caches and regenerate subjects that are already done.
        #[arg(long)]
        no_cache: bool,
        /// Load data and assemble prompts without calling the model.
        #[arg(long)]
        dry_run: bool,
        /// Subjects processed concurrently.
        #[arg(long, default_value_t = 1)]
        jobs: usize,
    },
    /// Re-validate a persisted article.
    Validate {
        /// Slug or page URL.
        slug: String,
    },
    /// Manage the work queue.
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Show recent runs.
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Check configuration and data availability.
    Status,
}

#[derive(Subcommand)]
enum QueueAction {
    /// Queue one page.
    Add {
        url: String,
        /// Draft reference in the SEO tool.
        #[arg(long)]
        draft: Option<String>,
    },
    /// Queue every page in a CSV with a URL column.
    Import { path: PathBuf },
    /// List all entries.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut cfg = config::load(&cli.config)?;
    let _guard = init_logging(&cfg)?;

    let year = chrono::Utc::now().year();

    match cli.command {
        Commands::Generate {
            limit,
            tech,
            page,
            no_cache,
            dry_run,
            jobs,
        } => {
            if !dry_run {
                cfg.require_generation()?;
            }
            if cfg.validation.stale_before_year.is_none() {
                cfg.validation.stale_before_year = Some(year - 1);
            }
            let opts = RunOptions {
                limit,
                tech,
                page,
                no_cache,
                dry_run,
                jobs,
            };
            let runner = build_runner(&cfg, year, no_cache).await?;
            let summary = runner.run(&opts).await?;
            if summary.total() > 0 {
                run::print_summary(&summary);
                println!(
                    "\nSummary saved to {}",
                    runner.writer.summary_path().display()
                );
            }
        }
        Commands::Validate { slug } => {
            let loader = SourceLoader::from_config(&cfg);
            let writer = ArticleWriter::new(cfg.quill.output_path());
            let text =
                commands::validate_article(&loader, &writer, &cfg.validation, &slug, year - 1)
                    .await?;
            println!("{text}");
        }
        Commands::Queue { action } => {
            let store = Store::open(&cfg.store).await?;
            let text = match action {
                QueueAction::Add { url, draft } => {
                    commands::queue_add(&store, &url, draft.as_deref()).await?
                }
                QueueAction::Import { path } => commands::queue_import(&store, &path).await?,
                QueueAction::List => commands::queue_list(&store).await?,
            };
            println!("{text}");
        }
        Commands::History { limit } => {
            let store = Store::open(&cfg.store).await?;
            println!("{}", commands::history(&store, limit).await?);
        }
        Commands::Status => {
            println!("{}", commands::status(&cfg, &cli.config).await?);
        }
    }

    Ok(())
}

/// Stderr plus a daily rolling file in the logs directory.
fn init_logging(cfg: &Config) -> anyhow::Result<WorkerGuard> {
    let logs_dir = cfg.quill.logs_dir();
    std::fs::create_dir_all(&logs_dir)?;
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&logs_dir, "quill.log"));

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.quill.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();
    Ok(guard)
}

/// Wire the generator, loaders, store and output directory from config.
async fn build_runner(cfg: &Config, year: i32, no_cache: bool) -> anyhow::Result<Runner> {
    let generator: Arc<dyn Generator> = Arc::new(AnthropicGenerator::from_config(&cfg.provider)?);
    let prompts = PromptConfig::from_config(cfg, year)?;
    let cache = StageCache::new(cfg.quill.stage_cache_dir(), !no_cache);
    tracing::info!(
        "generator: {} (writer {}), stage cache {}",
        generator.name(),
        cfg.provider.writer_model,
        cache.root().display()
    );

    Ok(Runner {
        store: Store::open(&cfg.store).await?,
        loader: SourceLoader::from_config(cfg),
        pipeline: Pipeline::new(generator, cfg, prompts, cache),
        writer: ArticleWriter::new(cfg.quill.output_path()),
        validation: cfg.validation.clone(),
        skip_done: cfg.queue.skip_done,
    })
}
