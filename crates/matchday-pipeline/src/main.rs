//! Matchday - Main entry point

use clap::Parser;
use matchday_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use matchday_common::ScopeKey;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

use matchday_pipeline::cache::{NoopCache, PresentationCache, WebhookCache};
use matchday_pipeline::cli::{Cli, Commands, EXIT_COMPLETED, EXIT_LOCK_HELD, EXIT_STARTUP_ERROR};
use matchday_pipeline::config::PipelineConfig;
use matchday_pipeline::db::{
    self, PgFixtureRepository, PgRunRepository, PgScopeCatalog,
};
use matchday_pipeline::ingest::{ApiFootballClient, CrestSync};
use matchday_pipeline::lock::PipelineLock;
use matchday_pipeline::models::{PipelineRun, ScopeFilter};
use matchday_pipeline::orchestrator::{
    PipelineDeps, PipelineOrchestrator, PipelineOutcome, PipelineStatus,
};
use matchday_pipeline::storage::{ObjectStore, S3Store};
use matchday_pipeline::transform::ExportOptions;
use matchday_pipeline::PipelineResult;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let defaults = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Info })
        .output(LogOutput::Console)
        .log_file_prefix("matchday")
        .filter_directives("sqlx=warn,aws_config=warn,aws_smithy_runtime=warn,hyper=warn")
        .build();

    // Environment variables take precedence over the defaults above
    let log_config = defaults.clone().with_env().unwrap_or(defaults);
    let _log_guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: failed to initialize logging: {:#}", e);
            None
        }
    };

    let code = match execute(&cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, kind = %e.kind(), "Command failed");
            eprintln!("Error: {}", e);
            EXIT_STARTUP_ERROR
        }
    };

    process::exit(code);
}

async fn execute(cli: &Cli) -> PipelineResult<i32> {
    let config = PipelineConfig::load()?;
    let orchestrator = build_orchestrator(&config).await?;

    match &cli.command {
        Commands::Run { source } => {
            report_run(orchestrator.run_full(source).await?)
        }

        Commands::Rebuild { source } => {
            report_run(orchestrator.rebuild(source).await?)
        }

        Commands::Ingest { scope } => {
            let scope = ScopeKey::try_from(*scope)?;
            Ok(match orchestrator.ingest_scope(scope).await? {
                PipelineOutcome::AlreadyRunning => lock_held(),
                PipelineOutcome::Completed(key) => {
                    println!("{}: stored {}/{}", scope, config.storage.bucket, key);
                    EXIT_COMPLETED
                }
            })
        }

        Commands::Transform {
            scope,
            output_dir,
            no_parquet,
        } => {
            let scope = ScopeKey::try_from(*scope)?;
            let mut options =
                ExportOptions::new(output_dir.clone().unwrap_or_else(|| config.data_dir.clone()));
            if *no_parquet {
                options = options.without_parquet();
            }

            Ok(match orchestrator.export_scope(scope, &options).await? {
                PipelineOutcome::AlreadyRunning => lock_held(),
                PipelineOutcome::Completed(table) => {
                    println!(
                        "{}: exported {} fixtures to {}",
                        scope,
                        table.len(),
                        options.output_dir.display()
                    );
                    EXIT_COMPLETED
                }
            })
        }

        Commands::Status {
            league,
            season,
            limit,
        } => {
            let filter = ScopeFilter {
                league_id: *league,
                season_year: *season,
            };
            print_status(&orchestrator.status(filter, *limit).await?);
            Ok(EXIT_COMPLETED)
        }
    }
}

async fn build_orchestrator(config: &PipelineConfig) -> PipelineResult<PipelineOrchestrator> {
    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool).await?;

    let store: Arc<dyn ObjectStore> = Arc::new(S3Store::new(&config.storage));
    info!(bucket = store.container(), "Storage client initialized");

    let cache: Arc<dyn PresentationCache> = match &config.cache_clear_url {
        Some(url) => Arc::new(WebhookCache::new(url.clone(), config.api.timeout())?),
        None => Arc::new(NoopCache),
    };

    let deps = PipelineDeps {
        source: Arc::new(ApiFootballClient::new(config.api.clone())?),
        fixtures: Arc::new(PgFixtureRepository::new(pool.clone())),
        runs: Arc::new(PgRunRepository::new(pool.clone())),
        catalog: Arc::new(PgScopeCatalog::new(pool)),
        crests: Some(CrestSync::new(store.clone(), config.api.crest_timeout())?),
        cache,
        store,
    };

    Ok(PipelineOrchestrator::new(PipelineLock::new(config.lock_path()), deps)
        .with_lock_stale_after(config.lock_stale_after()))
}

fn lock_held() -> i32 {
    eprintln!("Pipeline is already running (lock file present); nothing was changed.");
    EXIT_LOCK_HELD
}

fn report_run(outcome: PipelineOutcome) -> PipelineResult<i32> {
    Ok(match outcome {
        PipelineOutcome::AlreadyRunning => lock_held(),
        PipelineOutcome::Completed(summary) => {
            println!("{}", summary);
            println!("Run #{} recorded; per-scope detail: matchday status", summary.run_id);
            EXIT_COMPLETED
        }
    })
}

fn print_status(status: &PipelineStatus) {
    if status.lock_held {
        let age = status
            .lock_age
            .map(|a| format!("{}s", a.as_secs()))
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "Lock: held ({}, age {}){}",
            status.lock_path.display(),
            age,
            if status.lock_stale {
                " - looks stale; remove the file if no run is active"
            } else {
                ""
            }
        );
    } else {
        println!("Lock: free ({})", status.lock_path.display());
    }

    match &status.latest_success {
        Some(run) => println!("Last success: {}", describe(run)),
        None => println!("Last success: none"),
    }

    if status.recent.is_empty() {
        println!("No runs recorded");
        return;
    }
    println!("Recent runs:");
    for run in &status.recent {
        println!("  {}", describe(run));
        if !run.error_summary.is_empty() {
            let kind = run.error_kind.map(|k| k.to_string()).unwrap_or_default();
            println!("      [{}] {}", kind, run.error_summary);
        }
    }
}

fn describe(run: &PipelineRun) -> String {
    let finished = run
        .finished_at
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "#{} {} {} {} started {} finished {}",
        run.id,
        run.status,
        run.describe_scope(),
        run.source,
        run.started_at.format("%Y-%m-%d %H:%M:%S"),
        finished
    )
}
