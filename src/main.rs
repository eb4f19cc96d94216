use std::{io::Read, process, sync::Arc};

use apalis::{
    layers::WorkerBuilderExt,
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_cron::CronStream;
use apalis_sql::{Config as ApalisSqlConfig, postgres::PostgresStorage};
use folata::{
    application::{
        error::AppError,
        jobs::{
            INVALIDATE_URLS_JOB, InvalidationWorkerContext, PruneLogContext,
            process_invalidate_urls_job, process_prune_log_job, prune_log_schedule,
        },
        pagination::PageRequest,
        pipeline::InvalidationPipeline,
        repos::{JobsRepo, PurgeLogRepo},
        resolver::{PermalinkResolver, PostUrlResolver},
    },
    cache::{CacheConfig, EdgeVersionStore},
    config,
    domain::entries::PurgeLogEntry,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{AdminState, build_admin_router},
        purge::{CdnPurgeClient, CdnPurgeConfig},
        telemetry,
    },
};
use time::format_description::well_known::Rfc3339;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Invalidate(args) => run_invalidate(settings, args).await,
        config::Command::InvalidateUrlsForPost(args) => run_invalidate_post(settings, args).await,
        config::Command::ListUrlsToInvalidateForPost(args) => run_list_post_urls(&settings, &args),
        config::Command::Log(args) => run_log(settings, args).await,
        config::Command::TruncateLog(_) => run_truncate_log(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let (http_repositories, job_repositories) = init_repositories(&settings).await?;

    PostgresStorage::setup(job_repositories.pool())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    // One version store for the whole process: the admin surface and the job
    // workers must agree on page versions.
    let versions = Arc::new(EdgeVersionStore::new(&CacheConfig::from(&settings.cache)));

    let pipeline = build_pipeline(&settings, &http_repositories, versions.clone())?;

    let log_repo: Arc<dyn PurgeLogRepo> = http_repositories.clone();
    let jobs_repo: Arc<dyn JobsRepo> = http_repositories.clone();
    let admin_state = AdminState {
        pipeline: pipeline.clone(),
        log: log_repo,
        jobs: jobs_repo,
        defer_delay: settings.invalidation.defer_delay,
    };

    let worker_context = InvalidationWorkerContext {
        pipeline: build_pipeline(&settings, &job_repositories, versions)?,
    };
    let prune_log_repo: Arc<dyn PurgeLogRepo> = job_repositories.clone();
    let prune_context = PruneLogContext {
        log: prune_log_repo,
        retention_age: settings.invalidation.retention_age,
    };

    let monitor_handle = spawn_job_monitor(
        job_repositories,
        worker_context,
        prune_context,
        &settings.invalidation,
    );

    let result = serve_http(&settings, admin_state).await;

    monitor_handle.abort();
    let _ = monitor_handle.await;

    result
}

async fn run_invalidate(
    settings: config::Settings,
    args: config::InvalidateArgs,
) -> Result<(), AppError> {
    let urls = collect_invalidate_urls(&args.urls)?;
    if urls.is_empty() {
        return Err(AppError::validation(
            "provide at least one URL, or `-` to read URLs from stdin",
        ));
    }

    let repositories = init_repository(&settings).await?;
    let versions = Arc::new(EdgeVersionStore::new(&CacheConfig::from(&settings.cache)));
    let pipeline = build_pipeline(&settings, &repositories, versions)?;

    invalidate_and_report(&pipeline, &urls).await
}

async fn run_invalidate_post(
    settings: config::Settings,
    args: config::InvalidatePostArgs,
) -> Result<(), AppError> {
    let urls = post_url_resolver(&settings).urls_for_post(args.post_id);

    let repositories = init_repository(&settings).await?;
    let versions = Arc::new(EdgeVersionStore::new(&CacheConfig::from(&settings.cache)));
    let pipeline = build_pipeline(&settings, &repositories, versions)?;

    invalidate_and_report(&pipeline, &urls).await
}

fn run_list_post_urls(
    settings: &config::Settings,
    args: &config::ListPostUrlsArgs,
) -> Result<(), AppError> {
    let urls = post_url_resolver(settings).urls_for_post(args.post_id);

    match args.format {
        config::OutputFormat::Table => {
            let rows: Vec<Vec<String>> = urls.into_iter().map(|url| vec![url]).collect();
            print_table(&["url"], &rows);
        }
        config::OutputFormat::Json => {
            let items: Vec<_> = urls
                .into_iter()
                .map(|url| serde_json::json!({ "url": url }))
                .collect();
            print_json(&items)?;
        }
    }

    Ok(())
}

async fn run_log(settings: config::Settings, args: config::LogArgs) -> Result<(), AppError> {
    let repositories = init_repository(&settings).await?;
    let page = repositories
        .list(PageRequest::new(args.limit, args.page))
        .await?;

    match args.format {
        config::OutputFormat::Table => {
            let rows: Vec<Vec<String>> = page.entries.iter().map(log_entry_row).collect();
            print_table(&["date", "url", "status"], &rows);
            println!(
                "Page {} of {} ({} entries)",
                args.page.max(1),
                page.total_pages.max(1),
                page.total_items
            );
        }
        config::OutputFormat::Json => print_json(&page)?,
    }

    Ok(())
}

async fn run_truncate_log(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repository(&settings).await?;
    repositories.truncate().await?;
    println!("Log truncated.");
    Ok(())
}

fn collect_invalidate_urls(args: &[String]) -> Result<Vec<String>, AppError> {
    if args.len() == 1 && args[0] == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|err| AppError::from(InfraError::Io(err)))?;
        return Ok(buffer
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect());
    }

    Ok(args
        .iter()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .collect())
}

async fn invalidate_and_report(
    pipeline: &InvalidationPipeline,
    urls: &[String],
) -> Result<(), AppError> {
    if pipeline.invalidate(urls).await {
        println!("Flush request succeeded.");
        Ok(())
    } else {
        Err(AppError::unexpected(
            "there was an error when trying to flush the URLs; see the purge log for details",
        ))
    }
}

fn post_url_resolver(settings: &config::Settings) -> PermalinkResolver {
    PermalinkResolver::new(
        settings.site.base_url.clone(),
        settings.site.permalink_template.clone(),
    )
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<(Arc<PostgresRepositories>, Arc<PostgresRepositories>), AppError> {
    let database_url = require_database_url(settings)?;

    let http_pool =
        PostgresRepositories::connect(database_url, settings.database.http_max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&http_pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let jobs_pool =
        PostgresRepositories::connect(database_url, settings.database.jobs_max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok((
        Arc::new(PostgresRepositories::new(http_pool)),
        Arc::new(PostgresRepositories::new(jobs_pool)),
    ))
}

async fn init_repository(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = require_database_url(settings)?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.http_max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn require_database_url(settings: &config::Settings) -> Result<&String, AppError> {
    settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)
}

fn build_pipeline(
    settings: &config::Settings,
    repositories: &Arc<PostgresRepositories>,
    versions: Arc<EdgeVersionStore>,
) -> Result<Arc<InvalidationPipeline>, AppError> {
    let endpoint = settings
        .purge
        .endpoint
        .clone()
        .ok_or_else(|| InfraError::configuration("purge endpoint is not configured"))
        .map_err(AppError::from)?;

    let backend = Arc::new(
        CdnPurgeClient::new(CdnPurgeConfig {
            endpoint,
            api_token: settings.purge.api_token.clone(),
            request_timeout: settings.purge.request_timeout,
            limits: settings.purge.limits,
        })
        .map_err(AppError::from)?,
    );

    let log_repo: Arc<dyn PurgeLogRepo> = repositories.clone();

    Ok(Arc::new(InvalidationPipeline::new(
        backend,
        log_repo,
        versions,
        settings.purge.limits,
    )))
}

fn spawn_job_monitor(
    repositories: Arc<PostgresRepositories>,
    context: InvalidationWorkerContext,
    prune_context: PruneLogContext,
    invalidation: &config::InvalidationSettings,
) -> tokio::task::JoinHandle<()> {
    let invalidate_storage = PostgresStorage::new_with_config(
        repositories.pool().clone(),
        ApalisSqlConfig::new(INVALIDATE_URLS_JOB),
    );

    let invalidate_worker = WorkerBuilder::new("invalidate-urls-worker")
        .concurrency(invalidation.worker_concurrency.get() as usize)
        .data(context)
        .backend(invalidate_storage)
        .build_fn(process_invalidate_urls_job);

    // Cron-based retention worker (runs daily at 02:00)
    let prune_worker = WorkerBuilder::new("prune-log-worker")
        .data(prune_context)
        .backend(CronStream::new(prune_log_schedule()))
        .build_fn(process_prune_log_job);

    let monitor = Monitor::new()
        .register(invalidate_worker)
        .register(prune_worker);

    tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    })
}

async fn serve_http(settings: &config::Settings, admin_state: AdminState) -> Result<(), AppError> {
    let router = build_admin_router(admin_state);

    let listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "folata::serve",
        addr = %settings.server.admin_addr,
        "Admin listener ready"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn log_entry_row(entry: &PurgeLogEntry) -> Vec<String> {
    let date = entry
        .created_at
        .format(&Rfc3339)
        .unwrap_or_else(|_| entry.created_at.unix_timestamp().to_string());
    vec![date, entry.url.clone(), entry.status.as_str().to_string()]
}

fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|header| header.len()).collect();
    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            if index < widths.len() {
                widths[index] = widths[index].max(cell.len());
            }
        }
    }

    let render = |cells: &[String]| {
        cells
            .iter()
            .enumerate()
            .map(|(index, cell)| format!("{cell:<width$}", width = widths[index]))
            .collect::<Vec<_>>()
            .join("  ")
    };

    let header_cells: Vec<String> = headers.iter().map(|header| header.to_string()).collect();
    println!("{}", render(&header_cells).trim_end());
    let separator: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    println!("{}", render(&separator).trim_end());
    for row in rows {
        println!("{}", render(row).trim_end());
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to render output: {err}")))?;
    println!("{out}");
    Ok(())
}
