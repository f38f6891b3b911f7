use anyhow::{Context, Result};
use blog_autopilot::config::Config;
use blog_autopilot::gemini::rest::GeminiRest;
use blog_autopilot::gemini::{self, GenerationBackend};
use blog_autopilot::git::{self, GitCli, VersionControl};
use blog_autopilot::pipeline::Pipeline;
use blog_autopilot::scheduler::{Clock, CycleRunner, Scheduler, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("blog_autopilot=info")),
        )
        .init();

    let list_models = std::env::args().any(|arg| arg == "--list-models");
    let once = std::env::args().any(|arg| arg == "--once");

    // Saved keys from .env (real env vars take precedence)
    Config::load_env_file();
    let config = Config::load_or_default()?;
    let trigger_at = config.schedule.trigger_time()?;
    let api_key = Config::google_api_key()?;

    let backend: Arc<dyn GenerationBackend> = Arc::new(GeminiRest::new(
        api_key,
        &config.gemini.api_base,
        Duration::from_secs(config.gemini.request_timeout_s),
    )?);

    if list_models {
        return print_models(backend.as_ref()).await;
    }

    let root = config.site.root_dir()?;
    tracing::info!(root = %root.display(), "content repository");

    let repo: Option<Arc<dyn VersionControl>> = if config.publish.enabled {
        if !git::is_git_repo(&root).await {
            tracing::warn!(root = %root.display(), "site root is not a git work tree, pushes will fail");
        }
        Some(Arc::new(GitCli::new(
            &root,
            &config.publish.remote,
            config.publish.branch.as_deref(),
        )))
    } else {
        None
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let pipeline = Pipeline::from_config(&config, &root, backend, repo, clock.clone());

    if once {
        pipeline.run_cycle().await;
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("shutdown requested, finishing current cycle");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for Ctrl-C, running without graceful shutdown");
                // Keep the sender alive so the scheduler keeps polling.
                std::future::pending::<()>().await;
                drop(shutdown_tx);
            }
        }
    });

    tracing::info!(daily_at = %config.schedule.daily_at, "autopilot started");
    let mut scheduler = Scheduler::new(
        pipeline,
        clock,
        trigger_at,
        Duration::from_secs(config.schedule.poll_interval_s),
        config.schedule.run_on_startup,
    );
    scheduler.run(shutdown_rx).await;
    Ok(())
}

async fn print_models(backend: &dyn GenerationBackend) -> Result<()> {
    let models = gemini::text_models(backend)
        .await
        .context("failed to list models")?;
    for m in &models {
        match &m.display_name {
            Some(name) => println!("{}  ({})", m.name, name),
            None => println!("{}", m.name),
        }
    }
    Ok(())
}
