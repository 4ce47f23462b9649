use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use exam_prep_ai::config::Config;
use exam_prep_ai::handlers;
use exam_prep_ai::service::ExamPrepService;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Arc::new(Config::load());
    let bind: SocketAddr = config
        .server
        .bind
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server.bind '{}': {}", config.server.bind, e))?;

    let service = Arc::new(ExamPrepService::new(Arc::clone(&config))?);

    // Drop sessions nobody has touched within the idle TTL
    let sessions = Arc::clone(service.sessions());
    let ttl = config.session_idle_ttl();
    let every = Duration::from_secs(config.session.purge_interval_seconds.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            sessions.purge_idle(ttl).await;
        }
    });

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(
        %bind,
        chat_mode = %config.chat.mode,
        qa_model = %config.default_qa_model(),
        gen_model = %config.default_gen_model(),
        "Starting {}",
        config.server.name
    );

    axum::serve(listener, handlers::router(service)).await?;
    Ok(())
}
