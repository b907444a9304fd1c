use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use inbox_agent::api::api_routes;
use inbox_agent::config::AgentConfig;
use inbox_agent::error::ConfigError;
use inbox_agent::inbox::{InboxContext, spawn_mailbox_poller};
use inbox_agent::llm::{LlmConfig, create_provider};
use inbox_agent::mailbox::{EmailConfig, ImapMailbox};
use inbox_agent::pipeline::LlmDrafter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = AgentConfig::from_env().context("invalid service configuration")?;

    // Guard must outlive the runtime so buffered file logs are flushed.
    let _log_guard = init_tracing(&config);

    let email_config = EmailConfig::from_env()
        .context("invalid mailbox configuration")?
        .ok_or_else(|| ConfigError::MissingRequired {
            key: "EMAIL_IMAP_HOST".to_string(),
            hint: "export EMAIL_IMAP_HOST=imap.example.com".to_string(),
        })
        .context("mailbox is not configured")?;
    let llm_config = LlmConfig::from_env().context("LLM is not configured")?;

    eprintln!("📬 Inbox Agent v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", llm_config.model);
    eprintln!("   Mailbox: {} as {}", email_config.imap_host, email_config.from_address);
    eprintln!("   HTTP: http://0.0.0.0:{}", config.http_port);
    eprintln!(
        "   Poll: every {}s, auto-reply {}",
        config.poll_interval.as_secs(),
        if config.auto_reply_on_poll { "on" } else { "off" }
    );

    let llm = create_provider(&llm_config).context("failed to create LLM provider")?;
    let drafter = Arc::new(LlmDrafter::new(llm));

    let sender_email = email_config.from_address.clone();
    let mailbox = Arc::new(ImapMailbox::new(email_config));
    let ctx = Arc::new(InboxContext::new(
        mailbox,
        drafter,
        sender_email,
        config.mailbox_limit,
    ));

    let poller = spawn_mailbox_poller(
        Arc::clone(&ctx),
        config.poll_interval,
        config.auto_reply_on_poll,
    );

    let app = api_routes(Arc::clone(&ctx));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port))
        .await
        .with_context(|| format!("failed to bind HTTP port {}", config.http_port))?;
    tracing::info!(port = config.http_port, "HTTP server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("Shutting down");
    poller.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
}

/// Stderr logging filtered by `RUST_LOG` (default `info`), plus a daily
/// rolling file under `log_dir` when configured.
fn init_tracing(config: &AgentConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "inbox-agent.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    guard
}
