//! `robodispatch-worker` -- consumes robot jobs from RabbitMQ and launches
//! one robot process per job.
//!
//! Configuration comes from the environment (a `.env` file in the working
//! directory is loaded first); see [`DispatcherConfig::from_env`]. Failure
//! alerts go by email when `SMTP_HOST` and `EMAIL_TO` are set and to the log
//! otherwise.
//!
//! Exit codes: `0` after a shutdown signal or when every queue consumer has
//! stopped, `1` on a configuration error or a fatal broker error.

use std::sync::Arc;

use anyhow::Context;

use robodispatch_broker::amqp::AmqpConnector;
use robodispatch_broker::{ConnectionSupervisor, QueueConsumer, SupervisorConfig};
use robodispatch_events::alert::{MSG_CONFIGURATION, MSG_QUEUE_CONSUMPTION};
use robodispatch_events::{AlertSink, EmailConfig, EmailDelivery, FailureAlert, LogAlertSink};
use robodispatch_launcher::{JobLauncher, LauncherConfig, ShellSpawner, SpawnLock, WebSocketNotifier};
use robodispatch_worker::{logging, DispatcherConfig};

/// Identity used in alerts when `WORKER` itself could not be read.
const FALLBACK_WORKER: &str = "robodispatch";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let alerts = alert_sink();

    let config = match DispatcherConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            logging::init_console();
            tracing::error!(error = %e, "Invalid configuration");
            let worker = std::env::var("WORKER").unwrap_or_else(|_| FALLBACK_WORKER.to_string());
            alert(alerts.as_ref(), &worker, MSG_CONFIGURATION).await;
            std::process::exit(1);
        }
    };

    match logging::init(&config.log_path) {
        Ok(path) => tracing::info!(log_file = %path.display(), "Logging initialised"),
        Err(e) => {
            logging::init_console();
            tracing::error!(error = %e, log_path = %config.log_path.display(), "Cannot open log file");
            alert(alerts.as_ref(), &config.worker, MSG_CONFIGURATION).await;
            std::process::exit(1);
        }
    }

    tracing::info!(
        worker = %config.worker,
        host = %config.broker.host,
        queues = ?config.queues,
        robots_root = %config.robots_root.display(),
        "Starting robodispatch-worker",
    );

    let worker = config.worker.clone();
    tokio::select! {
        result = run(config, Arc::clone(&alerts)) => {
            if let Err(e) = result {
                tracing::error!(error = ?e, "Queue consumption failed");
                alert(alerts.as_ref(), &worker, MSG_QUEUE_CONSUMPTION).await;
                std::process::exit(1);
            }
        }
        () = shutdown_signal() => {}
    }

    tracing::info!("Dispatcher stopped");
}

/// Wire the launcher, consumer and supervisor together and run until the
/// supervisor stops.
async fn run(config: DispatcherConfig, alerts: Arc<dyn AlertSink>) -> anyhow::Result<()> {
    let launcher = JobLauncher::new(
        LauncherConfig {
            robots_root: config.robots_root,
            ..LauncherConfig::default()
        },
        SpawnLock::new(),
        Arc::new(ShellSpawner),
        Arc::new(WebSocketNotifier::new(config.notify_url)),
    );

    let consumer = QueueConsumer::new(config.worker.as_str(), Arc::new(launcher));
    let connector = AmqpConnector::new(config.broker, config.worker.as_str());

    let supervisor = ConnectionSupervisor::new(
        connector,
        Arc::new(consumer),
        alerts,
        SupervisorConfig {
            worker: config.worker,
            queues: config.queues,
        },
    );

    supervisor
        .run()
        .await
        .context("broker refused the queue setup")
}

fn alert_sink() -> Arc<dyn AlertSink> {
    match EmailConfig::from_env() {
        Some(email) => Arc::new(EmailDelivery::new(email)),
        None => Arc::new(LogAlertSink),
    }
}

async fn alert(sink: &dyn AlertSink, worker: &str, message: &str) {
    if let Err(e) = sink.send(&FailureAlert::new(worker, message)).await {
        tracing::error!(error = %e, "Failed to send failure alert");
    }
}

/// Wait for SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
