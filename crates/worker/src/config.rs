use std::path::PathBuf;

use robodispatch_broker::amqp::{AmqpSettings, DEFAULT_PORT, DEFAULT_VHOST};
use robodispatch_launcher::command::default_robots_root;
use robodispatch_launcher::notify::DEFAULT_NOTIFY_URL;

/// Startup configuration problems. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{var} has an invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("QUEUES must name at least one queue")]
    NoQueues,
}

/// Dispatcher configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Identity injected into every job and used in alerts.
    pub worker: String,
    pub broker: AmqpSettings,
    pub queues: Vec<String>,
    /// Directory receiving the daily log file.
    pub log_path: PathBuf,
    pub robots_root: PathBuf,
    pub notify_url: String,
}

impl DispatcherConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var            | Required | Default                |
    /// |--------------------|----------|------------------------|
    /// | `WORKER`           | yes      | --                     |
    /// | `RABBITMQ_HOST`    | yes      | --                     |
    /// | `RABBITMQ_USER`    | yes      | --                     |
    /// | `RABBITMQ_PASS`    | yes      | --                     |
    /// | `QUEUES`           | yes      | --                     |
    /// | `LOG_PATH`         | yes      | --                     |
    /// | `RABBITMQ_PORT`    | no       | `5672`                 |
    /// | `RABBITMQ_VHOST`   | no       | `/`                    |
    /// | `ROBOTS_ROOT`      | no       | `C:\RPA` / `/opt/rpa`  |
    /// | `ROBOT_NOTIFY_URL` | no       | `ws://localhost:6010`  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(var))
        };

        let worker = required("WORKER")?.trim().to_string();
        let host = required("RABBITMQ_HOST")?.trim().to_string();
        let username = required("RABBITMQ_USER")?;
        let password = required("RABBITMQ_PASS")?;

        let queues = parse_queues(&required("QUEUES")?);
        if queues.is_empty() {
            return Err(ConfigError::NoQueues);
        }

        let log_path = PathBuf::from(required("LOG_PATH")?);

        let port = match lookup("RABBITMQ_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                var: "RABBITMQ_PORT",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let vhost = lookup("RABBITMQ_VHOST").unwrap_or_else(|| DEFAULT_VHOST.to_string());

        let robots_root = lookup("ROBOTS_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(default_robots_root);

        let notify_url = lookup("ROBOT_NOTIFY_URL").unwrap_or_else(|| DEFAULT_NOTIFY_URL.to_string());

        Ok(Self {
            worker,
            broker: AmqpSettings {
                host,
                port,
                vhost,
                username,
                password,
            },
            queues,
            log_path,
            robots_root,
            notify_url,
        })
    }
}

/// Split a comma-separated queue list, dropping whitespace, single quotes
/// and empty entries.
pub fn parse_queues(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|q| q.trim().replace('\'', "").trim().to_string())
        .filter(|q| !q.is_empty())
        .collect()
}
