//! Service configuration.
//!
//! Built once at start-up from environment variables and shared read-only
//! afterwards. Every required value is validated eagerly so a misconfigured
//! process refuses to start instead of failing record by record.
//!
//! | Variable | Default |
//! |---|---|
//! | `REMINDER_OFFSET_MINUTES` | `60` |
//! | `TARGET_DISPATCHER_ARN` | required |
//! | `SCHEDULER_ROLE_ARN` | required |
//! | `USER_POOL_ID` | required |
//! | `TABLE_NAME` | required |
//! | `SNS_TOPIC_ARN` | required |
//! | `SCHEDULER_API_URL` | required |
//! | `TASK_STORE_URL` | required |
//! | `DIRECTORY_API_URL` | required |
//! | `DELIVERY_API_URL` | required |
//! | `SERVICE_API_KEY` | unset |
//! | `SCHEDULE_GROUP` | `default` |
//! | `HOST` / `PORT` | `127.0.0.1` / `3000` |

use chrono::Duration;
use thiserror::Error;

pub const DEFAULT_REMINDER_OFFSET_MINUTES: i64 = 60;
pub const DEFAULT_SCHEDULE_GROUP: &str = "default";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Where schedules point and which identity the scheduler fires them as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderTarget {
    /// Invocation address of the reminder dispatcher.
    pub dispatcher_arn: String,
    /// Execution identity allowed to invoke the dispatcher.
    pub role_arn: String,
    /// Scheduler group the reminder schedules live in.
    pub group_name: String,
}

/// Base URLs and credential for the external services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUrls {
    pub scheduler: String,
    pub task_store: String,
    pub directory: String,
    pub delivery: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// How long before the deadline a reminder fires.
    pub reminder_offset: Duration,
    pub target: ReminderTarget,
    /// Directory pool holding assignees.
    pub user_pool_id: String,
    /// Task store table.
    pub table_name: String,
    /// Delivery channel topic.
    pub topic_arn: String,
    pub services: ServiceUrls,
    pub host: String,
    pub port: u16,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset.
        let optional = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &'static str| optional(name).ok_or(ConfigError::Missing(name));

        let reminder_offset = match optional("REMINDER_OFFSET_MINUTES") {
            Some(raw) => parse_offset_minutes(&raw)?,
            None => Duration::minutes(DEFAULT_REMINDER_OFFSET_MINUTES),
        };

        let port = match optional("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: "PORT",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            reminder_offset,
            target: ReminderTarget {
                dispatcher_arn: required("TARGET_DISPATCHER_ARN")?,
                role_arn: required("SCHEDULER_ROLE_ARN")?,
                group_name: optional("SCHEDULE_GROUP")
                    .unwrap_or_else(|| DEFAULT_SCHEDULE_GROUP.to_string()),
            },
            user_pool_id: required("USER_POOL_ID")?,
            table_name: required("TABLE_NAME")?,
            topic_arn: required("SNS_TOPIC_ARN")?,
            services: ServiceUrls {
                scheduler: required_url("SCHEDULER_API_URL", required("SCHEDULER_API_URL")?)?,
                task_store: required_url("TASK_STORE_URL", required("TASK_STORE_URL")?)?,
                directory: required_url("DIRECTORY_API_URL", required("DIRECTORY_API_URL")?)?,
                delivery: required_url("DELIVERY_API_URL", required("DELIVERY_API_URL")?)?,
                api_key: optional("SERVICE_API_KEY"),
            },
            host: optional("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
        })
    }

    /// Listen address for the HTTP server.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_offset_minutes(raw: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        name: "REMINDER_OFFSET_MINUTES",
        value: raw.to_string(),
        reason: reason.to_string(),
    };

    let minutes: i64 = raw.parse().map_err(|_| invalid("not an integer"))?;
    if minutes <= 0 {
        return Err(invalid("must be positive"));
    }
    // One year is far beyond any sensible reminder lead time.
    if minutes > 366 * 24 * 60 {
        return Err(invalid("too large"));
    }
    Ok(Duration::minutes(minutes))
}

fn required_url(name: &'static str, value: String) -> Result<String, ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            name,
            value,
            reason: "expected an http(s) URL".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, String> {
        [
            ("TARGET_DISPATCHER_ARN", "arn:dispatcher"),
            ("SCHEDULER_ROLE_ARN", "arn:role"),
            ("USER_POOL_ID", "pool-1"),
            ("TABLE_NAME", "tasks"),
            ("SNS_TOPIC_ARN", "arn:topic"),
            ("SCHEDULER_API_URL", "http://scheduler.local"),
            ("TASK_STORE_URL", "http://store.local"),
            ("DIRECTORY_API_URL", "http://directory.local"),
            ("DELIVERY_API_URL", "http://delivery.local"),
        ]
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect()
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<Config, ConfigError> {
        Config::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.reminder_offset, Duration::minutes(60));
        assert_eq!(config.target.group_name, "default");
        assert_eq!(config.services.api_key, None);
        assert_eq!(config.bind_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn test_missing_required_is_fatal() {
        for name in ["TARGET_DISPATCHER_ARN", "SCHEDULER_ROLE_ARN", "TABLE_NAME", "SNS_TOPIC_ARN"] {
            let mut env = base_env();
            env.remove(name);
            assert_eq!(load(&env), Err(ConfigError::Missing(name)));
        }

        let mut blank = base_env();
        blank.insert("USER_POOL_ID", "   ".to_string());
        assert_eq!(load(&blank), Err(ConfigError::Missing("USER_POOL_ID")));
    }

    #[test]
    fn test_offset_override_and_validation() {
        let mut env = base_env();
        env.insert("REMINDER_OFFSET_MINUTES", "30".to_string());
        assert_eq!(load(&env).unwrap().reminder_offset, Duration::minutes(30));

        for bad in ["0", "-5", "soon"] {
            env.insert("REMINDER_OFFSET_MINUTES", bad.to_string());
            assert!(matches!(
                load(&env),
                Err(ConfigError::Invalid {
                    name: "REMINDER_OFFSET_MINUTES",
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_rejects_non_http_service_url() {
        let mut env = base_env();
        env.insert("TASK_STORE_URL", "store.local".to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid {
                name: "TASK_STORE_URL",
                ..
            })
        ));
    }
}
