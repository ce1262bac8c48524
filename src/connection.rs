//! MySQL connection settings and pool construction.

use std::{str::FromStr, time::Duration};

use log::LevelFilter;
use sqlx::{
    ConnectOptions,
    mysql::{MySqlConnectOptions, MySqlPoolOptions},
};

use crate::error::{ImportError, ImportResult};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3306;
pub const POOL_MAX_CONNECTIONS: u32 = 5;
pub const POOL_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// A full `mysql://` URL. When set, the discrete fields are ignored.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    /// Defaults to `db_<user>` when unset.
    pub database: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            user: "root".to_string(),
            password: None,
            database: None,
        }
    }
}

impl ConnectionConfig {
    pub fn database_name(&self) -> String {
        match self.database.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("db_{}", self.user),
        }
    }

    /// Host, port and database, without credentials, for log lines.
    pub fn describe(&self) -> String {
        match &self.url {
            Some(_) => "database URL".to_string(),
            None => format!(
                "{}@{}:{}/{}",
                self.user,
                self.host,
                self.port,
                self.database_name()
            ),
        }
    }

    pub fn connect_options(&self) -> ImportResult<MySqlConnectOptions> {
        let options = match &self.url {
            Some(url) => MySqlConnectOptions::from_str(url)
                .map_err(|e| ImportError::store("Parsing database URL", e))?,
            None => {
                let mut options = MySqlConnectOptions::new()
                    .host(&self.host)
                    .port(self.port)
                    .username(&self.user)
                    .database(&self.database_name());
                if let Some(password) = &self.password {
                    options = options.password(password);
                }
                options
            }
        };
        Ok(options
            .charset("utf8mb4")
            .log_statements(LevelFilter::Debug))
    }

    pub fn pool_options() -> MySqlPoolOptions {
        MySqlPoolOptions::new()
            .max_connections(POOL_MAX_CONNECTIONS)
            .acquire_timeout(POOL_ACQUIRE_TIMEOUT)
    }
}
