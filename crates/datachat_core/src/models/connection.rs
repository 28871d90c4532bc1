//! Data connection records and the payloads used to manage them.

use serde::{Deserialize, Serialize};

/// Kind of database behind a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// MySQL / MariaDB
    Mysql,
    /// PostgreSQL
    Postgresql,
    /// SQLite file
    Sqlite,
    /// ClickHouse
    Clickhouse,
    /// Snowflake
    Snowflake,
}

impl DatabaseType {
    /// All supported types, in display order.
    pub const ALL: [DatabaseType; 5] =
        [Self::Mysql, Self::Postgresql, Self::Sqlite, Self::Clickhouse, Self::Snowflake];

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgresql => "postgresql",
            Self::Sqlite => "sqlite",
            Self::Clickhouse => "clickhouse",
            Self::Snowflake => "snowflake",
        }
    }

    /// Parse from user input; accepts a few common aliases.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::Mysql),
            "postgresql" | "postgres" | "pg" => Some(Self::Postgresql),
            "sqlite" => Some(Self::Sqlite),
            "clickhouse" => Some(Self::Clickhouse),
            "snowflake" => Some(Self::Snowflake),
            _ => None,
        }
    }

    /// Conventional port for this database (0 when not network-addressed).
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Mysql => 3306,
            Self::Postgresql => 5432,
            Self::Sqlite => 0,
            Self::Clickhouse => 8123,
            Self::Snowflake => 443,
        }
    }

    /// Whether the connection points at a server (host/port required).
    pub fn is_networked(&self) -> bool {
        !matches!(self, Self::Sqlite)
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored data connection as returned by the backend.
///
/// The credential is write-only and never comes back from the backend, so it
/// has no field here; see [`ConnectionDraft`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Backend-assigned identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Database kind
    #[serde(rename = "type")]
    pub db_type: DatabaseType,
    /// Server hostname or IP (file path for sqlite)
    #[serde(default)]
    pub host: String,
    /// Server port
    #[serde(default)]
    pub port: u16,
    /// Login username
    #[serde(default)]
    pub username: String,
    /// Database name
    #[serde(default)]
    pub database_name: String,
    /// Whether the connection may be queried
    #[serde(default)]
    pub enabled: bool,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Connection {
    /// Display URL without any credential.
    pub fn display_url(&self) -> String {
        if self.db_type.is_networked() {
            format!(
                "{}://{}@{}:{}/{}",
                self.db_type, self.username, self.host, self.port, self.database_name
            )
        } else {
            format!("{}://{}", self.db_type, self.host)
        }
    }
}

/// Payload for creating or editing a connection.
///
/// Carries the credential on its way to the backend. `Debug` redacts it so it
/// cannot leak into logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDraft {
    /// Display name (1-255 chars)
    pub name: String,
    /// Database kind
    #[serde(rename = "type")]
    pub db_type: DatabaseType,
    /// Server hostname or IP
    pub host: String,
    /// Server port
    pub port: u16,
    /// Login username
    pub username: String,
    /// Write-only secret; `None` on edit keeps the stored one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    /// Database name
    pub database_name: String,
    /// Whether the connection may be queried
    pub enabled: bool,
    /// Free-form description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConnectionDraft {
    /// Create a draft with the type's default port, enabled.
    pub fn new(
        name: impl Into<String>,
        db_type: DatabaseType,
        host: impl Into<String>,
        database_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            db_type,
            host: host.into(),
            port: db_type.default_port(),
            username: String::new(),
            credential: None,
            database_name: database_name.into(),
            enabled: true,
            description: None,
        }
    }

    /// Start an edit from an existing record (credential left untouched).
    pub fn from_connection(connection: &Connection) -> Self {
        Self {
            name: connection.name.clone(),
            db_type: connection.db_type,
            host: connection.host.clone(),
            port: connection.port,
            username: connection.username.clone(),
            credential: None,
            database_name: connection.database_name.clone(),
            enabled: connection.enabled,
            description: connection.description.clone(),
        }
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Set the credential.
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Validate the draft.
    pub fn validate(&self) -> Result<(), String> {
        let name = self.name.trim();
        if name.is_empty() || name.chars().count() > 255 {
            return Err("Name must be 1-255 characters".to_string());
        }
        if self.database_name.trim().is_empty() {
            return Err("Database name is required".to_string());
        }
        if self.db_type.is_networked() {
            if self.host.trim().is_empty() {
                return Err("Host is required".to_string());
            }
            if self.port == 0 {
                return Err("Port must be between 1 and 65535".to_string());
            }
        } else if self.host.trim().is_empty() {
            return Err("Database file path is required".to_string());
        }
        Ok(())
    }
}

impl std::fmt::Debug for ConnectionDraft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionDraft")
            .field("name", &self.name)
            .field("db_type", &self.db_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("database_name", &self.database_name)
            .field("enabled", &self.enabled)
            .field("description", &self.description)
            .finish()
    }
}

/// Filters accepted by the connection list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionFilter {
    /// Substring match on the name
    pub name: Option<String>,
    /// Restrict to one database type
    pub db_type: Option<DatabaseType>,
    /// Restrict by enabled flag
    pub enabled: Option<bool>,
    /// 1-based page number
    pub page: Option<u32>,
    /// Items per page
    pub page_size: Option<u32>,
}

impl ConnectionFilter {
    /// Set the page and page size.
    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    /// Set the name filter.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Query-string pairs for this filter; unset fields are omitted.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            pairs.push(("name", name.trim().to_string()));
        }
        if let Some(db_type) = self.db_type {
            pairs.push(("type", db_type.as_str().to_string()));
        }
        if let Some(enabled) = self.enabled {
            pairs.push(("enabled", enabled.to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(page_size) = self.page_size {
            pairs.push(("pageSize", page_size.to_string()));
        }
        pairs
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Records on this page
    #[serde(alias = "list", alias = "data")]
    pub items: Vec<T>,
    /// Total number of records across all pages
    #[serde(default)]
    pub total: u64,
    /// 1-based page number
    #[serde(default)]
    pub page: u32,
    /// Page size the backend applied
    #[serde(default)]
    pub page_size: u32,
}
