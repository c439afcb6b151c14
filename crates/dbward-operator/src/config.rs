//! Operator configuration
//!
//! Settings come from an optional YAML file (with `${VAR}` and
//! `${VAR:-default}` expansion) and are then overridden by command-line
//! flags and environment variables.
//!
//! ```yaml
//! connection:
//!   host: ${DB_HOST:-localhost}
//!   port: 5432
//!   user: postgres
//!   password: ${DB_PASSWORD}
//!   database: postgres
//!   poolSize: 4
//! namespaces:
//!   - team-a
//!   - team-b
//! ```

use dbward_rdbc::ConnectionSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::{OperatorError, Result};

/// Pre-compiled regex for environment variable expansion
/// Pattern: ${VAR} or ${VAR:-default}
static ENV_VAR_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("env var regex pattern is invalid - this is a bug")
});

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorConfig {
    /// Administrative connection to the database engine
    #[serde(default)]
    pub connection: ConnectionSettings,

    /// Namespaces to act on; empty means all
    #[serde(default)]
    pub namespaces: Vec<String>,
}

impl OperatorConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| OperatorError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        let config: Self = serde_yaml::from_str(&expanded)?;
        Ok(config)
    }

    /// Namespace filter built from the configured list
    pub fn namespace_filter(&self) -> NamespaceFilter {
        NamespaceFilter::new(self.namespaces.iter().cloned())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.connection
            .validate()
            .map_err(|e| OperatorError::InvalidConfig(e.to_string()))?;

        if self.namespaces.iter().any(|ns| ns.trim().is_empty()) {
            return Err(OperatorError::InvalidConfig(
                "namespaces must not contain empty entries".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand environment variables in the format ${VAR} or ${VAR:-default}
fn expand_env_vars(content: &str) -> String {
    ENV_VAR_REGEX
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map(|m| m.as_str());

            std::env::var(var_name).unwrap_or_else(|_| default.unwrap_or("").to_string())
        })
        .to_string()
}

/// Set of namespaces the operator acts on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceFilter {
    namespaces: BTreeSet<String>,
}

impl NamespaceFilter {
    /// Filter accepting every namespace
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter accepting only the given namespaces (all if none are given)
    pub fn new(namespaces: impl IntoIterator<Item = String>) -> Self {
        Self {
            namespaces: namespaces
                .into_iter()
                .map(|ns| ns.trim().to_string())
                .filter(|ns| !ns.is_empty())
                .collect(),
        }
    }

    /// Parse a comma separated list such as `team-a,team-b`
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(',').map(str::to_string))
    }

    /// Whether a resource in `namespace` should be acted on
    pub fn allows(&self, namespace: &str) -> bool {
        self.namespaces.is_empty() || self.namespaces.contains(namespace)
    }

    /// The only namespace, when exactly one is configured
    pub fn single(&self) -> Option<&str> {
        if self.namespaces.len() == 1 {
            self.namespaces.iter().next().map(String::as_str)
        } else {
            None
        }
    }
}

impl std::fmt::Display for NamespaceFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.namespaces.is_empty() {
            write!(f, "all")
        } else {
            let list: Vec<&str> = self.namespaces.iter().map(String::as_str).collect();
            write!(f, "{}", list.join(","))
        }
    }
}
