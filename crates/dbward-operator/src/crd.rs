//! Custom Resource Definition for the dbward operator
//!
//! A `Database` resource declares one database in an external engine
//! together with its owning role, the login user that receives the generated
//! credential, and the set of users that should hold membership in the role.

use dbward_rdbc::security::MAX_IDENTIFIER_BYTES;
use dbward_rdbc::{owner_role_name, EngineKind, OWNER_ROLE_SUFFIX};
use kube::{CustomResource, ResourceExt};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::LazyLock;
use validator::{Validate, ValidationError};

/// Maximum number of entries in `desiredUsers`
pub const MAX_DESIRED_USERS: usize = 256;

/// Longest resource name whose owning role still fits into an identifier
pub const MAX_DATABASE_NAME_BYTES: usize = MAX_IDENTIFIER_BYTES - OWNER_ROLE_SUFFIX.len();

/// Regex for database user names
static USER_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.@-]*$").unwrap());

fn check_user_name(value: &str) -> Result<(), ValidationError> {
    if value.len() > MAX_IDENTIFIER_BYTES {
        return Err(ValidationError::new("user_name_too_long").with_message(
            format!(
                "user '{}' exceeds {} bytes",
                value, MAX_IDENTIFIER_BYTES
            )
            .into(),
        ));
    }
    if !USER_NAME_REGEX.is_match(value) {
        return Err(ValidationError::new("invalid_user_name").with_message(
            format!("'{}' is not a valid database user name", value).into(),
        ));
    }
    Ok(())
}

/// Validate the optional owner user (empty falls back to the resource name)
fn validate_owner_user(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Ok(());
    }
    check_user_name(value)
}

/// Validate the desired user list
fn validate_desired_users(users: &[String]) -> Result<(), ValidationError> {
    if users.len() > MAX_DESIRED_USERS {
        return Err(ValidationError::new("too_many_users").with_message(
            format!("maximum {} desired users allowed", MAX_DESIRED_USERS).into(),
        ));
    }

    let mut seen = HashSet::with_capacity(users.len());
    for user in users {
        check_user_name(user)?;
        if !seen.insert(user.as_str()) {
            return Err(ValidationError::new("duplicate_user")
                .with_message(format!("user '{}' is listed more than once", user).into()));
        }
    }
    Ok(())
}

/// Database custom resource
///
/// # Example
///
/// ```yaml
/// apiVersion: db.dbward.io/v1alpha1
/// kind: Database
/// metadata:
///   name: orders
///   namespace: shop
/// spec:
///   engineType: postgres
///   ownerUser: orders_admin
///   accessClass: standard
///   deletionProtected: true
///   desiredUsers:
///     - alice
///     - bob
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema, Validate)]
#[kube(
    group = "db.dbward.io",
    version = "v1alpha1",
    kind = "Database",
    plural = "databases",
    shortname = "db",
    namespaced,
    status = "DatabaseStatus",
    printcolumn = r#"{"name":"Engine","type":"string","jsonPath":".spec.engineType"}"#,
    printcolumn = r#"{"name":"Protected","type":"boolean","jsonPath":".spec.deletionProtected"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Server","type":"string","jsonPath":".status.serverEndpoint"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSpec {
    /// Engine to provision in: `postgres`, `mysql` (not implemented yet) or
    /// anything else, which is reported as unsupported
    #[serde(default, alias = "type")]
    pub engine_type: String,

    /// Existing user that always holds membership in the owning role
    #[serde(default, alias = "user")]
    #[validate(custom(function = "validate_owner_user"))]
    pub owner_user: String,

    /// Free-form access class, carried through untouched
    #[serde(default, alias = "class")]
    pub access_class: String,

    /// Keep the database, role and user when the resource is deleted
    #[serde(default, alias = "protection")]
    pub deletion_protected: bool,

    /// Users that should be members of the owning role
    #[serde(default, alias = "users")]
    #[validate(custom(function = "validate_desired_users"))]
    pub desired_users: Vec<String>,
}

/// Provisioning phase of a `Database`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum DatabasePhase {
    /// Database, owning role and login user exist and membership has converged
    Created,
    /// The resource cannot be provisioned as declared
    Error,
    /// No adapter exists for the requested engine
    Unsupported,
}

impl fmt::Display for DatabasePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Error => write!(f, "Error"),
            Self::Unsupported => write!(f, "Unsupported"),
        }
    }
}

/// Observed state of a `Database`
///
/// Absent fields serialize as `null` so a merge patch clears stale values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStatus {
    /// Current phase; absent until the first pass completes
    #[serde(default)]
    pub phase: Option<DatabasePhase>,

    /// Reason the resource is in the `Error` or `Unsupported` phase
    #[serde(default)]
    pub last_error: Option<String>,

    /// `host:port` clients should connect to
    #[serde(default)]
    pub server_endpoint: Option<String>,

    /// Generation of the spec this status describes
    #[serde(default)]
    pub observed_generation: Option<i64>,

    /// Engine the database was provisioned in; kept across spec edits so
    /// deletion cleans up where the objects actually live
    #[serde(default)]
    pub provisioned_engine: Option<String>,
}

impl DatabaseStatus {
    /// Whether provisioning has completed at least once
    pub fn is_created(&self) -> bool {
        self.phase == Some(DatabasePhase::Created)
    }
}

impl Database {
    /// Engine requested by the spec
    pub fn engine(&self) -> EngineKind {
        EngineKind::parse(&self.spec.engine_type)
    }

    /// Name of the database in the engine
    pub fn database_name(&self) -> String {
        self.name_any()
    }

    /// Name of the group role that owns the database
    pub fn owner_role(&self) -> String {
        owner_role_name(&self.name_any())
    }

    /// Dedicated login user that receives the generated credential
    ///
    /// Named after the resource, so no two resources share it.
    pub fn login_user(&self) -> String {
        self.name_any()
    }

    /// Users that should be members of the owning role: the desired users,
    /// the login user and `ownerUser` when set
    pub fn desired_members(&self) -> BTreeSet<String> {
        let mut members: BTreeSet<String> = self.spec.desired_users.iter().cloned().collect();
        members.insert(self.login_user());
        if !self.spec.owner_user.is_empty() {
            members.insert(self.spec.owner_user.clone());
        }
        members
    }

    /// Engine recorded when provisioning completed, if it ever did
    pub fn provisioned_engine(&self) -> Option<EngineKind> {
        self.status
            .as_ref()
            .and_then(|s| s.provisioned_engine.as_deref())
            .map(EngineKind::parse)
    }

    /// Whether the last pass finished provisioning
    pub fn is_created(&self) -> bool {
        self.status.as_ref().is_some_and(DatabaseStatus::is_created)
    }

    /// Validate the spec and the resource name
    ///
    /// Returns a single human-readable message suitable for `lastError`.
    pub fn check(&self) -> Result<(), String> {
        let mut problems = Vec::new();

        let name = self.name_any();
        if name.len() > MAX_DATABASE_NAME_BYTES {
            problems.push(format!(
                "metadata.name: '{}' exceeds {} bytes",
                name, MAX_DATABASE_NAME_BYTES
            ));
        }

        if let Err(errors) = self.spec.validate() {
            problems.extend(errors.field_errors().iter().flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => format!("{}: {}", field, message),
                    None => format!("{}: {}", field, e.code),
                })
            }));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            problems.sort();
            Err(problems.join("; "))
        }
    }
}
