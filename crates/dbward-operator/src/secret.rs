//! Credential secret projection
//!
//! Turns a freshly minted credential into the key-value record applications
//! read to connect: `{name}-db-secret` with host, port, database name, user
//! and password.

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::ResourceExt;
use secrecy::{ExposeSecret, SecretString};
use std::collections::BTreeMap;

use crate::crd::Database;
use crate::store::namespace_of;

/// Suffix of the credential secret name
pub const SECRET_SUFFIX: &str = "-db-secret";

/// Field manager / managed-by value for everything the operator writes
pub const MANAGER_NAME: &str = "dbward-operator";

/// Label linking a secret back to its `Database`
pub const DATABASE_LABEL: &str = "db.dbward.io/database";

/// Secret key for the host
pub const KEY_HOST: &str = "database-host";
/// Secret key for the port
pub const KEY_PORT: &str = "database-port";
/// Secret key for the database name
pub const KEY_NAME: &str = "database-name";
/// Secret key for the login user
pub const KEY_USER: &str = "database-user";
/// Secret key for the password
pub const KEY_PASSWORD: &str = "database-password";

/// Name of the credential secret for a `Database` called `database`
pub fn secret_name(database: &str) -> String {
    format!("{}{}", database, SECRET_SUFFIX)
}

/// A generated login
#[derive(Debug)]
pub struct Credential {
    /// Login user name
    pub username: String,
    /// Generated password
    pub password: SecretString,
}

/// Key-value record holding a credential and where to use it
#[derive(Debug)]
pub struct SecretRecord {
    /// Secret name
    pub name: String,
    /// Namespace of the owning `Database`
    pub namespace: String,
    /// Name of the owning `Database`
    pub database: String,
    /// Engine host
    pub host: String,
    /// Engine port
    pub port: u16,
    /// Login credential
    pub credential: Credential,
}

impl SecretRecord {
    /// Project a credential minted for `db`
    pub fn project(db: &Database, host: &str, port: u16, credential: Credential) -> Self {
        let database = db.name_any();
        Self {
            name: secret_name(&database),
            namespace: namespace_of(db),
            database,
            host: host.to_string(),
            port,
            credential,
        }
    }

    /// Plain-text fields of the record
    ///
    /// The password is exposed here and nowhere else.
    pub fn fields(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (KEY_HOST.to_string(), self.host.clone()),
            (KEY_PORT.to_string(), self.port.to_string()),
            (KEY_NAME.to_string(), self.database.clone()),
            (KEY_USER.to_string(), self.credential.username.clone()),
            (
                KEY_PASSWORD.to_string(),
                self.credential.password.expose_secret().to_string(),
            ),
        ])
    }

    /// Render as a Kubernetes `Secret`
    ///
    /// No owner reference is set: a protected `Database` keeps its
    /// credential after the resource is gone.
    pub fn to_secret(&self) -> Secret {
        let labels = BTreeMap::from([
            (
                "app.kubernetes.io/managed-by".to_string(),
                MANAGER_NAME.to_string(),
            ),
            (DATABASE_LABEL.to_string(), self.database.clone()),
        ]);

        let data = self
            .fields()
            .into_iter()
            .map(|(k, v)| (k, ByteString(v.into_bytes())))
            .collect();

        Secret {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(labels),
                ..Default::default()
            },
            type_: Some("Opaque".to_string()),
            data: Some(data),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::DatabaseSpec;

    fn test_record() -> SecretRecord {
        let mut db = Database::new(
            "orders",
            DatabaseSpec {
                engine_type: "postgres".to_string(),
                owner_user: String::new(),
                access_class: String::new(),
                deletion_protected: false,
                desired_users: vec![],
            },
        );
        db.metadata.namespace = Some("shop".to_string());

        SecretRecord::project(
            &db,
            "pg.internal",
            5432,
            Credential {
                username: "orders".to_string(),
                password: SecretString::from("s3cr3t".to_string()),
            },
        )
    }

    #[test]
    fn test_projection_fields() {
        let record = test_record();
        let fields = record.fields();

        assert_eq!(record.name, "orders-db-secret");
        assert_eq!(record.namespace, "shop");
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[KEY_HOST], "pg.internal");
        assert_eq!(fields[KEY_PORT], "5432");
        assert_eq!(fields[KEY_NAME], "orders");
        assert_eq!(fields[KEY_USER], "orders");
        assert_eq!(fields[KEY_PASSWORD], "s3cr3t");
    }

    #[test]
    fn test_to_secret() {
        let secret = test_record().to_secret();

        assert_eq!(secret.metadata.name.as_deref(), Some("orders-db-secret"));
        assert!(secret.metadata.owner_references.is_none());
        let labels = secret.metadata.labels.unwrap();
        assert_eq!(labels["app.kubernetes.io/managed-by"], MANAGER_NAME);
        assert_eq!(labels[DATABASE_LABEL], "orders");

        let data = secret.data.unwrap();
        assert_eq!(data[KEY_PASSWORD].0, b"s3cr3t".to_vec());
    }

    #[test]
    fn test_debug_hides_password() {
        let rendered = format!("{:?}", test_record());
        assert!(!rendered.contains("s3cr3t"));
    }
}
