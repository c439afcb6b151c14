//! Unit tests for dbward-rdbc dialect module

use dbward_rdbc::dialect::{PostgresDialect, SqlDialect};
use dbward_rdbc::owner_role_name;

#[test]
fn test_provisioning_sequence_statements() {
    let dialect = PostgresDialect;
    let db = "orders";
    let role = owner_role_name(db);

    assert_eq!(
        dialect.create_database_sql(db).unwrap(),
        "CREATE DATABASE \"orders\""
    );
    assert_eq!(
        dialect.create_role_sql(&role).unwrap(),
        "CREATE ROLE \"orders_owners\""
    );
    assert_eq!(
        dialect.grant_database_sql(db, &role).unwrap(),
        "GRANT ALL ON DATABASE \"orders\" TO \"orders_owners\""
    );
}

#[test]
fn test_grant_membership_lists_every_grantee() {
    let dialect = PostgresDialect;

    assert_eq!(
        dialect
            .grant_membership_sql("x_owners", &["alice", "bob"])
            .unwrap(),
        "GRANT \"x_owners\" TO \"alice\", \"bob\""
    );
    assert_eq!(
        dialect.grant_membership_sql("x_owners", &["alice"]).unwrap(),
        "GRANT \"x_owners\" TO \"alice\""
    );
}

#[test]
fn test_grant_membership_requires_grantee() {
    let dialect = PostgresDialect;
    assert!(dialect.grant_membership_sql("x_owners", &[]).is_err());
}

#[test]
fn test_revoke_and_drop_statements() {
    let dialect = PostgresDialect;

    assert_eq!(
        dialect.revoke_membership_sql("x_owners", "carol").unwrap(),
        "REVOKE \"x_owners\" FROM \"carol\""
    );
    assert_eq!(dialect.drop_user_sql("x").unwrap(), "DROP USER \"x\"");
    assert_eq!(
        dialect.drop_role_sql("x_owners").unwrap(),
        "DROP ROLE \"x_owners\""
    );
    assert_eq!(dialect.drop_database_sql("x").unwrap(), "DROP DATABASE \"x\"");
}

#[test]
fn test_identifiers_are_quoted_not_trusted() {
    let dialect = PostgresDialect;

    // A hostile name stays a single identifier
    let sql = dialect
        .create_database_sql("x\"; DROP DATABASE postgres; --")
        .unwrap();
    assert_eq!(sql, "CREATE DATABASE \"x\"\"; DROP DATABASE postgres; --\"");
}

#[test]
fn test_overlong_identifier_rejected() {
    let dialect = PostgresDialect;
    let name = "a".repeat(64);

    assert!(dialect.create_database_sql(&name).is_err());
    assert!(dialect.create_database_sql(&"a".repeat(63)).is_ok());
}

#[test]
fn test_role_members_query_is_parameterized() {
    let sql = PostgresDialect.role_members_sql();

    assert!(sql.contains("pg_auth_members"));
    assert!(sql.contains("$1"));
    assert!(!sql.contains('\''));
}
