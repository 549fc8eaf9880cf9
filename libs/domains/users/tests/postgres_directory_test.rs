//! PostgresUserDirectory against a real database.
//!
//! Requires Docker: `cargo test -p domain_users -- --ignored`

use domain_users::{PostgresUserDirectory, UserDirectory, UserId};
use sea_orm::{ConnectionTrait, DbBackend, Statement};
use test_utils::{TestDataBuilder, TestDatabase};

const SCHEMA: &str = "
    CREATE TABLE users (
        id uuid PRIMARY KEY,
        first_name text NOT NULL,
        email text NOT NULL UNIQUE
    );
";

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_lookup_against_postgres() {
    let db = TestDatabase::with_schema(SCHEMA).await;
    let builder = TestDataBuilder::from_test_name("test_lookup_against_postgres");
    let id = builder.user_id();
    let email = builder.email("maria");

    db.connection
        .execute_raw(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "INSERT INTO users (id, first_name, email) VALUES ($1, $2, $3)",
            [id.into(), "Maria".into(), email.clone().into()],
        ))
        .await
        .unwrap();

    let directory = PostgresUserDirectory::new(db.connection());

    let user = directory
        .get_by_id(&UserId::parse(id.to_string()).unwrap())
        .await
        .unwrap()
        .expect("user should exist");
    assert_eq!(user.first_name, "Maria");
    assert_eq!(user.email, email);

    let missing = directory
        .get_by_id(&UserId::parse(uuid::Uuid::nil().to_string()).unwrap())
        .await
        .unwrap();
    assert!(missing.is_none());
}
