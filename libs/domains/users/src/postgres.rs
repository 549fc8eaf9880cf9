use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DbBackend, FromQueryResult, Statement};
use tracing::debug;
use uuid::Uuid;

use crate::directory::UserDirectory;
use crate::error::{DirectoryError, DirectoryResult};
use crate::models::{User, UserId};

/// PostgreSQL implementation of UserDirectory using SeaORM.
///
/// Expects a `users` table with `id uuid`, `first_name text` and `email text` columns.
#[derive(Clone)]
pub struct PostgresUserDirectory {
    db: DatabaseConnection,
}

impl PostgresUserDirectory {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromQueryResult)]
struct UserRow {
    id: Uuid,
    first_name: String,
    email: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id.into(),
            first_name: row.first_name,
            email: row.email,
        }
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn get_by_id(&self, id: &UserId) -> DirectoryResult<Option<User>> {
        // Store keys are UUIDs, anything else cannot match a row
        let Ok(uuid) = Uuid::parse_str(id.as_str()) else {
            debug!(user_id = %id, "User id is not a UUID, treating as not found");
            return Ok(None);
        };

        let sql = "SELECT id, first_name, email FROM users WHERE id = $1";
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, [uuid.into()]);

        let row = UserRow::find_by_statement(stmt)
            .one(&self.db)
            .await
            .map_err(|e| DirectoryError::Unavailable(format!("Database error: {}", e)))?;

        Ok(row.map(Into::into))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DbErr, MockDatabase, Value};
    use std::collections::BTreeMap;

    const MARIA_ID: &str = "7f9c24e8-3b12-4fef-91e0-1f1a8c3b0a11";

    fn maria_row() -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            ("id", Value::from(Uuid::parse_str(MARIA_ID).unwrap())),
            ("first_name", Value::from("Maria")),
            ("email", Value::from("maria@example.com")),
        ])
    }

    #[tokio::test]
    async fn test_get_by_id_maps_row() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![maria_row()]])
            .into_connection();
        let directory = PostgresUserDirectory::new(db);

        let user = directory
            .get_by_id(&UserId::parse(MARIA_ID).unwrap())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(user.id.as_str(), MARIA_ID);
        assert_eq!(user.first_name, "Maria");
        assert_eq!(user.email, "maria@example.com");
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([Vec::<BTreeMap<&'static str, Value>>::new()])
            .into_connection();
        let directory = PostgresUserDirectory::new(db);

        let user = directory.get_by_id(&UserId::parse(MARIA_ID).unwrap()).await.unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_non_uuid_id_is_not_found_without_query() {
        // No results queued: a query would fail
        let db = MockDatabase::new(DbBackend::Postgres).into_connection();
        let directory = PostgresUserDirectory::new(db);

        let user = directory.get_by_id(&UserId::parse("U1").unwrap()).await.unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_database_error_is_unavailable() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_errors([DbErr::Custom("connection reset".to_string())])
            .into_connection();
        let directory = PostgresUserDirectory::new(db);

        let err = directory
            .get_by_id(&UserId::parse(MARIA_ID).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DirectoryError::Unavailable(msg) if msg.contains("connection reset")
        ));
    }
}
