use academy_core::model::{Role, User, UserId};

use super::SqliteRepository;
use super::mapping::{db, get_id, id_i64, map_user_row};
use crate::repository::{NewUserRecord, StorageError, UserRepository};

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError> {
        let row = sqlx::query(
            r"
            INSERT INTO users (username, full_name, email, role)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id
            ",
        )
        .bind(user.username.trim())
        .bind(user.full_name.trim())
        .bind(user.email.trim())
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;

        get_id(&row, "id", UserId::new)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(
            "SELECT id, username, full_name, email, role FROM users WHERE id = ?1",
        )
        .bind(id_i64("user_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        row.as_ref().map(map_user_row).transpose()
    }

    async fn users_with_role(&self, role: Role) -> Result<Vec<User>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, username, full_name, email, role FROM users WHERE role = ?1 ORDER BY id",
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.iter().map(map_user_row).collect()
    }
}
