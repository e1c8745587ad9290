use chrono::{DateTime, Utc};
use market_core::model::{Identifier, User, UserCredentials, UserId};
use sqlx::Row;

use super::{
    SqliteRepository,
    mapping::{USER_COLUMNS, db, identifier_binds, map_user_row, ser},
};
use crate::repository::{StorageError, UserRepository};

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn insert_user(
        &self,
        user: &User,
        password_hash: &str,
        role: &str,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        sqlx::query(
            r"
            INSERT INTO users (
                id, name, username, email, password_hash, avatar, bio, phone, location,
                status, created_at, updated_at, last_login_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ",
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(user.username.as_deref())
        .bind(&user.email)
        .bind(password_hash)
        .bind(user.avatar.as_deref())
        .bind(user.bio.as_deref())
        .bind(user.phone.as_deref())
        .bind(user.location.as_deref())
        .bind(user.status.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.last_login_at)
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        sqlx::query(
            r"
            INSERT INTO user_roles (user_id, role_id)
            SELECT ?1, id FROM roles WHERE name = ?2
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(user.id.to_string())
        .bind(role)
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        tx.commit().await.map_err(db)?;
        Ok(())
    }

    async fn credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, StorageError> {
        let sql = format!("SELECT {USER_COLUMNS}, u.password_hash FROM users u WHERE u.email = ?1");
        let Some(row) = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
        else {
            return Ok(None);
        };
        Ok(Some(UserCredentials {
            user: map_user_row(&row)?,
            password_hash: row.try_get("password_hash").map_err(ser)?,
        }))
    }

    async fn find_user(&self, identifier: &Identifier) -> Result<Option<User>, StorageError> {
        let (id, username) = identifier_binds(identifier);
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1 OR u.username = ?2");
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.as_ref().map(map_user_row).transpose()
    }

    async fn get_user(&self, id: UserId) -> Result<User, StorageError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;
        map_user_row(&row)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        Ok(row.is_some())
    }

    async fn touch_last_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE users SET last_login_at = ?2, updated_at = ?2 WHERE id = ?1")
            .bind(id.to_string())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn roles(&self, id: UserId) -> Result<Vec<String>, StorageError> {
        sqlx::query_scalar(
            r"
            SELECT r.name FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = ?1
            ORDER BY r.name
            ",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db)
    }
}
