use sqlx::PgPool;
use uuid::Uuid;

use super::{found, violates, ServiceError, FOREIGN_KEY_VIOLATION, UNIQUE_VIOLATION};
use crate::api::users::{CreateUser, UpdateUser};
use crate::api::{Page, PageQuery};
use crate::auth::hash_password;
use crate::database::models::{UserAccount, USER_ACCOUNT_COLUMNS};

const ACCOUNT_FROM: &str = "users u LEFT JOIN roles r ON r.id = u.role_id";

pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, dto: CreateUser) -> Result<UserAccount, ServiceError> {
        let email = normalize_email(&dto.email);
        let password = dto.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| ServiceError::Internal(format!("password hashing task failed: {}", e)))?
            .map_err(|e| ServiceError::Internal(format!("password hashing failed: {}", e)))?;

        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO users (email, password_hash, first_name, last_name, phone, avatar, job_title, role_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
        )
        .bind(&email)
        .bind(&password_hash)
        .bind(dto.first_name.trim())
        .bind(dto.last_name.trim())
        .bind(&dto.phone)
        .bind(&dto.avatar)
        .bind(&dto.job_title)
        .bind(dto.role_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error(e, &email))?;

        tracing::info!("Created user {} ({})", id, email);
        self.get(id).await
    }

    /// Newest account first
    pub async fn list(&self, query: PageQuery) -> Result<Page<UserAccount>, ServiceError> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY u.created_at DESC LIMIT $1 OFFSET $2",
            USER_ACCOUNT_COLUMNS, ACCOUNT_FROM
        );
        let users = sqlx::query_as::<_, UserAccount>(&sql)
            .bind(query.limit())
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(query.into_page(users, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<UserAccount, ServiceError> {
        let sql = format!("SELECT {} FROM {} WHERE u.id = $1", USER_ACCOUNT_COLUMNS, ACCOUNT_FROM);
        let user = sqlx::query_as::<_, UserAccount>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        found(user, "User", id)
    }

    /// Setting `status` also switches `is_active`, which gates every request of the user
    pub async fn update(&self, id: Uuid, dto: UpdateUser) -> Result<UserAccount, ServiceError> {
        let email = dto.email.as_deref().map(normalize_email);
        let updated: Option<Uuid> = sqlx::query_scalar(
            "UPDATE users SET email = COALESCE($2, email), first_name = COALESCE($3, first_name), \
             last_name = COALESCE($4, last_name), phone = COALESCE($5, phone), avatar = COALESCE($6, avatar), \
             job_title = COALESCE($7, job_title), role_id = COALESCE($8, role_id), \
             status = COALESCE($9, status), is_active = COALESCE($10, is_active), updated_at = NOW() \
             WHERE id = $1 RETURNING id",
        )
        .bind(id)
        .bind(&email)
        .bind(dto.first_name.as_deref().map(str::trim))
        .bind(dto.last_name.as_deref().map(str::trim))
        .bind(&dto.phone)
        .bind(&dto.avatar)
        .bind(&dto.job_title)
        .bind(dto.role_id)
        .bind(dto.status.map(|s| s.as_str()))
        .bind(dto.status.map(|s| s.is_active()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| write_error(e, email.as_deref().unwrap_or_default()))?;

        found(updated, "User", id)?;
        tracing::info!("Updated user {}", id);
        self.get(id).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if violates(&e, FOREIGN_KEY_VIOLATION) {
                    ServiceError::BadRequest(format!(
                        "User {} still owns cards, opportunities or activities; reassign them first",
                        id
                    ))
                } else {
                    e.into()
                }
            })?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("User", id));
        }
        tracing::info!("Deleted user {}", id);
        Ok(())
    }

    pub async fn find_by_email(&self, email: &str) -> Result<UserAccount, ServiceError> {
        let email = normalize_email(email);
        let sql = format!("SELECT {} FROM {} WHERE u.email = $1", USER_ACCOUNT_COLUMNS, ACCOUNT_FROM);
        let user = sqlx::query_as::<_, UserAccount>(&sql)
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;
        found(user, "User", email)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Duplicate email is a conflict; an unknown role id is a bad request
fn write_error(err: sqlx::Error, email: &str) -> ServiceError {
    if violates(&err, UNIQUE_VIOLATION) {
        return ServiceError::Conflict(format!("Email {} is already registered", email));
    }
    if violates(&err, FOREIGN_KEY_VIOLATION) {
        return ServiceError::BadRequest("Role does not exist".to_string());
    }
    err.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_compare_case_insensitively() {
        assert_eq!(normalize_email("  Ana.Lima@Example.COM "), "ana.lima@example.com");
    }

    #[test]
    fn non_database_errors_pass_through() {
        let err = write_error(sqlx::Error::RowNotFound, "ana@example.com");
        assert!(matches!(err, ServiceError::Sqlx(sqlx::Error::RowNotFound)));
    }
}
