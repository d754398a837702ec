use anyhow::Context;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tracing::{debug, info};

use crate::{
    db::now_sec,
    entities::{session, user},
    error::{AppError, AppResult},
    models::RegisterForm,
};

/// User registration, password login and session tokens.
#[derive(Clone)]
pub struct Accounts {
    db: DatabaseConnection,
    session_ttl_seconds: i64,
}

impl Accounts {
    pub fn new(db: DatabaseConnection, session_ttl_days: i64) -> Self {
        Self { db, session_ttl_seconds: session_ttl_days * 86_400 }
    }

    pub async fn register(&self, form: &RegisterForm) -> AppResult<user::Model> {
        let username = form.username.trim();
        let email = form.email.trim().to_lowercase();

        if username.is_empty() || email.is_empty() || form.password.is_empty() {
            return Err(AppError::validation("username, email and password are required"));
        }
        if form.password != form.confirm_password {
            return Err(AppError::validation("Passwords do not match"));
        }
        if self.find_by_username(username).await?.is_some() {
            return Err(AppError::validation("Username already exists"));
        }
        let email_taken = user::Entity::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .one(&self.db)
            .await?;
        if email_taken.is_some() {
            return Err(AppError::validation("Email already exists"));
        }

        let password_hash = hash_password(form.password.clone()).await?;

        let created = user::ActiveModel {
            id: Default::default(),
            username: Set(username.to_string()),
            email: Set(email),
            password_hash: Set(password_hash),
            created_at: Set(now_sec()),
        }
        .insert(&self.db)
        .await
        .map_err(AppError::from)
        .map_err(|err| match err {
            AppError::Conflict(_) => AppError::validation("Username or email already exists"),
            other => other,
        })?;

        info!(user_id = created.id, username = %created.username, "registered user");
        Ok(created)
    }

    /// Verifies credentials and opens a session, returning its token.
    pub async fn login(&self, username: &str, password: &str) -> AppResult<String> {
        let invalid = AppError::Unauthorized("Invalid username or password");

        let Some(account) = self.find_by_username(username.trim()).await? else {
            return Err(invalid);
        };
        if !verify_password(password.to_string(), account.password_hash.clone()).await? {
            debug!(user_id = account.id, "password mismatch");
            return Err(invalid);
        }

        let token = uuid::Uuid::new_v4().simple().to_string();
        session::ActiveModel {
            token: Set(token.clone()),
            user_id: Set(account.id),
            created_at: Set(now_sec()),
        }
        .insert(&self.db)
        .await?;

        debug!(user_id = account.id, "opened session");
        Ok(token)
    }

    /// Resolves a session token; expired sessions are removed and treated as absent.
    pub async fn session_user(&self, token: &str) -> AppResult<Option<user::Model>> {
        let found = session::Entity::find_by_id(token.to_string())
            .find_also_related(user::Entity)
            .one(&self.db)
            .await?;

        let Some((session, account)) = found else {
            return Ok(None);
        };
        if !self.is_fresh(session.created_at) {
            debug!(user_id = session.user_id, "session expired");
            self.logout(token).await?;
            return Ok(None);
        }
        Ok(account)
    }

    pub async fn logout(&self, token: &str) -> AppResult<()> {
        session::Entity::delete_by_id(token.to_string()).exec(&self.db).await?;
        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<user::Model>> {
        Ok(user::Entity::find().filter(user::Column::Username.eq(username)).one(&self.db).await?)
    }

    fn is_fresh(&self, created_at: i64) -> bool {
        now_sec().saturating_sub(created_at) <= self.session_ttl_seconds
    }
}

async fn hash_password(password: String) -> AppResult<String> {
    let hashed = tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow::anyhow!("hashing password: {e}"))
    })
    .await
    .context("password hashing task")??;
    Ok(hashed)
}

async fn verify_password(password: String, stored: String) -> AppResult<bool> {
    let ok = tokio::task::spawn_blocking(move || {
        let parsed =
            PasswordHash::new(&stored).map_err(|e| anyhow::anyhow!("stored hash: {e}"))?;
        Ok::<_, anyhow::Error>(
            Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        )
    })
    .await
    .context("password verification task")??;
    Ok(ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::memory_db;

    fn form(username: &str, email: &str, password: &str, confirm: &str) -> RegisterForm {
        RegisterForm {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            confirm_password: confirm.into(),
        }
    }

    #[tokio::test]
    async fn register_rejects_mismatch_and_duplicates() {
        let accounts = Accounts::new(memory_db().await, 14);

        let err = accounts.register(&form("ann", "ann@x.io", "pw1", "pw2")).await.unwrap_err();
        assert_eq!(err.to_string(), "Passwords do not match");

        let err = accounts.register(&form(" ", "ann@x.io", "pw", "pw")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        accounts.register(&form("ann", "ann@x.io", "pw", "pw")).await.unwrap();

        let err = accounts.register(&form("ann", "other@x.io", "pw", "pw")).await.unwrap_err();
        assert_eq!(err.to_string(), "Username already exists");

        let err = accounts.register(&form("bea", "ANN@x.io", "pw", "pw")).await.unwrap_err();
        assert_eq!(err.to_string(), "Email already exists");
    }

    #[tokio::test]
    async fn password_is_stored_hashed() {
        let accounts = Accounts::new(memory_db().await, 14);
        let created =
            accounts.register(&form("ann", "ann@x.io", "hunter2", "hunter2")).await.unwrap();
        assert_ne!(created.password_hash, "hunter2");
        assert!(created.password_hash.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn login_session_logout() {
        let accounts = Accounts::new(memory_db().await, 14);
        let created = accounts.register(&form("ann", "ann@x.io", "pw", "pw")).await.unwrap();

        let err = accounts.login("ann", "wrong").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert!(accounts.login("nobody", "pw").await.is_err());

        let token = accounts.login("ann", "pw").await.unwrap();
        let who = accounts.session_user(&token).await.unwrap().unwrap();
        assert_eq!(who.id, created.id);

        accounts.logout(&token).await.unwrap();
        assert!(accounts.session_user(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_session_is_dropped() {
        let db = memory_db().await;
        let accounts = Accounts::new(db.clone(), 1);
        accounts.register(&form("ann", "ann@x.io", "pw", "pw")).await.unwrap();
        let token = accounts.login("ann", "pw").await.unwrap();

        session::Entity::update_many()
            .col_expr(session::Column::CreatedAt, sea_orm::sea_query::Expr::value(0i64))
            .filter(session::Column::Token.eq(token.clone()))
            .exec(&db)
            .await
            .unwrap();

        assert!(accounts.session_user(&token).await.unwrap().is_none());
        assert!(session::Entity::find_by_id(token).one(&db).await.unwrap().is_none());
    }
}
