use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, SqlErr,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{user, UserRole},
    errors::ServiceError,
    events::{Event, EventSender},
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const EMAIL_TAKEN: &str = "User with this email already exists";

pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ServiceError::HashError(e.to_string())
        })
}

pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, ServiceError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| ServiceError::HashError(format!("Stored hash is unreadable: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 20))]
    pub contact_number: String,
    #[serde(default)]
    pub user_image: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Admin edit of any account
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 6))]
    pub password: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub contact_number: Option<String>,
    pub role: Option<UserRole>,
    pub active: Option<bool>,
    pub user_image: Option<String>,
}

/// What a customer may change about themselves
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub contact_number: Option<String>,
    pub user_image: Option<String>,
}

#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl UserService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Registers a customer account. Emails are unique ignoring case.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn signup(&self, input: SignupRequest) -> Result<user::Model, ServiceError> {
        input.validate()?;
        let email = normalize_email(&input.email);
        self.ensure_email_free(&email, None).await?;

        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            first_name: Set(input.first_name.trim().to_string()),
            last_name: Set(input.last_name.trim().to_string()),
            email: Set(email),
            password_hash: Set(hash_password(&input.password)?),
            contact_number: Set(input.contact_number.trim().to_string()),
            role: Set(UserRole::Customer),
            active: Set(true),
            image: Set(input.user_image),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            error!("Failed to create user: {}", e);
            user_write_error(e)
        })?;

        info!("User {} registered", model.id);
        self.event_sender
            .send_or_log(Event::UserRegistered(model.id))
            .await;
        Ok(model)
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn login(&self, input: LoginRequest) -> Result<user::Model, ServiceError> {
        input
            .validate()
            .map_err(|_| ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        let user = self
            .find_by_email(&normalize_email(&input.email))
            .await?
            .ok_or_else(|| ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        if !verify_password(&input.password, &user.password_hash)? {
            warn!("Failed login for user {}", user.id);
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }
        if !user.active {
            return Err(ServiceError::Unauthorized("Account is disabled".to_string()));
        }

        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<user::Model>, ServiceError> {
        user::Entity::find()
            .order_by_desc(user::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(|e| {
                error!("Failed to list users: {}", e);
                ServiceError::DatabaseError(e)
            })
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: Uuid) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(|e| {
                error!("Failed to fetch user {}: {}", id, e);
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", id)))
    }

    #[instrument(skip(self, input))]
    pub async fn admin_update(
        &self,
        id: Uuid,
        input: AdminUpdateUserRequest,
    ) -> Result<user::Model, ServiceError> {
        input.validate()?;
        let mut active = self.get_user(id).await?.into_active_model();

        if let Some(email) = input.email {
            let email = normalize_email(&email);
            self.ensure_email_free(&email, Some(id)).await?;
            active.email = Set(email);
        }
        if let Some(password) = input.password {
            active.password_hash = Set(hash_password(&password)?);
        }
        if let Some(first_name) = input.first_name {
            active.first_name = Set(first_name.trim().to_string());
        }
        if let Some(last_name) = input.last_name {
            active.last_name = Set(last_name.trim().to_string());
        }
        if let Some(contact_number) = input.contact_number {
            active.contact_number = Set(contact_number.trim().to_string());
        }
        if let Some(role) = input.role {
            active.role = Set(role);
        }
        if let Some(flag) = input.active {
            active.active = Set(flag);
        }
        if let Some(image) = input.user_image {
            active.image = Set(Some(image));
        }

        active.update(&*self.db).await.map_err(|e| {
            error!("Failed to update user {}: {}", id, e);
            user_write_error(e)
        })
    }

    #[instrument(skip(self, input))]
    pub async fn update_profile(
        &self,
        id: Uuid,
        input: ProfileUpdateRequest,
    ) -> Result<user::Model, ServiceError> {
        input.validate()?;
        let mut active = self.get_user(id).await?.into_active_model();

        if let Some(first_name) = input.first_name {
            active.first_name = Set(first_name.trim().to_string());
        }
        if let Some(last_name) = input.last_name {
            active.last_name = Set(last_name.trim().to_string());
        }
        if let Some(contact_number) = input.contact_number {
            active.contact_number = Set(contact_number.trim().to_string());
        }
        if let Some(image) = input.user_image {
            active.image = Set(Some(image));
        }

        active.update(&*self.db).await.map_err(|e| {
            error!("Failed to update profile {}: {}", id, e);
            ServiceError::DatabaseError(e)
        })
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = user::Entity::delete_by_id(id)
            .exec(&*self.db)
            .await
            .map_err(|e| {
                error!("Failed to delete user {}: {}", id, e);
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("User {} not found", id)));
        }

        info!("User {} deleted", id);
        self.event_sender.send_or_log(Event::UserDeleted(id)).await;
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError> {
        user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db)
            .await
            .map_err(|e| {
                error!("Failed to look up user by email: {}", e);
                ServiceError::DatabaseError(e)
            })
    }

    async fn ensure_email_free(&self, email: &str, owner: Option<Uuid>) -> Result<(), ServiceError> {
        match self.find_by_email(email).await? {
            Some(existing) if Some(existing.id) != owner => {
                Err(ServiceError::Conflict(EMAIL_TAKEN.to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// The unique email index backs up `ensure_email_free` when two writes race.
fn user_write_error(err: DbErr) -> ServiceError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            ServiceError::Conflict(EMAIL_TAKEN.to_string())
        }
        _ => ServiceError::DatabaseError(err),
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{event_sender, setup_db};
    use assert_matches::assert_matches;

    fn signup(email: &str) -> SignupRequest {
        SignupRequest {
            first_name: "Asha".into(),
            last_name: "Rao".into(),
            email: email.into(),
            password: "secret123".into(),
            contact_number: "9876543210".into(),
            user_image: None,
        }
    }

    async fn service() -> UserService {
        let (sender, _rx) = event_sender();
        UserService::new(setup_db().await, sender)
    }

    #[test]
    fn hashes_verify_and_differ_per_call() {
        let a = hash_password("secret123").unwrap();
        let b = hash_password("secret123").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("secret123", &a).unwrap());
        assert!(!verify_password("wrong", &a).unwrap());
    }

    #[tokio::test]
    async fn signup_then_login() {
        let service = service().await;
        let user = service.signup(signup("Asha@Example.com")).await.unwrap();
        assert_eq!(user.email, "asha@example.com");
        assert_eq!(user.role, UserRole::Customer);
        assert_ne!(user.password_hash, "secret123");

        let logged_in = service
            .login(LoginRequest {
                email: "asha@example.com".into(),
                password: "secret123".into(),
            })
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);

        assert_matches!(
            service
                .login(LoginRequest {
                    email: "asha@example.com".into(),
                    password: "nope".into(),
                })
                .await,
            Err(ServiceError::Unauthorized(_))
        );
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let service = service().await;
        service.signup(signup("asha@example.com")).await.unwrap();
        assert_matches!(
            service.signup(signup("ASHA@example.com")).await,
            Err(ServiceError::Conflict(_))
        );
    }

    fn raw_user(email: &str) -> user::ActiveModel {
        user::ActiveModel {
            id: Set(Uuid::new_v4()),
            first_name: Set("Asha".into()),
            last_name: Set("Rao".into()),
            email: Set(email.into()),
            password_hash: Set(hash_password("secret123").unwrap()),
            contact_number: Set("9876543210".into()),
            role: Set(UserRole::Customer),
            active: Set(true),
            image: Set(None),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn unique_index_violation_maps_to_conflict() {
        let db = setup_db().await;
        raw_user("asha@example.com").insert(&*db).await.unwrap();

        // Same email written past the lookup, as a racing signup would
        let err = raw_user("asha@example.com")
            .insert(&*db)
            .await
            .unwrap_err();
        assert_matches!(
            user_write_error(err),
            ServiceError::Conflict(msg) if msg == EMAIL_TAKEN
        );
    }

    #[tokio::test]
    async fn concurrent_signups_yield_one_account_and_one_conflict() {
        let service = service().await;
        let (first, second) = tokio::join!(
            service.signup(signup("asha@example.com")),
            service.signup(signup("asha@example.com"))
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(ServiceError::Conflict(_)))));
        assert_eq!(service.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn admin_email_change_to_taken_address_conflicts() {
        let service = service().await;
        service.signup(signup("asha@example.com")).await.unwrap();
        let other = service.signup(signup("ravi@example.com")).await.unwrap();
        assert_matches!(
            service
                .admin_update(
                    other.id,
                    AdminUpdateUserRequest {
                        email: Some("Asha@Example.com".into()),
                        ..Default::default()
                    },
                )
                .await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let service = service().await;
        let mut input = signup("asha@example.com");
        input.password = "123".into();
        assert_matches!(
            service.signup(input).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn disabled_account_cannot_log_in() {
        let service = service().await;
        let user = service.signup(signup("asha@example.com")).await.unwrap();
        service
            .admin_update(
                user.id,
                AdminUpdateUserRequest {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_matches!(
            service
                .login(LoginRequest {
                    email: "asha@example.com".into(),
                    password: "secret123".into(),
                })
                .await,
            Err(ServiceError::Unauthorized(msg)) if msg == "Account is disabled"
        );
    }

    #[tokio::test]
    async fn admin_can_promote_and_profile_stays_limited() {
        let service = service().await;
        let user = service.signup(signup("asha@example.com")).await.unwrap();

        let promoted = service
            .admin_update(
                user.id,
                AdminUpdateUserRequest {
                    role: Some(UserRole::Admin),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(promoted.is_admin());

        let profile = service
            .update_profile(
                user.id,
                ProfileUpdateRequest {
                    first_name: Some("Ashwini".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(profile.full_name(), "Ashwini Rao");
        assert_eq!(profile.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn delete_missing_user_is_not_found() {
        let service = service().await;
        assert_matches!(
            service.delete_user(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        );
    }
}
