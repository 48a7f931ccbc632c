//! Authentication Service
//!
//! Handles registration, login, JWT access tokens and refresh-token sessions.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::JwtSettings;
use crate::domain::{
    Notification, NotificationRepository, NotificationType, Session, SessionRepository, User,
    UserRepository, UserRole,
};
use crate::shared::error::AppError;

/// Authentication service trait for dependency injection
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Register a new customer, upgrading a guest account with the same email
    async fn register(&self, input: RegisterDto) -> Result<(User, AuthTokens), AuthError>;

    /// Authenticate user with credentials
    async fn login(&self, email: &str, password: &str) -> Result<(User, AuthTokens), AuthError>;

    /// Rotate a refresh token
    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError>;

    /// Revoke refresh token (logout)
    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError>;

    /// Profile of the authenticated user
    async fn me(&self, user_id: Uuid) -> Result<User, AuthError>;

    /// Replace the password after checking the current one. Every refresh
    /// session of the user is revoked.
    async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;
}

/// Registration input
#[derive(Debug, Clone)]
pub struct RegisterDto {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
}

/// Authentication tokens response
#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// `USER` or `ADMIN`
    pub role: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
    /// JWT ID for token revocation tracking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::InvalidToken)
    }

    pub fn role(&self) -> UserRole {
        UserRole::from_str(&self.role)
    }
}

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already exists")]
    EmailExists,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Session not found or expired")]
    SessionNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Current password is incorrect")]
    WrongPassword,

    #[error("New password must differ from the current one")]
    SamePassword,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::EmailExists => AppError::Conflict(err.to_string()),
            AuthError::InvalidCredentials
            | AuthError::TokenExpired
            | AuthError::InvalidToken
            | AuthError::SessionNotFound => AppError::Unauthorized(err.to_string()),
            AuthError::UserNotFound => AppError::NotFound(err.to_string()),
            AuthError::WrongPassword | AuthError::SamePassword => {
                AppError::BadRequest(err.to_string())
            }
            AuthError::Internal(msg) => AppError::Internal(msg),
            AuthError::Repository(e) => e,
        }
    }
}

/// Signing material for access tokens, shared by the auth service and middleware.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_token_expiry_minutes: i64,
    refresh_token_expiry_days: i64,
}

impl TokenKeys {
    pub fn new(settings: &JwtSettings) -> Self {
        Self {
            encoding: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding: DecodingKey::from_secret(settings.secret.as_bytes()),
            access_token_expiry_minutes: settings.access_token_expiry_minutes,
            refresh_token_expiry_days: settings.refresh_token_expiry_days,
        }
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::days(self.refresh_token_expiry_days)
    }

    /// Sign an access token and pair it with a fresh opaque refresh token.
    pub fn issue(&self, user_id: Uuid, role: UserRole) -> Result<AuthTokens, AuthError> {
        let now = Utc::now();
        let access_expiry = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = Claims {
            sub: user_id.to_string(),
            role: role.as_str().to_string(),
            exp: access_expiry.timestamp(),
            iat: now.timestamp(),
            jti: Some(Uuid::new_v4().to_string()),
        };

        let access_token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("Token generation failed: {}", e)))?;

        // Opaque, carries no user data
        let refresh_token = format!("{}.{}", Uuid::new_v4(), Uuid::new_v4());

        Ok(AuthTokens {
            access_token,
            refresh_token,
            expires_in: self.access_token_expiry_minutes * 60,
            token_type: "Bearer".to_string(),
        })
    }

    /// Decode and validate an access token
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let token_data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })?;

        Ok(token_data.claims)
    }
}

/// Hash refresh token for storage
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// AuthService implementation
pub struct AuthServiceImpl<U, S, N>
where
    U: UserRepository,
    S: SessionRepository,
    N: NotificationRepository,
{
    user_repo: Arc<U>,
    session_repo: Arc<S>,
    notification_repo: Arc<N>,
    keys: Arc<TokenKeys>,
}

impl<U, S, N> AuthServiceImpl<U, S, N>
where
    U: UserRepository,
    S: SessionRepository,
    N: NotificationRepository,
{
    pub fn new(
        user_repo: Arc<U>,
        session_repo: Arc<S>,
        notification_repo: Arc<N>,
        keys: Arc<TokenKeys>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            notification_repo,
            keys,
        }
    }

    /// Hash a password using Argon2id
    fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a password against its hash
    fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AuthError::Internal(format!("Invalid password hash: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Issue tokens and persist the refresh session.
    async fn start_session(&self, user: &User) -> Result<AuthTokens, AuthError> {
        let tokens = self.keys.issue(user.id, user.role)?;
        let session = Session::new(
            user.id,
            hash_refresh_token(&tokens.refresh_token),
            Utc::now() + self.keys.refresh_token_ttl(),
        );
        self.session_repo.create(&session).await?;
        Ok(tokens)
    }
}

#[async_trait]
impl<U, S, N> AuthService for AuthServiceImpl<U, S, N>
where
    U: UserRepository + 'static,
    S: SessionRepository + 'static,
    N: NotificationRepository + 'static,
{
    async fn register(&self, input: RegisterDto) -> Result<(User, AuthTokens), AuthError> {
        let email = normalize_email(&input.email);
        let password_hash = self.hash_password(&input.password)?;
        let full_name = input.full_name.trim().to_string();

        let user = match self.user_repo.find_by_email(&email).await? {
            Some(existing) if !existing.is_guest => return Err(AuthError::EmailExists),
            Some(mut guest) => {
                guest.password_hash = Some(password_hash);
                guest.full_name = full_name;
                guest.phone = input.phone.or(guest.phone);
                guest.is_guest = false;
                guest.updated_at = Utc::now();
                let upgraded = self.user_repo.update(&guest).await?;
                info!(user_id = %upgraded.id, "Guest account upgraded");
                upgraded
            }
            None => {
                let user = User::new_customer(email, password_hash, full_name, input.phone);
                let created = self.user_repo.create(&user).await?;
                info!(user_id = %created.id, "User registered");
                created
            }
        };

        let welcome = Notification::new(
            user.id,
            NotificationType::Welcome,
            "Welcome to Audio Tài Lộc",
            format!("Hi {}, your account is ready.", user.full_name),
            None,
        );
        if let Err(e) = self.notification_repo.create(&welcome).await {
            warn!(user_id = %user.id, error = %e, "Failed to create welcome notification");
        }

        let tokens = self.start_session(&user).await?;
        Ok((user, tokens))
    }

    async fn login(&self, email: &str, password: &str) -> Result<(User, AuthTokens), AuthError> {
        let user = self
            .user_repo
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        // Guest accounts have no password
        let hash = user
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.verify_password(password, hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.start_session(&user).await?;
        info!(user_id = %user.id, "User logged in");
        Ok((user, tokens))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let session = self
            .session_repo
            .find_by_token_hash(&hash_refresh_token(refresh_token))
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if !session.is_active() {
            return Err(AuthError::SessionNotFound);
        }

        let user = self
            .user_repo
            .find_by_id(session.user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let tokens = self.keys.issue(user.id, user.role)?;
        self.session_repo
            .rotate(
                session.id,
                &hash_refresh_token(&tokens.refresh_token),
                Utc::now() + self.keys.refresh_token_ttl(),
            )
            .await?;

        Ok(tokens)
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let session = self
            .session_repo
            .find_by_token_hash(&hash_refresh_token(refresh_token))
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        self.session_repo.revoke(session.id).await?;
        info!(user_id = %session.user_id, "Session revoked");
        Ok(())
    }

    async fn me(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let mut user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let hash = user.password_hash.as_deref().ok_or(AuthError::WrongPassword)?;
        if !self.verify_password(current_password, hash)? {
            return Err(AuthError::WrongPassword);
        }
        if current_password == new_password {
            return Err(AuthError::SamePassword);
        }

        user.password_hash = Some(self.hash_password(new_password)?);
        user.updated_at = Utc::now();
        self.user_repo.update(&user).await?;

        let revoked = self.session_repo.revoke_all_for_user(user_id).await?;
        info!(user_id = %user_id, revoked, "Password changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MockNotificationRepository, MockSessionRepository, MockUserRepository};
    use mockall::predicate::eq;

    fn keys() -> Arc<TokenKeys> {
        Arc::new(TokenKeys::new(&JwtSettings {
            secret: "test-secret-that-is-at-least-32-characters".into(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        }))
    }

    fn quiet_notifications() -> MockNotificationRepository {
        let mut notifications = MockNotificationRepository::new();
        notifications
            .expect_create()
            .returning(|n| Ok(n.clone()));
        notifications
    }

    fn service(
        users: MockUserRepository,
        sessions: MockSessionRepository,
    ) -> AuthServiceImpl<MockUserRepository, MockSessionRepository, MockNotificationRepository>
    {
        AuthServiceImpl::new(
            Arc::new(users),
            Arc::new(sessions),
            Arc::new(quiet_notifications()),
            keys(),
        )
    }

    fn register_input() -> RegisterDto {
        RegisterDto {
            email: " An@Example.com ".into(),
            password: "correct horse battery".into(),
            full_name: "Nguyễn An".into(),
            phone: None,
        }
    }

    #[test]
    fn issued_tokens_decode_with_role() {
        let keys = keys();
        let user_id = Uuid::now_v7();
        let tokens = keys.issue(user_id, UserRole::Admin).unwrap();

        let claims = keys.decode(&tokens.access_token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.role(), UserRole::Admin);
        assert_eq!(tokens.expires_in, 900);
    }

    #[test]
    fn rejects_tokens_signed_with_another_secret() {
        let other = TokenKeys::new(&JwtSettings {
            secret: "a-completely-different-secret-of-32-chars".into(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        });
        let tokens = other.issue(Uuid::now_v7(), UserRole::User).unwrap();
        assert!(matches!(keys().decode(&tokens.access_token), Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn register_creates_customer_and_session() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .with(eq("an@example.com"))
            .returning(|_| Ok(None));
        users.expect_create().returning(|u| Ok(u.clone()));

        let mut sessions = MockSessionRepository::new();
        sessions.expect_create().times(1).returning(|s| Ok(s.clone()));

        let (user, tokens) = service(users, sessions).register(register_input()).await.unwrap();
        assert_eq!(user.email, "an@example.com");
        assert!(!user.is_guest);
        assert_eq!(tokens.token_type, "Bearer");
    }

    #[tokio::test]
    async fn register_rejects_existing_customer() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_email().returning(|_| {
            Ok(Some(User::new_customer("an@example.com", "h".into(), "An", None)))
        });

        let err = service(users, MockSessionRepository::new())
            .register(register_input())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailExists));
    }

    #[tokio::test]
    async fn register_upgrades_guest_account() {
        let guest = User::new_guest("an@example.com", "Khách", Some("0912345678".into()));
        let guest_id = guest.id;

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .returning(move |_| Ok(Some(guest.clone())));
        users
            .expect_update()
            .withf(move |u| u.id == guest_id && !u.is_guest && u.password_hash.is_some())
            .returning(|u| Ok(u.clone()));

        let mut sessions = MockSessionRepository::new();
        sessions.expect_create().returning(|s| Ok(s.clone()));

        let (user, _) = service(users, sessions).register(register_input()).await.unwrap();
        assert_eq!(user.id, guest_id);
        assert_eq!(user.phone.as_deref(), Some("0912345678"));
    }

    #[tokio::test]
    async fn login_rejects_wrong_password_and_guests() {
        let svc_users = || {
            let hash = Argon2::default()
                .hash_password(b"right-password", &SaltString::generate(&mut OsRng))
                .unwrap()
                .to_string();
            let mut users = MockUserRepository::new();
            users.expect_find_by_email().returning(move |email| {
                Ok(Some(match email {
                    "guest@example.com" => User::new_guest(email, "G", None),
                    _ => User::new_customer(email, hash.clone(), "An", None),
                }))
            });
            users
        };

        let svc = service(svc_users(), MockSessionRepository::new());
        assert!(matches!(
            svc.login("an@example.com", "wrong-password").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            svc.login("guest@example.com", "anything").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn refresh_rotates_active_session() {
        let user = User::new_customer("an@example.com", "h".into(), "An", None);
        let user_id = user.id;
        let session = Session::new(
            user_id,
            hash_refresh_token("old"),
            Utc::now() + Duration::days(1),
        );
        let session_id = session.id;

        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_find_by_token_hash()
            .with(eq(hash_refresh_token("old")))
            .returning(move |_| Ok(Some(session.clone())));
        sessions
            .expect_rotate()
            .withf(move |id, hash, _| *id == session_id && *hash != hash_refresh_token("old"))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));

        let tokens = service(users, sessions).refresh("old").await.unwrap();
        assert_ne!(tokens.refresh_token, "old");
    }

    #[tokio::test]
    async fn refresh_rejects_revoked_session() {
        let mut session =
            Session::new(Uuid::now_v7(), hash_refresh_token("old"), Utc::now() + Duration::days(1));
        session.revoked_at = Some(Utc::now());

        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_find_by_token_hash()
            .returning(move |_| Ok(Some(session.clone())));

        let err = service(MockUserRepository::new(), sessions)
            .refresh("old")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SessionNotFound));
    }

    fn customer_with_password(password: &str) -> User {
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))
            .unwrap()
            .to_string();
        User::new_customer("an@example.com", hash, "An", None)
    }

    #[tokio::test]
    async fn change_password_rehashes_and_revokes_sessions() {
        let user = customer_with_password("old-secret-123");
        let user_id = user.id;
        let old_hash = user.password_hash.clone();

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .with(eq(user_id))
            .returning(move |_| Ok(Some(user.clone())));
        users
            .expect_update()
            .withf(move |u| u.id == user_id && u.password_hash != old_hash)
            .times(1)
            .returning(|u| Ok(u.clone()));

        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_revoke_all_for_user()
            .with(eq(user_id))
            .times(1)
            .returning(|_| Ok(2));

        service(users, sessions)
            .change_password(user_id, "old-secret-123", "loa-karaoke-2026")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn change_password_checks_the_current_one() {
        let user = customer_with_password("old-secret-123");
        let user_id = user.id;
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));
        users.expect_update().never();

        let svc = service(users, MockSessionRepository::new());
        assert!(matches!(
            svc.change_password(user_id, "wrong-secret", "loa-karaoke-2026").await,
            Err(AuthError::WrongPassword)
        ));
        assert!(matches!(
            svc.change_password(user_id, "old-secret-123", "old-secret-123").await,
            Err(AuthError::SamePassword)
        ));
    }

    #[tokio::test]
    async fn guests_cannot_change_a_password_they_never_set() {
        let guest = User::new_guest("khach@example.com", "Khach", None);
        let guest_id = guest.id;
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(guest.clone())));

        let err = service(users, MockSessionRepository::new())
            .change_password(guest_id, "", "loa-karaoke-2026")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::WrongPassword));
    }

    #[test]
    fn maps_errors_to_http_kinds() {
        assert!(matches!(AppError::from(AuthError::EmailExists), AppError::Conflict(_)));
        assert!(matches!(AppError::from(AuthError::TokenExpired), AppError::Unauthorized(_)));
        assert!(matches!(AppError::from(AuthError::UserNotFound), AppError::NotFound(_)));
        assert!(matches!(AppError::from(AuthError::WrongPassword), AppError::BadRequest(_)));
    }
}
