//! Response DTOs
//!
//! Data structures for API response bodies.

use serde::Serialize;

use crate::application::services::AuthTokens;
use crate::domain::User;

/// Authentication tokens response
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

impl From<AuthTokens> for TokenResponse {
    fn from(tokens: AuthTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
            token_type: tokens.token_type,
        }
    }
}

/// Register and login response (user plus tokens)
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    #[serde(flatten)]
    pub tokens: TokenResponse,
}

impl AuthResponse {
    pub fn new(user: User, tokens: AuthTokens) -> Self {
        Self {
            user: UserResponse::from(user),
            tokens: TokenResponse::from(tokens),
        }
    }
}

/// User response
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email,
            full_name: user.full_name,
            phone: user.phone,
            role: user.role.as_str().to_string(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Plain acknowledgement
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Number of rows touched by a bulk operation
#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserRole;

    #[test]
    fn user_response_hides_password_hash() {
        let mut user = User::new_customer("a@b.vn", "secret-hash".into(), "An", None);
        user.role = UserRole::Admin;

        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert_eq!(json["role"], "ADMIN");
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn auth_response_flattens_tokens() {
        let user = User::new_customer("a@b.vn", "h".into(), "An", None);
        let tokens = AuthTokens {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_in: 900,
            token_type: "Bearer".into(),
        };

        let json = serde_json::to_value(AuthResponse::new(user, tokens)).unwrap();
        assert_eq!(json["access_token"], "a");
        assert_eq!(json["user"]["email"], "a@b.vn");
    }
}
