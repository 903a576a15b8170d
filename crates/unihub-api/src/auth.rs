use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{info, warn};

use unihub_db::Database;
use unihub_db::queries::users;
use unihub_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::recommendations::TieBreak;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub tie_break: TieBreak,
}

/// Validate, hash, and store a new account. Returns the new user id.
pub fn register_user(db: &Database, req: &RegisterRequest) -> ApiResult<i64> {
    let username = req.username.trim();
    let name_len = username.chars().count();
    if !(3..=32).contains(&name_len) {
        return Err(ApiError::validation("username must be 3-32 characters"));
    }
    if req.password.chars().count() < 8 {
        return Err(ApiError::validation("password must be at least 8 characters"));
    }
    if !req.email.contains('@') {
        return Err(ApiError::validation("a valid email is required"));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))?
        .to_string();

    let user_id = db.with_tx(|tx| {
        if users::user_by_username(tx, username)?.is_some() {
            return Err(ApiError::conflict("username is already taken"));
        }
        Ok(users::insert_user(tx, username, req.email.trim(), &password_hash)?)
    })?;

    info!("Registered user {} ({})", username, user_id);
    Ok(user_id)
}

/// Check credentials; `None` means unknown user or wrong password.
pub fn verify_login(db: &Database, req: &LoginRequest) -> ApiResult<Option<(i64, String)>> {
    let Some(user) = db.get_user_by_username(req.username.trim())? else {
        return Ok(None);
    };

    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt password hash: {}", e)))?;

    if Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        warn!("Failed login for {}", req.username);
        return Ok(None);
    }

    Ok(Some((user.id, user.username)))
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let username = req.username.trim().to_string();
    let user_id = blocking(&state, move |db| register_user(db, &req)).await?;

    let token = create_token(&state.jwt_secret, user_id, &username)?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let Json(req) = payload?;
    let (user_id, username) = blocking(&state, move |db| verify_login(db, &req))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let token = create_token(&state.jwt_secret, user_id, &username)?;

    Ok(Json(LoginResponse {
        user_id,
        username,
        token,
    }))
}

pub fn create_token(secret: &str, user_id: i64, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: format!("{}@uni.ac.uk", username),
            password: password.into(),
        }
    }

    #[test]
    fn register_then_login() {
        let db = Database::open_in_memory().unwrap();
        let id = register_user(&db, &request("alice", "correct horse")).unwrap();

        let ok = verify_login(
            &db,
            &LoginRequest { username: "alice".into(), password: "correct horse".into() },
        )
        .unwrap();
        assert_eq!(ok, Some((id, "alice".to_string())));

        let bad = verify_login(
            &db,
            &LoginRequest { username: "alice".into(), password: "wrong password".into() },
        )
        .unwrap();
        assert_eq!(bad, None);
    }

    #[test]
    fn duplicate_username_conflicts() {
        let db = Database::open_in_memory().unwrap();
        register_user(&db, &request("bob", "password123")).unwrap();
        let err = register_user(&db, &request("bob", "password456")).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn username_length_counts_characters() {
        let db = Database::open_in_memory().unwrap();
        // Two characters, six bytes
        let err = register_user(&db, &request("éé", "password123")).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        let err = register_user(&db, &request("  ab  ", "password123")).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let id = register_user(&db, &request("  zoë  ", "password123")).unwrap();
        let stored = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(stored.username, "zoë");
    }

    #[test]
    fn short_password_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let err = register_user(&db, &request("carol", "short")).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
