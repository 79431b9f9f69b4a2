use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{info, warn};

use mutuals_core::CoreError;
use mutuals_types::api::{
    ChangePasswordRequest, Claims, LoginRequest, LoginResponse, RegisterRequest,
    RegisterResponse,
};
use mutuals_types::models::UserId;

use crate::error::{ApiError, ApiResult};
use crate::{AppState, blocking};

const PASSWORD_MIN: usize = 8;
const TOKEN_TTL_DAYS: i64 = 30;
const ACCOUNT_BANNED: &str = "Account is banned";

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    check_password_length(&req.password)?;

    let RegisterRequest {
        username,
        email,
        password,
    } = req;
    let user = blocking(&state, move |engine| {
        // Hash with Argon2id before touching the store.
        let password_hash = hash_password(&password)?;
        engine.register(&username, &email, &password_hash)
    })
    .await?;

    let token = create_token(&state.jwt_secret, user.id, &user.username)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let LoginRequest { username, password } = req;
    let creds = blocking(&state, move |engine| {
        let Some(creds) = engine.credentials_by_username(&username)? else {
            return Ok(None);
        };
        Ok(verify_password(&password, &creds.password_hash).then_some(creds))
    })
    .await?
    .ok_or(ApiError::Unauthorized)?;

    if creds.banned {
        info!("Refused login for banned user {}", creds.user_id);
        return Err(ApiError::Forbidden(ACCOUNT_BANNED));
    }

    let token = create_token(&state.jwt_secret, creds.user_id, &creds.username)?;

    Ok(Json(LoginResponse {
        user_id: creds.user_id,
        username: creds.username,
        token,
    }))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    check_password_length(&req.new_password)?;

    let ChangePasswordRequest {
        current_password,
        new_password,
    } = req;
    blocking(&state, move |engine| {
        let creds = engine.credentials_by_id(claims.sub)?;
        if !verify_password(&current_password, &creds.password_hash) {
            return Err(CoreError::Validation("Incorrect current password".into()));
        }
        let password_hash = hash_password(&new_password)?;
        engine.change_password(claims.sub, &password_hash)
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

fn check_password_length(password: &str) -> ApiResult<()> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            PASSWORD_MIN
        )));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, CoreError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CoreError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))
}

fn verify_password(password: &str, stored: &str) -> bool {
    let parsed = match PasswordHash::new(stored) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Unparseable password hash in store: {}", e);
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub fn create_token(secret: &str, user_id: UserId, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
