use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{LoginRequest, RegisterRequest},
        jwt::JwtKeys,
        password::{hash_password_blocking, verify_password_blocking},
        repo::UserRepo,
        repo_types::{Role, User},
    },
    error::AppError,
    store::{now_utc, StoreError},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Create an account. The existence pre-check gives a clean error in the
/// common case; the store's own uniqueness guarantee covers concurrent races.
pub async fn register(users: &dyn UserRepo, req: RegisterRequest) -> Result<User, AppError> {
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) {
        return Err(AppError::Validation("Invalid email".into()));
    }

    if users.find_user_by_email(&email).await.map_err(store_error)?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("Email already registered"));
    }

    let password_hash = hash_password_blocking(req.password).await?;
    let user = User {
        id: Uuid::new_v4(),
        email,
        name: req.name,
        role: req.role,
        password_hash,
        created_at: now_utc(),
    };
    users.insert_user(&user).await.map_err(store_error)?;

    info!(user_id = %user.id, email = %user.email, role = user.role.as_str(), "user registered");
    Ok(user)
}

/// Check credentials and issue a token. Unknown email and wrong password
/// produce the same error.
pub async fn login(
    users: &dyn UserRepo,
    keys: &JwtKeys,
    req: LoginRequest,
) -> Result<(String, User), AppError> {
    let email = normalize_email(&req.email);

    let Some(user) = users.find_user_by_email(&email).await.map_err(store_error)? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password_blocking(req.password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let token = keys.sign(&user.email)?;
    info!(user_id = %user.id, "user logged in");
    Ok((token, user))
}

/// Turn a bearer token into the user it names. The role comes from the
/// current user record, not from the token.
pub async fn resolve_identity(
    users: &dyn UserRepo,
    keys: &JwtKeys,
    token: &str,
) -> Result<User, AppError> {
    let claims = keys.verify(token)?;
    let email = claims
        .sub
        .ok_or(AppError::Unauthenticated("Invalid authentication credentials"))?;
    users
        .find_user_by_email(&email)
        .await
        .map_err(store_error)?
        .ok_or_else(|| {
            warn!(email = %email, "token for unknown user");
            AppError::Unauthenticated("User not found")
        })
}

pub fn require_role(user: User, role: Role) -> Result<User, AppError> {
    if user.role != role {
        warn!(user_id = %user.id, required = role.as_str(), "role check failed");
        return Err(AppError::Forbidden);
    }
    Ok(user)
}

fn store_error(e: StoreError) -> AppError {
    match e {
        StoreError::Duplicate(_) => AppError::Conflict("Email already registered"),
        StoreError::Backend(e) => AppError::Internal(e),
    }
}
