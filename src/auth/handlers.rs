use axum::{
    extract::{FromRef, Path, State},
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::CookieJar;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, EmailRequest, LoginRequest, MessageResponse, ProfileResponse,
            RegisterRequest, ResetPasswordRequest, UpdatePasswordRequest, UpdateProfileRequest,
            UsersResponse,
        },
        jwt::{removal_cookie, AuthUser, JwtKeys},
        password::{hash_password, verify_password},
        repo::{is_unique_violation, Role, User},
        token,
    },
    error::ApiError,
    mailer,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/verify/:token", get(verify_email))
        .route("/email/resend", post(resend_verification))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/password/forgot", post(forgot_password))
        .route("/password/reset/:token", put(reset_password))
        .route("/me", get(get_profile))
        .route("/me/update", put(update_profile))
        .route("/password/update", put(update_password))
        .route("/admin/users", get(list_users))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn validate_new_password(password: &str) -> Result<(), ApiError> {
    if password.len() < 8 {
        return Err(ApiError::Validation(
            "Password should be at least 8 characters".into(),
        ));
    }
    Ok(())
}

/// Re-checks a presented token against the fields fetched from the row:
/// constant-time hash comparison plus lazy expiry against the current clock.
fn token_matches(
    presented: &str,
    stored_hash: Option<&str>,
    expires_at: Option<time::OffsetDateTime>,
) -> bool {
    match (stored_hash, expires_at) {
        (Some(hash), Some(expires_at)) => {
            token::verify(presented, hash, expires_at, time::OffsetDateTime::now_utc())
        }
        _ => false,
    }
}

/// Creates the account unverified, emails a verification link and returns a
/// session token. If the email cannot be dispatched the freshly issued token
/// fields are cleared and the request fails; the account row stays.
#[instrument(skip(state, jar, payload))]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), ApiError> {
    if payload.first_name.trim().is_empty() {
        return Err(ApiError::Validation("Please enter your first name".into()));
    }
    if payload.last_name.trim().is_empty() {
        return Err(ApiError::Validation("Please enter your last name".into()));
    }
    if !is_valid_email(&payload.email) {
        return Err(ApiError::Validation("Please enter a valid email".into()));
    }
    validate_new_password(&payload.password)?;

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = match User::create(
        &state.db,
        &payload.first_name,
        &payload.last_name,
        &payload.email,
        &hash,
    )
    .await
    {
        Ok(user) => user,
        // Lost the race against a concurrent registration; the unique index
        // is the arbiter.
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::Conflict("Email already registered".into()))
        }
        Err(e) => return Err(e.into()),
    };

    let issued = token::issue(token::VERIFY_EMAIL_TTL);
    User::set_verify_token(&state.db, user.id, &issued.hash, issued.expires_at).await?;

    let (subject, body) = mailer::verification_message(&state.config.frontend_url, &issued.plaintext);
    if let Err(e) = state.mailer.send(&user.email, &subject, &body).await {
        warn!(error = %e, email = %user.email, "verification email failed, clearing token");
        User::clear_verify_token(&state.db, user.id).await?;
        return Err(ApiError::Dependency(e.to_string()));
    }

    let keys = JwtKeys::from_ref(&state);
    let session = keys.sign(user.id)?;
    let jar = jar.add(keys.session_cookie(session.clone()));

    info!(user_id = %user.id, email = %user.email, "user registered");
    let message = format!("Confirmation email sent to {} successfully", user.email);
    Ok((
        jar,
        Json(AuthResponse {
            success: true,
            message: Some(message),
            user,
            token: session,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn verify_email(
    State(state): State<AppState>,
    Path(presented): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let hash = token::hash_token(&presented);
    let user = User::find_by_verify_token(&state.db, &hash)
        .await?
        .filter(|user| {
            // The query narrows to a candidate row; the comparison against
            // the stored hash and wall clock runs here.
            token_matches(
                &presented,
                user.verify_email_token_hash.as_deref(),
                user.verify_email_expires_at,
            )
        })
        .ok_or_else(|| {
            ApiError::InvalidOrExpiredToken("Invalid or expired email verification token".into())
        })?;

    User::mark_verified(&state.db, user.id).await?;

    info!(user_id = %user.id, "email verified");
    Ok(Json(MessageResponse::ok("Email verified successfully")))
}

/// Re-issues a verification token, overwriting any outstanding one.
#[instrument(skip(state, payload))]
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    if user.is_verified {
        return Err(ApiError::AlreadyVerified);
    }

    let issued = token::issue(token::VERIFY_EMAIL_TTL);
    User::set_verify_token(&state.db, user.id, &issued.hash, issued.expires_at).await?;

    let (subject, body) = mailer::verification_message(&state.config.frontend_url, &issued.plaintext);
    if let Err(e) = state.mailer.send(&user.email, &subject, &body).await {
        warn!(error = %e, email = %user.email, "verification email failed, clearing token");
        User::clear_verify_token(&state.db, user.id).await?;
        return Err(ApiError::Dependency(e.to_string()));
    }

    let message = format!("Verification email sent to {} successfully", user.email);
    Ok(Json(MessageResponse::ok(message)))
}

/// Checks run in order: existence, verification, password. An unverified
/// account is reported as such before the password is ever compared.
#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), ApiError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::Validation(
            "Please enter email and password".into(),
        ));
    }

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            ApiError::InvalidCredentials("Invalid email or password".into())
        })?;

    if !user.is_verified {
        warn!(user_id = %user.id, "login blocked pending verification");
        return Err(ApiError::NotVerified);
    }

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials(
            "Invalid email or password".into(),
        ));
    }

    let keys = JwtKeys::from_ref(&state);
    let session = keys.sign(user.id)?;
    let jar = jar.add(keys.session_cookie(session.clone()));

    info!(user_id = %user.id, "user logged in");
    Ok((
        jar,
        Json(AuthResponse {
            success: true,
            message: Some("Login success".into()),
            user,
            token: session,
        }),
    ))
}

/// Stateless: clears the cookie, no server-side invalidation list.
#[instrument(skip(jar))]
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    let jar = jar.add(removal_cookie());
    (jar, Json(MessageResponse::ok("Logged out successfully")))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let issued = token::issue(token::RESET_PASSWORD_TTL);
    User::set_reset_token(&state.db, user.id, &issued.hash, issued.expires_at).await?;

    let (subject, body) = mailer::reset_message(&state.config.frontend_url, &issued.plaintext);
    if let Err(e) = state.mailer.send(&user.email, &subject, &body).await {
        warn!(error = %e, email = %user.email, "reset email failed, clearing token");
        User::clear_reset_token(&state.db, user.id).await?;
        return Err(ApiError::Dependency(e.to_string()));
    }

    let message = format!("Email sent to {} successfully", user.email);
    Ok(Json(MessageResponse::ok(message)))
}

/// Token check precedes the confirmation check; a mismatch leaves the stored
/// hash and the reset token fields untouched.
#[instrument(skip(state, jar, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(presented): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), ApiError> {
    let hash = token::hash_token(&presented);
    let user = User::find_by_reset_token(&state.db, &hash)
        .await?
        .filter(|user| {
            token_matches(
                &presented,
                user.reset_password_token_hash.as_deref(),
                user.reset_password_expires_at,
            )
        })
        .ok_or_else(|| {
            ApiError::InvalidOrExpiredToken(
                "Reset password token is invalid or has expired".into(),
            )
        })?;

    if payload.password != payload.confirm_password {
        return Err(ApiError::PasswordMismatch);
    }
    validate_new_password(&payload.password)?;

    let password_hash = hash_password(&payload.password)?;
    User::reset_password(&state.db, user.id, &password_hash).await?;

    let keys = JwtKeys::from_ref(&state);
    let session = keys.sign(user.id)?;
    let jar = jar.add(keys.session_cookie(session.clone()));

    info!(user_id = %user.id, "password reset");
    Ok((
        jar,
        Json(AuthResponse {
            success: true,
            message: None,
            user,
            token: session,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(ProfileResponse {
        success: true,
        user,
    }))
}

/// Applies only the provided fields, validated as on creation.
#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    if let Some(first_name) = &payload.first_name {
        if first_name.trim().is_empty() {
            return Err(ApiError::Validation("Please enter your first name".into()));
        }
    }
    if let Some(last_name) = &payload.last_name {
        if last_name.trim().is_empty() {
            return Err(ApiError::Validation("Please enter your last name".into()));
        }
    }
    if let Some(email) = &payload.email {
        if !is_valid_email(email) {
            return Err(ApiError::Validation("Please enter a valid email".into()));
        }
    }

    let user = match User::update_profile(
        &state.db,
        user_id,
        payload.first_name.as_deref(),
        payload.last_name.as_deref(),
        payload.email.as_deref(),
    )
    .await
    {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::Conflict("Email already registered".into()))
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, "profile updated");
    Ok(Json(ProfileResponse {
        success: true,
        user,
    }))
}

#[instrument(skip(state, jar, payload))]
pub async fn update_password(
    State(state): State<AppState>,
    jar: CookieJar,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    if !verify_password(&payload.old_password, &user.password_hash)? {
        return Err(ApiError::InvalidCredentials(
            "Old password is incorrect".into(),
        ));
    }

    if payload.new_password != payload.confirm_password {
        return Err(ApiError::PasswordMismatch);
    }
    validate_new_password(&payload.new_password)?;

    let password_hash = hash_password(&payload.new_password)?;
    User::update_password(&state.db, user.id, &password_hash).await?;

    let keys = JwtKeys::from_ref(&state);
    let session = keys.sign(user.id)?;
    let jar = jar.add(keys.session_cookie(session.clone()));

    info!(user_id = %user.id, "password updated");
    Ok((
        jar,
        Json(AuthResponse {
            success: true,
            message: None,
            user,
            token: session,
        }),
    ))
}

/// Admin-only listing; password hashes and token material never serialize.
#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UsersResponse>, ApiError> {
    let caller = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    if caller.role != Role::Admin {
        return Err(ApiError::Forbidden("Admin access required".into()));
    }

    let users = User::list_all(&state.db).await?;
    Ok(Json(UsersResponse {
        success: true,
        users,
    }))
}
