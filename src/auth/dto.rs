use serde::{Deserialize, Serialize};

use crate::auth::repo::User;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

/// Returned by register, login, reset and password-update: the session token
/// rides both in the body and in the `token` cookie.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub user: User,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub success: bool,
    pub users: Vec<User>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_decodes_camel_case() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"firstName":"A","lastName":"B","email":"a@x.com","password":"12345678"}"#,
        )
        .unwrap();
        assert_eq!(req.first_name, "A");
        assert_eq!(req.last_name, "B");
        assert_eq!(req.email, "a@x.com");
        assert_eq!(req.password, "12345678");
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let req: LoginRequest = serde_json::from_str(r#"{"email":"a@x.com"}"#).unwrap();
        assert!(req.password.is_empty());
    }

    #[test]
    fn update_profile_fields_are_optional() {
        let req: UpdateProfileRequest =
            serde_json::from_str(r#"{"firstName":"New"}"#).unwrap();
        assert_eq!(req.first_name.as_deref(), Some("New"));
        assert!(req.last_name.is_none());
        assert!(req.email.is_none());
    }

    #[test]
    fn message_response_shape() {
        let json = serde_json::to_string(&MessageResponse::ok("done")).unwrap();
        assert_eq!(json, r#"{"success":true,"message":"done"}"#);
    }
}
