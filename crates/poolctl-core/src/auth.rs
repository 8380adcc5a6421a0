use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Plain acknowledgement body, e.g. `{"message": "registered"}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

/// Registration form as typed by the user, before local validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterForm {
    /// Validate locally and build the request body. The confirmation field
    /// never leaves the client.
    pub fn into_request(self) -> Result<RegisterRequest, CoreError> {
        let username = self.username.trim().to_string();
        if username.is_empty() {
            return Err(CoreError::InvalidInput("username is required".into()));
        }
        if self.password != self.confirm_password {
            return Err(CoreError::InvalidInput("passwords do not match".into()));
        }
        let email = self.email.trim();
        Ok(RegisterRequest {
            username,
            password: self.password,
            email: (!email.is_empty()).then(|| email.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(password: &str, confirm: &str) -> RegisterForm {
        RegisterForm {
            username: " carol ".into(),
            email: String::new(),
            password: password.into(),
            confirm_password: confirm.into(),
        }
    }

    #[test]
    fn mismatched_passwords_are_rejected() {
        let err = form("secret-one", "secret-two").into_request().unwrap_err();
        assert_eq!(err, CoreError::InvalidInput("passwords do not match".into()));
    }

    #[test]
    fn valid_form_drops_confirmation_and_blank_email() {
        let req = form("hunter22", "hunter22").into_request().unwrap();
        assert_eq!(req.username, "carol");
        assert_eq!(req.email, None);
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "username": "carol", "password": "hunter22" })
        );
    }

    #[test]
    fn blank_username_is_rejected() {
        let mut f = form("a", "a");
        f.username = "   ".into();
        assert!(f.into_request().is_err());
    }
}
