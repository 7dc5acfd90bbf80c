//! API request and response types

use crate::models::UserRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Password change for the signed-in user
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8 to 128 characters"))]
    pub new_password: String,
}

/// Account creation (admin only)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub firstname: String,
    #[validate(length(min = 1, max = 100))]
    pub lastname: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8 to 128 characters"))]
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
}

/// User profile response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

/// A question/answer pair in its display position
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionAnswerPair {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    pub position: i32,
}

/// New question/answer pair, appended at the end of the list
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateQuestionAnswerPair {
    #[validate(length(min = 1, max = 500))]
    pub question: String,
    #[validate(length(min = 1, max = 5000))]
    pub answer: String,
}

/// Move a question/answer pair to a new position
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RepositionRequest {
    #[validate(range(min = 0, message = "Position cannot be negative"))]
    pub position: i32,
}
