use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    SuperAdmin,
    SchoolAdmin,
    Student,
}

impl Role {
    /// Roles whose every request must be confined to their own school.
    pub fn is_tenant_scoped(self) -> bool {
        matches!(self, Role::SchoolAdmin | Role::Student)
    }
}

/// Bearer token claims issued by the campus auth service.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub role: Role,
    #[serde(default)]
    pub school: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

/// The authenticated user acting on the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
    pub school_id: Option<String>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, role: Role, school_id: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            school_id,
        }
    }

    /// Verifies an HS256 token and builds the session from its claims.
    pub fn from_token(token: &str, secret: &str) -> AppResult<Self> {
        let data = jsonwebtoken::decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| AppError::InvalidSession(e.to_string()))?;

        Ok(Self::from(data.claims))
    }
}

impl From<SessionClaims> for Session {
    fn from(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.sub,
            role: claims.role,
            school_id: claims.school.filter(|s| !s.is_empty()),
        }
    }
}
