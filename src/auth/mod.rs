use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<i64>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: i64, role: Role, school_id: Option<i64>, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            user_id,
            role,
            school_id,
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),

    #[error("JWT secret not configured")]
    InvalidSecret,

    #[error("school account token without school_id")]
    MissingSchool,
}

pub fn generate_jwt(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
        .map_err(|e| JwtError::InvalidToken(e.to_string()))?;

    Ok(token_data.claims)
}

/// Which students an account may see and change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessScope {
    /// District authority: every school.
    District,
    /// A single school account.
    School(i64),
}

impl AccessScope {
    pub fn from_claims(claims: &Claims) -> Result<Self, JwtError> {
        match (claims.role, claims.school_id) {
            (Role::Roo, _) => Ok(AccessScope::District),
            (Role::School, Some(school_id)) if school_id > 0 => Ok(AccessScope::School(school_id)),
            (Role::School, _) => Err(JwtError::MissingSchool),
        }
    }

    pub fn permits(&self, school_id: i64) -> bool {
        match self {
            AccessScope::District => true,
            AccessScope::School(own) => *own == school_id,
        }
    }

    /// School restriction to force onto list/export filters.
    pub fn school_filter(&self) -> Option<i64> {
        match self {
            AccessScope::District => None,
            AccessScope::School(own) => Some(*own),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn school_token_round_trips_scope() {
        let claims = Claims::new(7, Role::School, Some(12), 1);
        let token = generate_jwt(&claims, "s3cret").unwrap();
        let decoded = validate_jwt(&token, "s3cret").unwrap();

        assert_eq!(decoded.user_id, 7);
        assert_eq!(AccessScope::from_claims(&decoded).unwrap(), AccessScope::School(12));
        assert!(validate_jwt(&token, "other").is_err());
    }

    #[test]
    fn school_role_requires_school_id() {
        let claims = Claims::new(7, Role::School, None, 1);
        assert!(matches!(AccessScope::from_claims(&claims), Err(JwtError::MissingSchool)));

        let roo = Claims::new(1, Role::Roo, None, 1);
        let scope = AccessScope::from_claims(&roo).unwrap();
        assert!(scope.permits(99));
        assert_eq!(scope.school_filter(), None);
    }

    #[test]
    fn empty_secret_is_rejected() {
        let claims = Claims::new(1, Role::Roo, None, 1);
        assert!(matches!(generate_jwt(&claims, ""), Err(JwtError::InvalidSecret)));
    }
}
