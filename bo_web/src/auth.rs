//! ABOUTME: Authentication utilities for password hashing and session tokens
//! ABOUTME: Argon2 password verification and the JWT carried in the session cookie

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use bo_core::{Error, Result};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument};

/// Name of the cookie holding the session token
pub const SESSION_COOKIE: &str = "auth_token";

/// Session token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User primary key
    pub sub: String,
    pub username: String,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// Password hashing utilities
pub struct PasswordAuth;

impl PasswordAuth {
    /// Hash a password using Argon2
    #[instrument(skip(password))]
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Auth(format!("Failed to hash password: {}", e)))?
            .to_string();

        debug!("Password hashed successfully");
        Ok(password_hash)
    }

    /// Verify a password against a hash; malformed hashes never match
    #[instrument(skip(password, hash))]
    pub fn verify_password(password: &str, hash: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(hash) else {
            debug!("Stored password hash is not a valid PHC string");
            return false;
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// JWT token utilities
pub struct JwtAuth;

impl JwtAuth {
    /// Session lifetime in seconds (two weeks)
    const TOKEN_EXPIRATION_SECS: u64 = 14 * 24 * 60 * 60;

    #[instrument(skip(username, secret))]
    pub fn create_token(user_id: i64, username: &str, secret: &str) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::Auth(format!("Time error: {}", e)))?
            .as_secs() as usize;

        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            exp: now + Self::TOKEN_EXPIRATION_SECS as usize,
            iat: now,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_ref()),
        )
        .map_err(|e| Error::Auth(format!("Failed to create JWT: {}", e)))
    }

    #[instrument(skip(token, secret))]
    pub fn verify_token(token: &str, secret: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|e| Error::Auth(format!("Invalid JWT: {}", e)))?;

        Ok(token_data.claims)
    }

    pub fn token_expiration_secs() -> u64 {
        Self::TOKEN_EXPIRATION_SECS
    }
}
