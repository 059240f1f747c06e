//! HS256 bearer tokens identifying the post author.

use chrono::{TimeDelta, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quill_core::ports::{AuthError, TokenClaims, TokenService};

const DEV_SECRET: &str = "change-me-in-production";

/// Clock skew tolerated when checking `exp`, in seconds.
const LEEWAY_SECS: u64 = 30;

/// Signing secret, token lifetime and issuer name.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
    pub issuer: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: DEV_SECRET.to_string(),
            expiration_hours: 24,
            issuer: "quill-api".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    email: String,
    iss: String,
    iat: i64,
    exp: i64,
}

pub struct JwtTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtTokenService {
    pub fn new(config: JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.leeway = LEEWAY_SECS;

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            config,
        }
    }

    /// Whether the built-in development secret is in use.
    pub fn uses_default_secret(&self) -> bool {
        self.config.secret == DEV_SECRET
    }
}

fn decode_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidSignature => AuthError::InvalidToken("Signature mismatch".to_string()),
        ErrorKind::InvalidIssuer => AuthError::InvalidToken("Unexpected issuer".to_string()),
        ErrorKind::MissingRequiredClaim(claim) => {
            AuthError::InvalidToken(format!("Missing claim '{claim}'"))
        }
        _ => AuthError::InvalidToken("Malformed token".to_string()),
    }
}

impl TokenService for JwtTokenService {
    fn generate_token(&self, user_id: Uuid, email: &str) -> Result<String, AuthError> {
        let issued = Utc::now();
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iss: self.config.issuer.clone(),
            iat: issued.timestamp(),
            exp: (issued + TimeDelta::hours(self.config.expiration_hours)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    fn validate_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(decode_error)?
            .claims;

        Ok(TokenClaims {
            user_id: claims.sub,
            email: claims.email,
            exp: claims.exp,
        })
    }

    fn expiration_seconds(&self) -> i64 {
        self.config.expiration_hours * 3600
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(secret: &str, issuer: &str, hours: i64) -> JwtTokenService {
        JwtTokenService::new(JwtConfig {
            secret: secret.to_string(),
            expiration_hours: hours,
            issuer: issuer.to_string(),
        })
    }

    #[test]
    fn test_token_identifies_author() {
        let tokens = service("s3cret", "quill-test", 1);
        let author = Uuid::new_v4();

        let token = tokens.generate_token(author, "ada@example.com").unwrap();
        let claims = tokens.validate_token(&token).unwrap();

        assert_eq!(claims.user_id, author);
        assert_eq!(claims.email, "ada@example.com");
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn test_tampered_token_rejected() {
        let tokens = service("s3cret", "quill-test", 1);
        let token = tokens.generate_token(Uuid::new_v4(), "a@b.c").unwrap();
        let other = tokens.generate_token(Uuid::new_v4(), "x@y.z").unwrap();

        // Another user's payload under this token's signature.
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = other.split('.').nth(1).unwrap();
        let forged = parts.join(".");

        assert!(matches!(
            tokens.validate_token(&forged),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_foreign_secret_or_issuer_rejected() {
        let ours = service("s3cret", "quill-test", 1);
        let other_secret = service("other", "quill-test", 1);
        let other_issuer = service("s3cret", "someone-else", 1);

        for foreign in [&other_secret, &other_issuer] {
            let token = foreign.generate_token(Uuid::new_v4(), "a@b.c").unwrap();
            assert!(matches!(
                ours.validate_token(&token),
                Err(AuthError::InvalidToken(_))
            ));
        }
    }

    #[test]
    fn test_garbage_rejected() {
        let tokens = service("s3cret", "quill-test", 1);
        assert!(matches!(
            tokens.validate_token("not.a.jwt"),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = service("s3cret", "quill-test", -2);
        let token = tokens.generate_token(Uuid::new_v4(), "late@example.com").unwrap();

        assert!(matches!(
            tokens.validate_token(&token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn test_default_secret_detected() {
        assert!(JwtTokenService::new(JwtConfig::default()).uses_default_secret());
        assert!(!service("s3cret", "quill-test", 1).uses_default_secret());
    }

    #[test]
    fn test_expiration_seconds() {
        assert_eq!(service("s", "i", 24).expiration_seconds(), 86_400);
    }
}
