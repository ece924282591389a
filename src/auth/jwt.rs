use crate::auth::config::JwtConfig;
use crate::database::entities::UserRecord;
use crate::error::AppError;
use crate::health::{HealthCheckResult, HealthChecker};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error as JwtError,
};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use serde::{Deserialize, Serialize};

pub fn parse_algorithm(alg: &str) -> Result<Algorithm, AppError> {
    Algorithm::from_str(alg)
        .map_err(|_| AppError::BadRequest(format!("Unsupported JWT algorithm: {}", alg)))
}

fn create_decoding_key(key_data: &str, algorithm: Algorithm) -> Result<DecodingKey, AppError> {
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            Ok(DecodingKey::from_secret(key_data.as_ref()))
        }
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => DecodingKey::from_rsa_pem(key_data.as_bytes())
            .map_err(|_| AppError::Internal("Invalid RSA key format".to_string())),
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(key_data.as_bytes())
            .map_err(|_| AppError::Internal("Invalid EC key format".to_string())),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(key_data.as_bytes())
            .map_err(|_| AppError::Internal("Invalid EdDSA key format".to_string())),
    }
}

fn create_encoding_key(key_data: &str, algorithm: Algorithm) -> Result<EncodingKey, AppError> {
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            Ok(EncodingKey::from_secret(key_data.as_ref()))
        }
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => EncodingKey::from_rsa_pem(key_data.as_bytes())
            .map_err(|_| AppError::Internal("Invalid RSA key format".to_string())),
        Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(key_data.as_bytes())
            .map_err(|_| AppError::Internal("Invalid EC key format".to_string())),
        Algorithm::EdDSA => EncodingKey::from_ed_pem(key_data.as_bytes())
            .map_err(|_| AppError::Internal("Invalid EdDSA key format".to_string())),
    }
}

/// Access token claims. `sub` is the database user ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: i32,
    pub email: String,
    pub jti: String,
    pub username: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl AccessClaims {
    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

/// JWT service trait for dependency injection and testing
pub trait JwtService: Send + Sync {
    /// Build the claims of a fresh access token for `user`, with a new `jti`
    fn claims_for(&self, user: &UserRecord, issued_at: DateTime<Utc>) -> AccessClaims;

    /// Sign claims into a compact token
    fn create_access_token(&self, claims: &AccessClaims) -> Result<String, JwtError>;

    /// Validate signature, expiry, issuer and audience
    fn validate_access_token(&self, token: &str) -> Result<AccessClaims, JwtError>;

    fn algorithm(&self) -> Algorithm;
}

#[derive(Clone)]
pub struct JwtServiceImpl {
    algorithm: Algorithm,
    issuer: String,
    audience: String,
    access_token_ttl: u64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtServiceImpl {
    pub fn new(config: &JwtConfig) -> Result<Self, AppError> {
        let algorithm = parse_algorithm(&config.algorithm)?;
        if config.secret.is_empty() {
            return Err(AppError::Internal(
                "JWT secret (jwt.secret) must be configured".to_string(),
            ));
        }

        let encoding_key = create_encoding_key(&config.secret, algorithm)?;
        let decoding_key = create_decoding_key(&config.secret, algorithm)?;

        Ok(Self {
            algorithm,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_token_ttl: config.access_token_ttl,
            encoding_key,
            decoding_key,
        })
    }

    /// Create a health checker for this JWT service
    pub fn health_checker(&self) -> Arc<JwtHealthChecker> {
        Arc::new(JwtHealthChecker {
            service: self.clone(),
        })
    }
}

impl JwtService for JwtServiceImpl {
    fn claims_for(&self, user: &UserRecord, issued_at: DateTime<Utc>) -> AccessClaims {
        let iat = issued_at.timestamp();
        AccessClaims {
            sub: user.id,
            email: user.email.clone(),
            jti: Uuid::new_v4().to_string(),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat,
            exp: iat + self.access_token_ttl as i64,
        }
    }

    fn create_access_token(&self, claims: &AccessClaims) -> Result<String, JwtError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
    }

    fn validate_access_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        decode::<AccessClaims>(token, &self.decoding_key, &validation).map(|data| data.claims)
    }

    fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

/// Health checker implementation for JWT service
pub struct JwtHealthChecker {
    service: JwtServiceImpl,
}

#[async_trait]
impl HealthChecker for JwtHealthChecker {
    fn name(&self) -> &str {
        "jwt"
    }

    async fn check(&self) -> HealthCheckResult {
        let now = Utc::now().timestamp();
        let probe = AccessClaims {
            sub: 0,
            email: "health@localhost".to_string(),
            jti: Uuid::new_v4().to_string(),
            username: "health".to_string(),
            full_name: "Health Check".to_string(),
            iss: self.service.issuer.clone(),
            aud: self.service.audience.clone(),
            iat: now,
            exp: now + 60,
        };

        let algorithm = format!("{:?}", self.service.algorithm);
        let round_trip = self
            .service
            .create_access_token(&probe)
            .and_then(|token| self.service.validate_access_token(&token));

        match round_trip {
            Ok(claims) if claims.jti == probe.jti => {
                HealthCheckResult::healthy_with_details(serde_json::json!({
                    "algorithm": algorithm,
                    "round_trip": "success"
                }))
            }
            Ok(_) => HealthCheckResult::unhealthy_with_details(
                "Token validation returned incorrect claims".to_string(),
                serde_json::json!({ "algorithm": algorithm, "round_trip": "claims mismatch" }),
            ),
            Err(err) => HealthCheckResult::unhealthy_with_details(
                "JWT round trip failed".to_string(),
                serde_json::json!({ "algorithm": algorithm, "error": err.to_string() }),
            ),
        }
    }
}
