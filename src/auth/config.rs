use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_jwt_algorithm")]
    pub algorithm: String,
    #[serde(default = "default_jwt_issuer")]
    pub issuer: String,
    #[serde(default = "default_jwt_audience")]
    pub audience: String,
    /// Access token lifetime in seconds
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl: u64,
    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_token_ttl")]
    pub refresh_token_ttl: u64,
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}

fn default_jwt_issuer() -> String {
    "LoginServiceAPI".to_string()
}

fn default_jwt_audience() -> String {
    "LoginServiceClient".to_string()
}

fn default_access_token_ttl() -> u64 {
    86400 // 24 hours
}

fn default_refresh_token_ttl() -> u64 {
    604800 // 7 days
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            algorithm: default_jwt_algorithm(),
            issuer: default_jwt_issuer(),
            audience: default_jwt_audience(),
            access_token_ttl: default_access_token_ttl(),
            refresh_token_ttl: default_refresh_token_ttl(),
        }
    }
}

/// Failed-login throttling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockoutConfig {
    #[serde(default = "default_max_failed_attempts")]
    pub max_failed_attempts: u64,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

fn default_max_failed_attempts() -> u64 {
    5
}

fn default_window_seconds() -> u64 {
    900 // 15 minutes
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: default_max_failed_attempts(),
            window_seconds: default_window_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordConfig {
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}
