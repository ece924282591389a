pub mod config;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod request_context;
pub mod service;

pub use jwt::*;
pub use middleware::*;
pub use request_context::*;
pub use service::{AuthError, AuthResult, AuthService, AuthSettings, LoginResponse, Registration};
