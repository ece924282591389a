pub mod login_attempts;
pub mod refresh_tokens;
pub mod users;

pub use login_attempts::Entity as LoginAttempts;
pub use refresh_tokens::Entity as RefreshTokens;
pub use users::Entity as Users;

pub use login_attempts::NewLoginAttempt;
pub use users::{NewUser, UserProfile};

// Type aliases
pub type UserRecord = users::Model;
pub type LoginAttemptRecord = login_attempts::Model;
pub type RefreshTokenRecord = refresh_tokens::Model;
