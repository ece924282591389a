pub mod login_attempts;
pub mod refresh_tokens;
pub mod users;

pub use login_attempts::LoginAttemptsDao;
pub use refresh_tokens::RefreshTokensDao;
pub use users::UsersDao;
