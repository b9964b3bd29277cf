pub use oauth::GoogleOAuth;
pub use session::{SessionStore, SESSION_COOKIE};
pub use user::{GoogleUser, UserProfile};

mod oauth;
mod session;
mod user;
