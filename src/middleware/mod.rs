pub mod auth;
pub mod ownership;

pub use auth::AuthUser;
pub use ownership::{OwnedCharacter, VisibleCharacter};
