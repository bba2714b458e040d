pub mod character;
pub mod character_input;
pub mod session;
pub mod token;
pub mod user;

pub use character::{CharacterSheet, CharacterSummary};
pub use session::{GameSession, SessionDetail};
pub use token::Token;
pub use user::{User, UserRecord};
