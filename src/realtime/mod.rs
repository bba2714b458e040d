pub mod relay;
pub mod socket;

pub use relay::{Frame, Relay};
pub use socket::ws_handler;
