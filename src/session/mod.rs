pub mod error;
pub mod manager;
pub mod store;
pub mod token;

pub use error::SessionError;
pub use manager::{SessionManager, SessionSnapshot};
pub use store::TokenStore;
pub use token::{ExpiryPolicy, SessionPhase, Token};
