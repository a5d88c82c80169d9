pub mod fetch;

pub use fetch::{Authenticator, Credential, HttpAuthenticator, Lifetime};
