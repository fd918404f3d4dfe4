//! OAuth credential storage and the access token lifecycle.

pub mod authority;
pub mod credentials;

pub use authority::{AccessToken, AccessTokenSource, StaticToken, TokenAuthority};
pub use credentials::{CredentialStore, Credentials};
