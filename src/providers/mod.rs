mod netatmo;
mod traits;

pub use netatmo::NetatmoProvider;
pub use traits::{OAuthProvider, TokenSet};
