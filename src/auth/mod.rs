pub mod token;

pub use token::{DEFAULT_TOKEN_TTL_SECS, TokenClaims, TokenService};
