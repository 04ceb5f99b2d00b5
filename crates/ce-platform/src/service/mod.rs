//! Service Layer
//!
//! Token issuance/verification and password hashing.

pub mod password;
pub mod token;

pub use password::PasswordService;
pub use token::{extract_bearer_token, Claims, TokenConfig, TokenService};
