mod helpers;
mod middleware;
mod password;
mod token;

pub use helpers::{TokenValidationError, ValidatedToken, extract_bearer_token, validate_token};
pub use middleware::{AuthError, RequireAuth, effective_permissions};
pub use password::{MIN_PASSWORD_LENGTH, PasswordHasher};
pub use token::{IssuedToken, TokenGenerator, parse_token};
