//! Caller authentication and webhook ownership checks.
//!
//! Protected requests carry an HMAC-signed JWT as a bearer credential. The
//! subject claim is the caller id, trusted as-is by the ownership guard.

pub mod ownership;
pub mod token;

pub use ownership::authorize;
pub use token::{bearer_token, issue_token, validate_token, AuthError, Caller, Claims};
