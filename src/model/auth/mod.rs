//! Identity: who the current principal is, and whether they administer the
//! election.

mod password;
mod token;
mod user;

pub use password::{hash_password, verify_password, MIN_PASSWORD_LENGTH};
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
pub use user::{Rights, User};
