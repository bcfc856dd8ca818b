use argon2::{Config, Error as Argon2Error};
use rand::Rng;

/// Shortest password accepted for any account.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password with a fresh random salt, in argon2's encoded format.
pub fn hash_password<T: AsRef<[u8]>>(password: T) -> Result<String, Argon2Error> {
    // 16 bytes is recommended for password hashing:
    //  https://en.wikipedia.org/wiki/Argon2
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    argon2::hash_encoded(password.as_ref(), &salt, &Config::default())
}

/// Check a password against an encoded hash. A malformed hash never matches.
pub fn verify_password<T: AsRef<[u8]>>(hash: &str, password: T) -> bool {
    argon2::verify_encoded(hash, password.as_ref()).unwrap_or(false)
}
