use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{common::profile::VoterProfile, mongodb::Id};

/// Core voter data, as stored in the database.
///
/// The credentials live alongside the profile: each voter is exactly one
/// principal of the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    pub username: String,
    pub password_hash: String,
    #[serde(flatten)]
    pub profile: VoterProfile,
    /// Set once, by a successful ballot commit. Never cleared.
    pub has_voted: bool,
}

impl VoterCore {
    /// Create a new voter who has not yet voted.
    pub fn new(username: String, password_hash: String, profile: VoterProfile) -> Self {
        Self {
            username,
            password_hash,
            profile,
            has_voted: false,
        }
    }

    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        crate::model::auth::verify_password(&self.password_hash, password)
    }
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use crate::model::auth::hash_password;

    impl VoterCore {
        pub fn example() -> Self {
            Self::new(
                "juan".to_string(),
                hash_password("password123").unwrap(),
                VoterProfile::example(),
            )
        }

        pub fn example2() -> Self {
            Self::new(
                "maria".to_string(),
                hash_password("password456").unwrap(),
                VoterProfile::example2(),
            )
        }
    }
}
