use rocket::FromForm;
use serde::{Deserialize, Serialize};

use crate::model::{
    auth::{hash_password, MIN_PASSWORD_LENGTH},
    common::profile::{Strand, VoterProfile},
    db::voter::{NewVoter, Voter},
    mongodb::{serde_hex, Id},
};

/// Login details for a voter. `login` is either the username or the
/// voter's school ID number.
#[derive(Clone, Deserialize, Serialize)]
pub struct VoterCredentials {
    pub login: String,
    pub password: String,
}

/// A self-registration request.
#[derive(Clone, Deserialize, Serialize)]
pub struct VoterRegistration {
    pub username: String,
    pub password: String,
    pub profile: VoterProfile,
}

impl TryFrom<VoterRegistration> for NewVoter {
    type Error = String;

    /// Validate the registration and hash the password.
    fn try_from(registration: VoterRegistration) -> Result<Self, Self::Error> {
        let username = registration.username.trim().to_string();
        if username.is_empty() {
            return Err("Username is required".to_string());
        }
        if registration.password.len() < MIN_PASSWORD_LENGTH {
            return Err(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            ));
        }
        let profile = registration.profile.validated()?;
        let password_hash = hash_password(&registration.password).map_err(|e| e.to_string())?;
        Ok(NewVoter::new(username, password_hash, profile))
    }
}

/// What a voter sees about themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterInfo {
    #[serde(with = "serde_hex")]
    pub id: Id,
    pub username: String,
    pub profile: VoterProfile,
    pub has_voted: bool,
}

impl From<Voter> for VoterInfo {
    fn from(voter: Voter) -> Self {
        Self {
            id: voter.id,
            username: voter.voter.username,
            profile: voter.voter.profile,
            has_voted: voter.voter.has_voted,
        }
    }
}

/// Roster filters; each one given must match.
#[derive(Debug, Default, FromForm)]
pub struct VoterFilter {
    pub grade_level: Option<u8>,
    pub strand: Option<Strand>,
    pub has_voted: Option<bool>,
}

impl VoterFilter {
    pub fn matches(&self, voter: &Voter) -> bool {
        self.grade_level
            .map_or(true, |grade| voter.profile.grade_level == grade)
            && self
                .strand
                .map_or(true, |strand| voter.profile.strand == Some(strand))
            && self
                .has_voted
                .map_or(true, |has_voted| voter.has_voted == has_voted)
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl VoterRegistration {
        pub fn example() -> Self {
            Self {
                username: "juan".into(),
                password: "password123".into(),
                profile: VoterProfile::example(),
            }
        }
    }

    impl VoterCredentials {
        pub fn example() -> Self {
            Self {
                login: "juan".into(),
                password: "password123".into(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_checks_password_and_profile() {
        let mut registration = VoterRegistration::example();
        registration.password = "1234567".into();
        assert!(NewVoter::try_from(registration).is_err());

        let mut registration = VoterRegistration::example();
        registration.profile.grade_level = 13;
        assert!(NewVoter::try_from(registration).is_err());

        let voter = NewVoter::try_from(VoterRegistration::example()).unwrap();
        assert!(!voter.has_voted);
        assert!(voter.verify_password("password123"));
    }

    #[test]
    fn filters_combine() {
        let voter = Voter {
            id: Id::new(),
            voter: NewVoter::example(),
        };
        assert!(VoterFilter::default().matches(&voter));

        let filter = VoterFilter {
            grade_level: Some(11),
            strand: Some(Strand::Stem),
            has_voted: Some(false),
        };
        assert!(filter.matches(&voter));

        let filter = VoterFilter {
            strand: Some(Strand::Abm),
            ..VoterFilter::default()
        };
        assert!(!filter.matches(&voter));

        let filter = VoterFilter {
            grade_level: Some(11),
            has_voted: Some(true),
            ..VoterFilter::default()
        };
        assert!(!filter.matches(&voter));
    }
}
