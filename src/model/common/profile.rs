use std::fmt::Display;

use rocket::FromFormField;
use serde::{Deserialize, Serialize};

/// Lowest and highest grade levels of enrolled students.
pub const MIN_GRADE_LEVEL: u8 = 7;
pub const MAX_GRADE_LEVEL: u8 = 12;

/// Senior high school academic strands. Form values match case-insensitively.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, FromFormField)]
#[serde(rename_all = "UPPERCASE")]
pub enum Strand {
    Stem,
    Abm,
    Humss,
    Gas,
    Tvl,
}

impl Display for Strand {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Stem => "STEM",
                Self::Abm => "ABM",
                Self::Humss => "HUMSS",
                Self::Gas => "GAS",
                Self::Tvl => "TVL",
            }
        )
    }
}

/// Personal details of a voter. Editable at any time, including after voting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterProfile {
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub last_name: String,
    pub grade_level: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strand: Option<Strand>,
    pub id_number: String,
}

impl VoterProfile {
    /// Check the profile is complete and consistent, normalising it on success.
    ///
    /// Strands only exist in senior high (grades 11 and 12); a strand given
    /// for any other grade is dropped.
    pub fn validated(mut self) -> Result<Self, String> {
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        self.id_number = self.id_number.trim().to_string();
        self.middle_name = self
            .middle_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        if self.first_name.is_empty() || self.last_name.is_empty() {
            return Err("First and last name are required".to_string());
        }
        if self.id_number.is_empty() {
            return Err("ID number is required".to_string());
        }
        if !(MIN_GRADE_LEVEL..=MAX_GRADE_LEVEL).contains(&self.grade_level) {
            return Err(format!(
                "Grade level must be between {MIN_GRADE_LEVEL} and {MAX_GRADE_LEVEL}"
            ));
        }
        if self.grade_level < 11 {
            self.strand = None;
        }
        Ok(self)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strand_dropped_below_senior_high() {
        let profile = VoterProfile {
            grade_level: 8,
            strand: Some(Strand::Abm),
            ..VoterProfile::example()
        };
        let profile = profile.validated().unwrap();
        assert_eq!(profile.strand, None);
    }

    #[test]
    fn strand_kept_in_senior_high() {
        let profile = VoterProfile::example().validated().unwrap();
        assert_eq!(profile.strand, Some(Strand::Stem));
    }

    #[test]
    fn invalid_profiles_rejected() {
        let no_name = VoterProfile {
            first_name: "   ".to_string(),
            ..VoterProfile::example()
        };
        assert!(no_name.validated().is_err());

        let bad_grade = VoterProfile {
            grade_level: 13,
            ..VoterProfile::example()
        };
        assert!(bad_grade.validated().is_err());

        let no_id = VoterProfile {
            id_number: "".to_string(),
            ..VoterProfile::example()
        };
        assert!(no_id.validated().is_err());
    }

    #[test]
    fn blank_middle_name_becomes_none() {
        let profile = VoterProfile {
            middle_name: Some("  ".to_string()),
            ..VoterProfile::example()
        };
        assert_eq!(profile.validated().unwrap().middle_name, None);
    }
}
