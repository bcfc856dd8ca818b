use std::{collections::HashMap, ops::Deref};

use serde::{Deserialize, Serialize};

use crate::model::{
    common::officer::OfficerRole,
    mongodb::{serde_hex, serde_hex_map, Id},
};

/// The ballot presented to a voter: every position open for voting, in
/// display order, with its candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotView {
    pub positions: Vec<BallotPosition>,
}

impl BallotView {
    /// Find a position on the ballot.
    pub fn position(&self, id: Id) -> Option<&BallotPosition> {
        self.positions.iter().find(|p| p.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotPosition {
    #[serde(with = "serde_hex")]
    pub id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Set for president, vice president and secretary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub officer_role: Option<OfficerRole>,
    pub max_votes: u32,
    pub candidates: Vec<BallotCandidate>,
}

impl BallotPosition {
    pub fn candidate(&self, id: Id) -> Option<&BallotCandidate> {
        self.candidates.iter().find(|c| c.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotCandidate {
    #[serde(with = "serde_hex")]
    pub id: Id,
    pub name: String,
    /// Name of the candidate's party, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

/// A voter's choices: position ID to candidate ID, as a JSON object of hex
/// strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selections(#[serde(with = "serde_hex_map")] pub HashMap<Id, Id>);

impl Deref for Selections {
    type Target = HashMap<Id, Id>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromIterator<(Id, Id)> for Selections {
    fn from_iter<T: IntoIterator<Item = (Id, Id)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The choices on a ballot, position by position in display order, for the
/// voter to confirm or as a receipt once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub selections: Vec<ConfirmedSelection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedSelection {
    #[serde(with = "serde_hex")]
    pub position_id: Id,
    pub position: String,
    #[serde(with = "serde_hex")]
    pub candidate_id: Id,
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party: Option<String>,
}

impl Confirmation {
    /// Position name to candidate name.
    pub fn by_position(&self) -> HashMap<&str, &str> {
        self.selections
            .iter()
            .map(|s| (s.position.as_str(), s.candidate.as_str()))
            .collect()
    }
}
