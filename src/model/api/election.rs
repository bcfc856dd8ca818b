//! Positions, parties and candidates as administrators create and see them.

use serde::{Deserialize, Serialize};

use crate::model::{
    common::officer::OfficerRole,
    db::{
        candidate::{Candidate, NewCandidate},
        party::{NewParty, Party},
        position::{NewPosition, Position},
    },
    mongodb::{serde_hex, Id},
};

fn default_max_votes() -> u32 {
    1
}

/// Trim an optional free-text field, treating blank as absent.
fn non_blank(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

/// A new position, as submitted by an administrator.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PositionSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_max_votes")]
    pub max_votes: u32,
}

impl TryFrom<PositionSpec> for NewPosition {
    type Error = String;

    fn try_from(spec: PositionSpec) -> Result<Self, Self::Error> {
        let name = spec.name.trim().to_string();
        if name.is_empty() {
            return Err("Position name is required".to_string());
        }
        if spec.max_votes < 1 {
            return Err("A position must have at least one winner".to_string());
        }
        Ok(Self {
            name,
            description: non_blank(spec.description),
            max_votes: spec.max_votes,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionDescription {
    #[serde(with = "serde_hex")]
    pub id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub max_votes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub officer_role: Option<OfficerRole>,
}

impl From<Position> for PositionDescription {
    fn from(position: Position) -> Self {
        let officer_role = position.officer_role();
        Self {
            id: position.id,
            name: position.position.name,
            description: position.position.description,
            max_votes: position.position.max_votes,
            officer_role,
        }
    }
}

/// A new party, as submitted by an administrator.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PartySpec {
    pub name: String,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl TryFrom<PartySpec> for NewParty {
    type Error = String;

    fn try_from(spec: PartySpec) -> Result<Self, Self::Error> {
        let name = spec.name.trim().to_string();
        if name.is_empty() {
            return Err("Party name is required".to_string());
        }
        Ok(Self {
            name,
            team_name: non_blank(spec.team_name),
            description: non_blank(spec.description),
        })
    }
}

/// One of a party's officers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyOfficer {
    pub role: OfficerRole,
    #[serde(with = "serde_hex")]
    pub candidate_id: Id,
    pub candidate: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyDescription {
    #[serde(with = "serde_hex")]
    pub id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// President, vice president and secretary, where the party fields them.
    pub officers: Vec<PartyOfficer>,
}

impl PartyDescription {
    /// Describe a party, looking up its officers among the given positions
    /// and candidates (both in creation order).
    ///
    /// The officer for a role is the party's first candidate running for a
    /// position with that role.
    pub fn new(party: Party, positions: &[Position], candidates: &[Candidate]) -> Self {
        let officers = OfficerRole::ALL
            .iter()
            .filter_map(|&role| {
                candidates
                    .iter()
                    .filter(|c| c.party_id == Some(party.id))
                    .find(|c| {
                        positions
                            .iter()
                            .find(|p| p.id == c.position_id)
                            .and_then(|p| p.officer_role())
                            == Some(role)
                    })
                    .map(|c| PartyOfficer {
                        role,
                        candidate_id: c.id,
                        candidate: c.name.clone(),
                    })
            })
            .collect();
        Self {
            id: party.id,
            name: party.party.name,
            team_name: party.party.team_name,
            description: party.party.description,
            officers,
        }
    }
}

/// A new candidate, as submitted by an administrator.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CandidateSpec {
    pub name: String,
    #[serde(with = "serde_hex")]
    pub position_id: Id,
    #[serde(default, with = "serde_hex::option")]
    pub party_id: Option<Id>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
}

impl TryFrom<CandidateSpec> for NewCandidate {
    type Error = String;

    /// Check the candidate is named. Whether the position and party exist is
    /// up to the caller.
    fn try_from(spec: CandidateSpec) -> Result<Self, Self::Error> {
        let name = spec.name.trim().to_string();
        if name.is_empty() {
            return Err("Candidate name is required".to_string());
        }
        Ok(Self {
            name,
            position_id: spec.position_id,
            party_id: spec.party_id,
            bio: non_blank(spec.bio),
            photo: non_blank(spec.photo),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    #[serde(with = "serde_hex")]
    pub id: Id,
    pub name: String,
    #[serde(with = "serde_hex")]
    pub position_id: Id,
    #[serde(default, with = "serde_hex::option")]
    pub party_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id,
            name: candidate.candidate.name,
            position_id: candidate.candidate.position_id,
            party_id: candidate.candidate.party_id,
            bio: candidate.candidate.bio,
            photo: candidate.candidate.photo,
        }
    }
}
