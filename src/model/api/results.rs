use serde::{Deserialize, Serialize};

use crate::model::mongodb::{serde_hex, Id};

/// How many registered voters have voted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turnout {
    pub registered: u64,
    pub voted: u64,
}

/// Whether voting is open, with the current turnout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingStatus {
    pub enabled: bool,
    pub turnout: Turnout,
}

/// Body of the request opening or closing voting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingToggle {
    pub enabled: bool,
}

/// The tally of every position, in ballot display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Results {
    pub positions: Vec<PositionTally>,
    pub turnout: Turnout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionTally {
    #[serde(with = "serde_hex")]
    pub position_id: Id,
    pub position: String,
    pub max_votes: u32,
    /// Most votes first.
    pub candidates: Vec<CandidateTally>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateTally {
    #[serde(with = "serde_hex")]
    pub candidate_id: Id,
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party: Option<String>,
    pub votes: u64,
    /// Currently among the position's winners.
    pub leading: bool,
}
