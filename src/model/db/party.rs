use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A team or slate grouping candidates.
///
/// Officers are not stored here: they are looked up from the candidates
/// affiliated with the party, by the officer role of their position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyCore {
    /// Unique name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A party without an ID.
pub type NewParty = PartyCore;

/// A party from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub party: PartyCore,
}

impl Deref for Party {
    type Target = PartyCore;

    fn deref(&self) -> &Self::Target {
        &self.party
    }
}

impl DerefMut for Party {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.party
    }
}
