use serde::{Deserialize, Serialize};

/// Key of the document holding the voting switch.
pub const VOTING_SETTING_KEY: &str = "voting";

/// The administrator-controlled voting switch. It is read afresh at the
/// start of every ballot operation; nothing caches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingSetting {
    #[serde(rename = "_id")]
    pub key: String,
    pub enabled: bool,
}
