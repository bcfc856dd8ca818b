use serde::{Deserialize, Serialize};

/// The three officer roles a party slate can fill. Every other position is
/// an ordinary seat with no officer role.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfficerRole {
    President,
    VicePresident,
    Secretary,
}

impl OfficerRole {
    /// All officer roles, in ballot display order.
    pub const ALL: [OfficerRole; 3] = [
        OfficerRole::President,
        OfficerRole::VicePresident,
        OfficerRole::Secretary,
    ];

    /// Work out which officer role (if any) a position name denotes.
    pub fn from_position_name(name: &str) -> Option<Self> {
        let name = normalize_position_name(name);
        let words: Vec<&str> = name.split(' ').collect();
        let vice = words
            .windows(2)
            .any(|pair| matches!(pair, ["vice" | "v", "president"]));
        if vice || name.contains("vicepresident") {
            Some(Self::VicePresident)
        } else if name.contains("president") && !name.contains("vice") {
            Some(Self::President)
        } else if name.contains("secretary") {
            Some(Self::Secretary)
        } else {
            None
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::President => "President",
            Self::VicePresident => "Vice President",
            Self::Secretary => "Secretary",
        }
    }
}

/// Sort key placing officer positions first, in role order, ahead of all
/// other positions.
pub fn display_rank(position_name: &str) -> u8 {
    match OfficerRole::from_position_name(position_name) {
        Some(OfficerRole::President) => 0,
        Some(OfficerRole::VicePresident) => 1,
        Some(OfficerRole::Secretary) => 2,
        None => 3,
    }
}

/// Normalise a position name for comparison: trimmed, lower case, with runs
/// of whitespace and hyphens collapsed to a single space.
pub fn normalize_position_name(name: &str) -> String {
    name.split(|c: char| c.is_whitespace() || c == '-')
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
