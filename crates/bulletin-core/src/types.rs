use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// DeployPhase
// ---------------------------------------------------------------------------

/// Increment of the installation being deployed.
///
/// Phase 2 layers the liturgical calendar and lectionary modules on top of
/// a Phase 1 installation and requires its files to be in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployPhase {
    Base,
    Lectionary,
}

impl DeployPhase {
    pub fn number(self) -> u8 {
        match self {
            DeployPhase::Base => 1,
            DeployPhase::Lectionary => 2,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(DeployPhase::Base),
            2 => Some(DeployPhase::Lectionary),
            _ => None,
        }
    }
}

impl fmt::Display for DeployPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployPhase::Base => write!(f, "phase 1 (base generation)"),
            DeployPhase::Lectionary => write!(f, "phase 2 (calendar + lectionary)"),
        }
    }
}

// ---------------------------------------------------------------------------
// HymnPosition
// ---------------------------------------------------------------------------

/// Slot in the service a hymn selection is sung at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HymnPosition {
    #[serde(rename = "opening")]
    Opening,
    #[serde(rename = "sequence")]
    Sequence,
    #[serde(rename = "communion-1")]
    Communion1,
    #[serde(rename = "communion-2")]
    Communion2,
    #[serde(rename = "closing")]
    Closing,
}

impl HymnPosition {
    pub fn all() -> &'static [HymnPosition] {
        &[
            HymnPosition::Opening,
            HymnPosition::Sequence,
            HymnPosition::Communion1,
            HymnPosition::Communion2,
            HymnPosition::Closing,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HymnPosition::Opening => "opening",
            HymnPosition::Sequence => "sequence",
            HymnPosition::Communion1 => "communion-1",
            HymnPosition::Communion2 => "communion-2",
            HymnPosition::Closing => "closing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|p| p.as_str() == s)
    }
}

impl fmt::Display for HymnPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_numbers_roundtrip() {
        for phase in [DeployPhase::Base, DeployPhase::Lectionary] {
            assert_eq!(DeployPhase::from_number(phase.number()), Some(phase));
        }
        assert_eq!(DeployPhase::from_number(3), None);
    }

    #[test]
    fn hymn_positions_parse() {
        assert_eq!(HymnPosition::parse("communion-2"), Some(HymnPosition::Communion2));
        assert_eq!(HymnPosition::parse("offertory"), None);
        let json = serde_json::to_string(&HymnPosition::Communion1).unwrap();
        assert_eq!(json, "\"communion-1\"");
    }
}
