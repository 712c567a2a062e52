use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Gold purity grade used as the price dimension key.
///
/// The set is fixed; karats are never created or destroyed at runtime.
/// Serialized as the bare purity number (`18`, `21`, ...) to match the
/// price endpoint payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Karat {
    K18,
    K21,
    K22,
    K24,
}

impl Karat {
    /// Every supported karat, lowest purity first.
    pub const ALL: [Karat; 4] = [Karat::K18, Karat::K21, Karat::K22, Karat::K24];

    /// Purity in karats.
    pub fn purity(self) -> u8 {
        match self {
            Self::K18 => 18,
            Self::K21 => 21,
            Self::K22 => 22,
            Self::K24 => 24,
        }
    }

    /// Display label, e.g. `"18k"`.
    pub fn label(self) -> &'static str {
        match self {
            Self::K18 => "18k",
            Self::K21 => "21k",
            Self::K22 => "22k",
            Self::K24 => "24k",
        }
    }
}

impl TryFrom<u8> for Karat {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            18 => Ok(Self::K18),
            21 => Ok(Self::K21),
            22 => Ok(Self::K22),
            24 => Ok(Self::K24),
            other => Err(format!("Unsupported karat: {}", other)),
        }
    }
}

impl From<Karat> for u8 {
    fn from(karat: Karat) -> Self {
        karat.purity()
    }
}

impl FromStr for Karat {
    type Err = String;

    /// Accepts both `"18"` and `"18k"` (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_suffix('k')
            .or_else(|| trimmed.strip_suffix('K'))
            .unwrap_or(trimmed);
        let purity: u8 = digits
            .parse()
            .map_err(|_| format!("Invalid karat: {}", s))?;
        Karat::try_from(purity)
    }
}

impl fmt::Display for Karat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
