//! Display theme.
//!
//! The theme only affects how this client renders the party. It is never
//! part of the shared document; other clients keep their own.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PartyError;

/// Which team's colors to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Seahawks,
    Patriots,
    Default,
}

impl Theme {
    pub const ALL: [Theme; 3] = [Theme::Seahawks, Theme::Patriots, Theme::Default];

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Seahawks => "seahawks",
            Theme::Patriots => "patriots",
            Theme::Default => "default",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = PartyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Theme::ALL
            .into_iter()
            .find(|theme| theme.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PartyError::InvalidInput(format!("unknown theme '{s}'")))
    }
}
