use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed set of emotions a poem is filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Love,
    Joy,
    Sadness,
    Hope,
    Anger,
}

impl Emotion {
    pub const ALL: [Emotion; 5] = [
        Emotion::Love,
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Hope,
        Emotion::Anger,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Love => "love",
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
            Emotion::Hope => "hope",
            Emotion::Anger => "anger",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Emotion::Love => "Love",
            Emotion::Joy => "Joy",
            Emotion::Sadness => "Sadness",
            Emotion::Hope => "Hope",
            Emotion::Anger => "Anger",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Emotion::ALL
            .iter()
            .copied()
            .find(|e| e.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown emotion '{}'", s))
    }
}
