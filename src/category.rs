// 🏷️ Source Category - closed set of labels for ingested files
// Every staged file carries one of these until it is committed

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CATEGORY
// ============================================================================

/// Category - where the rows of a file came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tsun,
    Cb,
    Pb,
    Other,
}

impl Default for Category {
    fn default() -> Self {
        Category::Tsun
    }
}

impl Category {
    /// Every category, in display order
    pub const ALL: [Category; 4] = [Category::Tsun, Category::Cb, Category::Pb, Category::Other];

    /// Short code used in files, the database and the CLI
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Tsun => "tsun",
            Category::Cb => "cb",
            Category::Pb => "pb",
            Category::Other => "other",
        }
    }

    /// Next category in display order (wraps around)
    pub fn next(&self) -> Self {
        let i = Self::ALL.iter().position(|c| c == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    /// Previous category in display order (wraps around)
    pub fn previous(&self) -> Self {
        let i = Self::ALL.iter().position(|c| c == self).unwrap_or(0);
        Self::ALL[(i + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown category '{0}' (expected one of: tsun, cb, pb, other)")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
