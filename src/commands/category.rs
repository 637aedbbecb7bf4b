use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Feature grouping that a guild can switch on or off.
///
/// Every gated category owns one bit of the guild's `categories` mask.
/// `Other` has no bit and is always enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Economy,
    Fun,
    Personality,
    Moderation,
    Other,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown category '{0}'")]
pub struct UnknownCategory(pub String);

impl Category {
    /// Categories that can be toggled per guild
    pub const GATED: [Category; 4] = [
        Category::Economy,
        Category::Fun,
        Category::Personality,
        Category::Moderation,
    ];

    pub fn mask(&self) -> Option<u32> {
        match self {
            Category::Economy => Some(1 << 0),
            Category::Fun => Some(1 << 1),
            Category::Personality => Some(1 << 2),
            Category::Moderation => Some(1 << 3),
            Category::Other => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Category::Economy => "economy",
            Category::Fun => "fun",
            Category::Personality => "personality",
            Category::Moderation => "moderation",
            Category::Other => "other",
        }
    }

    pub fn is_enabled_in(&self, mask: u32) -> bool {
        match self.mask() {
            Some(bit) => mask & bit == bit,
            None => true,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Category::GATED
            .into_iter()
            .chain([Category::Other])
            .find(|category| category.name() == wanted)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
