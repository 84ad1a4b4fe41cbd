use crate::assets::Asset;
use crate::chain::{ChainRow, OptionChain};

/// Subscription tier of the caller. Gating happens on finished chains;
/// the engine always computes every field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessTier {
    Free,
    Pro,
}

impl AccessTier {
    /// Parse a header value. Anything other than "pro" is the free tier.
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("pro") => Self::Pro,
            _ => Self::Free,
        }
    }

    #[inline]
    pub fn can_see_touch(&self) -> bool {
        matches!(self, Self::Pro)
    }

    #[inline]
    pub fn can_access(&self, asset: &Asset) -> bool {
        match self {
            Self::Pro => true,
            Self::Free => asset.free_tier,
        }
    }
}

impl std::fmt::Display for AccessTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Pro => write!(f, "pro"),
        }
    }
}

/// A chain with tier-restricted fields stripped.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChainView {
    pub tier: AccessTier,
    pub touch_visible: bool,
    #[serde(flatten)]
    pub chain: OptionChain,
}

impl ChainView {
    pub fn for_tier(mut chain: OptionChain, tier: AccessTier) -> Self {
        let touch_visible = tier.can_see_touch();
        if !touch_visible {
            chain.rows.iter_mut().for_each(redact_row);
        }
        Self {
            tier,
            touch_visible,
            chain,
        }
    }
}

#[inline]
fn redact_row(row: &mut ChainRow) {
    row.touch_probability = None;
}
