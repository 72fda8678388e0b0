use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;
use serde::Serialize;

static FM_RATING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bFM\b\s*(?i:global\s*)?(?i:approv(?:al|als|ed)\s*)?(?i:class\s*)?(?i:rating\s*)?[:#]?\s*(\d{1,2}-\d{2,3})\b").unwrap()
});
static FM_STANDARD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bFM\b\s*(?i:global\s*)?(?i:approv(?:al|als|ed)\s*)?(?i:standard\s*)?[:#]?\s*(4\d{3})\b").unwrap()
});
static ROOFNAV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\broof\s?nav\s*(?:assembly\s*)?(?:no\.?|#|number|id)?\s*:?\s*(\d{4,})\b").unwrap()
});

static UL_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bUL\b\s*(?i:listed\s*)?(?i:class\s+)([ABCabc])\b").unwrap()
});
static FIRE_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bclass\s+([abc])\s+(?:fire|roof|rated|rating|assembly|listed)\b").unwrap()
});
static UL_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bUL\b\s*(?i:(?:listing|listed|design|file|standard)\s*)?(?i:no\.?\s*|#\s*)?([A-Z]{0,4}\d{3,}[A-Z]?)\b").unwrap()
});

static ASTM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bASTM\s*([A-G])\s?-?\s?(\d{2,5})\b").unwrap()
});
/// Bare designators such as "D6878" outside an "ASTM" prefix.
static BARE_ASTM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b([CDE])(\d{4})\b").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApprovalSet {
    pub fm: Vec<String>,
    pub ul: Vec<String>,
    pub astm: Vec<String>,
}

impl ApprovalSet {
    pub fn is_empty(&self) -> bool {
        self.fm.is_empty() && self.ul.is_empty() && self.astm.is_empty()
    }
}

/// Every (position, normalized value) hit, ordered by position and deduped.
fn collect(hits: impl Iterator<Item = (usize, String)>) -> Vec<String> {
    hits.sorted_by_key(|(at, _)| *at)
        .map(|(_, v)| v)
        .unique()
        .collect()
}

pub fn extract_approvals(text: &str) -> ApprovalSet {
    let fm = FM_RATING_RE
        .captures_iter(text)
        .chain(FM_STANDARD_RE.captures_iter(text))
        .filter_map(|c| Some((c.get(0)?.start(), format!("FM {}", c.get(1)?.as_str()))))
        .chain(
            ROOFNAV_RE
                .captures_iter(text)
                .filter_map(|c| Some((c.get(0)?.start(), format!("RoofNav {}", c.get(1)?.as_str())))),
        );

    let ul = UL_CLASS_RE
        .captures_iter(text)
        .chain(FIRE_CLASS_RE.captures_iter(text))
        .filter_map(|c| {
            let class = c.get(1)?.as_str().to_uppercase();
            Some((c.get(0)?.start(), format!("Class {}", class)))
        })
        .chain(
            UL_NUMBER_RE
                .captures_iter(text)
                .filter_map(|c| Some((c.get(0)?.start(), format!("UL {}", c.get(1)?.as_str())))),
        );

    let astm = ASTM_RE
        .captures_iter(text)
        .chain(BARE_ASTM_RE.captures_iter(text))
        .filter_map(|c| {
            let letter = c.get(1)?.as_str().to_uppercase();
            Some((c.get(0)?.start(), format!("{}{}", letter, c.get(2)?.as_str())))
        });

    ApprovalSet {
        fm: collect(fm),
        ul: collect(ul),
        astm: collect(astm),
    }
}
