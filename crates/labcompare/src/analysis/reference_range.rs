use regex::Regex;
use std::sync::LazyLock;

use super::values::parse_numeric_value;

const NUMBER: &str = r"[+-]?\d+(?:[.,]\d+)?";

static BOUNDED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^\s*({n})\s*(?:-|–|—|to)\s*({n})",
        n = NUMBER
    ))
    .expect("valid regex")
});

static UPPER_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)^\s*(?:<=|<|≤|up to|below)\s*({})", NUMBER)).expect("valid regex")
});

static LOWER_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)^\s*(?:>=|>|≥|above)\s*({})", NUMBER)).expect("valid regex")
});

/// Numeric bounds of a reference range. At least one bound is present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceRange {
    pub low: Option<f64>,
    pub high: Option<f64>,
}

/// Where a value sits relative to a reference range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePosition {
    Below,
    Within,
    Above,
}

impl ReferenceRange {
    /// Parse "13.5-17.5", "13.5 – 17.5 g/dL", "0.5 to 1.2", "<200", ">= 40".
    ///
    /// Returns `None` for ranges that are not numeric ("Negative") or whose
    /// bounds are reversed.
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(caps) = BOUNDED.captures(raw) {
            let low = parse_numeric_value(caps.get(1)?.as_str())?;
            let high = parse_numeric_value(caps.get(2)?.as_str())?;
            if low > high {
                return None;
            }
            return Some(Self {
                low: Some(low),
                high: Some(high),
            });
        }
        if let Some(caps) = UPPER_ONLY.captures(raw) {
            let high = parse_numeric_value(caps.get(1)?.as_str())?;
            return Some(Self {
                low: None,
                high: Some(high),
            });
        }
        if let Some(caps) = LOWER_ONLY.captures(raw) {
            let low = parse_numeric_value(caps.get(1)?.as_str())?;
            return Some(Self {
                low: Some(low),
                high: None,
            });
        }
        None
    }

    pub fn position(&self, value: f64) -> RangePosition {
        if self.low.is_some_and(|low| value < low) {
            RangePosition::Below
        } else if self.high.is_some_and(|high| value > high) {
            RangePosition::Above
        } else {
            RangePosition::Within
        }
    }
}

impl std::fmt::Display for ReferenceRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.low, self.high) {
            (Some(low), Some(high)) => write!(f, "{}-{}", low, high),
            (None, Some(high)) => write!(f, "<{}", high),
            (Some(low), None) => write!(f, ">{}", low),
            (None, None) => Ok(()),
        }
    }
}
