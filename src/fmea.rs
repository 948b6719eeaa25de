//! FMEA scoring
//!
//! Severity, Occurrence and Detectability are each rated on a 1-10 scale and
//! multiplied into a Risk Priority Number (RPN).
//!
//! All three factors follow the same direction: a larger number means more
//! risk. For Detectability that is the AIAG convention, 1 = the failure is
//! almost certainly caught before it does harm, 10 = it will practically
//! never be detected.

use crate::error::{FishboneError, Result};
use serde::{Deserialize, Serialize};

/// RPN at or above which a cause is flagged as high risk.
pub const HIGH_RISK_THRESHOLD: u16 = 100;

/// Largest possible RPN (10 * 10 * 10).
pub const MAX_RPN: u16 = 1000;

/// A single FMEA factor, always within 1..=10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    /// Slider default when a cause has not been rated yet.
    pub const DEFAULT: Rating = Rating(5);

    pub fn new(value: u8) -> Result<Self> {
        Self::try_from(value as i64)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Rating {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<i64> for Rating {
    type Error = FishboneError;

    fn try_from(value: i64) -> Result<Self> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Ok(Rating(value as u8))
        } else {
            Err(FishboneError::InvalidRating(value))
        }
    }
}

impl TryFrom<u8> for Rating {
    type Error = FishboneError;

    fn try_from(value: u8) -> Result<Self> {
        Self::try_from(value as i64)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The three factor ratings for one cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ratings {
    #[serde(default)]
    pub severity: Rating,
    #[serde(default)]
    pub occurrence: Rating,
    #[serde(default)]
    pub detectability: Rating,
}

impl Ratings {
    pub fn new(severity: Rating, occurrence: Rating, detectability: Rating) -> Self {
        Self {
            severity,
            occurrence,
            detectability,
        }
    }

    pub fn rpn(&self) -> u16 {
        rpn(self.severity, self.occurrence, self.detectability)
    }
}

/// Risk Priority Number: the product of the three factors.
pub fn rpn(severity: Rating, occurrence: Rating, detectability: Rating) -> u16 {
    severity.value() as u16 * occurrence.value() as u16 * detectability.value() as u16
}

pub fn is_high_risk(rpn: u16) -> bool {
    rpn >= HIGH_RISK_THRESHOLD
}

/// A scored cause. The RPN is derived from the ratings and cannot be set on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCauseRecord")]
pub struct CauseRecord {
    category: String,
    cause: String,
    severity: Rating,
    occurrence: Rating,
    detectability: Rating,
    rpn: u16,
}

impl CauseRecord {
    pub fn new(category: impl Into<String>, cause: impl Into<String>, ratings: Ratings) -> Self {
        Self {
            category: category.into(),
            cause: cause.into(),
            severity: ratings.severity,
            occurrence: ratings.occurrence,
            detectability: ratings.detectability,
            rpn: ratings.rpn(),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn cause(&self) -> &str {
        &self.cause
    }

    pub fn severity(&self) -> Rating {
        self.severity
    }

    pub fn occurrence(&self) -> Rating {
        self.occurrence
    }

    pub fn detectability(&self) -> Rating {
        self.detectability
    }

    pub fn ratings(&self) -> Ratings {
        Ratings::new(self.severity, self.occurrence, self.detectability)
    }

    pub fn rpn(&self) -> u16 {
        self.rpn
    }

    pub fn is_high_risk(&self) -> bool {
        is_high_risk(self.rpn)
    }
}

/// Wire form of a record; `rpn` is optional and checked when present.
#[derive(Deserialize)]
struct RawCauseRecord {
    category: String,
    cause: String,
    severity: Rating,
    occurrence: Rating,
    detectability: Rating,
    #[serde(default)]
    rpn: Option<u16>,
}

impl TryFrom<RawCauseRecord> for CauseRecord {
    type Error = FishboneError;

    fn try_from(raw: RawCauseRecord) -> Result<Self> {
        let record = CauseRecord::new(
            raw.category,
            raw.cause,
            Ratings::new(raw.severity, raw.occurrence, raw.detectability),
        );
        match raw.rpn {
            Some(given) if given != record.rpn => Err(FishboneError::Export(format!(
                "RPN {} for '{}' does not match {} x {} x {} = {}",
                given, record.cause, record.severity, record.occurrence, record.detectability, record.rpn
            ))),
            _ => Ok(record),
        }
    }
}

/// Sort descending by RPN. Equal RPNs keep their entry order.
pub fn rank(records: &mut [CauseRecord]) {
    records.sort_by(|a, b| b.rpn.cmp(&a.rpn));
}

/// Aggregate figures shown above the FMEA table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FmeaSummary {
    pub total: usize,
    pub high_risk: usize,
    pub max_rpn: Option<u16>,
    pub mean_rpn: Option<f64>,
}

impl FmeaSummary {
    pub fn from_records(records: &[CauseRecord]) -> Self {
        let total = records.len();
        let high_risk = records.iter().filter(|r| r.is_high_risk()).count();
        let max_rpn = records.iter().map(|r| r.rpn).max();
        let mean_rpn = if total == 0 {
            None
        } else {
            let sum: u32 = records.iter().map(|r| r.rpn as u32).sum();
            Some(sum as f64 / total as f64)
        };

        Self {
            total,
            high_risk,
            max_rpn,
            mean_rpn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(v: u8) -> Rating {
        Rating::new(v).unwrap()
    }

    #[test]
    fn test_rpn_is_product_and_bounded() {
        for s in 1..=10u8 {
            for o in 1..=10u8 {
                for d in 1..=10u8 {
                    let value = rpn(r(s), r(o), r(d));
                    assert_eq!(value, s as u16 * o as u16 * d as u16);
                    assert!((1..=MAX_RPN).contains(&value));
                    assert_eq!(is_high_risk(value), value >= 100);
                }
            }
        }
    }

    #[test]
    fn test_rating_bounds() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(11).is_err());
        assert_eq!(Rating::new(1).unwrap().value(), 1);
        assert_eq!(Rating::new(10).unwrap().value(), 10);
        assert_eq!(Rating::default().value(), 5);
    }

    #[test]
    fn test_rating_deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<Rating>("7").is_ok());
        assert!(serde_json::from_str::<Rating>("0").is_err());
        assert!(serde_json::from_str::<Rating>("42").is_err());
        assert!(serde_json::from_str::<Rating>("-3").is_err());
    }

    #[test]
    fn test_missing_customer_ids_example() {
        let record = CauseRecord::new("People", "Untrained staff", Ratings::new(r(8), r(6), r(4)));
        assert_eq!(record.rpn(), 192);
        assert!(record.is_high_risk());
    }

    #[test]
    fn test_threshold_edges() {
        let just_below = CauseRecord::new("Process", "a", Ratings::new(r(3), r(3), r(10)));
        assert_eq!(just_below.rpn(), 90);
        assert!(!just_below.is_high_risk());

        let exactly = CauseRecord::new("Process", "b", Ratings::new(r(10), r(10), r(1)));
        assert_eq!(exactly.rpn(), 100);
        assert!(exactly.is_high_risk());

        let below = CauseRecord::new("Process", "c", Ratings::new(r(7), r(7), r(2)));
        assert_eq!(below.rpn(), 98);
        assert!(!below.is_high_risk());
    }

    #[test]
    fn test_deserialize_rejects_inconsistent_rpn() {
        let ok = r#"{"category":"People","cause":"x","severity":2,"occurrence":3,"detectability":4,"rpn":24}"#;
        assert_eq!(serde_json::from_str::<CauseRecord>(ok).unwrap().rpn(), 24);

        let derived = r#"{"category":"People","cause":"x","severity":2,"occurrence":3,"detectability":4}"#;
        assert_eq!(serde_json::from_str::<CauseRecord>(derived).unwrap().rpn(), 24);

        let bad = r#"{"category":"People","cause":"x","severity":2,"occurrence":3,"detectability":4,"rpn":999}"#;
        assert!(serde_json::from_str::<CauseRecord>(bad).is_err());
    }

    #[test]
    fn test_rank_descending_and_stable() {
        let mut records = vec![
            CauseRecord::new("A", "low", Ratings::new(r(1), r(1), r(1))),
            CauseRecord::new("A", "tie-first", Ratings::new(r(5), r(5), r(5))),
            CauseRecord::new("B", "high", Ratings::new(r(10), r(10), r(10))),
            CauseRecord::new("B", "tie-second", Ratings::new(r(5), r(5), r(5))),
        ];
        rank(&mut records);
        let order: Vec<&str> = records.iter().map(|r| r.cause()).collect();
        assert_eq!(order, vec!["high", "tie-first", "tie-second", "low"]);
    }

    #[test]
    fn test_summary() {
        let records = vec![
            CauseRecord::new("A", "x", Ratings::new(r(8), r(6), r(4))),
            CauseRecord::new("A", "y", Ratings::new(r(2), r(2), r(2))),
        ];
        let summary = FmeaSummary::from_records(&records);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.high_risk, 1);
        assert_eq!(summary.max_rpn, Some(192));
        assert_eq!(summary.mean_rpn, Some(100.0));

        let empty = FmeaSummary::from_records(&[]);
        assert_eq!(empty.max_rpn, None);
        assert_eq!(empty.mean_rpn, None);
    }
}
