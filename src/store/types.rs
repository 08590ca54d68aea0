use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::StoreError;

/// Interned handle of a variable series inside one `Store`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct VarId(pub u32);

impl VarId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

/// One calendar quarter. Ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Quarter {
    year: i32,
    quarter: u8,
}

impl Quarter {
    pub fn new(year: i32, quarter: u8) -> Result<Self, StoreError> {
        if !(1..=4).contains(&quarter) {
            return Err(StoreError::MalformedQuarter(format!("{}Q{}", year, quarter)));
        }
        Ok(Self { year, quarter })
    }

    pub fn year(&self) -> i32 { self.year }
    pub fn quarter(&self) -> u8 { self.quarter }

    /// Number of quarters since year 0 Q1. Differences of ordinals are quarter offsets.
    #[inline]
    pub fn ordinal(&self) -> i64 {
        self.year as i64 * 4 + (self.quarter as i64 - 1)
    }

    pub fn from_ordinal(ordinal: i64) -> Self {
        Self {
            year: ordinal.div_euclid(4) as i32,
            quarter: (ordinal.rem_euclid(4) + 1) as u8,
        }
    }

    /// Signed number of quarters from `self` to `other`.
    pub fn offset_to(&self, other: Quarter) -> i64 {
        other.ordinal() - self.ordinal()
    }

    pub fn shift(&self, quarters: i64) -> Self {
        Self::from_ordinal(self.ordinal() + quarters)
    }

    /// Accepts `2025Q1`, `2025q1`, `2025:1` and `2025:01`.
    pub fn parse(label: &str) -> Result<Self, StoreError> {
        let s = label.trim();
        let malformed = || StoreError::MalformedQuarter(label.to_string());

        let (year_part, q_part) = match s.find(|c: char| c == 'Q' || c == 'q' || c == ':') {
            Some(pos) => (&s[..pos], &s[pos + 1..]),
            None => return Err(malformed()),
        };
        if year_part.len() != 4 || !year_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        if q_part.is_empty() || q_part.len() > 2 || !q_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let year: i32 = year_part.parse().map_err(|_| malformed())?;
        let quarter: u8 = q_part.parse().map_err(|_| malformed())?;
        Self::new(year, quarter).map_err(|_| malformed())
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Q{}", self.year, self.quarter)
    }
}

impl FromStr for Quarter {
    type Err = StoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

impl TryFrom<String> for Quarter {
    type Error = StoreError;
    fn try_from(s: String) -> Result<Self, Self::Error> { Self::parse(&s) }
}

impl From<Quarter> for String {
    fn from(q: Quarter) -> Self { q.to_string() }
}

/// Relational operator used by date-conditional dummies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateOp {
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
}

impl DateOp {
    pub fn holds(&self, current: Quarter, target: Quarter) -> bool {
        match self {
            DateOp::Eq => current == target,
            DateOp::Ne => current != target,
            DateOp::Ge => current >= target,
            DateOp::Le => current <= target,
            DateOp::Gt => current > target,
            DateOp::Lt => current < target,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            DateOp::Eq => "=",
            DateOp::Ne => "<>",
            DateOp::Ge => ">=",
            DateOp::Le => "<=",
            DateOp::Gt => ">",
            DateOp::Lt => "<",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2025Q1", 2025, 1)]
    #[case("2025q4", 2025, 4)]
    #[case("2008:1", 2008, 1)]
    #[case("2008:03", 2008, 3)]
    #[case("  1970Q2 ", 1970, 2)]
    fn test_parse_accepted_forms(#[case] input: &str, #[case] year: i32, #[case] q: u8) {
        let parsed = Quarter::parse(input).unwrap();
        assert_eq!(parsed.year(), year);
        assert_eq!(parsed.quarter(), q);
    }

    #[rstest]
    #[case("")]
    #[case("2025")]
    #[case("2025Q5")]
    #[case("2025Q0")]
    #[case("25Q1")]
    #[case("2025-01")]
    #[case("2025Qx")]
    #[case("2025Q123")]
    fn test_parse_rejects_malformed(#[case] input: &str) {
        assert!(matches!(Quarter::parse(input), Err(StoreError::MalformedQuarter(_))), "{}", input);
    }

    #[test]
    fn test_ordinal_and_shift() {
        let q = Quarter::parse("2009Q4").unwrap();
        assert_eq!(q.shift(1).to_string(), "2010Q1");
        assert_eq!(q.shift(-4).to_string(), "2008Q4");
        assert_eq!(Quarter::parse("2008Q1").unwrap().offset_to(q), 7);
        assert_eq!(Quarter::from_ordinal(q.ordinal()), q);
    }

    #[test]
    fn test_ordering_is_chronological() {
        let a = Quarter::parse("2009Q4").unwrap();
        let b = Quarter::parse("2010Q1").unwrap();
        assert!(a < b);
        assert!(DateOp::Lt.holds(a, b));
        assert!(DateOp::Ge.holds(b, a));
        assert!(DateOp::Ne.holds(a, b));
    }

    #[test]
    fn test_serde_as_label() {
        let q = Quarter::parse("2024Q3").unwrap();
        let json = serde_json::to_string(&q).unwrap();
        assert_eq!(json, "\"2024Q3\"");
        let back: Quarter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, q);
    }
}
