/*
 * Cut identifiers: a non-negative number with an optional single-letter suffix
 * ("7", "100A"). The canonical text form zero-pads the number to three digits and
 * uppercases the letter ("007", "100A"). Ordering follows `compare_key`: numeric
 * ascending, then no letter before any letter, which is what reuse-group main cut
 * selection and range filtering rely on.
 */
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const CUT_NUMBER_WIDTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CutIdError {
    InvalidCutIdentifier(String),
}

impl fmt::Display for CutIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CutIdError::InvalidCutIdentifier(text) => {
                write!(f, "Invalid cut identifier: '{text}'")
            }
        }
    }
}

impl std::error::Error for CutIdError {}

pub type Result<T> = std::result::Result<T, CutIdError>;

/*
 * A parsed cut identifier. Field order matters: the derived `Ord` compares the
 * number first and the letter second, and `None` sorts before any `Some`.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CutId {
    number: u32,
    letter: Option<char>,
}

impl CutId {
    /*
     * Accepts `<digits>` or `<digits><letter>` (surrounding whitespace ignored).
     * Rejects empty input, non-digit prefixes, multi-letter suffixes, numbers that
     * overflow `u32`, and zero padding wider than the canonical three digits
     * ("0010"), which would otherwise alias a differently-written cut.
     */
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || CutIdError::InvalidCutIdentifier(text.to_string());
        let trimmed = text.trim();

        let digit_len = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
        if digit_len == 0 {
            return Err(invalid());
        }
        let (digits, rest) = trimmed.split_at(digit_len);

        let mut rest_chars = rest.chars();
        let letter = match (rest_chars.next(), rest_chars.next()) {
            (None, _) => None,
            (Some(c), None) if c.is_ascii_alphabetic() => Some(c.to_ascii_uppercase()),
            _ => return Err(invalid()),
        };

        if digits.len() > CUT_NUMBER_WIDTH && digits.starts_with('0') {
            return Err(invalid());
        }

        let number = digits.parse::<u32>().map_err(|_| invalid())?;
        Ok(CutId { number, letter })
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn compare_key(&self) -> (u32, Option<char>) {
        (self.number, self.letter)
    }

}

impl fmt::Display for CutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.number, width = CUT_NUMBER_WIDTH)?;
        if let Some(letter) = self.letter {
            write!(f, "{letter}")?;
        }
        Ok(())
    }
}

impl FromStr for CutId {
    type Err = CutIdError;

    fn from_str(s: &str) -> Result<Self> {
        CutId::parse(s)
    }
}

impl TryFrom<String> for CutId {
    type Error = CutIdError;

    fn try_from(value: String) -> Result<Self> {
        CutId::parse(&value)
    }
}

impl From<CutId> for String {
    fn from(value: CutId) -> Self {
        value.to_string()
    }
}

/*
 * Joins cut identifiers with underscores in canonical form, e.g. "010_011".
 * This is the display name of a reuse group and the member string embedded in
 * merged AEP filenames.
 */
pub fn join_cut_ids(cuts: &[CutId]) -> String {
    cuts.iter()
        .map(CutId::to_string)
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format_canonical_forms() {
        let cases = [
            ("7", "007"),
            ("07", "007"),
            ("100", "100"),
            ("100a", "100A"),
            ("5B", "005B"),
            ("1234", "1234"),
            (" 12 ", "012"),
        ];
        for (input, expected) in cases {
            let cut = CutId::parse(input).expect("valid cut text should parse");
            assert_eq!(cut.to_string(), expected, "input {input:?}");
        }
    }

    #[test]
    fn test_parse_rejects_invalid_text() {
        for input in ["", "   ", "A10", "10AB", "10-", "x", "0010", "99999999999", "1 0"] {
            let result = CutId::parse(input);
            assert_eq!(
                result,
                Err(CutIdError::InvalidCutIdentifier(input.to_string())),
                "input {input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_letter_suffix_makes_distinct_cut() {
        let plain = CutId::parse("100").unwrap();
        let lettered = CutId::parse("100A").unwrap();
        assert_ne!(plain, lettered);
        assert_eq!(plain.number(), lettered.number());
    }

    #[test]
    fn test_compare_key_total_order() {
        let mut cuts: Vec<CutId> = ["011", "010A", "2", "010"]
            .iter()
            .map(|s| CutId::parse(s).unwrap())
            .collect();
        cuts.sort();
        let formatted: Vec<String> = cuts.iter().map(CutId::to_string).collect();
        assert_eq!(formatted, vec!["002", "010", "010A", "011"]);
        assert!(cuts[1].compare_key() < cuts[2].compare_key());
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let cut = CutId::parse("42b").unwrap();
        let json = serde_json::to_string(&cut).unwrap();
        assert_eq!(json, "\"042B\"");
        let back: CutId = serde_json::from_str("\"42B\"").unwrap();
        assert_eq!(back, cut);
        assert!(serde_json::from_str::<CutId>("\"nope\"").is_err());
    }

    #[test]
    fn test_join_cut_ids() {
        let cuts = vec![CutId::parse("10").unwrap(), CutId::parse("11A").unwrap()];
        assert_eq!(join_cut_ids(&cuts), "010_011A");
    }
}
