//! The crawled record and the domain rule that classifies it.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Format of the date text as it appears on video pages, e.g. `Dec 30, 2021`.
const PAGE_DATE_FORMAT: &str = "%b %d, %Y";

/// A single video page, keyed by its canonical watch URL.
///
/// `date` is stored as scraped, not normalized; classification re-parses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Video {
    pub url: String,
    pub title: String,
    pub date: String,
    pub is_target: bool,
}

impl Video {
    /// The domain rule: a video is a target iff its date parses and lies
    /// strictly before the cutoff, and its title carries at least one
    /// Hiragana, Katakana, or Han character. Unparsable dates never match.
    #[must_use]
    pub fn matches(&self, cutoff: DateTime<Utc>) -> bool {
        let Ok(date) = NaiveDate::parse_from_str(self.date.trim(), PAGE_DATE_FORMAT) else {
            return false;
        };
        if date.and_time(NaiveTime::MIN).and_utc() >= cutoff {
            return false;
        }
        self.title.chars().any(is_japanese)
    }
}

/// True for scalars in the Hiragana, Katakana, or Han blocks.
fn is_japanese(c: char) -> bool {
    matches!(u32::from(c),
        0x3040..=0x309F          // Hiragana
        | 0x30A0..=0x30FF        // Katakana
        | 0x31F0..=0x31FF        // Katakana phonetic extensions
        | 0x3400..=0x4DBF        // CJK unified ideographs extension A
        | 0x4E00..=0x9FFF        // CJK unified ideographs
        | 0xF900..=0xFAFF        // CJK compatibility ideographs
        | 0x20000..=0x2A6DF      // CJK unified ideographs extension B
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cutoff() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 12, 31, 23, 59, 59).unwrap()
    }

    fn video(date: &str, title: &str) -> Video {
        Video {
            url: "https://www.vidlii.com/watch?v=abc".to_string(),
            title: title.to_string(),
            date: date.to_string(),
            is_target: false,
        }
    }

    #[test]
    fn pre_cutoff_japanese_title_is_target() {
        assert!(video("Dec 30, 2021", "猫動画").matches(cutoff()));
    }

    #[test]
    fn post_cutoff_date_is_not_target() {
        assert!(!video("Jan 1, 2022", "猫動画").matches(cutoff()));
    }

    #[test]
    fn latin_title_is_not_target() {
        assert!(!video("Dec 30, 2021", "Cat Video").matches(cutoff()));
    }

    #[test]
    fn unparsable_date_is_not_target() {
        assert!(!video("not a date", "猫").matches(cutoff()));
        assert!(!video("", "猫").matches(cutoff()));
    }

    #[test]
    fn single_digit_day_parses() {
        assert!(video("Mar 5, 2019", "テスト").matches(cutoff()));
    }

    #[test]
    fn katakana_and_han_both_count() {
        assert!(video("Dec 30, 2021", "ベータ").matches(cutoff()));
        assert!(video("Dec 30, 2021", "漢字 only once").matches(cutoff()));
    }

    #[test]
    fn surrounding_whitespace_in_date_is_tolerated() {
        assert!(video("  Dec 30, 2021  ", "猫").matches(cutoff()));
    }
}
