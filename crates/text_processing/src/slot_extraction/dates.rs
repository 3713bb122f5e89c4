//! Date expressions, resolved against a reference date

use chrono::{Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

/// How a matched expression turns into a date
#[derive(Debug, Clone, Copy)]
enum DateRule {
    DayMonthYear,
    IsoDate,
    DaysAgo,
    Offset(i64),
}

// Order matters: numeric forms first, then longer relative expressions
static DATE_PATTERNS: Lazy<Vec<(Regex, DateRule)>> = Lazy::new(|| vec![
    (Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap(), DateRule::IsoDate),
    (Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4})\b").unwrap(), DateRule::DayMonthYear),
    (Regex::new(r"\b(\d{1,3})\s+days?\s+ago\b").unwrap(), DateRule::DaysAgo),
    (Regex::new(r"\bil\s+y\s+a\s+(\d{1,3})\s+jours?\b").unwrap(), DateRule::DaysAgo),
    (Regex::new(r"\b(?:the\s+)?day\s+before\s+yesterday\b|\bavant[\s-]hier\b").unwrap(), DateRule::Offset(-2)),
    (Regex::new(r"\blast\s+week\b|\b(?:la\s+)?semaine\s+(?:derniere|passee)\b").unwrap(), DateRule::Offset(-7)),
    (Regex::new(r"\byesterday\b|\bhier\b").unwrap(), DateRule::Offset(-1)),
    (Regex::new(r"\btoday\b|\baujourd\s?'?\s?hui\b|\bce\s+jour\b").unwrap(), DateRule::Offset(0)),
    (Regex::new(r"\btomorrow\b|\bdemain\b").unwrap(), DateRule::Offset(1)),
]);

/// First date expression in folded text, resolved against `reference`
pub fn extract_date(folded: &str, reference: NaiveDate) -> Option<NaiveDate> {
    DATE_PATTERNS.iter().find_map(|(regex, rule)| {
        regex
            .captures_iter(folded)
            .find_map(|caps| resolve(&caps, *rule, reference))
    })
}

/// Replace every date expression with spaces so its digits are not read as
/// amounts or quantities
pub fn blank_dates(folded: &str) -> String {
    let mut blanked = folded.to_string();
    for (regex, _) in DATE_PATTERNS.iter() {
        blanked = regex
            .replace_all(&blanked, |caps: &regex::Captures| " ".repeat(caps[0].len()))
            .into_owned();
    }
    blanked
}

fn resolve(caps: &regex::Captures, rule: DateRule, reference: NaiveDate) -> Option<NaiveDate> {
    let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    match rule {
        DateRule::IsoDate => NaiveDate::from_ymd_opt(number(1)? as i32, number(2)?, number(3)?),
        DateRule::DayMonthYear => {
            NaiveDate::from_ymd_opt(number(3)? as i32, number(2)?, number(1)?)
        }
        DateRule::DaysAgo => reference.checked_sub_signed(Duration::days(number(1)? as i64)),
        DateRule::Offset(days) => reference.checked_add_signed(Duration::days(days)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_relative_dates() {
        let r = reference();
        assert_eq!(extract_date("sold yesterday", r), Some(ymd(2024, 3, 14)));
        assert_eq!(extract_date("vendu hier", r), Some(ymd(2024, 3, 14)));
        assert_eq!(extract_date("the day before yesterday", r), Some(ymd(2024, 3, 13)));
        assert_eq!(extract_date("avant-hier", r), Some(ymd(2024, 3, 13)));
        assert_eq!(extract_date("tomorrow", r), Some(ymd(2024, 3, 16)));
        assert_eq!(extract_date("today", r), Some(r));
        assert_eq!(extract_date("aujourd'hui", r), Some(r));
        assert_eq!(extract_date("last week", r), Some(ymd(2024, 3, 8)));
        assert_eq!(extract_date("3 days ago", r), Some(ymd(2024, 3, 12)));
        assert_eq!(extract_date("il y a 10 jours", r), Some(ymd(2024, 3, 5)));
    }

    #[test]
    fn test_explicit_dates() {
        let r = reference();
        assert_eq!(extract_date("on 05/02/2024", r), Some(ymd(2024, 2, 5)));
        assert_eq!(extract_date("le 05-02-2024", r), Some(ymd(2024, 2, 5)));
        assert_eq!(extract_date("on 2024-02-05", r), Some(ymd(2024, 2, 5)));
        // Impossible calendar dates are ignored
        assert_eq!(extract_date("on 31/02/2024", r), None);
    }

    #[test]
    fn test_no_date() {
        assert_eq!(extract_date("sold 5 pigs", reference()), None);
    }

    #[test]
    fn test_blank_dates_keeps_other_numbers() {
        let blanked = blank_dates("sold for 800000 on 12/03/2024");
        assert!(blanked.contains("800000"));
        assert!(!blanked.contains("2024"));
        assert_eq!(blanked.len(), "sold for 800000 on 12/03/2024".len());
    }
}
