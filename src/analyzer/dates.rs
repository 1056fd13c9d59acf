//! Date constraint extraction
//!
//! Recognised forms, tried in order:
//! - month range: `2021년 3월부터 6월까지`
//! - year range: `2020년부터 2022년까지`, `2020~2022`
//! - strictly before: `2021년 이전`, `before 2021`
//! - on or after: `2022년 이후`, `2022년부터`, `since 2022`
//! - single year: `2021년`, `21년도`, `in 2021`

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

use crate::types::DateFilter;

const YEAR: &str = r"(\d{4}|\d{2})";

static MONTH_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?:^|\D){YEAR}\s*년(?:도)?\s*(\d{{1,2}})\s*월\s*(?:부터|에서|~|-)\s*(?:{YEAR}\s*년(?:도)?\s*)?(\d{{1,2}})\s*월"
    ))
    .expect("valid month range regex")
});

static YEAR_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?:^|\D){YEAR}\s*년?(?:도)?\s*(?:부터|에서|~|-|–|to)\s*{YEAR}\s*년?(?:도)?(?:\D|$)"
    ))
    .expect("valid year range regex")
});

static BEFORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|\D)(\d{4}|\d{2})\s*년(?:도)?\s*(?:이전|전(?:에|\s|$))|before\s+(\d{4})")
        .expect("valid before regex")
});

static AFTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|\D)(\d{4}|\d{2})\s*년(?:도)?\s*(?:이후|부터)|(?:after|since)\s+(\d{4})")
        .expect("valid after regex")
});

static KOREAN_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\D)(\d{4}|\d{2})\s*년(도)?\s*(간|동안)?").expect("valid year regex")
});

static BARE_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("valid bare year regex"));

/// Expand two-digit years and reject implausible ones
fn parse_year(text: &str) -> Option<i32> {
    let value: i32 = text.parse().ok()?;
    let year = if text.len() == 2 { 2000 + value } else { value };
    (1900..=2100).contains(&year).then_some(year)
}

fn month_start(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// Extract the first date constraint expressed in `query`
pub fn extract_date_filter(query: &str) -> Option<DateFilter> {
    if let Some(caps) = MONTH_RANGE_RE.captures(query) {
        let start_year = parse_year(&caps[1])?;
        let start_month: u32 = caps[2].parse().ok()?;
        let end_year = match caps.get(3) {
            Some(m) => parse_year(m.as_str())?,
            None => start_year,
        };
        let end_month: u32 = caps[4].parse().ok()?;
        if let (Some(start), Some(end)) = (month_start(start_year, start_month), month_end(end_year, end_month)) {
            if start <= end {
                return Some(DateFilter::Range { start, end });
            }
        }
    }

    if let Some(caps) = YEAR_RANGE_RE.captures(query) {
        if let (Some(a), Some(b)) = (parse_year(&caps[1]), parse_year(&caps[2])) {
            let (from, to) = if a <= b { (a, b) } else { (b, a) };
            if let (Some(start), Some(end)) = (
                NaiveDate::from_ymd_opt(from, 1, 1),
                NaiveDate::from_ymd_opt(to, 12, 31),
            ) {
                return Some(DateFilter::Range { start, end });
            }
        }
    }

    if let Some(caps) = BEFORE_RE.captures(query) {
        let year = caps.get(1).or_else(|| caps.get(2)).and_then(|m| parse_year(m.as_str()));
        if let Some(date) = year.and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1)) {
            return Some(DateFilter::Before { date });
        }
    }

    if let Some(caps) = AFTER_RE.captures(query) {
        let year = caps.get(1).or_else(|| caps.get(2)).and_then(|m| parse_year(m.as_str()));
        if let Some(date) = year.and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1)) {
            return Some(DateFilter::OnOrAfter { date });
        }
    }

    for caps in KOREAN_YEAR_RE.captures_iter(query) {
        // "10년간" is a duration, "21년도" is a year
        let duration = caps[1].len() == 2 && caps.get(2).is_none() && caps.get(3).is_some();
        if duration {
            continue;
        }
        if let Some(year) = parse_year(&caps[1]) {
            return Some(DateFilter::Year { year });
        }
    }

    BARE_YEAR_RE
        .captures(query)
        .and_then(|caps| parse_year(&caps[1]))
        .map(|year| DateFilter::Year { year })
}
