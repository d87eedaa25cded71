//! Time-window and aggregation intent detection.
//!
//! Runs on the sanitized query before generation. Detected intent is turned
//! into literal prompt instructions, so the model never has to compute dates.

use crate::types::{Aggregation, QueryMetadata, StatisticalInfo, TimePeriod};
use chrono::{Datelike, Days, Local, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

/// Named date windows in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    ThisYear,
    LastYear,
}

impl Window {
    /// Inclusive `(start, end)` relative to `today`.
    fn bounds(self, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        let weekday = u64::from(today.weekday().num_days_from_monday());
        match self {
            Self::Today => Some((today, today)),
            Self::Yesterday => {
                let day = today.checked_sub_days(Days::new(1))?;
                Some((day, day))
            }
            Self::ThisWeek => Some((today.checked_sub_days(Days::new(weekday))?, today)),
            Self::LastWeek => Some((
                today.checked_sub_days(Days::new(weekday + 7))?,
                today.checked_sub_days(Days::new(weekday + 1))?,
            )),
            Self::ThisMonth => Some((today.with_day(1)?, today)),
            Self::LastMonth => {
                let end = today.with_day(1)?.checked_sub_days(Days::new(1))?;
                Some((end.with_day(1)?, end))
            }
            Self::ThisYear => Some((NaiveDate::from_ymd_opt(today.year(), 1, 1)?, today)),
            Self::LastYear => Some((
                NaiveDate::from_ymd_opt(today.year() - 1, 1, 1)?,
                NaiveDate::from_ymd_opt(today.year() - 1, 12, 31)?,
            )),
        }
    }
}

static LAST_N_DAYS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"son ([0-9]+) gün|last ([0-9]+) days?").expect("last-N-days regex is valid")
});

static TIME_PATTERNS: LazyLock<Vec<(Regex, &'static str, Window)>> = LazyLock::new(|| {
    [
        ("bugün|today", Window::Today),
        ("dün|yesterday", Window::Yesterday),
        ("bu hafta|this week", Window::ThisWeek),
        ("geçen hafta|last week", Window::LastWeek),
        ("bu ay|this month", Window::ThisMonth),
        ("geçen ay|last month", Window::LastMonth),
        ("bu yıl|this year", Window::ThisYear),
        ("geçen yıl|last year", Window::LastYear),
    ]
    .into_iter()
    .map(|(pattern, window)| {
        let description = pattern.split('|').next().unwrap_or(pattern);
        (
            Regex::new(pattern).expect("time pattern is valid"),
            description,
            window,
        )
    })
    .collect()
});

static STAT_PATTERNS: LazyLock<Vec<(Regex, Aggregation)>> = LazyLock::new(|| {
    [
        (r"kaç tane|kaç adet|kaç\b|how many|count", Aggregation::Count),
        ("toplam|total|sum", Aggregation::Sum),
        ("ortalama|average|avg", Aggregation::Avg),
        ("en fazla|en çok|maximum|max", Aggregation::Max),
        ("en az|minimum|min", Aggregation::Min),
    ]
    .into_iter()
    .map(|(pattern, aggregation)| {
        (Regex::new(pattern).expect("stat pattern is valid"), aggregation)
    })
    .collect()
});

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Query enhancer.
///
/// Pure: the same query and reference date always give the same output.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryEnhancer;

impl QueryEnhancer {
    /// Enhance a query using today's local date.
    ///
    /// # Returns
    ///
    /// `(enhanced_text, metadata)`
    pub fn enhance(query: &str) -> (String, QueryMetadata) {
        Self::enhance_at(query, Local::now().date_naive())
    }

    /// Enhance a query relative to a fixed reference date.
    ///
    /// # Arguments
    ///
    /// * `query` - Sanitized query text
    /// * `today` - Reference date for relative windows
    ///
    /// # Returns
    ///
    /// The query with ` (between <start> and <end>)` and/or
    /// ` (calculate COUNT)` appended, plus the detected metadata
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use inventory_nlq::llm::QueryEnhancer;
    ///
    /// let today = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
    /// let (text, meta) = QueryEnhancer::enhance_at("son 3 gün kaç tane laptop eklendi", today);
    /// assert_eq!(text, "son 3 gün kaç tane laptop eklendi (between 2024-03-11 and 2024-03-14) (calculate COUNT)");
    /// assert!(meta.has_time_filter && meta.has_statistical_intent);
    /// ```
    pub fn enhance_at(query: &str, today: NaiveDate) -> (String, QueryMetadata) {
        let mut enhanced = query.to_string();
        let mut metadata = QueryMetadata::default();

        if let Some(period) = Self::detect_time_period(query, today) {
            enhanced.push_str(&format!(
                " (between {} and {})",
                period.start_date, period.end_date
            ));
            metadata.has_time_filter = true;
            metadata.time_period = Some(period);
        }

        if let Some(info) = Self::detect_statistical_intent(query) {
            if info.aggregation == Aggregation::Count {
                enhanced.push_str(&format!(" (calculate {})", info.aggregation));
            }
            metadata.has_statistical_intent = true;
            metadata.statistical_info = Some(info);
        }

        (enhanced, metadata)
    }

    /// Detect a date window.
    ///
    /// "son N gün" / "last N days" wins over named windows; among named
    /// windows the first in priority order wins.
    pub fn detect_time_period(query: &str, today: NaiveDate) -> Option<TimePeriod> {
        let lower = query.to_lowercase();

        let last_days = LAST_N_DAYS.captures(&lower).and_then(|caps| {
            let days = caps.get(1).or_else(|| caps.get(2))?.as_str().parse::<u64>().ok()?;
            Some((days, today.checked_sub_days(Days::new(days))?))
        });
        if let Some((days, start)) = last_days {
            return Some(TimePeriod {
                start_date: format_date(start),
                end_date: format_date(today),
                description: format!("Last {} days", days),
            });
        }

        TIME_PATTERNS
            .iter()
            .find(|(regex, _, _)| regex.is_match(&lower))
            .and_then(|(_, description, window)| {
                let (start, end) = window.bounds(today)?;
                Some(TimePeriod {
                    start_date: format_date(start),
                    end_date: format_date(end),
                    description: description.to_string(),
                })
            })
    }

    /// Detect aggregation intent (first match wins).
    pub fn detect_statistical_intent(query: &str) -> Option<StatisticalInfo> {
        let lower = query.to_lowercase();
        STAT_PATTERNS
            .iter()
            .find(|(regex, _)| regex.is_match(&lower))
            .map(|(_, aggregation)| StatisticalInfo::from(*aggregation))
    }

    /// Build a literal date-range predicate for `column`.
    ///
    /// The end bound is extended to `23:59:59` so the last day is inclusive
    /// for `DATETIME` columns.
    pub fn build_time_filter(period: &TimePeriod, column: &str) -> String {
        format!(
            "{} BETWEEN '{}' AND '{} 23:59:59'",
            column, period.start_date, period.end_date
        )
    }
}
