use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::Source;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultDates {
    pub idr: NaiveDate,
    pub ssbd: NaiveDate,
    pub linked_data: NaiveDate,
    pub bia: NaiveDate,
}

impl Default for DefaultDates {
    fn default() -> Self {
        Self {
            idr: ymd(2016, 1, 1),
            ssbd: ymd(2025, 5, 12),
            linked_data: ymd(2024, 1, 1),
            bia: ymd(2024, 1, 1),
        }
    }
}

impl DefaultDates {
    pub fn for_source(&self, source: Source) -> NaiveDate {
        match source {
            Source::Idr => self.idr,
            Source::Ssbd => self.ssbd,
            Source::Bia => self.bia,
            Source::External => self.linked_data,
        }
    }
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

pub fn parse_or(input: Option<&str>, fallback: NaiveDate) -> NaiveDate {
    match input.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => parse_ymd(value).unwrap_or_else(|| {
            debug!(value, %fallback, "unparseable date, using fallback");
            fallback
        }),
        None => fallback,
    }
}

pub fn parse_first_or<S: AsRef<str>>(values: &[S], fallback: NaiveDate) -> NaiveDate {
    parse_or(values.first().map(AsRef::as_ref), fallback)
}

fn parse_ymd(value: &str) -> Option<NaiveDate> {
    let mut parts = value.split('-');
    let year = parts.next()?.trim().parse::<i32>().ok()?;
    let month = parts.next()?.trim().parse::<u32>().ok()?;
    let day = parts.next()?.trim().parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn year_of(value: &str) -> Option<i32> {
    value.trim().split('-').next()?.trim().parse().ok()
}
