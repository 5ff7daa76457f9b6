use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewLevel {
    Day,
    Week,
    Month,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeDirection {
    Forward,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    /// Towards `Day`.
    In,
    /// Towards `Year`.
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthCell {
    pub date: NaiveDate,
    pub is_current_month: bool,
}

/// Calendar cursor: the current date and the zoom level it is viewed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigator {
    pub current: NaiveDate,
    pub level: ViewLevel,
}

#[derive(thiserror::Error, Debug)]
#[error("unknown view level: {0}")]
pub struct UnknownLevel(String);

impl ViewLevel {
    pub const ORDER: [ViewLevel; 4] = [
        ViewLevel::Day,
        ViewLevel::Week,
        ViewLevel::Month,
        ViewLevel::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewLevel::Day => "day",
            ViewLevel::Week => "week",
            ViewLevel::Month => "month",
            ViewLevel::Year => "year",
        }
    }

    fn index(&self) -> usize {
        match self {
            ViewLevel::Day => 0,
            ViewLevel::Week => 1,
            ViewLevel::Month => 2,
            ViewLevel::Year => 3,
        }
    }

    /// Adjacent level in `ORDER`, clamped at both ends.
    pub fn zoomed(&self, direction: ZoomDirection) -> ViewLevel {
        let idx = self.index();
        let next = match direction {
            ZoomDirection::In => idx.saturating_sub(1),
            ZoomDirection::Out => (idx + 1).min(Self::ORDER.len() - 1),
        };
        Self::ORDER[next]
    }
}

impl fmt::Display for ViewLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViewLevel::ORDER
            .iter()
            .copied()
            .find(|l| l.as_str() == s.trim())
            .ok_or_else(|| UnknownLevel(s.to_string()))
    }
}

impl Navigator {
    pub fn new(current: NaiveDate, level: ViewLevel) -> Self {
        Navigator { current, level }
    }

    /// Moves one unit of the current level. Dates that would leave chrono's range stay put.
    pub fn navigate_period(self, direction: TimeDirection) -> Navigator {
        let d = self.current;
        let moved = match (self.level, direction) {
            (ViewLevel::Day, TimeDirection::Forward) => d.checked_add_signed(Duration::days(1)),
            (ViewLevel::Day, TimeDirection::Back) => d.checked_sub_signed(Duration::days(1)),
            (ViewLevel::Week, TimeDirection::Forward) => d.checked_add_signed(Duration::days(7)),
            (ViewLevel::Week, TimeDirection::Back) => d.checked_sub_signed(Duration::days(7)),
            (ViewLevel::Month, TimeDirection::Forward) => d.checked_add_months(Months::new(1)),
            (ViewLevel::Month, TimeDirection::Back) => d.checked_sub_months(Months::new(1)),
            (ViewLevel::Year, TimeDirection::Forward) => d.checked_add_months(Months::new(12)),
            (ViewLevel::Year, TimeDirection::Back) => d.checked_sub_months(Months::new(12)),
        };
        Navigator {
            current: moved.unwrap_or(d),
            ..self
        }
    }

    /// Changes level only; the current date is kept as-is in every direction.
    pub fn zoom(self, direction: ZoomDirection) -> Navigator {
        Navigator {
            level: self.level.zoomed(direction),
            ..self
        }
    }

    pub fn go_to(self, date: NaiveDate) -> Navigator {
        Navigator {
            current: date,
            ..self
        }
    }

    /// Whether the period on screen contains `today`.
    pub fn is_today(&self, today: NaiveDate) -> bool {
        match self.level {
            ViewLevel::Day => self.current == today,
            ViewLevel::Week => self.current.iso_week() == today.iso_week(),
            ViewLevel::Month => {
                self.current.year() == today.year() && self.current.month() == today.month()
            }
            ViewLevel::Year => self.current.year() == today.year(),
        }
    }

    pub fn period_key(&self) -> String {
        match self.level {
            ViewLevel::Day => day_key(self.current),
            ViewLevel::Week => week_key(self.current),
            ViewLevel::Month => month_key(self.current),
            ViewLevel::Year => year_key(self.current),
        }
    }

    pub fn header(&self) -> String {
        let d = self.current;
        match self.level {
            ViewLevel::Day => d.format("%A, %B %-d, %Y").to_string(),
            ViewLevel::Week => format!("Week {}, {}", iso_week_number(d), d.iso_week().year()),
            ViewLevel::Month => d.format("%B %Y").to_string(),
            ViewLevel::Year => d.year().to_string(),
        }
    }

    pub fn week_dates(&self) -> [NaiveDate; 7] {
        week_dates(self.current)
    }

    pub fn month_grid(&self) -> Vec<MonthCell> {
        month_grid(self.current)
    }

    pub fn year_months(&self) -> Vec<NaiveDate> {
        year_months(self.current.year())
    }
}

pub fn day_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

/// ISO week key; the year part is the ISO week-numbering year.
pub fn week_key(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{:04}-W{:02}", week.year(), week.week())
}

pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

pub fn year_key(date: NaiveDate) -> String {
    format!("{:04}", date.year())
}

pub fn parse_day_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key.trim(), "%Y-%m-%d").ok()
}

/// Thursday-anchored ISO 8601 week number.
pub fn iso_week_number(date: NaiveDate) -> u32 {
    date.iso_week().week()
}

/// Monday-start week containing `date`.
pub fn week_dates(date: NaiveDate) -> [NaiveDate; 7] {
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    let mut out = [monday; 7];
    for (offset, slot) in out.iter_mut().enumerate() {
        *slot = monday + Duration::days(offset as i64);
    }
    out
}

/// Six Monday-start weeks covering the month of `date`, padded with adjacent-month days.
pub fn month_grid(date: NaiveDate) -> Vec<MonthCell> {
    let first = date.with_day(1).unwrap_or(date);
    let start = first - Duration::days(i64::from(first.weekday().num_days_from_monday()));
    (0..42)
        .map(|offset| {
            let day = start + Duration::days(offset);
            MonthCell {
                date: day,
                is_current_month: day.month() == first.month() && day.year() == first.year(),
            }
        })
        .collect()
}

pub fn year_months(year: i32) -> Vec<NaiveDate> {
    (1..=12)
        .filter_map(|month| NaiveDate::from_ymd_opt(year, month, 1))
        .collect()
}
