//! Recurring time windows.
//!
//! A [`TimeSpecification`] filters instants along three independent
//! dimensions: day of week, time of day, and calendar date. Each dimension is
//! optional; an absent dimension matches everything. All dimensions are
//! evaluated in the specification's own UTC offset, never the server's.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Offset, Utc, Weekday};
use gatekeep_types::TimeSpecId;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::model::TimeSpecRow;

// ============================================================================
// Event Time
// ============================================================================

/// The instant at which a card was presented.
///
/// Controllers that lost their clock report [`EventTime::Unknown`]. Only
/// rules without a time specification can match such an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventTime {
    Known(DateTime<FixedOffset>),
    Unknown,
}

impl EventTime {
    /// Returns the concrete timestamp, or `None` for [`EventTime::Unknown`].
    pub fn known(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Self::Known(ts) => Some(ts),
            Self::Unknown => None,
        }
    }
}

impl From<DateTime<FixedOffset>> for EventTime {
    fn from(ts: DateTime<FixedOffset>) -> Self {
        Self::Known(ts)
    }
}

impl From<DateTime<Utc>> for EventTime {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Known(ts.fixed_offset())
    }
}

// ============================================================================
// Dimensions
// ============================================================================

/// Seven-bit day-of-week set. Bit 0 is Monday, bit 6 is Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeekdayMask(u8);

impl WeekdayMask {
    /// Every day of the week.
    pub const ALL: WeekdayMask = WeekdayMask(0b111_1111);
    /// Monday through Friday.
    pub const WORKDAYS: WeekdayMask = WeekdayMask(0b001_1111);
    /// Saturday and Sunday.
    pub const WEEKEND: WeekdayMask = WeekdayMask(0b110_0000);

    /// Creates a mask from raw bits. Returns `None` if bit 7 is set.
    pub fn from_bits(bits: u8) -> Option<Self> {
        (bits & 0x80 == 0).then_some(Self(bits))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }
}

/// Inclusive time-of-day range. When `to` is earlier than `from` the range
/// wraps past midnight, so `22:00..06:00` covers the night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeOfDayRange {
    pub from: NaiveTime,
    pub to: NaiveTime,
}

impl TimeOfDayRange {
    pub fn new(from: NaiveTime, to: NaiveTime) -> Self {
        Self { from, to }
    }

    pub fn wraps_midnight(&self) -> bool {
        self.to < self.from
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.wraps_midnight() {
            time >= self.from || time <= self.to
        } else {
            self.from <= time && time <= self.to
        }
    }
}

/// Inclusive calendar date range. Never wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

// ============================================================================
// TimeSpecification
// ============================================================================

/// A validated recurring time window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSpecification {
    pub weekdays: Option<WeekdayMask>,
    pub time_of_day: Option<TimeOfDayRange>,
    pub dates: Option<DateRange>,
    /// Offset in which every dimension is evaluated.
    pub offset: FixedOffset,
}

impl Default for TimeSpecification {
    fn default() -> Self {
        Self::always()
    }
}

impl TimeSpecification {
    /// A specification with every dimension absent, evaluated in UTC.
    pub fn always() -> Self {
        Self {
            weekdays: None,
            time_of_day: None,
            dates: None,
            offset: Utc.fix(),
        }
    }

    /// Restricts the days of the week.
    pub fn with_weekdays(mut self, mask: WeekdayMask) -> Self {
        self.weekdays = Some(mask);
        self
    }

    /// Restricts the time of day (inclusive, wrapping past midnight if `to < from`).
    pub fn with_time_of_day(mut self, from: NaiveTime, to: NaiveTime) -> Self {
        self.time_of_day = Some(TimeOfDayRange::new(from, to));
        self
    }

    /// Restricts the calendar dates (inclusive).
    pub fn with_dates(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.dates = Some(DateRange::new(from, to));
        self
    }

    /// Sets the UTC offset in which the window is evaluated.
    pub fn in_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Returns true if `instant` falls inside every present dimension.
    pub fn contains(&self, instant: &DateTime<FixedOffset>) -> bool {
        let local = instant.with_timezone(&self.offset);

        self.weekdays.is_none_or(|mask| mask.contains(local.weekday()))
            && self
                .time_of_day
                .is_none_or(|range| range.contains(local.time()))
            && self.dates.is_none_or(|range| range.contains(local.date_naive()))
    }

    /// Validates a raw row into a specification.
    ///
    /// Bounds must come in pairs, the weekday mask must fit in seven bits,
    /// date ranges must not be inverted, and the offset must be a valid
    /// UTC offset.
    pub fn from_row(row: &TimeSpecRow) -> Result<Self, ConfigurationError> {
        let time_spec = row.id;

        let weekdays = row
            .weekday_mask
            .map(|mask| {
                WeekdayMask::from_bits(mask)
                    .ok_or(ConfigurationError::InvalidWeekdayMask { time_spec, mask })
            })
            .transpose()?;

        let time_of_day = match (row.time_from, row.time_to) {
            (Some(from), Some(to)) => Some(TimeOfDayRange::new(from, to)),
            (None, None) => None,
            _ => return Err(ConfigurationError::UnpairedTimeBounds { time_spec }),
        };

        let dates = match (row.date_from, row.date_to) {
            (Some(from), Some(to)) if to < from => {
                return Err(ConfigurationError::InvertedDateRange {
                    time_spec,
                    from,
                    to,
                });
            }
            (Some(from), Some(to)) => Some(DateRange::new(from, to)),
            (None, None) => None,
            _ => return Err(ConfigurationError::UnpairedDateBounds { time_spec }),
        };

        let offset = offset_from_minutes(time_spec, row.utc_offset_minutes)?;

        Ok(Self {
            weekdays,
            time_of_day,
            dates,
            offset,
        })
    }
}

/// Evaluates an optional specification. `None` matches every instant.
pub fn matches(spec: Option<&TimeSpecification>, instant: &DateTime<FixedOffset>) -> bool {
    spec.is_none_or(|spec| spec.contains(instant))
}

fn offset_from_minutes(
    time_spec: TimeSpecId,
    minutes: i32,
) -> Result<FixedOffset, ConfigurationError> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or(ConfigurationError::InvalidUtcOffset { time_spec, minutes })
}

// ============================================================================
// Tests
// ============================================================================
