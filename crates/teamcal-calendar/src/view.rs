//! Calendar view configuration and the visible window it implies.

use std::str::FromStr;

use chrono::{Datelike, Days, Duration, Months, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use teamcal_core::{BusinessHoursConfig, CalendarConfig, ConfigError};

use crate::types::DateRange;

/// Days shown by the agenda view.
pub const AGENDA_DAYS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarView {
    #[default]
    Month,
    Week,
    Day,
    Agenda,
}

impl FromStr for CalendarView {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "month" => Ok(Self::Month),
            "week" => Ok(Self::Week),
            "day" => Ok(Self::Day),
            "agenda" => Ok(Self::Agenda),
            other => Err(ConfigError::Invalid(format!("unknown calendar view '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Date the view is anchored on
    pub date: NaiveDate,
    pub view: CalendarView,
    pub editable: bool,
    pub selectable: bool,
    pub business_hours: BusinessHoursConfig,
    pub locale: String,
    pub week_starts_on_monday: bool,
}

/// Field-wise update for `ViewConfig`; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewConfigPatch {
    pub date: Option<NaiveDate>,
    pub view: Option<CalendarView>,
    pub editable: Option<bool>,
    pub selectable: Option<bool>,
    pub business_hours: Option<BusinessHoursConfig>,
    pub locale: Option<String>,
    pub week_starts_on_monday: Option<bool>,
}

impl ViewConfig {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            view: CalendarView::Month,
            editable: true,
            selectable: true,
            business_hours: BusinessHoursConfig::default(),
            locale: "en".to_string(),
            week_starts_on_monday: true,
        }
    }

    pub fn from_config(config: &CalendarConfig, today: NaiveDate) -> Result<Self, ConfigError> {
        Ok(Self {
            view: config.default_view.parse()?,
            business_hours: config.business_hours,
            locale: config.locale.clone(),
            week_starts_on_monday: config.week_starts_on_monday,
            ..Self::new(today)
        })
    }

    pub fn merge(&self, patch: &ViewConfigPatch) -> Self {
        Self {
            date: patch.date.unwrap_or(self.date),
            view: patch.view.unwrap_or(self.view),
            editable: patch.editable.unwrap_or(self.editable),
            selectable: patch.selectable.unwrap_or(self.selectable),
            business_hours: patch.business_hours.unwrap_or(self.business_hours),
            locale: patch.locale.clone().unwrap_or_else(|| self.locale.clone()),
            week_starts_on_monday: patch
                .week_starts_on_monday
                .unwrap_or(self.week_starts_on_monday),
        }
    }

    /// Window of time the current view shows, both ends inclusive.
    pub fn visible_range(&self) -> DateRange {
        let (first, days_after) = match self.view {
            CalendarView::Month => {
                let first = self.date.with_day(1).unwrap_or(self.date);
                let next = first.checked_add_months(Months::new(1)).unwrap_or(first);
                (first, (next - first).num_days())
            }
            CalendarView::Week => (self.week_start(), 7),
            CalendarView::Day => (self.date, 1),
            CalendarView::Agenda => (self.date, AGENDA_DAYS as i64),
        };

        let start = first.and_time(NaiveTime::MIN).and_utc();
        let end = start + Duration::days(days_after) - Duration::milliseconds(1);
        DateRange::new(start, end)
    }

    fn week_start(&self) -> NaiveDate {
        let offset = if self.week_starts_on_monday {
            self.date.weekday().num_days_from_monday()
        } else {
            self.date.weekday().num_days_from_sunday()
        };
        self.date
            .checked_sub_days(Days::new(u64::from(offset)))
            .unwrap_or(self.date)
    }
}

/// Move `date` by whole months, clamping to the end of shorter months.
pub fn shift_month(date: NaiveDate, delta: i32) -> NaiveDate {
    let months = Months::new(delta.unsigned_abs());
    let shifted = if delta >= 0 {
        date.checked_add_months(months)
    } else {
        date.checked_sub_months(months)
    };
    shifted.unwrap_or(date)
}
