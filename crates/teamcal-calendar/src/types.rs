//! Calendar event types, filters and search parameters.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CalendarError;

/// Kind of calendar entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Task,
    Meeting,
    Milestone,
    Deadline,
    Reminder,
    Vacation,
    Holiday,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Meeting => "meeting",
            Self::Milestone => "milestone",
            Self::Deadline => "deadline",
            Self::Reminder => "reminder",
            Self::Vacation => "vacation",
            Self::Holiday => "holiday",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Personal,
    Team,
    Project,
    Company,
    Client,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Team => "team",
            Self::Project => "project",
            Self::Company => "company",
            Self::Client => "client",
        }
    }
}

/// Event priority. Ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
    OnHold,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::OnHold => "on_hold",
        }
    }
}

/// Calendar event as held in memory.
///
/// Invariant: `end`, when present, is not before `start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub all_day: bool,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub category: EventCategory,
    pub priority: Priority,
    pub status: EventStatus,
    pub owner_id: String,
    pub assignee_ids: BTreeSet<String>,
    pub team_id: Option<String>,
    pub project_id: Option<String>,
    pub tags: BTreeSet<String>,
    pub location: Option<String>,
    pub meeting_url: Option<String>,
    pub editable: bool,
    pub deletable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_by: String,
}

impl CalendarEvent {
    /// Effective end of the event; events without an end are instantaneous.
    pub fn end_or_start(&self) -> DateTime<Utc> {
        self.end.unwrap_or(self.start)
    }
}

/// Event as it travels over the wire, with dates as ISO-8601 strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub category: EventCategory,
    pub priority: Priority,
    pub status: EventStatus,
    pub owner_id: String,
    #[serde(default)]
    pub assignee_ids: BTreeSet<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub meeting_url: Option<String>,
    #[serde(default = "default_true")]
    pub editable: bool,
    #[serde(default = "default_true")]
    pub deletable: bool,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub updated_by: String,
}

fn default_true() -> bool {
    true
}

/// API response for an event listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEventList {
    #[serde(default)]
    pub events: Vec<ApiEvent>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// A page of events with dates already converted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPage {
    pub events: Vec<CalendarEvent>,
    pub total: u64,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

impl TryFrom<ApiEventList> for EventPage {
    type Error = CalendarError;

    fn try_from(list: ApiEventList) -> Result<Self, Self::Error> {
        let events = list
            .events
            .into_iter()
            .map(CalendarEvent::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            events,
            total: list.total,
            has_more: list.has_more,
            next_cursor: list.next_cursor,
        })
    }
}

impl TryFrom<ApiEvent> for CalendarEvent {
    type Error = CalendarError;

    fn try_from(api: ApiEvent) -> Result<Self, Self::Error> {
        let start = parse_instant("start", &api.start)?;
        let end = api
            .end
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| parse_instant("end", s))
            .transpose()?;

        if let Some(end) = end {
            if end < start {
                return Err(CalendarError::InvalidEventData(format!(
                    "event {} ends before it starts",
                    api.id
                )));
            }
        }

        Ok(Self {
            start,
            end,
            created_at: parse_instant("createdAt", &api.created_at)?,
            updated_at: parse_instant("updatedAt", &api.updated_at)?,
            id: api.id,
            title: api.title,
            description: api.description,
            all_day: api.all_day,
            event_type: api.event_type,
            category: api.category,
            priority: api.priority,
            status: api.status,
            owner_id: api.owner_id,
            assignee_ids: api.assignee_ids,
            team_id: api.team_id,
            project_id: api.project_id,
            tags: api.tags,
            location: api.location,
            meeting_url: api.meeting_url,
            editable: api.editable,
            deletable: api.deletable,
            created_by: api.created_by,
            updated_by: api.updated_by,
        })
    }
}

impl From<&CalendarEvent> for ApiEvent {
    fn from(event: &CalendarEvent) -> Self {
        Self {
            id: event.id.clone(),
            title: event.title.clone(),
            description: event.description.clone(),
            start: format_instant(event.start),
            end: event.end.map(format_instant),
            all_day: event.all_day,
            event_type: event.event_type,
            category: event.category,
            priority: event.priority,
            status: event.status,
            owner_id: event.owner_id.clone(),
            assignee_ids: event.assignee_ids.clone(),
            team_id: event.team_id.clone(),
            project_id: event.project_id.clone(),
            tags: event.tags.clone(),
            location: event.location.clone(),
            meeting_url: event.meeting_url.clone(),
            editable: event.editable,
            deletable: event.deletable,
            created_at: format_instant(event.created_at),
            updated_at: format_instant(event.updated_at),
            created_by: event.created_by.clone(),
            updated_by: event.updated_by.clone(),
        }
    }
}

/// Format an instant the way the events API expects: RFC 3339, millisecond
/// precision, `Z` suffix.
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an ISO-8601 timestamp, accepting bare `YYYY-MM-DD` dates as UTC midnight.
pub fn parse_instant(field: &str, value: &str) -> Result<DateTime<Utc>, CalendarError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            CalendarError::InvalidEventData(format!("{} is not a valid date: {:?}", field, value))
        })
}

/// Payload for creating an event. The server assigns id and audit fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    pub all_day: bool,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub category: EventCategory,
    pub priority: Priority,
    pub status: EventStatus,
    pub assignee_ids: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub tags: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_url: Option<String>,
}

impl NewEvent {
    /// Minimal draft: a planned, medium-priority personal event.
    pub fn new(title: impl Into<String>, event_type: EventType, start: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            description: None,
            start,
            end: None,
            all_day: false,
            event_type,
            category: EventCategory::Personal,
            priority: Priority::Medium,
            status: EventStatus::Planned,
            assignee_ids: BTreeSet::new(),
            team_id: None,
            project_id: None,
            tags: BTreeSet::new(),
            location: None,
            meeting_url: None,
        }
    }

    pub fn validate(&self) -> Result<(), CalendarError> {
        if self.title.trim().is_empty() {
            return Err(CalendarError::InvalidEventData(
                "title cannot be empty".to_string(),
            ));
        }
        check_span(self.start, self.end)
    }
}

/// Partial update. Only `Some` fields are sent. The nullable fields take a
/// nested option: `Some(None)` is sent as `null` and clears the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<EventCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_ids: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_url: Option<Option<String>>,
}

impl EventPatch {
    pub fn validate(&self) -> Result<(), CalendarError> {
        if matches!(&self.title, Some(t) if t.trim().is_empty()) {
            return Err(CalendarError::InvalidEventData(
                "title cannot be empty".to_string(),
            ));
        }
        match self.start {
            Some(start) => check_span(start, self.end),
            None => Ok(()),
        }
    }
}

fn check_span(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<(), CalendarError> {
    match end {
        Some(end) if end < start => Err(CalendarError::InvalidEventData(
            "end must not be before start".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Event dimension a filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterFacet {
    Type,
    Category,
    Priority,
    Status,
    Assignee,
    Team,
    Project,
}

/// A named facet filter. `id` is unique within the active filter list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub facet: FilterFacet,
    pub values: BTreeSet<String>,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Filter {
    /// Build an active filter.
    pub fn new<I, S>(id: impl Into<String>, name: impl Into<String>, facet: FilterFacet, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            facet,
            values: values.into_iter().map(Into::into).collect(),
            active: true,
            color: None,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Date window used for searching. Both ends are inclusive when filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Start,
    End,
    Title,
    Priority,
    Status,
    CreatedAt,
    UpdatedAt,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
            Self::Title => "title",
            Self::Priority => "priority",
            Self::Status => "status",
            Self::CreatedAt => "createdAt",
            Self::UpdatedAt => "updatedAt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Free-text query, date window, facet filters and ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub query: String,
    pub date_range: Option<DateRange>,
    pub filters: Vec<Filter>,
    pub sort_by: SortKey,
    pub sort_order: SortDirection,
}

impl SearchParams {
    pub fn active_filters(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter().filter(|f| f.active)
    }

    /// Apply overrides on top of these params.
    pub fn merged(&self, overrides: &SearchOverrides) -> Self {
        Self {
            query: overrides.query.clone().unwrap_or_else(|| self.query.clone()),
            date_range: overrides.date_range.or(self.date_range),
            filters: overrides
                .filters
                .clone()
                .unwrap_or_else(|| self.filters.clone()),
            sort_by: overrides.sort_by.unwrap_or(self.sort_by),
            sort_order: overrides.sort_order.unwrap_or(self.sort_order),
        }
    }
}

/// Per-call overrides accepted by `CalendarFacade::load_events`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOverrides {
    pub query: Option<String>,
    pub date_range: Option<DateRange>,
    pub filters: Option<Vec<Filter>>,
    pub sort_by: Option<SortKey>,
    pub sort_order: Option<SortDirection>,
}
