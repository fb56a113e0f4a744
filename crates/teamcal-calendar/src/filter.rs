//! Reduces the loaded events to the subset currently visible.
//!
//! An event is visible when it passes, in order: the free-text query, the
//! date range (anchored on `start` only) and the facet filters. Active
//! filters are OR-combined regardless of facet.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};

use crate::types::{CalendarEvent, DateRange, Filter, FilterFacet, SearchParams, SortDirection, SortKey};

/// Case-insensitive substring match on title, description or any tag. The
/// query is used as typed; only the empty string matches everything.
pub fn matches_query(event: &CalendarEvent, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();

    event.title.to_lowercase().contains(&needle)
        || event
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(&needle))
        || event.tags.iter().any(|t| t.to_lowercase().contains(&needle))
}

pub fn matches_date_range(event: &CalendarEvent, range: Option<&DateRange>) -> bool {
    range.map_or(true, |r| r.contains(event.start))
}

/// Does a single filter's facet predicate hold for the event.
pub fn matches_filter(event: &CalendarEvent, filter: &Filter) -> bool {
    let values = &filter.values;
    match filter.facet {
        FilterFacet::Type => values.contains(event.event_type.as_str()),
        FilterFacet::Category => values.contains(event.category.as_str()),
        FilterFacet::Priority => values.contains(event.priority.as_str()),
        FilterFacet::Status => values.contains(event.status.as_str()),
        FilterFacet::Assignee => event.assignee_ids.iter().any(|a| values.contains(a)),
        FilterFacet::Team => event.team_id.as_ref().is_some_and(|t| values.contains(t)),
        FilterFacet::Project => event.project_id.as_ref().is_some_and(|p| values.contains(p)),
    }
}

pub fn matches_facets(event: &CalendarEvent, filters: &[Filter]) -> bool {
    let mut active = filters.iter().filter(|f| f.active).peekable();
    if active.peek().is_none() {
        return true;
    }
    active.any(|f| matches_filter(event, f))
}

pub fn event_passes(event: &CalendarEvent, params: &SearchParams) -> bool {
    matches_query(event, &params.query)
        && matches_date_range(event, params.date_range.as_ref())
        && matches_facets(event, &params.filters)
}

/// Visible events, ordered by the params' sort key.
pub fn filter_events<'a>(events: &'a [CalendarEvent], params: &SearchParams) -> Vec<&'a CalendarEvent> {
    let mut visible: Vec<&CalendarEvent> = events.iter().filter(|e| event_passes(e, params)).collect();
    sort_events(&mut visible, params.sort_by, params.sort_order);
    visible
}

/// Visible events starting on the given (UTC) calendar day.
pub fn events_for_date<'a>(
    events: &'a [CalendarEvent],
    params: &SearchParams,
    date: NaiveDate,
) -> Vec<&'a CalendarEvent> {
    filter_events(events, params)
        .into_iter()
        .filter(|e| e.start.date_naive() == date)
        .collect()
}

/// Visible events starting within `[start, end]`.
pub fn events_in_range<'a>(
    events: &'a [CalendarEvent],
    params: &SearchParams,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<&'a CalendarEvent> {
    let window = DateRange::new(start, end);
    filter_events(events, params)
        .into_iter()
        .filter(|e| window.contains(e.start))
        .collect()
}

/// The next `limit` visible events starting at or after `now`, soonest first.
pub fn upcoming<'a>(
    events: &'a [CalendarEvent],
    params: &SearchParams,
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<&'a CalendarEvent> {
    let mut next: Vec<&CalendarEvent> = events
        .iter()
        .filter(|e| e.start >= now && event_passes(e, params))
        .collect();
    sort_events(&mut next, SortKey::Start, SortDirection::Asc);
    next.truncate(limit);
    next
}

pub fn is_event_visible(events: &[CalendarEvent], params: &SearchParams, event: &CalendarEvent) -> bool {
    filter_events(events, params).iter().any(|e| e.id == event.id)
}

/// Stable sort; ties keep their loaded order.
pub fn sort_events(events: &mut [&CalendarEvent], key: SortKey, direction: SortDirection) {
    events.sort_by(|a, b| {
        let ord = compare(a, b, key);
        match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
}

fn compare(a: &CalendarEvent, b: &CalendarEvent, key: SortKey) -> Ordering {
    match key {
        SortKey::Start => a.start.cmp(&b.start),
        SortKey::End => a.end_or_start().cmp(&b.end_or_start()),
        SortKey::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        SortKey::Priority => a.priority.cmp(&b.priority),
        SortKey::Status => a.status.cmp(&b.status),
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    }
}
