//! End-to-end facade behaviour against an in-memory gateway and a manual clock.
#![allow(clippy::unwrap_used)]

mod common;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use common::{harness, harness_with, now, Op, SLOW_QUERY};
use teamcal_calendar::facade::{PROJECT_FILTER_ID, TEAM_FILTER_ID};
use teamcal_calendar::{
    CalendarContext, CalendarError, CalendarView, EventPatch, EventType, Filter, FilterFacet,
    NewEvent, Priority, SearchOverrides, ViewConfigPatch,
};
use teamcal_core::NetworkError;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_load_populates_store() {
    let h = harness();

    h.facade.load_events(None).await;

    let state = h.facade.state();
    assert_eq!(state.events.len(), 3);
    assert!(!state.loading);
    assert!(state.error.is_none());
    assert_eq!(h.gateway.calls(Op::List), 1);
}

#[tokio::test]
async fn test_load_requests_visible_window_when_no_range_is_set() {
    let h = harness();

    h.facade.load_events(None).await;

    let params = h.gateway.last_list_params().unwrap();
    let range = params.date_range.unwrap();
    assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    assert_eq!(range.end.date_naive(), date(2024, 3, 31));
    // The store keeps its own (empty) range; only the request is widened.
    assert!(h.facade.state().search_params.date_range.is_none());
}

#[tokio::test]
async fn test_repeated_load_within_ttl_uses_cache() {
    let h = harness();

    h.facade.load_events(None).await;
    h.clock.advance(Duration::minutes(4));
    h.facade.load_events(None).await;
    assert_eq!(h.gateway.calls(Op::List), 1);

    h.clock.advance(Duration::minutes(2));
    h.facade.load_events(None).await;
    assert_eq!(h.gateway.calls(Op::List), 2);
}

#[tokio::test]
async fn test_overrides_apply_to_one_load_only() {
    let h = harness();

    h.facade
        .load_events(Some(SearchOverrides {
            query: Some("retro".to_string()),
            ..Default::default()
        }))
        .await;

    assert_eq!(h.gateway.last_list_params().unwrap().query, "retro");
    assert!(h.facade.state().search_params.query.is_empty());
}

#[tokio::test]
async fn test_create_appends_and_invalidates_cache() {
    let h = harness();
    h.facade.load_events(None).await;
    h.facade.show_create_modal();

    let start = Utc.with_ymd_and_hms(2024, 3, 20, 10, 0, 0).unwrap();
    let created = h
        .facade
        .create_event(NewEvent::new("Kickoff", EventType::Meeting, start))
        .await;

    assert!(created);
    let state = h.facade.state();
    assert_eq!(state.events.len(), 4);
    assert!(!state.modals.create_open);
    assert_eq!(state.selected_event.as_ref().unwrap().title, "Kickoff");
    assert!(h.cache.is_empty());

    // Still inside the ttl window, but the write must be visible.
    h.facade.load_events(None).await;
    assert_eq!(h.gateway.calls(Op::List), 2);
    assert_eq!(h.facade.state().events.len(), 4);
}

#[tokio::test]
async fn test_failed_delete_leaves_events_untouched() {
    let h = harness();
    h.facade.load_events(None).await;
    let before = h.facade.state().events;

    h.gateway.fail(Op::Delete, CalendarError::http(500, "Database unavailable"));
    let deleted = h.facade.delete_event("e1").await;

    assert!(!deleted);
    let state = h.facade.state();
    assert_eq!(state.events, before);
    assert_eq!(state.error.as_deref(), Some("Database unavailable"));
    assert!(!state.loading);
}

#[tokio::test]
async fn test_http_error_without_message_uses_fallback() {
    let h = harness();
    h.gateway.fail(Op::Delete, CalendarError::http(500, ""));

    h.facade.delete_event("e1").await;

    assert_eq!(
        h.facade.state().error.as_deref(),
        Some("Failed to delete event (HTTP 500)")
    );
}

#[tokio::test]
async fn test_delete_removes_and_clears_selection() {
    let h = harness();
    h.facade.load_events(None).await;
    let target = h.facade.state().event("e1").cloned().unwrap();
    h.facade.select_event(Some(target.clone()));
    h.facade.show_delete_modal(target);

    assert!(h.facade.delete_event("e1").await);

    let state = h.facade.state();
    assert!(state.event("e1").is_none());
    assert!(state.selected_event.is_none());
    assert!(!state.modals.delete_open);
    assert!(h.gateway.stored("e1").is_none());
}

#[tokio::test]
async fn test_update_replaces_event() {
    let h = harness();
    h.facade.load_events(None).await;
    let target = h.facade.state().event("e3").cloned().unwrap();
    h.facade.select_event(Some(target.clone()));
    h.facade.show_edit_modal(target);

    let patch = EventPatch {
        title: Some("Sprint retro".to_string()),
        priority: Some(Priority::High),
        ..Default::default()
    };
    assert!(h.facade.update_event("e3", patch).await);

    let state = h.facade.state();
    let updated = state.event("e3").unwrap();
    assert_eq!(updated.title, "Sprint retro");
    assert_eq!(updated.priority, Priority::High);
    assert_eq!(state.selected_event.as_ref().unwrap().title, "Sprint retro");
    assert!(!state.modals.edit_open);
    assert_eq!(state.events.len(), 3);
}

#[tokio::test]
async fn test_update_can_clear_location() {
    let h = harness();
    h.facade.load_events(None).await;

    let set = EventPatch {
        location: Some(Some("Room 4".to_string())),
        ..Default::default()
    };
    assert!(h.facade.update_event("e1", set).await);
    assert_eq!(
        h.facade.state().event("e1").unwrap().location.as_deref(),
        Some("Room 4")
    );

    let clear = EventPatch {
        location: Some(None),
        ..Default::default()
    };
    assert!(h.facade.update_event("e1", clear).await);
    assert!(h.facade.state().event("e1").unwrap().location.is_none());
    assert!(h.gateway.stored("e1").unwrap().location.is_none());
}

#[tokio::test]
async fn test_update_unknown_event_reports_not_found() {
    let h = harness();
    h.facade.load_events(None).await;

    let patch = EventPatch {
        title: Some("Nope".to_string()),
        ..Default::default()
    };
    assert!(!h.facade.update_event("missing", patch).await);
    assert_eq!(h.facade.state().error.as_deref(), Some("Event not found"));
    assert_eq!(h.facade.state().events.len(), 3);
}

#[tokio::test]
async fn test_invalid_create_never_reaches_gateway() {
    let h = harness();

    let created = h
        .facade
        .create_event(NewEvent::new("   ", EventType::Task, now()))
        .await;

    assert!(!created);
    assert_eq!(h.gateway.calls(Op::Create), 0);
    let error = h.facade.state().error.unwrap();
    assert!(error.starts_with("Invalid event"));
}

#[tokio::test]
async fn test_failed_load_keeps_previous_events() {
    let h = harness();
    h.facade.load_events(None).await;

    h.gateway.fail(
        Op::List,
        CalendarError::Network(NetworkError::ConnectionFailed("refused".to_string())),
    );
    h.facade.set_query("standup");
    h.facade
        .load_events(Some(SearchOverrides {
            query: Some("anything".to_string()),
            ..Default::default()
        }))
        .await;

    let state = h.facade.state();
    assert_eq!(state.events.len(), 3);
    assert_eq!(
        state.error.as_deref(),
        Some("Unable to connect. Check your internet connection.")
    );
    assert!(!state.loading);

    h.gateway.recover(Op::List);
    h.facade.load_events(None).await;
    assert!(h.facade.state().error.is_none());
}

#[tokio::test]
async fn test_stale_load_is_dropped() {
    let h = harness();

    let slow = h.facade.load_events(Some(SearchOverrides {
        query: Some(SLOW_QUERY.to_string()),
        ..Default::default()
    }));
    let fast = h.facade.load_events(None);
    tokio::join!(slow, fast);

    // The slow call answers with no events after the fast one landed.
    let state = h.facade.state();
    assert_eq!(state.events.len(), 3);
    assert!(!state.loading);
    assert_eq!(h.gateway.calls(Op::List), 2);
}

#[tokio::test]
async fn test_create_during_pending_load_survives() {
    let h = harness();
    let gate = h.gateway.hold_lists();

    let load = h.facade.load_events(None);
    let write = async {
        let start = Utc.with_ymd_and_hms(2024, 3, 20, 10, 0, 0).unwrap();
        assert!(
            h.facade
                .create_event(NewEvent::new("Kickoff", EventType::Meeting, start))
                .await
        );
        // The listing is still parked.
        assert!(h.facade.state().loading);
        gate.notify_one();
    };
    tokio::join!(load, write);

    // The page read before the write must not replace it.
    let state = h.facade.state();
    assert!(state.event("evt-100").is_some());
    assert_eq!(state.events.len(), 1);
    assert!(!state.loading);
    assert!(h.cache.is_empty());

    h.gateway.release_lists();
    h.facade.load_events(None).await;
    assert_eq!(h.gateway.calls(Op::List), 2);
    assert_eq!(h.facade.state().events.len(), 4);
}

#[tokio::test]
async fn test_delete_during_pending_load_stays_deleted() {
    let h = harness();
    h.facade.load_events(None).await;
    let gate = h.gateway.hold_lists();

    let load = h.facade.load_events(Some(SearchOverrides {
        query: Some("retro".to_string()),
        ..Default::default()
    }));
    let write = async {
        assert!(h.facade.delete_event("e1").await);
        gate.notify_one();
    };
    tokio::join!(load, write);

    let state = h.facade.state();
    assert!(state.event("e1").is_none());
    assert_eq!(state.events.len(), 2);
    assert!(!state.loading);
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn test_set_date_unchanged_is_noop() {
    let h = harness();
    let rx = h.facade.subscribe();

    h.facade.set_date(date(2024, 3, 15)).await;

    assert_eq!(h.gateway.calls(Op::List), 0);
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test]
async fn test_set_date_within_window_does_not_reload() {
    let h = harness();

    h.facade.set_date(date(2024, 3, 28)).await;

    assert_eq!(h.facade.state().config.date, date(2024, 3, 28));
    assert_eq!(h.gateway.calls(Op::List), 0);
}

#[tokio::test]
async fn test_navigate_month_reloads_new_window() {
    let h = harness();

    h.facade.navigate_month(1).await;

    assert_eq!(h.facade.state().config.date, date(2024, 4, 15));
    assert_eq!(h.gateway.calls(Op::List), 1);
    let range = h.gateway.last_list_params().unwrap().date_range.unwrap();
    assert_eq!(range.start.date_naive(), date(2024, 4, 1));
    assert_eq!(range.end.date_naive(), date(2024, 4, 30));

    h.facade.navigate_month(-2).await;
    assert_eq!(h.facade.state().config.date, date(2024, 2, 15));
    assert_eq!(h.gateway.calls(Op::List), 2);
}

#[tokio::test]
async fn test_go_to_today_returns_to_clock_date() {
    let h = harness();
    h.facade.navigate_month(3).await;

    h.facade.go_to_today().await;

    assert_eq!(h.facade.state().config.date, date(2024, 3, 15));
    assert_eq!(h.gateway.calls(Op::List), 2);
}

#[tokio::test]
async fn test_view_change_reloads_only_when_window_moves() {
    let h = harness();

    h.facade.set_view(CalendarView::Month).await;
    assert_eq!(h.gateway.calls(Op::List), 0);

    h.facade.set_view(CalendarView::Week).await;
    assert_eq!(h.facade.state().config.view, CalendarView::Week);
    assert_eq!(h.gateway.calls(Op::List), 1);
    let range = h.gateway.last_list_params().unwrap().date_range.unwrap();
    assert_eq!(range.start.date_naive(), date(2024, 3, 11));

    h.facade
        .set_config(ViewConfigPatch {
            editable: Some(false),
            ..Default::default()
        })
        .await;
    assert!(!h.facade.state().config.editable);
    assert_eq!(h.gateway.calls(Op::List), 1);
}

#[tokio::test]
async fn test_context_scopes_loads_and_creates() {
    let h = harness_with(CalendarContext {
        team_id: Some("t-1".to_string()),
        project_id: Some("p-7".to_string()),
        initial_config: ViewConfigPatch {
            view: Some(CalendarView::Agenda),
            ..Default::default()
        },
    });
    assert_eq!(h.facade.state().config.view, CalendarView::Agenda);

    h.facade.load_events(None).await;

    let params = h.gateway.last_list_params().unwrap();
    let team = params.filters.iter().find(|f| f.id == TEAM_FILTER_ID).unwrap();
    assert!(team.active);
    assert_eq!(team.facet, FilterFacet::Team);
    assert!(team.values.contains("t-1"));
    assert!(params.filters.iter().any(|f| f.id == PROJECT_FILTER_ID));
    assert!(h.facade.state().search_params.filters.is_empty());

    let start = Utc.with_ymd_and_hms(2024, 3, 19, 9, 0, 0).unwrap();
    h.facade
        .create_event(NewEvent::new("Planning", EventType::Meeting, start))
        .await;
    let stored = h.gateway.stored("evt-100").unwrap();
    assert_eq!(stored.team_id.as_deref(), Some("t-1"));
    assert_eq!(stored.project_id.as_deref(), Some("p-7"));
}

#[tokio::test]
async fn test_filters_apply_locally_without_reload() {
    let h = harness();
    h.facade.load_events(None).await;

    h.facade.add_filter(Filter::new("meetings", "Meetings", FilterFacet::Type, ["meeting"]));
    let visible = h.facade.visible_events();
    assert_eq!(visible.len(), 2);
    assert!(visible.iter().all(|e| e.event_type == EventType::Meeting));

    h.facade.add_filter(Filter::new("urgent", "Urgent", FilterFacet::Priority, ["critical"]));
    assert_eq!(h.facade.visible_events().len(), 3);

    h.facade.toggle_filter("meetings");
    h.facade.toggle_filter("urgent");
    assert_eq!(h.facade.visible_events().len(), 3);

    h.facade.toggle_filter("urgent");
    let visible = h.facade.visible_events();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, "e2");
    assert!(h.facade.is_event_visible(&visible[0]));

    assert_eq!(h.gateway.calls(Op::List), 1);
}

#[tokio::test]
async fn test_date_helpers() {
    let h = harness();
    h.facade.load_events(None).await;

    let today = h.facade.events_for_date(date(2024, 3, 15));
    assert_eq!(today.len(), 1);
    assert_eq!(today[0].title, "Daily standup");

    let next_week = h.facade.events_in_range(
        Utc.with_ymd_and_hms(2024, 3, 18, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 24, 23, 59, 59).unwrap(),
    );
    assert_eq!(next_week.len(), 2);

    let upcoming = h.facade.upcoming(1);
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0].id, "e2");
}

#[tokio::test]
async fn test_subscribers_observe_load() {
    let h = harness();
    let mut rx = h.facade.subscribe();

    h.facade.load_events(None).await;

    assert!(rx.has_changed().unwrap());
    let snapshot = rx.borrow_and_update().clone();
    assert_eq!(snapshot.events.len(), 3);
    assert!(!snapshot.loading);
}
