//! Shared fixtures for facade integration tests.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use teamcal_calendar::types::format_instant;
use teamcal_calendar::{
    ApiEvent, ApiEventList, CalendarContext, CalendarError, CalendarFacade, EventCache,
    EventGateway, EventPatch, ManualClock, NewEvent, SearchParams,
};
use tokio::sync::Notify;

/// Query that makes the gateway answer slowly with an empty listing.
pub const SLOW_QUERY: &str = "slow";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    List,
    Create,
    Update,
    Delete,
}

/// Server double holding events in memory and counting every call.
#[derive(Default)]
pub struct InMemoryGateway {
    events: Mutex<Vec<ApiEvent>>,
    calls: Mutex<HashMap<Op, usize>>,
    failures: Mutex<HashMap<Op, CalendarError>>,
    last_list: Mutex<Option<SearchParams>>,
    next_id: AtomicUsize,
    list_gate: Mutex<Option<Arc<Notify>>>,
}

impl InMemoryGateway {
    pub fn with_events(events: Vec<ApiEvent>) -> Self {
        let gateway = Self::default();
        *gateway.events.lock() = events;
        gateway
    }

    pub fn calls(&self, op: Op) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    pub fn fail(&self, op: Op, error: CalendarError) {
        self.failures.lock().insert(op, error);
    }

    pub fn recover(&self, op: Op) {
        self.failures.lock().remove(&op);
    }

    /// Hold every listing after it has read the events until the returned
    /// gate is notified once per listing.
    pub fn hold_lists(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.list_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn release_lists(&self) {
        *self.list_gate.lock() = None;
    }

    pub fn last_list_params(&self) -> Option<SearchParams> {
        self.last_list.lock().clone()
    }

    pub fn stored(&self, id: &str) -> Option<ApiEvent> {
        self.events.lock().iter().find(|e| e.id == id).cloned()
    }

    fn record(&self, op: Op) -> Result<(), CalendarError> {
        *self.calls.lock().entry(op).or_insert(0) += 1;
        match self.failures.lock().get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EventGateway for InMemoryGateway {
    async fn list_events(&self, params: &SearchParams) -> Result<ApiEventList, CalendarError> {
        self.record(Op::List)?;
        *self.last_list.lock() = Some(params.clone());

        if params.query == SLOW_QUERY {
            tokio::time::sleep(Duration::from_millis(50)).await;
            return Ok(ApiEventList::default());
        }

        let events = self.events.lock().clone();
        let gate = self.list_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(ApiEventList {
            total: events.len() as u64,
            events,
            has_more: false,
            next_cursor: None,
        })
    }

    async fn create_event(&self, event: &NewEvent) -> Result<ApiEvent, CalendarError> {
        self.record(Op::Create)?;

        let id = format!("evt-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 100);
        let mut created = wire_event(&id, &event.title, &format_instant(event.start));
        created.end = event.end.map(format_instant);
        created.event_type = event.event_type;
        created.priority = event.priority;
        created.team_id = event.team_id.clone();
        created.project_id = event.project_id.clone();
        created.tags = event.tags.clone();

        self.events.lock().push(created.clone());
        Ok(created)
    }

    async fn update_event(&self, id: &str, patch: &EventPatch) -> Result<ApiEvent, CalendarError> {
        self.record(Op::Update)?;

        let mut events = self.events.lock();
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| CalendarError::http(404, "Event not found"))?;

        if let Some(title) = &patch.title {
            event.title = title.clone();
        }
        if let Some(description) = &patch.description {
            event.description = description.clone();
        }
        if let Some(location) = &patch.location {
            event.location = location.clone();
        }
        if let Some(meeting_url) = &patch.meeting_url {
            event.meeting_url = meeting_url.clone();
        }
        if let Some(start) = patch.start {
            event.start = format_instant(start);
        }
        if let Some(end) = patch.end {
            event.end = Some(format_instant(end));
        }
        if let Some(priority) = patch.priority {
            event.priority = priority;
        }
        if let Some(status) = patch.status {
            event.status = status;
        }
        Ok(event.clone())
    }

    async fn delete_event(&self, id: &str) -> Result<(), CalendarError> {
        self.record(Op::Delete)?;

        let mut events = self.events.lock();
        let before = events.len();
        events.retain(|e| e.id != id);
        if events.len() == before {
            return Err(CalendarError::http(404, "Event not found"));
        }
        Ok(())
    }
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
}

pub fn wire_event(id: &str, title: &str, start: &str) -> ApiEvent {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "title": title,
        "start": start,
        "type": "meeting",
        "category": "team",
        "priority": "medium",
        "status": "planned",
        "ownerId": "u-1",
        "createdAt": "2024-03-01T08:00:00.000Z",
        "updatedAt": "2024-03-01T08:00:00.000Z"
    }))
    .expect("valid wire event")
}

pub fn seed_events() -> Vec<ApiEvent> {
    let mut review = wire_event("e2", "Design review", "2024-03-18T14:00:00.000Z");
    review.event_type = teamcal_calendar::EventType::Task;
    review.priority = teamcal_calendar::Priority::Critical;

    vec![
        wire_event("e1", "Daily standup", "2024-03-15T09:00:00.000Z"),
        review,
        wire_event("e3", "Retro", "2024-03-22T16:00:00.000Z"),
    ]
}

pub struct Harness {
    pub gateway: Arc<InMemoryGateway>,
    pub clock: ManualClock,
    pub cache: Arc<EventCache>,
    pub facade: CalendarFacade,
}

pub fn harness() -> Harness {
    harness_with(CalendarContext::default())
}

pub fn harness_with(context: CalendarContext) -> Harness {
    let gateway = Arc::new(InMemoryGateway::with_events(seed_events()));
    let clock = ManualClock::new(now());
    let cache = Arc::new(EventCache::new(gateway.clone(), Arc::new(clock.clone())));
    let facade = CalendarFacade::new(gateway.clone(), cache.clone(), Arc::new(clock.clone()), context);

    Harness {
        gateway,
        clock,
        cache,
        facade,
    }
}
