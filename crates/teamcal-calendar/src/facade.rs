//! Single entry point for rendering surfaces.
//!
//! The facade owns one store and shares one cache with whoever built it.
//! Remote failures never propagate out of here: they are reduced to a string
//! and recorded in the store's `error` field.
//!
//! Store mutations happen only after the gateway confirms a write, and the
//! whole cache is evicted before the confirmed change is dispatched. Loads
//! are fenced by a sequence number: a response is applied only if no other
//! load started and no write was confirmed while it was in flight.
//!
//! `loading` stays set while any remote operation is pending, unless an
//! error has just been recorded.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use teamcal_core::{AppError, Config, ConfigError};
use tokio::sync::watch;

use crate::cache::EventCache;
use crate::clock::{Clock, SystemClock};
use crate::error::CalendarError;
use crate::filter;
use crate::gateway::{EventGateway, HttpEventGateway};
use crate::store::{Action, CalendarState, EventStateStore};
use crate::types::{
    CalendarEvent, DateRange, EventPatch, Filter, FilterFacet, NewEvent, SearchOverrides,
    SearchParams, SortDirection, SortKey,
};
use crate::view::{shift_month, CalendarView, ViewConfig, ViewConfigPatch};

const LOAD_FAILED: &str = "Failed to load events";
const CREATE_FAILED: &str = "Failed to create event";
const UPDATE_FAILED: &str = "Failed to update event";
const DELETE_FAILED: &str = "Failed to delete event";

pub const TEAM_FILTER_ID: &str = "context:team";
pub const PROJECT_FILTER_ID: &str = "context:project";

/// Scope supplied by the hosting surface.
#[derive(Debug, Clone, Default)]
pub struct CalendarContext {
    pub team_id: Option<String>,
    pub project_id: Option<String>,
    pub initial_config: ViewConfigPatch,
}

impl CalendarContext {
    /// Always-active filters restricting loads to the current team/project.
    fn scope_filters(&self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if let Some(team) = &self.team_id {
            filters.push(Filter::new(TEAM_FILTER_ID, "Team", FilterFacet::Team, [team.as_str()]));
        }
        if let Some(project) = &self.project_id {
            filters.push(Filter::new(
                PROJECT_FILTER_ID,
                "Project",
                FilterFacet::Project,
                [project.as_str()],
            ));
        }
        filters
    }
}

pub struct CalendarFacade {
    gateway: Arc<dyn EventGateway>,
    cache: Arc<EventCache>,
    clock: Arc<dyn Clock>,
    context: CalendarContext,
    store: Mutex<EventStateStore>,
    load_seq: AtomicU64,
    in_flight: AtomicUsize,
}

impl CalendarFacade {
    /// Build a facade whose view starts on today's date.
    pub fn new(
        gateway: Arc<dyn EventGateway>,
        cache: Arc<EventCache>,
        clock: Arc<dyn Clock>,
        context: CalendarContext,
    ) -> Self {
        let view = ViewConfig::new(clock.now().date_naive());
        Self::with_view(gateway, cache, clock, context, view)
    }

    /// Build a facade from an explicit base view. The context's initial
    /// config is merged on top.
    pub fn with_view(
        gateway: Arc<dyn EventGateway>,
        cache: Arc<EventCache>,
        clock: Arc<dyn Clock>,
        context: CalendarContext,
        base: ViewConfig,
    ) -> Self {
        let view = base.merge(&context.initial_config);
        Self {
            gateway,
            cache,
            clock,
            context,
            store: Mutex::new(EventStateStore::new(CalendarState::new(view))),
            load_seq: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Wire the HTTP gateway, system clock and a ttl cache from configuration.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let gateway: Arc<dyn EventGateway> = Arc::new(HttpEventGateway::from_config(&config.api)?);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let ttl = chrono::Duration::from_std(std::time::Duration::from_secs(config.cache.ttl_secs))
            .map_err(|e| ConfigError::Invalid(format!("cache.ttl_secs: {}", e)))?;
        let cache = Arc::new(EventCache::with_ttl(gateway.clone(), clock.clone(), ttl));

        let base = ViewConfig::from_config(&config.calendar, clock.now().date_naive())?;
        let context = CalendarContext {
            team_id: config.calendar.team_id.clone(),
            project_id: config.calendar.project_id.clone(),
            initial_config: ViewConfigPatch::default(),
        };

        tracing::info!(
            base_url = %config.api.base_url,
            ttl_secs = config.cache.ttl_secs,
            "Calendar facade ready"
        );
        Ok(Self::with_view(gateway, cache, clock, context, base))
    }

    pub fn context(&self) -> &CalendarContext {
        &self.context
    }

    // ========================================================================
    // Remote operations
    // ========================================================================

    /// Load events for the current search params, merged with `overrides`.
    ///
    /// Without an explicit date range the view's visible window is requested.
    pub async fn load_events(&self, overrides: Option<SearchOverrides>) {
        let seq = self.load_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let params = {
            let mut store = self.store.lock();
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            store.dispatch(Action::SetLoading(true));
            self.load_params(store.state(), overrides.as_ref())
        };

        tracing::info!(seq, query = %params.query, "Loading events");
        let result = self.cache.get(&params).await;

        if self.load_seq.load(Ordering::SeqCst) != seq {
            tracing::debug!(seq, "Dropping stale event load");
            self.finish(None);
            return;
        }

        let outcome = match result {
            Ok(page) => {
                tracing::info!(seq, count = page.events.len(), total = page.total, "Events loaded");
                Action::SetEvents(page.events)
            }
            Err(e) => failure(&e, LOAD_FAILED),
        };
        self.finish(Some(outcome));
    }

    fn load_params(&self, state: &CalendarState, overrides: Option<&SearchOverrides>) -> SearchParams {
        let mut params = match overrides {
            Some(o) => state.search_params.merged(o),
            None => state.search_params.clone(),
        };
        if params.date_range.is_none() {
            params.date_range = Some(state.config.visible_range());
        }
        for scope in self.context.scope_filters() {
            params.filters.retain(|f| f.id != scope.id);
            params.filters.push(scope);
        }
        params
    }

    /// Create an event. Returns whether the server accepted it.
    pub async fn create_event(&self, mut event: NewEvent) -> bool {
        if let Err(e) = event.validate() {
            self.dispatch(failure(&e, CREATE_FAILED));
            return false;
        }
        if event.team_id.is_none() {
            event.team_id = self.context.team_id.clone();
        }
        if event.project_id.is_none() {
            event.project_id = self.context.project_id.clone();
        }

        self.begin();
        let result = self
            .gateway
            .create_event(&event)
            .await
            .and_then(CalendarEvent::try_from);

        match result {
            Ok(created) => {
                tracing::info!(id = %created.id, "Event created");
                self.confirm(Action::AddEvent(created));
                true
            }
            Err(e) => {
                self.finish(Some(failure(&e, CREATE_FAILED)));
                false
            }
        }
    }

    /// Apply a partial update to an event. Returns whether the server accepted it.
    pub async fn update_event(&self, id: &str, patch: EventPatch) -> bool {
        if let Err(e) = patch.validate() {
            self.dispatch(failure(&e, UPDATE_FAILED));
            return false;
        }

        self.begin();
        let result = self
            .gateway
            .update_event(id, &patch)
            .await
            .and_then(CalendarEvent::try_from);

        match result {
            Ok(updated) => {
                tracing::info!(id = %updated.id, "Event updated");
                self.confirm(Action::UpdateEvent(updated));
                true
            }
            Err(e) => {
                self.finish(Some(failure(&e, UPDATE_FAILED)));
                false
            }
        }
    }

    /// Delete an event. Returns whether the server accepted it.
    pub async fn delete_event(&self, id: &str) -> bool {
        self.begin();

        match self.gateway.delete_event(id).await {
            Ok(()) => {
                tracing::info!(id, "Event deleted");
                self.confirm(Action::DeleteEvent(id.to_string()));
                true
            }
            Err(e) => {
                self.finish(Some(failure(&e, DELETE_FAILED)));
                false
            }
        }
    }

    fn begin(&self) {
        let mut store = self.store.lock();
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        store.dispatch(Action::SetLoading(true));
    }

    /// Apply a write the server accepted. Loads still in flight were answered
    /// before it, so they are fenced off along with any page they would cache.
    fn confirm(&self, action: Action) {
        self.load_seq.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate_all();
        self.finish(Some(action));
    }

    /// Record the outcome of a remote operation.
    ///
    /// `loading` then mirrors whether other operations are still pending,
    /// except after an error, which always clears it.
    fn finish(&self, outcome: Option<Action>) {
        let mut store = self.store.lock();
        let pending = self.in_flight.fetch_sub(1, Ordering::SeqCst) > 1;
        let errored = matches!(outcome, Some(Action::SetError(_)));

        if let Some(action) = outcome {
            store.dispatch(action);
        }
        if !errored && store.state().loading != pending {
            store.dispatch(Action::SetLoading(pending));
        }
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Merge a view config change, reloading when the visible window moved.
    pub async fn set_config(&self, patch: ViewConfigPatch) {
        let moved = {
            let mut store = self.store.lock();
            let before = store.state().config.visible_range();
            store.dispatch(Action::SetConfig(patch));
            store.state().config.visible_range() != before
        };

        if moved {
            self.load_events(None).await;
        }
    }

    pub async fn set_view(&self, view: CalendarView) {
        self.set_config(ViewConfigPatch {
            view: Some(view),
            ..Default::default()
        })
        .await;
    }

    /// Move the view to `date`. Does nothing when the date is unchanged.
    pub async fn set_date(&self, date: NaiveDate) {
        if self.current_date() == date {
            return;
        }
        self.set_config(ViewConfigPatch {
            date: Some(date),
            ..Default::default()
        })
        .await;
    }

    /// Step the view by whole months (negative moves backwards).
    pub async fn navigate_month(&self, delta: i32) {
        let date = shift_month(self.current_date(), delta);
        self.set_date(date).await;
    }

    pub async fn go_to_today(&self) {
        let today = self.clock.now().date_naive();
        self.set_date(today).await;
    }

    fn current_date(&self) -> NaiveDate {
        self.store.lock().state().config.date
    }

    // ========================================================================
    // Local state
    // ========================================================================

    fn dispatch(&self, action: Action) {
        self.store.lock().dispatch(action);
    }

    pub fn toggle_filter(&self, id: &str) {
        self.dispatch(Action::ToggleFilter(id.to_string()));
    }

    pub fn set_search_params(&self, params: SearchParams) {
        self.dispatch(Action::SetSearchParams(params));
    }

    pub fn set_query(&self, query: impl Into<String>) {
        self.store.lock().set_query(query);
    }

    pub fn set_date_range(&self, range: Option<DateRange>) {
        self.store.lock().set_date_range(range);
    }

    pub fn set_sort(&self, sort_by: SortKey, sort_order: SortDirection) {
        self.store.lock().set_sort(sort_by, sort_order);
    }

    pub fn add_filter(&self, filter: Filter) {
        self.store.lock().add_filter(filter);
    }

    pub fn remove_filter(&self, id: &str) {
        self.store.lock().remove_filter(id);
    }

    pub fn clear_search(&self) {
        self.store.lock().clear_search();
    }

    pub fn clear_error(&self) {
        self.dispatch(Action::SetError(None));
    }

    pub fn select_event(&self, event: Option<CalendarEvent>) {
        self.dispatch(Action::SelectEvent(event));
    }

    pub fn show_create_modal(&self) {
        self.dispatch(Action::ShowCreateModal);
    }

    pub fn hide_create_modal(&self) {
        self.dispatch(Action::HideCreateModal);
    }

    pub fn show_edit_modal(&self, event: CalendarEvent) {
        self.dispatch(Action::ShowEditModal(event));
    }

    pub fn hide_edit_modal(&self) {
        self.dispatch(Action::HideEditModal);
    }

    pub fn show_delete_modal(&self, event: CalendarEvent) {
        self.dispatch(Action::ShowDeleteModal(event));
    }

    pub fn hide_delete_modal(&self) {
        self.dispatch(Action::HideDeleteModal);
    }

    // ========================================================================
    // Read side
    // ========================================================================

    /// Snapshot of the full store state.
    pub fn state(&self) -> CalendarState {
        self.store.lock().state().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CalendarState> {
        self.store.lock().subscribe()
    }

    pub fn visible_events(&self) -> Vec<CalendarEvent> {
        let store = self.store.lock();
        let state = store.state();
        filter::filter_events(&state.events, &state.search_params)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn events_for_date(&self, date: NaiveDate) -> Vec<CalendarEvent> {
        let store = self.store.lock();
        let state = store.state();
        filter::events_for_date(&state.events, &state.search_params, date)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn events_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<CalendarEvent> {
        let store = self.store.lock();
        let state = store.state();
        filter::events_in_range(&state.events, &state.search_params, start, end)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Next `limit` visible events from now on.
    pub fn upcoming(&self, limit: usize) -> Vec<CalendarEvent> {
        let now = self.clock.now();
        let store = self.store.lock();
        let state = store.state();
        filter::upcoming(&state.events, &state.search_params, now, limit)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn is_event_visible(&self, event: &CalendarEvent) -> bool {
        let store = self.store.lock();
        let state = store.state();
        filter::is_event_visible(&state.events, &state.search_params, event)
    }
}

fn failure(error: &CalendarError, fallback: &str) -> Action {
    tracing::warn!(error = %error, "{}", fallback);
    Action::SetError(Some(error.user_message(fallback)))
}
