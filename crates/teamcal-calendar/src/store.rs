//! Calendar state and the reducer that drives it.
//!
//! State changes only through `EventStateStore::dispatch`, which runs the
//! pure [`reduce`] function and publishes the result to subscribers.

use tokio::sync::watch;

use crate::types::{CalendarEvent, DateRange, Filter, SearchParams, SortDirection, SortKey};
use crate::view::{ViewConfig, ViewConfigPatch};

/// Visibility of the create/edit/delete dialogs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModalState {
    pub create_open: bool,
    pub edit_open: bool,
    pub delete_open: bool,
    /// Event the open edit or delete dialog refers to
    pub target: Option<CalendarEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarState {
    pub events: Vec<CalendarEvent>,
    pub search_params: SearchParams,
    pub config: ViewConfig,
    pub selected_event: Option<CalendarEvent>,
    pub modals: ModalState,
    pub loading: bool,
    pub error: Option<String>,
}

impl CalendarState {
    pub fn new(config: ViewConfig) -> Self {
        Self {
            events: Vec::new(),
            search_params: SearchParams::default(),
            config,
            selected_event: None,
            modals: ModalState::default(),
            loading: false,
            error: None,
        }
    }

    pub fn event(&self, id: &str) -> Option<&CalendarEvent> {
        self.events.iter().find(|e| e.id == id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetLoading(bool),
    SetError(Option<String>),
    SetEvents(Vec<CalendarEvent>),
    AddEvent(CalendarEvent),
    UpdateEvent(CalendarEvent),
    DeleteEvent(String),
    SetConfig(ViewConfigPatch),
    ToggleFilter(String),
    SetSearchParams(SearchParams),
    SelectEvent(Option<CalendarEvent>),
    ShowCreateModal,
    HideCreateModal,
    ShowEditModal(CalendarEvent),
    HideEditModal,
    ShowDeleteModal(CalendarEvent),
    HideDeleteModal,
}

/// Apply one action to a state, producing the next state.
///
/// Event mutations leave `loading` alone: a load may still be pending when a
/// write lands, and the caller knows which operations remain.
pub fn reduce(mut state: CalendarState, action: Action) -> CalendarState {
    match action {
        Action::SetLoading(loading) => {
            state.loading = loading;
        }
        Action::SetError(error) => {
            state.error = error;
            state.loading = false;
        }
        Action::SetEvents(events) => {
            state.events = events;
            state.loading = false;
            state.error = None;
        }
        Action::AddEvent(event) => {
            state.events.push(event.clone());
            state.selected_event = Some(event);
            state.modals.create_open = false;
            state.error = None;
        }
        Action::UpdateEvent(event) => {
            if let Some(slot) = state.events.iter_mut().find(|e| e.id == event.id) {
                *slot = event.clone();
            }
            if matches!(&state.selected_event, Some(s) if s.id == event.id) {
                state.selected_event = Some(event);
            }
            state.modals.edit_open = false;
            state.modals.target = None;
            state.error = None;
        }
        Action::DeleteEvent(id) => {
            state.events.retain(|e| e.id != id);
            if matches!(&state.selected_event, Some(s) if s.id == id) {
                state.selected_event = None;
            }
            state.modals.delete_open = false;
            state.modals.target = None;
            state.error = None;
        }
        Action::SetConfig(patch) => {
            state.config = state.config.merge(&patch);
        }
        Action::ToggleFilter(id) => {
            if let Some(filter) = state.search_params.filters.iter_mut().find(|f| f.id == id) {
                filter.active = !filter.active;
            }
        }
        Action::SetSearchParams(params) => {
            state.search_params = params;
        }
        Action::SelectEvent(event) => {
            state.selected_event = event;
        }
        Action::ShowCreateModal => {
            state.modals.create_open = true;
        }
        Action::HideCreateModal => {
            state.modals.create_open = false;
        }
        Action::ShowEditModal(event) => {
            state.modals.edit_open = true;
            state.modals.target = Some(event);
        }
        Action::HideEditModal => {
            state.modals.edit_open = false;
            state.modals.target = None;
        }
        Action::ShowDeleteModal(event) => {
            state.modals.delete_open = true;
            state.modals.target = Some(event);
        }
        Action::HideDeleteModal => {
            state.modals.delete_open = false;
            state.modals.target = None;
        }
    }
    state
}

pub struct EventStateStore {
    state: CalendarState,
    tx: watch::Sender<CalendarState>,
}

impl EventStateStore {
    pub fn new(initial: CalendarState) -> Self {
        let (tx, _rx) = watch::channel(initial.clone());
        Self { state: initial, tx }
    }

    pub fn state(&self) -> &CalendarState {
        &self.state
    }

    /// Receive a fresh snapshot after every dispatch.
    pub fn subscribe(&self) -> watch::Receiver<CalendarState> {
        self.tx.subscribe()
    }

    pub fn dispatch(&mut self, action: Action) {
        tracing::trace!(?action, "dispatch");
        self.state = reduce(self.state.clone(), action);
        self.tx.send_replace(self.state.clone());
    }

    fn update_search(&mut self, f: impl FnOnce(&mut SearchParams)) {
        let mut params = self.state.search_params.clone();
        f(&mut params);
        self.dispatch(Action::SetSearchParams(params));
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        let query = query.into();
        self.update_search(|p| p.query = query);
    }

    pub fn set_date_range(&mut self, range: Option<DateRange>) {
        self.update_search(|p| p.date_range = range);
    }

    pub fn set_sort(&mut self, sort_by: SortKey, sort_order: SortDirection) {
        self.update_search(|p| {
            p.sort_by = sort_by;
            p.sort_order = sort_order;
        });
    }

    /// Add a filter, replacing any existing filter with the same id.
    pub fn add_filter(&mut self, filter: Filter) {
        self.update_search(|p| match p.filters.iter_mut().find(|f| f.id == filter.id) {
            Some(existing) => *existing = filter,
            None => p.filters.push(filter),
        });
    }

    pub fn remove_filter(&mut self, id: &str) {
        self.update_search(|p| p.filters.retain(|f| f.id != id));
    }

    /// Clear the query and date range, keeping filters and ordering.
    pub fn clear_search(&mut self) {
        self.update_search(|p| {
            p.query.clear();
            p.date_range = None;
        });
    }
}
