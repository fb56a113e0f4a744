//! Team calendar event core for TeamCal.
//!
//! Loads events through a ttl cache, keeps them in a reducer-driven store and
//! filters them for display. `CalendarFacade` is the entry point.

pub mod cache;
pub mod clock;
pub mod error;
pub mod facade;
pub mod filter;
pub mod gateway;
pub mod store;
pub mod types;
pub mod view;

pub use cache::{cache_key, CacheEntry, EventCache, DEFAULT_TTL_SECS};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::CalendarError;
pub use facade::{CalendarContext, CalendarFacade};
pub use gateway::{EventGateway, HttpEventGateway};
pub use store::{reduce, Action, CalendarState, EventStateStore, ModalState};
pub use types::{
    ApiEvent, ApiEventList, CalendarEvent, DateRange, EventCategory, EventPage, EventPatch,
    EventStatus, EventType, Filter, FilterFacet, NewEvent, Priority, SearchOverrides,
    SearchParams, SortDirection, SortKey,
};
pub use view::{CalendarView, ViewConfig, ViewConfigPatch};
