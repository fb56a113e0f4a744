//! Short-lived read-through cache for event listings.
//!
//! Entries are keyed by a canonical rendering of the search params and are
//! trusted only while `now - timestamp < ttl`. Every successful mutation
//! evicts the whole events namespace.
//!
//! Concurrent identical misses are not coalesced: each one reaches the gateway.
//! A fetch that was in flight when the cache was invalidated returns its page
//! to the caller but never stores it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::clock::Clock;
use crate::error::CalendarError;
use crate::gateway::EventGateway;
use crate::types::{format_instant, EventPage, FilterFacet, SearchParams, SortDirection, SortKey};

/// Default time-to-live of a cached listing.
pub const DEFAULT_TTL_SECS: i64 = 300;

const NAMESPACE: &str = "events";

/// A cached listing and when it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: EventPage,
    pub timestamp: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now - self.timestamp < self.ttl
    }
}

#[derive(Serialize)]
struct CanonicalFilter<'a> {
    facet: FilterFacet,
    id: &'a str,
    values: Vec<&'a str>,
}

#[derive(Serialize)]
struct CanonicalQuery<'a> {
    q: &'a str,
    start: Option<String>,
    end: Option<String>,
    filters: Vec<CanonicalFilter<'a>>,
    sort_by: SortKey,
    sort_order: SortDirection,
}

/// Build the order-independent cache key for a query.
///
/// Only inputs that change the server's answer take part: inactive filters,
/// filter names and colours are ignored, and active filters are sorted.
pub fn cache_key(params: &SearchParams) -> Result<String, CalendarError> {
    let mut filters: Vec<CanonicalFilter<'_>> = params
        .active_filters()
        .map(|f| CanonicalFilter {
            facet: f.facet,
            id: f.id.as_str(),
            values: f.values.iter().map(String::as_str).collect(),
        })
        .collect();
    filters.sort_by(|a, b| (a.id, &a.values).cmp(&(b.id, &b.values)));

    let canonical = CanonicalQuery {
        q: params.query.as_str(),
        start: params.date_range.map(|r| format_instant(r.start)),
        end: params.date_range.map(|r| format_instant(r.end)),
        filters,
        sort_by: params.sort_by,
        sort_order: params.sort_order,
    };

    let json = serde_json::to_string(&canonical)
        .map_err(|e| CalendarError::InvalidEventData(e.to_string()))?;
    Ok(format!("{}:{}", NAMESPACE, json))
}

pub struct EventCache {
    gateway: Arc<dyn EventGateway>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
    /// Bumped on every invalidation, under the `entries` lock.
    generation: AtomicU64,
}

impl EventCache {
    pub fn new(gateway: Arc<dyn EventGateway>, clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(gateway, clock, Duration::seconds(DEFAULT_TTL_SECS))
    }

    pub fn with_ttl(gateway: Arc<dyn EventGateway>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            gateway,
            clock,
            ttl,
            entries: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached page for `params`, fetching through the gateway on a miss.
    pub async fn get(&self, params: &SearchParams) -> Result<EventPage, CalendarError> {
        let key = cache_key(params)?;

        if let Some(page) = self.lookup(&key) {
            tracing::debug!(key = %key, "Event cache hit");
            return Ok(page);
        }
        tracing::debug!(key = %key, "Event cache miss");

        let generation = self.generation.load(Ordering::SeqCst);
        let list = self.gateway.list_events(params).await?;
        let page = EventPage::try_from(list)?;

        if self.ttl > Duration::zero() {
            let entry = CacheEntry {
                payload: page.clone(),
                timestamp: self.clock.now(),
                ttl: self.ttl,
            };
            let mut entries = self.entries.lock();
            if self.generation.load(Ordering::SeqCst) == generation {
                entries.insert(key, entry);
            } else {
                tracing::debug!(key = %key, "Discarding page fetched before invalidation");
            }
        }

        Ok(page)
    }

    fn lookup(&self, key: &str) -> Option<EventPage> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        match entries.get(key) {
            Some(entry) if entry.is_valid(now) => Some(entry.payload.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Evict every entry in the events namespace.
    pub fn invalidate_all(&self) {
        let prefix = format!("{}:", NAMESPACE);
        let mut entries = self.entries.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(&prefix));
        tracing::debug!(evicted = before - entries.len(), "Event cache invalidated");
    }

    /// Evict the entry for a single query.
    pub fn invalidate(&self, params: &SearchParams) -> Result<(), CalendarError> {
        let key = cache_key(params)?;
        let mut entries = self.entries.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
        entries.remove(&key);
        Ok(())
    }

    /// Drop entries whose ttl has elapsed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_valid(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
