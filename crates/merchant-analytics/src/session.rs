//! Per-user session state.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       SessionRegistry                        │
//! │  sessions: RwLock<HashMap<id, Session>>                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Session                                                     │
//! │  ┌──────────────────────────┐  ┌──────────────────────────┐  │
//! │  │ cache                    │  │ current: Arc<Dataset>    │  │
//! │  │ sha256 -> Arc<Dataset>   │  │ criteria: FilterCriteria │  │
//! │  └──────────────────────────┘  └──────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Loading is pure; the cache here is the only memoization. Uploading the
//! same bytes again returns the dataset parsed the first time; uploading a
//! different file discards the previous one. Nothing is shared between
//! sessions.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::AnalyticsConfig;
use crate::dataset::Dataset;
use crate::error::{AnalyticsError, Result};
use crate::filter::{FilterCriteria, FilteredView};
use crate::ingest::{fingerprint, load};
use crate::report::DashboardReport;

// ============================================================================
// SESSION
// ============================================================================

/// One user's uploads, active dataset, and filter selection.
#[derive(Debug, Default)]
pub struct Session {
    config: AnalyticsConfig,
    cache: HashMap<String, Arc<Dataset>>,
    current: Option<Arc<Dataset>>,
    criteria: FilterCriteria,
}

impl Session {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Make `bytes` the active dataset, parsing only on a cache miss.
    ///
    /// A different file replaces the cached one, so at most the active
    /// dataset is held. A new upload resets the filter selection. A failed
    /// upload leaves the previous dataset active.
    pub fn upload(&mut self, bytes: &[u8]) -> Result<Arc<Dataset>> {
        let key = fingerprint(bytes);

        let dataset = match self.cache.get(&key) {
            Some(cached) => {
                debug!("Upload cache hit: {}", &key[..12]);
                Arc::clone(cached)
            }
            None => {
                let dataset = Arc::new(load(bytes, &self.config)?);
                if !self.cache.is_empty() {
                    debug!("Discarding {} previous upload(s)", self.cache.len());
                    self.cache.clear();
                }
                self.cache.insert(key, Arc::clone(&dataset));
                dataset
            }
        };

        self.current = Some(Arc::clone(&dataset));
        self.criteria = FilterCriteria::default();
        Ok(dataset)
    }

    /// The active dataset.
    ///
    /// # Errors
    ///
    /// [`AnalyticsError::NoDataLoaded`] until a file has been uploaded.
    pub fn dataset(&self) -> Result<&Arc<Dataset>> {
        self.current.as_ref().ok_or(AnalyticsError::NoDataLoaded)
    }

    pub fn has_data(&self) -> bool {
        self.current.is_some()
    }

    pub fn set_filters(&mut self, criteria: FilterCriteria) {
        debug!("Filters updated: {:?}", criteria);
        self.criteria = criteria;
    }

    pub fn filters(&self) -> &FilterCriteria {
        &self.criteria
    }

    /// Active dataset narrowed by the current filters.
    pub fn view(&self) -> Result<FilteredView<'_>> {
        Ok(self.criteria.apply(self.dataset()?))
    }

    /// Recompute the dashboard for the current dataset and filters.
    pub fn report(&self) -> Result<DashboardReport> {
        DashboardReport::build(self.dataset()?, &self.criteria, &self.config)
    }

    /// Write the filtered rows as CSV.
    pub fn export_filtered<W: Write>(&self, writer: W) -> Result<()> {
        self.view()?.write_csv(writer)
    }

    /// Number of uploads held in the cache (0 or 1).
    pub fn cached_uploads(&self) -> usize {
        self.cache.len()
    }

    /// Drop every upload and reset the filters.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.current = None;
        self.criteria = FilterCriteria::default();
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Sessions keyed by id, for hosts serving more than one user.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    config: AnalyticsConfig,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionRegistry {
    /// New sessions start with a copy of `config`.
    pub fn new(config: AnalyticsConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create the session if it does not exist yet. Returns `true` if created.
    pub fn open(&self, id: impl Into<String>) -> bool {
        let id = id.into();
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&id) {
            return false;
        }
        info!("Session opened: {}", id);
        sessions.insert(id, Session::new(self.config.clone()));
        true
    }

    /// Run `f` with shared access to a session; `None` if the id is unknown.
    pub fn with_session<R>(&self, id: &str, f: impl FnOnce(&Session) -> R) -> Option<R> {
        self.sessions.read().get(id).map(f)
    }

    /// Run `f` with exclusive access to a session; `None` if the id is unknown.
    pub fn with_session_mut<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.sessions.write().get_mut(id).map(f)
    }

    /// End a session, discarding its uploads.
    pub fn close(&self, id: &str) -> bool {
        let removed = self.sessions.write().remove(id).is_some();
        if removed {
            info!("Session closed: {}", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

static_assertions::assert_impl_all!(Session: Send, Sync);
static_assertions::assert_impl_all!(SessionRegistry: Send, Sync);
