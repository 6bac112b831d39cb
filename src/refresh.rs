use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::catalog::{Catalog, fetch_catalog, fetch_projects};
use crate::config::BrowserConfig;
use crate::domain::{Subfolder, object_prefix};
use crate::error::BrowserError;
use crate::s3::ObjectStoreClient;
use crate::samples::{SampleRecord, aggregate};

/// Minimum polling interval, enforced regardless of configuration.
pub const POLL_FLOOR: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Fetching,
    Errored(String),
}

impl StreamState {
    pub fn is_fetching(&self) -> bool {
        matches!(self, StreamState::Fetching)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            StreamState::Errored(message) => Some(message),
            _ => None,
        }
    }
}

enum RefreshEvent {
    Projects(Result<Vec<String>, BrowserError>),
    Objects(Result<Catalog, BrowserError>),
}

/// Owns the catalog, the project list, and the refresh state machine. All
/// mutation happens on the thread that calls `pump`; workers only report
/// completion over the channel.
pub struct RefreshCoordinator<C: ObjectStoreClient + 'static> {
    client: Arc<C>,
    config: BrowserConfig,
    projects: Vec<String>,
    catalog: Catalog,
    sample_view: Option<Vec<SampleRecord>>,
    preferred_project: Option<String>,
    subfolder: Subfolder,
    selected_key: Option<String>,
    project_state: StreamState,
    catalog_state: StreamState,
    last_error: Option<BrowserError>,
    status: String,
    tx: Sender<RefreshEvent>,
    rx: Receiver<RefreshEvent>,
    polling: bool,
    poll_interval: Duration,
    next_poll_at: Option<Instant>,
}

impl<C: ObjectStoreClient + 'static> RefreshCoordinator<C> {
    pub fn new(client: Arc<C>, config: BrowserConfig) -> Self {
        let (tx, rx) = mpsc::channel();
        let poll_interval = config.poll_interval.max(POLL_FLOOR);
        Self {
            client,
            config,
            projects: Vec::new(),
            catalog: Catalog::empty(),
            sample_view: None,
            preferred_project: None,
            subfolder: Subfolder::Root,
            selected_key: None,
            project_state: StreamState::Idle,
            catalog_state: StreamState::Idle,
            last_error: None,
            status: "ready".to_string(),
            tx,
            rx,
            polling: false,
            poll_interval,
            next_poll_at: None,
        }
    }

    pub fn projects(&self) -> &[String] {
        &self.projects
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Derived sample view, recomputed lazily after each catalog swap.
    pub fn samples(&mut self) -> &[SampleRecord] {
        if self.sample_view.is_none() {
            self.sample_view = Some(aggregate(&self.catalog));
        }
        self.sample_view.as_deref().unwrap_or_default()
    }

    pub fn preferred_project(&self) -> Option<&str> {
        self.preferred_project.as_deref()
    }

    pub fn select_project(&mut self, project: &str) {
        self.preferred_project = Some(project.to_string());
    }

    pub fn subfolder(&self) -> Subfolder {
        self.subfolder
    }

    pub fn set_subfolder(&mut self, subfolder: Subfolder) {
        self.subfolder = subfolder;
    }

    pub fn selected_key(&self) -> Option<&str> {
        self.selected_key.as_deref()
    }

    /// Key-based selection path. Last write wins across both paths.
    pub fn select_key(&mut self, key: Option<String>) {
        self.selected_key = key;
    }

    /// Row-index selection path against the current catalog order.
    pub fn select_row(&mut self, index: usize) -> bool {
        if self.catalog.is_empty() {
            self.status = "no rows to pick; list objects first".to_string();
            return false;
        }
        match self.catalog.get(index) {
            Some(record) => {
                self.selected_key = Some(record.key.clone());
                self.status = format!("selected row {index}");
                true
            }
            None => {
                self.status = format!(
                    "row out of range; use 0 to {}",
                    self.catalog.len() - 1
                );
                false
            }
        }
    }

    pub fn project_state(&self) -> &StreamState {
        &self.project_state
    }

    pub fn catalog_state(&self) -> &StreamState {
        &self.catalog_state
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn take_last_error(&mut self) -> Option<BrowserError> {
        self.last_error.take()
    }

    /// Starts a project-list fetch unless one is already in flight.
    /// A request during a fetch is a no-op, not queued.
    pub fn request_projects_refresh(&mut self) -> bool {
        if self.project_state.is_fetching() {
            tracing::debug!("project refresh already in flight");
            return false;
        }
        self.project_state = StreamState::Fetching;
        self.status = "loading projects".to_string();

        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        let bucket = self.config.bucket.clone();
        let base_prefix = self.config.base_prefix.clone();
        thread::spawn(move || {
            let result = fetch_projects(client.as_ref(), &bucket, &base_prefix);
            let _ = tx.send(RefreshEvent::Projects(result));
        });
        true
    }

    /// Starts an object-list fetch for the preferred project and current
    /// subfolder unless one is already in flight.
    pub fn request_catalog_refresh(&mut self) -> bool {
        if self.catalog_state.is_fetching() {
            tracing::debug!("catalog refresh already in flight");
            return false;
        }
        let Some(project) = self.preferred_project.clone() else {
            self.status = "no project selected".to_string();
            return false;
        };
        self.catalog_state = StreamState::Fetching;
        self.status = format!("listing {project}");

        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        let bucket = self.config.bucket.clone();
        let prefix = object_prefix(&self.config.base_prefix, &project, self.subfolder);
        let cap = self.config.max_objects;
        thread::spawn(move || {
            let result = fetch_catalog(client.as_ref(), &bucket, &prefix, cap);
            let _ = tx.send(RefreshEvent::Objects(result));
        });
        true
    }

    /// Applies any completed fetches. Returns true when state changed.
    pub fn pump(&mut self) -> bool {
        let mut applied = false;
        while let Ok(event) = self.rx.try_recv() {
            match event {
                RefreshEvent::Projects(result) => self.apply_projects(result),
                RefreshEvent::Objects(result) => self.apply_objects(result),
            }
            applied = true;
        }
        applied
    }

    pub fn enable_polling(&mut self, interval: Duration) {
        self.polling = true;
        self.poll_interval = interval.max(POLL_FLOOR);
        self.next_poll_at = Some(Instant::now());
    }

    pub fn disable_polling(&mut self) {
        self.polling = false;
        self.next_poll_at = None;
    }

    /// Timer tick: fires a catalog refresh when the deadline is due and the
    /// stream is idle. The next deadline is armed when the attempt completes,
    /// so ticks never overlap an in-flight fetch.
    pub fn maybe_poll(&mut self, now: Instant) -> bool {
        if !self.polling {
            return false;
        }
        let Some(deadline) = self.next_poll_at else {
            return false;
        };
        if now < deadline {
            return false;
        }
        if self.request_catalog_refresh() {
            self.next_poll_at = None;
            true
        } else {
            self.next_poll_at = Some(now + self.poll_interval);
            false
        }
    }

    fn apply_projects(&mut self, result: Result<Vec<String>, BrowserError>) {
        match result {
            Ok(projects) => {
                self.preferred_project = retain_preferred(self.preferred_project.take(), &projects);
                self.status = format!("{} projects loaded", projects.len());
                self.projects = projects;
                self.project_state = StreamState::Idle;
            }
            Err(err) => {
                self.status = format!("failed to load projects: {err}");
                self.project_state = StreamState::Errored(err.to_string());
                self.last_error = Some(err);
            }
        }
    }

    fn apply_objects(&mut self, result: Result<Catalog, BrowserError>) {
        match result {
            Ok(catalog) => {
                self.status = format!("{} objects found", catalog.len());
                self.catalog = catalog;
                self.sample_view = None;
                self.selected_key = None;
                self.catalog_state = StreamState::Idle;
            }
            Err(err) => {
                // Stale-but-valid data beats a blank view: the previous
                // catalog stays untouched.
                self.status = format!("failed to list objects: {err}");
                self.catalog_state = StreamState::Errored(err.to_string());
                self.last_error = Some(err);
            }
        }
        if self.polling {
            self.next_poll_at = Some(Instant::now() + self.poll_interval);
        }
    }
}

/// Keeps the previous preference while it is still present in the new list,
/// falls back to the first entry, clears when the list is empty.
fn retain_preferred(current: Option<String>, projects: &[String]) -> Option<String> {
    match current {
        Some(preferred) if projects.iter().any(|p| *p == preferred) => Some(preferred),
        _ => projects.first().cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferred_project_retention() {
        let projects = vec!["projA".to_string(), "projB".to_string()];
        assert_eq!(
            retain_preferred(Some("projB".to_string()), &projects).as_deref(),
            Some("projB")
        );
        assert_eq!(
            retain_preferred(Some("gone".to_string()), &projects).as_deref(),
            Some("projA")
        );
        assert_eq!(retain_preferred(None, &projects).as_deref(), Some("projA"));
        assert_eq!(retain_preferred(Some("projA".to_string()), &[]), None);
    }

    #[test]
    fn stream_state_accessors() {
        assert!(StreamState::Fetching.is_fetching());
        assert!(!StreamState::Idle.is_fetching());
        assert_eq!(
            StreamState::Errored("boom".to_string()).error(),
            Some("boom")
        );
    }
}
