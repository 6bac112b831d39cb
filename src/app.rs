use std::sync::Arc;
use std::thread;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::catalog::Catalog;
use crate::config::BrowserConfig;
use crate::domain::Subfolder;
use crate::error::BrowserError;
use crate::extract::{self, ExtractionResult};
use crate::refresh::RefreshCoordinator;
use crate::rewrite;
use crate::s3::ObjectStoreClient;
use crate::samples::{self, SampleRecord};
use crate::store::LocalStore;

const WAIT_STEP: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Preview {
    Html { url: String, path: Utf8PathBuf },
    Text(String),
}

/// UI-facing facade over the browsing core. Refreshes funnel through the
/// coordinator; extraction, preview, signing, and download hit the client
/// directly and never touch coordinator state.
pub struct App<C: ObjectStoreClient + 'static> {
    client: Arc<C>,
    config: BrowserConfig,
    store: LocalStore,
    coordinator: RefreshCoordinator<C>,
}

impl<C: ObjectStoreClient + 'static> App<C> {
    pub fn new(client: C, config: BrowserConfig) -> Self {
        let client = Arc::new(client);
        let store = LocalStore::new(config.web_root.clone(), config.download_dir.clone());
        let coordinator = RefreshCoordinator::new(Arc::clone(&client), config.clone());
        Self {
            client,
            config,
            store,
            coordinator,
        }
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn coordinator(&self) -> &RefreshCoordinator<C> {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut RefreshCoordinator<C> {
        &mut self.coordinator
    }

    /// Blocking project-list refresh for one-shot callers.
    pub fn refresh_projects(&mut self) -> Result<Vec<String>, BrowserError> {
        self.coordinator.take_last_error();
        self.coordinator.request_projects_refresh();
        self.wait_until(|c| !c.project_state().is_fetching());
        match self.coordinator.take_last_error() {
            Some(err) => Err(err),
            None => Ok(self.coordinator.projects().to_vec()),
        }
    }

    /// Blocking object listing for one (project, subfolder) pair. Returns a
    /// snapshot of the swapped-in catalog.
    pub fn list_objects(
        &mut self,
        project: &str,
        subfolder: Subfolder,
    ) -> Result<Catalog, BrowserError> {
        self.coordinator.take_last_error();
        self.coordinator.select_project(project);
        self.coordinator.set_subfolder(subfolder);
        self.coordinator.request_catalog_refresh();
        self.wait_until(|c| !c.catalog_state().is_fetching());
        match self.coordinator.take_last_error() {
            Some(err) => Err(err),
            None => Ok(self.coordinator.catalog().clone()),
        }
    }

    pub fn aggregate_samples(&self, catalog: &Catalog) -> Vec<SampleRecord> {
        samples::aggregate(catalog)
    }

    /// Downloads and extracts one FastQC archive under its deterministic
    /// root. An existing root is reused as-is, so repeat extraction of the
    /// same key is cheap and yields the same result.
    pub fn extract_report(&self, key: &str) -> Result<ExtractionResult, BrowserError> {
        let root = self.store.extraction_root(key);
        if root.as_std_path().exists() {
            tracing::debug!(key, root = %root, "reusing existing extraction");
        } else {
            let bytes = self.client.get_object(
                &self.config.bucket,
                key,
                Some(self.config.max_archive_bytes),
            )?;
            extract::extract_archive(&bytes, key, &root)?;
        }
        let report = extract::find_report(&root, key)?;
        Ok(ExtractionResult {
            source_key: key.to_string(),
            local_root: root,
            report_path: format!("{}/{report}", self.store.extraction_rel(key)),
        })
    }

    pub fn rewrite_markup(&self, key: &str, markup: &str) -> Result<String, BrowserError> {
        rewrite::rewrite_fastqc_html(
            self.client.as_ref(),
            &self.config.bucket,
            key,
            self.config.presign_ttl,
            markup,
        )
    }

    pub fn sign(&self, key: &str) -> Result<String, BrowserError> {
        self.client
            .presign_get(&self.config.bucket, key, self.config.presign_ttl)
    }

    /// Fetches one object for display: HTML keys are rewritten and written
    /// to the web root as a servable preview, everything else comes back as
    /// lossily decoded text.
    pub fn preview(&self, key: &str) -> Result<Preview, BrowserError> {
        let bytes = self.client.get_object(&self.config.bucket, key, None)?;
        if key.to_ascii_lowercase().ends_with(".html") {
            let markup = String::from_utf8_lossy(&bytes);
            let rewritten = self.rewrite_markup(key, &markup)?;
            let path = self.store.preview_path(key);
            LocalStore::write_bytes_atomic(&path, rewritten.as_bytes())?;
            Ok(Preview::Html {
                url: self.store.preview_url(key),
                path,
            })
        } else {
            Ok(Preview::Text(String::from_utf8_lossy(&bytes).into_owned()))
        }
    }

    pub fn download(&self, key: &str) -> Result<Utf8PathBuf, BrowserError> {
        let bytes = self.client.get_object(&self.config.bucket, key, None)?;
        let path = self.store.flat_download_path(key);
        LocalStore::write_bytes_atomic(&path, &bytes)?;
        Ok(path)
    }

    fn wait_until<F>(&mut self, done: F)
    where
        F: Fn(&RefreshCoordinator<C>) -> bool,
    {
        loop {
            self.coordinator.pump();
            if done(&self.coordinator) {
                return;
            }
            thread::sleep(WAIT_STEP);
        }
    }
}
