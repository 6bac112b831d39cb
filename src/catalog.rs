use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::project_from_prefix;
use crate::error::BrowserError;
use crate::s3::ObjectStoreClient;

/// S3 caps a single listing response at 1000 keys; the original browser
/// always requested full pages and stopped on the continuation token.
pub const PAGE_SIZE: i32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectRecord {
    pub key: String,
    pub size: Option<i64>,
    pub last_modified: Option<DateTime<Utc>>,
    pub storage_class: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub bucket: String,
    pub prefix: String,
    pub cap: usize,
    records: Vec<ObjectRecord>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self {
            bucket: String::new(),
            prefix: String::new(),
            cap: 0,
            records: Vec::new(),
        }
    }

    /// Builds a catalog from already-collected records. The records are kept
    /// in the given order; `fetch_catalog` is the producer that sorts.
    pub fn from_records(
        bucket: &str,
        prefix: &str,
        cap: usize,
        records: Vec<ObjectRecord>,
    ) -> Self {
        Self {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            cap,
            records,
        }
    }

    pub fn records(&self) -> &[ObjectRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&ObjectRecord> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// A catalog filled to its cap may have been cut short; there is no
    /// other truncation signal.
    pub fn truncated(&self) -> bool {
        self.cap > 0 && self.records.len() >= self.cap
    }
}

/// Pages through the listing until the provider runs out of pages or `cap`
/// records have been accumulated, then sorts by descending timestamp with
/// ascending key as the tiebreak. All-or-nothing: any page failure fails the
/// whole fetch.
pub fn fetch_catalog(
    client: &dyn ObjectStoreClient,
    bucket: &str,
    prefix: &str,
    cap: usize,
) -> Result<Catalog, BrowserError> {
    let mut records: Vec<ObjectRecord> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut token: Option<String> = None;

    loop {
        let page = client.list_page(bucket, prefix, None, PAGE_SIZE, token.as_deref())?;

        for raw in page.objects {
            if records.len() >= cap {
                break;
            }
            if !seen.insert(raw.key.clone()) {
                continue;
            }
            records.push(ObjectRecord {
                key: raw.key,
                size: raw.size,
                last_modified: raw.last_modified,
                storage_class: raw.storage_class,
            });
        }

        if records.len() >= cap {
            break;
        }
        match page.next_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    records.sort_by(|a, b| {
        b.last_modified
            .cmp(&a.last_modified)
            .then_with(|| a.key.cmp(&b.key))
    });

    tracing::debug!(bucket, prefix, count = records.len(), "catalog fetched");

    Ok(Catalog {
        bucket: bucket.to_string(),
        prefix: prefix.to_string(),
        cap,
        records,
    })
}

/// Lists the project names directly under the base prefix via a
/// delimiter listing, sorted ascending.
pub fn fetch_projects(
    client: &dyn ObjectStoreClient,
    bucket: &str,
    base_prefix: &str,
) -> Result<Vec<String>, BrowserError> {
    let mut projects: Vec<String> = Vec::new();
    let mut token: Option<String> = None;

    loop {
        let page = client.list_page(bucket, base_prefix, Some("/"), PAGE_SIZE, token.as_deref())?;
        projects.extend(
            page.common_prefixes
                .iter()
                .filter_map(|prefix| project_from_prefix(prefix)),
        );
        match page.next_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    projects.sort();
    projects.dedup();
    Ok(projects)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn record(key: &str, ts: Option<i64>) -> ObjectRecord {
        ObjectRecord {
            key: key.to_string(),
            size: Some(1),
            last_modified: ts.map(|secs| Utc.timestamp_opt(secs, 0).unwrap()),
            storage_class: None,
        }
    }

    #[test]
    fn sort_order_descending_with_key_tiebreak() {
        let mut records = vec![
            record("b", Some(100)),
            record("z", None),
            record("a", Some(100)),
            record("c", Some(200)),
        ];
        records.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| a.key.cmp(&b.key))
        });
        let keys: Vec<&str> = records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["c", "a", "b", "z"]);
    }

    #[test]
    fn empty_catalog_is_not_truncated() {
        let catalog = Catalog::empty();
        assert!(!catalog.truncated());
        assert!(catalog.is_empty());
    }
}
