//! Immutable, published snapshot of a load cycle.

use std::sync::Arc;

use ahash::AHashMap as HashMap;
use chrono::{DateTime, Utc};
use haven_data_processing::ShelterRecord;

/// Counts gathered while building a [`Directory`].
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Physical data rows read from the table
    pub raw_rows: usize,
    /// Records that survived reassembly
    pub records: usize,
    /// Records that received coordinates
    pub geocoded: usize,
    /// Records whose geocoding failed
    pub geocode_failures: usize,
}

#[derive(Debug)]
struct DirectoryInner {
    records: Vec<ShelterRecord>,
    positions: HashMap<String, Vec<usize>>,
    stats: LoadStats,
    loaded_at: DateTime<Utc>,
}

/// Read-only handle to a fully built shelter directory.
///
/// Cloning shares the same snapshot. There are no mutating operations; a new
/// load produces a new `Directory`.
#[derive(Debug, Clone)]
pub struct Directory {
    inner: Arc<DirectoryInner>,
}

impl Directory {
    /// Publish records that are already geocoded (or never will be).
    #[must_use]
    pub fn from_records(records: Vec<ShelterRecord>) -> Self {
        let stats = LoadStats {
            raw_rows: 0,
            records: records.len(),
            geocoded: records.iter().filter(|r| r.is_geocoded()).count(),
            geocode_failures: records.iter().filter(|r| !r.is_geocoded()).count(),
        };
        Self::publish(records, stats)
    }

    pub(crate) fn publish(records: Vec<ShelterRecord>, stats: LoadStats) -> Self {
        let mut positions: HashMap<String, Vec<usize>> = HashMap::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            positions
                .entry(record.id.as_str().to_string())
                .or_default()
                .push(idx);
        }

        Self {
            inner: Arc::new(DirectoryInner {
                records,
                positions,
                stats,
                loaded_at: Utc::now(),
            }),
        }
    }

    /// Every record in source order.
    #[must_use]
    pub fn all(&self) -> &[ShelterRecord] {
        &self.inner.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ShelterRecord> {
        self.inner.records.iter()
    }

    /// First record carrying `id`.
    #[must_use]
    pub fn by_id(&self, id: &str) -> Option<&ShelterRecord> {
        self.all_by_id(id).next()
    }

    /// Every record carrying `id`, in source order. Duplicate source rows share an id.
    pub fn all_by_id<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a ShelterRecord> + 'a {
        self.inner
            .positions
            .get(id)
            .into_iter()
            .flatten()
            .map(|&idx| &self.inner.records[idx])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.records.len()
    }

    /// An empty directory means the load failed upstream or the source was empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.records.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> LoadStats {
        self.inner.stats
    }

    #[must_use]
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.inner.loaded_at
    }

    /// True when both handles point at the same published snapshot.
    #[must_use]
    pub fn same_snapshot(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<'a> IntoIterator for &'a Directory {
    type Item = &'a ShelterRecord;
    type IntoIter = std::slice::Iter<'a, ShelterRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
