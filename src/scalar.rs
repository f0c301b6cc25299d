//! B-tree scalar index over a single payload field.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use crate::error::{Result, VdbError};
use crate::types::{PayloadValue, RecordId};

/// Inclusivity of a range bound, independent of `Bound`'s own semantics so
/// callers don't need to construct `std::ops::Bound` values directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Inclusivity {
    /// The bound excludes the endpoint.
    Exclusive,
    /// The bound includes the endpoint.
    Inclusive,
}

/// Ordered index mapping one payload field's values to the record ids that
/// hold them. All values inserted into one index must share a scalar
/// domain, per [`PayloadValue::same_domain`].
#[derive(Debug, Default)]
pub struct ScalarIndex {
    field: String,
    entries: BTreeMap<PayloadValue, BTreeSet<RecordId>>,
}

impl ScalarIndex {
    /// Creates an empty index over `field`.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            entries: BTreeMap::new(),
        }
    }

    /// The payload field this index covers.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Number of distinct values currently indexed.
    pub fn len(&self) -> usize {
        self.entries.values().map(|ids| ids.len()).sum()
    }

    /// Returns true if the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_domain(&self, value: &PayloadValue) -> Result<()> {
        if let Some((existing, _)) = self.entries.iter().next() {
            if !existing.same_domain(value) {
                return Err(VdbError::schema_violation(
                    self.field.clone(),
                    format!("value {value} is not in the same domain as existing entries"),
                ));
            }
        }
        Ok(())
    }

    /// Indexes `id` under `value`. Fails if `value`'s domain does not match
    /// values already present in the index.
    pub fn insert(&mut self, value: PayloadValue, id: RecordId) -> Result<()> {
        self.check_domain(&value)?;
        self.entries.entry(value).or_default().insert(id);
        Ok(())
    }

    /// Removes `id` from under `value`, dropping the value's entry entirely
    /// once its id set is empty. No-op if absent.
    pub fn remove(&mut self, value: &PayloadValue, id: RecordId) {
        if let Some(ids) = self.entries.get_mut(value) {
            ids.remove(&id);
            if ids.is_empty() {
                self.entries.remove(value);
            }
        }
    }

    /// Ids whose indexed value equals `value`.
    pub fn eq(&self, value: &PayloadValue) -> BTreeSet<RecordId> {
        self.entries.get(value).cloned().unwrap_or_default()
    }

    /// Ids whose indexed value falls within `[lo, hi]`, with each endpoint's
    /// inclusivity controlled independently. `None` means unbounded on that
    /// side.
    pub fn range(
        &self,
        lo: Option<(&PayloadValue, Inclusivity)>,
        hi: Option<(&PayloadValue, Inclusivity)>,
    ) -> BTreeSet<RecordId> {
        let lo_bound = match lo {
            Some((v, Inclusivity::Inclusive)) => Bound::Included(v.clone()),
            Some((v, Inclusivity::Exclusive)) => Bound::Excluded(v.clone()),
            None => Bound::Unbounded,
        };
        let hi_bound = match hi {
            Some((v, Inclusivity::Inclusive)) => Bound::Included(v.clone()),
            Some((v, Inclusivity::Exclusive)) => Bound::Excluded(v.clone()),
            None => Bound::Unbounded,
        };
        self.entries
            .range((lo_bound, hi_bound))
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }

    /// Ids whose indexed value is any of `values`.
    pub fn in_set(&self, values: &[PayloadValue]) -> BTreeSet<RecordId> {
        values.iter().flat_map(|v| self.eq(v)).collect()
    }
}
