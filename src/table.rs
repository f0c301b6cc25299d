//! The record store: owns records and keeps every index in sync with them.
//!
//! A [`Table`] serializes writers behind one `RwLock` per the crate's
//! single-writer-many-readers concurrency model; readers (`vector_search`,
//! `text_search`, `get`, `scan`) take a shared read guard, and every
//! mutating operation is one write-guard acquisition from start to finish.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use tracing::{debug, info, instrument, warn};

use crate::config::{DistanceMetric, TableConfig, VectorIndexKind};
use crate::distance;
use crate::embedding::{Embedder, NoEmbedder};
use crate::error::{Result, VdbError};
use crate::fulltext::FulltextIndex;
use crate::hybrid;
use crate::record::{Payload, Record};
use crate::scalar::ScalarIndex;
use crate::types::{PayloadValue, RecordId, RecordIdGenerator};
use crate::vector::{RecordFilter, VectorIndex, VectorIndexHandle, VectorIndexParams};

/// Name of the brute-force index created implicitly for every table.
pub const DEFAULT_VECTOR_INDEX: &str = "default";

struct TableState {
    id_gen: RecordIdGenerator,
    embedder: Box<dyn Embedder>,
    records: BTreeMap<RecordId, Record>,
    vector_indexes: HashMap<String, VectorIndexHandle>,
    scalar_indexes: HashMap<String, ScalarIndex>,
    fulltext_index: Option<FulltextIndex>,
    fulltext_fields: Vec<String>,
}

fn prepare_vector(config: &TableConfig, vector: &[f32]) -> Result<Vec<f32>> {
    distance::validate_dimension(vector, config.dimension)?;
    distance::validate_finite(vector)?;
    if config.metric.requires_normalization() {
        Ok(distance::normalize(vector))
    } else {
        Ok(vector.to_vec())
    }
}

fn resolve_vector(state: &TableState, payload: &Payload, vector: Option<Vec<f32>>) -> Result<Vec<f32>> {
    match vector {
        Some(v) => Ok(v),
        None => {
            let text = match payload.get("text") {
                Some(PayloadValue::String(s)) if !s.is_empty() => s.clone(),
                _ => {
                    return Err(VdbError::embedding_missing(
                        "add() omitted a vector and payload has no non-empty 'text' field",
                    ))
                }
            };
            state.embedder.embed(&text)
        }
    }
}

fn derive_text_tokens(state: &TableState, payload: &Payload) -> Vec<String> {
    let Some(ft) = state.fulltext_index.as_ref() else {
        return Vec::new();
    };
    let joined = state
        .fulltext_fields
        .iter()
        .filter_map(|field| match payload.get(field) {
            Some(PayloadValue::String(s)) => Some(s.clone()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ");
    ft.tokenize(&joined)
}

/// Propagates a new or replacement record into every index. On failure,
/// rolls back whichever indexes it had already updated and returns the
/// error; the caller is responsible for restoring `records` itself.
fn propagate_insert(state: &mut TableState, record: &Record) -> Result<()> {
    let mut applied_vector = Vec::new();
    let mut applied_scalar = Vec::new();
    let mut fulltext_applied = false;

    let result: Result<()> = (|| {
        for (name, idx) in state.vector_indexes.iter_mut() {
            idx.insert(record.id, &record.vector);
            applied_vector.push(name.clone());
        }
        for (field, idx) in state.scalar_indexes.iter_mut() {
            if let Some(value) = record.payload.get(field) {
                idx.insert(value.clone(), record.id)?;
                applied_scalar.push(field.clone());
            }
        }
        if let Some(ft) = state.fulltext_index.as_mut() {
            ft.index_tokens(record.id, record.text_tokens.clone());
            fulltext_applied = true;
        }
        Ok(())
    })();

    if let Err(err) = result {
        warn!(id = %record.id, error = %err, "index propagation failed, rolling back");
        for name in &applied_vector {
            state.vector_indexes.get_mut(name).unwrap().remove(record.id);
        }
        for field in &applied_scalar {
            if let Some(value) = record.payload.get(field) {
                state.scalar_indexes.get_mut(field).unwrap().remove(value, record.id);
            }
        }
        if fulltext_applied {
            state.fulltext_index.as_mut().unwrap().remove(record.id);
        }
        return Err(err);
    }

    for (_, idx) in state.vector_indexes.iter_mut() {
        if idx.needs_rebuild() {
            let live: Vec<(RecordId, Vec<f32>)> = state
                .records
                .values()
                .map(|r| (r.id, r.vector.clone()))
                .collect();
            idx.rebuild(&live);
            info!("vector index retrained after threshold crossed");
        }
    }
    Ok(())
}

fn remove_from_indexes(state: &mut TableState, record: &Record) {
    for (_, idx) in state.vector_indexes.iter_mut() {
        idx.remove(record.id);
    }
    for (field, idx) in state.scalar_indexes.iter_mut() {
        if let Some(value) = record.payload.get(field) {
            idx.remove(value, record.id);
        }
    }
    if let Some(ft) = state.fulltext_index.as_mut() {
        ft.remove(record.id);
    }
}

/// Inserts `record` (a freshly built, not-yet-stored record) and propagates
/// it to every index, rolling back the store itself if propagation fails.
fn insert_record(state: &mut TableState, record: Record) -> Result<()> {
    let id = record.id;
    state.records.insert(id, record.clone());
    if let Err(err) = propagate_insert(state, &record) {
        state.records.remove(&id);
        return Err(err);
    }
    Ok(())
}

/// Replaces the record at `id` (which must already exist) and propagates
/// the change, rolling back to `old` on failure.
fn replace_record(state: &mut TableState, old: Record, new: Record) -> Result<()> {
    let id = new.id;
    remove_from_indexes(state, &old);
    state.records.insert(id, new.clone());
    if let Err(err) = propagate_insert(state, &new) {
        state.records.insert(id, old.clone());
        let _ = propagate_insert(state, &old);
        return Err(err);
    }
    Ok(())
}

/// An in-memory table: a fixed-dimension record store plus the vector,
/// scalar, and full-text indexes built over it.
pub struct Table {
    config: TableConfig,
    state: RwLock<TableState>,
}

impl Table {
    /// Creates a table with no embedder; `add` without an explicit vector
    /// fails with [`VdbError::EmbeddingMissing`].
    pub fn new(config: TableConfig) -> Result<Self> {
        let dimension = config.dimension;
        Self::with_embedder(config, Box::new(NoEmbedder::new(dimension)))
    }

    /// Creates a table backed by `embedder` for auto-embedding.
    #[instrument(skip(config, embedder))]
    pub fn with_embedder(config: TableConfig, embedder: Box<dyn Embedder>) -> Result<Self> {
        config.validate()?;
        let mut vector_indexes = HashMap::new();
        vector_indexes.insert(
            DEFAULT_VECTOR_INDEX.to_string(),
            VectorIndexHandle::new_brute_force(config.metric),
        );
        let fulltext_index = if config.text_fields.is_empty() {
            None
        } else {
            Some(FulltextIndex::default())
        };
        let fulltext_fields = config.text_fields.clone();
        let state = TableState {
            id_gen: RecordIdGenerator::new(),
            embedder,
            records: BTreeMap::new(),
            vector_indexes,
            scalar_indexes: HashMap::new(),
            fulltext_index,
            fulltext_fields,
        };
        info!(dimension = config.dimension, "table created");
        Ok(Self {
            config,
            state: RwLock::new(state),
        })
    }

    /// The table's configured embedding dimension.
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// The table's default distance metric.
    pub fn metric(&self) -> DistanceMetric {
        self.config.metric
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.state.read().unwrap().records.len()
    }

    /// True if the table holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if a vector index named `name` exists.
    pub fn has_vector_index(&self, name: &str) -> bool {
        self.state.read().unwrap().vector_indexes.contains_key(name)
    }

    /// True if a full-text index has been created.
    pub fn has_fulltext_index(&self) -> bool {
        self.state.read().unwrap().fulltext_index.is_some()
    }

    /// Returns the `(kind, metric)` of a named vector index, used to
    /// validate `use_index` against the active query mode before executing.
    pub(crate) fn vector_index_kind_metric(&self, name: &str) -> Option<(VectorIndexKind, DistanceMetric)> {
        let state = self.state.read().unwrap();
        state.vector_indexes.get(name).map(|h| (h.kind(), h.metric()))
    }

    /// Starts a chainable query against this table.
    pub fn query(&self) -> crate::query::QueryBuilder<'_> {
        crate::query::QueryBuilder::new(self)
    }

    /// Creates a named vector index, populated from the current live set.
    #[instrument(skip(self, params, name))]
    pub fn create_vector_index(
        &self,
        name: impl Into<String>,
        kind: VectorIndexKind,
        metric: DistanceMetric,
        params: VectorIndexParams,
    ) -> Result<()> {
        let name = name.into();
        let mut handle = VectorIndexHandle::create(kind, self.config.dimension, metric, params)?;
        let mut state = self.state.write().unwrap();
        if state.vector_indexes.contains_key(&name) {
            return Err(VdbError::unknown_index(format!(
                "index '{name}' already exists"
            )));
        }
        let live: Vec<(RecordId, Vec<f32>)> = state
            .records
            .values()
            .map(|r| (r.id, r.vector.clone()))
            .collect();
        handle.rebuild(&live);
        state.vector_indexes.insert(name.clone(), handle);
        debug!(index = %name, "vector index created");
        Ok(())
    }

    /// Creates a B-tree scalar index over `field`, populated from current
    /// records that have that field.
    #[instrument(skip(self, field))]
    pub fn create_btree_index(&self, field: impl Into<String>) -> Result<()> {
        let field = field.into();
        let mut state = self.state.write().unwrap();
        if state.scalar_indexes.contains_key(&field) {
            return Err(VdbError::unknown_index(format!(
                "scalar index '{field}' already exists"
            )));
        }
        let mut index = ScalarIndex::new(field.clone());
        for record in state.records.values() {
            if let Some(value) = record.field(&field) {
                index.insert(value.clone(), record.id)?;
            }
        }
        state.scalar_indexes.insert(field.clone(), index);
        debug!(field = %field, "scalar index created");
        Ok(())
    }

    /// Creates the table's full-text index over `fields`, replacing any
    /// existing one and reindexing all current records.
    #[instrument(skip(self, fields))]
    pub fn create_fulltext_index(&self, fields: Vec<String>) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.fulltext_fields = fields;
        let mut index = FulltextIndex::default();
        let ids: Vec<RecordId> = state.records.keys().copied().collect();
        for id in ids {
            let tokens = derive_text_tokens(&state, &state.records[&id].payload);
            state.records.get_mut(&id).unwrap().text_tokens = tokens.clone();
            index.index_tokens(id, tokens);
        }
        state.fulltext_index = Some(index);
        debug!("fulltext index created");
        Ok(())
    }

    /// Inserts a new record, generating its id. If `vector` is omitted, the
    /// payload's `text` field is auto-embedded.
    #[instrument(skip(self, payload, vector))]
    pub fn add(&self, payload: Payload, vector: Option<Vec<f32>>) -> Result<RecordId> {
        let mut state = self.state.write().unwrap();
        let raw_vector = resolve_vector(&state, &payload, vector)?;
        let vector = prepare_vector(&self.config, &raw_vector)?;
        let id = state.id_gen.next();
        let text_tokens = derive_text_tokens(&state, &payload);
        let record = Record {
            id,
            vector,
            payload,
            text_tokens,
        };
        insert_record(&mut state, record)?;
        info!(id = %id, "record added");
        Ok(id)
    }

    /// Replaces the payload (and optionally the vector) of an existing
    /// record. Rolls back to the prior record on any index failure.
    #[instrument(skip(self, payload, vector))]
    pub fn update(&self, id: RecordId, payload: Payload, vector: Option<Vec<f32>>) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let old = state
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| VdbError::unknown_id(id.get()))?;

        let raw_vector = vector.unwrap_or_else(|| old.vector.clone());
        let new_vector = prepare_vector(&self.config, &raw_vector)?;
        let text_tokens = derive_text_tokens(&state, &payload);
        let new_record = Record {
            id,
            vector: new_vector,
            payload,
            text_tokens,
        };
        replace_record(&mut state, old, new_record)?;
        info!(id = %id, "record updated");
        Ok(())
    }

    /// Updates only the fields present in `partial`, leaving the vector and
    /// every other payload field untouched.
    #[instrument(skip(self, partial))]
    pub fn merge(&self, id: RecordId, partial: Payload) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let old = state
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| VdbError::unknown_id(id.get()))?;

        let mut merged_payload = old.payload.clone();
        for (field, value) in partial {
            merged_payload.insert(field, value);
        }
        let text_tokens = derive_text_tokens(&state, &merged_payload);
        let new_record = Record {
            id,
            vector: old.vector.clone(),
            payload: merged_payload,
            text_tokens,
        };
        replace_record(&mut state, old, new_record)?;
        info!(id = %id, "record merged");
        Ok(())
    }

    /// Inserts at `id` if absent, otherwise behaves like [`Table::update`].
    #[instrument(skip(self, payload, vector))]
    pub fn upsert(&self, id: RecordId, payload: Payload, vector: Option<Vec<f32>>) -> Result<()> {
        let mut state = self.state.write().unwrap();
        match state.records.get(&id).cloned() {
            Some(old) => {
                let raw_vector = vector.unwrap_or_else(|| old.vector.clone());
                let new_vector = prepare_vector(&self.config, &raw_vector)?;
                let text_tokens = derive_text_tokens(&state, &payload);
                let new_record = Record {
                    id,
                    vector: new_vector,
                    payload,
                    text_tokens,
                };
                replace_record(&mut state, old, new_record)?;
                info!(id = %id, "record upserted (updated)");
            }
            None => {
                let raw_vector = resolve_vector(&state, &payload, vector)?;
                let new_vector = prepare_vector(&self.config, &raw_vector)?;
                let text_tokens = derive_text_tokens(&state, &payload);
                let record = Record {
                    id,
                    vector: new_vector,
                    payload,
                    text_tokens,
                };
                insert_record(&mut state, record)?;
                info!(id = %id, "record upserted (inserted)");
            }
        }
        Ok(())
    }

    /// Removes a record and its entries in every index.
    #[instrument(skip(self))]
    pub fn delete(&self, id: RecordId) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let record = state
            .records
            .remove(&id)
            .ok_or_else(|| VdbError::unknown_id(id.get()))?;
        remove_from_indexes(&mut state, &record);
        info!(id = %id, "record deleted");
        Ok(())
    }

    /// Returns a clone of the record with `id`, if live.
    pub fn get(&self, id: RecordId) -> Option<Record> {
        self.state.read().unwrap().records.get(&id).cloned()
    }

    /// Returns a clone of every live record, in ascending id order.
    pub fn scan(&self) -> Vec<Record> {
        self.state.read().unwrap().records.values().cloned().collect()
    }

    /// Nearest-neighbor search against a named (or the default) vector
    /// index.
    pub fn vector_search(
        &self,
        query: &[f32],
        k: usize,
        index_name: Option<&str>,
    ) -> Result<Vec<(RecordId, f32)>> {
        self.vector_search_filtered(query, k, index_name, None)
    }

    /// As [`Table::vector_search`], with an optional scalar filter pushed
    /// down into the index.
    pub(crate) fn vector_search_filtered(
        &self,
        query: &[f32],
        k: usize,
        index_name: Option<&str>,
        filter: Option<&RecordFilter<'_>>,
    ) -> Result<Vec<(RecordId, f32)>> {
        distance::validate_dimension(query, self.config.dimension)?;
        distance::validate_finite(query)?;
        let state = self.state.read().unwrap();
        let name = index_name.unwrap_or(DEFAULT_VECTOR_INDEX);
        let idx = state
            .vector_indexes
            .get(name)
            .ok_or_else(|| VdbError::unknown_index(name))?;
        let lookup = |id: RecordId| state.records.get(&id).map(|r| r.vector.clone());
        Ok(idx.search(query, k, filter, &lookup))
    }

    /// BM25 search against the table's full-text index.
    pub fn text_search(&self, query: &str, k: usize) -> Result<Vec<(RecordId, f32)>> {
        self.text_search_filtered(query, k, None)
    }

    /// As [`Table::text_search`], with an optional scalar filter.
    pub(crate) fn text_search_filtered(
        &self,
        query: &str,
        k: usize,
        filter: Option<&dyn Fn(RecordId) -> bool>,
    ) -> Result<Vec<(RecordId, f32)>> {
        if query.trim().is_empty() {
            return Err(VdbError::capacity_or_parameter(
                "text search query must not be empty",
            ));
        }
        let state = self.state.read().unwrap();
        let ft = state
            .fulltext_index
            .as_ref()
            .ok_or_else(|| VdbError::unknown_index("fulltext"))?;
        Ok(ft.search(query, k, filter))
    }

    /// Fuses vector and full-text rankings per the crate's hybrid scoring.
    #[instrument(skip(self, q_vec, q_text))]
    pub fn hybrid(
        &self,
        q_vec: &[f32],
        q_text: &str,
        w: f32,
        k: usize,
    ) -> Result<Vec<(RecordId, f32)>> {
        let candidate_cap = (k * 4).max(50);
        let vector_hits = self.vector_search(q_vec, candidate_cap, None)?;
        let text_hits = self.text_search(q_text, candidate_cap)?;
        Ok(hybrid::fuse(&vector_hits, self.config.metric, &text_hits, w, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KdTreeParams;
    use std::collections::BTreeMap;

    fn payload(pairs: &[(&str, PayloadValue)]) -> Payload {
        pairs.iter().cloned().map(|(k, v)| (k.to_string(), v)).collect::<BTreeMap<_, _>>()
    }

    #[test]
    fn test_add_and_get_roundtrip() {
        let table = Table::new(TableConfig::new(3)).unwrap();
        let id = table
            .add(payload(&[("name", PayloadValue::String("a".into()))]), Some(vec![1.0, 0.0, 0.0]))
            .unwrap();
        let record = table.get(id).unwrap();
        assert_eq!(record.vector, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_add_without_vector_requires_text_field() {
        let table = Table::new(TableConfig::new(3)).unwrap();
        let err = table.add(payload(&[]), None).unwrap_err();
        assert!(err.is_embedding_missing());
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let table = Table::new(TableConfig::new(3)).unwrap();
        let err = table.add(payload(&[]), Some(vec![1.0, 0.0])).unwrap_err();
        assert!(err.is_dimension_mismatch());
    }

    #[test]
    fn test_delete_removes_from_default_index() {
        let table = Table::new(TableConfig::new(3)).unwrap();
        let id = table.add(payload(&[]), Some(vec![1.0, 0.0, 0.0])).unwrap();
        table.delete(id).unwrap();
        assert!(table.get(id).is_none());
        let hits = table.vector_search(&[1.0, 0.0, 0.0], 5, None).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_merge_changes_only_given_fields() {
        let table = Table::new(TableConfig::new(3)).unwrap();
        let id = table
            .add(
                payload(&[("a", PayloadValue::Int(1)), ("b", PayloadValue::Int(2))]),
                Some(vec![1.0, 0.0, 0.0]),
            )
            .unwrap();
        table.merge(id, payload(&[("a", PayloadValue::Int(99))])).unwrap();
        let record = table.get(id).unwrap();
        assert_eq!(record.field("a"), Some(&PayloadValue::Int(99)));
        assert_eq!(record.field("b"), Some(&PayloadValue::Int(2)));
        assert_eq!(record.vector, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_upsert_inserts_then_updates() {
        let table = Table::new(TableConfig::new(3)).unwrap();
        let id = RecordId::new(42);
        table.upsert(id, payload(&[("v", PayloadValue::Int(1))]), Some(vec![1.0, 0.0, 0.0])).unwrap();
        table.upsert(id, payload(&[("v", PayloadValue::Int(2))]), Some(vec![0.0, 1.0, 0.0])).unwrap();
        let record = table.get(id).unwrap();
        assert_eq!(record.field("v"), Some(&PayloadValue::Int(2)));
        assert_eq!(record.vector, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_idempotent_upsert_with_same_arguments() {
        let table = Table::new(TableConfig::new(2)).unwrap();
        let id = RecordId::new(1);
        let p = payload(&[("v", PayloadValue::Int(1))]);
        table.upsert(id, p.clone(), Some(vec![1.0, 0.0])).unwrap();
        table.upsert(id, p, Some(vec![1.0, 0.0])).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_scalar_index_rejects_mixed_domain_and_rolls_back() {
        let table = Table::new(TableConfig::new(2)).unwrap();
        table.create_btree_index("tag").unwrap();
        table
            .add(payload(&[("tag", PayloadValue::Int(1))]), Some(vec![1.0, 0.0]))
            .unwrap();
        let before = table.len();
        let err = table
            .add(payload(&[("tag", PayloadValue::String("x".into()))]), Some(vec![0.0, 1.0]))
            .unwrap_err();
        assert!(err.is_schema_violation());
        assert_eq!(table.len(), before);
    }

    #[test]
    fn test_create_vector_index_populates_existing_records() {
        let table = Table::new(TableConfig::new(2)).unwrap();
        table.add(payload(&[]), Some(vec![1.0, 0.0])).unwrap();
        table.add(payload(&[]), Some(vec![0.0, 1.0])).unwrap();
        table
            .create_vector_index(
                "kd",
                VectorIndexKind::KdTree,
                DistanceMetric::Euclidean,
                VectorIndexParams::KdTree(KdTreeParams::default()),
            )
            .unwrap();
        let hits = table.vector_search(&[1.0, 0.0], 2, Some("kd")).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_hybrid_matches_fusion_scenario() {
        let mut config = TableConfig::new(3);
        config.text_fields = vec!["text".to_string()];
        let table = Table::new(config).unwrap();
        let a = table
            .add(
                payload(&[("text", PayloadValue::String("cats".into()))]),
                Some(vec![1.0, 0.0, 0.0]),
            )
            .unwrap();
        let b = table
            .add(
                payload(&[("text", PayloadValue::String("cats cats cats".into()))]),
                Some(vec![0.0, 1.0, 0.0]),
            )
            .unwrap();

        let vector_first = table.hybrid(&[1.0, 0.0, 0.0], "cats", 1.0, 2).unwrap();
        assert_eq!(vector_first[0].0, a);

        let text_first = table.hybrid(&[1.0, 0.0, 0.0], "cats", 0.0, 2).unwrap();
        assert_eq!(text_first[0].0, b);
    }

    #[test]
    fn test_unknown_index_name_errors() {
        let table = Table::new(TableConfig::new(2)).unwrap();
        let err = table.vector_search(&[1.0, 0.0], 5, Some("missing")).unwrap_err();
        assert!(err.is_unknown_index());
    }
}
