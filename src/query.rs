//! The chainable query pipeline: an immutable builder value executed in a
//! fixed order regardless of the order its stages were chained in (§4.6).

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, VdbError};
use crate::hybrid;
use crate::record::{Payload, Record};
use crate::table::Table;
use crate::types::{PayloadValue, RecordId};
use crate::vector::RecordFilter;

/// The active ranking mode of a query, set by at most one of
/// [`QueryBuilder::vector_search`], [`QueryBuilder::text_search`], or
/// [`QueryBuilder::hybrid`].
#[derive(Clone, Debug)]
enum RankingMode {
    None,
    Vector { query: Vec<f32>, k: usize },
    Text { query: String, k: usize },
    Hybrid { q_vec: Vec<f32>, q_text: String, w: f32, k: usize },
}

/// One result row: a record id, its ranking score (absent for a mode-less
/// query), and its (possibly projected) payload.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryHit {
    /// The matched record's id.
    pub id: RecordId,
    /// Ranking score, `None` for a mode-less query.
    pub score: Option<f32>,
    /// The record's payload, or only the fields named by `select`.
    pub payload: Payload,
}

/// An opaque predicate over a whole record, used by [`QueryBuilder::where_`].
pub type RecordPredicate = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// An immutable, chainable query description. Each builder method consumes
/// `self` and returns a new value; nothing executes until [`QueryBuilder::execute`]
/// is called.
#[derive(Clone)]
pub struct QueryBuilder<'a> {
    table: &'a Table,
    equality_filters: Vec<(String, PayloadValue)>,
    predicates: Vec<RecordPredicate>,
    mode: RankingMode,
    index_name: Option<String>,
    select_fields: Option<Vec<String>>,
    limit: Option<usize>,
    offset: usize,
}

impl<'a> QueryBuilder<'a> {
    pub(crate) fn new(table: &'a Table) -> Self {
        Self {
            table,
            equality_filters: Vec::new(),
            predicates: Vec::new(),
            mode: RankingMode::None,
            index_name: None,
            select_fields: None,
            limit: None,
            offset: 0,
        }
    }

    /// Adds a conjunctive equality predicate: `field == value`. Multiple
    /// calls AND together.
    pub fn filter(mut self, field: impl Into<String>, value: PayloadValue) -> Self {
        self.equality_filters.push((field.into(), value));
        self
    }

    /// Adds an opaque predicate over the whole record. Named `where_`
    /// because `where` is a reserved word.
    pub fn where_(mut self, predicate: impl Fn(&Record) -> bool + Send + Sync + 'static) -> Self {
        self.predicates.push(Arc::new(predicate));
        self
    }

    /// Sets ranking mode to vector nearest-neighbor search.
    pub fn vector_search(mut self, query: Vec<f32>, k: usize) -> Self {
        self.mode = RankingMode::Vector { query, k };
        self
    }

    /// Sets ranking mode to full-text BM25 search.
    pub fn text_search(mut self, query: impl Into<String>, k: usize) -> Self {
        self.mode = RankingMode::Text {
            query: query.into(),
            k,
        };
        self
    }

    /// Sets ranking mode to hybrid vector+text fusion with weight `w`.
    pub fn hybrid(mut self, q_vec: Vec<f32>, q_text: impl Into<String>, w: f32, k: usize) -> Self {
        self.mode = RankingMode::Hybrid {
            q_vec,
            q_text: q_text.into(),
            w,
            k,
        };
        self
    }

    /// Selects a named vector index for the vector side of the active mode.
    /// Validity (existence, compatibility with the mode) is checked at
    /// [`QueryBuilder::execute`] time, since the builder is an inert value
    /// until then.
    pub fn use_index(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }

    /// Restricts the payload returned in each hit to `fields`. The record
    /// id is always present regardless of this projection.
    pub fn select(mut self, fields: Vec<String>) -> Self {
        self.select_fields = Some(fields);
        self
    }

    /// Caps the number of rows returned, applied after `offset`.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Skips the first `m` ranked rows before `limit` is applied.
    pub fn offset(mut self, m: usize) -> Self {
        self.offset = m;
        self
    }

    fn passes(&self, record: &Record) -> bool {
        for (field, value) in &self.equality_filters {
            if record.field(field) != Some(value) {
                return false;
            }
        }
        self.predicates.iter().all(|p| p(record))
    }

    fn project(&self, payload: &Payload) -> Payload {
        match &self.select_fields {
            None => payload.clone(),
            Some(fields) => fields
                .iter()
                .filter_map(|f| payload.get(f).map(|v| (f.clone(), v.clone())))
                .collect(),
        }
    }

    /// Runs the pipeline against the table it was built from, in the fixed
    /// order: determine candidates (with index pushdown when a compatible
    /// ranking mode and index exist), apply scalar filters, fuse rankings
    /// for hybrid mode, apply offset/limit, then project with `select`.
    pub fn execute(&self) -> Result<Vec<QueryHit>> {
        if let Some(name) = &self.index_name {
            let (_kind, metric) = self
                .table
                .vector_index_kind_metric(name)
                .ok_or_else(|| VdbError::unknown_index(name.clone()))?;
            match &self.mode {
                RankingMode::Vector { .. } | RankingMode::Hybrid { .. } => {
                    let table_metric = self.table.metric();
                    if metric != table_metric {
                        return Err(VdbError::incompatible_index(
                            name.clone(),
                            format!(
                                "index '{name}' was built with {metric:?} but the table's metric is {table_metric:?}"
                            ),
                        ));
                    }
                }
                RankingMode::Text { .. } | RankingMode::None => {
                    return Err(VdbError::incompatible_index(
                        name.clone(),
                        "use_index requires a vector or hybrid ranking mode",
                    ));
                }
            }
        }

        // Snapshot every live record with a single read-lock acquisition up
        // front. The closures below only ever consult this snapshot, never
        // `self.table` again, so a vector/text index search holding its own
        // read guard can invoke them per-candidate without recursively
        // re-entering the table's `RwLock` (which is not reentrant and would
        // deadlock against a writer queued in between the two acquisitions).
        let snapshot: HashMap<RecordId, Record> =
            self.table.scan().into_iter().map(|r| (r.id, r)).collect();
        let filter_fn = |id: RecordId| snapshot.get(&id).map(|r| self.passes(r)).unwrap_or(false);
        let limit = self.limit.unwrap_or(usize::MAX);

        let rows: Vec<(RecordId, Option<f32>)> = match &self.mode {
            RankingMode::None => {
                let mut records: Vec<&Record> =
                    snapshot.values().filter(|r| self.passes(r)).collect();
                records.sort_by_key(|r| r.id);
                records.into_iter().map(|r| (r.id, None)).collect()
            }
            RankingMode::Vector { query, k } => {
                let k_prime = (*k).max(limit.saturating_add(self.offset));
                let filter_ref: &RecordFilter<'_> = &filter_fn;
                let hits = self.table.vector_search_filtered(
                    query,
                    k_prime,
                    self.index_name.as_deref(),
                    Some(filter_ref),
                )?;
                hits.into_iter().map(|(id, d)| (id, Some(d))).collect()
            }
            RankingMode::Text { query, k } => {
                let k_prime = (*k).max(limit.saturating_add(self.offset));
                let filter_ref: &dyn Fn(RecordId) -> bool = &filter_fn;
                let hits = self.table.text_search_filtered(query, k_prime, Some(filter_ref))?;
                hits.into_iter().map(|(id, s)| (id, Some(s))).collect()
            }
            RankingMode::Hybrid { q_vec, q_text, w, k } => {
                let k_prime = (*k).max(limit.saturating_add(self.offset));
                let metric = self
                    .index_name
                    .as_deref()
                    .and_then(|name| self.table.vector_index_kind_metric(name))
                    .map(|(_, m)| m)
                    .unwrap_or_else(|| self.table.metric());
                let vec_filter: &RecordFilter<'_> = &filter_fn;
                let text_filter: &dyn Fn(RecordId) -> bool = &filter_fn;
                let vector_hits = self.table.vector_search_filtered(
                    q_vec,
                    k_prime,
                    self.index_name.as_deref(),
                    Some(vec_filter),
                )?;
                let text_hits = self.table.text_search_filtered(q_text, k_prime, Some(text_filter))?;
                let fused = hybrid::fuse(&vector_hits, metric, &text_hits, *w, k_prime);
                fused.into_iter().map(|(id, s)| (id, Some(s))).collect()
            }
        };

        let hits = rows
            .into_iter()
            .skip(self.offset)
            .take(limit)
            .map(|(id, score)| {
                let payload = snapshot
                    .get(&id)
                    .map(|r| self.project(&r.payload))
                    .unwrap_or_default();
                QueryHit { id, score, payload }
            })
            .collect();
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableConfig;
    use std::collections::BTreeMap;

    fn payload(pairs: &[(&str, PayloadValue)]) -> Payload {
        pairs.iter().cloned().map(|(k, v)| (k.to_string(), v)).collect::<BTreeMap<_, _>>()
    }

    fn build_table() -> Table {
        let mut config = TableConfig::new(2);
        config.text_fields = vec!["text".to_string()];
        let table = Table::new(config).unwrap();
        table
            .add(
                payload(&[("category", PayloadValue::String("a".into())), ("text", PayloadValue::String("cats".into()))]),
                Some(vec![1.0, 0.0]),
            )
            .unwrap();
        table
            .add(
                payload(&[("category", PayloadValue::String("b".into())), ("text", PayloadValue::String("dogs".into()))]),
                Some(vec![0.0, 1.0]),
            )
            .unwrap();
        table
    }

    #[test]
    fn test_modeless_query_returns_ascending_id_order() {
        let table = build_table();
        let hits = table.query().execute().unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].id < hits[1].id);
        assert!(hits[0].score.is_none());
    }

    #[test]
    fn test_equality_filter_restricts_rows() {
        let table = build_table();
        let hits = table
            .query()
            .filter("category", PayloadValue::String("b".into()))
            .execute()
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload.get("category"), Some(&PayloadValue::String("b".into())));
    }

    #[test]
    fn test_where_predicate_is_applied() {
        let table = build_table();
        let hits = table
            .query()
            .where_(|r| r.field("category") == Some(&PayloadValue::String("a".into())))
            .execute()
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_vector_search_ranks_by_distance() {
        let table = build_table();
        let hits = table.query().vector_search(vec![1.0, 0.0], 2).execute().unwrap();
        assert_eq!(hits[0].payload.get("category"), Some(&PayloadValue::String("a".into())));
    }

    #[test]
    fn test_select_projects_payload() {
        let table = build_table();
        let hits = table
            .query()
            .select(vec!["category".to_string()])
            .execute()
            .unwrap();
        assert!(hits[0].payload.contains_key("category"));
        assert!(!hits[0].payload.contains_key("text"));
    }

    #[test]
    fn test_limit_and_offset_paginate() {
        let table = build_table();
        let all = table.query().execute().unwrap();
        let page = table.query().offset(1).limit(1).execute().unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, all[1].id);
    }

    #[test]
    fn test_use_index_missing_name_is_hard_error() {
        let table = build_table();
        let err = table
            .query()
            .vector_search(vec![1.0, 0.0], 2)
            .use_index("missing")
            .execute()
            .unwrap_err();
        assert!(err.is_unknown_index());
    }

    #[test]
    fn test_use_index_with_text_mode_is_hard_error() {
        let table = build_table();
        let err = table
            .query()
            .text_search("cats", 2)
            .use_index("default")
            .execute()
            .unwrap_err();
        assert!(err.is_incompatible_index());
    }

    #[test]
    fn test_use_index_with_no_mode_is_hard_error() {
        let table = build_table();
        let err = table.query().use_index("default").execute().unwrap_err();
        assert!(err.is_incompatible_index());
    }

    #[test]
    fn test_use_index_metric_mismatch_is_hard_error() {
        use crate::config::{KdTreeParams, VectorIndexKind};
        use crate::config::DistanceMetric;
        use crate::vector::VectorIndexParams;

        let table = build_table();
        table
            .create_vector_index(
                "kd",
                VectorIndexKind::KdTree,
                DistanceMetric::Euclidean,
                VectorIndexParams::KdTree(KdTreeParams::default()),
            )
            .unwrap();
        let err = table
            .query()
            .vector_search(vec![1.0, 0.0], 2)
            .use_index("kd")
            .execute()
            .unwrap_err();
        assert!(err.is_incompatible_index());
    }

    #[test]
    fn test_hybrid_mode_fuses_both_rankings() {
        let table = build_table();
        let hits = table
            .query()
            .hybrid(vec![1.0, 0.0], "cats", 0.5, 2)
            .execute()
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score.is_some());
    }
}
