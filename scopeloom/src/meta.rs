//! The metadata registry SCope reads to populate its side panels.
//!
//! Three lists (embeddings, annotations, metrics) serialized together as one
//! JSON object. Field order in the structs below is the key order of the
//! serialized blob.
//!
//! Every insertion replaces entries sharing its key. Lists are rebuilt with a
//! filter-then-append pass and assigned in one step, so a registry is never
//! observed half updated.

use serde::{Deserialize, Serialize};

/// A registered 2D layout. `id` is the stringified column name used in the
/// `Embeddings_X`/`Embeddings_Y` attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingMeta {
    pub id: String,
    pub name: String,
}

/// A categorical cell annotation and its sorted distinct values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationMeta {
    pub name: String,
    pub values: Vec<String>,
}

/// A numeric per-cell metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricMeta {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaData {
    pub embeddings: Vec<EmbeddingMeta>,
    pub annotations: Vec<AnnotationMeta>,
    pub metrics: Vec<MetricMeta>,
}

/// Keep every item `keep` accepts, in order, then append `item`.
pub fn replace_where<T: Clone>(items: &[T], keep: impl Fn(&T) -> bool, item: T) -> Vec<T> {
    items
        .iter()
        .filter(|x| keep(x))
        .cloned()
        .chain(std::iter::once(item))
        .collect()
}

impl MetaData {
    /// Register an embedding, dropping any entry with the same id *or* the same name.
    pub fn register_embedding(&mut self, id: &str, name: &str) {
        self.embeddings = replace_where(
            &self.embeddings,
            |e| e.id != id && e.name != name,
            EmbeddingMeta {
                id: id.to_string(),
                name: name.to_string(),
            },
        );
    }

    /// Register an annotation, dropping any entry with the same name.
    pub fn register_annotation(&mut self, name: &str, values: Vec<String>) {
        self.annotations = replace_where(
            &self.annotations,
            |a| a.name != name,
            AnnotationMeta {
                name: name.to_string(),
                values,
            },
        );
    }

    /// Register a metric, dropping any entry with the same name.
    pub fn register_metric(&mut self, name: &str) {
        self.metrics = replace_where(
            &self.metrics,
            |m| m.name != name,
            MetricMeta {
                name: name.to_string(),
            },
        );
    }

    pub fn annotation(&self, name: &str) -> Option<&AnnotationMeta> {
        self.annotations.iter().find(|a| a.name == name)
    }

    pub fn metric(&self, name: &str) -> Option<&MetricMeta> {
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty() && self.annotations.is_empty() && self.metrics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn embedding_replaced_by_id_or_name() {
        let mut meta = MetaData::default();
        meta.register_embedding("0", "pca");
        meta.register_embedding("1", "tsne");
        meta.register_embedding("2", "umap");

        // same name, different id
        meta.register_embedding("5", "pca");
        let ids: Vec<&str> = meta.embeddings.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "5"]);

        // same id, different name
        meta.register_embedding("1", "diffmap");
        let names: Vec<&str> = meta.embeddings.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["umap", "pca", "diffmap"]);
    }

    #[test]
    fn annotation_replaced_by_name_with_new_values() {
        let mut meta = MetaData::default();
        meta.register_annotation("cluster", vec!["0".into(), "1".into()]);
        meta.register_annotation("batch", vec!["a".into()]);
        meta.register_annotation("cluster", vec!["2".into()]);

        assert_eq!(meta.annotations.len(), 2);
        assert_eq!(meta.annotations[1].name, "cluster");
        assert_eq!(meta.annotation("cluster").unwrap().values, ["2"]);
    }

    #[test]
    fn metric_replaced_by_name() {
        let mut meta = MetaData::default();
        meta.register_metric("n_genes");
        meta.register_metric("n_counts");
        meta.register_metric("n_genes");
        let names: Vec<&str> = meta.metrics.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["n_counts", "n_genes"]);
        assert!(meta.metric("n_genes").is_some());
    }

    #[test]
    fn json_key_order_is_fixed() {
        let mut meta = MetaData::default();
        meta.register_embedding("0", "pca");
        meta.register_annotation("cluster", vec!["A".into()]);
        meta.register_metric("n_counts");
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(
            json,
            r#"{"embeddings":[{"id":"0","name":"pca"}],"annotations":[{"name":"cluster","values":["A"]}],"metrics":[{"name":"n_counts"}]}"#
        );
        assert!(MetaData::default().is_empty());
    }

    proptest! {
        #[test]
        fn names_stay_unique(names in proptest::collection::vec("[a-d]", 0..40)) {
            let mut meta = MetaData::default();
            for (i, name) in names.iter().enumerate() {
                meta.register_embedding(&i.to_string(), name);
                meta.register_annotation(name, vec![i.to_string()]);
                meta.register_metric(name);
            }
            let mut seen: Vec<&str> = meta.annotations.iter().map(|a| a.name.as_str()).collect();
            seen.sort_unstable();
            seen.dedup();
            prop_assert_eq!(seen.len(), meta.annotations.len());
            prop_assert_eq!(meta.embeddings.len(), meta.metrics.len());
            if let Some(last) = names.last() {
                prop_assert_eq!(&meta.metrics.last().unwrap().name, last);
            }
        }
    }
}
