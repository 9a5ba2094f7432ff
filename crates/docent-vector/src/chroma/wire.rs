//! Request and response bodies of the Chroma v2 REST API.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{QueryMatch, StoredRecord};

pub type Metadata = HashMap<String, Value>;

#[derive(Debug, Serialize)]
pub struct CreateCollection<'a> {
    pub name: &'a str,
    pub metadata: Metadata,
    pub get_or_create: bool,
}

#[derive(Debug, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Serialize)]
pub struct Upsert<'a> {
    pub ids: Vec<&'a str>,
    pub embeddings: Vec<&'a [f32]>,
    pub documents: Vec<&'a str>,
    pub metadatas: Vec<Option<Metadata>>,
}

#[derive(Debug, Serialize)]
pub struct Query<'a> {
    pub query_embeddings: [&'a [f32]; 1],
    pub n_results: usize,
    pub include: &'static [&'static str],
}

#[derive(Debug, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub ids: Vec<Vec<String>>,
    #[serde(default)]
    pub documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    #[serde(default)]
    pub distances: Option<Vec<Vec<Option<f64>>>>,
}

impl QueryResponse {
    /// Zips the matches of the first (only) query embedding.
    ///
    /// A missing distance sorts the match last.
    pub fn into_matches(self) -> Vec<QueryMatch> {
        let ids = self.ids.into_iter().next().unwrap_or_default();
        let mut documents = first_row(self.documents).into_iter();
        let mut metadatas = first_row(self.metadatas).into_iter();
        let mut distances = first_row(self.distances).into_iter();

        ids.into_iter()
            .map(|id| QueryMatch {
                id,
                document: documents.next().flatten().unwrap_or_default(),
                metadata: metadatas.next().flatten().unwrap_or_default(),
                distance: distances.next().flatten().unwrap_or(f64::INFINITY),
            })
            .collect()
    }
}

fn first_row<T>(column: Option<Vec<Vec<T>>>) -> Vec<T> {
    column
        .and_then(|rows| rows.into_iter().next())
        .unwrap_or_default()
}

#[derive(Debug, Default, Serialize)]
pub struct Get<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<&'a [String]>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    pub include: &'static [&'static str],
}

#[derive(Debug, Default, Deserialize)]
pub struct GetResponse {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub documents: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Option<Metadata>>>,
}

impl GetResponse {
    /// Zips the column-oriented response into records.
    pub fn into_records(self) -> Vec<StoredRecord> {
        let mut documents = self.documents.unwrap_or_default().into_iter();
        let mut metadatas = self.metadatas.unwrap_or_default().into_iter();

        self.ids
            .into_iter()
            .map(|id| StoredRecord {
                id,
                document: documents.next().flatten().unwrap_or_default(),
                metadata: metadatas.next().flatten().unwrap_or_default(),
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct Delete<'a> {
    pub ids: &'a [String],
}

/// Chroma only stores scalar metadata; nulls and nested values are dropped.
pub fn scalar_metadata(metadata: &Metadata) -> Option<Metadata> {
    let scalars: Metadata = metadata
        .iter()
        .filter(|(_, v)| matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_)))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    (!scalars.is_empty()).then_some(scalars)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn get_response_zips_columns() {
        let response: GetResponse = serde_json::from_value(json!({
            "ids": ["a", "b"],
            "documents": ["alpha", null],
            "metadatas": [{ "type": "pdf" }, null],
        }))
        .unwrap();

        let records = response.into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].document, "alpha");
        assert_eq!(records[0].metadata["type"], json!("pdf"));
        assert_eq!(records[1].document, "");
        assert!(records[1].metadata.is_empty());
    }

    #[test]
    fn query_response_zips_first_row() {
        let response: QueryResponse = serde_json::from_value(json!({
            "ids": [["a", "b", "c"]],
            "documents": [["alpha", "beta", null]],
            "metadatas": [[{ "type": "pdf", "chunk_index": 0 }, null, { "type": "text" }]],
            "distances": [[0.12, 0.5, null]],
            "embeddings": null,
            "include": ["documents", "metadatas", "distances"],
        }))
        .unwrap();

        let matches = response.into_matches();
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].id, "a");
        assert_eq!(matches[0].document, "alpha");
        assert_eq!(matches[0].metadata["chunk_index"], json!(0));
        assert_eq!(matches[0].distance, 0.12);
        assert!(matches[1].metadata.is_empty());
        assert_eq!(matches[2].document, "");
        assert_eq!(matches[2].distance, f64::INFINITY);
    }

    #[test]
    fn query_response_without_distances() {
        let response: QueryResponse = serde_json::from_value(json!({
            "ids": [["a"]],
            "documents": [["alpha"]],
            "metadatas": null,
            "distances": null,
        }))
        .unwrap();

        let matches = response.into_matches();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].distance, f64::INFINITY);
        assert!(QueryResponse::default().into_matches().is_empty());
    }

    #[test]
    fn scalar_metadata_drops_non_scalars() {
        let mut metadata = Metadata::new();
        metadata.insert("type".into(), json!("pdf"));
        metadata.insert("chunk_index".into(), json!(3));
        metadata.insert("url".into(), Value::Null);
        metadata.insert("tags".into(), json!(["x"]));

        let scalars = scalar_metadata(&metadata).unwrap();
        assert_eq!(scalars.len(), 2);
        assert!(scalar_metadata(&Metadata::new()).is_none());
    }

    #[test]
    fn get_request_renames_where() {
        let body = serde_json::to_value(Get {
            filter: Some(json!({ "type": { "$eq": "pdf" } })),
            include: &[],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(body, json!({ "where": { "type": { "$eq": "pdf" } }, "include": [] }));
    }
}
