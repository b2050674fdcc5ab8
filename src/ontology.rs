use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::debug;

use crate::error::GideError;
use crate::identifiers;

pub const DEFAULT_OLS_URL: &str = "https://www.ebi.ac.uk/ols4/api";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OntologyTerm {
    pub iri: String,
    pub label: String,
}

pub trait TermLookup: Send + Sync {
    fn search(&self, ontology: &str, query: &str) -> Result<Vec<OntologyTerm>, GideError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineLookup;

impl TermLookup for OfflineLookup {
    fn search(&self, _ontology: &str, _query: &str) -> Result<Vec<OntologyTerm>, GideError> {
        Ok(Vec::new())
    }
}

#[derive(Clone)]
pub struct OlsHttpClient {
    client: Client,
    base_url: String,
}

impl OlsHttpClient {
    pub fn new(base_url: &str) -> Result<Self, GideError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("gide-search/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GideError::OntologyHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| GideError::OntologyHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn connect(base_url: &str, ontology: &str) -> Result<Self, GideError> {
        let lookup = Self::new(base_url)?;
        let url = format!("{}/v2/ontologies/{ontology}", lookup.base_url);
        let response = lookup
            .client
            .get(&url)
            .send()
            .map_err(|err| GideError::OntologyHttp(err.to_string()))?;
        Self::handle_status(response)?;
        Ok(lookup)
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, GideError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "ontology lookup failed".to_string());
        Err(GideError::OntologyStatus { status, message })
    }
}

impl TermLookup for OlsHttpClient {
    fn search(&self, ontology: &str, query: &str) -> Result<Vec<OntologyTerm>, GideError> {
        let url = format!("{}/v2/ontologies/{ontology}/classes", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("search", query.trim().to_lowercase().as_str()),
                ("page", "0"),
                ("size", "20"),
                ("lang", "en"),
            ])
            .send()
            .map_err(|err| GideError::OntologyHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let body: Value = response
            .json()
            .map_err(|err| GideError::OntologyHttp(err.to_string()))?;
        Ok(parse_terms(&body))
    }
}

pub fn parse_terms(body: &Value) -> Vec<OntologyTerm> {
    body.get("elements")
        .and_then(Value::as_array)
        .map(|elements| {
            elements
                .iter()
                .filter_map(|element| {
                    let iri = element.get("iri").and_then(Value::as_str)?;
                    let label = match element.get("label")? {
                        Value::String(label) => label.as_str(),
                        Value::Array(labels) => labels.first().and_then(Value::as_str)?,
                        _ => return None,
                    };
                    Some(OntologyTerm {
                        iri: iri.to_string(),
                        label: label.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

pub struct LabelCache<L: TermLookup> {
    lookup: L,
    labels: HashMap<String, Option<String>>,
}

impl<L: TermLookup> LabelCache<L> {
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            labels: HashMap::new(),
        }
    }

    pub fn fbbi_label(&mut self, compact_id: &str) -> Option<String> {
        if let Some(cached) = self.labels.get(compact_id) {
            return cached.clone();
        }
        let label = match self.lookup.search("fbbi", compact_id) {
            Ok(terms) => terms
                .into_iter()
                .find(|term| {
                    identifiers::fbbi_id(&term.iri).as_deref() == Some(compact_id)
                })
                .map(|term| term.label),
            Err(err) => {
                debug!(compact_id, error = %err, "ontology label lookup failed");
                None
            }
        };
        self.labels.insert(compact_id.to_string(), label.clone());
        label
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    struct CountingLookup {
        calls: AtomicUsize,
        fail: bool,
    }

    impl TermLookup for CountingLookup {
        fn search(&self, _ontology: &str, _query: &str) -> Result<Vec<OntologyTerm>, GideError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GideError::OntologyHttp("offline".to_string()));
            }
            Ok(vec![
                OntologyTerm {
                    iri: "http://purl.obolibrary.org/obo/FBbi_00000399".to_string(),
                    label: "time lapse microscopy".to_string(),
                },
                OntologyTerm {
                    iri: "http://purl.obolibrary.org/obo/FBbi_00000246".to_string(),
                    label: "fluorescence microscopy".to_string(),
                },
            ])
        }
    }

    #[test]
    fn picks_term_matching_compact_id_and_caches() {
        let mut cache = LabelCache::new(CountingLookup {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        assert_eq!(
            cache.fbbi_label("FBbi:00000246").as_deref(),
            Some("fluorescence microscopy")
        );
        assert_eq!(
            cache.fbbi_label("FBbi:00000246").as_deref(),
            Some("fluorescence microscopy")
        );
        assert_eq!(cache.lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failures_are_cached_misses() {
        let mut cache = LabelCache::new(CountingLookup {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        assert_eq!(cache.fbbi_label("FBbi:00000246"), None);
        assert_eq!(cache.fbbi_label("FBbi:00000246"), None);
        assert_eq!(cache.lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn parses_ols_elements() {
        let body = json!({
            "elements": [
                {"iri": "http://purl.obolibrary.org/obo/FBbi_00000251", "label": ["confocal microscopy"]},
                {"iri": "http://purl.obolibrary.org/obo/FBbi_00000246", "label": "fluorescence microscopy"},
                {"label": "no iri"}
            ]
        });
        let terms = parse_terms(&body);
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].label, "confocal microscopy");
    }
}
