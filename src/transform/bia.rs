use std::time::Duration;

use chrono::NaiveDate;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::dates::{self, DefaultDates};
use crate::domain::{
    Author, BioSample, Funding, ImageAcquisitionProtocol, ImagingMethod, Organisation, Organism,
    Publication, Source, UNKNOWN, UNKNOWN_SAMPLE_TYPE, UnifiedRecord,
};
use crate::error::GideError;
use crate::identifiers;
use crate::normalize::{DedupVec, infer_sample_type, non_empty};
use crate::record::RecordBuilder;
use crate::transform::{TransformOutcome, Transformer};

pub const DEFAULT_BIA_URL: &str = "https://alpha.bioimagearchive.org/search/search/fts";
pub const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BiaStudy {
    #[serde(default)]
    pub accession_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub licence: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub keyword: Option<Vec<String>>,
    #[serde(default)]
    pub author: Option<Vec<BiaAuthor>>,
    #[serde(default)]
    pub grant: Option<Vec<BiaGrant>>,
    #[serde(default)]
    pub related_publication: Option<Vec<BiaPublication>>,
    #[serde(default)]
    pub dataset: Option<Vec<BiaDataset>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BiaAuthor {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub orcid: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub affiliation: Option<Vec<BiaAffiliation>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BiaAffiliation {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub rorid: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BiaGrant {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub funder: Option<Vec<BiaFunder>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BiaFunder {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BiaPublication {
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub pubmed_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors_name: Option<String>,
    #[serde(default)]
    pub publication_year: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BiaDataset {
    #[serde(default)]
    pub biological_entity: Option<Vec<BiaBiologicalEntity>>,
    #[serde(default)]
    pub acquisition_process: Option<Vec<BiaAcquisition>>,
    #[serde(default)]
    pub file_reference_count: Option<u64>,
    #[serde(default)]
    pub file_reference_size_bytes: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BiaBiologicalEntity {
    #[serde(default)]
    pub organism_classification: Option<Vec<BiaTaxon>>,
    #[serde(default)]
    pub biological_entity_description: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BiaTaxon {
    #[serde(default)]
    pub scientific_name: Option<String>,
    #[serde(default)]
    pub common_name: Option<String>,
    #[serde(default)]
    pub ncbi_id: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BiaAcquisition {
    #[serde(default)]
    pub imaging_method_name: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub fbbi_id: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub protocol_description: Option<String>,
    #[serde(default)]
    pub imaging_instrument_description: Option<String>,
}

fn list<T>(values: &Option<Vec<T>>) -> &[T] {
    values.as_deref().unwrap_or_default()
}

pub trait BiaClient: Send + Sync {
    fn search(&self, query: &str, page_size: usize) -> Result<Vec<Value>, GideError>;
}

#[derive(Clone)]
pub struct BiaHttpClient {
    client: Client,
    url: String,
}

impl BiaHttpClient {
    pub fn new(url: &str) -> Result<Self, GideError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("gide-search/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GideError::BiaHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| GideError::BiaHttp(err.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
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
            .unwrap_or_else(|_| "BioImage Archive search failed".to_string());
        Err(GideError::BiaStatus { status, message })
    }
}

impl BiaClient for BiaHttpClient {
    fn search(&self, query: &str, page_size: usize) -> Result<Vec<Value>, GideError> {
        let page_size = page_size.to_string();
        let response = self
            .client
            .get(&self.url)
            .query(&[("query", query), ("pagination.page_size", page_size.as_str())])
            .send()
            .map_err(|err| GideError::BiaHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let body: Value = response
            .json()
            .map_err(|err| GideError::BiaHttp(err.to_string()))?;
        Ok(search_hits(&body))
    }
}

pub fn search_hits(body: &Value) -> Vec<Value> {
    body.get("hits")
        .and_then(|hits| hits.get("hits"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn fbbi(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    identifiers::fbbi_id(raw).or_else(|| {
        raw.chars()
            .all(|c| c.is_ascii_digit())
            .then(|| format!("FBbi:{raw}"))
    })
}

fn taxon_id(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|id| u32::try_from(id).ok()),
        Value::String(id) => {
            identifiers::ncbi_taxon_id(id).or_else(|| id.trim().parse().ok())
        }
        _ => None,
    }
}

fn authors(study: &BiaStudy) -> Vec<Author> {
    list(&study.author)
        .iter()
        .map(|author| Author {
            name: non_empty(author.display_name.as_deref()).unwrap_or_else(|| UNKNOWN.to_string()),
            orcid: author
                .orcid
                .as_deref()
                .and_then(identifiers::normalize_orcid),
            email: non_empty(author.contact_email.as_deref()),
            affiliations: list(&author.affiliation)
                .iter()
                .map(|affiliation| Organisation {
                    display_name: non_empty(affiliation.display_name.as_deref())
                        .unwrap_or_else(|| UNKNOWN.to_string()),
                    rorid: affiliation.rorid.as_deref().and_then(identifiers::ror_id),
                    address: non_empty(affiliation.address.as_deref()),
                    website: non_empty(affiliation.website.as_deref()),
                    country: None,
                })
                .collect(),
        })
        .collect()
}

fn funding(study: &BiaStudy) -> Vec<Funding> {
    list(&study.grant)
        .iter()
        .filter_map(|grant| {
            let grant_id = non_empty(grant.id.as_deref())?;
            let funder = list(&grant.funder)
                .first()
                .and_then(|funder| non_empty(funder.display_name.as_deref()))
                .unwrap_or_else(|| UNKNOWN.to_string());
            Some(Funding { funder, grant_id })
        })
        .collect()
}

fn publications(study: &BiaStudy) -> Vec<Publication> {
    list(&study.related_publication)
        .iter()
        .map(|publication| Publication {
            doi: non_empty(publication.doi.as_deref()),
            pubmed_id: non_empty(publication.pubmed_id.as_deref()),
            title: non_empty(publication.title.as_deref()),
            authors_name: non_empty(publication.authors_name.as_deref()),
            year: publication.publication_year,
            ..Publication::default()
        })
        .filter(|publication| {
            publication.doi.is_some() || publication.pubmed_id.is_some() || publication.title.is_some()
        })
        .collect()
}

fn biosample(datasets: &[BiaDataset]) -> BioSample {
    let mut organisms = DedupVec::new();
    let mut description = None;
    let mut sample_type = UNKNOWN_SAMPLE_TYPE;

    for entity in datasets.iter().flat_map(|dataset| list(&dataset.biological_entity)) {
        for taxon in list(&entity.organism_classification) {
            let name = non_empty(taxon.scientific_name.as_deref())
                .or_else(|| non_empty(taxon.common_name.as_deref()))
                .unwrap_or_else(|| UNKNOWN.to_string());
            organisms.push(Organism {
                scientific_name: name,
                common_name: non_empty(taxon.common_name.as_deref()),
                ncbi_taxon_id: taxon.ncbi_id.as_ref().and_then(taxon_id),
            });
        }
        if description.is_none() {
            description = non_empty(entity.biological_entity_description.as_deref());
        }
        if sample_type == UNKNOWN_SAMPLE_TYPE {
            let text = format!(
                "{} {}",
                entity.biological_entity_description.as_deref().unwrap_or_default(),
                entity.title.as_deref().unwrap_or_default()
            );
            sample_type = infer_sample_type(Some(&text));
        }
    }

    let mut biosample = BioSample::new(organisms.into_vec(), sample_type);
    biosample.biological_entity_description = description;
    biosample
}

fn protocol(datasets: &[BiaDataset]) -> ImageAcquisitionProtocol {
    let mut methods = DedupVec::new();
    let mut protocol_description = None;
    let mut instrument_description = None;

    for acquisition in datasets.iter().flat_map(|dataset| list(&dataset.acquisition_process)) {
        let ids = list(&acquisition.fbbi_id);
        for (index, name) in list(&acquisition.imaging_method_name).iter().enumerate() {
            let Some(name) = non_empty(name.as_deref()) else {
                continue;
            };
            methods.push(ImagingMethod {
                fbbi_id: ids
                    .get(index)
                    .and_then(|id| id.as_deref())
                    .and_then(fbbi),
                ..ImagingMethod::named(name)
            });
        }
        if protocol_description.is_none() {
            protocol_description = non_empty(acquisition.protocol_description.as_deref());
        }
        if instrument_description.is_none() {
            instrument_description =
                non_empty(acquisition.imaging_instrument_description.as_deref());
        }
    }

    let mut protocol = ImageAcquisitionProtocol::new(methods.into_vec());
    protocol.protocol_description = protocol_description;
    protocol.imaging_instrument_description = instrument_description;
    protocol
}

fn file_stats(datasets: &[BiaDataset]) -> (Option<u64>, Option<u64>) {
    let count = datasets
        .iter()
        .filter_map(|dataset| dataset.file_reference_count)
        .fold(0u64, u64::saturating_add);
    let size = datasets
        .iter()
        .filter_map(|dataset| dataset.file_reference_size_bytes)
        .fold(0u64, u64::saturating_add);
    ((count > 0).then_some(count), (size > 0).then_some(size))
}

pub fn transform_study(study: &BiaStudy, fallback_date: NaiveDate) -> Option<UnifiedRecord> {
    let accession = non_empty(study.accession_id.as_deref())?;
    let datasets = list(&study.dataset);
    let (file_count, total_size_bytes) = file_stats(datasets);

    let record = RecordBuilder::new(Source::Bia, &accession)
        .title(non_empty(study.title.as_deref()))
        .description(non_empty(study.description.as_deref()))
        .license(non_empty(study.licence.as_deref()))
        .release_date(dates::parse_or(study.release_date.as_deref(), fallback_date))
        .biosample(biosample(datasets))
        .protocol(protocol(datasets))
        .authors(authors(study))
        .publications(publications(study))
        .funding(funding(study))
        .keywords(list(&study.keyword).to_vec())
        .data_doi(non_empty(study.doi.as_deref()))
        .file_stats(file_count, total_size_bytes)
        .build();
    Some(record)
}

pub fn transform_hit(
    hit: &Value,
    fallback_date: NaiveDate,
) -> Result<Option<UnifiedRecord>, GideError> {
    let source = hit.get("_source").cloned().unwrap_or(Value::Null);
    if source.is_null() {
        return Ok(None);
    }
    let study: BiaStudy =
        serde_json::from_value(source).map_err(|err| GideError::InvalidJson(err.to_string()))?;
    Ok(transform_study(&study, fallback_date))
}

pub struct BiaTransformer<C: BiaClient> {
    client: C,
    query: String,
    page_size: usize,
    fallback_date: NaiveDate,
}

impl<C: BiaClient> BiaTransformer<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            query: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            fallback_date: DefaultDates::default().bia,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_fallback_date(mut self, date: NaiveDate) -> Self {
        self.fallback_date = date;
        self
    }
}

impl<C: BiaClient> Transformer for BiaTransformer<C> {
    fn source_label(&self) -> &'static str {
        "bia"
    }

    fn transform_all(&mut self) -> Result<TransformOutcome, GideError> {
        let hits = self.client.search(&self.query, self.page_size)?;
        let mut outcome = TransformOutcome::default();
        for (index, hit) in hits.iter().enumerate() {
            match transform_hit(hit, self.fallback_date) {
                Ok(Some(record)) => outcome.records.push(record),
                Ok(None) => {
                    warn!(hit = index, "search hit has no accession id, skipping");
                    outcome.skipped += 1;
                }
                Err(err) => {
                    warn!(hit = index, error = %err, "failed to read search hit");
                    outcome.fail(format!("hit #{index}"), &err);
                }
            }
        }
        info!(
            hits = hits.len(),
            records = outcome.records.len(),
            skipped = outcome.skipped,
            "BIA transform finished"
        );
        Ok(outcome)
    }
}
