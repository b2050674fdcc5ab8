use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, info};

use crate::dates::{self, DefaultDates};
use crate::domain::{
    BioSample, ImageAcquisitionProtocol, ImagingMethod, Organism, Publication, Source,
    UNKNOWN_SAMPLE_TYPE, UnifiedRecord,
};
use crate::error::GideError;
use crate::identifiers;
use crate::ontology::{LabelCache, OfflineLookup, TermLookup};
use crate::rdf::{RdfTerm, TripleStore};
use crate::record::RecordBuilder;
use crate::transform::{TransformOutcome, Transformer};

pub const DEFAULT_LICENSE: &str = "CC BY 4.0";

pub mod vocab {
    pub const NS: &str = "http://ssbd.riken.jp/ontology/";
    pub const PROJECT: &str = "http://ssbd.riken.jp/ontology/SSBD_Project";
    pub const DATASET: &str = "http://ssbd.riken.jp/ontology/SSBD_dataset";
    pub const HAS_DATASET_OUTPUT: &str = "http://ssbd.riken.jp/ontology/has_dataset_output";
    pub const HAS_PROJECT_PUBLICATIONS: &str =
        "http://ssbd.riken.jp/ontology/has_project_publications";
    pub const HAS_PROJECT_URL: &str = "http://ssbd.riken.jp/ontology/has_project_url";
    pub const HAS_DESCRIPTION: &str = "http://ssbd.riken.jp/ontology/has_description";
    pub const HAS_LICENSE: &str = "http://ssbd.riken.jp/ontology/has_license";
    pub const HAS_SUBMISSION_DATE: &str = "http://ssbd.riken.jp/ontology/has_submission_date";
    pub const HAS_DATASET_TITLE: &str = "http://ssbd.riken.jp/ontology/has_dataset_title";
    pub const HAS_BIOSAMPLE: &str = "http://ssbd.riken.jp/ontology/has_biosample_information";
    pub const HAS_IMAGING_INFO: &str =
        "http://ssbd.riken.jp/ontology/has_imaging_method_total_info";
    pub const IS_ABOUT_ORGANISM: &str = "http://ssbd.riken.jp/ontology/is_about_organism";
    pub const IS_ABOUT_STRAIN: &str = "http://ssbd.riken.jp/ontology/is_about_strain";
    pub const HAS_IMAGING_TYPE: &str =
        "http://ssbd.riken.jp/ontology/has_imaging_method_recorded_type";
    pub const HAS_BODY: &str = "http://ssbd.riken.jp/ontology/has_body";
    pub const HAS_DOI: &str = "http://ssbd.riken.jp/ontology/has_doi";
    pub const HAS_PMID: &str = "http://ssbd.riken.jp/ontology/has_PMID";
    pub const HAS_PAPER_INFORMATION: &str = "http://ssbd.riken.jp/ontology/has_paper_information";
}

static CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(.+?)\s*\((\d{4})\)\s*(.+)$").expect("valid citation pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub authors_name: Option<String>,
    pub year: Option<i32>,
    pub title: String,
}

pub fn parse_citation(text: &str) -> Citation {
    let Some(caps) = CITATION.captures(text) else {
        return Citation {
            authors_name: None,
            year: None,
            title: text.trim().to_string(),
        };
    };
    let authors = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
    let rest = caps.get(3).map(|m| m.as_str().trim()).unwrap_or_default();
    let title = rest.split(',').next().unwrap_or(rest).trim();
    Citation {
        authors_name: (!authors.is_empty()).then(|| authors.to_string()),
        year: caps.get(2).and_then(|m| m.as_str().parse().ok()),
        title: title.to_string(),
    }
}

#[derive(Debug, Clone, Default)]
struct ProjectInfo {
    url: Option<String>,
    description: Option<String>,
    license: Option<String>,
    submission_date: Option<String>,
    publications: Vec<RdfTerm>,
}

#[derive(Debug, Clone, Default)]
struct ProjectIndex {
    projects: Vec<ProjectInfo>,
    by_dataset: HashMap<RdfTerm, usize>,
}

impl ProjectIndex {
    fn build(store: &TripleStore) -> Self {
        let mut index = Self::default();
        for project in store.subjects_of_type(vocab::PROJECT) {
            let slot = index.projects.len();
            for dataset in store.objects(project, vocab::HAS_DATASET_OUTPUT) {
                index.by_dataset.insert(dataset.clone(), slot);
            }
            index.projects.push(ProjectInfo {
                url: owned(store.literal(project, vocab::HAS_PROJECT_URL)),
                description: owned(store.literal(project, vocab::HAS_DESCRIPTION)),
                license: owned(store.literal(project, vocab::HAS_LICENSE)),
                submission_date: owned(store.literal(project, vocab::HAS_SUBMISSION_DATE)),
                publications: store
                    .objects(project, vocab::HAS_PROJECT_PUBLICATIONS)
                    .filter(|term| !term.is_literal())
                    .cloned()
                    .collect(),
            });
        }
        index
    }

    fn project_of(&self, dataset: &RdfTerm) -> Option<&ProjectInfo> {
        self.by_dataset
            .get(dataset)
            .and_then(|slot| self.projects.get(*slot))
    }
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

pub struct SsbdTransformer<L: TermLookup = OfflineLookup> {
    store: TripleStore,
    projects: ProjectIndex,
    labels: LabelCache<L>,
    fallback_date: NaiveDate,
}

impl SsbdTransformer<OfflineLookup> {
    pub fn from_path(path: &Path) -> Result<Self, GideError> {
        if !path.exists() {
            return Err(GideError::InputNotFound(path.to_path_buf()));
        }
        Ok(Self::from_store(TripleStore::from_path(path)?))
    }

    pub fn from_store(store: TripleStore) -> Self {
        let projects = ProjectIndex::build(&store);
        debug!(
            triples = store.len(),
            projects = projects.projects.len(),
            "indexed SSBD projects"
        );
        Self {
            store,
            projects,
            labels: LabelCache::new(OfflineLookup),
            fallback_date: DefaultDates::default().ssbd,
        }
    }
}

impl<L: TermLookup> SsbdTransformer<L> {
    pub fn with_lookup<M: TermLookup>(self, lookup: M) -> SsbdTransformer<M> {
        SsbdTransformer {
            store: self.store,
            projects: self.projects,
            labels: LabelCache::new(lookup),
            fallback_date: self.fallback_date,
        }
    }

    pub fn with_fallback_date(mut self, date: NaiveDate) -> Self {
        self.fallback_date = date;
        self
    }

    pub fn dataset_nodes(&self) -> Vec<RdfTerm> {
        self.store
            .subjects_of_type(vocab::DATASET)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn transform_dataset(&mut self, dataset: &RdfTerm) -> UnifiedRecord {
        let store = &self.store;
        let local_id = dataset_id(dataset);
        let project = self.projects.project_of(dataset);

        let title = store
            .literal(dataset, vocab::HAS_DATASET_TITLE)
            .or_else(|| store.label(dataset))
            .map(str::to_string);
        let description = project.and_then(|project| project.description.clone());
        let license = project
            .and_then(|project| project.license.clone())
            .unwrap_or_else(|| DEFAULT_LICENSE.to_string());
        let source_url = project
            .and_then(|project| project.url.clone())
            .unwrap_or_else(|| Source::Ssbd.landing_url(&local_id));
        let release_date = dates::parse_or(
            project.and_then(|project| project.submission_date.as_deref()),
            self.fallback_date,
        );
        let publications = project
            .map(|project| {
                project
                    .publications
                    .iter()
                    .map(|paper| publication(store, paper))
                    .collect()
            })
            .unwrap_or_default();

        let biosample = match store.resource(dataset, vocab::HAS_BIOSAMPLE) {
            Some(node) => biosample(store, node),
            None => {
                debug!(dataset = dataset.as_str(), "dataset has no biosample node");
                BioSample::unknown()
            }
        };
        let protocol = match store.resource(dataset, vocab::HAS_IMAGING_INFO) {
            Some(node) => imaging_protocol(store, &mut self.labels, node),
            None => {
                debug!(dataset = dataset.as_str(), "dataset has no imaging node");
                ImageAcquisitionProtocol::unknown()
            }
        };

        RecordBuilder::new(Source::Ssbd, &local_id)
            .source_url(Some(source_url))
            .title(title)
            .description(description)
            .license(Some(license))
            .release_date(release_date)
            .biosample(biosample)
            .protocol(protocol)
            .publications(publications)
            .build()
    }
}

impl<L: TermLookup> Transformer for SsbdTransformer<L> {
    fn source_label(&self) -> &'static str {
        "ssbd"
    }

    fn transform_all(&mut self) -> Result<TransformOutcome, GideError> {
        let mut outcome = TransformOutcome::default();
        for dataset in self.dataset_nodes() {
            let record = self.transform_dataset(&dataset);
            outcome.records.push(record);
        }
        info!(records = outcome.records.len(), "SSBD transform finished");
        Ok(outcome)
    }
}

fn dataset_id(dataset: &RdfTerm) -> String {
    let iri = dataset.as_str();
    if iri.contains("ssbd-dataset-") {
        if let Some(segment) = identifiers::last_path_segment(iri) {
            return segment.to_string();
        }
    }
    iri.to_string()
}

fn biosample(store: &TripleStore, node: &RdfTerm) -> BioSample {
    let organism = store
        .resource(node, vocab::IS_ABOUT_ORGANISM)
        .map(|organism| {
            let taxon = identifiers::ncbi_taxon_id(organism.as_str());
            let name = store
                .label(organism)
                .map(str::to_string)
                .or_else(|| taxon.map(identifiers::ncbi_compact));
            match name {
                Some(name) => Organism {
                    ncbi_taxon_id: taxon,
                    ..Organism::named(name)
                },
                None => Organism::unknown(),
            }
        });

    let strain = store.resource(node, vocab::IS_ABOUT_STRAIN).and_then(|strain| {
        store
            .label(strain)
            .or_else(|| identifiers::last_path_segment(strain.as_str()))
            .map(str::to_string)
    });

    let mut biosample = BioSample::new(organism.into_iter().collect(), UNKNOWN_SAMPLE_TYPE);
    biosample.strain = strain;
    biosample
}

fn imaging_protocol<L: TermLookup>(
    store: &TripleStore,
    labels: &mut LabelCache<L>,
    node: &RdfTerm,
) -> ImageAcquisitionProtocol {
    let method = store
        .resource(node, vocab::HAS_IMAGING_TYPE)
        .map(|method| {
            let fbbi_id = identifiers::fbbi_id(method.as_str());
            let name = store
                .label(method)
                .map(str::to_string)
                .or_else(|| fbbi_id.as_deref().and_then(|id| labels.fbbi_label(id)))
                .or_else(|| fbbi_id.clone());
            match name {
                Some(name) => ImagingMethod {
                    fbbi_id,
                    ..ImagingMethod::named(name)
                },
                None => ImagingMethod::unknown(),
            }
        });

    let mut protocol = ImageAcquisitionProtocol::new(method.into_iter().collect());
    protocol.imaging_instrument_description = owned(store.literal(node, vocab::HAS_BODY));
    protocol
}

fn publication(store: &TripleStore, paper: &RdfTerm) -> Publication {
    let citation = store
        .literal(paper, vocab::HAS_PAPER_INFORMATION)
        .map(parse_citation);
    let (authors_name, year, title) = match citation {
        Some(citation) => (citation.authors_name, citation.year, Some(citation.title)),
        None => (None, None, None),
    };
    Publication {
        doi: owned(store.literal(paper, vocab::HAS_DOI)),
        pubmed_id: owned(store.literal(paper, vocab::HAS_PMID)),
        title,
        authors_name,
        year,
        ..Publication::default()
    }
}
