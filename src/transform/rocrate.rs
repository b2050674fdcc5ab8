use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::dates::{self, DefaultDates};
use crate::domain::{
    Author, BioSample, Funding, ImageAcquisitionProtocol, ImagingMethod, Organisation, Organism,
    Publication, Source, UNKNOWN, UnifiedRecord,
};
use crate::error::GideError;
use crate::graph::{Node, NodeGraph, reference_id};
use crate::identifiers;
use crate::normalize::{DedupVec, infer_sample_type, split_keywords};
use crate::record::RecordBuilder;
use crate::transform::{TransformOutcome, Transformer, find_inputs};

pub const METADATA_FILE: &str = "ro-crate-metadata.json";
pub const CRATE_PATTERNS: &[&str] = &["**/ro-crate-metadata.json"];

pub const SOURCE_PATTERNS: &[(Source, &[&str])] = &[
    (Source::Idr, &["idr", "image data resource", "openmicroscopy"]),
    (Source::Ssbd, &["ssbd", "riken"]),
    (Source::Bia, &["bia", "bioimage archive", "empiar", "ebi"]),
];

const BYTES_UNIT: &str = "http://purl.obolibrary.org/obo/UO_0000233";
const FILE_COUNT_UNIT: &str = "http://purl.obolibrary.org/obo/UO_0000189";

pub fn find_root<'a>(graph: &NodeGraph<'a>) -> Option<Node<'a>> {
    if let Some(root) = graph.get("./") {
        let types = root.types();
        if types.iter().any(|ty| *ty == "Dataset" || *ty == "bia:Study") {
            return Some(root);
        }
    }
    graph
        .get(METADATA_FILE)
        .and_then(|descriptor| graph.resolve(descriptor.get("about")))
}

pub fn accession_id(root: &Node<'_>) -> String {
    if let Some(accession) = root.first_text(&["accessionId", "identifier"]) {
        return accession;
    }
    root.str("url")
        .and_then(identifiers::last_path_segment)
        .unwrap_or("unknown")
        .to_string()
}

pub fn detect_source(root: &Node<'_>, graph: &NodeGraph<'_>) -> Source {
    if let Some(publisher) = graph.resolve(root.get("publisher")) {
        let name = publisher.str("name").or(publisher.id()).unwrap_or_default();
        let url = publisher.str("url").or(publisher.id()).unwrap_or_default();
        let text = format!("{name} {url}").to_lowercase();
        let matched = SOURCE_PATTERNS
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|pattern| text.contains(pattern)));
        if let Some((source, _)) = matched {
            return *source;
        }
    }

    let accession = accession_id(root).to_uppercase();
    if accession.starts_with("IDR") {
        Source::Idr
    } else if accession.starts_with("SSBD") {
        Source::Ssbd
    } else if accession.starts_with("S-BIAD") || accession.starts_with("EMPIAR") {
        Source::Bia
    } else {
        Source::External
    }
}

pub fn transform_document(
    document: &Value,
    origin: &str,
    fallback_date: NaiveDate,
) -> Result<UnifiedRecord, GideError> {
    let graph = NodeGraph::from_document(document);
    let root =
        find_root(&graph).ok_or_else(|| GideError::MissingRootDataset(origin.to_string()))?;

    let source = detect_source(&root, &graph);
    let accession = accession_id(&root);
    debug!(origin, %source, accession, nodes = graph.len(), "resolved crate root");

    let biosamples = BiosampleCollector::collect(&root, &graph);
    let protocols = ProtocolCollector::collect(&root, &graph);
    let (file_count, total_size_bytes) = file_stats(&root, &graph);

    let record = RecordBuilder::new(source, &accession)
        .source_url(root.str("url").map(str::to_string))
        .title(root.first_text(&["title", "name"]))
        .description(root.text("description"))
        .license(root.first_text(&["licence", "license"]))
        .release_date(dates::parse_or(
            root.text("datePublished").as_deref(),
            fallback_date,
        ))
        .biosamples(biosamples)
        .protocols(protocols)
        .authors(authors(&root, &graph))
        .publications(publications(&root, &graph))
        .funding(funding(&root, &graph))
        .keywords(keywords(&root))
        .study_type(
            root.strings("additionalType")
                .into_iter()
                .map(str::to_string)
                .collect(),
        )
        .data_doi(root.text("identifier").and_then(|id| identifiers::doi(&id)))
        .file_stats(file_count, total_size_bytes)
        .build();
    Ok(record)
}

pub fn transform_crate(path: &Path, fallback_date: NaiveDate) -> Result<UnifiedRecord, GideError> {
    let content = fs::read_to_string(path)
        .map_err(|err| GideError::Filesystem(format!("read {}: {err}", path.display())))?;
    let document: Value = serde_json::from_str(&content)
        .map_err(|err| GideError::InvalidJson(format!("{}: {err}", path.display())))?;
    transform_document(&document, &path.display().to_string(), fallback_date)
}

fn authors(root: &Node<'_>, graph: &NodeGraph<'_>) -> Vec<Author> {
    graph
        .resolve_many(root.first_refs(&["contributor", "author"]))
        .into_iter()
        .map(|person| Author {
            name: person
                .first_text(&["displayName", "name"])
                .unwrap_or_else(|| UNKNOWN.to_string()),
            orcid: orcid(&person),
            email: person.first_text(&["contactEmail", "email"]),
            affiliations: affiliations(&person, graph),
        })
        .collect()
}

fn orcid(person: &Node<'_>) -> Option<String> {
    if let Some(id) = person.id().filter(|id| id.contains("orcid.org")) {
        return Some(identifiers::normalize_orcid(id).unwrap_or_else(|| id.to_string()));
    }
    person
        .text("identifier")
        .filter(|identifier| identifier.to_lowercase().contains("orcid"))
        .map(|identifier| identifiers::normalize_orcid(&identifier).unwrap_or(identifier))
}

fn affiliations(person: &Node<'_>, graph: &NodeGraph<'_>) -> Vec<Organisation> {
    graph
        .resolve_many(person.first_refs(&["affiliation", "memberOf"]))
        .into_iter()
        .map(|org| Organisation {
            display_name: org
                .first_text(&["name", "displayName"])
                .unwrap_or_else(|| UNKNOWN.to_string()),
            rorid: org
                .text("identifier")
                .and_then(|identifier| identifiers::ror_id(&identifier))
                .or_else(|| org.id().and_then(identifiers::ror_id)),
            address: org.text("address"),
            website: org.first_text(&["url", "website"]),
            country: org.text("country"),
        })
        .collect()
}

#[derive(Default)]
struct BiosampleCollector {
    visited: bool,
    organisms: DedupVec<Organism>,
    description: Option<String>,
    sample_type: Option<String>,
    strain: Option<String>,
    cell_line: Option<String>,
}

impl BiosampleCollector {
    fn collect(root: &Node<'_>, graph: &NodeGraph<'_>) -> Vec<BioSample> {
        let mut biosamples = Vec::new();

        let mut profile = Self::default();
        for part in graph.resolve_many(root.refs("hasPart")) {
            for entity in graph.resolve_many(part.refs("associatedBiologicalEntity")) {
                profile.visit(&entity, graph);
            }
        }
        if profile.visited {
            biosamples.push(profile.finish());
        }

        for entity in graph.resolve_many(root.refs("about")) {
            if entity.has_type_containing("BioSample") {
                let mut sample = Self::default();
                sample.visit(&entity, graph);
                biosamples.push(sample.finish());
            }
        }
        biosamples
    }

    fn finish(self) -> BioSample {
        let sample_type = self
            .sample_type
            .unwrap_or_else(|| infer_sample_type(self.description.as_deref()).to_string());
        let mut biosample = BioSample::new(self.organisms.into_vec(), sample_type);
        biosample.biological_entity_description = self.description;
        biosample.strain = self.strain;
        biosample.cell_line = self.cell_line;
        biosample
    }

    fn visit(&mut self, sample: &Node<'_>, graph: &NodeGraph<'_>) {
        self.visited = true;
        for reference in sample.first_refs(&["organismClassification", "taxonomicRange"]) {
            if let Some(organism) = organism(reference, graph) {
                self.organisms.push(organism);
            }
        }
        if self.description.is_none() {
            self.description = sample.first_text(&["biologicalEntityDescription", "description"]);
        }
        if self.sample_type.is_none() {
            self.sample_type = sample.text("sampleType");
        }
        if self.strain.is_none() {
            self.strain = sample.text("strain");
        }
        if self.cell_line.is_none() {
            self.cell_line = sample.refs("hasCellLine").into_iter().find_map(|reference| {
                graph
                    .resolve(Some(reference))
                    .and_then(|line| line.text("name"))
                    .or_else(|| reference.as_str().map(str::to_string))
            });
        }
    }
}

fn organism(reference: &Value, graph: &NodeGraph<'_>) -> Option<Organism> {
    let Some(taxon) = graph.resolve(Some(reference)) else {
        let id = reference_id(reference)?;
        let taxon_id = identifiers::ncbi_taxon_id(id)?;
        debug!(reference = id, "organism reference has no node, using taxon id");
        return Some(Organism {
            ncbi_taxon_id: Some(taxon_id),
            ..Organism::named(identifiers::ncbi_compact(taxon_id))
        });
    };

    let taxon_id = taxon
        .id()
        .and_then(identifiers::ncbi_taxon_id)
        .or_else(|| {
            taxon
                .text("identifier")
                .and_then(|id| identifiers::ncbi_taxon_id(&id))
        });
    let name = taxon
        .first_text(&["scientificName", "name"])
        .or_else(|| taxon_id.map(identifiers::ncbi_compact))
        .unwrap_or_else(|| UNKNOWN.to_string());
    Some(Organism {
        scientific_name: name,
        common_name: taxon.first_text(&["commonName", "vernacularName"]),
        ncbi_taxon_id: taxon_id,
    })
}

#[derive(Default)]
struct ProtocolCollector {
    visited: bool,
    methods: DedupVec<ImagingMethod>,
    protocol_description: Option<String>,
    instrument_description: Option<String>,
}

impl ProtocolCollector {
    fn collect(root: &Node<'_>, graph: &NodeGraph<'_>) -> Vec<ImageAcquisitionProtocol> {
        let mut protocols = Vec::new();

        let mut profile = Self::default();
        for part in graph.resolve_many(root.refs("hasPart")) {
            for protocol in graph.resolve_many(part.refs("associatedImageAcquisitionProtocol")) {
                profile.bia_protocol(&protocol, "protocolDescription");
            }
        }
        for technique in graph.resolve_many(root.refs("measurementTechnique")) {
            if technique.get("imagingMethodName").is_some() || technique.get("fbbiId").is_some() {
                profile.bia_protocol(&technique, "description");
            } else {
                profile.defined_term(Some(&technique), None);
            }
        }
        if profile.visited {
            protocols.push(profile.finish());
        }

        for protocol in graph.resolve_many(root.refs("measurementMethod")) {
            let mut method = Self::default();
            method.describe(
                protocol.first_text(&["protocolDescription", "description"]),
                protocol.first_text(&["labEquipment", "imagingInstrumentDescription"]),
            );
            for reference in protocol.refs("measurementTechnique") {
                let term = graph.resolve(Some(reference));
                method.defined_term(term.as_ref(), reference_id(reference));
            }
            protocols.push(method.finish());
        }
        protocols
    }

    fn finish(self) -> ImageAcquisitionProtocol {
        let mut protocol = ImageAcquisitionProtocol::new(self.methods.into_vec());
        protocol.protocol_description = self.protocol_description;
        protocol.imaging_instrument_description = self.instrument_description;
        protocol
    }

    fn describe(&mut self, protocol: Option<String>, instrument: Option<String>) {
        if self.protocol_description.is_none() {
            self.protocol_description = protocol;
        }
        if self.instrument_description.is_none() {
            self.instrument_description = instrument;
        }
    }

    fn bia_protocol(&mut self, protocol: &Node<'_>, description_key: &str) {
        self.visited = true;
        let names = protocol.strings("imagingMethodName");
        let ids = protocol.strings("fbbiId");
        for (index, name) in names.iter().enumerate() {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            self.methods.push(ImagingMethod {
                fbbi_id: ids.get(index).and_then(|id| identifiers::fbbi_id(id)),
                ..ImagingMethod::named(name)
            });
        }
        self.describe(
            protocol.first_text(&["protocolDescription", description_key]),
            protocol.text("imagingInstrumentDescription"),
        );
    }

    fn defined_term(&mut self, term: Option<&Node<'_>>, reference: Option<&str>) {
        self.visited = true;
        let iri = term
            .and_then(|term| term.first_text(&["url", "@id"]))
            .or_else(|| reference.map(str::to_string));
        let fbbi_id = iri.as_deref().and_then(identifiers::fbbi_id);
        let Some(name) = term
            .and_then(|term| term.text("name"))
            .or_else(|| fbbi_id.clone())
        else {
            return;
        };
        self.methods.push(ImagingMethod {
            fbbi_id,
            ..ImagingMethod::named(name)
        });
    }
}

fn publications(root: &Node<'_>, graph: &NodeGraph<'_>) -> Vec<Publication> {
    graph
        .resolve_many(root.first_refs(&["citation", "relatedPublication"]))
        .into_iter()
        .map(|publication| Publication {
            doi: publication
                .first_text(&["doi", "identifier"])
                .and_then(|doi| identifiers::doi(&doi))
                .or_else(|| publication.id().and_then(identifiers::doi)),
            pubmed_id: publication.first_text(&["pubmed_id", "pmid"]),
            pmc_id: publication.first_text(&["pmc_id", "pmcid"]),
            title: publication.first_text(&["name", "title"]),
            authors_name: publication.text("authorNames"),
            year: publication
                .text("datePublished")
                .and_then(|date| dates::year_of(&date)),
        })
        .collect()
}

fn funding(root: &Node<'_>, graph: &NodeGraph<'_>) -> Vec<Funding> {
    graph
        .resolve_many(root.first_refs(&["funder", "grant"]))
        .into_iter()
        .map(|grant| Funding {
            funder: grant.text("name").unwrap_or_default(),
            grant_id: grant
                .text("identifier")
                .or_else(|| {
                    grant
                        .id()
                        .and_then(identifiers::last_path_segment)
                        .map(str::to_string)
                })
                .unwrap_or_default(),
        })
        .collect()
}

fn keywords(root: &Node<'_>) -> Vec<String> {
    let key = if root.get("keyword").is_some() {
        "keyword"
    } else {
        "keywords"
    };
    match root.get(key) {
        Some(Value::String(value)) => split_keywords(value),
        Some(Value::Array(_)) => root
            .strings(key)
            .into_iter()
            .map(str::trim)
            .filter(|keyword| !keyword.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn file_stats(root: &Node<'_>, graph: &NodeGraph<'_>) -> (Option<u64>, Option<u64>) {
    let mut file_count = None;
    let mut total_size = None;
    for quantity in graph.resolve_many(root.refs("size")) {
        let Some(value) = quantity.get("value").and_then(Value::as_u64) else {
            continue;
        };
        let unit_code = quantity.text("unitCode").unwrap_or_default();
        let unit_text = quantity.text("unitText").unwrap_or_default();
        if unit_code == BYTES_UNIT || unit_text == "bytes" {
            total_size = Some(value);
        } else if unit_code == FILE_COUNT_UNIT || unit_text == "file count" {
            file_count = Some(value);
        }
    }
    (file_count, total_size)
}

pub struct LinkedDataTransformer {
    root: PathBuf,
    fallback_date: NaiveDate,
}

impl LinkedDataTransformer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fallback_date: DefaultDates::default().linked_data,
        }
    }

    pub fn with_fallback_date(mut self, date: NaiveDate) -> Self {
        self.fallback_date = date;
        self
    }

    pub fn find_crates(&self) -> Result<Vec<PathBuf>, GideError> {
        find_inputs(&self.root, CRATE_PATTERNS)
    }
}

impl Transformer for LinkedDataTransformer {
    fn source_label(&self) -> &'static str {
        "rocrate"
    }

    fn transform_all(&mut self) -> Result<TransformOutcome, GideError> {
        let crates = self.find_crates()?;
        let mut outcome = TransformOutcome::default();
        for path in &crates {
            match transform_crate(path, self.fallback_date) {
                Ok(record) => outcome.records.push(record),
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "failed to transform crate");
                    outcome.fail(path.display().to_string(), &err);
                }
            }
        }
        info!(
            crates = crates.len(),
            records = outcome.records.len(),
            failed = outcome.failed.len(),
            "linked-data transform finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fallback() -> NaiveDate {
        DefaultDates::default().linked_data
    }

    #[test]
    fn root_falls_back_to_descriptor_about() {
        let doc = json!({"@graph": [
            {"@id": "ro-crate-metadata.json", "about": {"@id": "https://example.org/ds/42"}},
            {"@id": "https://example.org/ds/42", "@type": "Dataset", "name": "Elsewhere"}
        ]});
        let record = transform_document(&doc, "test", fallback()).unwrap();
        assert_eq!(record.title, "Elsewhere");
        assert_eq!(record.id.as_str(), "external:unknown");
        assert_eq!(record.source_url, "https://example.org/study/unknown");
        assert_eq!(record.release_date, fallback());
    }

    #[test]
    fn untyped_self_reference_is_not_a_root() {
        let doc = json!({"@graph": [{"@id": "./", "name": "no type"}]});
        let err = transform_document(&doc, "crate.json", fallback()).unwrap_err();
        assert!(matches!(err, GideError::MissingRootDataset(origin) if origin == "crate.json"));
    }

    #[test]
    fn publisher_pattern_beats_accession_prefix() {
        let doc = json!({"@graph": [
            {"@id": "./", "@type": "Dataset", "identifier": "S-BIAD9", "publisher": {"@id": "#pub"}},
            {"@id": "#pub", "name": "SSBD repository"}
        ]});
        let graph = NodeGraph::from_document(&doc);
        let root = find_root(&graph).unwrap();
        assert_eq!(detect_source(&root, &graph), Source::Ssbd);
    }

    #[test]
    fn accession_from_url_segment() {
        let doc = json!({"@graph": [
            {"@id": "./", "@type": "Dataset", "url": "https://idr.openmicroscopy.org/study/idr0099/"}
        ]});
        let graph = NodeGraph::from_document(&doc);
        let root = find_root(&graph).unwrap();
        assert_eq!(accession_id(&root), "idr0099");
        assert_eq!(detect_source(&root, &graph), Source::Idr);
    }

    #[test]
    fn keyword_string_is_split() {
        let doc = json!({"@graph": [
            {"@id": "./", "@type": "Dataset", "keywords": "mitosis, live imaging,"}
        ]});
        let record = transform_document(&doc, "test", fallback()).unwrap();
        assert_eq!(record.keywords, vec!["mitosis", "live imaging"]);
    }

    #[test]
    fn schema_org_shapes_are_read() {
        let doc = json!({"@graph": [
            {"@id": "./", "@type": "Dataset", "identifier": "10.5281/zenodo.1",
             "about": [{"@id": "#s1"}],
             "measurementMethod": [{"@id": "#p1"}],
             "size": [{"@id": "#bytes"}, {"@id": "#files"}]},
            {"@id": "#s1", "@type": "BioSample", "description": "zebrafish tissue",
             "taxonomicRange": [{"@id": "http://purl.obolibrary.org/obo/NCBITaxon_7955"}],
             "hasCellLine": [{"@id": "#line"}]},
            {"@id": "http://purl.obolibrary.org/obo/NCBITaxon_7955", "@type": "Taxon",
             "scientificName": "Danio rerio", "vernacularName": "zebrafish"},
            {"@id": "#line", "name": "AB strain fibroblasts"},
            {"@id": "#p1", "@type": "LabProtocol", "description": "Fixed and stained",
             "labEquipment": "Leica SP8",
             "measurementTechnique": [{"@id": "http://purl.obolibrary.org/obo/FBbi_00000251"}]},
            {"@id": "#bytes", "value": 2048, "unitText": "bytes"},
            {"@id": "#files", "value": 3, "unitCode": "http://purl.obolibrary.org/obo/UO_0000189"}
        ]});
        let record = transform_document(&doc, "test", fallback()).unwrap();

        let biosample = &record.biosamples[0];
        assert_eq!(biosample.organism[0].scientific_name, "Danio rerio");
        assert_eq!(biosample.organism[0].common_name.as_deref(), Some("zebrafish"));
        assert_eq!(biosample.organism[0].ncbi_taxon_id, Some(7955));
        assert_eq!(biosample.sample_type, "tissue");
        assert_eq!(biosample.cell_line.as_deref(), Some("AB strain fibroblasts"));

        let protocol = &record.image_acquisition_protocols[0];
        assert_eq!(protocol.methods[0].name, "FBbi:00000251");
        assert_eq!(protocol.methods[0].fbbi_id.as_deref(), Some("FBbi:00000251"));
        assert_eq!(protocol.protocol_description.as_deref(), Some("Fixed and stained"));
        assert_eq!(protocol.imaging_instrument_description.as_deref(), Some("Leica SP8"));

        assert_eq!(record.data_doi.as_deref(), Some("10.5281/zenodo.1"));
        assert_eq!(record.file_count, Some(3));
        assert_eq!(record.total_size_bytes, Some(2048));
    }

    #[test]
    fn dangling_taxon_reference_uses_compact_id() {
        let doc = json!({"@graph": [
            {"@id": "./", "@type": "Dataset", "about": {"@id": "#s"}},
            {"@id": "#s", "@type": ["BioSample"],
             "organismClassification": [{"@id": "NCBI:txid3055"}, {"@id": "NCBITaxon:3055"}, {"@id": "#nothing"}]}
        ]});
        let record = transform_document(&doc, "test", fallback()).unwrap();
        let organisms = &record.biosamples[0].organism;
        assert_eq!(organisms.len(), 1);
        assert_eq!(organisms[0].scientific_name, "NCBITaxon:3055");
        assert_eq!(organisms[0].ncbi_taxon_id, Some(3055));
    }

    #[test]
    fn non_doi_identifiers_are_not_dois() {
        let doc = json!({"@graph": [
            {"@id": "./", "@type": "Dataset", "identifier": "idr0001",
             "citation": [{"@id": "#c1"}, {"@id": "#c2"}]},
            {"@id": "#c1", "identifier": "PMC123", "name": "Only a title", "datePublished": "2021-02-03"},
            {"@id": "#c2", "doi": "10.1000/abc"}
        ]});
        let record = transform_document(&doc, "test", fallback()).unwrap();
        assert_eq!(record.data_doi, None);
        assert_eq!(record.publications[0].doi, None);
        assert_eq!(record.publications[0].year, Some(2021));
        assert_eq!(record.publications[1].doi.as_deref(), Some("10.1000/abc"));
    }
}
