use std::collections::HashSet;

use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::domain::{
    Author, BioSample, Funding, ImageAcquisitionProtocol, Organisation, Organism, Publication,
    Source, UnifiedRecord,
};
use crate::identifiers;
use crate::transform::rocrate::METADATA_FILE;

const CRATE_CONTEXT: &str = "https://w3id.org/ro/crate/1.1/context";
const CRATE_PROFILE: &str = "https://w3id.org/ro/crate/1.1";
const BYTES_UNIT: &str = "http://purl.obolibrary.org/obo/UO_0000233";
const FILE_COUNT_UNIT: &str = "http://purl.obolibrary.org/obo/UO_0000189";

fn publisher(source: Source) -> Option<(&'static str, &'static str)> {
    match source {
        Source::Idr => Some(("https://idr.openmicroscopy.org/", "Image Data Resource")),
        Source::Ssbd => Some(("https://ssbd.riken.jp/", "SSBD")),
        Source::Bia => Some(("https://www.ebi.ac.uk/bioimage-archive/", "BioImage Archive")),
        Source::External => None,
    }
}

fn context() -> Value {
    json!([
        CRATE_CONTEXT,
        {
            "bia": "https://bioimage-archive.org/ro-crate/",
            "obo": "http://purl.obolibrary.org/obo/",
            "dwc": "http://rs.tdwg.org/dwc/terms/",
            "bao": "http://www.bioassayontology.org/bao#",
            "vernacularName": {"@id": "dwc:vernacularName"},
            "scientificName": {"@id": "dwc:scientificName"}
        }
    ])
}

pub fn to_ro_crate(record: &UnifiedRecord) -> Value {
    let mut graph = CrateGraph::new(record);
    let root = graph.root(record);
    let mut nodes = vec![descriptor(), Value::Object(root)];
    nodes.extend(graph.nodes);
    json!({"@context": context(), "@graph": nodes})
}

fn descriptor() -> Value {
    json!({
        "@id": METADATA_FILE,
        "@type": "CreativeWork",
        "conformsTo": {"@id": CRATE_PROFILE},
        "about": {"@id": "./"}
    })
}

fn reference(id: &str) -> Value {
    json!({"@id": id})
}

fn insert_some(node: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|value| !value.trim().is_empty()) {
        node.insert(key.to_string(), Value::String(value.to_string()));
    }
}

struct CrateGraph {
    record_id: String,
    nodes: Vec<Value>,
    seen: HashSet<String>,
}

impl CrateGraph {
    fn new(record: &UnifiedRecord) -> Self {
        Self {
            record_id: record.id.to_string(),
            nodes: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn local_id(&self, path: &str) -> String {
        let name = format!("{}/{path}", self.record_id);
        format!("#{}", Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()))
    }

    fn add(&mut self, id: String, mut node: Map<String, Value>) -> Value {
        if self.seen.insert(id.clone()) {
            node.insert("@id".to_string(), Value::String(id.clone()));
            self.nodes.push(Value::Object(node));
        }
        reference(&id)
    }

    fn root(&mut self, record: &UnifiedRecord) -> Map<String, Value> {
        let mut root = Map::new();
        root.insert("@id".to_string(), json!("./"));
        root.insert("@type".to_string(), json!("Dataset"));
        root.insert("accessionId".to_string(), json!(record.id.local_id()));
        insert_some(&mut root, "identifier", record.data_doi.as_deref());
        root.insert("name".to_string(), json!(record.title));
        root.insert("description".to_string(), json!(record.description));
        root.insert("url".to_string(), json!(record.source_url));
        root.insert("license".to_string(), json!(record.license));
        root.insert(
            "datePublished".to_string(),
            json!(record.release_date.format("%Y-%m-%d").to_string()),
        );
        if !record.keywords.is_empty() {
            root.insert("keywords".to_string(), json!(record.keywords));
        }
        if !record.study_type.is_empty() {
            root.insert("additionalType".to_string(), json!(record.study_type));
        }

        if let Some((id, name)) = publisher(record.source) {
            let mut node = Map::new();
            node.insert("@type".to_string(), json!("Organization"));
            node.insert("name".to_string(), json!(name));
            node.insert("url".to_string(), json!(id));
            let publisher = self.add(id.to_string(), node);
            root.insert("publisher".to_string(), publisher);
        }

        let authors: Vec<Value> = record
            .authors
            .iter()
            .enumerate()
            .map(|(index, author)| self.author(index, author))
            .collect();
        if !authors.is_empty() {
            root.insert("author".to_string(), Value::Array(authors));
        }

        let grants: Vec<Value> = record
            .funding
            .iter()
            .enumerate()
            .map(|(index, funding)| self.grant(index, funding))
            .collect();
        if !grants.is_empty() {
            root.insert("funder".to_string(), Value::Array(grants));
        }

        let citations: Vec<Value> = record
            .publications
            .iter()
            .enumerate()
            .map(|(index, publication)| self.citation(index, publication))
            .collect();
        if !citations.is_empty() {
            root.insert("citation".to_string(), Value::Array(citations));
        }

        let samples: Vec<Value> = record
            .biosamples
            .iter()
            .enumerate()
            .map(|(index, biosample)| self.biosample(index, biosample))
            .collect();
        root.insert("about".to_string(), Value::Array(samples));

        let protocols: Vec<Value> = record
            .image_acquisition_protocols
            .iter()
            .enumerate()
            .map(|(index, protocol)| self.protocol(index, protocol))
            .collect();
        root.insert("measurementMethod".to_string(), Value::Array(protocols));

        let mut sizes = Vec::new();
        if let Some(bytes) = record.total_size_bytes {
            sizes.push(self.quantity("bytes", bytes, BYTES_UNIT));
        }
        if let Some(count) = record.file_count {
            sizes.push(self.quantity("file count", count, FILE_COUNT_UNIT));
        }
        if !sizes.is_empty() {
            root.insert("size".to_string(), Value::Array(sizes));
        }

        root
    }

    fn author(&mut self, index: usize, author: &Author) -> Value {
        let affiliations: Vec<Value> = author
            .affiliations
            .iter()
            .enumerate()
            .map(|(position, organisation)| {
                self.organisation(&format!("author/{index}/affiliation/{position}"), organisation)
            })
            .collect();

        let mut node = Map::new();
        node.insert("@type".to_string(), json!("Person"));
        node.insert("name".to_string(), json!(author.name));
        insert_some(
            &mut node,
            "identifier",
            author
                .orcid
                .as_deref()
                .and_then(identifiers::normalize_orcid)
                .as_deref(),
        );
        insert_some(&mut node, "email", author.email.as_deref());
        if !affiliations.is_empty() {
            node.insert("affiliation".to_string(), Value::Array(affiliations));
        }
        let id = self.local_id(&format!("author/{index}"));
        self.add(id, node)
    }

    fn organisation(&mut self, path: &str, organisation: &Organisation) -> Value {
        let mut node = Map::new();
        node.insert("@type".to_string(), json!("Organization"));
        node.insert("name".to_string(), json!(organisation.display_name));
        insert_some(&mut node, "identifier", organisation.rorid.as_deref());
        insert_some(&mut node, "address", organisation.address.as_deref());
        insert_some(&mut node, "url", organisation.website.as_deref());
        insert_some(&mut node, "country", organisation.country.as_deref());
        let id = self.local_id(path);
        self.add(id, node)
    }

    fn grant(&mut self, index: usize, funding: &Funding) -> Value {
        let mut node = Map::new();
        node.insert("@type".to_string(), json!("Grant"));
        node.insert("name".to_string(), json!(funding.funder));
        node.insert("identifier".to_string(), json!(funding.grant_id));
        let id = self.local_id(&format!("grant/{index}"));
        self.add(id, node)
    }

    fn citation(&mut self, index: usize, publication: &Publication) -> Value {
        let mut node = Map::new();
        node.insert("@type".to_string(), json!("ScholarlyArticle"));
        insert_some(&mut node, "identifier", publication.doi.as_deref());
        insert_some(&mut node, "pmid", publication.pubmed_id.as_deref());
        insert_some(&mut node, "pmcid", publication.pmc_id.as_deref());
        insert_some(&mut node, "name", publication.title.as_deref());
        insert_some(&mut node, "authorNames", publication.authors_name.as_deref());
        if let Some(year) = publication.year {
            node.insert("datePublished".to_string(), json!(year.to_string()));
        }
        let id = self.local_id(&format!("citation/{index}"));
        self.add(id, node)
    }

    fn biosample(&mut self, index: usize, biosample: &BioSample) -> Value {
        let taxa: Vec<Value> = biosample
            .organism
            .iter()
            .enumerate()
            .map(|(position, organism)| {
                self.taxon(&format!("biosample/{index}/taxon/{position}"), organism)
            })
            .collect();

        let mut node = Map::new();
        node.insert("@type".to_string(), json!("BioSample"));
        node.insert("sampleType".to_string(), json!(biosample.sample_type));
        insert_some(
            &mut node,
            "description",
            biosample.biological_entity_description.as_deref(),
        );
        insert_some(&mut node, "strain", biosample.strain.as_deref());
        node.insert("taxonomicRange".to_string(), Value::Array(taxa));
        if let Some(cell_line) = biosample.cell_line.as_deref() {
            let mut line = Map::new();
            line.insert("@type".to_string(), json!("Thing"));
            line.insert("name".to_string(), json!(cell_line));
            let line_id = self.local_id(&format!("biosample/{index}/cell-line"));
            let line = self.add(line_id, line);
            node.insert("hasCellLine".to_string(), json!([line]));
        }
        let id = self.local_id(&format!("biosample/{index}"));
        self.add(id, node)
    }

    fn taxon(&mut self, path: &str, organism: &Organism) -> Value {
        let mut node = Map::new();
        node.insert("@type".to_string(), json!("Taxon"));
        node.insert("scientificName".to_string(), json!(organism.scientific_name));
        insert_some(&mut node, "vernacularName", organism.common_name.as_deref());
        if let Some(taxon_id) = organism.ncbi_taxon_id {
            node.insert("identifier".to_string(), json!(identifiers::ncbi_iri(taxon_id)));
        }
        let id = self.local_id(path);
        self.add(id, node)
    }

    fn protocol(&mut self, index: usize, protocol: &ImageAcquisitionProtocol) -> Value {
        let techniques: Vec<Value> = protocol
            .methods
            .iter()
            .enumerate()
            .map(|(position, method)| {
                let mut term = Map::new();
                term.insert("@type".to_string(), json!("DefinedTerm"));
                term.insert("name".to_string(), json!(method.name));
                if let Some(iri) = method.fbbi_id.as_deref().and_then(identifiers::fbbi_iri) {
                    term.insert("url".to_string(), json!(iri));
                }
                let id = self.local_id(&format!("protocol/{index}/method/{position}"));
                self.add(id, term)
            })
            .collect();

        let mut node = Map::new();
        node.insert("@type".to_string(), json!("LabProtocol"));
        insert_some(
            &mut node,
            "description",
            protocol.protocol_description.as_deref(),
        );
        insert_some(
            &mut node,
            "labEquipment",
            protocol.imaging_instrument_description.as_deref(),
        );
        node.insert("measurementTechnique".to_string(), Value::Array(techniques));
        let id = self.local_id(&format!("protocol/{index}"));
        self.add(id, node)
    }

    fn quantity(&mut self, unit_text: &str, value: u64, unit_code: &str) -> Value {
        let mut node = Map::new();
        node.insert("@type".to_string(), json!("QuantitativeValue"));
        node.insert("value".to_string(), json!(value));
        node.insert("unitCode".to_string(), json!(unit_code));
        node.insert("unitText".to_string(), json!(unit_text));
        let id = self.local_id(&format!("size/{unit_text}"));
        self.add(id, node)
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{ImagingMethod, Source};
    use crate::record::RecordBuilder;

    use super::*;

    fn graph_node<'a>(crate_json: &'a Value, id: &str) -> &'a Value {
        crate_json["@graph"]
            .as_array()
            .unwrap()
            .iter()
            .find(|node| node["@id"] == id)
            .unwrap()
    }

    #[test]
    fn descriptor_points_at_root() {
        let record = RecordBuilder::new(Source::Idr, "idr0001").build();
        let crate_json = to_ro_crate(&record);
        let descriptor = graph_node(&crate_json, METADATA_FILE);
        assert_eq!(descriptor["about"]["@id"], "./");
        assert_eq!(descriptor["conformsTo"]["@id"], CRATE_PROFILE);
        assert_eq!(crate_json["@context"][0], CRATE_CONTEXT);

        let root = graph_node(&crate_json, "./");
        assert_eq!(root["accessionId"], "idr0001");
        assert_eq!(root["publisher"]["@id"], "https://idr.openmicroscopy.org/");
    }

    #[test]
    fn external_records_have_no_publisher() {
        let record = RecordBuilder::new(Source::External, "zenodo-1").build();
        let crate_json = to_ro_crate(&record);
        assert!(graph_node(&crate_json, "./").get("publisher").is_none());
    }

    #[test]
    fn fbbi_methods_link_obo_iri() {
        let record = RecordBuilder::new(Source::Bia, "S-BIAD1")
            .protocol(ImageAcquisitionProtocol::new(vec![ImagingMethod {
                fbbi_id: Some("FBbi:00000251".to_string()),
                ..ImagingMethod::named("confocal microscopy")
            }]))
            .build();
        let crate_json = to_ro_crate(&record);
        let term = crate_json["@graph"]
            .as_array()
            .unwrap()
            .iter()
            .find(|node| node["@type"] == "DefinedTerm")
            .unwrap();
        assert_eq!(term["name"], "confocal microscopy");
        assert_eq!(term["url"], "http://purl.obolibrary.org/obo/FBbi_00000251");
        assert!(term["@id"].as_str().unwrap().starts_with('#'));
    }

    #[test]
    fn export_is_deterministic() {
        let record = RecordBuilder::new(Source::Ssbd, "ssbd-dataset-001")
            .authors(vec![Author::named("A. Person"), Author::named("B. Person")])
            .build();
        assert_eq!(to_ro_crate(&record), to_ro_crate(&record));
    }
}
