use assert_matches::assert_matches;
use chrono::NaiveDate;

use gide_search::domain::{Organism, RecordId, Source, UnifiedRecord};
use gide_search::error::GideError;
use gide_search::identifiers::{self, Ontology};
use gide_search::normalize::DedupVec;
use gide_search::record::RecordBuilder;

#[test]
fn parse_source_case_insensitive() {
    assert_eq!("IDR".parse::<Source>().unwrap(), Source::Idr);
    assert_eq!(" bia ".parse::<Source>().unwrap(), Source::Bia);
    let err = "zenodo".parse::<Source>().unwrap_err();
    assert_matches!(err, GideError::InvalidSource(_));
}

#[test]
fn parse_record_id_normalizes_prefix() {
    let id: RecordId = "SSBD:ssbd-dataset-12".parse().unwrap();
    assert_eq!(id.as_str(), "ssbd:ssbd-dataset-12");
    assert_eq!(id.source(), Some(Source::Ssbd));
}

#[test]
fn parse_record_id_invalid() {
    for value in ["idr0001", "idr:", "idr:   ", ":idr0001"] {
        let err = value.parse::<RecordId>().unwrap_err();
        assert_matches!(err, GideError::InvalidRecordId(_));
    }
}

#[test]
fn record_json_uses_snake_case_fields() {
    let record = RecordBuilder::new(Source::Bia, "S-BIAD7")
        .release_date(NaiveDate::from_ymd_opt(2021, 7, 1).unwrap())
        .build();
    let json = serde_json::to_value(&record).unwrap();

    assert_eq!(json["id"], "bia:S-BIAD7");
    assert_eq!(json["source"], "BIA");
    assert_eq!(json["release_date"], "2021-07-01");
    assert_eq!(json["biosamples"][0]["organism"][0]["scientific_name"], "Unknown");
    assert_eq!(json["image_acquisition_protocols"][0]["methods"][0]["name"], "Unknown");

    let back: UnifiedRecord = serde_json::from_value(json).unwrap();
    assert_eq!(back, record);
}

#[test]
fn identifiers_normalize_every_spelling() {
    for value in [
        "http://purl.obolibrary.org/obo/NCBITaxon_9606",
        "NCBI:txid9606",
        "NCBITaxon:9606",
    ] {
        assert_eq!(identifiers::ncbi_taxon_id(value), Some(9606), "{value}");
    }
    for value in [
        "http://purl.obolibrary.org/obo/FBbi_00000251",
        "obo:FBbi_00000251",
        "FBbi:00000251",
    ] {
        assert_eq!(
            identifiers::extract(Ontology::Fbbi, value).as_deref(),
            Some("FBbi:00000251"),
            "{value}"
        );
    }
    assert_eq!(identifiers::extract(Ontology::NcbiTaxon, "txid"), None);
}

#[test]
fn dedup_keeps_first_seen_organism() {
    let mut organisms = DedupVec::new();
    assert!(organisms.push(Organism {
        ncbi_taxon_id: Some(10090),
        ..Organism::named("Mus musculus")
    }));
    assert!(organisms.push(Organism::named("Homo sapiens")));
    assert!(!organisms.push(Organism::named("Mus musculus")));

    let organisms = organisms.into_vec();
    assert_eq!(organisms.len(), 2);
    assert_eq!(organisms[0].ncbi_taxon_id, Some(10090));
}
