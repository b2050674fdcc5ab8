use std::path::Path;

use chrono::NaiveDate;

use gide_search::crate_export::to_ro_crate;
use gide_search::domain::{
    Author, BioSample, Funding, ImageAcquisitionProtocol, ImagingMethod, Organisation, Organism,
    Publication, Source, UnifiedRecord,
};
use gide_search::record::RecordBuilder;
use gide_search::transform::Transformer;
use gide_search::transform::idr::IdrTransformer;
use gide_search::transform::rocrate::transform_document;

fn fallback() -> NaiveDate {
    NaiveDate::from_ymd_opt(1999, 9, 9).unwrap()
}

fn round_trip(record: &UnifiedRecord) -> UnifiedRecord {
    transform_document(&to_ro_crate(record), "export", fallback()).unwrap()
}

fn rich_record() -> UnifiedRecord {
    let mut biosample = BioSample::new(
        vec![
            Organism {
                common_name: Some("zebrafish".to_string()),
                ncbi_taxon_id: Some(7955),
                ..Organism::named("Danio rerio")
            },
            Organism::named("Unnamed symbiont"),
        ],
        "organism",
    );
    biosample.biological_entity_description = Some("Whole larvae at 5 dpf".to_string());
    biosample.strain = Some("AB".to_string());
    biosample.cell_line = Some("PAC2".to_string());

    let mut protocol = ImageAcquisitionProtocol::new(vec![
        ImagingMethod {
            fbbi_id: Some("FBbi:00000369".to_string()),
            ..ImagingMethod::named("light sheet fluorescence microscopy")
        },
        ImagingMethod::named("brightfield"),
    ]);
    protocol.protocol_description = Some("Embedded in agarose".to_string());
    protocol.imaging_instrument_description = Some("Zeiss Z.1".to_string());

    RecordBuilder::new(Source::Ssbd, "ssbd-dataset-007")
        .source_url(Some("https://ssbd.riken.jp/repository/7/".to_string()))
        .title(Some("Zebrafish development".to_string()))
        .description(Some("Time-lapse of larvae".to_string()))
        .license(Some("CC BY 4.0".to_string()))
        .release_date(NaiveDate::from_ymd_opt(2022, 3, 4).unwrap())
        .biosample(biosample)
        .protocol(protocol)
        .authors(vec![
            Author {
                orcid: Some("https://orcid.org/0000-0002-1825-0097".to_string()),
                email: Some("a@example.org".to_string()),
                affiliations: vec![Organisation {
                    rorid: Some("https://ror.org/01sjwvz98".to_string()),
                    website: Some("https://www.riken.jp".to_string()),
                    ..Organisation::named("RIKEN")
                }],
                ..Author::named("A. Researcher")
            },
            Author::named("B. Researcher"),
        ])
        .publications(vec![Publication {
            doi: Some("10.1000/xyz".to_string()),
            pubmed_id: Some("123".to_string()),
            title: Some("Growing fish".to_string()),
            authors_name: Some("A. Researcher, B. Researcher".to_string()),
            year: Some(2021),
            ..Publication::default()
        }])
        .funding(vec![Funding {
            funder: "JSPS".to_string(),
            grant_id: "KAKENHI-1".to_string(),
        }])
        .keywords(vec!["zebrafish".to_string(), "development".to_string()])
        .study_type(vec!["time-lapse".to_string()])
        .data_doi(Some("10.5281/zenodo.7".to_string()))
        .file_stats(Some(12), Some(4096))
        .build()
}

#[test]
fn export_reads_back_as_the_same_record() {
    let record = rich_record();
    assert_eq!(round_trip(&record), record);
}

#[test]
fn samples_sharing_a_taxon_stay_separate() {
    let human = |name: &str, common: Option<&str>| Organism {
        common_name: common.map(str::to_string),
        ncbi_taxon_id: Some(9606),
        ..Organism::named(name)
    };
    let confocal = |name: &str| ImagingMethod {
        fbbi_id: Some("FBbi:00000251".to_string()),
        ..ImagingMethod::named(name)
    };
    let record = RecordBuilder::new(Source::Bia, "S-BIAD77")
        .biosample(BioSample::new(vec![human("Homo sapiens", Some("human"))], "cell"))
        .biosample(BioSample::new(vec![human("Homo sapiens (HeLa donor)", None)], "cell"))
        .protocol(ImageAcquisitionProtocol::new(vec![confocal("confocal microscopy")]))
        .protocol(ImageAcquisitionProtocol::new(vec![confocal("laser scanning confocal")]))
        .build();

    let back = round_trip(&record);
    assert_eq!(back.biosamples, record.biosamples);
    assert_eq!(back.image_acquisition_protocols, record.image_acquisition_protocols);
}

#[test]
fn export_is_byte_identical_across_runs() {
    let record = rich_record();
    let first = serde_json::to_string(&to_ro_crate(&record)).unwrap();
    let second = serde_json::to_string(&to_ro_crate(&record)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn sentinel_record_survives_round_trip() {
    let record = RecordBuilder::new(Source::Bia, "S-BIAD42").build();
    let back = round_trip(&record);
    assert_eq!(back.id, record.id);
    assert_eq!(back.source, Source::Bia);
    assert_eq!(back.biosamples, record.biosamples);
    assert_eq!(back.image_acquisition_protocols, record.image_acquisition_protocols);
    assert_eq!(back.release_date, record.release_date);
}

#[test]
fn transformed_idr_study_round_trips() {
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let outcome = IdrTransformer::new(fixtures).transform_all().unwrap();
    let record = &outcome.records[0];

    let back = round_trip(record);
    assert_eq!(&back, record);
    assert_eq!(round_trip(&back), back);
}
