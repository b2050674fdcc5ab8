use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{info, warn};

use crate::dates::{self, DefaultDates};
use crate::domain::{
    Author, BioSample, ImageAcquisitionProtocol, ImagingMethod, Organism, Publication, Source,
    UnifiedRecord,
};
use crate::error::GideError;
use crate::identifiers;
use crate::normalize::{DedupVec, infer_sample_type, non_empty, split_keywords};
use crate::record::RecordBuilder;
use crate::transform::{TransformOutcome, Transformer, find_inputs};

pub const STUDY_FILE_PATTERNS: &[&str] = &["idr*/*-study.txt", "*-study.txt"];

static ACCESSION_IN_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"idr\d+").expect("valid IDR accession pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Single(String),
    Multi(Vec<String>),
}

impl FieldValue {
    pub fn first(&self) -> &str {
        match self {
            FieldValue::Single(value) => value,
            FieldValue::Multi(values) => values.first().map(String::as_str).unwrap_or(""),
        }
    }

    pub fn values(&self) -> &[String] {
        match self {
            FieldValue::Single(value) => std::slice::from_ref(value),
            FieldValue::Multi(values) => values,
        }
    }

    fn extend(&mut self, more: Vec<String>) {
        let mut values = match std::mem::replace(self, FieldValue::Multi(Vec::new())) {
            FieldValue::Single(value) => vec![value],
            FieldValue::Multi(values) => values,
        };
        values.extend(more);
        *self = FieldValue::Multi(values);
    }
}

#[derive(Debug, Clone, Default)]
pub struct StudyFields {
    fields: HashMap<String, FieldValue>,
}

impl StudyFields {
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key)
            .map(FieldValue::first)
            .filter(|value| !value.is_empty())
    }

    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.first(key))
    }

    pub fn values(&self, key: &str) -> &[String] {
        self.get(key).map(FieldValue::values).unwrap_or_default()
    }

    pub fn values_of(&self, keys: &[&str]) -> &[String] {
        keys.iter()
            .map(|key| self.values(key))
            .find(|values| !values.is_empty())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    fn insert(&mut self, key: String, mut values: Vec<String>) {
        if let Some(existing) = self.fields.get_mut(&key) {
            existing.extend(values);
            return;
        }
        let value = if values.len() == 1 {
            FieldValue::Single(values.remove(0))
        } else {
            FieldValue::Multi(values)
        };
        self.fields.insert(key, value);
    }
}

pub fn parse_study_file(path: &Path) -> Result<StudyFields, GideError> {
    let file = File::open(path)
        .map_err(|err| GideError::Filesystem(format!("open {}: {err}", path.display())))?;
    parse_study(BufReader::new(file))
}

pub fn parse_study<R: Read>(reader: R) -> Result<StudyFields, GideError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut fields = StudyFields::default();
    for row in reader.records() {
        let row = row.map_err(|err| GideError::InvalidFlatFile(err.to_string()))?;
        let Some(raw_key) = row.get(0) else {
            continue;
        };
        if raw_key.trim().trim_matches('"').trim_start().starts_with('#') {
            continue;
        }
        let key = raw_key.trim();
        if key.is_empty() {
            continue;
        }
        let values: Vec<String> = row
            .iter()
            .skip(1)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect();
        if values.is_empty() {
            continue;
        }
        fields.insert(key.to_string(), values);
    }
    Ok(fields)
}

fn accession_for(fields: &StudyFields, path: &Path) -> String {
    if let Some(accession) = fields.first("Comment[IDR Study Accession]") {
        return accession.to_string();
    }
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    if let Some(found) = ACCESSION_IN_NAME.find(&name) {
        return found.as_str().to_string();
    }
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or(name)
}

fn organisms(fields: &StudyFields) -> Vec<Organism> {
    let names = fields.values("Study Organism");
    let accessions = fields.values("Study Organism Term Accession");
    let mut organisms = DedupVec::new();
    for (index, name) in names.iter().enumerate() {
        organisms.push(Organism {
            ncbi_taxon_id: accessions
                .get(index)
                .and_then(|accession| identifiers::ncbi_taxon_id(accession)),
            ..Organism::named(name.as_str())
        });
    }
    organisms.into_vec()
}

fn imaging_methods(fields: &StudyFields) -> Vec<ImagingMethod> {
    let names = fields.values_of(&["Screen Imaging Method", "Experiment Imaging Method"]);
    let accessions = fields.values_of(&[
        "Screen Imaging Method Term Accession",
        "Experiment Imaging Method Term Accession",
    ]);
    let mut methods = DedupVec::new();
    for (index, name) in names.iter().enumerate() {
        methods.push(ImagingMethod {
            fbbi_id: accessions
                .get(index)
                .and_then(|accession| identifiers::fbbi_id(accession)),
            ..ImagingMethod::named(name.as_str())
        });
    }
    methods.into_vec()
}

fn authors(fields: &StudyFields) -> Vec<Author> {
    fields
        .first("Study Author List")
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(Author::named)
                .collect()
        })
        .unwrap_or_default()
}

fn publications(fields: &StudyFields) -> Vec<Publication> {
    let pubmed = fields.values("Study PubMed ID");
    let dois = fields.values("Study DOI");
    let titles = fields.values("Study Publication Title");
    let pmc = fields.values("Study PMC ID");
    let count = [pubmed.len(), dois.len(), titles.len(), pmc.len()]
        .into_iter()
        .max()
        .unwrap_or(0);

    (0..count)
        .map(|index| Publication {
            pubmed_id: pubmed.get(index).cloned(),
            doi: dois.get(index).cloned(),
            title: titles.get(index).cloned(),
            pmc_id: pmc.get(index).cloned(),
            ..Publication::default()
        })
        .filter(|publication| {
            publication.pubmed_id.is_some()
                || publication.doi.is_some()
                || publication.title.is_some()
                || publication.pmc_id.is_some()
        })
        .collect()
}

pub fn transform_study(
    path: &Path,
    fallback_date: NaiveDate,
) -> Result<Option<UnifiedRecord>, GideError> {
    let fields = parse_study_file(path)?;
    Ok(record_from_fields(&fields, path, fallback_date))
}

pub fn record_from_fields(
    fields: &StudyFields,
    path: &Path,
    fallback_date: NaiveDate,
) -> Option<UnifiedRecord> {
    if fields.is_empty() {
        return None;
    }

    let accession = accession_for(fields, path);
    let title = non_empty(fields.first("Study Title"));
    let description = non_empty(fields.first("Study Description"));
    let sample_type = fields
        .first_of(&["Screen Sample Type", "Experiment Sample Type"])
        .map(str::to_string)
        .unwrap_or_else(|| infer_sample_type(description.as_deref()).to_string());

    let mut protocol = ImageAcquisitionProtocol::new(imaging_methods(fields));
    protocol.imaging_instrument_description =
        non_empty(fields.first_of(&["Screen Imaging Instrument", "Experiment Imaging Instrument"]));

    let keywords = fields
        .values("Study Key Words")
        .iter()
        .flat_map(|value| split_keywords(value))
        .collect();

    let record = RecordBuilder::new(Source::Idr, &accession)
        .source_url(Some(format!(
            "https://idr.openmicroscopy.org/search/?query=Name:{accession}"
        )))
        .title(title)
        .description(description)
        .license(non_empty(fields.first("Study License")))
        .release_date(dates::parse_or(
            fields.first("Study Public Release Date"),
            fallback_date,
        ))
        .biosample(BioSample::new(organisms(fields), sample_type))
        .protocol(protocol)
        .authors(authors(fields))
        .publications(publications(fields))
        .keywords(keywords)
        .study_type(fields.values("Study Type").to_vec())
        .data_doi(non_empty(fields.first("Data DOI")))
        .build();
    Some(record)
}

pub struct IdrTransformer {
    root: PathBuf,
    fallback_date: NaiveDate,
}

impl IdrTransformer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fallback_date: DefaultDates::default().idr,
        }
    }

    pub fn with_fallback_date(mut self, date: NaiveDate) -> Self {
        self.fallback_date = date;
        self
    }

    pub fn find_study_files(&self) -> Result<Vec<PathBuf>, GideError> {
        find_inputs(&self.root, STUDY_FILE_PATTERNS)
    }
}

impl Transformer for IdrTransformer {
    fn source_label(&self) -> &'static str {
        "idr"
    }

    fn transform_all(&mut self) -> Result<TransformOutcome, GideError> {
        let files = self.find_study_files()?;
        let mut outcome = TransformOutcome::default();
        for file in &files {
            match transform_study(file, self.fallback_date) {
                Ok(Some(record)) => outcome.records.push(record),
                Ok(None) => {
                    warn!(file = %file.display(), "study file has no content, skipping");
                    outcome.skipped += 1;
                }
                Err(err) => {
                    warn!(file = %file.display(), error = %err, "failed to read study file");
                    outcome.fail(file.display().to_string(), &err);
                }
            }
        }
        info!(
            files = files.len(),
            records = outcome.records.len(),
            skipped = outcome.skipped,
            "IDR transform finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STUDY: &str = "\"# Comment line to skip\"
\"Comment[IDR Study Accession]\"\t\"idr0001\"
\"Study Title\"\t\"Test Study: Investigation of Cell Division\"
\"Study PubMed ID\"\t\"31234567\"\t\"29876543\"
\"Study DOI\"\t\"10.1000/test.study\"
\"\"\t\"orphan value\"
\"Study Type\"\t\"\"
\"Study Key Words\"\t\"yeast, mitosis\"\t\"cell cycle\"
";

    fn fallback() -> NaiveDate {
        NaiveDate::from_ymd_opt(2016, 1, 1).unwrap()
    }

    #[test]
    fn parses_single_and_multi_values() {
        let fields = parse_study(STUDY.as_bytes()).unwrap();
        assert_eq!(
            fields.get("Comment[IDR Study Accession]"),
            Some(&FieldValue::Single("idr0001".to_string()))
        );
        assert_eq!(fields.values("Study PubMed ID"), ["31234567", "29876543"]);
        assert!(fields.get("# Comment line to skip").is_none());
        assert!(fields.get("Study Type").is_none());
        assert_eq!(fields.len(), 5);
    }

    #[test]
    fn repeated_keys_accumulate() {
        let fields = parse_study("Study DOI\t10.1/a\nStudy DOI\t10.1/b\n".as_bytes()).unwrap();
        assert_eq!(
            fields.get("Study DOI"),
            Some(&FieldValue::Multi(vec!["10.1/a".to_string(), "10.1/b".to_string()]))
        );
    }

    #[test]
    fn publications_zip_by_index() {
        let fields = parse_study(STUDY.as_bytes()).unwrap();
        let publications = publications(&fields);
        assert_eq!(publications.len(), 2);
        assert_eq!(publications[0].doi.as_deref(), Some("10.1000/test.study"));
        assert_eq!(publications[1].pubmed_id.as_deref(), Some("29876543"));
        assert_eq!(publications[1].doi, None);
    }

    #[test]
    fn accession_falls_back_to_file_name() {
        let fields = parse_study("Study Title\tUntitled\n".as_bytes()).unwrap();
        let record =
            record_from_fields(&fields, Path::new("idr0042-experimentA-study.txt"), fallback())
                .unwrap();
        assert_eq!(record.id.as_str(), "idr:idr0042");

        let record = record_from_fields(&fields, Path::new("custom-study.txt"), fallback()).unwrap();
        assert_eq!(record.id.as_str(), "idr:custom-study");
    }

    #[test]
    fn keywords_are_split() {
        let fields = parse_study(STUDY.as_bytes()).unwrap();
        let record = record_from_fields(&fields, Path::new("x"), fallback()).unwrap();
        assert_eq!(record.keywords, vec!["yeast", "mitosis", "cell cycle"]);
    }

    #[test]
    fn comment_only_file_is_none() {
        let fields = parse_study("# header\n\"# quoted\"\n\n".as_bytes()).unwrap();
        assert!(record_from_fields(&fields, Path::new("idr0001-study.txt"), fallback()).is_none());
    }
}
