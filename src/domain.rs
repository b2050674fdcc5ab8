use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::GideError;

pub const UNKNOWN: &str = "Unknown";
pub const UNKNOWN_SAMPLE_TYPE: &str = "unknown";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Source {
    Idr,
    Ssbd,
    Bia,
    External,
}

impl Source {
    pub fn prefix(&self) -> &'static str {
        match self {
            Source::Idr => "idr",
            Source::Ssbd => "ssbd",
            Source::Bia => "bia",
            Source::External => "external",
        }
    }

    pub fn landing_url(&self, accession: &str) -> String {
        match self {
            Source::Idr => format!("https://idr.openmicroscopy.org/study/{accession}/"),
            Source::Ssbd => format!("https://ssbd.riken.jp/repository/{accession}/"),
            Source::Bia if accession.starts_with("EMPIAR") => {
                format!("https://www.ebi.ac.uk/empiar/{accession}/")
            }
            Source::Bia => {
                format!("https://www.ebi.ac.uk/biostudies/bioimages/studies/{accession}")
            }
            Source::External => format!("https://example.org/study/{accession}"),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Idr => write!(f, "IDR"),
            Source::Ssbd => write!(f, "SSBD"),
            Source::Bia => write!(f, "BIA"),
            Source::External => write!(f, "EXTERNAL"),
        }
    }
}

impl FromStr for Source {
    type Err = GideError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "idr" => Ok(Source::Idr),
            "ssbd" => Ok(Source::Ssbd),
            "bia" => Ok(Source::Bia),
            "external" => Ok(Source::External),
            _ => Err(GideError::InvalidSource(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(source: Source, local_id: &str) -> Self {
        Self(format!("{}:{}", source.prefix(), local_id.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn local_id(&self) -> &str {
        self.0.split_once(':').map(|(_, rest)| rest).unwrap_or("")
    }

    pub fn source(&self) -> Option<Source> {
        self.0
            .split_once(':')
            .and_then(|(prefix, _)| prefix.parse().ok())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = GideError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (prefix, local) = value
            .trim()
            .split_once(':')
            .ok_or_else(|| GideError::InvalidRecordId(value.to_string()))?;
        let source: Source = prefix
            .parse()
            .map_err(|_| GideError::InvalidRecordId(value.to_string()))?;
        if local.trim().is_empty() {
            return Err(GideError::InvalidRecordId(value.to_string()));
        }
        Ok(Self::new(source, local))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organism {
    pub scientific_name: String,
    #[serde(default)]
    pub common_name: Option<String>,
    #[serde(default)]
    pub ncbi_taxon_id: Option<u32>,
}

impl Organism {
    pub fn named(scientific_name: impl Into<String>) -> Self {
        Self {
            scientific_name: scientific_name.into(),
            common_name: None,
            ncbi_taxon_id: None,
        }
    }

    pub fn unknown() -> Self {
        Self::named(UNKNOWN)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagingMethod {
    pub name: String,
    #[serde(default)]
    pub fbbi_id: Option<String>,
}

impl ImagingMethod {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fbbi_id: None,
        }
    }

    pub fn unknown() -> Self {
        Self::named(UNKNOWN)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organisation {
    pub display_name: String,
    #[serde(default)]
    pub rorid: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl Organisation {
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            rorid: None,
            address: None,
            website: None,
            country: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default)]
    pub orcid: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub affiliations: Vec<Organisation>,
}

impl Author {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            orcid: None,
            email: None,
            affiliations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub pubmed_id: Option<String>,
    #[serde(default)]
    pub pmc_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors_name: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl Publication {
    pub fn has_identity(&self) -> bool {
        [
            &self.doi,
            &self.pubmed_id,
            &self.pmc_id,
            &self.title,
            &self.authors_name,
        ]
        .iter()
        .any(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
            || self.year.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Funding {
    pub funder: String,
    pub grant_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BioSample {
    pub organism: Vec<Organism>,
    pub sample_type: String,
    #[serde(default)]
    pub biological_entity_description: Option<String>,
    #[serde(default)]
    pub strain: Option<String>,
    #[serde(default)]
    pub cell_line: Option<String>,
}

impl BioSample {
    pub fn new(organism: Vec<Organism>, sample_type: impl Into<String>) -> Self {
        Self {
            organism,
            sample_type: sample_type.into(),
            biological_entity_description: None,
            strain: None,
            cell_line: None,
        }
    }

    pub fn unknown() -> Self {
        Self::new(vec![Organism::unknown()], UNKNOWN_SAMPLE_TYPE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAcquisitionProtocol {
    pub methods: Vec<ImagingMethod>,
    #[serde(default)]
    pub protocol_description: Option<String>,
    #[serde(default)]
    pub imaging_instrument_description: Option<String>,
}

impl ImageAcquisitionProtocol {
    pub fn new(methods: Vec<ImagingMethod>) -> Self {
        Self {
            methods,
            protocol_description: None,
            imaging_instrument_description: None,
        }
    }

    pub fn unknown() -> Self {
        Self::new(vec![ImagingMethod::unknown()])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedRecord {
    pub id: RecordId,
    pub source: Source,
    pub source_url: String,
    pub title: String,
    pub description: String,
    pub license: String,
    pub release_date: NaiveDate,
    pub biosamples: Vec<BioSample>,
    pub image_acquisition_protocols: Vec<ImageAcquisitionProtocol>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub publications: Vec<Publication>,
    #[serde(default)]
    pub funding: Vec<Funding>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub study_type: Vec<String>,
    #[serde(default)]
    pub data_doi: Option<String>,
    #[serde(default)]
    pub file_count: Option<u64>,
    #[serde(default)]
    pub total_size_bytes: Option<u64>,
}
