use std::sync::LazyLock;

use regex::Regex;

const OBO_BASE: &str = "http://purl.obolibrary.org/obo/";

static NCBI_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)NCBITaxon_(\d+)",
        r"(?i)NCBI:txid(\d+)",
        r"(?i)NCBITaxon:(\d+)",
        r"(?i)ncbitaxon/(\d+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid NCBI taxon pattern"))
    .collect()
});

static FBBI_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)FBbi[_:](\d+)").expect("valid FBbi pattern"));

static ORCID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://orcid\.org/)?(\d{4}-\d{4}-\d{4}-\d{3}[\dX])/?$")
        .expect("valid ORCID pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ontology {
    NcbiTaxon,
    Fbbi,
}

pub fn extract(ontology: Ontology, value: &str) -> Option<String> {
    match ontology {
        Ontology::NcbiTaxon => ncbi_taxon_id(value).map(ncbi_compact),
        Ontology::Fbbi => fbbi_id(value),
    }
}

pub fn ncbi_taxon_id(value: &str) -> Option<u32> {
    NCBI_PATTERNS.iter().find_map(|regex| {
        regex
            .captures(value)
            .and_then(|caps| caps.get(1))
            .and_then(|digits| digits.as_str().parse().ok())
    })
}

pub fn ncbi_compact(taxon_id: u32) -> String {
    format!("NCBITaxon:{taxon_id}")
}

pub fn ncbi_iri(taxon_id: u32) -> String {
    format!("{OBO_BASE}NCBITaxon_{taxon_id}")
}

pub fn fbbi_id(value: &str) -> Option<String> {
    FBBI_PATTERN
        .captures(value)
        .and_then(|caps| caps.get(1))
        .map(|digits| format!("FBbi:{}", digits.as_str()))
}

pub fn fbbi_iri(compact: &str) -> Option<String> {
    fbbi_id(compact).map(|id| format!("{OBO_BASE}{}", id.replacen(':', "_", 1)))
}

pub fn normalize_orcid(value: &str) -> Option<String> {
    ORCID_PATTERN
        .captures(value.trim())
        .and_then(|caps| caps.get(1))
        .map(|id| format!("https://orcid.org/{}", id.as_str()))
}

pub fn ror_id(value: &str) -> Option<String> {
    let trimmed = value.trim();
    trimmed.contains("ror.org").then(|| trimmed.to_string())
}

pub fn doi(value: &str) -> Option<String> {
    let trimmed = value.trim();
    trimmed.starts_with("10.").then(|| trimmed.to_string())
}

pub fn last_path_segment(value: &str) -> Option<&str> {
    value
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
}
