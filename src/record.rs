use chrono::NaiveDate;

use crate::dates::DefaultDates;
use crate::domain::{
    Author, BioSample, Funding, ImageAcquisitionProtocol, ImagingMethod, Organism, Publication,
    RecordId, Source, UNKNOWN, UnifiedRecord,
};
use crate::normalize::non_empty;

#[derive(Debug, Clone)]
pub struct RecordBuilder {
    source: Source,
    local_id: String,
    source_url: Option<String>,
    title: Option<String>,
    description: Option<String>,
    license: Option<String>,
    release_date: Option<NaiveDate>,
    biosamples: Vec<BioSample>,
    protocols: Vec<ImageAcquisitionProtocol>,
    authors: Vec<Author>,
    publications: Vec<Publication>,
    funding: Vec<Funding>,
    keywords: Vec<String>,
    study_type: Vec<String>,
    data_doi: Option<String>,
    file_count: Option<u64>,
    total_size_bytes: Option<u64>,
}

impl RecordBuilder {
    pub fn new(source: Source, local_id: impl Into<String>) -> Self {
        Self {
            source,
            local_id: local_id.into(),
            source_url: None,
            title: None,
            description: None,
            license: None,
            release_date: None,
            biosamples: Vec::new(),
            protocols: Vec::new(),
            authors: Vec::new(),
            publications: Vec::new(),
            funding: Vec::new(),
            keywords: Vec::new(),
            study_type: Vec::new(),
            data_doi: None,
            file_count: None,
            total_size_bytes: None,
        }
    }

    pub fn source_url(mut self, url: Option<String>) -> Self {
        self.source_url = url;
        self
    }

    pub fn title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn license(mut self, license: Option<String>) -> Self {
        self.license = license;
        self
    }

    pub fn release_date(mut self, date: NaiveDate) -> Self {
        self.release_date = Some(date);
        self
    }

    pub fn biosample(mut self, biosample: BioSample) -> Self {
        self.biosamples.push(biosample);
        self
    }

    pub fn biosamples(mut self, biosamples: Vec<BioSample>) -> Self {
        self.biosamples.extend(biosamples);
        self
    }

    pub fn protocol(mut self, protocol: ImageAcquisitionProtocol) -> Self {
        self.protocols.push(protocol);
        self
    }

    pub fn protocols(mut self, protocols: Vec<ImageAcquisitionProtocol>) -> Self {
        self.protocols.extend(protocols);
        self
    }

    pub fn authors(mut self, authors: Vec<Author>) -> Self {
        self.authors = authors;
        self
    }

    pub fn publications(mut self, publications: Vec<Publication>) -> Self {
        self.publications = publications;
        self
    }

    pub fn funding(mut self, funding: Vec<Funding>) -> Self {
        self.funding = funding;
        self
    }

    pub fn keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn study_type(mut self, study_type: Vec<String>) -> Self {
        self.study_type = study_type;
        self
    }

    pub fn data_doi(mut self, doi: Option<String>) -> Self {
        self.data_doi = doi;
        self
    }

    pub fn file_stats(mut self, file_count: Option<u64>, total_size_bytes: Option<u64>) -> Self {
        self.file_count = file_count;
        self.total_size_bytes = total_size_bytes;
        self
    }

    pub fn build(self) -> UnifiedRecord {
        let local_id = self.local_id.trim().to_string();
        let title = non_empty(self.title.as_deref()).unwrap_or_else(|| local_id.clone());
        let description = non_empty(self.description.as_deref()).unwrap_or_else(|| title.clone());
        let license = non_empty(self.license.as_deref()).unwrap_or_else(|| UNKNOWN.to_string());
        let source_url = non_empty(self.source_url.as_deref())
            .unwrap_or_else(|| self.source.landing_url(&local_id));
        let release_date = self
            .release_date
            .unwrap_or_else(|| DefaultDates::default().for_source(self.source));

        let mut biosamples: Vec<BioSample> = self
            .biosamples
            .into_iter()
            .map(|mut biosample| {
                if biosample.organism.is_empty() {
                    biosample.organism.push(Organism::unknown());
                }
                if biosample.sample_type.trim().is_empty() {
                    biosample.sample_type = BioSample::unknown().sample_type;
                }
                biosample
            })
            .collect();
        if biosamples.is_empty() {
            biosamples.push(BioSample::unknown());
        }

        let mut protocols: Vec<ImageAcquisitionProtocol> = self
            .protocols
            .into_iter()
            .map(|mut protocol| {
                if protocol.methods.is_empty() {
                    protocol.methods.push(ImagingMethod::unknown());
                }
                protocol
            })
            .collect();
        if protocols.is_empty() {
            protocols.push(ImageAcquisitionProtocol::unknown());
        }

        let publications = self
            .publications
            .into_iter()
            .filter(Publication::has_identity)
            .collect();
        let funding = self
            .funding
            .into_iter()
            .filter(|entry| !entry.funder.trim().is_empty() && !entry.grant_id.trim().is_empty())
            .collect();
        let keywords = self
            .keywords
            .into_iter()
            .filter_map(|keyword| non_empty(Some(&keyword)))
            .collect();

        UnifiedRecord {
            id: RecordId::new(self.source, &local_id),
            source: self.source,
            source_url,
            title,
            description,
            license,
            release_date,
            biosamples,
            image_acquisition_protocols: protocols,
            authors: self.authors,
            publications,
            funding,
            keywords,
            study_type: self.study_type,
            data_doi: non_empty(self.data_doi.as_deref()),
            file_count: self.file_count,
            total_size_bytes: self.total_size_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_record_gets_sentinels() {
        let record = RecordBuilder::new(Source::Ssbd, "ssbd-dataset-001").build();

        assert_eq!(record.id.as_str(), "ssbd:ssbd-dataset-001");
        assert_eq!(record.title, "ssbd-dataset-001");
        assert_eq!(record.description, record.title);
        assert_eq!(record.license, "Unknown");
        assert_eq!(
            record.source_url,
            "https://ssbd.riken.jp/repository/ssbd-dataset-001/"
        );
        assert_eq!(record.release_date, NaiveDate::from_ymd_opt(2025, 5, 12).unwrap());
        assert_eq!(record.biosamples, vec![BioSample::unknown()]);
        assert_eq!(
            record.image_acquisition_protocols,
            vec![ImageAcquisitionProtocol::unknown()]
        );
    }

    #[test]
    fn empty_nested_sequences_are_filled() {
        let record = RecordBuilder::new(Source::Bia, "S-BIAD1")
            .biosample(BioSample::new(Vec::new(), ""))
            .protocol(ImageAcquisitionProtocol::new(Vec::new()))
            .build();

        assert_eq!(record.biosamples[0].organism, vec![Organism::unknown()]);
        assert_eq!(record.biosamples[0].sample_type, "unknown");
        assert_eq!(
            record.image_acquisition_protocols[0].methods,
            vec![ImagingMethod::unknown()]
        );
    }

    #[test]
    fn description_defaults_to_title() {
        let record = RecordBuilder::new(Source::Idr, "idr0001")
            .title(Some("Cell division".to_string()))
            .description(Some("   ".to_string()))
            .build();
        assert_eq!(record.description, "Cell division");
    }

    #[test]
    fn anonymous_publications_and_partial_funding_are_dropped() {
        let record = RecordBuilder::new(Source::Bia, "S-BIAD1")
            .publications(vec![
                Publication::default(),
                Publication {
                    doi: Some("10.1234/x".to_string()),
                    ..Publication::default()
                },
            ])
            .funding(vec![
                Funding {
                    funder: "Wellcome".to_string(),
                    grant_id: String::new(),
                },
                Funding {
                    funder: "NSF".to_string(),
                    grant_id: "GRANT-001".to_string(),
                },
            ])
            .build();

        assert_eq!(record.publications.len(), 1);
        assert_eq!(record.funding.len(), 1);
        assert_eq!(record.funding[0].grant_id, "GRANT-001");
    }
}
