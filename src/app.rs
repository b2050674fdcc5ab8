use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::info;

use crate::config::ResolvedConfig;
use crate::crate_export;
use crate::domain::{RecordId, UnifiedRecord};
use crate::error::GideError;
use crate::index::SearchIndex;
use crate::output::write_json_atomic;
use crate::transform::{FailedDocument, Transformer, find_inputs};

const TOP_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct TransformSummary {
    pub source: String,
    pub written: usize,
    pub skipped: usize,
    pub failed: Vec<FailedDocument>,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountEntry {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total: usize,
    pub by_source: BTreeMap<String, usize>,
    pub top_organisms: Vec<CountEntry>,
    pub top_methods: Vec<CountEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub indexed: usize,
    pub errors: usize,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub id: String,
    pub output: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone)]
pub struct App {
    config: ResolvedConfig,
}

impl App {
    pub fn new(config: ResolvedConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn default_output(&self, label: &str) -> Utf8PathBuf {
        self.config.output_dir.join(format!("{label}.json"))
    }

    pub fn transform(
        &self,
        transformer: &mut dyn Transformer,
        output: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<TransformSummary, GideError> {
        let label = transformer.source_label();
        sink.event(ProgressEvent {
            message: format!("phase=Transform; {label}"),
            elapsed: None,
        });
        let start = Instant::now();
        let outcome = transformer.transform_all()?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Transform; {label} produced {} records",
                outcome.records.len()
            ),
            elapsed: Some(start.elapsed()),
        });

        sink.event(ProgressEvent {
            message: format!("phase=Store; writing {output}"),
            elapsed: None,
        });
        write_json_atomic(output, &outcome.records)?;
        info!(
            source = label,
            written = outcome.records.len(),
            skipped = outcome.skipped,
            failed = outcome.failed.len(),
            output = %output,
            "transform written"
        );

        Ok(TransformSummary {
            source: label.to_string(),
            written: outcome.records.len(),
            skipped: outcome.skipped,
            failed: outcome.failed,
            output: output.to_string(),
        })
    }

    pub fn index<I: SearchIndex + ?Sized>(
        &self,
        records: &[UnifiedRecord],
        index: &I,
        sink: &dyn ProgressSink,
    ) -> Result<IndexReport, GideError> {
        sink.event(ProgressEvent {
            message: "phase=Resolve; probing search index".to_string(),
            elapsed: None,
        });
        index.health()?;

        sink.event(ProgressEvent {
            message: format!("phase=Index; upserting {} records", records.len()),
            elapsed: None,
        });
        let start = Instant::now();
        let summary = index.bulk_upsert(records)?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Index; {} indexed, {} errors",
                summary.indexed, summary.errors
            ),
            elapsed: Some(start.elapsed()),
        });

        let total = index.count()?;
        Ok(IndexReport {
            indexed: summary.indexed,
            errors: summary.errors,
            total,
        })
    }

    pub fn export_crate(
        &self,
        records: &[UnifiedRecord],
        id: &RecordId,
        output: &Utf8Path,
    ) -> Result<ExportResult, GideError> {
        let record = records
            .iter()
            .find(|record| &record.id == id)
            .ok_or_else(|| GideError::InvalidRecordId(format!("{id} not found in input")))?;
        let document = crate_export::to_ro_crate(record);
        write_json_atomic(output, &document)?;
        Ok(ExportResult {
            id: id.to_string(),
            output: output.to_string(),
        })
    }
}

pub fn stats(records: &[UnifiedRecord]) -> Stats {
    let mut by_source = BTreeMap::new();
    let mut organisms: HashMap<&str, usize> = HashMap::new();
    let mut methods: HashMap<&str, usize> = HashMap::new();

    for record in records {
        *by_source.entry(record.source.to_string()).or_insert(0) += 1;
        for organism in record
            .biosamples
            .iter()
            .flat_map(|biosample| &biosample.organism)
        {
            *organisms.entry(organism.scientific_name.as_str()).or_insert(0) += 1;
        }
        for method in record
            .image_acquisition_protocols
            .iter()
            .flat_map(|protocol| &protocol.methods)
        {
            *methods.entry(method.name.as_str()).or_insert(0) += 1;
        }
    }

    Stats {
        total: records.len(),
        by_source,
        top_organisms: top(organisms),
        top_methods: top(methods),
    }
}

fn top(counts: HashMap<&str, usize>) -> Vec<CountEntry> {
    let mut entries: Vec<CountEntry> = counts
        .into_iter()
        .map(|(name, count)| CountEntry {
            name: name.to_string(),
            count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    entries.truncate(TOP_LIMIT);
    entries
}

pub fn load_records(path: &Utf8Path) -> Result<Vec<UnifiedRecord>, GideError> {
    let files = find_inputs(path.as_std_path(), &["*.json"])?;
    let mut records = Vec::new();
    for file in files {
        let content = fs::read_to_string(&file)
            .map_err(|err| GideError::Filesystem(format!("read {}: {err}", file.display())))?;
        let batch: Vec<UnifiedRecord> = serde_json::from_str(&content)
            .map_err(|err| GideError::InvalidJson(format!("{}: {err}", file.display())))?;
        records.extend(batch);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use crate::domain::{BioSample, Organism, Source};
    use crate::record::RecordBuilder;

    use super::*;

    fn with_organism(source: Source, id: &str, name: &str) -> UnifiedRecord {
        RecordBuilder::new(source, id)
            .biosample(BioSample::new(vec![Organism::named(name)], "cell"))
            .build()
    }

    #[test]
    fn stats_orders_by_count_then_name() {
        let records = vec![
            with_organism(Source::Idr, "idr1", "Mus musculus"),
            with_organism(Source::Idr, "idr2", "Homo sapiens"),
            with_organism(Source::Bia, "S-BIAD1", "Homo sapiens"),
            with_organism(Source::Ssbd, "ssbd-dataset-1", "Danio rerio"),
        ];
        let stats = stats(&records);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_source.get("IDR"), Some(&2));
        assert_eq!(stats.by_source.get("SSBD"), Some(&1));
        let names: Vec<&str> = stats.top_organisms.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Homo sapiens", "Danio rerio", "Mus musculus"]);
        assert_eq!(stats.top_methods[0].name, "Unknown");
        assert_eq!(stats.top_methods[0].count, 4);
    }

    #[test]
    fn stats_keeps_top_ten() {
        let records: Vec<UnifiedRecord> = (0..15)
            .map(|i| with_organism(Source::Idr, &format!("idr{i}"), &format!("Species {i:02}")))
            .collect();
        let stats = stats(&records);
        assert_eq!(stats.top_organisms.len(), 10);
        assert_eq!(stats.top_organisms[0].name, "Species 00");
    }
}
