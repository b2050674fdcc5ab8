pub mod bia;
pub mod idr;
pub mod rocrate;
pub mod ssbd;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::domain::UnifiedRecord;
use crate::error::GideError;

pub use bia::{BiaClient, BiaHttpClient, BiaTransformer};
pub use idr::IdrTransformer;
pub use rocrate::LinkedDataTransformer;
pub use ssbd::SsbdTransformer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDocument {
    pub document: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct TransformOutcome {
    pub records: Vec<UnifiedRecord>,
    pub skipped: usize,
    pub failed: Vec<FailedDocument>,
}

impl TransformOutcome {
    pub fn fail(&mut self, document: impl Into<String>, error: &GideError) {
        self.failed.push(FailedDocument {
            document: document.into(),
            reason: error.to_string(),
        });
    }
}

pub trait Transformer {
    fn source_label(&self) -> &'static str;

    fn transform_all(&mut self) -> Result<TransformOutcome, GideError>;
}

pub fn find_inputs(root: &Path, patterns: &[&str]) -> Result<Vec<PathBuf>, GideError> {
    if !root.exists() {
        return Err(GideError::InputNotFound(root.to_path_buf()));
    }
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let base = glob::Pattern::escape(&root.to_string_lossy());
    let mut found = BTreeSet::new();
    for pattern in patterns {
        let full = format!("{}/{pattern}", base.trim_end_matches('/'));
        let paths =
            glob::glob(&full).map_err(|err| GideError::Filesystem(err.to_string()))?;
        for path in paths {
            let path = path.map_err(|err| GideError::Filesystem(err.to_string()))?;
            if path.is_file() {
                found.insert(path);
            }
        }
    }
    Ok(found.into_iter().collect())
}
