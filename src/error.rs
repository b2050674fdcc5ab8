use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GideError {
    #[error("invalid record id: {0}")]
    InvalidRecordId(String),

    #[error("unknown source: {0}")]
    InvalidSource(String),

    #[error("no root dataset found in {0}")]
    MissingRootDataset(String),

    #[error("failed to parse Turtle: {0}")]
    InvalidTurtle(String),

    #[error("failed to parse JSON: {0}")]
    InvalidJson(String),

    #[error("failed to parse study file: {0}")]
    InvalidFlatFile(String),

    #[error("input not found: {0}")]
    InputNotFound(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("ontology lookup request failed: {0}")]
    OntologyHttp(String),

    #[error("ontology lookup returned status {status}: {message}")]
    OntologyStatus { status: u16, message: String },

    #[error("search index request failed: {0}")]
    IndexHttp(String),

    #[error("search index returned status {status}: {message}")]
    IndexStatus { status: u16, message: String },

    #[error("search index is not reachable at {0}")]
    IndexUnavailable(String),

    #[error("BioImage Archive request failed: {0}")]
    BiaHttp(String),

    #[error("BioImage Archive returned status {status}: {message}")]
    BiaStatus { status: u16, message: String },
}
