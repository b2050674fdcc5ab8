pub mod app;
pub mod config;
pub mod crate_export;
pub mod dates;
pub mod domain;
pub mod error;
pub mod graph;
pub mod identifiers;
pub mod index;
pub mod normalize;
pub mod ontology;
pub mod output;
pub mod rdf;
pub mod record;
pub mod transform;
