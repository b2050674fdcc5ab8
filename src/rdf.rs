use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::{Subject, Term};

use crate::error::GideError;

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RdfTerm {
    Iri(String),
    Blank(String),
    Literal(String),
}

impl RdfTerm {
    pub fn iri(value: impl Into<String>) -> Self {
        RdfTerm::Iri(value.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            RdfTerm::Iri(value) | RdfTerm::Blank(value) | RdfTerm::Literal(value) => value,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, RdfTerm::Literal(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct TripleStore {
    subjects: Vec<RdfTerm>,
    properties: HashMap<RdfTerm, Vec<(String, RdfTerm)>>,
    seen: HashSet<(RdfTerm, String, RdfTerm)>,
}

impl TripleStore {
    pub fn from_path(path: &Path) -> Result<Self, GideError> {
        let file = File::open(path).map_err(|err| {
            GideError::Filesystem(format!("open {}: {err}", path.display()))
        })?;
        Self::from_turtle(BufReader::new(file))
    }

    pub fn from_turtle<R: Read>(reader: R) -> Result<Self, GideError> {
        let mut store = Self::default();
        for quad in RdfParser::from_format(RdfFormat::Turtle).for_reader(reader) {
            let quad = quad.map_err(|err| GideError::InvalidTurtle(err.to_string()))?;
            let (Some(subject), Some(object)) =
                (subject_term(&quad.subject), object_term(&quad.object))
            else {
                continue;
            };
            store.insert(subject, quad.predicate.as_str(), object);
        }
        Ok(store)
    }

    pub fn insert(&mut self, subject: RdfTerm, predicate: &str, object: RdfTerm) {
        let triple = (subject.clone(), predicate.to_string(), object.clone());
        if !self.seen.insert(triple) {
            return;
        }
        if !self.properties.contains_key(&subject) {
            self.subjects.push(subject.clone());
        }
        self.properties
            .entry(subject)
            .or_default()
            .push((predicate.to_string(), object));
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn subjects_of_type(&self, class: &str) -> Vec<&RdfTerm> {
        self.subjects
            .iter()
            .filter(|subject| {
                self.objects(subject, RDF_TYPE)
                    .any(|ty| matches!(ty, RdfTerm::Iri(iri) if iri == class))
            })
            .collect()
    }

    pub fn objects<'s>(
        &'s self,
        subject: &RdfTerm,
        predicate: &str,
    ) -> impl Iterator<Item = &'s RdfTerm> {
        self.properties
            .get(subject)
            .into_iter()
            .flatten()
            .filter(move |(existing, _)| existing == predicate)
            .map(|(_, object)| object)
    }

    pub fn literal(&self, subject: &RdfTerm, predicate: &str) -> Option<&str> {
        self.objects(subject, predicate)
            .map(RdfTerm::as_str)
            .map(str::trim)
            .find(|value| !value.is_empty())
    }

    pub fn resource(&self, subject: &RdfTerm, predicate: &str) -> Option<&RdfTerm> {
        self.objects(subject, predicate).find(|object| !object.is_literal())
    }

    pub fn label(&self, subject: &RdfTerm) -> Option<&str> {
        self.literal(subject, RDFS_LABEL)
    }
}

fn subject_term(subject: &Subject) -> Option<RdfTerm> {
    match subject {
        Subject::NamedNode(node) => Some(RdfTerm::Iri(node.as_str().to_string())),
        Subject::BlankNode(node) => Some(RdfTerm::Blank(node.as_str().to_string())),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn object_term(object: &Term) -> Option<RdfTerm> {
    match object {
        Term::NamedNode(node) => Some(RdfTerm::Iri(node.as_str().to_string())),
        Term::BlankNode(node) => Some(RdfTerm::Blank(node.as_str().to_string())),
        Term::Literal(literal) => Some(RdfTerm::Literal(literal.value().to_string())),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}
