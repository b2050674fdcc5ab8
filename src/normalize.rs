use std::collections::HashSet;

use crate::domain::{ImagingMethod, Organism, UNKNOWN_SAMPLE_TYPE};

const SAMPLE_TYPE_RULES: &[(&[&str], &str)] = &[
    (&["tissue"], "tissue"),
    (&["cell line", "cell culture"], "cell"),
    (&["organism", "whole"], "organism"),
    (&["cell"], "cell"),
];

pub fn infer_sample_type(description: Option<&str>) -> &'static str {
    let Some(text) = description.map(str::to_lowercase) else {
        return UNKNOWN_SAMPLE_TYPE;
    };
    SAMPLE_TYPE_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|keyword| text.contains(keyword)))
        .map(|(_, sample_type)| *sample_type)
        .unwrap_or(UNKNOWN_SAMPLE_TYPE)
}

pub trait Keyed {
    fn identity(&self) -> &str;
}

impl Keyed for Organism {
    fn identity(&self) -> &str {
        &self.scientific_name
    }
}

impl Keyed for ImagingMethod {
    fn identity(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone)]
pub struct DedupVec<T: Keyed> {
    items: Vec<T>,
    seen: HashSet<String>,
}

impl<T: Keyed> Default for DedupVec<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
        }
    }
}

impl<T: Keyed> DedupVec<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: T) -> bool {
        if self.seen.contains(item.identity()) {
            return false;
        }
        self.seen.insert(item.identity().to_string());
        self.items.push(item);
        true
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.seen.contains(identity)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Keyed> Extend<T> for DedupVec<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}

pub fn split_keywords(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|keyword| !keyword.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
