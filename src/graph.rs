use std::collections::HashMap;

use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy)]
pub struct Node<'a>(&'a Map<String, Value>);

impl<'a> Node<'a> {
    pub fn new(properties: &'a Map<String, Value>) -> Self {
        Self(properties)
    }

    pub fn id(&self) -> Option<&'a str> {
        self.0.get("@id").and_then(Value::as_str)
    }

    pub fn types(&self) -> Vec<&'a str> {
        match self.0.get("@type") {
            Some(Value::String(value)) => vec![value.as_str()],
            Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn has_type_containing(&self, fragment: &str) -> bool {
        self.types().iter().any(|ty| ty.contains(fragment))
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.0.get(key)
    }

    pub fn str(&self, key: &str) -> Option<&'a str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn text(&self, key: &str) -> Option<String> {
        let value = self.0.get(key)?;
        match value {
            Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Value::Number(number) => Some(number.to_string()),
            Value::Object(_) => reference_id(value).map(str::to_string),
            Value::Array(values) => values.first().and_then(|first| match first {
                Value::String(value) if !value.trim().is_empty() => {
                    Some(value.trim().to_string())
                }
                Value::Number(value) => Some(value.to_string()),
                other => reference_id(other).map(str::to_string),
            }),
            _ => None,
        }
    }

    pub fn first_text(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.text(key))
    }

    pub fn strings(&self, key: &str) -> Vec<&'a str> {
        match self.0.get(key) {
            Some(Value::String(value)) => vec![value.as_str()],
            Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn refs(&self, key: &str) -> Vec<&'a Value> {
        match self.0.get(key) {
            Some(Value::Array(values)) => values.iter().collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(value) => vec![value],
        }
    }

    pub fn first_refs(&self, keys: &[&str]) -> Vec<&'a Value> {
        keys.iter()
            .map(|key| self.refs(key))
            .find(|refs| !refs.is_empty())
            .unwrap_or_default()
    }
}

pub fn reference_id(reference: &Value) -> Option<&str> {
    match reference {
        Value::String(value) => Some(value.as_str()),
        Value::Object(map) => map.get("@id").and_then(Value::as_str),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeGraph<'a> {
    nodes: HashMap<&'a str, Node<'a>>,
    order: Vec<Node<'a>>,
}

impl<'a> NodeGraph<'a> {
    pub fn from_document(document: &'a Value) -> Self {
        let entries = document
            .get("@graph")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut graph = Self::default();
        for entry in entries {
            let Some(properties) = entry.as_object() else {
                continue;
            };
            let node = Node::new(properties);
            if let Some(id) = node.id() {
                graph.nodes.insert(id, node);
            }
            graph.order.push(node);
        }
        graph
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = Node<'a>> + '_ {
        self.order.iter().copied()
    }

    pub fn get(&self, id: &str) -> Option<Node<'a>> {
        self.nodes.get(id).copied()
    }

    pub fn resolve(&self, reference: Option<&Value>) -> Option<Node<'a>> {
        reference.and_then(reference_id).and_then(|id| self.get(id))
    }

    pub fn resolve_many<'r, I>(&self, references: I) -> Vec<Node<'a>>
    where
        I: IntoIterator<Item = &'r Value>,
    {
        references
            .into_iter()
            .filter_map(|reference| self.resolve(Some(reference)))
            .collect()
    }
}
