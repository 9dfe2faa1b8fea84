use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Links {
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Link>,
}

/// `{type, id}` pair inside a relationship
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
}

/// A JSON:API resource object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub relationships: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, attributes: Map<String, Value>) -> Self {
        Self {
            id: String::new(),
            resource_type: resource_type.into(),
            attributes,
            relationships: Map::new(),
            links: None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attribute_str(&self, name: &str) -> Option<&str> {
        self.attribute(name).and_then(Value::as_str)
    }

    /// `value` of a formatted-text or geofield attribute such as `notes` or `geometry`
    pub fn attribute_value(&self, name: &str) -> Option<&str> {
        self.attribute(name)
            .and_then(|v| v.get("value"))
            .and_then(Value::as_str)
    }

    /// Notes text, empty when the entity has none
    pub fn notes(&self) -> &str {
        self.attribute_value("notes").unwrap_or_default()
    }

    pub fn self_href(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|l| l.self_link.as_ref())
            .map(|l| l.href.as_str())
    }

    /// Identifiers referenced by a relationship; to-one and to-many are both accepted
    pub fn relationship_refs(&self, name: &str) -> Vec<ResourceIdentifier> {
        let Some(data) = self.relationships.get(name).and_then(|r| r.get("data")) else {
            return Vec::new();
        };

        match data {
            Value::Array(items) => items
                .iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect(),
            Value::Object(_) => serde_json::from_value(data.clone())
                .map(|r| vec![r])
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    pub fn identifier(&self) -> ResourceIdentifier {
        ResourceIdentifier {
            resource_type: self.resource_type.clone(),
            id: self.id.clone(),
        }
    }
}

/// Top-level JSON:API document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}

impl<T> Document<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            included: Vec::new(),
            links: None,
        }
    }

    pub fn next_href(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|l| l.next.as_ref())
            .map(|l| l.href.as_str())
    }
}

pub type CollectionDocument = Document<Vec<Resource>>;
