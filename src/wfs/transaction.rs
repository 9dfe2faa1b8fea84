//! WFS 1.1.0 Transaction requests and responses

use geo::Geometry;

use crate::error::{HarnessError, HarnessResult};
use crate::wfs::exception::ExceptionReport;
use crate::wfs::feature_type::{FARMOS_PREFIX, FeatureTypeName};
use crate::wfs::gml::write_geometry;
use crate::xml::{self, Element, XmlWriter, ns};

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Geometry(Geometry<f64>),
    /// Property sent without a value, clearing it
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionAction {
    Insert {
        type_name: FeatureTypeName,
        handle: Option<String>,
        properties: Vec<(String, PropertyValue)>,
    },
    Update {
        type_name: FeatureTypeName,
        properties: Vec<(String, PropertyValue)>,
        feature_ids: Vec<String>,
    },
    Delete {
        type_name: FeatureTypeName,
        feature_ids: Vec<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    pub actions: Vec<TransactionAction>,
}

fn qualified_property(name: &str) -> String {
    format!("{}:{}", FARMOS_PREFIX, name)
}

/// farmOS resolves `FeatureId` through its `fid` attribute
fn write_filter(w: &mut XmlWriter, feature_ids: &[String]) -> HarnessResult<()> {
    w.start("ogc:Filter", &[])?;
    for fid in feature_ids {
        w.empty("ogc:FeatureId", &[("fid", fid.as_str())])?;
    }
    w.end("ogc:Filter")
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn push(&mut self, action: TransactionAction) {
        self.actions.push(action);
    }

    pub fn count_inserts(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, TransactionAction::Insert { .. }))
            .count()
    }

    pub fn count_updates(&self) -> usize {
        self.actions
            .iter()
            .filter_map(|a| match a {
                TransactionAction::Update { feature_ids, .. } => Some(feature_ids.len()),
                _ => None,
            })
            .sum()
    }

    pub fn count_deletes(&self) -> usize {
        self.actions
            .iter()
            .filter_map(|a| match a {
                TransactionAction::Delete { feature_ids, .. } => Some(feature_ids.len()),
                _ => None,
            })
            .sum()
    }

    /// Encode the request body
    ///
    /// The server matches the root and action elements by their literal
    /// node names, so the WFS namespace is the default one and those
    /// elements carry no prefix.
    pub fn to_xml(&self) -> HarnessResult<String> {
        let mut w = XmlWriter::new()?;
        w.start(
            "Transaction",
            &[
                ("xmlns", ns::WFS),
                ("xmlns:ogc", ns::OGC),
                ("xmlns:gml", ns::GML),
                ("xmlns:farmos", ns::FARMOS),
                ("service", "WFS"),
                ("version", "1.1.0"),
            ],
        )?;

        for action in &self.actions {
            match action {
                TransactionAction::Insert {
                    type_name,
                    handle,
                    properties,
                } => {
                    let mut attrs = Vec::new();
                    if let Some(h) = handle {
                        attrs.push(("handle", h.as_str()));
                    }
                    w.start("Insert", &attrs)?;
                    let feature_element = type_name.qualified();
                    w.start(&feature_element, &[])?;
                    for (name, value) in properties {
                        let element = qualified_property(name);
                        match value {
                            PropertyValue::Text(text) => w.text_element(&element, &[], text)?,
                            PropertyValue::Geometry(g) => {
                                w.start(&element, &[])?;
                                write_geometry(&mut w, g)?;
                                w.end(&element)?;
                            }
                            PropertyValue::Null => {}
                        }
                    }
                    w.end(&feature_element)?;
                    w.end("Insert")?;
                }
                TransactionAction::Update {
                    type_name,
                    properties,
                    feature_ids,
                } => {
                    let qualified = type_name.qualified();
                    w.start("Update", &[("typeName", qualified.as_str())])?;
                    for (name, value) in properties {
                        w.start("Property", &[])?;
                        w.text_element("Name", &[], &qualified_property(name))?;
                        match value {
                            PropertyValue::Text(text) => w.text_element("Value", &[], text)?,
                            PropertyValue::Geometry(g) => {
                                w.start("Value", &[])?;
                                write_geometry(&mut w, g)?;
                                w.end("Value")?;
                            }
                            PropertyValue::Null => {}
                        }
                        w.end("Property")?;
                    }
                    write_filter(&mut w, feature_ids)?;
                    w.end("Update")?;
                }
                TransactionAction::Delete {
                    type_name,
                    feature_ids,
                } => {
                    let qualified = type_name.qualified();
                    w.start("Delete", &[("typeName", qualified.as_str())])?;
                    write_filter(&mut w, feature_ids)?;
                    w.end("Delete")?;
                }
            }
        }

        w.end("Transaction")?;
        w.finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedFeature {
    pub handle: Option<String>,
    pub fid: String,
}

impl InsertedFeature {
    /// Asset uuid part of the fid (`asset_land_point.<uuid>`)
    pub fn asset_id(&self) -> &str {
        self.fid.split_once('.').map(|(_, id)| id).unwrap_or(&self.fid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionMessage {
    pub locator: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionResponse {
    pub total_inserted: Option<u32>,
    pub total_updated: Option<u32>,
    pub total_deleted: Option<u32>,
    pub inserted: Vec<InsertedFeature>,
    pub messages: Vec<ActionMessage>,
}

fn parse_total(summary: Option<&Element>, name: &str) -> HarnessResult<Option<u32>> {
    match summary.and_then(|s| s.find_text(name)) {
        None => Ok(None),
        Some(text) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| HarnessError::Protocol(format!("Invalid {}: {}", name, text))),
    }
}

impl TransactionResponse {
    pub fn from_element(root: &Element) -> HarnessResult<Self> {
        if let Some(report) = ExceptionReport::from_element(root) {
            return Err(HarnessError::Protocol(format!(
                "Transaction rejected: {}",
                report
            )));
        }
        if root.local_name() != "TransactionResponse" {
            return Err(HarnessError::Protocol(format!(
                "Expected TransactionResponse, got {}",
                root.local_name()
            )));
        }

        let summary = root.child("TransactionSummary");

        let mut inserted = Vec::new();
        for feature in root.find_all("InsertResults/Feature") {
            let handle = feature.attr("handle").map(str::to_string);
            for id in feature.children_named("FeatureId") {
                if let Some(fid) = id.attr("fid") {
                    inserted.push(InsertedFeature {
                        handle: handle.clone(),
                        fid: fid.to_string(),
                    });
                }
            }
        }

        let messages = root
            .find_all("TransactionResults/Action")
            .into_iter()
            .flat_map(|action| {
                let locator = action.attr("locator").map(str::to_string);
                action.children_named("Message").map(move |m| ActionMessage {
                    locator: locator.clone(),
                    message: m.text().to_string(),
                })
            })
            .collect();

        Ok(Self {
            total_inserted: parse_total(summary, "totalInserted")?,
            total_updated: parse_total(summary, "totalUpdated")?,
            total_deleted: parse_total(summary, "totalDeleted")?,
            inserted,
            messages,
        })
    }

    pub fn parse(body: &str) -> HarnessResult<Self> {
        Self::from_element(&xml::parse(body)?)
    }
}
