//! Edit buffer of a vector layer
//!
//! Edits are kept locally until [`EditSession::commit`], which sends them as
//! a single WFS Transaction. A session dropped without a successful commit
//! discards its edits and leaves the layer's cache untouched.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{HarnessError, HarnessResult};
use crate::layer::feature::{AttributeValue, Feature, FeatureId};
use crate::layer::vector_layer::VectorLayer;
use crate::wfs::schema::FeatureSchema;
use crate::wfs::transaction::{
    InsertedFeature, PropertyValue, Transaction, TransactionAction, TransactionResponse,
};

/// Outcome of a successful commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Layer ids of the inserted features, in insertion order
    pub inserted: Vec<FeatureId>,
    pub inserted_fids: Vec<String>,
    pub updated: usize,
    pub deleted: usize,
}

pub struct EditSession<'a> {
    layer: &'a mut VectorLayer,
    added: Vec<Feature>,
    changed: BTreeMap<FeatureId, Feature>,
    deleted: BTreeSet<FeatureId>,
    next_temp_id: FeatureId,
    finished: bool,
}

fn property_value(value: &AttributeValue) -> PropertyValue {
    match value.to_wire() {
        Some(text) => PropertyValue::Text(text),
        None => PropertyValue::Null,
    }
}

fn insert_handle(temp_id: FeatureId) -> String {
    format!("new{}", -temp_id)
}

impl<'a> EditSession<'a> {
    pub(crate) fn new(layer: &'a mut VectorLayer) -> Self {
        Self {
            layer,
            added: Vec::new(),
            changed: BTreeMap::new(),
            deleted: BTreeSet::new(),
            next_temp_id: -1,
            finished: false,
        }
    }

    pub fn layer(&self) -> &VectorLayer {
        self.layer
    }

    pub fn has_edits(&self) -> bool {
        !self.added.is_empty() || !self.changed.is_empty() || !self.deleted.is_empty()
    }

    /// Buffer a new feature and return its temporary (negative) id
    pub fn add_feature(&mut self, mut feature: Feature) -> FeatureId {
        let id = self.next_temp_id;
        self.next_temp_id -= 1;
        feature.id = id;
        feature.fid = None;
        self.added.push(feature);
        id
    }

    /// Buffer new attribute values and geometry for a feature; false if the layer has no such feature
    pub fn update_feature(&mut self, feature: &Feature) -> bool {
        if let Some(added) = self.added.iter_mut().find(|f| f.id == feature.id) {
            *added = feature.clone();
            return true;
        }

        let Some(original) = self.layer.features.get(&feature.id) else {
            return false;
        };
        if self.deleted.contains(&feature.id) {
            return false;
        }

        let mut updated = feature.clone();
        updated.fid = original.fid.clone();
        self.changed.insert(feature.id, updated);
        true
    }

    pub fn delete_feature(&mut self, id: FeatureId) -> bool {
        if let Some(pos) = self.added.iter().position(|f| f.id == id) {
            self.added.remove(pos);
            return true;
        }

        if !self.layer.features.contains_key(&id) || !self.deleted.insert(id) {
            return false;
        }
        self.changed.remove(&id);
        true
    }

    /// Discard every buffered edit
    pub fn rollback(mut self) {
        self.added.clear();
        self.changed.clear();
        self.deleted.clear();
        self.finished = true;
    }

    fn writable_properties(&self, feature: &Feature) -> Vec<(String, PropertyValue)> {
        feature
            .attributes()
            .filter(|(name, value)| !FeatureSchema::is_read_only(name) && !value.is_null())
            .map(|(name, value)| (name.to_string(), property_value(value)))
            .collect()
    }

    fn server_fid(&self, id: FeatureId) -> HarnessResult<String> {
        self.layer
            .features
            .get(&id)
            .and_then(|f| f.fid.clone())
            .ok_or_else(|| HarnessError::Edit(format!("Feature {} has no server feature id", id)))
    }

    fn build_transaction(&self) -> HarnessResult<Transaction> {
        let type_name = *self.layer.type_name();
        let geometry_column = self.layer.geometry_column().to_string();
        let mut transaction = Transaction::new();

        for feature in &self.added {
            let mut properties = self.writable_properties(feature);
            if let Some(geometry) = feature.geometry() {
                properties.push((geometry_column.clone(), PropertyValue::Geometry(geometry.clone())));
            }
            transaction.push(TransactionAction::Insert {
                type_name,
                handle: Some(insert_handle(feature.id)),
                properties,
            });
        }

        for (id, feature) in &self.changed {
            let Some(original) = self.layer.features.get(id) else {
                continue;
            };

            let mut properties: Vec<(String, PropertyValue)> = feature
                .attributes()
                .filter(|(name, value)| {
                    !FeatureSchema::is_read_only(name) && original.attribute(name) != Some(*value)
                })
                .map(|(name, value)| (name.to_string(), property_value(value)))
                .collect();

            if feature.geometry() != original.geometry() {
                if let Some(geometry) = feature.geometry() {
                    properties.push((geometry_column.clone(), PropertyValue::Geometry(geometry.clone())));
                }
            }

            if properties.is_empty() {
                continue;
            }

            transaction.push(TransactionAction::Update {
                type_name,
                properties,
                feature_ids: vec![self.server_fid(*id)?],
            });
        }

        if !self.deleted.is_empty() {
            let feature_ids = self
                .deleted
                .iter()
                .map(|id| self.server_fid(*id))
                .collect::<HarnessResult<Vec<_>>>()?;
            transaction.push(TransactionAction::Delete {
                type_name,
                feature_ids,
            });
        }

        Ok(transaction)
    }

    fn check_response(
        &self,
        transaction: &Transaction,
        response: &TransactionResponse,
    ) -> HarnessResult<()> {
        if !response.messages.is_empty() {
            let messages: Vec<&str> = response.messages.iter().map(|m| m.message.as_str()).collect();
            return Err(HarnessError::Edit(format!(
                "Server reported errors: {}",
                messages.join("; ")
            )));
        }

        let totals = [
            ("inserted", response.total_inserted, transaction.count_inserts()),
            ("updated", response.total_updated, transaction.count_updates()),
            ("deleted", response.total_deleted, transaction.count_deletes()),
        ];
        for (what, reported, expected) in totals {
            if let Some(reported) = reported {
                if reported as usize != expected {
                    return Err(HarnessError::Edit(format!(
                        "Server {} {} features, expected {}",
                        what, reported, expected
                    )));
                }
            }
        }

        if response.inserted.len() < transaction.count_inserts() {
            return Err(HarnessError::Edit(format!(
                "Server returned {} feature ids for {} inserts",
                response.inserted.len(),
                transaction.count_inserts()
            )));
        }

        Ok(())
    }

    /// Send the buffered edits as one Transaction and apply them to the layer cache
    pub async fn commit(mut self) -> HarnessResult<CommitSummary> {
        let transaction = self.build_transaction()?;
        if transaction.is_empty() {
            self.finished = true;
            return Ok(CommitSummary::default());
        }

        let client = self.layer.provider_client()?.clone();
        let raw = client.post_transaction(&transaction).await?;

        if !raw.status.is_success() {
            return Err(HarnessError::Edit(format!(
                "Transaction on {} failed with {}: {}",
                self.layer.name(),
                raw.status,
                raw.body
            )));
        }

        let response = TransactionResponse::parse(&raw.body)
            .map_err(|e| HarnessError::Edit(e.to_string()))?;
        self.check_response(&transaction, &response)?;

        let summary = self.apply(response.inserted);
        self.finished = true;

        tracing::info!(
            "Committed {} inserts, {} updates and {} deletes on {}",
            summary.inserted.len(),
            summary.updated,
            summary.deleted,
            self.layer.name()
        );
        Ok(summary)
    }

    fn apply(&mut self, inserted: Vec<InsertedFeature>) -> CommitSummary {
        let mut summary = CommitSummary::default();
        let added = std::mem::take(&mut self.added);

        for (position, mut feature) in added.into_iter().enumerate() {
            let handle = insert_handle(feature.id);
            let result = inserted
                .iter()
                .find(|r| r.handle.as_deref() == Some(handle.as_str()))
                .or_else(|| inserted.get(position));
            let Some(result) = result else {
                continue;
            };

            feature.id = self.layer.assign_id(Some(&result.fid));
            feature.fid = Some(result.fid.clone());
            summary.inserted.push(feature.id);
            summary.inserted_fids.push(result.fid.clone());
            self.layer.features.insert(feature.id, feature);
        }

        for (id, feature) in std::mem::take(&mut self.changed) {
            self.layer.features.insert(id, feature);
            summary.updated += 1;
        }

        for id in std::mem::take(&mut self.deleted) {
            self.layer.features.remove(&id);
            summary.deleted += 1;
        }

        summary
    }
}

impl Drop for EditSession<'_> {
    fn drop(&mut self) {
        if !self.finished && self.has_edits() {
            tracing::debug!(
                "Rolling back {} added, {} changed and {} deleted features on {}",
                self.added.len(),
                self.changed.len(),
                self.deleted.len(),
                self.layer.name()
            );
        }
    }
}
