//! Removal of entities left behind by earlier runs
//!
//! Everything the harness creates carries [`SENTINEL_MARKER`] in its notes.
//! Logs are removed before assets so no log is left pointing at a deleted
//! asset.

use std::collections::HashMap;

use crate::error::HarnessResult;
use crate::jsonapi::{EntityHelper, Resource, ResourceIdentifier};

pub const SENTINEL_MARKER: &str = "[created by farmOS_wfs-qgis_tests]";

/// Append the sentinel marker to a notes text
pub fn mark_notes(text: &str) -> String {
    if text.is_empty() {
        SENTINEL_MARKER.to_string()
    } else {
        format!("{} {}", text, SENTINEL_MARKER)
    }
}

pub fn notes_contain_marker(resource: &Resource) -> bool {
    resource.notes().contains(SENTINEL_MARKER)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub logs_deleted: usize,
    pub assets_deleted: usize,
}

/// Bundle machine name of a `log_type--log_type` / `asset_type--asset_type` config entity
fn bundle_name(bundle: &Resource) -> Option<&str> {
    bundle.attribute_str("drupal_internal__id")
}

/// Whether any asset the log references (and the server included) is marked
fn log_references_marked_asset(
    log: &Resource,
    included: &HashMap<ResourceIdentifier, &Resource>,
) -> bool {
    log.relationship_refs("asset")
        .iter()
        .filter_map(|r| included.get(r))
        .any(|asset| notes_contain_marker(asset))
}

async fn cleanup_logs(entities: &EntityHelper) -> HarnessResult<usize> {
    let config = entities.config();
    let log_types = entities.get_all(&config.api_url("log_type/log_type")).await?;

    let mut deleted = 0;
    for log_type in &log_types.data {
        let Some(bundle) = bundle_name(log_type) else {
            tracing::warn!("Log type {} has no drupal_internal__id", log_type.id);
            continue;
        };

        let logs = entities
            .get_all(&config.api_url(&format!("log/{}?include=asset", bundle)))
            .await?;

        let included: HashMap<ResourceIdentifier, &Resource> = logs
            .included
            .iter()
            .map(|r| (r.identifier(), r))
            .collect();

        for log in &logs.data {
            if log_references_marked_asset(log, &included) {
                entities.delete_resource(log).await?;
                deleted += 1;
            }
        }
    }

    Ok(deleted)
}

async fn cleanup_assets(entities: &EntityHelper) -> HarnessResult<usize> {
    let config = entities.config();
    let asset_types = entities
        .get_all(&config.api_url("asset_type/asset_type"))
        .await?;

    let mut deleted = 0;
    for asset_type in &asset_types.data {
        let Some(bundle) = bundle_name(asset_type) else {
            tracing::warn!("Asset type {} has no drupal_internal__id", asset_type.id);
            continue;
        };

        let assets = entities
            .get_all(&config.api_url(&format!("asset/{}", bundle)))
            .await?;

        for asset in assets.data.iter().filter(|a| notes_contain_marker(a)) {
            entities.delete_resource(asset).await?;
            deleted += 1;
        }
    }

    Ok(deleted)
}

/// Delete marked logs, then marked assets
pub async fn cleanup_old_assets(entities: &EntityHelper) -> HarnessResult<CleanupReport> {
    let logs_deleted = cleanup_logs(entities).await?;
    let assets_deleted = cleanup_assets(entities).await?;

    tracing::info!(
        "Cleanup removed {} logs and {} assets",
        logs_deleted,
        assets_deleted
    );

    Ok(CleanupReport {
        logs_deleted,
        assets_deleted,
    })
}
