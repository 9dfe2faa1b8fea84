use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::auth::AuthenticatedClient;
use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult, ensure_success};
use crate::jsonapi::document::{CollectionDocument, Document, Resource};
use crate::wfs::feature_type::AssetType;

pub const JSON_API_CONTENT_TYPE: &str = "application/vnd.api+json";

/// farmOS entity CRUD over JSON:API
#[derive(Clone)]
pub struct EntityHelper {
    client: AuthenticatedClient,
    config: Arc<HarnessConfig>,
}

fn into_object(value: Value, what: &str) -> HarnessResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(HarnessError::Config(format!(
            "{} must be a JSON object, got {}",
            what, other
        ))),
    }
}

/// Drop the query string, e.g. `?resourceVersion=id%3A12`, from an entity link
pub fn strip_query(href: &str) -> HarnessResult<String> {
    let mut url = url::Url::parse(href)?;
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

impl EntityHelper {
    pub fn new(client: AuthenticatedClient, config: Arc<HarnessConfig>) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// POST a new `{entity_type}--{bundle}` resource and return its id
    pub async fn create_entity(
        &self,
        entity_type: &str,
        bundle: &str,
        attributes: Value,
        relationships: Option<Value>,
    ) -> HarnessResult<String> {
        let mut resource = Resource::new(
            format!("{}--{}", entity_type, bundle),
            into_object(attributes, "attributes")?,
        );
        if let Some(relationships) = relationships {
            resource.relationships = into_object(relationships, "relationships")?;
        }

        let url = self.config.api_url(&format!("{}/{}", entity_type, bundle));
        let body = serde_json::to_vec(&Document::new(resource))?;

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, JSON_API_CONTENT_TYPE)
            .header(ACCEPT, JSON_API_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let created: Document<Resource> = response.json().await?;
        if created.data.id.is_empty() {
            return Err(HarnessError::Protocol(format!(
                "Created {}--{} has no id",
                entity_type, bundle
            )));
        }

        tracing::info!("Created {} {}", created.data.resource_type, created.data.id);
        Ok(created.data.id)
    }

    pub async fn create_asset(
        &self,
        asset_type: AssetType,
        attributes: Value,
        relationships: Option<Value>,
    ) -> HarnessResult<String> {
        self.create_entity("asset", asset_type.as_str(), attributes, relationships)
            .await
    }

    pub async fn create_taxonomy_term(
        &self,
        vocabulary: &str,
        attributes: Value,
    ) -> HarnessResult<String> {
        self.create_entity("taxonomy_term", vocabulary, attributes, None)
            .await
    }

    pub async fn get_asset_by_type_and_id(
        &self,
        asset_type: AssetType,
        id: &str,
    ) -> HarnessResult<Resource> {
        let url = self.config.api_url(&format!("asset/{}/{}", asset_type, id));
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, JSON_API_CONTENT_TYPE)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let document: Document<Resource> = response.json().await?;
        Ok(document.data)
    }

    /// Fails unless the asset lookup answers 404
    pub async fn assert_asset_does_not_exist(
        &self,
        asset_type: AssetType,
        id: &str,
    ) -> HarnessResult<()> {
        let url = self.config.api_url(&format!("asset/{}/{}", asset_type, id));
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, JSON_API_CONTENT_TYPE)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status => Err(HarnessError::Assertion(format!(
                "Expected asset {}/{} to be gone, got {}",
                asset_type, id, status
            ))),
        }
    }

    /// DELETE the entity behind a `links.self.href`
    pub async fn delete_entity(&self, self_href: &str) -> HarnessResult<()> {
        let url = strip_query(self_href)?;
        let response = self.client.delete(&url).send().await?;
        ensure_success(response).await?;
        tracing::debug!("Deleted {}", url);
        Ok(())
    }

    pub async fn delete_resource(&self, resource: &Resource) -> HarnessResult<()> {
        let href = resource.self_href().ok_or_else(|| {
            HarnessError::Protocol(format!(
                "{} {} has no self link",
                resource.resource_type, resource.id
            ))
        })?;
        self.delete_entity(href).await
    }

    /// One page of a collection
    pub async fn get_collection(&self, url: &str) -> HarnessResult<CollectionDocument> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, JSON_API_CONTENT_TYPE)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }

    /// All pages of a collection, following `links.next`
    pub async fn get_all(&self, url: &str) -> HarnessResult<CollectionDocument> {
        let mut all = self.get_collection(url).await?;
        let mut next = all.next_href().map(str::to_string);

        while let Some(href) = next {
            let page = self.get_collection(&href).await?;
            next = page.next_href().map(str::to_string);
            all.data.extend(page.data);
            all.included.extend(page.included);
        }

        all.links = None;
        Ok(all)
    }
}
