use geo::Rect;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;

use crate::auth::AuthenticatedClient;
use crate::error::{HarnessResult, ensure_success};
use crate::geometry::format_ordinate;
use crate::wfs::capabilities::{Capabilities, ServiceIdentification, ServiceProvider};
use crate::wfs::feature_type::FeatureTypeName;
use crate::wfs::gml::{DEFAULT_SRS, FeatureCollection, parse_feature_collection};
use crate::wfs::schema::FeatureSchema;
use crate::wfs::transaction::{Transaction, TransactionResponse};
use crate::xml::{self, Element};

pub const WFS_VERSION: &str = "1.1.0";
pub const XML_CONTENT_TYPE: &str = "application/xml";

/// Status and body of a response, whatever the status
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

impl RawResponse {
    pub fn xml(&self) -> HarnessResult<Element> {
        xml::parse(&self.body)
    }
}

/// Format a rectangle as a WFS `BBOX` parameter
pub fn bbox_param(rect: &Rect<f64>) -> String {
    format!(
        "{},{},{},{},{}",
        format_ordinate(rect.min().x),
        format_ordinate(rect.min().y),
        format_ordinate(rect.max().x),
        format_ordinate(rect.max().y),
        DEFAULT_SRS
    )
}

/// WFS 1.1.0 requests against one endpoint
#[derive(Debug, Clone)]
pub struct WfsClient {
    client: AuthenticatedClient,
    endpoint: String,
}

impl WfsClient {
    pub fn new(client: AuthenticatedClient, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_xml(&self, query: &[(&str, &str)]) -> HarnessResult<Element> {
        let response = self.client.get(&self.endpoint).query(query).send().await?;
        let response = ensure_success(response).await?;
        let body = response.text().await?;
        xml::parse(&body)
    }

    pub async fn get_capabilities(&self) -> HarnessResult<Capabilities> {
        let root = self
            .get_xml(&[
                ("SERVICE", "WFS"),
                ("REQUEST", "GetCapabilities"),
                ("VERSION", WFS_VERSION),
            ])
            .await?;
        Capabilities::from_element(&root)
    }

    pub async fn describe_feature_type(
        &self,
        type_name: &FeatureTypeName,
    ) -> HarnessResult<FeatureSchema> {
        let qualified = type_name.qualified();
        let root = self
            .get_xml(&[
                ("SERVICE", "WFS"),
                ("REQUEST", "DescribeFeatureType"),
                ("VERSION", WFS_VERSION),
                ("TYPENAME", qualified.as_str()),
            ])
            .await?;
        FeatureSchema::from_element(&root, type_name)
    }

    pub async fn get_feature(
        &self,
        type_name: &FeatureTypeName,
        bbox: Option<&Rect<f64>>,
    ) -> HarnessResult<FeatureCollection> {
        let qualified = type_name.qualified();
        let bbox = bbox.map(bbox_param);

        let mut query = vec![
            ("SERVICE", "WFS"),
            ("REQUEST", "GetFeature"),
            ("VERSION", WFS_VERSION),
            ("TYPENAME", qualified.as_str()),
            ("SRSNAME", DEFAULT_SRS),
        ];
        if let Some(bbox) = &bbox {
            query.push(("BBOX", bbox.as_str()));
        }

        let root = self.get_xml(&query).await?;
        let collection = parse_feature_collection(&root)?;
        tracing::debug!(
            "GetFeature {} returned {} features",
            qualified,
            collection.features.len()
        );
        Ok(collection)
    }

    /// POST a body without checking the status
    pub async fn post_raw(
        &self,
        query: &[(&str, &str)],
        body: impl Into<String>,
    ) -> HarnessResult<RawResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(query)
            .header(CONTENT_TYPE, XML_CONTENT_TYPE)
            .body(body.into())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }

    /// POST an encoded Transaction; the status is returned alongside the body
    pub async fn post_transaction(&self, transaction: &Transaction) -> HarnessResult<RawResponse> {
        let body = transaction.to_xml()?;
        tracing::debug!("Posting transaction:\n{}", body);
        self.post_raw(&[("SERVICE", "WFS"), ("REQUEST", "Transaction")], body)
            .await
    }

    /// POST an encoded Transaction and parse the response, failing on any non-2xx status
    pub async fn transaction(&self, transaction: &Transaction) -> HarnessResult<TransactionResponse> {
        let body = transaction.to_xml()?;
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("SERVICE", "WFS"), ("REQUEST", "Transaction")])
            .header(CONTENT_TYPE, XML_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        TransactionResponse::parse(&response.text().await?)
    }
}

/// Capabilities-backed view of a WFS, fetched once on connect
#[derive(Debug, Clone)]
pub struct WebFeatureService {
    client: WfsClient,
    capabilities: Capabilities,
}

impl WebFeatureService {
    pub async fn connect(
        client: AuthenticatedClient,
        endpoint: impl Into<String>,
    ) -> HarnessResult<Self> {
        let client = WfsClient::new(client, endpoint);
        let capabilities = client.get_capabilities().await?;

        tracing::info!(
            "Connected to WFS {} with {} feature types",
            client.endpoint(),
            capabilities.feature_types.len()
        );

        Ok(Self {
            client,
            capabilities,
        })
    }

    pub fn client(&self) -> &WfsClient {
        &self.client
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn identification(&self) -> &ServiceIdentification {
        &self.capabilities.identification
    }

    pub fn provider(&self) -> &ServiceProvider {
        &self.capabilities.provider
    }

    pub fn operations(&self) -> &[String] {
        &self.capabilities.operations
    }

    /// Advertised feature type names
    pub fn contents(&self) -> Vec<&str> {
        self.capabilities.feature_type_names().collect()
    }

    pub async fn get_schema(&self, type_name: &str) -> HarnessResult<FeatureSchema> {
        let type_name: FeatureTypeName = type_name.parse()?;
        self.client.describe_feature_type(&type_name).await
    }
}
