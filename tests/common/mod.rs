//! Common test utilities and fixtures
//!
//! A wiremock server stands in for farmOS: the OAuth2 token endpoint, the
//! JSON:API under `/api` and the WFS endpoint under `/wfs`. Tests run
//! without Docker or a farmOS instance.

#![allow(dead_code)]

use serde_json::{Value, json};
use std::sync::{Arc, Once};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use farmos_wfs_harness::auth_config::{AuthManager, AuthMethodConfig, DEFAULT_MASTER_PASSWORD};
use farmos_wfs_harness::config::HarnessConfig;
use farmos_wfs_harness::layer::LayerHelper;
use farmos_wfs_harness::wfs::FeatureTypeName;

pub const ACCESS_TOKEN: &str = "mock-access-token";
pub const BEARER: &str = "Bearer mock-access-token";
pub const JSON_API: &str = "application/vnd.api+json";

static INIT: Once = Once::new();

/// Initialize test logging
pub fn init_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("farmos_wfs_harness=debug,wiremock=info")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

// ============================================================================
// Mock farmOS server
// ============================================================================

pub struct MockFarmos {
    pub server: MockServer,
    pub config: Arc<HarnessConfig>,
}

impl MockFarmos {
    pub async fn start() -> Self {
        init_logging();
        let server = MockServer::start().await;
        let config = Arc::new(HarnessConfig::for_base_url(server.uri()));
        Self { server, config }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.uri(), path)
    }

    /// Password grant for the default test credentials
    pub async fn mount_token(&self) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=password"))
            .and(body_string_contains("username=root"))
            .and(body_string_contains("scope=farm_manager"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_json()))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_token_rejected(&self) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "The user credentials were incorrect.",
            })))
            .mount(&self.server)
            .await;
    }

    /// No log or asset bundles, so cleanup has nothing to visit
    pub async fn mount_empty_bundles(&self) {
        self.mount_json_api_get("/api/log_type/log_type", json!({ "data": [] }))
            .await;
        self.mount_json_api_get("/api/asset_type/asset_type", json!({ "data": [] }))
            .await;
    }

    pub async fn mount_json_api_get(&self, url_path: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(url_path))
            .and(header("authorization", BEARER))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", JSON_API)
                    .set_body_json(body),
            )
            .mount(&self.server)
            .await;
    }

    pub async fn mount_capabilities(&self) {
        Mock::given(method("GET"))
            .and(path("/wfs"))
            .and(query_param("REQUEST", "GetCapabilities"))
            .and(header("authorization", BEARER))
            .respond_with(xml_response(200, &capabilities_xml()))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_schema(&self, type_name: &str, xsd: &str) {
        Mock::given(method("GET"))
            .and(path("/wfs"))
            .and(query_param("REQUEST", "DescribeFeatureType"))
            .and(query_param("TYPENAME", type_name))
            .respond_with(xml_response(200, xsd))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_features(&self, type_name: &str, collection: &str) {
        Mock::given(method("GET"))
            .and(path("/wfs"))
            .and(query_param("REQUEST", "GetFeature"))
            .and(query_param("TYPENAME", type_name))
            .respond_with(xml_response(200, collection))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_transaction(&self, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path("/wfs"))
            .and(query_param("REQUEST", "Transaction"))
            .and(header("authorization", BEARER))
            .and(body_string_contains("<Transaction "))
            .respond_with(xml_response(status, body))
            .mount(&self.server)
            .await;
    }

    /// Bodies of the requests received for a method and path, in arrival order
    pub async fn received_bodies(&self, http_method: &str, url_path: &str) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == http_method && r.url.path() == url_path)
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .collect()
    }

    /// An auth manager holding the OAuth2 config, and the id it was stored under
    pub fn auth_manager(&self) -> (Arc<AuthManager>, String) {
        let mut manager = AuthManager::new();
        assert!(manager.set_master_password(DEFAULT_MASTER_PASSWORD));
        let mut method = AuthMethodConfig::oauth2(&self.config).unwrap();
        let id = manager.store_authentication_config(&mut method).unwrap();
        (Arc::new(manager), id)
    }

    pub fn layer_helper(&self) -> LayerHelper {
        let (manager, id) = self.auth_manager();
        LayerHelper::new(manager, id, self.config.wfs_endpoint())
    }
}

pub fn xml_response(status: u16, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(status)
        .insert_header("content-type", "text/xml; charset=utf-8")
        .set_body_string(body.to_string())
}

pub fn token_json() -> Value {
    json!({
        "access_token": ACCESS_TOKEN,
        "token_type": "Bearer",
        "expires_in": 3600,
        "refresh_token": "mock-refresh-token",
    })
}

// ============================================================================
// WFS documents
// ============================================================================

/// Capabilities advertising every asset feature type
pub fn capabilities_xml() -> String {
    let feature_types: String = FeatureTypeName::all()
        .iter()
        .map(|t| {
            format!(
                "    <wfs:FeatureType>\n      <wfs:Name>{}</wfs:Name>\n      <wfs:DefaultSRS>EPSG:4326</wfs:DefaultSRS>\n    </wfs:FeatureType>\n",
                t.qualified()
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<wfs:WFS_Capabilities xmlns:wfs="http://www.opengis.net/wfs" xmlns:ows="http://www.opengis.net/ows" xmlns:xlink="http://www.w3.org/1999/xlink" version="1.1.0">
  <ows:ServiceIdentification>
    <ows:Title>farmOS OGC WFS API</ows:Title>
    <ows:ServiceType>WFS</ows:ServiceType>
    <ows:ServiceTypeVersion>1.1.0</ows:ServiceTypeVersion>
  </ows:ServiceIdentification>
  <ows:ServiceProvider>
    <ows:ProviderName>Test0</ows:ProviderName>
    <ows:ProviderSite xlink:href="http://www"/>
  </ows:ServiceProvider>
  <ows:OperationsMetadata>
    <ows:Operation name="GetCapabilities"/>
    <ows:Operation name="DescribeFeatureType"/>
    <ows:Operation name="GetFeature"/>
    <ows:Operation name="Transaction"/>
  </ows:OperationsMetadata>
  <wfs:FeatureTypeList>
{}  </wfs:FeatureTypeList>
</wfs:WFS_Capabilities>"#,
        feature_types
    )
}

/// DescribeFeatureType response for an asset type with an optional bundle field
pub fn asset_schema_xml(unqualified: &str, bundle_field: Option<&str>, geometry: &str) -> String {
    let bundle = bundle_field
        .map(|f| format!("          <xsd:element name=\"{}\" type=\"string\"/>\n", f))
        .unwrap_or_default();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:gml="http://www.opengis.net/gml" xmlns:farmos="https://farmos.org/wfs" targetNamespace="https://farmos.org/wfs" elementFormDefault="qualified">
  <xsd:import namespace="http://www.opengis.net/gml" schemaLocation="http://schemas.opengis.net/gml/3.1.1/base/gml.xsd"/>
  <xsd:element name="{name}" type="farmos:{name}_type" substitutionGroup="gml:_Feature"/>
  <xsd:complexType name="{name}_type">
    <xsd:complexContent>
      <xsd:extension base="gml:AbstractFeatureType">
        <xsd:sequence>
          <xsd:element name="geometry" type="gml:{geometry}PropertyType"/>
          <xsd:element name="__id" type="integer" minOccurs="0"/>
          <xsd:element name="__uuid" type="string" minOccurs="0"/>
          <xsd:element name="__revision_id" type="integer" minOccurs="0"/>
          <xsd:element name="__revision_translation_affected" type="boolean" minOccurs="0"/>
          <xsd:element name="name" type="string"/>
          <xsd:element name="data" type="string" minOccurs="0"/>
{bundle}          <xsd:element name="notes" type="string" nillable="true"/>
          <xsd:element name="is_fixed" type="boolean" minOccurs="0"/>
          <xsd:element name="is_location" type="boolean" minOccurs="0"/>
          <xsd:element name="archived" type="xsd:dateTime" minOccurs="0"/>
          <xsd:element name="flag" type="string" minOccurs="0"/>
          <xsd:element name="default_langcode" type="boolean" minOccurs="0"/>
          <xsd:element name="revision_default" type="boolean" minOccurs="0"/>
          <xsd:element name="revision_log_message" type="string" minOccurs="0"/>
        </xsd:sequence>
      </xsd:extension>
    </xsd:complexContent>
  </xsd:complexType>
</xsd:schema>"#,
        name = unqualified,
        geometry = geometry,
        bundle = bundle,
    )
}

pub fn land_point_schema_xml() -> String {
    asset_schema_xml("asset_land_point", Some("land_type"), "Point")
}

pub struct LandPoint<'a> {
    pub uuid: &'a str,
    pub name: &'a str,
    pub notes: &'a str,
    pub land_type: &'a str,
    pub x: f64,
    pub y: f64,
}

pub fn land_point_member(p: &LandPoint<'_>) -> String {
    format!(
        r#"  <gml:featureMember>
    <farmos:asset_land_point gml:id="asset_land_point.{uuid}">
      <farmos:geometry>
        <gml:Point srsName="EPSG:4326"><gml:pos srsDimension="2">{x} {y}</gml:pos></gml:Point>
      </farmos:geometry>
      <farmos:__id>1</farmos:__id>
      <farmos:__uuid>{uuid}</farmos:__uuid>
      <farmos:name>{name}</farmos:name>
      <farmos:land_type>{land_type}</farmos:land_type>
      <farmos:notes>{notes}</farmos:notes>
      <farmos:is_fixed>1</farmos:is_fixed>
    </farmos:asset_land_point>
  </gml:featureMember>
"#,
        uuid = p.uuid,
        x = p.x,
        y = p.y,
        name = p.name,
        land_type = p.land_type,
        notes = p.notes,
    )
}

pub fn feature_collection(members: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<wfs:FeatureCollection xmlns:farmos="https://farmos.org/wfs" xmlns:gml="http://www.opengis.net/gml" xmlns:wfs="http://www.opengis.net/wfs">
{}</wfs:FeatureCollection>"#,
        members.concat()
    )
}

/// TransactionResponse with the given totals, inserted `(handle, fid)` pairs and action messages
pub fn transaction_response(
    totals: (u32, u32, u32),
    inserted: &[(&str, &str)],
    messages: &[&str],
) -> String {
    let (ins, upd, del) = totals;
    let insert_results = if inserted.is_empty() {
        String::new()
    } else {
        let features: String = inserted
            .iter()
            .map(|(handle, fid)| {
                format!(
                    "    <wfs:Feature handle=\"{}\"><ogc:FeatureId fid=\"{}\"/></wfs:Feature>\n",
                    handle, fid
                )
            })
            .collect();
        format!("  <wfs:InsertResults>\n{}  </wfs:InsertResults>\n", features)
    };
    let results = if messages.is_empty() {
        String::new()
    } else {
        let actions: String = messages
            .iter()
            .map(|m| format!("    <wfs:Action><wfs:Message>{}</wfs:Message></wfs:Action>\n", m))
            .collect();
        format!("  <wfs:TransactionResults>\n{}  </wfs:TransactionResults>\n", actions)
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<wfs:TransactionResponse xmlns:wfs="http://www.opengis.net/wfs" xmlns:ogc="http://www.opengis.net/ogc" version="1.1.0">
  <wfs:TransactionSummary>
    <wfs:totalInserted>{ins}</wfs:totalInserted>
    <wfs:totalUpdated>{upd}</wfs:totalUpdated>
    <wfs:totalDeleted>{del}</wfs:totalDeleted>
  </wfs:TransactionSummary>
{results}{insert_results}</wfs:TransactionResponse>"#
    )
}

// ============================================================================
// JSON:API documents
// ============================================================================

/// An asset resource with a self link on the mock server
pub fn asset_resource(base: &str, bundle: &str, id: &str, name: &str, notes: &str) -> Value {
    json!({
        "type": format!("asset--{}", bundle),
        "id": id,
        "attributes": {
            "name": name,
            "notes": { "value": notes, "format": "default" },
        },
        "links": {
            "self": { "href": format!("{}/api/asset/{}/{}?resourceVersion=id%3A1", base, bundle, id) },
        },
    })
}

pub fn bundle_resource(kind: &str, bundle: &str) -> Value {
    json!({
        "type": format!("{}--{}", kind, kind),
        "id": format!("{}-uuid", bundle),
        "attributes": { "drupal_internal__id": bundle },
    })
}
