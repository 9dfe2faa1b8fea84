use geo::{Geometry, Intersects, Rect};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::auth_config::AuthManager;
use crate::error::{HarnessError, HarnessResult};
use crate::layer::edit::EditSession;
use crate::layer::feature::{AttributeValue, Feature, FeatureId, Fields};
use crate::layer::uri::LayerUri;
use crate::wfs::client::WfsClient;
use crate::wfs::feature_type::FeatureTypeName;
use crate::wfs::gml::GmlFeature;
use crate::wfs::schema::FeatureSchema;

/// Resolved data source of a valid layer
#[derive(Debug, Clone)]
struct Provider {
    client: WfsClient,
    schema: FeatureSchema,
}

/// A layer bound to one WFS feature type with a client-side feature cache
#[derive(Debug)]
pub struct VectorLayer {
    uri: LayerUri,
    name: String,
    provider: Option<Provider>,
    error: Option<String>,
    fields: Fields,
    pub(crate) features: BTreeMap<FeatureId, Feature>,
    /// Local ids survive reloads
    pub(crate) fid_to_id: HashMap<String, FeatureId>,
    next_id: FeatureId,
    selected: BTreeSet<FeatureId>,
}

impl VectorLayer {
    /// Resolve credentials and describe the feature type. Failures leave the layer invalid.
    pub async fn new(uri: LayerUri, name: &str, auth: &AuthManager) -> Self {
        let mut layer = Self {
            uri,
            name: name.to_string(),
            provider: None,
            error: None,
            fields: Fields::default(),
            features: BTreeMap::new(),
            fid_to_id: HashMap::new(),
            next_id: 1,
            selected: BTreeSet::new(),
        };

        match Self::connect(&layer.uri, auth).await {
            Ok(provider) => {
                layer.fields = Fields::from_schema(&provider.schema);
                layer.provider = Some(provider);
            }
            Err(e) => {
                tracing::warn!("Layer {} is invalid: {}", layer.name, e);
                layer.error = Some(e.to_string());
            }
        }

        layer
    }

    async fn connect(uri: &LayerUri, auth: &AuthManager) -> HarnessResult<Provider> {
        let session = auth.authenticated_client(&uri.authcfg).await?;
        let client = WfsClient::new(session, uri.endpoint.clone());
        let schema = client.describe_feature_type(&uri.type_name).await?;

        if schema.geometry.as_deref() != Some(uri.type_name.geometry_kind.ogc_name()) {
            return Err(HarnessError::InvalidLayer(format!(
                "{} describes geometry {:?}, expected {}",
                uri.type_name,
                schema.geometry,
                uri.type_name.geometry_kind.ogc_name()
            )));
        }

        Ok(Provider { client, schema })
    }

    pub fn is_valid(&self) -> bool {
        self.provider.is_some()
    }

    /// Why the layer is invalid
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uri(&self) -> &LayerUri {
        &self.uri
    }

    pub fn type_name(&self) -> &FeatureTypeName {
        &self.uri.type_name
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn schema(&self) -> Option<&FeatureSchema> {
        self.provider.as_ref().map(|p| &p.schema)
    }

    pub(crate) fn provider_client(&self) -> HarnessResult<&WfsClient> {
        self.provider
            .as_ref()
            .map(|p| &p.client)
            .ok_or_else(|| HarnessError::InvalidLayer(format!("Layer {} is invalid", self.name)))
    }

    pub(crate) fn geometry_column(&self) -> &str {
        self.schema()
            .and_then(|s| s.geometry_column.as_deref())
            .unwrap_or("geometry")
    }

    pub(crate) fn assign_id(&mut self, fid: Option<&str>) -> FeatureId {
        if let Some(id) = fid.and_then(|f| self.fid_to_id.get(f)) {
            return *id;
        }
        let id = self.next_id;
        self.next_id += 1;
        if let Some(fid) = fid {
            self.fid_to_id.insert(fid.to_string(), id);
        }
        id
    }

    fn feature_from_gml(&mut self, gml: GmlFeature) -> Feature {
        let mut feature = Feature::new(&self.fields);
        feature.id = self.assign_id(gml.fid.as_deref());
        feature.fid = gml.fid;

        for field in self.fields.iter() {
            if let Some(text) = gml.properties.get(&field.name) {
                feature.put_attribute(&field.name, AttributeValue::parse(field.kind(), text));
            }
        }
        if let Some(geometry) = gml.geometry {
            feature.set_geometry(geometry);
        }
        feature
    }

    /// Re-fetch every feature from the server and drop the selection
    pub async fn reload(&mut self) -> HarnessResult<()> {
        let collection = self
            .provider_client()?
            .get_feature(&self.uri.type_name, None)
            .await?;

        let mut features = BTreeMap::new();
        for gml in collection.features {
            let feature = self.feature_from_gml(gml);
            features.insert(feature.id, feature);
        }

        self.features = features;
        self.selected.clear();

        tracing::debug!("Layer {} loaded {} features", self.name, self.features.len());
        Ok(())
    }

    /// Copies of the cached features in id order
    pub fn features(&self) -> Vec<Feature> {
        self.features.values().cloned().collect()
    }

    pub fn feature(&self, id: FeatureId) -> Option<&Feature> {
        self.features.get(&id)
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// First cached feature matching a predicate
    pub fn find_feature(&self, predicate: impl Fn(&Feature) -> bool) -> Option<Feature> {
        self.features.values().find(|f| predicate(f)).cloned()
    }

    /// Replace the selection with the features whose geometry intersects `rect`
    pub fn select_by_rect(&mut self, rect: &Rect<f64>) {
        self.selected = self
            .features
            .values()
            .filter(|f| {
                f.geometry()
                    .is_some_and(|g: &Geometry<f64>| g.intersects(rect))
            })
            .map(|f| f.id)
            .collect();
    }

    pub fn remove_selection(&mut self) {
        self.selected.clear();
    }

    pub fn selected_feature_ids(&self) -> Vec<FeatureId> {
        self.selected.iter().copied().collect()
    }

    pub fn selected_features(&self) -> Vec<Feature> {
        self.selected
            .iter()
            .filter_map(|id| self.features.get(id))
            .cloned()
            .collect()
    }

    /// Begin buffering edits; they are sent on `commit` and discarded on drop
    pub fn start_editing(&mut self) -> HarnessResult<EditSession<'_>> {
        self.provider_client()?;
        Ok(EditSession::new(self))
    }
}
