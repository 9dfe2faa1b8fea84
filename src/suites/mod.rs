//! End-to-end scenarios against a running farmOS WFS
//!
//! Each suite gets its own [`Harness`]; its scenarios run one after another
//! in declaration order.

use futures::future::LocalBoxFuture;

use crate::error::{HarnessError, HarnessResult};
use crate::harness::Harness;
use crate::layer::{Feature, VectorLayer};

/// Wrap an `async fn(&Harness) -> HarnessResult<()>` as a [`Scenario`]
macro_rules! scenario {
    ($name:ident) => {
        $crate::suites::Scenario {
            name: stringify!($name),
            run: {
                fn run(
                    h: &$crate::harness::Harness,
                ) -> ::futures::future::LocalBoxFuture<'_, $crate::error::HarnessResult<()>> {
                    ::futures::FutureExt::boxed_local($name(h))
                }
                run
            },
        }
    };
}

pub mod basic_crud;
pub mod edge_cases;
pub mod schema;

pub type ScenarioFn = for<'a> fn(&'a Harness) -> LocalBoxFuture<'a, HarnessResult<()>>;

#[derive(Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub run: ScenarioFn,
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone)]
pub struct Suite {
    pub name: &'static str,
    /// Remove marked leftovers during setup
    pub cleanup: bool,
    pub scenarios: Vec<Scenario>,
}

impl Suite {
    /// `suite::scenario`, the id used for filtering and reporting
    pub fn case_id(&self, scenario: &Scenario) -> String {
        format!("{}::{}", self.name, scenario.name)
    }
}

pub fn all_suites() -> Vec<Suite> {
    vec![basic_crud::suite(), edge_cases::suite(), schema::suite()]
}

/// The cached feature whose `__uuid` is `uuid`
pub fn find_by_uuid(layer: &VectorLayer, uuid: &str) -> HarnessResult<Feature> {
    layer
        .find_feature(|f| f.attribute_str("__uuid") == Some(uuid))
        .ok_or_else(|| {
            HarnessError::Assertion(format!("No feature with __uuid {} in {}", uuid, layer.name()))
        })
}

/// The first cached feature whose notes contain `fragment`
pub fn find_by_notes(layer: &VectorLayer, fragment: &str) -> HarnessResult<Feature> {
    layer
        .find_feature(|f| f.attribute_str("notes").is_some_and(|n| n.contains(fragment)))
        .ok_or_else(|| {
            HarnessError::Assertion(format!(
                "No feature with notes containing '{}' in {}",
                fragment,
                layer.name()
            ))
        })
}

pub fn uuid_of(feature: &Feature) -> HarnessResult<String> {
    feature
        .attribute_str("__uuid")
        .map(str::to_string)
        .ok_or_else(|| HarnessError::Assertion(format!("Feature {} has no __uuid", feature.id())))
}

/// Names of the currently selected features
pub fn selected_names(layer: &VectorLayer) -> Vec<String> {
    layer
        .selected_features()
        .iter()
        .filter_map(|f| f.attribute_str("name").map(str::to_string))
        .collect()
}
