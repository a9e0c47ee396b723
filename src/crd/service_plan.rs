//! ServicePlan and ClusterServicePlan Custom Resource Definitions

use kube::api::Api;
use kube::{Client, CustomResource};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{CatalogPlan, PlanScope};

/// ServicePlan resource specification
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "servicecatalog.k8s.io",
    version = "v1beta1",
    kind = "ServicePlan",
    plural = "serviceplans",
    singular = "serviceplan",
    shortname = "sp",
    namespaced,
    status = "PlanStatus",
    printcolumn = r#"{"name": "External-Name", "type": "string", "jsonPath": ".spec.externalName"}"#,
    printcolumn = r#"{"name": "Removed", "type": "boolean", "jsonPath": ".status.removedFromBrokerCatalog"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ServicePlanSpec {
    /// Name of the broker that offers this plan
    #[serde(default)]
    pub service_broker_name: String,

    /// Plan name as known to the broker
    pub external_name: String,

    /// Plan ID as known to the broker
    #[serde(rename = "externalID")]
    pub external_id: String,

    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether the plan is free of charge
    #[serde(default)]
    pub free: bool,

    /// Service class this plan belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_class_ref: Option<ObjectReference>,
}

/// ClusterServicePlan resource specification
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "servicecatalog.k8s.io",
    version = "v1beta1",
    kind = "ClusterServicePlan",
    plural = "clusterserviceplans",
    singular = "clusterserviceplan",
    shortname = "csp",
    status = "PlanStatus",
    printcolumn = r#"{"name": "External-Name", "type": "string", "jsonPath": ".spec.externalName"}"#,
    printcolumn = r#"{"name": "Removed", "type": "boolean", "jsonPath": ".status.removedFromBrokerCatalog"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterServicePlanSpec {
    /// Name of the cluster broker that offers this plan
    #[serde(default)]
    pub cluster_service_broker_name: String,

    /// Plan name as known to the broker
    pub external_name: String,

    /// Plan ID as known to the broker
    #[serde(rename = "externalID")]
    pub external_id: String,

    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether the plan is free of charge
    #[serde(default)]
    pub free: bool,

    /// Cluster service class this plan belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_service_class_ref: Option<ObjectReference>,
}

/// Reference to another catalog object by name
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct ObjectReference {
    pub name: String,
}

/// Status shared by both plan kinds.
///
/// Written by the broker catalog sync; this operator only reads it.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanStatus {
    /// Set once the broker's catalog no longer lists the plan
    #[serde(default)]
    pub removed_from_broker_catalog: bool,
}

impl CatalogPlan for ServicePlan {
    const SCOPE: PlanScope = PlanScope::Namespaced;

    fn removed_from_broker_catalog(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.removed_from_broker_catalog)
    }

    fn api(client: Client, namespace: &str) -> Api<Self> {
        Api::namespaced(client, namespace)
    }
}

impl CatalogPlan for ClusterServicePlan {
    const SCOPE: PlanScope = PlanScope::Cluster;

    fn removed_from_broker_catalog(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.removed_from_broker_catalog)
    }

    fn api(client: Client, _namespace: &str) -> Api<Self> {
        Api::all(client)
    }
}
