//! ServiceInstance Custom Resource Definition

use kube::CustomResource;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ObjectReference;

/// ServiceInstance resource specification.
///
/// Only the plan references matter to this operator; instances are owned
/// and provisioned elsewhere.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "servicecatalog.k8s.io",
    version = "v1beta1",
    kind = "ServiceInstance",
    plural = "serviceinstances",
    singular = "serviceinstance",
    shortname = "si",
    namespaced,
    printcolumn = r#"{"name": "Plan", "type": "string", "jsonPath": ".spec.planRef.name"}"#,
    printcolumn = r#"{"name": "Cluster-Plan", "type": "string", "jsonPath": ".spec.clusterPlanRef.name"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstanceSpec {
    /// ServicePlan in the instance's namespace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_ref: Option<ObjectReference>,

    /// ClusterServicePlan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_plan_ref: Option<ObjectReference>,

    /// Instance ID sent to the broker
    #[serde(rename = "externalID", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    /// Provisioning parameters passed through to the broker
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub parameters: Option<serde_json::Value>,
}

fn preserve_unknown_fields(_: &mut schemars::gen::SchemaGenerator) -> Schema {
    let mut schema = SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        ..Default::default()
    };
    schema.extensions.insert(
        "x-kubernetes-preserve-unknown-fields".to_string(),
        serde_json::Value::Bool(true),
    );
    Schema::Object(schema)
}
