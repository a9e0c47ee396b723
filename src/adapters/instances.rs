//! Dependency lookup of ServiceInstances

use async_trait::async_trait;
use kube::api::{Api, ListParams};
use kube::Client;

use crate::crd::{PlanScope, ServiceInstance};
use crate::error::{Error, Result};
use crate::key::ObjectKey;
use crate::reconcilers::DependencyQuery;

/// Lists ServiceInstances in all namespaces that reference a plan
pub struct KubeDependencyQuery {
    client: Client,
    scope: PlanScope,
}

impl KubeDependencyQuery {
    pub fn new(client: Client, scope: PlanScope) -> Self {
        Self { client, scope }
    }
}

#[async_trait]
impl DependencyQuery for KubeDependencyQuery {
    async fn find_dependents(&self, plan: &ObjectKey) -> Result<Vec<ObjectKey>> {
        let api: Api<ServiceInstance> = Api::all(self.client.clone());
        let params = ListParams::default().fields(&self.scope.field_selector(&plan.name));
        let instances = api
            .list(&params)
            .await
            .map_err(|e| list_failed(plan, e))?;

        Ok(matching_instances(self.scope, plan, &instances.items))
    }
}

/// A failed list leaves the dependents unknown; retried like any store error
fn list_failed(plan: &ObjectKey, err: kube::Error) -> Error {
    Error::store(format!("listing instances of {}: {}", plan, err))
}

/// Keys of the instances whose reference of `scope` resolves to `plan`.
///
/// The field selector can only match on the plan name, so a namespaced plan
/// also needs the instance to live in the plan's namespace. A server that
/// ignores the selector cannot unblock a deletion either.
pub fn matching_instances(
    scope: PlanScope,
    plan: &ObjectKey,
    instances: &[ServiceInstance],
) -> Vec<ObjectKey> {
    instances
        .iter()
        .filter(|si| scope.plan_key(si).as_ref() == Some(plan))
        .filter_map(ObjectKey::from_resource)
        .collect()
}
