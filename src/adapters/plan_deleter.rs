//! Plan deletion through the Kubernetes API

use std::marker::PhantomData;

use async_trait::async_trait;
use kube::api::DeleteParams;
use kube::Client;
use tracing::debug;

use crate::crd::CatalogPlan;
use crate::error::{Error, Result};
use crate::key::ObjectKey;
use crate::reconcilers::PlanDeleter;

/// Deletes plans of kind `K` from the API server
pub struct KubePlanDeleter<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K: CatalogPlan> KubePlanDeleter<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

#[async_trait]
impl<K: CatalogPlan> PlanDeleter for KubePlanDeleter<K> {
    async fn delete_plan(&self, plan: &ObjectKey) -> Result<()> {
        let api = K::api(self.client.clone(), &plan.namespace);
        match api.delete(&plan.name, &DeleteParams::default()).await {
            Ok(_) => {
                debug!(plan = %plan, "Delete accepted");
                Ok(())
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                Err(Error::NotFound(plan.to_string()))
            }
            Err(e) => Err(Error::Kube(e)),
        }
    }
}
