//! Plan reader backed by a reflector cache

use async_trait::async_trait;
use kube::runtime::reflector::{ObjectRef, Store};

use crate::crd::CatalogPlan;
use crate::error::Result;
use crate::key::ObjectKey;
use crate::reconcilers::{PlanReader, PlanSnapshot};

/// Reads plans from the controller's watch cache instead of the API server
pub struct CachedPlanReader<K: CatalogPlan> {
    store: Store<K>,
}

impl<K: CatalogPlan> CachedPlanReader<K> {
    pub fn new(store: Store<K>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<K: CatalogPlan> PlanReader for CachedPlanReader<K> {
    async fn get_plan(&self, key: &ObjectKey) -> Result<Option<PlanSnapshot>> {
        let mut obj_ref = ObjectRef::<K>::new(&key.name);
        if !key.is_cluster_scoped() {
            obj_ref = obj_ref.within(&key.namespace);
        }

        Ok(self.store.get(&obj_ref).map(|plan| PlanSnapshot {
            key: key.clone(),
            removed_from_broker_catalog: plan.removed_from_broker_catalog(),
        }))
    }
}

/// Keys of every plan currently in the cache
pub fn cached_keys<K: CatalogPlan>(store: &Store<K>) -> Vec<String> {
    store
        .state()
        .iter()
        .filter_map(|plan| ObjectKey::from_resource(&**plan))
        .map(|key| key.encode())
        .collect()
}
