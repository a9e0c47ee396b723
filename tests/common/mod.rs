//! In-memory stand-ins for the plan cache, the instance list and the plan
//! delete call

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serviceplan_operator::key::ObjectKey;
use serviceplan_operator::reconcilers::{
    DependencyQuery, PlanDeleter, PlanReader, PlanReconciler, PlanSnapshot,
};
use serviceplan_operator::{Error, Result};

#[derive(Default)]
struct State {
    /// plan key -> removed from broker catalog
    plans: HashMap<ObjectKey, bool>,
    /// instance key -> referenced plan name, resolved in the instance's
    /// namespace for namespaced plans
    instances: HashMap<ObjectKey, String>,
    get_calls: usize,
    query_calls: usize,
    deletes: Vec<ObjectKey>,
    query_failures: Vec<String>,
    delete_failures: Vec<String>,
}

/// Shared fake catalog; clones see the same state
#[derive(Clone, Default)]
pub struct FakeCatalog {
    state: Arc<Mutex<State>>,
}

pub type FakeReconciler = PlanReconciler<FakeCatalog, FakeCatalog, FakeCatalog>;

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reconciler(&self) -> FakeReconciler {
        PlanReconciler::new(self.clone(), self.clone(), self.clone())
    }

    pub fn with_plan(self, key: &str, removed: bool) -> Self {
        self.state
            .lock()
            .unwrap()
            .plans
            .insert(ObjectKey::decode(key).unwrap(), removed);
        self
    }

    pub fn with_instance(self, key: &str, plan_name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .instances
            .insert(ObjectKey::decode(key).unwrap(), plan_name.to_string());
        self
    }

    /// Fail the next dependency queries with these messages, in order
    pub fn failing_queries(self, messages: &[&str]) -> Self {
        self.state.lock().unwrap().query_failures =
            messages.iter().map(|m| m.to_string()).collect();
        self
    }

    /// Fail the next deletes with these messages, in order
    pub fn failing_deletes(self, messages: &[&str]) -> Self {
        self.state.lock().unwrap().delete_failures =
            messages.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn remove_instance(&self, key: &str) {
        self.state
            .lock()
            .unwrap()
            .instances
            .remove(&ObjectKey::decode(key).unwrap());
    }

    pub fn has_plan(&self, key: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .plans
            .contains_key(&ObjectKey::decode(key).unwrap())
    }

    pub fn get_calls(&self) -> usize {
        self.state.lock().unwrap().get_calls
    }

    pub fn query_calls(&self) -> usize {
        self.state.lock().unwrap().query_calls
    }

    pub fn deletes(&self) -> Vec<ObjectKey> {
        self.state.lock().unwrap().deletes.clone()
    }
}

#[async_trait]
impl PlanReader for FakeCatalog {
    async fn get_plan(&self, key: &ObjectKey) -> Result<Option<PlanSnapshot>> {
        let mut state = self.state.lock().unwrap();
        state.get_calls += 1;
        Ok(state.plans.get(key).map(|removed| PlanSnapshot {
            key: key.clone(),
            removed_from_broker_catalog: *removed,
        }))
    }
}

#[async_trait]
impl DependencyQuery for FakeCatalog {
    async fn find_dependents(&self, plan: &ObjectKey) -> Result<Vec<ObjectKey>> {
        let mut state = self.state.lock().unwrap();
        state.query_calls += 1;
        if !state.query_failures.is_empty() {
            return Err(Error::store(state.query_failures.remove(0)));
        }

        let mut found: Vec<_> = state
            .instances
            .iter()
            .filter(|(instance, plan_name)| {
                **plan_name == plan.name
                    && (plan.is_cluster_scoped() || instance.namespace == plan.namespace)
            })
            .map(|(key, _)| key.clone())
            .collect();
        found.sort();
        Ok(found)
    }
}

#[async_trait]
impl PlanDeleter for FakeCatalog {
    async fn delete_plan(&self, plan: &ObjectKey) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.deletes.push(plan.clone());
        if !state.delete_failures.is_empty() {
            return Err(Error::store(state.delete_failures.remove(0)));
        }

        match state.plans.remove(plan) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(plan.to_string())),
        }
    }
}
