//! The URI-keyed canonical store of every entity encountered.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::model::{asset, prop, Resource};

/// Shared resource registry. One mutex guards the append-then-index hot
/// path; every append and lookup takes it.
///
/// A URI maps to exactly one resource: re-inserting an existing URI returns
/// the already-registered entry. Resources are never removed.
#[derive(Default)]
pub struct ResourceRegistry {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    all: Vec<Arc<Resource>>,
    by_uri: HashMap<String, Arc<Resource>>,
    by_type: HashMap<String, Vec<Arc<Resource>>>,
    sa_by_email: HashMap<String, Arc<Resource>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, resource: Resource) -> Arc<Resource> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.by_uri.get(&resource.uri) {
            return Arc::clone(existing);
        }
        let entry = Arc::new(resource);
        inner.by_uri.insert(entry.uri.clone(), Arc::clone(&entry));
        inner
            .by_type
            .entry(entry.asset_type.clone())
            .or_default()
            .push(Arc::clone(&entry));
        if entry.asset_type == asset::SERVICE_ACCOUNT {
            if let Some(email) = entry.property(prop::EMAIL) {
                inner.sa_by_email.insert(email.to_string(), Arc::clone(&entry));
            }
        }
        inner.all.push(Arc::clone(&entry));
        entry
    }

    pub fn get(&self, uri: &str) -> Option<Arc<Resource>> {
        self.inner.lock().unwrap().by_uri.get(uri).cloned()
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.inner.lock().unwrap().by_uri.contains_key(uri)
    }

    pub fn of_type(&self, asset_type: &str) -> Vec<Arc<Resource>> {
        self.inner
            .lock()
            .unwrap()
            .by_type
            .get(asset_type)
            .cloned()
            .unwrap_or_default()
    }

    pub fn service_account_by_email(&self, email: &str) -> Option<Arc<Resource>> {
        self.inner.lock().unwrap().sa_by_email.get(email).cloned()
    }

    pub fn all(&self) -> Vec<Arc<Resource>> {
        self.inner.lock().unwrap().all.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn service_account(email: &str) -> Resource {
        let mut resource = Resource::new(
            asset::SERVICE_ACCOUNT,
            format!("//iam.googleapis.com/projects/222/serviceAccounts/{email}"),
        );
        resource.set_property(prop::EMAIL, email);
        resource
    }

    #[test]
    fn insert_is_idempotent_per_uri() {
        let registry = ResourceRegistry::new();
        let first = registry.insert(service_account("a@x.iam.gserviceaccount.com"));
        let second = registry.insert(service_account("a@x.iam.gserviceaccount.com"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn indexes_by_type_and_email() {
        let registry = ResourceRegistry::new();
        registry.insert(service_account("a@x.iam.gserviceaccount.com"));
        registry.insert(Resource::new(asset::PROJECT, "//cloudresourcemanager.googleapis.com/projects/222"));
        assert_eq!(registry.of_type(asset::SERVICE_ACCOUNT).len(), 1);
        assert_eq!(registry.of_type(asset::PROJECT).len(), 1);
        assert!(registry
            .service_account_by_email("a@x.iam.gserviceaccount.com")
            .is_some());
        assert!(registry.service_account_by_email("b@x.iam.gserviceaccount.com").is_none());
    }
}
