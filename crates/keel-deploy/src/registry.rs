//! Registry of deployed and faulty packages
//!
//! Both lists sit behind one lock so counts taken together are consistent.
//! Deploy pipelines run concurrently; only these mutations are serialized.
//! A pipeline claims its package id with [`PackageRegistry::reserve`] before
//! any handler runs, so two deploys of one id never both reach the chain.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::{DeployError, DeployResult};
use crate::package::{Package, PackageId};

/// A package whose handler chain failed, keyed by its bundle file name
#[derive(Debug, Clone)]
pub struct FaultRecord {
    pub bundle_name: String,
    pub package: Arc<Package>,
}

#[derive(Debug, Default)]
struct Entries {
    completed: Vec<Arc<Package>>,
    faulty: Vec<FaultRecord>,
    reserved: HashSet<PackageId>,
}

impl Entries {
    fn has_complete(&self, id: &PackageId) -> bool {
        self.completed
            .iter()
            .any(|p| p.id() == id && p.is_deployment_complete())
    }
}

/// Concurrency-safe store of deployed and faulty packages
#[derive(Debug, Default)]
pub struct PackageRegistry {
    entries: Mutex<Entries>,
}

impl PackageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a package. Rejected when a completed package with the same
    /// id is already registered or a deploy pipeline has claimed the id.
    pub fn insert(&self, package: Arc<Package>) -> DeployResult<()> {
        let mut entries = self.lock();
        if entries.has_complete(package.id()) {
            return Err(DeployError::AlreadyDeployed {
                id: package.id().clone(),
            });
        }
        if entries.reserved.contains(package.id()) {
            return Err(DeployError::DeployInProgress {
                id: package.id().clone(),
            });
        }
        debug!("Registering package {}", package.id());
        entries.completed.push(package);
        Ok(())
    }

    /// Claim `id` for one deploy pipeline.
    ///
    /// Fails with [`DeployError::AlreadyDeployed`] when a completed package
    /// with the id is registered, and with [`DeployError::DeployInProgress`]
    /// when another pipeline holds the claim. Dropping the guard releases it.
    pub fn reserve(&self, id: &PackageId) -> DeployResult<Reservation<'_>> {
        let mut entries = self.lock();
        if entries.has_complete(id) {
            return Err(DeployError::AlreadyDeployed { id: id.clone() });
        }
        if !entries.reserved.insert(id.clone()) {
            return Err(DeployError::DeployInProgress { id: id.clone() });
        }
        debug!("Reserved package id {}", id);
        Ok(Reservation {
            registry: self,
            id: id.clone(),
        })
    }

    pub fn is_reserved(&self, id: &PackageId) -> bool {
        self.lock().reserved.contains(id)
    }

    /// Remove a registered package by identity. Returns whether it was present.
    pub fn remove(&self, package: &Arc<Package>) -> bool {
        let mut entries = self.lock();
        let before = entries.completed.len();
        entries.completed.retain(|p| !Arc::ptr_eq(p, package));
        before != entries.completed.len()
    }

    pub fn find(&self, id: &PackageId) -> Option<Arc<Package>> {
        self.lock().completed.iter().find(|p| p.id() == id).cloned()
    }

    /// Registered packages with `name`, any version
    pub fn find_by_name(&self, name: &str) -> Vec<Arc<Package>> {
        self.lock()
            .completed
            .iter()
            .filter(|p| p.name() == name)
            .cloned()
            .collect()
    }

    pub fn find_by_bundle_path(&self, path: &Path) -> Option<Arc<Package>> {
        self.lock()
            .completed
            .iter()
            .find(|p| p.bundle_path() == path)
            .cloned()
    }

    /// Snapshot of registered packages
    pub fn packages(&self) -> Vec<Arc<Package>> {
        self.lock().completed.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().completed.is_empty()
    }

    pub fn add_fault(&self, bundle_name: impl Into<String>, package: Arc<Package>) {
        let bundle_name = bundle_name.into();
        debug!("Recording faulty bundle {}", bundle_name);
        self.lock().faulty.push(FaultRecord {
            bundle_name,
            package,
        });
    }

    /// Drop the fault record of the bundle at `path`
    pub fn remove_fault_by_path(&self, path: &Path) -> Option<FaultRecord> {
        let mut entries = self.lock();
        let index = entries
            .faulty
            .iter()
            .position(|f| f.package.bundle_path() == path)?;
        Some(entries.faulty.remove(index))
    }

    pub fn remove_fault(&self, bundle_name: &str) -> Option<FaultRecord> {
        let mut entries = self.lock();
        let index = entries
            .faulty
            .iter()
            .position(|f| f.bundle_name == bundle_name)?;
        Some(entries.faulty.remove(index))
    }

    /// Snapshot of fault records
    pub fn faulty_packages(&self) -> Vec<FaultRecord> {
        self.lock().faulty.clone()
    }

    pub fn faulty_names(&self) -> Vec<String> {
        self.lock()
            .faulty
            .iter()
            .map(|f| f.bundle_name.clone())
            .collect()
    }

    pub fn is_faulty(&self, bundle_name: &str) -> bool {
        self.lock().faulty.iter().any(|f| f.bundle_name == bundle_name)
    }

    pub fn faulty_len(&self) -> usize {
        self.lock().faulty.len()
    }

    /// Registered plus faulty packages, read under one lock
    pub fn total_len(&self) -> usize {
        let entries = self.lock();
        entries.completed.len() + entries.faulty.len()
    }

    /// Forget every registered and faulty package
    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.completed.clear();
        entries.faulty.clear();
    }
}

/// Claim on a package id held by one deploy pipeline
#[derive(Debug)]
pub struct Reservation<'a> {
    registry: &'a PackageRegistry,
    id: PackageId,
}

impl Reservation<'_> {
    pub fn id(&self) -> &PackageId {
        &self.id
    }

    /// Register `package` under the claimed id and release the claim
    pub fn commit(self, package: Arc<Package>) {
        debug_assert_eq!(package.id(), &self.id);
        let mut entries = self.registry.lock();
        debug!("Registering package {}", package.id());
        entries.completed.push(package);
        entries.reserved.remove(&self.id);
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.registry.lock().reserved.remove(&self.id);
    }
}
