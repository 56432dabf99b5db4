//! Processing order across pending bundles
//!
//! Ordering metadata is all-or-nothing: the order is computed only when
//! every bundle file in the repository carries a `descriptor.yaml`.
//! Otherwise, and whenever the metadata cannot be turned into an order,
//! bundles are processed in lexical order.
//!
//! ## Algorithm
//!
//! Bundles are nodes of a directed graph with an edge from each dependency
//! to its dependent. Kahn's algorithm emits them, always picking the ready
//! bundle with the smallest `(order, file name)`; a missing `order` sorts
//! after every explicit one.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use keel_core::types::{DeployerConfig, OrderingDescriptor, ORDERING_DESCRIPTOR_FILE};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use tracing::{debug, warn};

use crate::archive;
use crate::error::OrderingError;

/// A bundle and its ordering metadata
#[derive(Debug, Clone)]
pub struct BundleOrdering {
    /// Bundle file name
    pub bundle: String,
    pub descriptor: OrderingDescriptor,
}

/// Which repository bundles carry ordering metadata
#[derive(Debug, Default)]
pub struct OrderingCensus {
    /// Every bundle file in the repository, sorted
    pub bundles: Vec<PathBuf>,
    pub described: Vec<BundleOrdering>,
    /// Bundle file names without a descriptor
    pub missing: Vec<String>,
    /// Descriptors that exist but could not be read or parsed
    pub errors: Vec<OrderingError>,
}

impl OrderingCensus {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.errors.is_empty() && !self.described.is_empty()
    }
}

/// Computes the order in which pending bundles are deployed
#[derive(Debug, Clone)]
pub struct ProcessingOrderResolver {
    repository_dir: PathBuf,
    bundle_extension: String,
}

impl ProcessingOrderResolver {
    pub fn new(repository_dir: impl Into<PathBuf>, bundle_extension: impl Into<String>) -> Self {
        Self {
            repository_dir: repository_dir.into(),
            bundle_extension: bundle_extension.into(),
        }
    }

    pub fn from_config(config: &DeployerConfig) -> Self {
        Self::new(
            config.repository_dir.as_std_path(),
            config.bundle_extension.clone(),
        )
    }

    /// Sort `pending[start..end]` in place into processing order. An
    /// invalid range leaves the list untouched.
    pub fn sort(&self, pending: &mut [PathBuf], start: usize, end: usize) {
        if start > end || end > pending.len() {
            warn!(
                "Ignoring sort request for invalid range {}..{} of {} bundles",
                start,
                end,
                pending.len()
            );
            return;
        }
        let range = &mut pending[start..end];

        let census = match self.census() {
            Ok(census) => census,
            Err(e) => {
                warn!(
                    "Could not read repository {}: {}. Using lexical order",
                    self.repository_dir.display(),
                    e
                );
                sort_lexically(range);
                return;
            }
        };

        if census.described.is_empty() && census.errors.is_empty() {
            debug!("No ordering descriptors found, using lexical order");
            sort_lexically(range);
            return;
        }
        if !census.is_complete() {
            for error in &census.errors {
                warn!("{}", error);
            }
            if !census.missing.is_empty() {
                warn!(
                    "Ordering descriptors missing for {}. Using lexical order for all bundles",
                    census.missing.join(", ")
                );
            }
            sort_lexically(range);
            return;
        }

        match Self::processing_order(&census.described) {
            Ok(order) => {
                let index: HashMap<&str, usize> = order
                    .iter()
                    .enumerate()
                    .map(|(i, name)| (name.as_str(), i))
                    .collect();
                range.sort_by_key(|path| {
                    file_name(path)
                        .and_then(|name| index.get(name.as_str()).copied())
                        .unwrap_or(usize::MAX)
                });
                debug!("Sorted {} bundles by processing order", range.len());
            }
            Err(e) => {
                warn!("{}. Using lexical order", e);
                sort_lexically(range);
            }
        }
    }

    /// Every repository bundle in processing order
    pub fn repository_order(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut bundles = self.bundle_files()?;
        let len = bundles.len();
        self.sort(&mut bundles, 0, len);
        Ok(bundles)
    }

    /// Read the ordering descriptor of every bundle file in the repository
    pub fn census(&self) -> std::io::Result<OrderingCensus> {
        let mut census = OrderingCensus {
            bundles: self.bundle_files()?,
            ..OrderingCensus::default()
        };

        for path in &census.bundles {
            let Some(bundle) = file_name(path) else {
                continue;
            };
            match read_descriptor(path, &bundle) {
                Ok(Some(descriptor)) => census.described.push(BundleOrdering { bundle, descriptor }),
                Ok(None) => census.missing.push(bundle),
                Err(e) => census.errors.push(e),
            }
        }
        Ok(census)
    }

    /// Bundle files in the repository directory, sorted
    pub fn bundle_files(&self) -> std::io::Result<Vec<PathBuf>> {
        if !self.repository_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.repository_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(self.bundle_extension.as_str()) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Order bundles so every bundle follows the bundles it depends on.
    /// Returns bundle file names.
    pub fn processing_order(bundles: &[BundleOrdering]) -> Result<Vec<String>, OrderingError> {
        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let mut by_id: HashMap<&str, NodeIndex> = HashMap::new();

        for (i, entry) in bundles.iter().enumerate() {
            let node = graph.add_node(i);
            if let Some(previous) = by_id.insert(entry.descriptor.id.as_str(), node) {
                return Err(OrderingError::DuplicateId {
                    id: entry.descriptor.id.clone(),
                    first: bundles[graph[previous]].bundle.clone(),
                    second: entry.bundle.clone(),
                });
            }
        }

        for (i, entry) in bundles.iter().enumerate() {
            let dependent = NodeIndex::new(i);
            for dep in &entry.descriptor.dependencies {
                let Some(&dependency) = by_id.get(dep.id.as_str()) else {
                    return Err(OrderingError::UnknownDependency {
                        bundle: entry.bundle.clone(),
                        id: dep.id.clone(),
                    });
                };
                graph.add_edge(dependency, dependent, ());
            }
        }

        let key = |node: NodeIndex| {
            let entry = &bundles[graph[node]];
            Reverse((
                entry.descriptor.order.unwrap_or(u32::MAX),
                entry.bundle.clone(),
                node.index(),
            ))
        };

        let mut in_degree: Vec<usize> = graph
            .node_indices()
            .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();
        let mut ready: BinaryHeap<_> = graph
            .node_indices()
            .filter(|n| in_degree[n.index()] == 0)
            .map(key)
            .collect();

        let mut order = Vec::with_capacity(bundles.len());
        while let Some(Reverse((_, bundle, index))) = ready.pop() {
            order.push(bundle);
            for next in graph.neighbors_directed(NodeIndex::new(index), Direction::Outgoing) {
                in_degree[next.index()] -= 1;
                if in_degree[next.index()] == 0 {
                    ready.push(key(next));
                }
            }
        }

        if order.len() < bundles.len() {
            let mut remaining: Vec<String> = graph
                .node_indices()
                .filter(|n| in_degree[n.index()] > 0)
                .map(|n| bundles[graph[n]].bundle.clone())
                .collect();
            remaining.sort();
            return Err(OrderingError::Cycle { bundles: remaining });
        }

        Ok(order)
    }
}

fn read_descriptor(path: &Path, bundle: &str) -> Result<Option<OrderingDescriptor>, OrderingError> {
    let content = archive::read_entry(path, ORDERING_DESCRIPTOR_FILE).map_err(|source| {
        OrderingError::Descriptor {
            bundle: bundle.to_string(),
            source,
        }
    })?;
    let Some(content) = content else {
        return Ok(None);
    };
    OrderingDescriptor::from_yaml(&content, bundle)
        .map(Some)
        .map_err(|e| OrderingError::Descriptor {
            bundle: bundle.to_string(),
            source: e.into(),
        })
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

fn sort_lexically(range: &mut [PathBuf]) {
    range.sort_by(|a, b| file_name(a).cmp(&file_name(b)).then_with(|| a.cmp(b)));
}
