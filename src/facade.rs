//! `IndexFacade` — the crate's single composition point, wiring
//! `GraphCore` to the external prefix index and record loader.

use std::fs::File;
use std::path::Path;

use crate::error::Result;
use crate::external::{PrefixIndex, RecordLoader};
use crate::graph::{GraphConfig, GraphCore, GroupedResults};
use crate::persistence;
use crate::record::HashRecord;
use crate::metric::DistanceMetric;

pub struct IndexFacade<P: PrefixIndex> {
    graph: GraphCore,
    prefix_index: P,
}

impl<P: PrefixIndex> IndexFacade<P> {
    pub fn new(config: GraphConfig, prefix_index: P) -> Self {
        Self {
            graph: GraphCore::new(config),
            prefix_index,
        }
    }

    pub fn with_seed(config: GraphConfig, seed: u64, prefix_index: P) -> Self {
        Self {
            graph: GraphCore::with_seed(config, seed),
            prefix_index,
        }
    }

    pub fn graph(&self) -> &GraphCore {
        &self.graph
    }

    pub fn prefix_index(&self) -> &P {
        &self.prefix_index
    }

    /// `true` on success; `NodeAlreadyExists` on id collision.
    pub fn insert(&mut self, record: HashRecord) -> Result<bool> {
        self.graph.insert(record)
    }

    /// `true` on success; `NodeNotFound` / `IndexEmpty` as appropriate.
    pub fn delete(&mut self, record: &HashRecord) -> Result<bool> {
        self.graph.delete(record.id())
    }

    pub fn knn_search(&self, query: &HashRecord, k: usize, ef: usize) -> Result<GroupedResults> {
        self.graph.knn_search(query, k, ef)
    }

    pub fn threshold_search(&self, query: &HashRecord, threshold: f32, n_hops: usize) -> Result<GroupedResults> {
        self.graph.threshold_search(query, threshold, n_hops)
    }

    pub fn dump(&self, path: impl AsRef<Path>, compress: bool) -> Result<()> {
        let file = File::create(path)?;
        persistence::dump(&self.graph, file, compress)
    }

    /// Loads a snapshot, resolving page-ids through `loader`, then
    /// rebuilds `prefix_index` by iterating every record once.
    pub fn load(
        path: impl AsRef<Path>,
        metric: DistanceMetric,
        loader: &dyn RecordLoader,
        mut prefix_index: P,
    ) -> Result<Self> {
        let file = File::open(path)?;
        let graph = persistence::load(file, metric, loader)?;
        for record in graph.iter() {
            prefix_index.insert(record);
        }
        Ok(Self { graph, prefix_index })
    }
}
