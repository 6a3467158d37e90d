//! Named-interface-only external collaborators. Neither is implemented by
//! this crate: the record store and the prefix index live outside its
//! scope, and `IndexFacade` only needs their trait boundary.

use crate::error::Result;
use crate::metric::DistanceMetric;
use crate::record::HashRecord;

/// Resolves a persisted page-id back into a [`HashRecord`] during
/// [`crate::persistence::load`]. Implementations typically wrap a
/// record-store / database lookup.
pub trait RecordLoader {
    /// Fetch the record addressed by `page_id`. Must populate `id`,
    /// `page_id` and `metric`; `layer` and neighbor sets are filled in by
    /// the Serializer from the file after this returns.
    fn fetch(&self, page_id: u32, metric: DistanceMetric) -> Result<HashRecord>;
}

/// An auxiliary exact-match index rebuilt from a populated graph after
/// load. Opaque to this crate beyond the single rebuild contract.
pub trait PrefixIndex {
    /// Called once per record in the graph, in arbitrary order, to
    /// repopulate the index after a snapshot is loaded.
    fn insert(&mut self, record: &HashRecord);
}
