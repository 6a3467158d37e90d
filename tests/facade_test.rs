//! `IndexFacade` dump/load round-trips through a real file on disk.

use fuzzy_hnsw_index::external::PrefixIndex;
use fuzzy_hnsw_index::graph::GraphConfig;
use fuzzy_hnsw_index::metric::DistanceMetric;
use fuzzy_hnsw_index::persistence::MapLoader;
use fuzzy_hnsw_index::record::HashRecord;
use fuzzy_hnsw_index::IndexFacade;

#[derive(Default)]
struct RecordingPrefixIndex {
    ids: Vec<String>,
}

impl PrefixIndex for RecordingPrefixIndex {
    fn insert(&mut self, record: &HashRecord) {
        self.ids.push(record.id().to_string());
    }
}

fn tlsh(suffix: u8) -> String {
    format!("T1{:0>70}", suffix)
}

fn cfg() -> GraphConfig {
    GraphConfig::new(4, 8, 8, 16, DistanceMetric::Tlsh)
}

#[test]
fn dump_then_load_round_trips_through_a_file() {
    let mut facade = IndexFacade::with_seed(cfg(), 200, RecordingPrefixIndex::default());
    let mut loader = MapLoader::new();
    for i in 0..20u8 {
        let record = HashRecord::new(tlsh(i), DistanceMetric::Tlsh, i as u32);
        loader.insert(record.clone());
        facade.insert(record).unwrap();
    }

    let file = tempfile::NamedTempFile::new().unwrap();
    facade.dump(file.path(), false).unwrap();

    let loaded = IndexFacade::load(file.path(), DistanceMetric::Tlsh, &loader, RecordingPrefixIndex::default()).unwrap();

    assert_eq!(loaded.graph().len(), facade.graph().len());
    assert_eq!(loaded.prefix_index().ids.len(), facade.graph().len());

    let query = HashRecord::new(tlsh(3), DistanceMetric::Tlsh, 999);
    let before = facade.knn_search(&query, 3, 16).unwrap();
    let after = loaded.knn_search(&query, 3, 16).unwrap();
    let ids_before: Vec<&str> = before.iter().flat_map(|(_, g)| g.iter().map(|r| r.id())).collect();
    let ids_after: Vec<&str> = after.iter().flat_map(|(_, g)| g.iter().map(|r| r.id())).collect();
    assert_eq!(ids_before, ids_after);
}

#[test]
fn dump_then_load_round_trips_an_empty_index() {
    let facade = IndexFacade::with_seed(cfg(), 201, RecordingPrefixIndex::default());
    let loader = MapLoader::new();

    let file = tempfile::NamedTempFile::new().unwrap();
    facade.dump(file.path(), true).unwrap();

    let loaded = IndexFacade::load(file.path(), DistanceMetric::Tlsh, &loader, RecordingPrefixIndex::default()).unwrap();
    assert!(loaded.graph().is_empty());
    assert!(loaded.prefix_index().ids.is_empty());
}
