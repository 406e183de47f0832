// Property-based tests for constdb

use constdb::{Reader, Writer};
use proptest::collection::{btree_map, hash_set, vec};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::io::Cursor;

fn build(records: &[(Vec<u8>, Vec<u8>)]) -> Reader<Cursor<Vec<u8>>> {
    let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
    for (key, value) in records {
        writer.put(key, value).unwrap();
    }
    writer.freeze().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_every_written_key_reads_back(
        records in btree_map(vec(any::<u8>(), 0..24), vec(any::<u8>(), 0..64), 0..200)
    ) {
        let records: Vec<_> = records.into_iter().collect();
        let reader = build(&records);

        prop_assert_eq!(reader.len(), records.len());
        for (key, value) in &records {
            let found = reader.get(key).unwrap();
            prop_assert_eq!(found.as_deref(), Some(value.as_slice()));
        }
    }

    #[test]
    fn prop_unwritten_keys_are_missing(
        keys in hash_set(vec(any::<u8>(), 1..16), 0..100),
        probes in vec(vec(any::<u8>(), 16..24), 0..50)
    ) {
        // Probe keys are longer than any written key, so never present
        let records: Vec<_> = keys.into_iter().map(|k| (k, b"v".to_vec())).collect();
        let reader = build(&records);

        for probe in &probes {
            prop_assert_eq!(reader.get(probe).unwrap(), None);
        }
    }

    #[test]
    fn prop_duplicates_all_retrievable(
        records in vec((vec(any::<u8>(), 0..4), vec(any::<u8>(), 0..8)), 0..150)
    ) {
        let reader = build(&records);

        let mut expected: BTreeMap<Vec<u8>, Vec<Vec<u8>>> = BTreeMap::new();
        for (key, value) in &records {
            expected.entry(key.clone()).or_default().push(value.clone());
        }

        for (key, values) in &expected {
            let found: Vec<Vec<u8>> =
                reader.get_all(key).unwrap().iter().map(|v| v.to_vec()).collect();
            // Equal hashes start at the same slot, so probe order is write order
            prop_assert_eq!(&found, values);
            prop_assert_eq!(reader.get(key).unwrap().map(|v| v.to_vec()), values.first().cloned());
        }
    }

    #[test]
    fn prop_iteration_matches_writes(
        records in vec((vec(any::<u8>(), 0..8), vec(any::<u8>(), 0..8)), 0..100)
    ) {
        let reader = build(&records);
        let scanned: Vec<(Vec<u8>, Vec<u8>)> = reader
            .iter()
            .map(|r| r.map(|(k, v)| (k.to_vec(), v.to_vec())))
            .collect::<constdb::Result<_>>()
            .unwrap();
        prop_assert_eq!(scanned, records);
    }
}
