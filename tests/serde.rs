#![cfg(feature = "serde")]

// Persisted layout through serde: [load factor, capacity, occupancy,
// [[key, value], ...]] with entries in table-then-bucket order.
use hashbrown::hash_map::DefaultHashBuilder;
use hybrid_hashmap::{HybridHashMap, HybridHashMapBuilder, Natural};

#[test]
fn round_trip_through_json() {
    let mut m: HybridHashMap<String, u32> = HybridHashMapBuilder::new()
        .load_factor(0.5)
        .build()
        .unwrap();
    for i in 0..40 {
        m.insert(format!("k{i}"), i);
    }
    let json = serde_json::to_string(&m).unwrap();
    let back: HybridHashMap<String, u32> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, m);
    assert_eq!(back.load_factor(), 0.5);
    back.check_invariants().unwrap();
}

#[test]
fn layout_is_header_then_entries_in_iteration_order() {
    let m: HybridHashMap<u8, u8> = (0..3).map(|i| (i, i * 10)).collect();
    let value = serde_json::to_value(&m).unwrap();
    let expected_entries: Vec<serde_json::Value> = m
        .iter()
        .map(|(k, v)| serde_json::json!([k, v]))
        .collect();
    assert_eq!(
        value,
        serde_json::json!([0.75, 16, 3, expected_entries])
    );
}

#[test]
fn empty_map_round_trips() {
    let m: HybridHashMap<u8, u8> = HybridHashMap::new();
    let json = serde_json::to_string(&m).unwrap();
    assert_eq!(json, "[0.75,16,0,[]]");
    let back: HybridHashMap<u8, u8> = serde_json::from_str(&json).unwrap();
    assert!(back.is_empty());
}

#[test]
fn rejects_negative_occupancy() {
    let err = serde_json::from_str::<HybridHashMap<u8, u8>>("[0.75,16,-1,[]]").unwrap_err();
    assert!(err.to_string().contains("illegal mappings count"), "{err}");
}

#[test]
fn rejects_mismatched_occupancy() {
    assert!(serde_json::from_str::<HybridHashMap<u8, u8>>("[0.75,16,2,[[1,1]]]").is_err());
    assert!(serde_json::from_str::<HybridHashMap<u8, u8>>("[0.75,16,1,[[1,1],[2,2]]]").is_err());
}

#[test]
fn rejects_illegal_load_factor() {
    let err = serde_json::from_str::<HybridHashMap<u8, u8>>("[-0.5,16,0,[]]").unwrap_err();
    assert!(err.to_string().contains("illegal load factor"), "{err}");
}

#[test]
fn oversized_occupancy_fails_after_reading_the_entries() {
    let err = serde_json::from_str::<HybridHashMap<u8, u8>>("[0.75,16,20000000,[[1,1]]]").unwrap_err();
    assert!(err.to_string().contains("invalid length 1"), "{err}");
    let err = serde_json::from_str::<HybridHashMap<u8, u8>>("[0.75,1073741824,9223372036854775807,[[1,1]]]")
        .unwrap_err();
    assert!(err.to_string().contains("invalid length 1"), "{err}");
}

#[test]
fn natural_order_map_round_trips() {
    let mut m: HybridHashMap<String, u32, DefaultHashBuilder, Natural> =
        HybridHashMapBuilder::new().natural_key_order().build().unwrap();
    for i in 0..100 {
        m.insert(format!("k{i}"), i);
    }
    let json = serde_json::to_string(&m).unwrap();
    let back: HybridHashMap<String, u32, DefaultHashBuilder, Natural> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, m);
    assert_eq!(back.get("k42"), Some(&42));
    back.check_invariants().unwrap();
}
