// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::borrow::Borrow;
use std::collections::HashMap;

// --- define_id! macro tests ---

crate::define_id! {
    /// Test ID type for macro verification.
    pub struct ProbeId;
}

#[test]
fn define_id_new_and_as_str() {
    let id = ProbeId::new("abc");
    assert_eq!(id.as_str(), "abc");
}

#[test]
fn define_id_random_is_unique() {
    let a = ProbeId::random();
    let b = ProbeId::random();
    assert_ne!(a, b);
    assert_eq!(a.as_str().len(), 36);
}

#[test]
fn define_id_display() {
    let id = ProbeId::new("hello");
    assert_eq!(format!("{}", id), "hello");
    assert_eq!(id.to_string(), "hello");
}

#[test]
fn define_id_from_string_and_str() {
    let owned: ProbeId = String::from("owned").into();
    let borrowed: ProbeId = "borrowed".into();
    assert_eq!(owned.as_str(), "owned");
    assert_eq!(borrowed.as_str(), "borrowed");
}

#[test]
fn define_id_partial_eq_str() {
    let id = ProbeId::new("test");
    assert_eq!(id, *"test");
    assert_eq!(id, "test");
}

#[test]
fn define_id_hash_map_lookup_via_borrow() {
    let mut map = HashMap::new();
    map.insert(ProbeId::new("k"), 42);
    assert_eq!(map.get("k"), Some(&42));
    let id = ProbeId::new("k");
    let borrowed: &str = id.borrow();
    assert_eq!(borrowed, "k");
}

#[test]
fn define_id_serde_roundtrip() {
    let id = ProbeId::new("serde-test");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"serde-test\"");
    let back: ProbeId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[yare::parameterized(
    truncates      = { "abcdefghijklmnop", 8, "abcdefgh" },
    shorter_intact = { "abc",              8, "abc" },
    exact_intact   = { "abcdefgh",         8, "abcdefgh" },
)]
fn define_id_short(input: &str, n: usize, expected: &str) {
    assert_eq!(ProbeId::new(input).short(n), expected);
}

// --- IdGen tests ---

#[test]
fn uuid_gen_creates_unique_ids() {
    let id_gen = UuidIdGen;
    let id1 = id_gen.next();
    let id2 = id_gen.next();
    assert_ne!(id1, id2);
    assert_eq!(id1.len(), 36); // UUID format
}

#[test]
fn sequential_gen_creates_predictable_ids() {
    let id_gen = SequentialIdGen::new("test");
    assert_eq!(id_gen.next(), "test-1");
    assert_eq!(id_gen.next(), "test-2");
}

#[test]
fn sequential_gen_is_cloneable_and_shared() {
    let id_gen1 = SequentialIdGen::new("shared");
    let id_gen2 = id_gen1.clone();
    assert_eq!(id_gen1.next(), "shared-1");
    assert_eq!(id_gen2.next(), "shared-2");
    assert_eq!(id_gen1.next(), "shared-3");
}
