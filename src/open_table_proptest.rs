#![cfg(test)]

// Property tests for OpenAddressTable kept inside the crate so they can reuse
// the test hashers from `open_table::tests`.

use crate::config::TableConfig;
use crate::error::InsertError;
use crate::open_table::tests::ConstBuildHasher;
use crate::open_table::OpenAddressTable;
use core::hash::BuildHasher;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations so shrinking moves towards earlier keys and
// shorter op lists.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    Erase(usize),
    Find(usize),
    Contains(String),
    Mutate(usize, i32),
    Reserve(usize),
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=12).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            3 => idx.clone().prop_map(Op::Erase),
            2 => idx.clone().prop_map(Op::Find),
            1 => prop_oneof![
                contains_pool.prop_map(|s: String| s),
                "[a-z]{0,4}".prop_map(|s| s)
            ]
            .prop_map(Op::Contains),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::Mutate(i, d)),
            1 => (0usize..80).prop_map(Op::Reserve),
            1 => Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn run_state_machine<S>(
    mut sut: OpenAddressTable<Key, i32, S>,
    pool: Vec<String>,
    ops: Vec<Op>,
) -> Result<(), TestCaseError>
where
    S: BuildHasher,
{
    let mut model: HashMap<Key, i32> = HashMap::new();
    for op in ops {
        match op {
            Op::Insert(i, v) => {
                let k = key_from(&pool, i);
                let already = model.contains_key(&k);
                match sut.insert(k.clone(), v) {
                    Ok(pos) => {
                        prop_assert!(!already, "insert must fail on duplicate");
                        prop_assert_eq!(sut.key_at(pos), Some(&k));
                        model.insert(k, v);
                    }
                    Err(InsertError::DuplicateKey) => {
                        prop_assert!(already, "duplicate error only when key exists");
                    }
                }
            }
            Op::Erase(i) => {
                let k = key_from(&pool, i);
                let removed = sut.remove(&k);
                let expected = model.remove(&k);
                prop_assert_eq!(removed.map(|(_, v)| v), expected);
            }
            Op::Find(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.get(&k), model.get(&k));
                prop_assert_eq!(sut.find(&k).is_some(), model.contains_key(&k));
            }
            Op::Contains(s) => {
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
                prop_assert_eq!(sut.count(s.as_str()), usize::from(has_model));
            }
            Op::Mutate(i, d) => {
                let k = key_from(&pool, i);
                if let Some(v) = sut.get_mut(&k) {
                    *v = v.wrapping_add(d);
                    let mv = model.get_mut(&k);
                    prop_assert!(mv.is_some(), "mutable hit only for live keys");
                    if let Some(mv) = mv {
                        *mv = mv.wrapping_add(d);
                    }
                } else {
                    prop_assert!(!model.contains_key(&k));
                }
            }
            Op::Reserve(n) => {
                let before = sut.capacity();
                sut.reserve(n);
                prop_assert_eq!(sut.capacity(), before.max(n));
            }
            Op::Iterate => {
                let s_keys: BTreeSet<_> = sut.keys().cloned().collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
                prop_assert_eq!(sut.iter().len(), model.len());
            }
        }

        // Post-conditions after each op
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        prop_assert!((sut.len() as f64) < sut.max_load_factor() as f64 * sut.capacity() as f64);
        if let Err(e) = sut.check_invariants() {
            prop_assert!(false, "{}", e);
        }
    }
    for (k, v) in &model {
        prop_assert_eq!(sut.get(k), Some(v));
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap.
// - Duplicate inserts are rejected; successful inserts report a position
//   holding the key.
// - A key is found iff it was inserted and not erased since, across
//   tombstones, purges, growth, and explicit `reserve`.
// - Iteration yields exactly the live keys; counters and probe chains stay
//   consistent after every op.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let sut: OpenAddressTable<Key, i32> = OpenAddressTable::with_capacity(1).unwrap();
        run_state_machine(sut, pool, ops)?;
    }
}

// Same invariants with every key on one probe chain.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let sut: OpenAddressTable<Key, i32, ConstBuildHasher> =
            OpenAddressTable::with_capacity_and_hasher(2, ConstBuildHasher).unwrap();
        run_state_machine(sut, pool, ops)?;
    }
}

// Same invariants across the allowed range of load factors.
proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_any_load_factor(
        lf in 0.05f32..=1.0f32,
        cap in 1usize..16,
        (pool, ops) in arb_scenario(),
    ) {
        let cfg = TableConfig { initial_capacity: cap, max_load_factor: lf };
        let sut: OpenAddressTable<Key, i32> = OpenAddressTable::with_config(cfg).unwrap();
        run_state_machine(sut, pool, ops)?;
    }
}
