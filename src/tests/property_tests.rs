//! Property-based tests using proptest.
//!
//! These verify invariants that must hold for *any* input: merge ordering,
//! propagation-on-change, counter wrap-around, exec-count rollover, and the
//! record-level persistence round trip.

use proptest::prelude::*;
use std::collections::BTreeMap;

use crate::blocks::counter::{step, TriggerPolicy};
use crate::config;
use crate::core::attribute::{
    common_configs, common_inputs, common_outputs, AttrMap, ConfigAttr, Configs, OutputAttr,
    Outputs, EXECUTE_OUT, EXEC_COUNT_MODULO,
};
use crate::core::block::BlockDefinition;
use crate::core::value::Value;
use crate::runtime::kernel::next_exec_count;
use crate::runtime::propagate::changed_outputs;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn configs_from(map: &BTreeMap<String, i64>) -> Configs {
    map.iter()
        .map(|(name, v)| ConfigAttr::new(name.as_str(), *v))
        .collect()
}

fn simple_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        "[a-z0-9_]{0,8}".prop_map(Value::Str),
        "[a-z_]{1,8}".prop_map(Value::Tag),
        Just(Value::NotActive),
        Just(Value::Empty),
        Just(Value::Null),
    ]
}

// ---------------------------------------------------------------------------
// Attribute merge properties
// ---------------------------------------------------------------------------

proptest! {
    /// Every default keeps its position; every override is present with its
    /// own value; novel override names append after the defaults.
    #[test]
    fn merge_is_ordered_and_override_wins(
        defaults in prop::collection::btree_map("[a-z]{1,4}", any::<i64>(), 0..8),
        overrides in prop::collection::btree_map("[a-z]{1,4}", any::<i64>(), 0..8),
    ) {
        let d = configs_from(&defaults);
        let o = configs_from(&overrides);
        let merged = AttrMap::merge(&d, &o);

        // defaults first, in their original order
        let merged_names = merged.names();
        let default_names = d.names();
        prop_assert_eq!(&merged_names[..default_names.len()], &default_names[..]);

        for (name, v) in &overrides {
            prop_assert_eq!(merged.value(name), Some(&Value::Int(*v)));
        }
        for (name, v) in &defaults {
            if !overrides.contains_key(name) {
                prop_assert_eq!(merged.value(name), Some(&Value::Int(*v)));
            }
        }
        prop_assert_eq!(
            merged.len(),
            defaults.len() + overrides.keys().filter(|k| !defaults.contains_key(*k)).count()
        );
    }

    /// Merging is stable: merging the result with the same overrides again
    /// changes nothing.
    #[test]
    fn merge_is_idempotent(
        defaults in prop::collection::btree_map("[a-z]{1,4}", any::<i64>(), 0..8),
        overrides in prop::collection::btree_map("[a-z]{1,4}", any::<i64>(), 0..8),
    ) {
        let d = configs_from(&defaults);
        let o = configs_from(&overrides);
        let once = AttrMap::merge(&d, &o);
        let twice = AttrMap::merge(&once, &o);
        prop_assert_eq!(once, twice);
    }
}

// ---------------------------------------------------------------------------
// Propagation-on-change properties
// ---------------------------------------------------------------------------

proptest! {
    /// Identical output sequences never produce a dataflow send.
    #[test]
    fn unchanged_outputs_produce_no_sends(values in prop::collection::vec(simple_value(), 1..8)) {
        let outputs: Outputs = values
            .iter()
            .enumerate()
            .map(|(i, v)| OutputAttr::new(format!("out{i}"), v.clone()))
            .collect();
        prop_assert!(changed_outputs(&outputs, &outputs.clone()).is_empty());
    }

    /// Exactly the mutated value outputs are listed, and `execute_out` never is.
    #[test]
    fn exactly_changed_outputs_are_listed(
        count in 1usize..6,
        flip_mask in any::<u8>(),
        flip_exec_out in any::<bool>(),
    ) {
        let mut prev: Outputs = (0..count)
            .map(|i| OutputAttr::new(format!("out{i}"), Value::Int(i as i64)))
            .collect();
        prev.add(OutputAttr::new(EXECUTE_OUT, false)).unwrap();

        let mut next = prev.clone();
        let mut expected = Vec::new();
        for i in 0..count {
            if flip_mask & (1 << i) != 0 {
                let name = format!("out{i}");
                next.set(name.as_str(), Value::Int(-(i as i64) - 1)).unwrap();
                expected.push(name);
            }
        }
        if flip_exec_out {
            next.set(EXECUTE_OUT, true).unwrap();
        }

        let changed: Vec<String> = changed_outputs(&prev, &next)
            .iter()
            .map(|o| o.name.clone())
            .collect();
        prop_assert_eq!(changed, expected);
    }
}

// ---------------------------------------------------------------------------
// Counter properties
// ---------------------------------------------------------------------------

proptest! {
    /// Whatever the input sequence, the count stays within
    /// `[initial, final]`, and carry levels only appear at the bounds.
    #[test]
    fn counter_stays_in_range(
        sequence in prop::collection::vec(any::<bool>(), 1..200),
        initial in 0i64..5,
        span in 0i64..10,
    ) {
        let final_value = initial + span;
        let mut count = initial;
        let mut last = None;
        for current in sequence {
            let (next, carry) = step(
                TriggerPolicy::AnyChange,
                last,
                current,
                count,
                initial,
                final_value,
            );
            prop_assert!(next >= initial && next <= final_value);
            match carry {
                Some(true) => prop_assert_eq!(next, final_value),
                Some(false) => prop_assert_eq!(next, initial),
                None => {}
            }
            count = next;
            last = Some(current);
        }
    }

    /// An edge policy never counts more transitions than samples, and the
    /// first sample never counts.
    #[test]
    fn first_sample_only_seeds(current in any::<bool>(), count in 0i64..100) {
        for policy in [TriggerPolicy::AnyChange, TriggerPolicy::TrueFalse, TriggerPolicy::FalseTrue] {
            let (next, carry) = step(policy, None, current, count, 0, 1_000);
            prop_assert_eq!(next, count);
            prop_assert_eq!(carry, None);
        }
    }
}

// ---------------------------------------------------------------------------
// Exec-count rollover
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn exec_count_stays_in_modulus(count in 0..EXEC_COUNT_MODULO) {
        let next = next_exec_count(count);
        prop_assert!(next >= 0 && next < EXEC_COUNT_MODULO);
        if count == EXEC_COUNT_MODULO - 1 {
            prop_assert_eq!(next, 0);
        } else {
            prop_assert_eq!(next, count + 1);
        }
    }
}

// ---------------------------------------------------------------------------
// Persistence round trip
// ---------------------------------------------------------------------------

proptest! {
    /// `parse(write(defs)) == defs` for generated definition sequences.
    #[test]
    fn config_round_trips(
        blocks in prop::collection::btree_map("[a-z]{1,6}", simple_value(), 0..5),
    ) {
        let defs: Vec<BlockDefinition> = blocks
            .iter()
            .map(|(name, extra)| {
                let mut config = common_configs(name, "toggle", "0.1.0", "");
                config.add(ConfigAttr::new("extra", extra.clone())).unwrap();
                BlockDefinition {
                    config,
                    inputs: common_inputs(),
                    outputs: common_outputs(),
                }
            })
            .collect();

        let mut buf = Vec::new();
        config::write_config(&mut buf, &defs).unwrap();
        let parsed = config::read_config(buf.as_slice()).unwrap();
        prop_assert_eq!(parsed, defs);
    }
}
