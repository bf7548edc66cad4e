use echo_rs::timeframe::{Timeframe, TimeframeError};

mod common;

use common::peer::{feed_key, tf};

#[test]
fn create_rejects_duplicate_keys() {
    let k1 = feed_key(1);
    assert_eq!(
        Timeframe::create([(k1, 1), (k1, 2)]),
        Err(TimeframeError::DuplicateKey(k1))
    );
    assert!(Timeframe::create(Vec::new()).unwrap().is_empty());
}

#[test]
fn merge_takes_pointwise_maximum() {
    let (k1, k2) = (feed_key(1), feed_key(2));

    let merged = Timeframe::merge([&tf(&[(k1, 2)]), &tf(&[(k1, 1), (k2, 1)])]);

    assert_eq!(merged, tf(&[(k1, 2), (k2, 1)]));
    assert_eq!(Timeframe::merge(Vec::<&Timeframe>::new()), Timeframe::new());
}

#[test]
fn merge_is_idempotent_commutative_and_associative() {
    let (k1, k2, k3) = (feed_key(1), feed_key(2), feed_key(3));
    let a = tf(&[(k1, 4), (k2, 0)]);
    let b = tf(&[(k2, 3), (k3, 1)]);
    let c = tf(&[(k1, 1), (k3, 7)]);

    assert_eq!(Timeframe::merge([&a, &a]), a);
    assert_eq!(Timeframe::merge([&a, &b]), Timeframe::merge([&b, &a]));
    assert_eq!(
        Timeframe::merge([&Timeframe::merge([&a, &b]), &c]),
        Timeframe::merge([&a, &Timeframe::merge([&b, &c])])
    );
}

#[test]
fn dependencies_are_entries_not_yet_covered() {
    let (k1, k2, k3) = (feed_key(1), feed_key(2), feed_key(3));

    // Equal seqs leave nothing to wait for.
    assert!(Timeframe::dependencies(&tf(&[(k1, 5)]), &tf(&[(k1, 5)])).is_empty());

    // An absent key counts as -1, so even seq 0 remains a dependency.
    let a = tf(&[(k1, 3), (k2, 0), (k3, 2)]);
    let b = tf(&[(k1, 3), (k3, 1)]);
    assert_eq!(Timeframe::dependencies(&a, &b), tf(&[(k2, 0), (k3, 2)]));

    assert!(Timeframe::dependencies(&a, &a).is_empty());
}

#[test]
fn dependencies_are_satisfied_by_the_merge() {
    let (k1, k2, k3) = (feed_key(1), feed_key(2), feed_key(3));
    let a = tf(&[(k1, 3), (k2, 0)]);
    let b = tf(&[(k2, 5), (k3, 1)]);

    let deps = Timeframe::dependencies(&a, &b);

    assert!(deps.is_satisfied_by(&Timeframe::merge([&a, &b])));
}

#[test]
fn seq_zero_is_not_satisfied_by_absence() {
    let (k1, k2) = (feed_key(1), feed_key(2));
    let required = tf(&[(k1, 0)]);

    assert!(!required.is_satisfied_by(&Timeframe::new()));
    assert!(!required.is_satisfied_by(&tf(&[(k2, 9)])));
    assert!(required.is_satisfied_by(&tf(&[(k1, 0)])));
    assert!(Timeframe::new().is_satisfied_by(&Timeframe::new()));
}

#[test]
fn remove_keys_and_with_return_new_values() {
    let (k1, k2) = (feed_key(1), feed_key(2));
    let a = tf(&[(k1, 3), (k2, 1)]);

    assert_eq!(a.remove_keys([&k2]), tf(&[(k1, 3)]));
    assert_eq!(a.with(k1, 1), a);
    assert_eq!(a.with(k2, 4), tf(&[(k1, 3), (k2, 4)]));
    // The original is untouched.
    assert_eq!(a, tf(&[(k1, 3), (k2, 1)]));
}

#[test]
fn total_blocks_counts_consumed_blocks() {
    let (k1, k2) = (feed_key(1), feed_key(2));

    assert_eq!(Timeframe::new().total_blocks(), 0);
    assert_eq!(tf(&[(k1, 0)]).total_blocks(), 1);
    assert_eq!(tf(&[(k1, 3), (k2, 1)]).total_blocks(), 6);
}

#[test]
fn display_lists_entries_in_key_order() {
    let (k1, k2) = (feed_key(1), feed_key(2));

    assert_eq!(Timeframe::new().to_string(), "()");
    assert_eq!(
        tf(&[(k2, 0), (k1, 2)]).to_string(),
        format!("({}:2, {}:0)", k1, k2)
    );
}
