use formstate_core::access;
use formstate_core::{FieldPath, Segment};
use proptest::prelude::*;
use serde_json::{Value, json};

fn segment() -> impl Strategy<Value = Segment> {
    prop_oneof![
        "[a-z]{1,5}".prop_map(Segment::Key),
        (0usize..4).prop_map(Segment::Index),
    ]
}

fn path() -> impl Strategy<Value = FieldPath> {
    prop::collection::vec(segment(), 1..5).prop_map(FieldPath::from_segments)
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i32>().prop_map(Value::from),
        "[ -~]{0,8}".prop_map(Value::from),
    ]
}

proptest! {
    #[test]
    fn read_after_write(path in path(), value in scalar()) {
        let mut document = json!({});
        prop_assert!(access::set(&mut document, &path, value.clone()));
        prop_assert_eq!(access::get(&document, &path), Some(&value));
    }

    #[test]
    fn writes_under_distinct_roots_do_not_interfere(
        left in path(),
        right in path(),
        a in scalar(),
        b in scalar(),
    ) {
        let left = FieldPath::from_segments(
            std::iter::once(Segment::Key("left".into())).chain(left.segments().iter().cloned()).collect(),
        );
        let right = FieldPath::from_segments(
            std::iter::once(Segment::Key("right".into())).chain(right.segments().iter().cloned()).collect(),
        );
        let mut document = json!({});
        access::set(&mut document, &left, a.clone());
        access::set(&mut document, &right, b.clone());
        prop_assert_eq!(access::get(&document, &left), Some(&a));
        prop_assert_eq!(access::get(&document, &right), Some(&b));
    }

    #[test]
    fn writing_back_a_read_value_changes_nothing(paths in prop::collection::vec(path(), 1..4), value in scalar()) {
        let mut document = json!({});
        for path in &paths {
            access::set(&mut document, path, value.clone());
        }
        let before = document.clone();
        for path in paths.iter().chain(access::leaf_paths(&before).iter()) {
            if let Some(current) = access::get(&document, path).cloned() {
                access::set(&mut document, path, current);
            }
        }
        prop_assert_eq!(document, before);
    }

    #[test]
    fn every_leaf_path_resolves(path in path(), value in scalar()) {
        let mut document = json!({});
        access::set(&mut document, &path, value);
        for leaf in access::leaf_paths(&document) {
            prop_assert!(access::resolves(&document, &leaf), "{leaf} does not resolve");
        }
    }
}

#[test]
fn writing_through_a_scalar_leaves_document_untouched() {
    let mut document = json!({"name": "Ada"});
    let path = FieldPath::parse("name.first").unwrap();
    assert!(!access::set(&mut document, &path, json!("x")));
    assert_eq!(document, json!({"name": "Ada"}));
}
