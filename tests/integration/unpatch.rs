use crate::common::{module, patcher};
use live_patcher::{Direction, Error, PatchError, Value};

const SAMPLE: &str = r#"
fn sample() -> i64 {
    9001
}
"#;

const PATCH: &str = r#"
    @@ -1,3 +1,3 @@
     fn sample() -> i64 {
    -    1
    +    9001
     }
"#;

#[test]
fn test_unpatch() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    patcher.unpatch(&sample, PATCH).unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(1));
}

#[test]
fn test_patch_then_unpatch_is_a_no_op() {
    let module = module(
        r#"
fn sample() -> i64 {
    // unchanged by a round trip
    1
}
"#,
    );
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();
    let original = patcher.source_of(&sample).unwrap();
    let patch = r#"
        @@ -1,4 +1,4 @@
         fn sample() -> i64 {
             // unchanged by a round trip
        -    1
        +    9001
         }
    "#;

    patcher.patch(&sample, patch).unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(9001));

    patcher.unpatch(&sample, patch).unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(1));
    assert_eq!(patcher.source_of(&sample).unwrap(), original);
}

#[test]
fn test_unpatch_invalid_unreversed() {
    let module = module(
        r#"
fn sample() -> i64 {
    1
}
"#,
    );
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    // Never applied, so there is nothing to take back.
    let err = patcher.unpatch(&sample, PATCH).unwrap_err();
    let Error::PatchApplication(failure) = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(failure.direction(), Direction::Reverse);
    assert!(err
        .to_string()
        .starts_with("Could not unapply the patch from 'sample'."));
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(1));
}

#[test]
fn test_unpatch_invalid_hunk() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    let err = patcher
        .unpatch(
            &sample,
            r#"
            @@ -1,3 +1,3 @@
             fn sample() -> i64 {
            -    1
            +    23
             }
            "#,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::PatchApplication(PatchError::Rejected {
            direction: Direction::Reverse,
            ..
        })
    ));
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(9001));
}
