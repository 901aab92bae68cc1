use crate::common::{module, patcher};
use live_patcher::{Error, Value};

const SAMPLE: &str = r#"
fn sample() -> i64 {
    1
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
fn test_context_manager() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    {
        let guard = patcher.temp_patch(&sample, PATCH).unwrap();
        assert_eq!(guard.callable().call(vec![]).unwrap(), Value::Int(9001));
    }
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(1));
}

#[test]
fn test_finish_reports_the_revert() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    let guard = patcher.temp_patch(&sample, PATCH).unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(9001));
    guard.finish().unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(1));
}

#[test]
fn test_decorator() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    let during = patcher
        .with_patch(&sample, PATCH, |patched| patched.call(vec![]).unwrap())
        .unwrap();
    assert_eq!(during, Value::Int(9001));
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(1));
}

#[test]
fn test_failed_temp_patch_changes_nothing() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    let err = patcher
        .temp_patch(&sample, "@@ -2 +2 @@\n-    2\n+    3\n")
        .err()
        .unwrap();
    assert!(matches!(err, Error::PatchApplication(_)));
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(1));
}
