use crate::common::{module, tracked_patcher};
use live_patcher::Value;

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
fn test_repeated_patches_hit_the_cache() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let (mut patcher, backend) = tracked_patcher();

    patcher.patch(&sample, PATCH).unwrap();
    patcher.unpatch(&sample, PATCH).unwrap();
    patcher.patch(&sample, PATCH).unwrap();
    patcher.unpatch(&sample, PATCH).unwrap();

    // Only the first application reached the backend.
    assert_eq!(backend.calls.get(), 1);
    assert_eq!(patcher.applier().cache().len(), 2);
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(1));
}

#[test]
fn test_reverse_is_served_from_the_cache() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let (mut patcher, backend) = tracked_patcher();

    patcher.patch(&sample, PATCH).unwrap();
    backend.broken.set(true);

    patcher.unpatch(&sample, PATCH).unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(1));
    assert_eq!(backend.calls.get(), 1);
}

#[test]
fn test_clear_cache() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let (mut patcher, backend) = tracked_patcher();

    patcher.patch(&sample, PATCH).unwrap();
    patcher.clear_cache();
    assert!(patcher.applier().cache().is_empty());

    backend.broken.set(true);
    assert!(patcher.unpatch(&sample, PATCH).is_err());
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(9001));
    assert_eq!(backend.calls.get(), 2);
}
