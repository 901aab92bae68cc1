use crate::common::{module, patcher};
use live_patcher::runtime::eval::call_method;
use live_patcher::{Error, Value};

const SAMPLE: &str = r#"
fn sample() -> i64 {
    1
}
"#;

#[test]
fn test_replace_substring() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    patcher
        .replace_substring(&sample, Some("1"), "9001", None)
        .unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(9001));
}

#[test]
fn test_replace_substring_indented_text() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    patcher
        .replace_substring(
            &sample,
            Some("            1\n        "),
            "            42\n        ",
            Some(1),
        )
        .unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(42));
    assert_eq!(
        patcher.source_of(&sample).unwrap(),
        "fn sample() -> i64 {\n    42\n}\n"
    );
}

#[test]
fn test_replace_substring_twice() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    patcher
        .replace_substring(&sample, Some("    1"), "    2", Some(1))
        .unwrap();
    patcher
        .replace_substring(&sample, Some("    2"), "    3", Some(1))
        .unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(3));
}

#[test]
fn test_replace_substring_every_occurrence() {
    let module = module(
        r#"
fn sample() -> i64 {
    let a = 2;
    let b = 2;
    a * b
}
"#,
    );
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    patcher
        .replace_substring(&sample, Some("= 2;"), "= 5;", Some(2))
        .unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(25));
}

#[test]
fn test_replace_substring_instancemethod() {
    let module = module(
        r#"
struct Artist;

impl Artist {
    fn new() -> Self {
        Self {}
    }

    fn method(&self) -> String {
        "Chalk".to_string()
    }
}
"#,
    );
    let artist = module.call("Artist.new", vec![]).unwrap();
    let method = module.callable("Artist.method").unwrap();
    let mut patcher = patcher();

    patcher
        .replace_substring(&method, Some("Chalk"), "Cheese", None)
        .unwrap();
    assert_eq!(
        call_method(&artist, "method", vec![]).unwrap(),
        Value::str("Cheese")
    );
}

#[test]
fn test_replace_substring_unexpected_source() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    let err = patcher
        .replace_substring(&sample, Some("    2"), "    3", None)
        .unwrap_err();
    assert!(matches!(err, Error::NotFoundInSource { .. }));
    assert_eq!(err.to_string(), "'2' not found in the source of 'sample'");

    let err = patcher
        .replace_substring(&sample, Some("sample"), "example", Some(2))
        .unwrap_err();
    assert_eq!(err.to_string(), "2 occurrences of 'sample' expected, 1 found.");

    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(1));
    assert!(!patcher.registry().contains(&sample));
}

#[test]
fn test_replace_substring_no_expected_source() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    patcher
        .replace_substring(&sample, None, "fn sample() -> i64 { 42 }", None)
        .unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(42));
}
