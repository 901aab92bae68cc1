use crate::common::{module, patcher};
use live_patcher::runtime::eval::call_method;
use live_patcher::{CompileError, Error, Value};

const SAMPLE: &str = r#"
fn sample() -> i64 {
    1
}
"#;

#[test]
fn test_replace() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    patcher
        .replace(
            &sample,
            Some(
                "
                fn sample() -> i64 {
                    1
                }
                ",
            ),
            "
            fn sample() -> i64 {
                42
            }
            ",
        )
        .unwrap();

    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(42));
    assert_eq!(
        patcher.source_of(&sample).unwrap(),
        "\nfn sample() -> i64 {\n    42\n}\n"
    );
}

#[test]
fn test_replace_only_cares_about_ast() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    patcher
        .replace(
            &sample,
            Some("fn sample() -> i64 { /* just the value */ 1 }"),
            "fn sample() -> i64 { 42 }",
        )
        .unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(42));
}

#[test]
fn test_replace_twice() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    patcher
        .replace(&sample, Some("fn sample() -> i64 { 1 }"), "fn sample() -> i64 { 2 }")
        .unwrap();
    patcher
        .replace(&sample, Some("fn sample() -> i64 { 2 }"), "fn sample() -> i64 { 3 }")
        .unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(3));
}

#[test]
fn test_replace_instancemethod() {
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
        .replace(
            &method,
            Some(
                r#"
                fn method(&self) -> String {
                    "Chalk".to_string()
                }
                "#,
            ),
            r#"
            fn method(&self) -> String {
                "Cheese".to_string()
            }
            "#,
        )
        .unwrap();

    assert_eq!(
        call_method(&artist, "method", vec![]).unwrap(),
        Value::str("Cheese")
    );
}

#[test]
fn test_replace_unexpected_source() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    let err = patcher
        .replace(
            &sample,
            Some(
                "
                fn sample() -> i64 {
                    2
                }
                ",
            ),
            "fn sample() -> i64 { 42 }",
        )
        .unwrap_err();

    assert!(matches!(err, Error::SourceMismatch { .. }));
    assert_eq!(
        err.to_string(),
        "The code of 'sample' has changed from expected.\n\
         The current code is:\n\
         fn sample() -> i64 {\n    1\n}\n\n\
         The expected code is:\n\
         \nfn sample() -> i64 {\n    2\n}\n"
    );
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(1));
}

#[test]
fn test_replace_no_expected_source() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    patcher
        .replace(&sample, None, "fn sample() -> i64 { 42 }")
        .unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(42));
}

#[test]
fn test_replace_with_renamed_function() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    let err = patcher
        .replace(&sample, None, "fn other() -> i64 { 5 }")
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Syntax(CompileError::NameMismatch { .. })
    ));
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(1));
    assert!(!patcher.registry().contains(&sample));
}

#[test]
fn test_replace_keeps_instances_working() {
    let module = module(
        r#"
struct Counter;

impl Counter {
    fn new() -> Self {
        Self { count: 0 }
    }

    fn bump(&mut self) -> i64 {
        self.count += 1;
        self.count
    }
}
"#,
    );
    let mut counter = module.call("Counter.new", vec![]).unwrap();
    assert_eq!(call_method(&counter, "bump", vec![]).unwrap(), Value::Int(1));
    let bump = module.callable("Counter.bump").unwrap();
    let mut patcher = patcher();

    patcher
        .replace(
            &bump,
            None,
            "fn bump(&mut self) -> i64 {\n    self.count += 10;\n    self.count\n}\n",
        )
        .unwrap();
    assert_eq!(call_method(&counter, "bump", vec![]).unwrap(), Value::Int(11));
    counter = module.call("Counter.new", vec![]).unwrap();
    assert_eq!(call_method(&counter, "bump", vec![]).unwrap(), Value::Int(10));
}
