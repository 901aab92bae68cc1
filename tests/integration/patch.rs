use crate::common::{module, patcher};
use live_patcher::diff::command::is_available;
use live_patcher::diff::InvalidPatch;
use live_patcher::runtime::eval::{call_method, get_attribute};
use live_patcher::{
    Callable, CompileError, Error, PatchCommand, PatchError, Patcher, PatcherConfig, Value,
};
use std::path::Path;

const SAMPLE: &str = r#"
fn sample() -> i64 {
    1
}
"#;

const TO_9001: &str = r#"
    @@ -1,3 +1,3 @@
     fn sample() -> i64 {
    -    1
    +    9001
     }
"#;

#[test]
fn test_patch() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    patcher.patch(&sample, TO_9001).unwrap();

    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(9001));
    // The module namespace holds the very same function.
    assert_eq!(module.call("sample", vec![]).unwrap(), Value::Int(9001));
}

#[test]
fn test_patch_with_command_backend() {
    if !is_available(Path::new("patch")) {
        eprintln!("skipping: `patch` is not installed");
        return;
    }
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = Patcher::with_backend(&PatcherConfig::default(), Box::new(PatchCommand::default()));

    patcher.patch(&sample, TO_9001).unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(9001));

    patcher.unpatch(&sample, TO_9001).unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(1));
}

#[test]
fn test_patch_simple_no_newline() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    patcher
        .patch(&sample, "@@ -2 +2 @@\n-    1\n+    9001")
        .unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(9001));
}

#[test]
fn test_patch_invalid() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    let err = patcher.patch(&sample, "this is not a patch").unwrap_err();
    match &err {
        Error::PatchApplication(PatchError::Invalid { reason, .. }) => {
            assert_eq!(*reason, InvalidPatch::NoHunks)
        }
        other => panic!("unexpected error: {other}"),
    }
    let message = err.to_string();
    assert!(message.starts_with("Could not apply the patch to 'sample'."));
    assert!(message.contains("The code to patch was:\nfn sample() -> i64 {\n    1\n}\n"));
    assert!(message.contains("The patch was:\nthis is not a patch"));

    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(1));
}

#[test]
fn test_patch_invalid_hunk() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    let err = patcher
        .patch(
            &sample,
            r#"
            @@ -1,3 +1,3 @@
             fn sample() -> i64 {
            -    2
            +    23
             }
            "#,
        )
        .unwrap_err();

    let Error::PatchApplication(failure) = &err else {
        panic!("unexpected error: {err}");
    };
    let (stdout, _) = failure.diagnostics().unwrap();
    assert!(stdout.contains("Hunk #1 FAILED"));
    assert!(err.to_string().contains("The message from `patch` was:"));
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(1));
    assert!(!patcher.registry().contains(&sample));
}

#[test]
fn test_patch_invalid_hunk_2() {
    let module = module(
        r#"
fn sample() -> i64 {
    let a = 1;
    let b = 2;
    let c = 3;
    let d = 4;
    a + b + c + d
}
"#,
    );
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    // The first hunk would apply; the second cannot, so neither does.
    let err = patcher
        .patch(
            &sample,
            r#"
            @@ -2,1 +2,1 @@
            -    let a = 1;
            +    let a = 10;
            @@ -6,2 +6,2 @@
            -    let e = 5;
            +    let e = 50;
             }
            "#,
        )
        .unwrap_err();
    assert!(matches!(err, Error::PatchApplication(PatchError::Rejected { .. })));
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(10));
}

#[test]
fn test_patch_twice() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    patcher.patch(&sample, TO_9001).unwrap();
    patcher
        .patch(
            &sample,
            r#"
            @@ -1,3 +1,3 @@
             fn sample() -> i64 {
            -    9001
            +    9002
             }
            "#,
        )
        .unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(9002));
}

const ARTIST: &str = r#"
struct Artist;

impl Artist {
    fn new() -> Self {
        Self { prop: "old".to_string() }
    }

    fn method(&self) -> String {
        "Chalk".to_string()
    }

    fn __mangled_name(&self, v: String) -> String {
        v + " on toast"
    }

    fn toast(&self) -> String {
        self.__mangled_name("Beans".to_string())
    }

    fn sample() -> i64 {
        1
    }
}
"#;

#[test]
fn test_patch_instancemethod() {
    let module = module(ARTIST);
    let artist = module.call("Artist.new", vec![]).unwrap();
    let method = module.callable("Artist.method").unwrap();
    let mut patcher = patcher();

    patcher
        .patch(
            &method,
            r#"
            @@ -1,3 +1,3 @@
             fn method(&self) -> String {
            -    "Chalk".to_string()
            +    "Cheese".to_string()
             }
            "#,
        )
        .unwrap();

    // An instance created before the patch sees the new code too.
    assert_eq!(call_method(&artist, "method", vec![]).unwrap(), Value::str("Cheese"));
}

#[test]
fn test_patch_bound_method() {
    let module = module(ARTIST);
    let artist = module.call("Artist.new", vec![]).unwrap();
    let bound = Callable::from_value(&get_attribute(&artist, "method").unwrap()).unwrap();
    let mut patcher = patcher();

    patcher
        .patch(
            &bound,
            r#"
            @@ -2,1 +2,1 @@
            -    "Chalk".to_string()
            +    "Crayon".to_string()
            "#,
        )
        .unwrap();

    assert_eq!(bound.call(vec![]).unwrap(), Value::str("Crayon"));
    let fresh = module.call("Artist.new", vec![]).unwrap();
    assert_eq!(call_method(&fresh, "method", vec![]).unwrap(), Value::str("Crayon"));
}

#[test]
fn test_patch_instancemethod_mangled() {
    let module = module(ARTIST);
    let artist = module.call("Artist.new", vec![]).unwrap();
    let toast = module.callable("Artist.toast").unwrap();
    let mut patcher = patcher();

    patcher
        .patch(
            &toast,
            r#"
            @@ -1,3 +1,3 @@
             fn toast(&self) -> String {
            -    self.__mangled_name("Beans".to_string())
            +    self.__mangled_name("Avocado".to_string())
             }
            "#,
        )
        .unwrap();

    assert_eq!(
        call_method(&artist, "toast", vec![]).unwrap(),
        Value::str("Avocado on toast")
    );
}

#[test]
fn test_patch_mangled_method_itself() {
    let module = module(ARTIST);
    let artist = module.call("Artist.new", vec![]).unwrap();
    let mangled = module.callable("Artist._Artist__mangled_name").unwrap();
    let mut patcher = patcher();

    patcher
        .patch(
            &mangled,
            r#"
            @@ -1,3 +1,3 @@
             fn __mangled_name(&self, v: String) -> String {
            -    v + " on toast"
            +    v + " on rye"
             }
            "#,
        )
        .unwrap();

    assert_eq!(
        call_method(&artist, "toast", vec![]).unwrap(),
        Value::str("Beans on rye")
    );
}

#[test]
fn test_patch_init() {
    let module = module(ARTIST);
    let new = module.callable("Artist.new").unwrap();
    let mut patcher = patcher();

    patcher
        .patch(
            &new,
            r#"
            @@ -2,1 +2,1 @@
            -    Self { prop: "old".to_string() }
            +    Self { prop: "new".to_string() }
            "#,
        )
        .unwrap();

    let artist = module.call("Artist.new", vec![]).unwrap();
    assert_eq!(get_attribute(&artist, "prop").unwrap(), Value::str("new"));
}

#[test]
fn test_patch_staticmethod_twice() {
    let module = module(ARTIST);
    let sample = module.callable("Artist.sample").unwrap();
    let mut patcher = patcher();

    patcher
        .patch(&sample, "@@ -2 +2 @@\n-    1\n+    2\n")
        .unwrap();
    patcher
        .patch(&sample, "@@ -2 +2 @@\n-    2\n+    3\n")
        .unwrap();
    assert_eq!(module.call("Artist.sample", vec![]).unwrap(), Value::Int(3));
}

#[test]
fn test_patch_freevars() {
    let module = module(
        r#"
fn make() -> i64 {
    fn free_func(v: String) -> String {
        v + " on toast"
    }

    fn sample() -> String {
        free_func("Salmon".to_string())
    }

    sample
}
"#,
    );
    let sample = Callable::from_value(&module.call("make", vec![]).unwrap()).unwrap();
    assert_eq!(sample.qualname(), "make.<locals>.sample");
    let mut patcher = patcher();

    patcher
        .patch(
            &sample,
            r#"
            @@ -1,3 +1,3 @@
             fn sample() -> String {
            -    free_func("Salmon".to_string())
            +    free_func("Avocado".to_string())
             }
            "#,
        )
        .unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::str("Avocado on toast"));
}

const TWO_FREEVARS: &str = r#"
fn make() -> i64 {
    let tricky = 1;
    let good = 2;

    fn sample() -> i64 {
        tricky + good
    }

    sample
}
"#;

#[test]
fn test_patch_freevars_order() {
    let module = module(TWO_FREEVARS);
    let sample = Callable::from_value(&module.call("make", vec![]).unwrap()).unwrap();
    let mut patcher = patcher();

    patcher
        .patch(
            &sample,
            r#"
            @@ -1,3 +1,3 @@
             fn sample() -> i64 {
            -    tricky + good
            +    good * 10 + tricky
             }
            "#,
        )
        .unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(21));
}

#[test]
fn test_patch_freevars_remove() {
    let module = module(TWO_FREEVARS);
    let sample = Callable::from_value(&module.call("make", vec![]).unwrap()).unwrap();
    let mut patcher = patcher();

    patcher
        .patch(
            &sample,
            r#"
            @@ -1,3 +1,3 @@
             fn sample() -> i64 {
            -    tricky + good
            +    good
             }
            "#,
        )
        .unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(2));
    assert_eq!(sample.underlying().closure_names(), vec!["good", "tricky"]);
}

#[test]
fn test_patch_instancemethod_mangled_freevars() {
    let module = module(
        r#"
fn make(base: i64) -> i64 {
    struct Counter;

    impl Counter {
        fn __offset(&self) -> i64 {
            base
        }

        fn value(&self) -> i64 {
            self.__offset() + base
        }
    }

    Counter {}
}
"#,
    );
    let counter = module.call("make", vec![Value::Int(10)]).unwrap();
    let value = Callable::from_value(&get_attribute(&counter, "value").unwrap()).unwrap();
    assert_eq!(value.call(vec![]).unwrap(), Value::Int(20));
    let mut patcher = patcher();

    patcher
        .patch(
            &value,
            r#"
            @@ -1,3 +1,3 @@
             fn value(&self) -> i64 {
            -    self.__offset() + base
            +    self.__offset() + base * 2
             }
            "#,
        )
        .unwrap();
    assert_eq!(call_method(&counter, "value", vec![]).unwrap(), Value::Int(30));
}

#[test]
fn test_patch_recursive_module_level() {
    let module = module(
        r#"
fn factorial(n: i64) -> i64 {
    if n == 1 {
        return 1;
    } else {
        return n * factorial(n - 1);
    }
}
"#,
    );
    let factorial = module.callable("factorial").unwrap();
    assert_eq!(factorial.call(vec![Value::Int(10)]).unwrap(), Value::Int(3628800));
    let mut patcher = patcher();

    patcher
        .patch(
            &factorial,
            r#"
            @@ -2,5 +2,5 @@
            -    if n == 1 {
            -        return 1;
            -    } else {
            -        return n * factorial(n - 1);
            -    }
            +    if n <= 1 {
            +        return n;
            +    } else {
            +        return factorial(n - 1) + factorial(n - 2);
            +    }
            "#,
        )
        .unwrap();

    assert_eq!(factorial.call(vec![Value::Int(10)]).unwrap(), Value::Int(55));
}

#[test]
fn test_patch_nonlocal() {
    let module = module(
        r#"
const VARIAB: i64 = 20;

fn get_function() -> i64 {
    let variab = 15;

    fn sample() -> i64 {
        let multiple = 3;
        variab * multiple
    }

    sample
}
"#,
    );
    let sample = Callable::from_value(&module.call("get_function", vec![]).unwrap()).unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(15 * 3));
    let mut patcher = patcher();

    patcher
        .patch(
            &sample,
            r#"
            @@ -2,2 +2,2 @@
            -    let multiple = 3;
            +    let multiple = 4;
                 variab * multiple
            "#,
        )
        .unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(15 * 4));
}

#[test]
fn test_patch_nonlocal_fails() {
    let module = module(SAMPLE);
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    let err = patcher
        .patch(
            &sample,
            r#"
            @@ -1,3 +1,4 @@
             fn sample() -> i64 {
            +    total = 2;
                 1
             }
            "#,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Syntax(CompileError::NonlocalUnbound { ref name, .. }) if name == "total"
    ));
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(1));
}

#[test]
fn test_patch_feature_flags() {
    let module = module(
        r#"#![feature(true_division)]

fn sample() -> f64 {
    1 / 2
}
"#,
    );
    let sample = module.callable("sample").unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Float(0.5));
    let mut patcher = patcher();

    patcher
        .patch(&sample, "@@ -2 +2 @@\n-    1 / 2\n+    1 / 4\n")
        .unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Float(0.25));
}

#[test]
fn test_patch_feature_flags_do_not_leak() {
    let module = module(
        r#"
fn sample() -> i64 {
    1 / 2
}
"#,
    );
    let sample = module.callable("sample").unwrap();
    let mut patcher = patcher();

    patcher
        .patch(&sample, "@@ -2 +2 @@\n-    1 / 2\n+    3 / 2\n")
        .unwrap();
    assert_eq!(sample.call(vec![]).unwrap(), Value::Int(1));
}
