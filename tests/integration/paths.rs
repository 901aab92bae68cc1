use crate::common::patcher;
use live_patcher::runtime::eval::call_method;
use live_patcher::{Error, ModuleResolver, ResolveError, Value};
use std::fs;
use tempfile::TempDir;

const PATCH: &str = r#"
    @@ -2,1 +2,1 @@
    -    1
    +    2
"#;

fn package() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("patch_by_path_pkg")).unwrap();
    fs::write(dir.path().join("patch_by_path_pkg/mod.rs"), "").unwrap();
    fs::write(
        dir.path().join("patch_by_path_pkg/shapes.rs"),
        r#"struct Foo;

impl Foo {
    fn new() -> Self {
        Self {}
    }

    fn sample(&self) -> i64 {
        1
    }
}
"#,
    )
    .unwrap();
    dir
}

#[test]
fn test_patch_by_path() {
    let dir = package();
    let resolver = ModuleResolver::load_dir(dir.path()).unwrap();
    let mut patcher = patcher().with_resolver(resolver);

    patcher
        .patch("patch_by_path_pkg.shapes.Foo.sample", PATCH)
        .unwrap();

    let new = patcher.resolve("patch_by_path_pkg.shapes.Foo.new").unwrap();
    let foo = new.call(vec![]).unwrap();
    assert_eq!(call_method(&foo, "sample", vec![]).unwrap(), Value::Int(2));
}

#[test]
fn test_patch_by_path_already_resolved() {
    let dir = package();
    let resolver = ModuleResolver::load_dir(dir.path()).unwrap();
    let mut patcher = patcher().with_resolver(resolver);

    let foo = patcher
        .resolve("patch_by_path_pkg.shapes.Foo.new")
        .unwrap()
        .call(vec![])
        .unwrap();
    assert_eq!(call_method(&foo, "sample", vec![]).unwrap(), Value::Int(1));

    patcher
        .patch("patch_by_path_pkg.shapes.Foo.sample", PATCH)
        .unwrap();
    assert_eq!(call_method(&foo, "sample", vec![]).unwrap(), Value::Int(2));
}

#[test]
fn test_replace_substring_by_path() {
    let dir = package();
    let resolver = ModuleResolver::load_dir(dir.path()).unwrap();
    let mut patcher = patcher().with_resolver(resolver);

    patcher
        .replace_substring("patch_by_path_pkg.shapes.Foo.sample", Some("1"), "7", Some(1))
        .unwrap();
    let source = patcher
        .source_of("patch_by_path_pkg.shapes.Foo.sample")
        .unwrap();
    assert_eq!(source, "fn sample(&self) -> i64 {\n    7\n}\n");
}

#[test]
fn test_unknown_path() {
    let dir = package();
    let resolver = ModuleResolver::load_dir(dir.path()).unwrap();
    let mut patcher = patcher().with_resolver(resolver);

    let err = patcher
        .patch("patch_by_path_pkg.shapes.Foo.smaple", PATCH)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Resolution(ResolveError::UnknownAttribute { .. })
    ));
    assert!(err.to_string().contains("did you mean 'Foo.sample'?"));
}
