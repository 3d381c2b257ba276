//! Integration tests for `define()` and AMD-style `require`.

use cordon_lua::error::{REASON_EXPORTS_AFTER_DEFINE, REASON_EXPORTS_AND_RETURN};
use cordon_lua::{Loader, LoaderError, LoaderOptions};
use cordon_runtime::fs::MemoryFileSystem;
use mlua::{Table, Value};

fn loader_with(fs: MemoryFileSystem) -> Loader {
    Loader::new(LoaderOptions::new().with_file_system(fs).without_console()).expect("loader")
}

fn table(value: Value) -> Table {
    match value {
        Value::Table(t) => t,
        other => panic!("expected table, got {}", other.type_name()),
    }
}

// ─── Factories ─────────────────────────────────────────────────────

#[test]
fn factory_fills_exports() {
    let fs = MemoryFileSystem::new("/pkg").with_module(
        "m",
        "define(function(require, exports, module) exports.v = 1 end)",
    );
    let loader = loader_with(fs);

    let m = table(loader.require("m").expect("m"));
    assert_eq!(m.get::<i64>("v").expect("v"), 1);
}

#[test]
fn implicit_dependencies_follow_factory_arity() {
    let fs = MemoryFileSystem::new("/pkg")
        .with_module(
            "user",
            "define(function(require, exports, module)\n  local dep = require('dep')\n  exports.value = dep.value + 1\n  exports.id = module.id\nend)",
        )
        .with_module("dep", "exports.value = 41");
    let loader = loader_with(fs);

    let user = table(loader.require("user").expect("user"));
    assert_eq!(user.get::<i64>("value").expect("value"), 42);
    assert_eq!(user.get::<String>("id").expect("id"), "user");
    // loaded once as a scanned dependency, once by the factory itself
    assert_eq!(loader.access_count("dep"), 2);
}

#[test]
fn commented_requires_are_not_dependencies() {
    let fs = MemoryFileSystem::new("/pkg").with_module(
        "m",
        "define(function(require, exports)\n  -- require('missing')\n  exports.ok = true\nend)",
    );
    let loader = loader_with(fs);

    let m = table(loader.require("m").expect("comment is ignored"));
    assert!(m.get::<bool>("ok").expect("ok"));
}

#[test]
fn explicit_dependencies_are_passed_in_order() {
    let fs = MemoryFileSystem::new("/pkg")
        .with_module(
            "sum",
            "define({'a', 'b'}, function(a, b) return { total = a.v + b.v } end)",
        )
        .with_module("a", "exports.v = 1")
        .with_module("b", "exports.v = 2");
    let loader = loader_with(fs);

    let sum = table(loader.require("sum").expect("sum"));
    assert_eq!(sum.get::<i64>("total").expect("total"), 3);
}

#[test]
fn named_define_matching_its_module() {
    let fs = MemoryFileSystem::new("/pkg").with_module(
        "named",
        "define('named', {}, function() return { ok = true } end)",
    );
    let loader = loader_with(fs);

    let named = table(loader.require("named").expect("named"));
    assert!(named.get::<bool>("ok").expect("ok"));
}

#[test]
fn literal_define_sets_exports() {
    let fs = MemoryFileSystem::new("/pkg").with_module("lit", "define({ answer = 42 })");
    let loader = loader_with(fs);

    let lit = table(loader.require("lit").expect("lit"));
    assert_eq!(lit.get::<i64>("answer").expect("answer"), 42);
}

// ─── Misuse ────────────────────────────────────────────────────────

#[test]
fn second_define_is_rejected() {
    let fs = MemoryFileSystem::new("/pkg")
        .with_module("dupe", "define(function() end)\ndefine(function() end)");
    let loader = loader_with(fs);

    let err = loader.require("dupe").expect_err("dupe");
    assert!(matches!(err, LoaderError::DefineMisuse { .. }), "got {err:?}");
    assert!(err
        .to_string()
        .contains("only one call to define() allowed per file"));
}

#[test]
fn mismatched_name_is_rejected() {
    let fs = MemoryFileSystem::new("/pkg")
        .with_module("m", "define('other', function() return 1 end)");
    let loader = loader_with(fs);

    let err = loader.require("m").expect_err("mismatch");
    assert!(matches!(err, LoaderError::DefineMisuse { .. }), "got {err:?}");
    assert!(err.to_string().contains("mismatched define()"), "got {err}");
}

#[test]
fn exports_and_return_conflict() {
    let fs = MemoryFileSystem::new("/pkg").with_module(
        "both",
        "define(function(require, exports) exports.a = 1 return 5 end)",
    );
    let loader = loader_with(fs);

    match loader.require("both").expect_err("conflict") {
        LoaderError::ConventionConflict { reason, .. } => {
            assert_eq!(reason, REASON_EXPORTS_AND_RETURN);
        }
        other => panic!("expected ConventionConflict, got {other:?}"),
    }
}

#[test]
fn set_exports_after_define_conflicts() {
    let fs = MemoryFileSystem::new("/pkg").with_module(
        "late",
        "define(function() return 1 end)\nmodule.setExports({})",
    );
    let loader = loader_with(fs);

    match loader.require("late").expect_err("conflict") {
        LoaderError::ConventionConflict { reason, path } => {
            assert_eq!(reason, REASON_EXPORTS_AFTER_DEFINE);
            assert_eq!(path, "/pkg/late.lua");
        }
        other => panic!("expected ConventionConflict, got {other:?}"),
    }
    assert!(!loader.is_cached("late"));
}

#[test]
fn returning_after_a_cycle_is_unsafe() {
    let fs = MemoryFileSystem::new("/pkg")
        .with_module(
            "a",
            "define(function(require) local b = require('b') return { name = 'a' } end)",
        )
        .with_module("b", "local a = require('a')\nexports.saw = a");
    let loader = loader_with(fs);

    match loader.require("a").expect_err("unsafe") {
        LoaderError::UnsafeRedefinition { path } => assert_eq!(path, "a"),
        other => panic!("expected UnsafeRedefinition, got {other:?}"),
    }
}

#[test]
fn define_without_factory_is_invalid() {
    let fs = MemoryFileSystem::new("/pkg").with_module("empty", "define()");
    let loader = loader_with(fs);

    let err = loader.require("empty").expect_err("invalid");
    assert!(matches!(err, LoaderError::InvalidArgument { function: "define", .. }), "got {err:?}");
}

// ─── AMD require ───────────────────────────────────────────────────

#[test]
fn lua_require_with_callback() {
    let fs = MemoryFileSystem::new("/pkg")
        .with_module("a", "exports.v = 1")
        .with_module("b", "exports.v = 2");
    let loader = loader_with(fs);

    let value = loader
        .run_script("return require({'a', 'b'}, function(a, b) return a.v + b.v end)")
        .expect("script");
    assert_eq!(value, Value::Integer(3));
}

#[test]
fn host_require_async() {
    let fs = MemoryFileSystem::new("/pkg")
        .with_module("a", "exports.v = 10")
        .with_module("b", "exports.v = 5");
    let loader = loader_with(fs);

    let callback = loader
        .lua()
        .create_function(|_, (a, b): (Table, Table)| {
            Ok(a.get::<i64>("v")? - b.get::<i64>("v")?)
        })
        .expect("callback");
    let value = loader.require_async(&["a", "b"], callback).expect("async");
    assert_eq!(value, Value::Integer(5));
}

#[test]
fn require_async_stops_at_first_missing_dependency() {
    let fs = MemoryFileSystem::new("/pkg").with_module("a", "exports.v = 1");
    let loader = loader_with(fs);

    let callback = loader
        .lua()
        .create_function(|_, ()| Ok(()))
        .expect("callback");
    let err = loader
        .require_async(&["a", "missing"], callback)
        .expect_err("missing");
    assert!(matches!(err, LoaderError::NotFound { ref id, .. } if id == "missing"));
}

#[test]
fn require_rejects_non_string_ids() {
    let loader = loader_with(MemoryFileSystem::new("/pkg"));
    let err = loader.run_script("require(5)").expect_err("invalid");
    assert!(matches!(err, LoaderError::InvalidArgument { function: "require", .. }), "got {err:?}");
}
