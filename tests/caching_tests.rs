//! Caching correctness over full invocations
//!
//! The second invocation of an unchanged workspace must be served entirely
//! from cache; a one-byte leaf edit must recompile exactly the leaf and
//! its ancestors.

mod fixtures;

use fixtures::{patterns, Workspace};
use packlane::cache::ArtifactCache;
use packlane::ident::PackageIdent;
use packlane::mock::{MockCompiler, MockLinker};
use packlane::pipeline::Pipeline;
use packlane::platform::PlatformPair;
use packlane::summary::BuildReport;

fn build(ws: &Workspace, seeds: &[&str], compiler: &MockCompiler) -> BuildReport {
    let linker = MockLinker::new();
    let mut pipeline = Pipeline::new(ws.pipeline_config());
    pipeline
        .build_with(&patterns(seeds), compiler, &linker)
        .unwrap()
}

#[test]
fn test_chain_scenario_cold_then_warm() {
    let ws = Workspace::new();
    ws.add_package("a", "a", &["b"]);
    ws.add_package("b", "b", &["c"]);
    ws.add_package("c", "c", &[]);

    // Cold build: order c, b, a, three compiler invocations
    let cold_compiler = MockCompiler::new();
    let cold = build(&ws, &["a"], &cold_compiler);
    assert!(cold.succeeded());

    let cold_calls = cold_compiler.calls();
    let calls: Vec<&str> = cold_calls.iter().map(|i| i.as_str()).collect();
    assert_eq!(calls, vec!["c", "b", "a"]);

    // Three cache entries exist afterwards
    let cache = ArtifactCache::new(ws.cache_dir());
    for ident in ["a", "b", "c"] {
        let entries = cache.entries(&PackageIdent::parse(ident).unwrap()).unwrap();
        assert_eq!(entries.len(), 1, "one entry for {}", ident);
    }

    // Warm build: zero compiler invocations, identical artifact handles
    let warm_compiler = MockCompiler::new();
    let warm = build(&ws, &["a"], &warm_compiler);
    assert!(warm.succeeded());
    assert!(warm_compiler.calls().is_empty());

    for (cold_node, warm_node) in cold.nodes.iter().zip(warm.nodes.iter()) {
        assert_eq!(cold_node.ident, warm_node.ident);
        assert_eq!(cold_node.fingerprint, warm_node.fingerprint);
        assert_eq!(warm_node.cached, Some(true));
    }
}

#[test]
fn test_leaf_edit_recompiles_ancestors_only() {
    let ws = Workspace::new();
    ws.add_package("app", "app", &["lib"]);
    ws.add_package("lib", "lib", &["leaf"]);
    ws.add_package("leaf", "leaf", &[]);
    ws.add_package("bystander", "bystander", &[]);

    let cold_compiler = MockCompiler::new();
    build(&ws, &["app", "bystander"], &cold_compiler);
    assert_eq!(cold_compiler.calls().len(), 4);

    // One changed byte in the leaf
    ws.edit_source("leaf", "lib.pk", "package leaf\n\nbody!\n");

    let warm_compiler = MockCompiler::new();
    let report = build(&ws, &["app", "bystander"], &warm_compiler);
    assert!(report.succeeded());

    let warm_calls = warm_compiler.calls();
    let recompiled: Vec<&str> = warm_calls.iter().map(|i| i.as_str()).collect();
    assert_eq!(recompiled.len(), 3);
    assert!(recompiled.contains(&"leaf"));
    assert!(recompiled.contains(&"lib"));
    assert!(recompiled.contains(&"app"));
    assert!(!recompiled.contains(&"bystander"));
}

#[test]
fn test_fingerprints_roll_up_through_ancestors() {
    let ws = Workspace::new();
    ws.add_package("app", "app", &["leaf"]);
    ws.add_package("leaf", "leaf", &[]);

    let before_compiler = MockCompiler::new();
    let before = build(&ws, &["app"], &before_compiler);

    ws.edit_source("leaf", "lib.pk", "package leaf\n\nchanged\n");

    let after_compiler = MockCompiler::new();
    let after = build(&ws, &["app"], &after_compiler);

    let fp = |report: &BuildReport, ident: &str| {
        report
            .nodes
            .iter()
            .find(|n| n.ident.as_str() == ident)
            .unwrap()
            .fingerprint
            .clone()
            .unwrap()
    };

    assert_ne!(fp(&before, "leaf"), fp(&after, "leaf"));
    assert_ne!(fp(&before, "app"), fp(&after, "app"));
}

#[test]
fn test_platform_pairs_get_distinct_cache_entries() {
    let ws = Workspace::new();
    ws.add_package("lib", "lib", &[]);

    let linker = MockLinker::new();

    for platform in ["linux/amd64", "darwin/arm64"] {
        let compiler = MockCompiler::new();
        let mut config = ws.pipeline_config();
        config.platform = Some(platform.parse::<PlatformPair>().unwrap());
        let mut pipeline = Pipeline::new(config);
        let report = pipeline
            .build_with(&patterns(&["lib"]), &compiler, &linker)
            .unwrap();
        assert!(report.succeeded());
        assert_eq!(compiler.calls().len(), 1, "cold for {}", platform);
    }

    let cache = ArtifactCache::new(ws.cache_dir());
    let entries = cache.entries(&PackageIdent::parse("lib").unwrap()).unwrap();
    assert_eq!(entries.len(), 2);
}

#[test]
fn test_excluded_platform_file_never_invalidates() {
    let ws = Workspace::new();
    ws.add_package("lib", "lib", &[]);
    ws.add_source("lib", "extra_darwin.pk", "package lib\n\ndarwin only\n");

    let cold_compiler = MockCompiler::new();
    build(&ws, &["lib"], &cold_compiler);
    assert_eq!(cold_compiler.calls().len(), 1);

    // Editing a file excluded for linux/amd64 leaves the fingerprint alone
    ws.edit_source("lib", "extra_darwin.pk", "package lib\n\nstill darwin\n");

    let warm_compiler = MockCompiler::new();
    let report = build(&ws, &["lib"], &warm_compiler);
    assert!(warm_compiler.calls().is_empty());
    assert_eq!(report.nodes[0].cached, Some(true));
}

#[test]
fn test_directive_excluded_file_never_invalidates() {
    let ws = Workspace::new();
    ws.add_package("lib", "lib", &[]);
    ws.add_source(
        "lib",
        "win.pk",
        "//pk:build windows\npackage lib\n\nwindows only\n",
    );

    let cold_compiler = MockCompiler::new();
    build(&ws, &["lib"], &cold_compiler);

    ws.edit_source(
        "lib",
        "win.pk",
        "//pk:build windows\npackage lib\n\nedited\n",
    );

    let warm_compiler = MockCompiler::new();
    build(&ws, &["lib"], &warm_compiler);
    assert!(warm_compiler.calls().is_empty());
}
