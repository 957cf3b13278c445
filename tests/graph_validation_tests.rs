//! Graph construction and visibility validation through the pipeline
//!
//! Structural errors (cycles, restricted imports) must abort before any
//! compilation starts, carrying the offending identifiers.

mod fixtures;

use fixtures::{patterns, Workspace};
use packlane::graph::GraphError;
use packlane::mock::{MockCompiler, MockLinker};
use packlane::pipeline::{Pipeline, PipelineError};
use packlane::visibility::VisibilityError;

#[test]
fn test_check_counts_graph_shape() {
    let ws = Workspace::new();
    ws.add_source("acme/cmd/tool", "main.pk", &fixtures::main_source(&["acme/lib"]));
    ws.add_package("acme/lib", "lib", &["acme/base"]);
    ws.add_package("acme/base", "base", &[]);

    let mut pipeline = Pipeline::new(ws.pipeline_config());
    let summary = pipeline.check(&patterns(&["acme/cmd/tool"])).unwrap();

    assert_eq!(summary.packages, 3);
    assert_eq!(summary.edges, 2);
    assert_eq!(summary.commands, 1);
}

#[test]
fn test_cycle_is_reported_with_path_and_nothing_is_compiled() {
    let ws = Workspace::new();
    ws.add_package("a", "a", &["b"]);
    ws.add_package("b", "b", &["c"]);
    ws.add_package("c", "c", &["a"]);

    let compiler = MockCompiler::new();
    let linker = MockLinker::new();

    let mut pipeline = Pipeline::new(ws.pipeline_config());
    let err = pipeline
        .build_with(&patterns(&["a"]), &compiler, &linker)
        .unwrap_err();

    match err {
        PipelineError::Graph(GraphError::CycleDetected(cycle)) => {
            let strs: Vec<&str> = cycle.iter().map(|i| i.as_str()).collect();
            assert_eq!(strs, vec!["a", "b", "c", "a"]);
        }
        other => panic!("expected cycle, got {:?}", other),
    }

    assert!(compiler.calls().is_empty(), "no compilation may start");
    assert_eq!(
        PipelineError::Graph(GraphError::CycleDetected(vec![])).exit_code(),
        20
    );
}

#[test]
fn test_restricted_import_inside_subtree_builds() {
    let ws = Workspace::new();
    ws.add_package("x/z", "z", &["x/internal/y"]);
    ws.add_package("x/internal/y", "y", &[]);

    let compiler = MockCompiler::new();
    let linker = MockLinker::new();

    let mut pipeline = Pipeline::new(ws.pipeline_config());
    let report = pipeline
        .build_with(&patterns(&["x/z"]), &compiler, &linker)
        .unwrap();

    assert!(report.succeeded());
    assert_eq!(compiler.calls().len(), 2);
}

#[test]
fn test_restricted_import_outside_subtree_aborts() {
    let ws = Workspace::new();
    ws.add_package("w", "w", &["x/internal/y"]);
    ws.add_package("x/internal/y", "y", &[]);

    let compiler = MockCompiler::new();
    let linker = MockLinker::new();

    let mut pipeline = Pipeline::new(ws.pipeline_config());
    let err = pipeline
        .build_with(&patterns(&["w"]), &compiler, &linker)
        .unwrap_err();

    match &err {
        PipelineError::Visibility(VisibilityError::RestrictedImport { importer, imported }) => {
            assert_eq!(importer.as_str(), "w");
            assert_eq!(imported.as_str(), "x/internal/y");
        }
        other => panic!("expected restricted import, got {:?}", other),
    }
    assert_eq!(err.exit_code(), 21);
    assert!(compiler.calls().is_empty(), "no compilation may start");
}

#[test]
fn test_restricted_enforcement_at_two_depths() {
    let ws = Workspace::new();
    ws.add_package("a/b/internal/deep", "deep", &[]);
    ws.add_package("a/b/sibling", "sibling", &["a/b/internal/deep"]);
    ws.add_package("a/outsider", "outsider", &["a/b/internal/deep"]);

    let compiler = MockCompiler::new();
    let linker = MockLinker::new();

    let mut pipeline = Pipeline::new(ws.pipeline_config());
    assert!(pipeline
        .build_with(&patterns(&["a/b/sibling"]), &compiler, &linker)
        .unwrap()
        .succeeded());

    let mut pipeline = Pipeline::new(ws.pipeline_config());
    let err = pipeline
        .build_with(&patterns(&["a/outsider"]), &compiler, &linker)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Visibility(_)));
}

#[test]
fn test_short_name_collision_across_roots_of_graph() {
    let ws = Workspace::new();
    ws.add_package("app", "app", &["acme/util", "vendor/util"]);
    ws.add_package("acme/util", "util", &[]);
    ws.add_package("vendor/util", "util", &[]);

    let mut pipeline = Pipeline::new(ws.pipeline_config());
    let summary = pipeline.check(&patterns(&["app"])).unwrap();

    // Identifiers, not short names, key the graph
    assert_eq!(summary.packages, 3);
}

#[test]
fn test_unknown_pattern_aborts_with_not_found() {
    let ws = Workspace::new();
    ws.add_package("present", "present", &[]);

    let mut pipeline = Pipeline::new(ws.pipeline_config());
    let err = pipeline.check(&patterns(&["absent"])).unwrap_err();
    assert!(matches!(err, PipelineError::Resolve(_)));
}
