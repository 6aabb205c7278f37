use std::process::{Command, Output};

use serde_json::Value;

use stepgraph_core::{Edge, GraphDefinition, Node};
use stepgraph_test_utils::{tick_loop_graph, write_graph_file};

fn stepgraph(args: &[&str]) -> Output {
    let cwd = tempfile::tempdir().expect("create temp dir");
    Command::new(env!("CARGO_BIN_EXE_stepgraph"))
        .args(args)
        .current_dir(cwd.path())
        .env_remove("STEPGRAPH_CONFIG")
        .env("RUST_LOG", "off")
        .output()
        .expect("spawn stepgraph")
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn test_validate_accepts_good_graph() {
    let (_dir, path) = write_graph_file(&tick_loop_graph(3, 5));
    let out = stepgraph(&["validate", path.to_str().unwrap()]);

    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Graph 'tick_loop' is valid (1 nodes, 0 edges, 1 loops)"));
}

#[test]
fn test_validate_lists_every_problem() {
    let graph = GraphDefinition::new("broken", "nowhere")
        .with_node(Node::new("a", "noop"))
        .with_edge(Edge::always("a", "ghost"));
    let (_dir, path) = write_graph_file(&graph);
    let out = stepgraph(&["validate", path.to_str().unwrap()]);

    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("2 problem(s)"));
    assert!(stderr.contains("Entry node 'nowhere' not found in nodes"));
    assert!(stderr.contains("Edge target 'ghost' not found in nodes"));
}

#[test]
fn test_run_prints_outcome() {
    let (_dir, path) = write_graph_file(&tick_loop_graph(3, 5));
    let out = stepgraph(&["run", path.to_str().unwrap(), "--state", r#"{"label":"x"}"#]);

    assert!(out.status.success());
    let outcome = stdout_json(&out);
    assert_eq!(outcome["status"], "completed");
    assert_eq!(outcome["final_state"]["ticks"], 3);
    assert_eq!(outcome["final_state"]["label"], "x");
    assert_eq!(outcome["execution_log"].as_array().unwrap().len(), 3);
}

#[test]
fn test_run_exits_nonzero_on_loop_limit() {
    let (_dir, path) = write_graph_file(&tick_loop_graph(100, 2));
    let out = stepgraph(&["run", path.to_str().unwrap()]);

    assert!(!out.status.success());
    let outcome = stdout_json(&out);
    assert_eq!(outcome["status"], "failed");
    assert_eq!(
        outcome["error"],
        "Loop limit exceeded at node 'count': max 2 iterations"
    );
}

#[test]
fn test_run_rejects_non_object_state() {
    let (_dir, path) = write_graph_file(&tick_loop_graph(3, 5));
    let out = stepgraph(&["run", path.to_str().unwrap(), "--state", "[1,2]"]);

    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("must be a JSON object"));
}

#[test]
fn test_config_prints_defaults() {
    let out = stepgraph(&["config"]);

    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("bind = \"127.0.0.1:8000\""));
}

#[test]
fn test_explicit_missing_config_fails() {
    let out = stepgraph(&["--config", "/nonexistent/stepgraph.toml", "config"]);
    assert!(!out.status.success());
}
