//! End-to-end tests for the compilation pipeline.
//!
//! Each test writes a graph document the way the editor serializes it,
//! loads it through `ProgramGraph::from_json`, compiles it with
//! `tracegraph_codegen::compile()`, and checks the program text.
//!
//! Tests cover:
//! - Value lowering and the binding-sharing rule
//! - `let` vs `let*` groups
//! - Flow sequencing and sibling spans
//! - Nested span flattening
//! - `if`/`cond` lowering with value and control branches
//! - Span containment feeding the compiler
//! - Configuration and error reporting

use serde_json::{json, Value};

use tracegraph_codegen::{
    compile, compile_document, compile_to_ir, CodegenError, CompileOptions, Expr, SpanOp,
    SpanTemplates,
};
use tracegraph_core::{apply_new_span, CoreError, GraphDocument, NewSpan, NodeId, ProgramGraph};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn literal(id: u32, value: Value) -> Value {
    json!({ "id": id, "kind": "literal", "value": value })
}

fn call(id: u32, name: &str) -> Value {
    json!({ "id": id, "kind": "call", "name": name })
}

fn effect(id: u32, name: &str) -> Value {
    json!({ "id": id, "kind": "call", "name": name, "hasOutput": false })
}

fn node(id: u32, kind: &str) -> Value {
    json!({ "id": id, "kind": kind })
}

fn span(id: u32, name: &str, wrapped: &[u32]) -> Value {
    json!({ "id": id, "kind": "span", "name": name, "wrappedNodeIds": wrapped })
}

fn within(mut node: Value, parent: u32) -> Value {
    node["parentId"] = json!(parent);
    node
}

fn data(id: u32, source: u32, target: u32, handle: &str) -> Value {
    json!({
        "id": id, "source": source, "target": target,
        "sourceHandle": "value", "targetHandle": handle, "kind": "data"
    })
}

fn control(id: u32, source: u32, target: u32, handle: &str) -> Value {
    json!({
        "id": id, "source": source, "target": target,
        "sourceHandle": "value", "targetHandle": handle, "kind": "control"
    })
}

fn flow(id: u32, source: u32, target: u32) -> Value {
    json!({
        "id": id, "source": source, "target": target,
        "sourceHandle": "flow-out", "targetHandle": "flow-in", "kind": "flow"
    })
}

fn document(nodes: Vec<Value>, edges: Vec<Value>) -> String {
    json!({ "nodes": nodes, "edges": edges }).to_string()
}

fn compile_json(json: &str) -> Result<String, CodegenError> {
    let graph = ProgramGraph::from_json(json)?;
    compile(&graph, &CompileOptions::default())
}

fn compile_ok(nodes: Vec<Value>, edges: Vec<Value>) -> String {
    compile_json(&document(nodes, edges)).expect("compilation should succeed")
}

// ---------------------------------------------------------------------------
// Value lowering
// ---------------------------------------------------------------------------

#[test]
fn nested_calls_inline_single_use_values() {
    let out = compile_ok(
        vec![
            literal(1, json!(1)),
            literal(2, json!(2)),
            call(3, "+"),
            call(4, "display"),
        ],
        vec![
            data(1, 1, 3, "arg-0"),
            data(2, 2, 3, "arg-1"),
            data(3, 3, 4, "arg-0"),
        ],
    );
    assert_eq!(out, "(display (+ 1 2))");
}

#[test]
fn shared_literal_is_bound_once() {
    let out = compile_ok(
        vec![literal(1, json!(5)), call(2, "f"), call(3, "g")],
        vec![data(1, 1, 2, "arg-0"), data(2, 1, 3, "arg-0")],
    );
    insta::assert_snapshot!(out, @r###"
    (let ((p-1 5)) (begin (f p-1)
    (g p-1)))
    "###);
}

#[test]
fn dependent_shared_values_use_let_star() {
    // p-1 feeds p-2, and both are shared by h.
    let out = compile_ok(
        vec![call(1, "read"), call(2, "f"), call(3, "g"), call(4, "h")],
        vec![
            data(1, 1, 2, "arg-0"),
            data(2, 1, 4, "arg-0"),
            data(3, 2, 3, "arg-0"),
            data(4, 2, 4, "arg-1"),
        ],
    );
    insta::assert_snapshot!(out, @r###"
    (let* ((p-1 (read)) (p-2 (f p-1))) (begin (g p-2)
    (h p-1 p-2)))
    "###);
}

#[test]
fn two_digit_argument_indices_sort_numerically() {
    let mut nodes: Vec<Value> = (0..12).map(|i| literal(i, json!(i))).collect();
    nodes.push(call(100, "list"));
    let edges = (0..12)
        .map(|i| data(i, i, 100, &format!("arg-{}", i)))
        .collect();
    let out = compile_ok(nodes, edges);
    assert_eq!(out, "(list 0 1 2 3 4 5 6 7 8 9 10 11)");
}

#[test]
fn string_and_boolean_literals() {
    let out = compile_ok(
        vec![
            literal(1, json!("say \"hi\"")),
            literal(2, json!(false)),
            literal(3, json!(2.5)),
            call(4, "log"),
        ],
        vec![
            data(1, 1, 4, "arg-0"),
            data(2, 2, 4, "arg-1"),
            data(3, 3, 4, "arg-2"),
        ],
    );
    assert_eq!(out, r#"(log "say \"hi\"" #f 2.5)"#);
}

// ---------------------------------------------------------------------------
// Flow sequencing
// ---------------------------------------------------------------------------

#[test]
fn flow_chain_becomes_begin() {
    let out = compile_ok(
        vec![
            literal(1, json!("a")),
            effect(2, "display"),
            literal(3, json!("b")),
            effect(4, "display"),
        ],
        vec![data(1, 1, 2, "arg-0"), data(2, 3, 4, "arg-0"), flow(3, 2, 4)],
    );
    assert_eq!(out, "(begin (display \"a\")\n(display \"b\"))");
}

#[test]
fn flow_edges_override_document_order() {
    let out = compile_ok(
        vec![
            literal(1, json!("a")),
            effect(2, "display"),
            literal(3, json!("b")),
            effect(4, "display"),
        ],
        vec![data(1, 1, 2, "arg-0"), data(2, 3, 4, "arg-0"), flow(3, 4, 2)],
    );
    assert_eq!(out, "(begin (display \"b\")\n(display \"a\"))");
}

#[test]
fn flow_source_with_a_value_consumer_runs_first() {
    let out = compile_ok(
        vec![call(1, "read"), effect(2, "log"), call(3, "display")],
        vec![flow(1, 1, 2), data(2, 1, 3, "arg-0")],
    );
    assert_eq!(out, "(let ((p-1 (read))) (begin (log)\n(display p-1)))");
    assert!(out.find("(read)").unwrap() < out.find("(log)").unwrap());
}

#[test]
fn unused_literal_last_in_document_is_dropped() {
    let out = compile_ok(vec![effect(2, "newline"), literal(1, json!(7))], vec![]);
    assert_eq!(out, "(newline)");
}

// ---------------------------------------------------------------------------
// Spans
// ---------------------------------------------------------------------------

#[test]
fn span_over_single_call() {
    let out = compile_ok(vec![span(1, "x", &[2]), within(call(2, "f"), 1)], vec![]);
    insta::assert_snapshot!(out, @r###"
    (let* ((cx-1 (start-span "x" #f)) (ret-1 (f))) (begin (end-span cx-1)
    ret-1))
    "###);
}

#[test]
fn span_value_flows_to_its_consumer() {
    let out = compile_ok(
        vec![
            span(10, "compute", &[1, 2]),
            within(literal(1, json!(20)), 10),
            within(call(2, "fib"), 10),
            call(3, "display"),
        ],
        vec![data(1, 1, 2, "arg-0"), data(2, 2, 3, "arg-0")],
    );
    insta::assert_snapshot!(out, @r###"
    (display (let* ((cx-10 (start-span "compute" #f)) (ret-10 (fib 20))) (begin (end-span cx-10)
    ret-10)))
    "###);
}

#[test]
fn sibling_spans_in_a_flow_chain_are_sequenced() {
    let out = compile_ok(
        vec![
            span(10, "first", &[1, 2]),
            within(literal(1, json!("a")), 10),
            within(effect(2, "display"), 10),
            span(20, "second", &[3, 4]),
            within(literal(3, json!("b")), 20),
            within(effect(4, "display"), 20),
        ],
        vec![data(1, 1, 2, "arg-0"), data(2, 3, 4, "arg-0"), flow(3, 2, 4)],
    );
    insta::assert_snapshot!(out, @r###"
    (begin (let* ((cx-10 (start-span "first" #f)) (ret-10 (display "a"))) (begin (end-span cx-10)
    ret-10))
    (let* ((cx-20 (start-span "second" #f)) (ret-20 (display "b"))) (begin (end-span cx-20)
    ret-20)))
    "###);
}

#[test]
fn directly_nested_spans_share_one_let_star() {
    let out = compile_ok(
        vec![
            span(10, "outer", &[1]),
            within(span(20, "inner", &[1]), 10),
            within(call(1, "f"), 20),
            call(2, "display"),
        ],
        vec![data(1, 1, 2, "arg-0")],
    );
    insta::assert_snapshot!(out, @r###"
    (display (let* ((cx-10 (start-span "outer" #f)) (cx-20 (start-span "inner" cx-10)) (ret-20 (f))) (begin (end-span cx-20)
    (end-span cx-10)
    ret-20)))
    "###);
}

#[test]
fn child_spans_thread_the_parent_context() {
    let out = compile_ok(
        vec![
            span(10, "request", &[1, 2, 3, 4]),
            within(span(11, "a", &[1, 2]), 10),
            within(literal(1, json!("a")), 11),
            within(effect(2, "display"), 11),
            within(span(12, "b", &[3, 4]), 10),
            within(literal(3, json!("b")), 12),
            within(effect(4, "display"), 12),
        ],
        vec![data(1, 1, 2, "arg-0"), data(2, 3, 4, "arg-0"), flow(3, 2, 4)],
    );
    assert_eq!(out.matches("(start-span ").count(), 3);
    assert_eq!(out.matches("(end-span ").count(), 3);
    assert!(out.contains(r#"(cx-10 (start-span "request" #f))"#));
    assert!(out.contains(r#"(cx-11 (start-span "a" cx-10))"#));
    assert!(out.contains(r#"(cx-12 (start-span "b" cx-10))"#));
    // Siblings close before their parent.
    let end_a = out.find("(end-span cx-11)").unwrap();
    let end_b = out.find("(end-span cx-12)").unwrap();
    let end_parent = out.find("(end-span cx-10)").unwrap();
    assert!(end_a < end_b && end_b < end_parent);
}

#[test]
fn value_produced_before_a_span_is_shared_into_it() {
    let out = compile_ok(
        vec![
            call(1, "read"),
            span(10, "work", &[2]),
            within(call(2, "f"), 10),
            call(3, "g"),
        ],
        vec![data(1, 1, 2, "arg-0"), data(2, 1, 3, "arg-0")],
    );
    insta::assert_snapshot!(out, @r###"
    (let ((p-1 (read))) (begin (let* ((cx-10 (start-span "work" #f)) (ret-10 (f p-1))) (begin (end-span cx-10)
    ret-10))
    (g p-1)))
    "###);
}

#[test]
fn call_outside_a_span_runs_outside_its_block() {
    let out = compile_ok(
        vec![call(1, "fetch"), span(10, "s", &[2]), within(effect(2, "g"), 10)],
        vec![data(1, 1, 2, "arg-0")],
    );
    insta::assert_snapshot!(out, @r###"
    (let ((p-1 (fetch))) (let* ((cx-10 (start-span "s" #f)) (ret-10 (g p-1))) (begin (end-span cx-10)
    ret-10)))
    "###);
    assert!(out.find("(fetch)").unwrap() < out.find("(start-span").unwrap());
}

#[test]
fn literal_outside_a_span_is_still_inlined() {
    let out = compile_ok(
        vec![literal(1, json!(20)), span(10, "s", &[2]), within(effect(2, "g"), 10)],
        vec![data(1, 1, 2, "arg-0")],
    );
    insta::assert_snapshot!(out, @r###"
    (let* ((cx-10 (start-span "s" #f)) (ret-10 (g 20))) (begin (end-span cx-10)
    ret-10))
    "###);
}

// ---------------------------------------------------------------------------
// Conditionals
// ---------------------------------------------------------------------------

#[test]
fn if_with_value_branches() {
    let out = compile_ok(
        vec![
            literal(1, json!(true)),
            literal(2, json!(1)),
            literal(3, json!(2)),
            node(4, "if"),
            call(5, "display"),
        ],
        vec![
            data(1, 1, 4, "cond"),
            data(2, 2, 4, "then"),
            data(3, 3, 4, "else"),
            data(4, 4, 5, "arg-0"),
        ],
    );
    assert_eq!(out, "(display (if #t\n1\n2))");
}

#[test]
fn if_with_control_chains() {
    let out = compile_ok(
        vec![
            call(1, "ready?"),
            literal(2, json!("a")),
            effect(3, "display"),
            literal(4, json!("b")),
            effect(6, "display"),
            effect(7, "newline"),
            node(5, "if"),
        ],
        vec![
            data(1, 1, 5, "cond"),
            data(2, 2, 3, "arg-0"),
            data(3, 4, 6, "arg-0"),
            flow(4, 3, 6),
            control(5, 6, 5, "then"),
            control(6, 7, 5, "else"),
        ],
    );
    insta::assert_snapshot!(out, @r###"
    (if (ready?)
    (begin (display "a")
    (display "b"))
    (newline))
    "###);
}

#[test]
fn value_shared_by_both_branches_is_bound_outside() {
    let out = compile_ok(
        vec![
            call(1, "read"),
            call(2, "ok?"),
            effect(3, "display"),
            effect(4, "write"),
            node(5, "if"),
        ],
        vec![
            data(1, 1, 3, "arg-0"),
            data(2, 1, 4, "arg-0"),
            data(3, 2, 5, "cond"),
            control(4, 3, 5, "then"),
            control(5, 4, 5, "else"),
        ],
    );
    insta::assert_snapshot!(out, @r###"
    (let ((p-1 (read))) (if (ok?)
    (display p-1)
    (write p-1)))
    "###);
}

#[test]
fn one_armed_if() {
    let out = compile_ok(
        vec![call(1, "debug?"), effect(2, "dump"), node(3, "if")],
        vec![data(1, 1, 3, "cond"), control(2, 2, 3, "then")],
    );
    assert_eq!(out, "(if (debug?)\n(dump))");
}

#[test]
fn cond_clauses_in_index_order() {
    let out = compile_ok(
        vec![
            literal(3, json!(true)),
            literal(4, json!("wait")),
            call(1, "ready?"),
            literal(2, json!("go")),
            node(5, "cond"),
            call(6, "display"),
        ],
        vec![
            data(1, 3, 5, "test-1"),
            data(2, 4, 5, "action-1"),
            data(3, 1, 5, "test-0"),
            data(4, 2, 5, "action-0"),
            data(5, 5, 6, "arg-0"),
        ],
    );
    insta::assert_snapshot!(out, @r###"
    (display (cond ((ready?) "go")
    (#t "wait")))
    "###);
}

#[test]
fn nested_if_inside_a_branch() {
    let out = compile_ok(
        vec![
            call(1, "a?"),
            call(2, "b?"),
            literal(3, json!(1)),
            literal(4, json!(2)),
            node(5, "if"),
            literal(6, json!(3)),
            node(7, "if"),
        ],
        vec![
            data(1, 2, 5, "cond"),
            data(2, 3, 5, "then"),
            data(3, 4, 5, "else"),
            data(4, 1, 7, "cond"),
            data(5, 5, 7, "then"),
            data(6, 6, 7, "else"),
        ],
    );
    insta::assert_snapshot!(out, @r###"
    (if (a?)
    (if (b?)
    1
    2)
    3)
    "###);
}

// ---------------------------------------------------------------------------
// Containment feeding the compiler
// ---------------------------------------------------------------------------

#[test]
fn new_span_inside_existing_span_nests_under_it() {
    let doc = GraphDocument::from_json(&document(
        vec![
            span(10, "A", &[1, 2]),
            within(call(1, "f"), 10),
            within(call(2, "g"), 10),
        ],
        vec![],
    ))
    .unwrap();

    let nodes = apply_new_span(
        &doc.nodes,
        NewSpan {
            id: NodeId(20),
            name: "B".into(),
            wrapped: [NodeId(1)].into_iter().collect(),
        },
    )
    .unwrap();
    let new_span = nodes.iter().find(|n| n.id == NodeId(20)).unwrap();
    assert_eq!(new_span.parent_id, Some(NodeId(10)));

    let out = compile_document(nodes, doc.edges, &CompileOptions::default()).unwrap();
    assert!(out.contains(r#"(cx-20 (start-span "B" cx-10))"#));
    assert_eq!(out.matches("(end-span cx-20)").count(), 1);
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn custom_templates_and_no_context_marker() {
    let options = CompileOptions {
        span_templates: SpanTemplates::empty()
            .with(SpanOp::StartSpan, "(trace:open ${name} ${parent})")
            .with(SpanOp::EndSpan, "(trace:close ${context})"),
        no_context: "'root".into(),
    };
    let graph = ProgramGraph::from_json(&document(
        vec![span(1, "x", &[2]), within(call(2, "f"), 1)],
        vec![],
    ))
    .unwrap();
    let out = compile(&graph, &options).unwrap();
    assert_eq!(
        out,
        "(let* ((cx-1 (trace:open \"x\" 'root)) (ret-1 (f))) (begin (trace:close cx-1)\nret-1))"
    );
}

#[test]
fn compile_is_deterministic() {
    let json = document(
        vec![
            literal(1, json!(5)),
            span(10, "s", &[2]),
            within(call(2, "f"), 10),
            call(3, "g"),
        ],
        vec![data(1, 1, 2, "arg-0"), data(2, 1, 3, "arg-0")],
    );
    assert_eq!(compile_json(&json).unwrap(), compile_json(&json).unwrap());
}

#[test]
fn ir_is_available_for_inspection() {
    let graph = ProgramGraph::from_json(&document(
        vec![literal(1, json!(1)), call(2, "f")],
        vec![data(1, 1, 2, "arg-0")],
    ))
    .unwrap();
    match compile_to_ir(&graph).unwrap() {
        Some(Expr::Call { name, args }) => {
            assert_eq!(name, "f");
            assert_eq!(args.len(), 1);
        }
        other => panic!("expected a call, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn unknown_node_kind_is_malformed() {
    let json = document(vec![node(1, "loop")], vec![]);
    let err = compile_json(&json).unwrap_err();
    assert!(matches!(err, CodegenError::Core(CoreError::Malformed(_))));
}

#[test]
fn missing_parent_span_is_rejected() {
    let json = document(vec![within(call(1, "f"), 99)], vec![]);
    let err = compile_json(&json).unwrap_err();
    assert!(matches!(err, CodegenError::Core(CoreError::SpanNotFound { .. })));
}

#[test]
fn dependency_cycle_is_rejected() {
    let json = document(
        vec![call(1, "f"), call(2, "g")],
        vec![data(1, 1, 2, "arg-0"), flow(2, 2, 1)],
    );
    let err = compile_json(&json).unwrap_err();
    assert!(matches!(err, CodegenError::Core(CoreError::Cycle { .. })));
}

#[test]
fn if_without_condition_is_rejected() {
    let json = document(
        vec![literal(1, json!(1)), node(2, "if")],
        vec![data(1, 1, 2, "then")],
    );
    assert!(matches!(
        compile_json(&json),
        Err(CodegenError::InvalidGraph(_))
    ));
}

#[test]
fn unpaired_cond_clause_is_rejected() {
    let json = document(
        vec![literal(1, json!(true)), node(2, "cond")],
        vec![data(1, 1, 2, "test-3")],
    );
    let err = compile_json(&json).unwrap_err();
    assert!(err.to_string().contains("test-3"));
}

#[test]
fn non_contiguous_span_is_rejected() {
    // 1 and 3 share a span, but 3 depends on 2 which depends on 1.
    let json = document(
        vec![
            span(10, "s", &[1, 3]),
            within(call(1, "read"), 10),
            call(2, "f"),
            within(call(3, "g"), 10),
        ],
        vec![data(1, 1, 2, "arg-0"), data(2, 2, 3, "arg-0")],
    );
    match compile_json(&json) {
        Err(CodegenError::UnitCycle { units }) => {
            assert_eq!(units, vec![NodeId(10), NodeId(2)]);
        }
        other => panic!("expected UnitCycle, got {:?}", other),
    }
}

#[test]
fn span_with_two_exiting_values_is_rejected() {
    let json = document(
        vec![
            span(10, "s", &[1, 2]),
            within(call(1, "a"), 10),
            within(call(2, "b"), 10),
            call(3, "+"),
        ],
        vec![data(1, 1, 3, "arg-0"), data(2, 2, 3, "arg-1")],
    );
    assert!(matches!(
        compile_json(&json),
        Err(CodegenError::SpanOutputs { .. })
    ));
}

#[test]
fn missing_template_is_reported() {
    let options = CompileOptions {
        span_templates: SpanTemplates::empty(),
        ..CompileOptions::default()
    };
    let graph = ProgramGraph::from_json(&document(
        vec![span(1, "x", &[2]), within(call(2, "f"), 1)],
        vec![],
    ))
    .unwrap();
    let err = compile(&graph, &options).unwrap_err();
    assert!(matches!(err, CodegenError::MissingTemplate { op } if op == "start-span"));
}
