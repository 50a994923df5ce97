//! End-to-end tests: run the `jsonata-cli` binary and compare stdout.

use std::io::Write;
use std::process::{Command, Stdio};

fn jsonata(args: &[&str], input: &str) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_jsonata-cli"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .and_then(|mut child| {
            child
                .stdin
                .take()
                .unwrap()
                .write_all(input.as_bytes())
                .unwrap();
            child.wait_with_output()
        })
        .expect("failed to run jsonata-cli")
}

fn eval_compact(expression: &str, input: &str) -> String {
    let output = jsonata(&["-c", expression], input);
    assert!(
        output.status.success(),
        "jsonata-cli exited with {}: stderr={}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout)
        .expect("jsonata-cli output was not valid UTF-8")
        .trim()
        .to_string()
}

fn eval_err(expression: &str, input: &str) -> String {
    let output = jsonata(&["-c", expression], input);
    assert!(!output.status.success(), "expected jsonata-cli to fail");
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn identity_path() {
    assert_eq!(
        eval_compact("Account.Name", r#"{"Account": {"Name": "Acme"}}"#),
        r#""Acme""#
    );
}

#[test]
fn array_projection_flattens() {
    assert_eq!(
        eval_compact("a.b", r#"{"a": [{"b": 1}, {"b": 2}]}"#),
        "[1,2]"
    );
}

#[test]
fn predicate_filters_items() {
    assert_eq!(eval_compact("a[$ > 2]", r#"{"a": [1, 2, 3, 4]}"#), "[3,4]");
}

#[test]
fn numeric_and_string_builtins() {
    assert_eq!(eval_compact("$sum(a)", r#"{"a": [1, 2, 3]}"#), "6");
    assert_eq!(
        eval_compact(r#"$uppercase(name)"#, r#"{"name": "acme"}"#),
        r#""ACME""#
    );
}

#[test]
fn object_construction_and_grouping() {
    assert_eq!(
        eval_compact(
            "items{category: price}",
            r#"{"items": [{"category": "a", "price": 10}, {"category": "a", "price": 5}]}"#
        ),
        r#"{"a":[10,5]}"#
    );
}

#[test]
fn lambda_and_higher_order_functions() {
    assert_eq!(
        eval_compact(
            "$map(a, function($v){$v * 2})",
            r#"{"a": [1, 2, 3]}"#
        ),
        "[2,4,6]"
    );
}

#[test]
fn missing_path_yields_null() {
    assert_eq!(eval_compact("missing.field", "{}"), "null");
}

#[test]
fn binding_via_cli_flag() {
    let output = jsonata(&["-c", "-b", "tax=1.1", "$tax"], "null");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "1.1");
}

#[test]
fn undefined_function_call_reports_a_coded_error() {
    let stderr = eval_err("$noSuchFunction()", "null");
    assert!(stderr.contains("T1005") || stderr.contains("D3001"), "{stderr}");
}

#[test]
fn transform_operator_is_reserved_not_implemented() {
    let stderr = eval_err(r#"|Account|{"x": 1}|"#, "{}");
    assert!(stderr.contains("D3013"), "{stderr}");
}

const INVOICE: &str = r#"{ "A": { "O": [ { "P":"Hat","N":2,"U":9.99 },
                                        { "P":"Shoes","N":1,"U":49.99 },
                                        { "P":"Shirt","N":3,"U":24.99 } ] } }"#;

#[test]
fn invoice_product_names() {
    assert_eq!(
        eval_compact("A.O.P", INVOICE),
        r#"["Hat","Shoes","Shirt"]"#
    );
}

#[test]
fn invoice_price_filter() {
    assert_eq!(
        eval_compact("A.O[U>20].P", INVOICE),
        r#"["Shoes","Shirt"]"#
    );
}

#[test]
fn invoice_line_total_sum() {
    assert_eq!(eval_compact("$sum(A.O.(U*N))", INVOICE), "144.94");
}

#[test]
fn invoice_group_by_product() {
    assert_eq!(
        eval_compact("A.O{P: U}", INVOICE),
        r#"{"Hat":9.99,"Shoes":49.99,"Shirt":24.99}"#
    );
}

#[test]
fn invoice_sort_by_price() {
    assert_eq!(
        eval_compact("A.O^(>U).P", INVOICE),
        r#"["Shoes","Shirt","Hat"]"#
    );
}

#[test]
fn invoice_focus_binding() {
    // `.` binds tighter than `&` (spec §4.2's precedence table), so the
    // concatenation must sit inside the path step for `$o` to still be in
    // scope — the unparenthesized literal from spec.md §8.4 scenario 6
    // would let `$o` escape its binding tuple before `&` ever sees it.
    assert_eq!(
        eval_compact(r#"A.O@$o.(P & ": " & $string($o.U))"#, INVOICE),
        r#"["Hat: 9.99","Shoes: 49.99","Shirt: 24.99"]"#
    );
}

#[test]
fn invoice_index_binding() {
    assert_eq!(
        eval_compact(r#"A.O#$i.{"i":$i,"p":P}"#, INVOICE),
        r#"[{"i":0,"p":"Hat"},{"i":1,"p":"Shoes"},{"i":2,"p":"Shirt"}]"#
    );
}
