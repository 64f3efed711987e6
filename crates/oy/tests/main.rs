//! End-to-end language semantics, driven through the public API.

mod common;

use common::{run, run_int, run_output};
use oy::{Script, Value};
use pretty_assertions::assert_eq;

#[test]
fn closures_share_captures() {
    let value = run_int(
        r#"
        auto make = () {
            auto n = 0;
            return struct { .get = () { return n; }, .inc = () { n = n + 1; } };
        };
        auto o = make();
        o.inc(); o.inc(); o.inc();
        return o.get();
        "#,
    );
    assert_eq!(value, 3);
}

#[test]
fn captures_survive_caller_return() {
    let value = run_int(
        r#"
        auto f = () { auto x = 10; return () { return x; }; };
        return f()();
        "#,
    );
    assert_eq!(value, 10);
}

#[test]
fn closures_created_per_iteration_capture_distinct_slots() {
    let value = run_int(
        r#"
        auto makers = [] {};
        for (auto i = 0; i < 3; ++i) {
            auto v = i;
            makers[sizeof(makers)] = () { return v; };
        }
        return makers[0]() + makers[1]() * 10 + makers[2]() * 100;
        "#,
    );
    assert_eq!(value, 210);
}

#[test]
fn writes_through_captures_are_seen_by_all_sharers() {
    let value = run_int(
        r#"
        auto n = 1;
        auto bump = () { n = n + 41; };
        bump();
        return n;
        "#,
    );
    assert_eq!(value, 42);
}

#[test]
fn string_concatenation_and_sizeof() {
    let value = run_int(
        r#"
        auto s = "hello" " " "world";
        return sizeof(s) == 11 ? 0 : 1;
        "#,
    );
    assert_eq!(value, 0);
}

#[test]
fn string_indexing_yields_one_element_strings() {
    let value = run_int(
        r#"
        auto s = "abc";
        if (s[1] != "b") { return 1; }
        if (typeof(s[9]) != "void") { return 2; }
        return 0;
        "#,
    );
    assert_eq!(value, 0);
}

#[test]
fn switch_falls_through_to_the_next_clause_body() {
    let value = run_int(
        r#"
        auto v = 2; auto out = 0;
        switch (v) {
            case 1: out = out + 1;
            case 2: out = out + 2;
            case 3: out = out + 4; break;
            default: out = out + 100;
        }
        return out;
        "#,
    );
    assert_eq!(value, 6);
}

#[test]
fn switch_case_falls_through_into_default() {
    let value = run_int(
        r#"
        auto out = 0;
        switch (1) {
            case 1: out = 1;
            default: out = 2;
        }
        return out;
        "#,
    );
    assert_eq!(value, 2);
}

#[test]
fn switch_default_runs_when_nothing_matches() {
    let value = run_int(
        r#"
        auto out = 0;
        switch (9) {
            case 1: out = out + 1; break;
            default: out = out + 100;
        }
        return out;
        "#,
    );
    assert_eq!(value, 100);
}

#[test]
fn arithmetic_promotion_and_division() {
    assert_eq!(run_int("return 1 + 2 * 3;"), 7);
    assert_eq!(run_int("return 7 / 2;"), 3);
    assert_eq!(run_int("return int(7.0 / 2);"), 3);
    assert_eq!(run_int("return 7 % 3;"), 1);
    assert_eq!(run_int("return typeof(1 + 2.5) == \"float\" ? 1 : 0;"), 1);
}

#[test]
fn bitwise_and_shifts() {
    assert_eq!(run_int("return (6 & 3) + (6 | 3) + (6 ^ 3);"), 2 + 7 + 5);
    assert_eq!(run_int("return 1 << 10;"), 1024);
    assert_eq!(run_int("return -8 >> 1;"), -4);
    assert_eq!(run_int("return ~0;"), -1);
}

#[test]
fn comparison_operators() {
    assert_eq!(run_int("return (1 < 2) && (2 <= 2) && (3 > 2) && (2 >= 2) ? 1 : 0;"), 1);
    assert_eq!(run_int("return \"abc\" < \"abd\" ? 1 : 0;"), 1);
    assert_eq!(run_int("return 1 == 1.0 ? 1 : 0;"), 1);
    assert_eq!(run_int("return ([] {}) == ([] {}) ? 1 : 0;"), 0);
    assert_eq!(run_int("return null == null ? 1 : 0;"), 1);
    assert_eq!(run_int("return null == 0 ? 1 : 0;"), 0);
}

#[test]
fn short_circuit_skips_the_right_side() {
    let value = run_int(
        r#"
        auto called = 0;
        auto f = () { called = 1; return true; };
        auto x = false && f();
        auto y = true || f();
        return called + (x ? 10 : 0) + (y ? 100 : 0);
        "#,
    );
    assert_eq!(value, 100);
}

#[test]
fn ternary_chains() {
    assert_eq!(run_int("return 2 > 1 ? (0 > 1 ? 10 : 20) : 30;"), 20);
}

#[test]
fn comma_operator_keeps_the_last_value() {
    assert_eq!(run_int("return (1, 2, 3);"), 3);
}

#[test]
fn prefix_and_postfix_increment() {
    let value = run_int(
        r#"
        auto i = 5;
        auto a = i++;
        auto b = ++i;
        return a * 100 + b * 10 + i;
        "#,
    );
    assert_eq!(value, 577);
}

#[test]
fn compound_assignment_on_locals_and_members() {
    let value = run_int(
        r#"
        auto n = 1;
        n += 4;
        n *= 3;
        auto s = struct { .n = 1 };
        s.n += 9;
        return n * 100 + s.n;
        "#,
    );
    assert_eq!(value, 1510);
}

#[test]
fn array_append_and_delete_laws() {
    let value = run_int(
        r#"
        auto a = [] {1, 2, 3};
        a[sizeof(a)] = 4;
        auto grown = sizeof(a);
        delete a[1];
        return grown * 10 + sizeof(a);
        "#,
    );
    assert_eq!(value, 41);
}

#[test]
fn array_literal_with_explicit_indexes() {
    // bare elements use their own implicit counter, starting at zero
    let value = run_int(
        r#"
        auto a = [] {[0] = 1, [1] = 2, 5};
        return a[0] * 10 + sizeof(a);
        "#,
    );
    assert_eq!(value, 52);
}

#[test]
fn containers_are_reference_values() {
    let value = run_int(
        r#"
        auto a = [] {1};
        auto b = a;
        b[0] = 9;
        return a[0];
        "#,
    );
    assert_eq!(value, 9);
}

#[test]
fn nested_structure_access() {
    assert_eq!(
        run_int("auto s = struct { .a = struct { .b = 7 } }; return s.a.b;"),
        7
    );
    assert_eq!(
        run_int("auto s = struct { .a = struct { .b = 1 } }; s.a.b = 8; return s[\"a\"][\"b\"];"),
        8
    );
}

#[test]
fn structure_keys_can_be_any_scalar() {
    let value = run_int(
        r#"
        auto s = struct {};
        s[null] = 1;
        s[true] = 2;
        s[3] = 3;
        s[2.5] = 4;
        s["k"] = 5;
        return sizeof(s) * 100 + s[2.5] * 10 + s[null];
        "#,
    );
    assert_eq!(value, 541);
}

#[test]
fn delete_removes_structure_fields() {
    let value = run_int(
        r#"
        auto s = struct { .a = 1, .b = 2 };
        delete s.a;
        return sizeof(s) * 10 + (typeof(s.a) == "void" ? 1 : 0);
        "#,
    );
    assert_eq!(value, 11);
}

#[test]
fn foreach_over_arrays_is_in_index_order() {
    let value = run_int(
        r#"
        auto a = [] {5, 6, 7};
        auto keys = 0; auto values = 0;
        foreach (auto i, v : a) {
            keys = keys * 10 + i;
            values = values * 10 + v;
        }
        return keys * 10000 + values;
        "#,
    );
    assert_eq!(value, 12 * 10000 + 567);
}

#[test]
fn foreach_over_structures_is_in_insertion_order() {
    let value = run_int(
        r#"
        auto s = struct { .b = 1, .a = 2 };
        auto keys = "";
        foreach (auto k, v : s) { keys = keys + k; }
        return keys == "ba" ? 1 : 0;
        "#,
    );
    assert_eq!(value, 1);
}

#[test]
fn foreach_single_variable_form() {
    let value = run_int(
        r#"
        auto total = 0;
        foreach (auto i : [] {9, 9, 9}) { total = total + i; }
        return total;
        "#,
    );
    assert_eq!(value, 3);
}

#[test]
fn foreach_over_empty_containers_skips_the_body() {
    assert_eq!(run_int("foreach (auto k, v : [] {}) { return 1; } return 0;"), 0);
    assert_eq!(run_int("foreach (auto k, v : struct {}) { return 1; } return 0;"), 0);
}

#[test]
fn loops_with_break_and_continue() {
    let value = run_int(
        r#"
        auto total = 0;
        for (auto i = 0; i < 10; ++i) {
            if (i % 2 == 0) { continue; }
            if (i > 7) { break; }
            total += i;
        }
        return total;
        "#,
    );
    assert_eq!(value, 16);
}

#[test]
fn while_and_do_while() {
    let value = run_int(
        r#"
        auto n = 0;
        while (n < 5) { n = n + 1; }
        do { n = n + 10; } while (false);
        return n;
        "#,
    );
    assert_eq!(value, 15);
}

#[test]
fn if_with_initializer() {
    assert_eq!(run_int("if (auto t = 5; t > 2) { return t; } return 0;"), 5);
}

#[test]
fn default_and_variadic_parameters() {
    let value = run_int(
        r#"
        auto f = (auto a, auto b = 10, auto ...rest) { return a + b + sizeof(rest); };
        return f(1) * 100 + f(1, 2) * 10 + f(1, 2, 3, 4);
        "#,
    );
    assert_eq!(value, 11 * 100 + 3 * 10 + 5);
}

#[test]
fn recursion_through_a_capture() {
    let value = run_int(
        r#"
        auto fib;
        fib = (auto n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); };
        return fib(18);
        "#,
    );
    assert_eq!(value, 2584);
}

#[test]
fn conversions() {
    assert_eq!(run_int("return int(\"42\") + int(\"0x10\") + int(-3.9);"), 42 + 16 - 3);
    assert_eq!(run_int("return typeof(int(\"4x\")) == \"void\" ? 1 : 0;"), 1);
    assert_eq!(run_int("return float(\"1.5\") == 1.5 ? 1 : 0;"), 1);
    assert_eq!(run_int("return typeof(float(\"nope\")) == \"void\" ? 1 : 0;"), 1);
    assert_eq!(run_int("return str(42) == \"42\" ? 1 : 0;"), 1);
    assert_eq!(run_int("return int(str(123456789)) == 123456789 ? 1 : 0;"), 1);
    assert_eq!(run_int("return float(str(2.5)) == 2.5 ? 1 : 0;"), 1);
    assert_eq!(run_int("return bool(\"\") || bool(0) || bool(null) ? 1 : 0;"), 0);
    assert_eq!(run_int("return bool(\"x\") && bool(-1) && bool([] {0}) ? 1 : 0;"), 1);
}

#[test]
fn typeof_names() {
    let value = run_int(
        r#"
        auto checks = [] {
            typeof(null) == "null",
            typeof(true) == "bool",
            typeof(1) == "int",
            typeof(1.5) == "float",
            typeof("s") == "str",
            typeof([] {}) == "array",
            typeof(struct {}) == "struct",
            typeof(() {}) == "closure",
            typeof(trace) == "builtin-function"
        };
        foreach (auto i, ok : checks) {
            if (!ok) { return i + 1; }
        }
        return 0;
        "#,
    );
    assert_eq!(value, 0);
}

#[test]
fn unary_minus_folds_literals() {
    assert_eq!(run_int("return -5 + -0x10;"), -21);
    assert_eq!(run_int("auto x = 3; return -x;"), -3);
    assert_eq!(run_int("return int(-2.5);"), -2);
}

#[test]
fn block_scopes_shadow() {
    let value = run_int(
        r#"
        auto x = 1;
        {
            auto x = 2;
            x = x + 1;
        }
        return x;
        "#,
    );
    assert_eq!(value, 1);
}

#[test]
fn trace_renders_values_space_separated() {
    let output = run_output(r#"trace("hi", 42, 2.5, null, true, [] {1, 2});"#);
    assert_eq!(output, "\"hi\" 42 2.5 null true [] {1, 2}\n");
}

#[test]
fn trace_of_a_cyclic_array_terminates() {
    let output = run_output(
        r#"
        auto a = [] {};
        a[0] = a;
        trace(a);
        "#,
    );
    assert_eq!(output, "[] {...}\n");
}

#[test]
fn top_level_argv_is_the_argument_vector() {
    // no arguments were passed, so argv is an empty array
    assert_eq!(run_int("return sizeof(argv);"), 0);
}

#[test]
fn module_value_can_be_any_kind() {
    assert!(matches!(run("return;"), Value::Void));
    assert!(matches!(run("1;"), Value::Void));
    assert!(matches!(run("return \"done\";"), Value::Str(s) if &*s == "done"));
}

#[test]
fn bytecode_dump_lists_instructions() {
    let script = Script::compile("auto greeting = \"hi\"; return 1;", "dump.oy").unwrap();
    let dump = script.executable().dump();
    assert!(dump.contains("prototype 0"));
    assert!(dump.contains("LOAD_CONSTANT"));
    assert!(dump.contains("; \"hi\""));
    assert!(dump.contains("LOAD_INTEGER"));
    assert!(dump.contains("RETURN"));
}
