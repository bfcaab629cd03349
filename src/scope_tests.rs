#[cfg(test)]
mod tests {
    use crate::options::TranspileOptions;
    use crate::parse::parse_cell;
    use crate::scope::{analyze, ScopeAnalysis};
    use oxc_allocator::Allocator;

    fn analyze_with(source: &str, options: &TranspileOptions) -> ScopeAnalysis {
        let allocator = Allocator::default();
        let cell = parse_cell(&allocator, source, options).unwrap();
        analyze(&cell, &options.globals)
    }

    fn free(source: &str) -> Vec<String> {
        analyze_with(source, &TranspileOptions::default())
            .free_references
            .into_iter()
            .map(|r| r.name)
            .collect()
    }

    #[test]
    fn test_first_use_order() {
        assert_eq!(free("x + y"), vec!["x", "y"]);
        assert_eq!(free("b(a, b, c)"), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_parameters_and_defaults() {
        assert_eq!(
            free("function f(a, b = c) { return a + b + d; }"),
            vec!["c", "d"]
        );
    }

    #[test]
    fn test_destructured_and_rest_parameters() {
        assert_eq!(
            free("const f = ({a, b: [c]}, d = e, ...rest) => a + c + d + rest.length + z;"),
            vec!["e", "z"]
        );
    }

    #[test]
    fn test_function_declarations_hoist() {
        assert!(free("g(); function g() {}").is_empty());
    }

    #[test]
    fn test_var_hoists_out_of_blocks() {
        assert_eq!(free("if (t) { var v = 1; } v;"), vec!["t"]);
    }

    #[test]
    fn test_var_does_not_escape_functions() {
        assert_eq!(free("function f() { var local = 1; } local;"), vec!["local"]);
    }

    #[test]
    fn test_block_scoped_let_does_not_leak() {
        assert_eq!(free("{ let inner = 1; } inner;"), vec!["inner"]);
    }

    #[test]
    fn test_catch_parameter() {
        assert_eq!(
            free("try { risky(); } catch ({message}) { log(message); }"),
            vec!["risky", "log"]
        );
    }

    #[test]
    fn test_loop_heads() {
        assert_eq!(free("for (let i = 0; i < n; i++) sum(i);"), vec!["n", "sum"]);
        assert_eq!(
            free("for (const [k, v] of entries) use(k, v);"),
            vec!["entries", "use"]
        );
        assert_eq!(free("for (const key in obj) key;"), vec!["obj"]);
    }

    #[test]
    fn test_switch_cases_share_a_scope() {
        assert_eq!(
            free("switch (k) { case 1: let s = 2; f(s); break; default: g(s); }"),
            vec!["k", "f", "g"]
        );
    }

    #[test]
    fn test_class_names_and_heritage() {
        assert_eq!(
            free("class A extends Base { method() { return A.x + this.y + other; } }"),
            vec!["Base", "other"]
        );
    }

    #[test]
    fn test_named_function_expression_name_is_local_to_itself() {
        assert_eq!(
            free("const f = function fact(n) { return n ? n * fact(n - 1) : 1; }; fact;"),
            vec!["fact"]
        );
    }

    #[test]
    fn test_static_block_var_stays_inside() {
        assert_eq!(free("class C { static { var hidden = 1; } } hidden;"), vec!["hidden"]);
    }

    #[test]
    fn test_property_keys_and_labels_excluded() {
        assert_eq!(
            free("obj.prop + obj[key] + ({prop: 1}).prop; outer: for (;;) break outer;"),
            vec!["obj", "key"]
        );
    }

    #[test]
    fn test_shorthand_templates_and_tags() {
        assert_eq!(
            free("({a}); `${b}`; tag`x${c}`;"),
            vec!["a", "b", "tag", "c"]
        );
    }

    #[test]
    fn test_typeof_only_is_optional() {
        let analysis = analyze_with("typeof maybe === 'undefined' ? 0 : typeof (other)", &TranspileOptions::default());
        assert_eq!(analysis.free_references.len(), 2);
        assert!(analysis.free_references.iter().all(|r| r.optional));
    }

    #[test]
    fn test_typeof_and_plain_use_is_required() {
        let analysis = analyze_with("typeof a; a;", &TranspileOptions::default());
        assert_eq!(analysis.free_references.len(), 1);
        assert!(!analysis.free_references[0].optional);
    }

    #[test]
    fn test_assignment_targets_are_marked() {
        let analysis = analyze_with(
            "count = 1; [a, b] = pair; ({c} = obj); d++;",
            &TranspileOptions::default(),
        );
        let assigned: Vec<(&str, bool)> = analysis
            .free_references
            .iter()
            .map(|r| (r.name.as_str(), r.assigned))
            .collect();
        assert_eq!(
            assigned,
            vec![
                ("count", true),
                ("a", true),
                ("b", true),
                ("pair", false),
                ("c", true),
                ("obj", false),
                ("d", true),
            ]
        );
    }

    #[test]
    fn test_top_level_await_detection() {
        assert!(analyze_with("const r = await fetch(u);", &TranspileOptions::default()).top_level_await);
        assert!(analyze_with("for await (const c of stream) {}", &TranspileOptions::default()).top_level_await);
        assert!(!analyze_with("async function f() { await x; }", &TranspileOptions::default()).top_level_await);
        assert!(!analyze_with("const g = async () => { for await (const c of s) {} };", &TranspileOptions::default()).top_level_await);
    }

    #[test]
    fn test_globals_filter() {
        let opts = TranspileOptions::default().with_default_globals();
        let names: Vec<String> = analyze_with("Math.max(a, window.x)", &opts)
            .free_references
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn test_implicit_names_never_free() {
        assert!(free("function f() { return arguments[0]; } arguments; eval('1');").is_empty());
    }

    #[test]
    fn test_jsx_component_references() {
        let opts = TranspileOptions::default().with_jsx(true);
        let names: Vec<String> = analyze_with("<Panel title={t}><div /></Panel>", &opts)
            .free_references
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["Panel", "t"]);
    }

    #[test]
    fn test_bound_names_cover_nested_scopes() {
        let analysis = analyze_with("function f(p) { const q = 1; }", &TranspileOptions::default());
        assert!(analysis.bound_names.contains("f"));
        assert!(analysis.bound_names.contains("p"));
        assert!(analysis.bound_names.contains("q"));
    }
}
