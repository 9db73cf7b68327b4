//! Pipeline tests - report → trace → cluster → policy
//!
//! Exercises the analysis crate end to end with the html5ever inspector and
//! the local allowlist sanitizer.

use tth_analysis::*;
use tth_html::{AllowlistSanitizer, HtmlInspector, SanitizeError, Sanitizer};

const TAB: ContextId = ContextId(1);

fn stack(app_frame: &str) -> String {
    format!(
        "Error\n  at getStackTrace (content.js:82:15)\n  at createMessage (content.js:123:19)\n  at createHTML (content.js:92:28)\n{}",
        app_frame
    )
}

fn report(category: &str, payload: &str, app_frame: &str, at: u64) -> Violation {
    Violation::from_report(ViolationReport {
        category: category.into(),
        payload: payload.into(),
        raw_stack_trace: stack(app_frame),
        document_url: "https://example.com/start".into(),
        observed_at_ms: at,
    })
}

// ============================================================================
// STACK TRACE PARSER
// ============================================================================

#[test]
fn test_parser_is_total() {
    let inputs = [
        "",
        "\n",
        "\n\n\n",
        "at",
        "at ()",
        "at x (:::)",
        "at https://:1:",
        "    at Object.<anonymous> (/srv/app.js:1:1)",
        "\u{0}\u{feff}at f (a.js:1:1)\r",
        "at f (a.js:-1:2)",
    ];
    for input in inputs {
        let trace = stack_trace::parse(input);
        assert_eq!(trace.len(), input.split('\n').count(), "input {:?}", input);
    }
}

#[test]
fn test_scenario_a() {
    let trace = stack_trace::parse(&stack("  at https://example.com/a.js:1:10639"));

    assert_eq!(trace.len(), 5);
    assert_eq!(trace.get(0), Some(&TraceLine::Opaque("Error".into())));
    let names: Vec<_> = trace.frames[1..4]
        .iter()
        .map(|line| line.as_frame().unwrap().function_name.as_deref().unwrap())
        .collect();
    assert_eq!(names, vec!["getStackTrace", "createMessage", "createHTML"]);
    assert_eq!(
        trace.get(4),
        Some(&TraceLine::Frame(StackFrame {
            function_name: None,
            script_url: "example.com/a.js".into(),
            line_number: 1,
            column_number: 10639,
        }))
    );
}

// ============================================================================
// ROOT CAUSE
// ============================================================================

#[test]
fn test_reflexive() {
    let v = report("HTML", "<b>x</b>", "  at innerHTML (path/to/rootcause.js:10:1)", 1);
    assert!(same_root_cause(&v, &v));
}

#[test]
fn test_payload_independent() {
    let a = report("HTML", "<button>adding a button</button>", "  at innerHTML (path/to/rootcause.js:10:1)", 1);
    let b = report("HTML", "<div> adding a div </div>", "  at innerHTML (path/to/rootcause.js:10:1)", 2);
    assert!(same_root_cause(&a, &b));
}

#[test]
fn test_category_and_document_independent() {
    let a = report("HTML", "x", "  at src (path/to/rootcause.js:15:5)", 1);
    let mut b = report("URL", "https://a.test/x.js", "  at other (elsewhere.js:15:5)", 2);
    b.document_url = "https://other.test/".into();
    assert!(same_root_cause(&a, &b));
}

#[test]
fn test_location_must_match() {
    let a = report("HTML", "x", "  at setAttribute (path/to/rootcause.js:8:1)", 1);
    let b = report("HTML", "x", "  at setAttribute (path/to/rootcause.js:8:2)", 2);
    let c = report("HTML", "x", "  at setAttribute (path/to/rootcause.js:9:1)", 3);
    assert!(!same_root_cause(&a, &b));
    assert!(!same_root_cause(&a, &c));
}

#[test]
fn test_short_trace_isolated() {
    let short = Violation::from_report(ViolationReport {
        category: "Script".into(),
        payload: "x".into(),
        raw_stack_trace: "Error\n  at a (b.js:1:1)\n  at c (d.js:2:2)\n  at e (f.js:3:3)".into(),
        document_url: String::new(),
        observed_at_ms: 0,
    });
    assert!(!same_root_cause(&short, &short));
    assert_eq!(root_cause_text(&short.stack_trace), NO_ROOT_CAUSE);
}

// ============================================================================
// CLUSTERING
// ============================================================================

#[test]
fn test_repeated_bug_one_cluster() {
    let mut store = ClusterStore::new();
    for at in 0..10 {
        store.ingest(TAB, report("HTML", &format!("<p>{at}</p>"), "  at render (app.js:4:2)", at));
    }
    store.ingest(TAB, report("Script", "eval()", "  at boot (app.js:9:9)", 10));

    let clusters = store.list_by_cluster(TAB);
    assert_eq!(clusters.len(), 2);
    assert_eq!(clusters[0].count, 10);
    assert_eq!(clusters[0].members.len(), 10);
    assert_eq!(clusters[0].first_occurrence, 0);
    assert_eq!(clusters[0].last_occurrence, 9);
    assert_eq!(clusters[0].root_cause, "render (app.js:4:2)");
    assert_eq!(clusters[1].count, 1);
}

#[test]
fn test_unknown_category_still_clusters() {
    let mut store = ClusterStore::new();
    store.ingest(TAB, report("HTML", "<p>a</p>", "  at render (app.js:4:2)", 1));
    store.ingest(TAB, report("Style", "color: red", "  at render (app.js:4:2)", 2));

    assert_eq!(store.list_by_cluster(TAB)[0].count, 2);
    assert_eq!(store.list_by_category(TAB)[&ViolationCategory::Markup].len(), 1);
}

// ============================================================================
// POLICY SYNTHESIS
// ============================================================================

/// Strips `onerror` only, standing in for the page-side sanitizer.
struct OnErrorStripper;

impl Sanitizer for OnErrorStripper {
    async fn sanitize(&self, html: &str) -> Result<String, SanitizeError> {
        match html {
            "<img src=x onerror=alert(1)>" => Ok("<img src=x>".into()),
            "<marquee onstart=go()>hi</marquee>" => Ok("<marquee>hi</marquee>".into()),
            other => Ok(other.to_string()),
        }
    }
}

fn synthesize_with<S: Sanitizer>(sanitizer: &S, store: &ClusterStore, config: SynthesisConfig) -> AllowlistPolicy {
    let inspector = HtmlInspector::default();
    let synthesizer = PolicySynthesizer::new(sanitizer, &inspector, config);
    smol::block_on(synthesizer.synthesize(store.list_by_cluster(TAB)))
}

#[test]
fn test_scenario_b_and_c() {
    let mut store = ClusterStore::new();
    store.ingest(TAB, report("Script", "console.log", "  at a (app.js:1:1)", 1));
    store.ingest(TAB, report("URL", "https://example.com/about", "  at b (app.js:2:2)", 2));

    let policy = synthesize_with(&OnErrorStripper, &store, SynthesisConfig::default());
    assert_eq!(policy.scripts, vec!["console.log"]);
    assert_eq!(policy.url_origins, vec!["https://example.com"]);
    assert!(policy.markup.tags.is_empty());
    assert!(policy.markup.violation_fragments.is_empty());
}

#[test]
fn test_scenario_d() {
    let mut store = ClusterStore::new();
    let payload = "<img src=x onerror=alert(1)>";
    store.ingest(TAB, report("HTML", payload, "  at render (app.js:4:2)", 1));

    let policy = synthesize_with(&OnErrorStripper, &store, SynthesisConfig::default());
    assert!(policy.markup.attributes.contains("onerror"));
    assert!(!policy.markup.attributes.contains("src"));
    assert_eq!(policy.markup.violation_fragments, vec![payload]);
}

#[test]
fn test_only_representatives_contribute() {
    let mut store = ClusterStore::new();
    store.ingest(TAB, report("Script", "first()", "  at a (app.js:1:1)", 1));
    store.ingest(TAB, report("Script", "second()", "  at a (app.js:1:1)", 2));

    let policy = synthesize_with(&OnErrorStripper, &store, SynthesisConfig::default());
    assert_eq!(policy.scripts, vec!["first()"]);
}

#[test]
fn test_last_wins_versus_union() {
    let mut store = ClusterStore::new();
    store.ingest(TAB, report("HTML", "<img src=x onerror=alert(1)>", "  at a (app.js:1:1)", 1));
    store.ingest(TAB, report("HTML", "<marquee onstart=go()>hi</marquee>", "  at b (app.js:2:2)", 2));

    let last = synthesize_with(&OnErrorStripper, &store, SynthesisConfig::default());
    assert_eq!(last.markup.attributes.iter().collect::<Vec<_>>(), vec!["onstart"]);
    assert_eq!(last.markup.violation_fragments.len(), 2);

    let union = synthesize_with(
        &OnErrorStripper,
        &store,
        SynthesisConfig { markup_merge: MarkupMerge::Union, ..Default::default() },
    );
    assert_eq!(union.markup.attributes.iter().collect::<Vec<_>>(), vec!["onerror", "onstart"]);
}

#[test]
fn test_synthesis_is_deterministic() {
    let mut store = ClusterStore::new();
    store.ingest(TAB, report("HTML", "<div onclick=x()><script>1</script><p>a</p></div>", "  at a (app.js:1:1)", 1));
    store.ingest(TAB, report("URL", "https://cdn.test/lib.js?v=1", "  at b (app.js:2:2)", 2));
    store.ingest(TAB, report("Script", "1+1", "  at c (app.js:3:3)", 3));

    let first = synthesize_with(&AllowlistSanitizer::default(), &store, SynthesisConfig::default());
    let second = synthesize_with(&AllowlistSanitizer::default(), &store, SynthesisConfig::default());
    assert_eq!(first, second);
    assert_eq!(first.markup.tags.iter().collect::<Vec<_>>(), vec!["script"]);
    assert_eq!(first.markup.attributes.iter().collect::<Vec<_>>(), vec!["onclick"]);
    assert_eq!(first.url_origins, vec!["https://cdn.test"]);
}
