use pretty_assertions::assert_eq;
use tokrules::{
    Expander, ExpanderConfig, MacroError, MacroRegistry, MacroRule, MacroRules, TranscriptionError,
    lex, render,
};

fn expand(source: &str) -> Result<String, MacroError> {
    Expander::new(MacroRegistry::with_builtins())?.expand(source)
}

#[test]
fn list_macro_end_to_end() {
    let rules = MacroRules::new(vec![MacroRule::parse("$($n:number),*", "[$($n),*]").unwrap()]);
    let mut registry = MacroRegistry::new();
    registry.define("list", rules);

    let output = registry.invoke("list", &lex("1, 2, 3").unwrap()).unwrap();
    assert_eq!(render(&output), "[1, 2, 3]");

    let output = registry.invoke("list", &[]).unwrap();
    assert_eq!(render(&output), "[]");
}

#[test]
fn defined_and_used_in_one_source() {
    let source = "\
macro_rules! square:
    [$x:tt]: ($x * $x)

def f(a):
    y = square!(a) + square![2]
";
    assert_eq!(expand(source).unwrap(), "def f(a):\n    y = (a * a) + (2 * 2)\n");
}

#[test]
fn block_invocation_and_block_template() {
    let source = "\
macro_rules! guarded:
    [$cond:tt $($body:tt)*]:
        if $cond:
            $($body)*

guarded!:
    ready
    run()
done()
";
    assert_eq!(
        expand(source).unwrap(),
        "if ready:\n    run()\ndone()"
    );
}

#[test]
fn macros_expand_inside_nested_groups() {
    let source = "\
macro_rules! one:
    []: 1

xs = [f(one!()), {'k': one!()}]
";
    assert_eq!(expand(source).unwrap(), "xs = [f(1), {'k': 1}]");
}

#[test]
fn recursive_rules_terminate_on_base_case() {
    let source = "\
macro_rules! rev:
    [[] $($done:tt)*]: [$($done),*]
    [[$head:tt $($tail:tt)*] $($done:tt)*]: rev!([$($tail)*] $head $($done)*)

rev!([1 2 3])
";
    assert_eq!(expand(source).unwrap(), "[3, 2, 1]");
}

#[test]
fn union_and_lookahead_in_user_rules() {
    let source = "\
macro_rules! kind:
    [$[(yes) | (true)]]: 1
    [$[!no] $x:name]: $x
    [no]: 0

a = kind!(yes), kind!(true), kind!(other), kind!(no)
";
    assert_eq!(expand(source).unwrap(), "a = 1, 1, other, 0");
}

#[test]
fn stringify_builtin() {
    assert_eq!(expand("s = stringify!(f(x) + 1)").unwrap(), r#"s = "f(x) + 1""#);
}

#[test]
fn unknown_macro_is_reported() {
    let err = expand("x = nope!(1)").unwrap_err();
    assert!(matches!(err, MacroError::UnknownMacro { ref name } if name == "nope"));
    assert_eq!(err.to_string(), "cannot find macro named `nope`");
}

#[test]
fn unmatched_arguments_are_reported() {
    let source = "\
macro_rules! pair:
    [$a:name, $b:name]: ($a, $b)

pair!(1)
";
    let err = expand(source).unwrap_err();
    assert!(matches!(err, MacroError::NoRuleMatched { ref name } if name == "pair"));
}

#[test]
fn transcription_error_names_macro_and_variable() {
    let source = "\
macro_rules! broken:
    [$a:name]: $b

broken!(x)
";
    match expand(source).unwrap_err() {
        MacroError::Transcription { name, source } => {
            assert_eq!(name, "broken");
            assert_eq!(
                source,
                TranscriptionError::UnknownVariable {
                    name: "b".to_owned()
                }
            );
        }
        other => panic!("expected transcription error, got {other:?}"),
    }
}

#[test]
fn invalid_definition_fails_before_use() {
    let source = "\
macro_rules! bad:
    [$[($a:name) | ($b:name)]]: x
";
    assert!(matches!(expand(source), Err(MacroError::Definition(_))));
}

#[test]
fn runaway_expansion_hits_rewrite_limit() {
    let source = "\
macro_rules! forever:
    []: forever!()

forever!()
";
    let mut expander = Expander::new(MacroRegistry::new())
        .unwrap()
        .with_config(ExpanderConfig {
            max_rewrites: Some(100),
        });
    assert!(matches!(
        expander.expand(source),
        Err(MacroError::RewriteLimit { limit: 100 })
    ));
    // The definition was made before the limit was hit
    assert!(expander.registry().is_defined("forever"));
}

#[test]
fn independent_macros_commute_and_output_is_stable() {
    let defs_ab = "\
macro_rules! a:
    []: 1
macro_rules! b:
    []: 2
";
    let defs_ba = "\
macro_rules! b:
    []: 2
macro_rules! a:
    []: 1
";
    let input = "x = (a!(), b!(), [b!()])";

    let mut first = MacroRegistry::new();
    first.load(defs_ab).unwrap();
    let mut second = MacroRegistry::new();
    second.load(defs_ba).unwrap();

    let mut expander = Expander::new(first).unwrap();
    let once = expander.expand(input).unwrap();
    assert_eq!(once, Expander::new(second).unwrap().expand(input).unwrap());
    assert_eq!(once, "x = (1, 2, [2])");
    assert_eq!(expander.expand(&once).unwrap(), once);
}

#[test]
fn source_without_macros_round_trips() {
    let source = "class A:\n    def f(self, x):\n        return {x: [1, 2]}\nprint(A().f(3))";
    assert_eq!(expand(source).unwrap(), source);
}
