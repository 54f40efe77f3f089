//! End-to-end scenarios: grammar in, tables out, text parsed to trees.

use tangram::ToolchainContext;
use tangram::automata::{CharSpan, Nfa};
use tangram::error::CollectingReporter;
use tangram::grammar::{BodySet, Grammar, SymbolRef};
use tangram::lr::{self, LrMethod};
use tangram::runtime::{self, LexerAutomaton, Lexer, ParseOutcome, ParserAutomaton, TextContent};

fn compile(grammar: &Grammar) -> (ParserAutomaton, LexerAutomaton) {
    let mut reporter = CollectingReporter::new();
    let (graph, rules) = lr::build(grammar, LrMethod::Lalr1, &mut reporter).expect("axiom");
    assert!(
        !reporter.has_errors(),
        "unexpected diagnostics: {:?}",
        reporter.diagnostics()
    );
    let parser = ParserAutomaton::emit(grammar, &graph, &rules).expect("deterministic tables");
    (parser, LexerAutomaton::emit(grammar))
}

fn run(
    parser: &ParserAutomaton,
    lexer_tables: &LexerAutomaton,
    input: &str,
) -> (ParseOutcome, TextContent) {
    let content = TextContent::new(input);
    let outcome = {
        let mut lexer = Lexer::new(lexer_tables, &content);
        runtime::parse(parser, &mut lexer)
    };
    (outcome, content)
}

fn assert_tree(
    parser: &ParserAutomaton,
    lexer_tables: &LexerAutomaton,
    input: &str,
    expected: &str,
) {
    let (outcome, content) = run(parser, lexer_tables, input);
    assert!(
        outcome.is_success(),
        "parse of {input:?} failed: {:?} {:?}",
        outcome.errors,
        outcome.lex_errors
    );
    let tree = outcome.tree.expect("tree");
    assert_eq!(tree.render(parser, &content), expected, "for input {input:?}");
}

fn assert_fails(parser: &ParserAutomaton, lexer_tables: &LexerAutomaton, input: &str) {
    let (outcome, _) = run(parser, lexer_tables, input);
    assert!(!outcome.is_success(), "parse of {input:?} should fail");
}

#[test]
fn optional_terminal() {
    // e -> A? with A = 'a'
    let mut grammar = Grammar::new("optional");
    let a = grammar.add_terminal_named("A", "a", Nfa::from_char('a'));
    let e = grammar.add_variable("e");
    let set = Grammar::body_optional(BodySet::of_symbol(SymbolRef::Terminal(a)));
    grammar.add_rules(e, set);
    grammar.add_option(Grammar::OPTION_AXIOM, "e");

    let (parser, lexer_tables) = compile(&grammar);
    assert_tree(&parser, &lexer_tables, "", "e");
    assert_tree(&parser, &lexer_tables, "a", "e(A)");
    assert_fails(&parser, &lexer_tables, "aa");
}

#[test]
fn starred_terminal() {
    // e -> A* with A = 'a'
    let mut ctx = ToolchainContext::new();
    let mut grammar = Grammar::new("star");
    let a = grammar.add_terminal_named("A", "a", Nfa::from_char('a'));
    let e = grammar.add_variable("e");
    let set = grammar.body_star(&mut ctx, BodySet::of_symbol(SymbolRef::Terminal(a)));
    grammar.add_rules(e, set);
    grammar.add_option(Grammar::OPTION_AXIOM, "e");

    let (parser, lexer_tables) = compile(&grammar);
    assert_tree(&parser, &lexer_tables, "", "e");
    assert_tree(&parser, &lexer_tables, "a", "e(A)");
    assert_tree(&parser, &lexer_tables, "aaa", "e(A A A)");
}

#[test]
fn separators_are_discarded_before_matching() {
    // e -> A+ with a whitespace separator
    let mut ctx = ToolchainContext::new();
    let mut grammar = Grammar::new("plus");
    let a = grammar.add_terminal_named("A", "a", Nfa::from_char('a'));
    grammar.add_terminal_named("SEPARATOR", " ", Nfa::plus(Nfa::from_char(' ')));
    let e = grammar.add_variable("e");
    let set = grammar.body_plus(&mut ctx, BodySet::of_symbol(SymbolRef::Terminal(a)));
    grammar.add_rules(e, set);
    grammar.add_option(Grammar::OPTION_AXIOM, "e");
    grammar.add_option(Grammar::OPTION_SEPARATOR, "SEPARATOR");

    let (parser, lexer_tables) = compile(&grammar);
    assert_tree(&parser, &lexer_tables, "a a   a", "e(A A A)");
    assert_tree(&parser, &lexer_tables, " a ", "e(A)");
    assert_fails(&parser, &lexer_tables, "");
}

#[test]
fn negated_character_class() {
    // e -> A X A with A = 'a', X = [^x-z]
    let mut grammar = Grammar::new("negated");
    let a = grammar.add_terminal_named("A", "a", Nfa::from_char('a'));
    let excluded = [CharSpan::new(u16::from(b'x'), u16::from(b'z'))];
    let x = grammar.add_terminal_named("X", "[^x-z]", Nfa::from_negated_class(&excluded));
    let e = grammar.add_variable("e");
    grammar.add_rule(
        e,
        tangram::grammar::RuleBody::from_symbols(&[
            SymbolRef::Terminal(a),
            SymbolRef::Terminal(x),
            SymbolRef::Terminal(a),
        ]),
    );
    grammar.add_option(Grammar::OPTION_AXIOM, "e");

    let (parser, lexer_tables) = compile(&grammar);
    assert_tree(&parser, &lexer_tables, "aba", "e(A X='b' A)");
    assert_fails(&parser, &lexer_tables, "axa");
    assert_fails(&parser, &lexer_tables, "aya");
    assert_fails(&parser, &lexer_tables, "aza");
}

#[test]
fn negated_multi_range_class() {
    // e -> A X A with X = [^x-z0-9], exercising the difference-style
    // complement across several ranges and boundary values.
    let mut grammar = Grammar::new("negated-multi");
    let a = grammar.add_terminal_named("A", "a", Nfa::from_char('a'));
    let excluded = [
        CharSpan::new(u16::from(b'x'), u16::from(b'z')),
        CharSpan::new(u16::from(b'0'), u16::from(b'9')),
    ];
    let x = grammar.add_terminal_named("X", "[^x-z0-9]", Nfa::from_negated_class(&excluded));
    let e = grammar.add_variable("e");
    grammar.add_rule(
        e,
        tangram::grammar::RuleBody::from_symbols(&[
            SymbolRef::Terminal(a),
            SymbolRef::Terminal(x),
            SymbolRef::Terminal(a),
        ]),
    );
    grammar.add_option(Grammar::OPTION_AXIOM, "e");

    let (parser, lexer_tables) = compile(&grammar);
    assert_tree(&parser, &lexer_tables, "aba", "e(A X='b' A)");
    assert_tree(&parser, &lexer_tables, "a!a", "e(A X='!' A)");
    for bad in ["axa", "aza", "a0a", "a9a", "a5a"] {
        assert_fails(&parser, &lexer_tables, bad);
    }
}

#[test]
fn terminal_difference_carves_out_keywords() {
    // WORD = [a-c]+ - 'ba', so "ba" alone must not lex as WORD.
    let mut grammar = Grammar::new("difference");
    let letters = Nfa::plus(Nfa::from_span(CharSpan::new(
        u16::from(b'a'),
        u16::from(b'c'),
    )));
    let word = Nfa::difference(letters, Nfa::from_str("ba"));
    let w = grammar.add_terminal_named("WORD", "[a-c]+ - ba", word);
    let e = grammar.add_variable("e");
    grammar.add_rule(e, tangram::grammar::RuleBody::single(SymbolRef::Terminal(w)));
    grammar.add_option(Grammar::OPTION_AXIOM, "e");

    let (parser, lexer_tables) = compile(&grammar);
    assert_tree(&parser, &lexer_tables, "abc", "e(WORD='abc')");
    assert_tree(&parser, &lexer_tables, "bab", "e(WORD='bab')");
    assert_fails(&parser, &lexer_tables, "ba");
}

#[test]
fn unexpected_token_reports_expected_terminals() {
    let mut grammar = Grammar::new("expected");
    let a = grammar.add_terminal_named("A", "a", Nfa::from_char('a'));
    let b = grammar.add_terminal_named("B", "b", Nfa::from_char('b'));
    let e = grammar.add_variable("e");
    grammar.add_rule(
        e,
        tangram::grammar::RuleBody::from_symbols(&[SymbolRef::Terminal(a), SymbolRef::Terminal(b)]),
    );
    grammar.add_option(Grammar::OPTION_AXIOM, "e");

    let (parser, lexer_tables) = compile(&grammar);
    let (outcome, _) = run(&parser, &lexer_tables, "aa");
    assert!(outcome.tree.is_none());
    let error = outcome.errors.first().expect("parse error");
    let message = error.to_string();
    assert!(message.contains('B'), "message should list B: {message}");
}

#[test]
fn tree_actions_shape_the_final_tree() {
    // e -> A PLUS^ A SEMI(drop) mark(virtual): the promoted operator
    // becomes the root, the semicolon disappears, the virtual symbol
    // lands as a plain child.
    use tangram::grammar::{BodyElement, RuleBody, TreeAction};

    let mut grammar = Grammar::new("actions");
    let a = grammar.add_terminal_named("A", "a", Nfa::from_char('a'));
    let plus = grammar.add_terminal_named("PLUS", "+", Nfa::from_char('+'));
    let semi = grammar.add_terminal_named("SEMI", ";", Nfa::from_char(';'));
    let mark = grammar.add_virtual("mark");
    let e = grammar.add_variable("e");
    grammar.add_rule(
        e,
        RuleBody {
            elements: vec![
                BodyElement::new(SymbolRef::Terminal(a)),
                BodyElement::with_action(SymbolRef::Terminal(plus), TreeAction::Promote),
                BodyElement::new(SymbolRef::Terminal(a)),
                BodyElement::with_action(SymbolRef::Terminal(semi), TreeAction::Drop),
                BodyElement::new(SymbolRef::Virtual(mark)),
            ],
        },
    );
    grammar.add_option(Grammar::OPTION_AXIOM, "e");

    let (parser, lexer_tables) = compile(&grammar);
    assert_tree(&parser, &lexer_tables, "a+a;", "PLUS(A A mark)");
}

#[test]
fn semantic_actions_fire_at_reduction_time() {
    use tangram::grammar::{BodyElement, RuleBody};
    use tangram::runtime::SemanticListener;

    struct Recorder(Vec<tangram::Sid>);
    impl SemanticListener for Recorder {
        fn on_action(&mut self, sid: tangram::Sid) {
            self.0.push(sid);
        }
    }

    let mut grammar = Grammar::new("actions");
    let a = grammar.add_terminal_named("A", "a", Nfa::from_char('a'));
    let on_a = grammar.add_action("OnA");
    let e = grammar.add_variable("e");
    grammar.add_rule(
        e,
        RuleBody {
            elements: vec![
                BodyElement::new(SymbolRef::Terminal(a)),
                BodyElement::new(SymbolRef::Action(on_a)),
            ],
        },
    );
    grammar.add_option(Grammar::OPTION_AXIOM, "e");

    let (parser, lexer_tables) = compile(&grammar);
    let content = TextContent::new("a");
    let mut lexer = Lexer::new(&lexer_tables, &content);
    let mut recorder = Recorder(Vec::new());
    let outcome = runtime::parse_with_listener(&parser, &mut lexer, Some(&mut recorder));
    assert!(outcome.is_success());
    assert_eq!(recorder.0, vec![on_a]);
    // The action symbol never shows up in the tree.
    let tree = outcome.tree.expect("tree");
    assert_eq!(tree.render(&parser, &content), "e(A)");
}

#[test]
fn lr0_method_handles_parenthesized_grammar() {
    // s -> LP s RP | X is LR(0): every state is pure shift or pure reduce.
    let mut grammar = Grammar::new("lr0");
    let x = grammar.add_terminal_named("X", "x", Nfa::from_char('x'));
    let lp = grammar.add_terminal_named("LP", "(", Nfa::from_char('('));
    let rp = grammar.add_terminal_named("RP", ")", Nfa::from_char(')'));
    let s = grammar.add_variable("s");
    grammar.add_rule(
        s,
        tangram::grammar::RuleBody::from_symbols(&[
            SymbolRef::Terminal(lp),
            SymbolRef::Variable(s),
            SymbolRef::Terminal(rp),
        ]),
    );
    grammar.add_rule(s, tangram::grammar::RuleBody::single(SymbolRef::Terminal(x)));
    grammar.add_option(Grammar::OPTION_AXIOM, "s");

    let mut reporter = CollectingReporter::new();
    let (graph, rules) = lr::build(&grammar, LrMethod::Lr0, &mut reporter).expect("axiom");
    assert_eq!(graph.unresolved_conflicts(), 0);
    let parser = ParserAutomaton::emit(&grammar, &graph, &rules).expect("lr0 tables");
    let lexer_tables = LexerAutomaton::emit(&grammar);

    assert_tree(&parser, &lexer_tables, "x", "s(X)");
    assert_tree(&parser, &lexer_tables, "((x))", "s(LP s(LP s(X) RP) RP)");
    assert_fails(&parser, &lexer_tables, "(x");
    assert_fails(&parser, &lexer_tables, "x)");
}

#[test]
fn trees_are_stable_across_repeated_runs() {
    let mut ctx = ToolchainContext::new();
    let mut grammar = Grammar::new("stable");
    let a = grammar.add_terminal_named("A", "a", Nfa::from_char('a'));
    let e = grammar.add_variable("e");
    let set = grammar.body_star(&mut ctx, BodySet::of_symbol(SymbolRef::Terminal(a)));
    grammar.add_rules(e, set);
    grammar.add_option(Grammar::OPTION_AXIOM, "e");

    let mut renders = Vec::new();
    for _ in 0..3 {
        let (parser, lexer_tables) = compile(&grammar);
        let (outcome, content) = run(&parser, &lexer_tables, "aaaa");
        renders.push(outcome.tree.expect("tree").render(&parser, &content));
    }
    assert!(renders.windows(2).all(|w| w[0] == w[1]), "{renders:?}");
}
