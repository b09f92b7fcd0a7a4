//! Tokenizer and parser for the vsql SELECT dialect.
//!
//! [`parse`] drives the [`Tokenizer`] and the grammar automaton one token
//! at a time. Every token is moved into the [`ParseTree`] arena before the
//! automaton sees it, and the automaton's semantic actions build the tree
//! in place.

mod automaton;
pub mod config;
pub mod lexer;

use std::sync::Arc;

use tracing::{Level, debug, enabled, trace};
use vsql_ast::{ParseTree, TreePrinter};
use vsql_error::{Result, VsqlError};

use crate::automaton::{Automaton, Feed};
pub use crate::config::ParserConfig;
pub use crate::lexer::{Tokenizer, tokenize};

/// Parse one SELECT statement with the default configuration.
pub fn parse(sql: &str) -> Result<ParseTree> {
    parse_with(sql, &ParserConfig::default())
}

/// Parse one SELECT statement.
///
/// On a syntax error the returned error names the most recently consumed
/// token and its position; the partial tree is dropped.
pub fn parse_with(sql: &str, config: &ParserConfig) -> Result<ParseTree> {
    if sql.len() > config.max_sql_length {
        return Err(VsqlError::SqlTooLong {
            length: sql.len(),
            max: config.max_sql_length,
        });
    }

    let source: Arc<str> = Arc::from(config.source_name.as_str());
    debug!(source = %source, len = sql.len(), "parse start");

    let mut tree = ParseTree::new(Arc::clone(&source));
    let mut tokenizer = Tokenizer::with_source(sql, source);
    let mut automaton = Automaton::new();

    loop {
        let token = tokenizer.next_token()?;
        trace!(kind = %token.kind, text = %token.text, offset = token.info.offset, "feed token");
        let id = tree.push_token(token);
        if automaton.feed(&mut tree, id)? == Feed::Accepted {
            break;
        }
    }

    debug!(
        tokens = tree.tokens().len(),
        nodes = tree.len(),
        "parse finished"
    );
    if enabled!(Level::TRACE) {
        match outline(&tree)? {
            Some(outline) => trace!(%outline, "parse tree"),
            None => trace!("parse tree too deep to outline"),
        }
    }
    Ok(tree)
}

/// Deepest tree rendered in trace output. [`TreePrinter`] recurses once
/// per level.
const OUTLINE_MAX_HEIGHT: usize = 64;

fn outline(tree: &ParseTree) -> Result<Option<String>> {
    match tree.root() {
        Some(root) if tree.height(root) <= OUTLINE_MAX_HEIGHT => {
            TreePrinter::render(tree, root).map(Some)
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use vsql_ast::{ExprOp, NodeKind, NodeType, TreePrinter};
    use vsql_error::ErrorLocation;

    use super::*;

    fn select(tree: &ParseTree) -> vsql_ast::NodeId {
        tree.select().unwrap()
    }

    fn attrs(tree: &ParseTree) -> Vec<vsql_ast::NodeId> {
        let list = tree.child_of_type(select(tree), NodeType::AttrList).unwrap();
        tree.children(list).to_vec()
    }

    fn where_expr(tree: &ParseTree) -> vsql_ast::NodeId {
        let clause = tree.child_of_type(select(tree), NodeType::Where).unwrap();
        tree.children(clause)[1]
    }

    fn render(tree: &ParseTree, id: vsql_ast::NodeId) -> String {
        match tree.kind(id) {
            NodeKind::Expr(op) if op.is_unary() => {
                let operand = render(tree, tree.children(id)[0]);
                match op {
                    ExprOp::IsNull | ExprOp::IsNotNull => format!("({operand} {op})"),
                    _ => format!("({op} {operand})"),
                }
            }
            NodeKind::Expr(op) => {
                let kids = tree.children(id);
                format!("({} {op} {})", render(tree, kids[0]), render(tree, kids[1]))
            }
            NodeKind::FuncCall => {
                let kids = tree.children(id);
                let args: Vec<_> = kids[1..].iter().map(|&k| render(tree, k)).collect();
                format!("{}({})", render(tree, kids[0]), args.join(", "))
            }
            NodeKind::IdGroup => tree.name_parts(id).join("."),
            _ => tree.token_text(id).unwrap_or_default().to_owned(),
        }
    }

    #[test]
    fn test_parse_minimal() {
        let tree = parse("SELECT a FROM t").unwrap();
        let sel = select(&tree);
        let kinds: Vec<_> = tree
            .children(sel)
            .iter()
            .map(|&c| tree.node(c).nodetype())
            .collect();
        assert_eq!(
            kinds,
            vec![NodeType::Token, NodeType::AttrList, NodeType::From]
        );
        assert_eq!(tree.info(sel).offset, 0);
        assert_eq!(tree.info(sel).end(), 15);
    }

    #[test]
    fn test_parse_star_and_qualified_star() {
        let tree = parse("SELECT *, c.* FROM customers c").unwrap();
        let attrs = attrs(&tree);
        assert_eq!(tree.node(attrs[0]).nodetype(), NodeType::AllAttr);
        assert_eq!(tree.children(attrs[0]).len(), 1);
        assert_eq!(tree.node(attrs[1]).nodetype(), NodeType::AllAttr);
        let group = tree.children(attrs[1])[0];
        assert_eq!(tree.name_parts(group), vec!["c"]);
    }

    #[test]
    fn test_parse_aliases() {
        let tree = parse("SELECT t.name AS n, 1 + 2 total FROM sales.public.customers AS t").unwrap();
        let attrs = attrs(&tree);
        let first = tree.children(attrs[0]);
        assert_eq!(tree.node(attrs[0]).nodetype(), NodeType::Alias);
        assert_eq!(first.len(), 3);
        assert_eq!(tree.name_parts(first[0]), vec!["t", "name"]);
        assert_eq!(tree.token_text(first[2]), Some("n"));
        let second = tree.children(attrs[1]);
        assert_eq!(second.len(), 2);
        assert_eq!(render(&tree, second[0]), "(1 + 2)");

        let from = tree.child_of_type(select(&tree), NodeType::From).unwrap();
        let src = tree.children(from)[1];
        assert_eq!(tree.node(src).nodetype(), NodeType::Alias);
        let group = tree.children(src)[0];
        assert_eq!(tree.name_parts(group), vec!["sales", "public", "customers"]);
    }

    #[test]
    fn test_parse_precedence() {
        let cases = [
            ("a + b * c", "(a + (b * c))"),
            ("a * b + c", "((a * b) + c)"),
            ("a - b - c", "((a - b) - c)"),
            ("a OR b AND c", "(a OR (b AND c))"),
            ("NOT a = b", "(NOT (a = b))"),
            ("NOT a AND b", "((NOT a) AND b)"),
            ("-a * b", "((- a) * b)"),
            ("a || b + c", "((a || b) + c)"),
            ("a < b = c > d", "((a < b) = (c > d))"),
            ("a + b IS NULL", "((a + b) IS NULL)"),
            ("NOT a IS NOT NULL", "(NOT (a IS NOT NULL))"),
            ("(a + b) * c", "((a + b) * c)"),
            ("a MOD 2 % 3", "((a MOD 2) MOD 3)"),
            ("a XOR b OR c", "((a XOR b) OR c)"),
        ];
        for (expr, expected) in cases {
            let tree = parse(&format!("SELECT 1 FROM t WHERE {expr}")).unwrap();
            assert_eq!(render(&tree, where_expr(&tree)), expected, "{expr}");
        }
    }

    #[test]
    fn test_parse_function_calls() {
        let tree = parse("SELECT upper(name), coalesce(a, b + 1, 0), f() FROM t").unwrap();
        let attrs = attrs(&tree);
        assert_eq!(render(&tree, attrs[0]), "upper(name)");
        assert_eq!(render(&tree, attrs[1]), "coalesce(a, (b + 1), 0)");
        assert_eq!(render(&tree, attrs[2]), "f()");
    }

    #[test]
    fn test_parse_params_and_literals() {
        let tree = parse("SELECT ?, 'x', NULL, 2.5 FROM t WHERE c = ?;").unwrap();
        let kinds: Vec<_> = attrs(&tree)
            .iter()
            .map(|&a| tree.node(a).nodetype())
            .collect();
        assert_eq!(
            kinds,
            vec![
                NodeType::Param,
                NodeType::Literal,
                NodeType::Null,
                NodeType::Number
            ]
        );
        assert_eq!(render(&tree, where_expr(&tree)), "(c = ?)");
    }

    #[test]
    fn test_parse_node_spans_cover_children() {
        let sql = "SELECT a FROM t WHERE (x + 10) * y > 3";
        let tree = parse(sql).unwrap();
        for id in tree.node_ids() {
            let info = tree.info(id);
            for &child in tree.children(id) {
                let c = tree.info(child);
                assert!(info.offset <= c.offset && c.end() <= info.end());
            }
        }
        let expr = where_expr(&tree);
        assert_eq!(tree.info(expr).slice(sql), Some("x + 10) * y > 3"));
    }

    #[test]
    fn test_parse_syntax_errors() {
        let cases = [
            ("SELEKT a FROM t", "SELEKT", 0),
            ("SELECT a FORM t", "t", 14),
            ("SELECT a, FROM t", "FROM", 10),
            ("SELECT a FROM", "end of input", 13),
            ("SELECT a FROM t WHERE", "end of input", 21),
            ("SELECT (a FROM t", "FROM", 10),
            ("SELECT a FROM t; x", "x", 17),
            ("SELECT a FROM t WHERE b.*", "*", 24),
            ("SELECT a IS b FROM t", "b", 12),
            ("SELECT a FROM w.x.y.z", ".", 19),
        ];
        for (sql, token, offset) in cases {
            let err = parse(sql).unwrap_err();
            let length = if token == "end of input" { 0 } else { token.len() };
            let at = ErrorLocation::new("<sql>", 1, offset, length);
            assert_eq!(err, VsqlError::syntax(token, at), "{sql}");
        }
    }

    #[test]
    fn test_errors_carry_source_name() {
        let config = ParserConfig::default().with_source_name("report.sql");
        let err = parse_with("SELECT a\nFROM t WHERE", &config).unwrap_err();
        assert_eq!(
            err.location(),
            Some(&ErrorLocation::new("report.sql", 2, 21, 0))
        );
        let err = parse_with("SELECT a FROM t WHERE a # 1", &config).unwrap_err();
        assert_eq!(
            err.location(),
            Some(&ErrorLocation::new("report.sql", 1, 24, 1))
        );
    }

    #[test]
    fn test_parse_lexical_error_propagates() {
        let err = parse("SELECT a FROM t WHERE a # 1").unwrap_err();
        assert!(matches!(err, VsqlError::InvalidCharacter { ch: '#', .. }));
    }

    #[test]
    fn test_parse_too_long() {
        let config = ParserConfig::default().with_max_sql_length(8).unwrap();
        let err = parse_with("SELECT a FROM t", &config).unwrap_err();
        assert_eq!(err, VsqlError::SqlTooLong { length: 15, max: 8 });
    }

    #[test]
    fn test_parse_source_name_stamped() {
        let config = ParserConfig::default().with_source_name("report.sql");
        let tree = parse_with("SELECT a FROM t", &config).unwrap();
        assert!(tree.tokens().iter().all(|t| &*t.info.source == "report.sql"));
    }

    #[test]
    fn test_deep_nesting_parses_without_outline() {
        let depth = 10_000;
        let sql = format!("SELECT {}?{} FROM t", "(-".repeat(depth), ")".repeat(depth));
        let tree = parse(&sql).unwrap();
        assert!(tree.height(tree.root().unwrap()) > depth);
        assert_eq!(outline(&tree).unwrap(), None);
        let shallow = parse("SELECT -a FROM t").unwrap();
        assert!(outline(&shallow).unwrap().is_some_and(|text| text.contains("ExprNode(-)")));
    }

    #[test]
    fn test_tree_printer_outline() {
        let tree = parse("SELECT a FROM t").unwrap();
        let text = TreePrinter::render_tree(&tree).unwrap();
        assert_eq!(
            text,
            "ParseTree [0..15]\n  SelectNode [0..15]\n    TokenNode 'SELECT' [0..6]\n    AttrListNode [7..8]\n      IdGroupNode [7..8]\n        IdNode 'a' [7..8]\n    FromNode [9..15]\n      TokenNode 'FROM' [9..13]\n      IdGroupNode [14..15]\n        IdNode 't' [14..15]\n"
        );
    }

    mod proptest_parse {
        use proptest::prelude::*;
        use vsql_ast::lookup_keyword;

        use super::*;

        fn arb_ident() -> BoxedStrategy<String> {
            prop::string::string_regex("[a-z][a-z0-9_]{0,6}")
                .expect("valid regex")
                .prop_filter("must not be keyword", |s| lookup_keyword(s).is_none())
                .boxed()
        }

        fn arb_expr(depth: u32) -> BoxedStrategy<String> {
            let leaf = prop_oneof![
                arb_ident(),
                (0u32..1000).prop_map(|n| n.to_string()),
                arb_ident().prop_map(|s| format!("'{s}'")),
                Just("NULL".to_owned()),
                Just("?".to_owned()),
            ];
            if depth == 0 {
                return leaf.boxed();
            }
            let ops = prop::sample::select(vec![
                "+", "-", "*", "/", "MOD", "||", "=", "!=", "<", ">=", "AND", "OR", "XOR",
            ]);
            prop_oneof![
                leaf,
                (arb_expr(depth - 1), ops, arb_expr(depth - 1))
                    .prop_map(|(l, op, r)| format!("{l} {op} {r}")),
                arb_expr(depth - 1).prop_map(|e| format!("({e})")),
                arb_expr(depth - 1).prop_map(|e| format!("NOT {e}")),
                arb_expr(depth - 1).prop_map(|e| format!("{e} IS NOT NULL")),
            ]
            .boxed()
        }

        proptest! {
            #[test]
            fn generated_selects_parse(
                attrs in prop::collection::vec(arb_expr(2), 1..4),
                tables in prop::collection::vec(arb_ident(), 1..3),
                predicate in proptest::option::of(arb_expr(3)),
            ) {
                let mut sql = format!("SELECT {} FROM {}", attrs.join(", "), tables.join(", "));
                if let Some(p) = &predicate {
                    sql.push_str(" WHERE ");
                    sql.push_str(p);
                }
                let tree = parse(&sql).unwrap();
                let sel = tree.select().unwrap();
                let list = tree.child_of_type(sel, NodeType::AttrList).unwrap();
                prop_assert_eq!(tree.children(list).len(), attrs.len());
                let from = tree.child_of_type(sel, NodeType::From).unwrap();
                prop_assert_eq!(tree.children(from).len(), tables.len() + 1);
                prop_assert_eq!(
                    tree.child_of_type(sel, NodeType::Where).is_some(),
                    predicate.is_some()
                );
            }
        }
    }
}
