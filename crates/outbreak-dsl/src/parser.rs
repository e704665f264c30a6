use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::ast::*;
use crate::lexer::Token;

type Span = SimpleSpan;
type Extra<'a> = extra::Err<Rich<'a, Token>>;

/// Parse error with source span.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Where parsing failed.
    pub span: std::ops::Range<usize>,
    /// What was expected.
    pub message: String,
}

/// Words that can never name a local.
const RESERVED: &[&str] = &[
    "let", "if", "else", "return", "pass", "and", "or", "not", "true", "false", "choose",
];

fn is_reserved(word: &str) -> bool {
    RESERVED.contains(&word)
}

fn spanned<T>(node: T, span: Span) -> Spanned<T> {
    Spanned {
        node,
        span: span.into_range(),
    }
}

fn fold_binary(lhs: Spanned<Expr>, (op, rhs): (BinaryOp, Spanned<Expr>)) -> Spanned<Expr> {
    let span = lhs.span.start..rhs.span.end;
    Spanned {
        node: Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    }
}

fn fold_unary((op, op_span): (UnaryOp, Span), rhs: Spanned<Expr>) -> Spanned<Expr> {
    let span = op_span.into_range().start..rhs.span.end;
    Spanned {
        node: Expr::Unary {
            op,
            expr: Box::new(rhs),
        },
        span,
    }
}

/// Build the expression parser.
///
/// Precedence, loosest first: `or`, `and`, `not`, comparisons, `+ -`,
/// `* /`, unary `-`, atoms. `not` binds looser than comparisons so that
/// `not sickness > 50` reads as expected.
fn expr_parser<'a, I>() -> impl Parser<'a, I, Spanned<Expr>, Extra<'a>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = Span>,
{
    let kw = |k: &'static str| select! { Token::Word(ref w) if w.as_str() == k => () }.labelled(k);
    let name = select! { Token::Word(w) if !is_reserved(&w) => w }.labelled("name");
    let nl = just(Token::Newline).repeated().to(());

    recursive(|expr| {
        let literal = select! {
            Token::Integer(n) => Expr::Integer(n),
            Token::Float(n) => Expr::Float(n),
            Token::Str(s) => Expr::Str(s),
            Token::Word(ref w) if w.as_str() == "true" => Expr::Boolean(true),
            Token::Word(ref w) if w.as_str() == "false" => Expr::Boolean(false),
        }
        .labelled("literal");

        let args = expr
            .clone()
            .separated_by(just(Token::Comma).then(nl.clone()))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(
                just(Token::LParen).then(nl.clone()),
                nl.clone().then(just(Token::RParen)),
            );

        let call = name
            .clone()
            .map_with(|n, e| spanned(n, e.span()))
            .then(args)
            .map(|(name, args)| Expr::Call { name, args })
            .labelled("call");

        let weight = select! {
            Token::Integer(n) => n as f64,
            Token::Float(n) => n,
        }
        .map_with(|w, e| spanned(w, e.span()))
        .labelled("weight");

        let choose = kw("choose")
            .ignore_then(
                weight
                    .then_ignore(just(Token::Colon))
                    .then(expr.clone())
                    .separated_by(just(Token::Comma).then(nl.clone()))
                    .allow_trailing()
                    .at_least(1)
                    .collect::<Vec<_>>()
                    .delimited_by(
                        just(Token::LBrace).then(nl.clone()),
                        nl.clone().then(just(Token::RBrace)),
                    ),
            )
            .map(Expr::Choose)
            .labelled("choose");

        let atom = choice((literal, choose, call, name.map(Expr::Name)))
            .map_with(|node, e| spanned(node, e.span()))
            .or(expr.delimited_by(just(Token::LParen), just(Token::RParen)))
            .labelled("expression")
            .boxed();

        let neg = just(Token::Minus)
            .to(UnaryOp::Neg)
            .map_with(|op, e| (op, e.span()))
            .repeated()
            .foldr(atom, fold_unary)
            .boxed();

        let product = neg
            .clone()
            .foldl(
                choice((
                    just(Token::Star).to(BinaryOp::Mul),
                    just(Token::Slash).to(BinaryOp::Div),
                ))
                .then(neg)
                .repeated(),
                fold_binary,
            )
            .boxed();

        let sum = product
            .clone()
            .foldl(
                choice((
                    just(Token::Plus).to(BinaryOp::Add),
                    just(Token::Minus).to(BinaryOp::Sub),
                ))
                .then(product)
                .repeated(),
                fold_binary,
            )
            .boxed();

        let comparison = sum
            .clone()
            .foldl(
                choice((
                    just(Token::EqEq).to(BinaryOp::Eq),
                    just(Token::NotEq).to(BinaryOp::NotEq),
                    just(Token::Le).to(BinaryOp::Le),
                    just(Token::Ge).to(BinaryOp::Ge),
                    just(Token::Lt).to(BinaryOp::Lt),
                    just(Token::Gt).to(BinaryOp::Gt),
                ))
                .then(sum)
                .repeated(),
                fold_binary,
            )
            .boxed();

        let negation = kw("not")
            .to(UnaryOp::Not)
            .map_with(|op, e| (op, e.span()))
            .repeated()
            .foldr(comparison, fold_unary)
            .boxed();

        let conjunction = negation
            .clone()
            .foldl(
                kw("and").to(BinaryOp::And).then(negation).repeated(),
                fold_binary,
            )
            .boxed();

        conjunction
            .clone()
            .foldl(
                kw("or").to(BinaryOp::Or).then(conjunction).repeated(),
                fold_binary,
            )
            .boxed()
    })
}

/// Build the statement parser. Blocks nest through `if`.
fn statement_parser<'a, I>() -> impl Parser<'a, I, Spanned<Stmt>, Extra<'a>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = Span>,
{
    let kw = |k: &'static str| select! { Token::Word(ref w) if w.as_str() == k => () }.labelled(k);
    let name = select! { Token::Word(w) if !is_reserved(&w) => w }
        .map_with(|n, e| spanned(n, e.span()))
        .labelled("name");
    let nl = just(Token::Newline).repeated().to(());
    let nl1 = just(Token::Newline).repeated().at_least(1).to(());
    let expr = expr_parser();

    recursive(|stmt| {
        let block = stmt
            .separated_by(nl1.clone())
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(
                just(Token::LBrace).then(nl.clone()),
                nl.clone().then(just(Token::RBrace)),
            )
            .labelled("block");

        let let_stmt = kw("let")
            .ignore_then(name.clone())
            .then_ignore(just(Token::Assign))
            .then(expr.clone())
            .map(|(name, value)| Stmt::Let { name, value });

        let assign = name
            .then_ignore(just(Token::Assign))
            .then(expr.clone())
            .map(|(target, value)| Stmt::Assign { target, value });

        let else_if = kw("else")
            .ignore_then(kw("if"))
            .ignore_then(expr.clone())
            .then(block.clone());

        let if_stmt = kw("if")
            .ignore_then(expr.clone())
            .then(block.clone())
            .then(else_if.repeated().collect::<Vec<_>>())
            .then(kw("else").ignore_then(block).or_not())
            .map(|((first, rest), otherwise)| {
                let mut branches = Vec::with_capacity(rest.len() + 1);
                branches.push(first);
                branches.extend(rest);
                Stmt::If {
                    branches,
                    otherwise,
                }
            });

        let return_stmt = kw("return")
            .ignore_then(expr.clone().or_not())
            .map(Stmt::Return);

        let pass = kw("pass").to(Stmt::Pass);

        // Assignment before bare expressions: both start with a name.
        choice((
            let_stmt,
            if_stmt,
            return_stmt,
            pass,
            assign,
            expr.clone().map(Stmt::Expr),
        ))
        .map_with(|s, e| spanned(s, e.span()))
        .labelled("statement")
    })
}

fn effect_parser<'a, I>() -> impl Parser<'a, I, Block, Extra<'a>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = Span>,
{
    let nl = just(Token::Newline).repeated().to(());
    let nl1 = just(Token::Newline).repeated().at_least(1).to(());
    statement_parser()
        .separated_by(nl1)
        .allow_trailing()
        .collect::<Vec<_>>()
        .padded_by(nl)
        .then_ignore(end())
}

fn predicate_parser<'a, I>() -> impl Parser<'a, I, Spanned<Expr>, Extra<'a>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = Span>,
{
    let nl = just(Token::Newline).repeated().to(());
    expr_parser().padded_by(nl).then_ignore(end())
}

/// Build the catalog file parser.
///
/// Script bodies are not parsed here: a body is any brace-balanced token run,
/// recorded by span so the compiler can slice the original text out.
fn catalog_parser<'a, I>() -> impl Parser<'a, I, CatalogFile, Extra<'a>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = Span>,
{
    let kw = |k: &'static str| select! { Token::Word(ref w) if w.as_str() == k => () }.labelled(k);
    let word = select! { Token::Word(w) => w }
        .map_with(|w, e| spanned(w, e.span()))
        .labelled("word");
    let string_lit = select! { Token::Str(s) => s }.labelled("string");
    let integer = select! { Token::Integer(n) => n }.labelled("integer");
    let nl = just(Token::Newline).repeated().to(());
    let nl1 = just(Token::Newline).repeated().at_least(1).to(());

    let body = recursive(|body| {
        choice((body, none_of([Token::LBrace, Token::RBrace]).ignored()))
            .repeated()
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
    })
    .map_with(|_, e| {
        let span: Span = e.span();
        PropertyValue::Body(span.into_range())
    })
    .labelled("script body");

    let value = choice((
        string_lit.map(PropertyValue::Str),
        integer.map(PropertyValue::Integer),
        kw("true").to(PropertyValue::Boolean(true)),
        kw("false").to(PropertyValue::Boolean(false)),
        body,
    ))
    .labelled("property value");

    let property = word
        .clone()
        .then(value)
        .map(|(key, value)| ItemProperty { key, value })
        .map_with(|p, e| spanned(p, e.span()))
        .labelled("property");

    let item = kw("item")
        .ignore_then(word)
        .then(
            property
                .separated_by(nl1.clone())
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(
                    just(Token::LBrace).then(nl.clone()),
                    nl.clone().then(just(Token::RBrace)),
                ),
        )
        .map(|(id, properties)| ItemDecl { id, properties })
        .map_with(|decl, e| spanned(decl, e.span()))
        .labelled("item declaration");

    item.separated_by(nl1)
        .allow_trailing()
        .collect::<Vec<_>>()
        .padded_by(nl)
        .then_ignore(end())
        .map(|items| CatalogFile { items })
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

fn to_parse_errors(errors: Vec<Rich<'_, Token>>) -> Vec<ParseError> {
    errors
        .into_iter()
        .map(|e| ParseError {
            span: e.span().into_range(),
            message: e.to_string(),
        })
        .collect()
}

fn end_of_input(tokens: &[(Token, std::ops::Range<usize>)]) -> Span {
    let len = tokens.last().map_or(0, |(_, s)| s.end);
    (len..len).into()
}

/// Parse a catalog definition file.
pub fn parse_catalog(tokens: &[(Token, std::ops::Range<usize>)]) -> Result<CatalogFile, Vec<ParseError>> {
    let token_iter = tokens
        .iter()
        .map(|(tok, span)| (tok.clone(), Span::from(span.clone())));
    let stream = Stream::from_iter(token_iter).map(end_of_input(tokens), |(t, s): (_, _)| (t, s));

    let (output, errors) = catalog_parser().parse(stream).into_output_errors();
    match output {
        Some(ast) if errors.is_empty() => Ok(ast),
        _ => Err(to_parse_errors(errors)),
    }
}

/// Parse an effect body: newline-separated statements.
pub fn parse_effect(tokens: &[(Token, std::ops::Range<usize>)]) -> Result<Block, Vec<ParseError>> {
    let token_iter = tokens
        .iter()
        .map(|(tok, span)| (tok.clone(), Span::from(span.clone())));
    let stream = Stream::from_iter(token_iter).map(end_of_input(tokens), |(t, s): (_, _)| (t, s));

    let (output, errors) = effect_parser().parse(stream).into_output_errors();
    match output {
        Some(ast) if errors.is_empty() => Ok(ast),
        _ => Err(to_parse_errors(errors)),
    }
}

/// Parse a predicate body: a single expression.
pub fn parse_predicate(
    tokens: &[(Token, std::ops::Range<usize>)],
) -> Result<Spanned<Expr>, Vec<ParseError>> {
    let token_iter = tokens
        .iter()
        .map(|(tok, span)| (tok.clone(), Span::from(span.clone())));
    let stream = Stream::from_iter(token_iter).map(end_of_input(tokens), |(t, s): (_, _)| (t, s));

    let (output, errors) = predicate_parser().parse(stream).into_output_errors();
    match output {
        Some(ast) if errors.is_empty() => Ok(ast),
        _ => Err(to_parse_errors(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;

    fn effect(source: &str) -> Block {
        let (tokens, lex_errors) = lexer::lex(source);
        assert!(lex_errors.is_empty(), "lex errors: {lex_errors:?}");
        parse_effect(&tokens).unwrap_or_else(|e| panic!("parse errors: {e:?}"))
    }

    fn predicate(source: &str) -> Spanned<Expr> {
        let (tokens, lex_errors) = lexer::lex(source);
        assert!(lex_errors.is_empty(), "lex errors: {lex_errors:?}");
        parse_predicate(&tokens).unwrap_or_else(|e| panic!("parse errors: {e:?}"))
    }

    fn effect_errors(source: &str) -> Vec<ParseError> {
        let (tokens, _) = lexer::lex(source);
        parse_effect(&tokens).unwrap_err()
    }

    #[test]
    fn parse_field_assignment() {
        let body = effect("masked = true");
        assert_eq!(body.len(), 1);
        match &body[0].node {
            Stmt::Assign { target, value } => {
                assert_eq!(target.node, "masked");
                assert_eq!(value.node, Expr::Boolean(true));
            }
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn parse_empty_effect() {
        assert!(effect("\n  \n").is_empty());
    }

    #[test]
    fn parse_if_else_chain() {
        let body = effect(
            "if sickness >= 30 {\n    sickness = sickness - randint(8, 16)\n} else if sickness >= 10 {\n    sickness = max(sickness - 3, 10)\n} else {\n    pass\n}",
        );
        match &body[0].node {
            Stmt::If {
                branches,
                otherwise,
            } => {
                assert_eq!(branches.len(), 2);
                assert_eq!(branches[0].1.len(), 1);
                assert!(matches!(
                    otherwise.as_deref(),
                    Some([Spanned { node: Stmt::Pass, .. }])
                ));
            }
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn parse_return_forms() {
        let body = effect("if infected {\n    return add_sickness(-5)\n}\nreturn");
        assert!(matches!(&body[1].node, Stmt::Return(None)));
        match &body[0].node {
            Stmt::If { branches, .. } => match &branches[0].1[0].node {
                Stmt::Return(Some(value)) => {
                    assert!(matches!(&value.node, Expr::Call { name, args } if name.node == "add_sickness" && args.len() == 1));
                }
                other => panic!("expected return, got {other:?}"),
            },
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn parse_let_and_call_statement() {
        let body = effect("let answer = ask_number(\"How many?\")\nnarrate(\"ok\")");
        assert!(matches!(&body[0].node, Stmt::Let { name, .. } if name.node == "answer"));
        assert!(matches!(&body[1].node, Stmt::Expr(_)));
    }

    #[test]
    fn parse_choose() {
        let body = effect("return choose {\n    10: cure(),\n    90: add_sickness(randint(-20, -5)),\n}");
        match &body[0].node {
            Stmt::Return(Some(value)) => match &value.node {
                Expr::Choose(arms) => {
                    assert_eq!(arms.len(), 2);
                    assert_eq!(arms[0].0.node, 10.0);
                    assert_eq!(arms[1].0.node, 90.0);
                }
                other => panic!("expected choose, got {other:?}"),
            },
            other => panic!("expected return, got {other:?}"),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = predicate("1 + 2 * 3");
        match expr.node {
            Expr::Binary {
                op: BinaryOp::Add,
                rhs,
                ..
            } => assert!(matches!(rhs.node, Expr::Binary { op: BinaryOp::Mul, .. })),
            other => panic!("expected addition, got {other:?}"),
        }
    }

    #[test]
    fn not_binds_looser_than_comparison() {
        let expr = predicate("not sickness > 50");
        match expr.node {
            Expr::Unary {
                op: UnaryOp::Not,
                expr,
            } => assert!(matches!(expr.node, Expr::Binary { op: BinaryOp::Gt, .. })),
            other => panic!("expected not, got {other:?}"),
        }
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = predicate("healer or infected and masked");
        match expr.node {
            Expr::Binary {
                op: BinaryOp::Or,
                rhs,
                ..
            } => assert!(matches!(rhs.node, Expr::Binary { op: BinaryOp::And, .. })),
            other => panic!("expected or, got {other:?}"),
        }
    }

    #[test]
    fn unary_minus_spans_cover_operand() {
        let expr = predicate("-5");
        assert_eq!(expr.span, 0..2);
        assert!(matches!(expr.node, Expr::Unary { op: UnaryOp::Neg, .. }));
    }

    #[test]
    fn parenthesized_expression() {
        let expr = predicate("(1 + 2) * 3");
        assert!(matches!(expr.node, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn predicate_allows_surrounding_newlines() {
        let expr = predicate("\n    not healer\n");
        assert!(matches!(expr.node, Expr::Unary { op: UnaryOp::Not, .. }));
    }

    #[test]
    fn reserved_words_are_not_names() {
        assert!(!effect_errors("let if = 3").is_empty());
    }

    #[test]
    fn missing_closing_brace_is_an_error() {
        let errors = effect_errors("if infected {\n    pass\n");
        assert!(!errors.is_empty());
    }

    #[test]
    fn two_statements_on_one_line_is_an_error() {
        assert!(!effect_errors("masked = true healer = true").is_empty());
    }

    #[test]
    fn parse_catalog_items() {
        let source = "item mask {\n    name \"Mask\"\n    total 5\n    unlocked true\n    effect {\n        masked = true\n    }\n}\n\nitem dna {\n    uses 0\n    effect { pass }\n    predicate { healer }\n}\n";
        let (tokens, lex_errors) = lexer::lex(source);
        assert!(lex_errors.is_empty());
        let catalog = parse_catalog(&tokens).unwrap();
        assert_eq!(catalog.items.len(), 2);

        let mask = &catalog.items[0].node;
        assert_eq!(mask.id.node, "mask");
        assert_eq!(mask.properties.len(), 4);
        assert_eq!(mask.properties[0].node.value, PropertyValue::Str("Mask".into()));
        assert_eq!(mask.properties[1].node.value, PropertyValue::Integer(5));
        assert_eq!(mask.properties[2].node.value, PropertyValue::Boolean(true));
        match &mask.properties[3].node.value {
            PropertyValue::Body(span) => {
                let text = &source[span.clone()];
                assert!(text.starts_with('{') && text.ends_with('}'));
                assert!(text.contains("masked = true"));
            }
            other => panic!("expected body, got {other:?}"),
        }

        let dna = &catalog.items[1].node;
        assert!(matches!(&dna.properties[2].node.value, PropertyValue::Body(span) if &source[span.clone()] == "{ healer }"));
    }

    #[test]
    fn catalog_bodies_balance_nested_braces() {
        let source = "item rest {\n    effect {\n        if infected {\n            return add_sickness(-5)\n        }\n    }\n    total 20\n}";
        let (tokens, _) = lexer::lex(source);
        let catalog = parse_catalog(&tokens).unwrap();
        let props = &catalog.items[0].node.properties;
        assert_eq!(props.len(), 2);
        assert_eq!(props[1].node.key.node, "total");
    }

    #[test]
    fn catalog_rejects_negative_totals() {
        let (tokens, _) = lexer::lex("item mask {\n    total -1\n}");
        assert!(parse_catalog(&tokens).is_err());
    }
}
