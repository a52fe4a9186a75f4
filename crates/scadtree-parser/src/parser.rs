//! Parser for OpenSCAD source tokens.
//!
//! This module transforms a token stream from the [`lexer`](super::lexer)
//! into the typed concrete parse tree defined in [`cst`](super::cst). The
//! public entry point is [`parse_program`].
//!
//! The expression grammar is a precedence ladder, lowest to highest:
//! `let`/`assert`/`echo`/function-literal forms, ternary, `||`, `&&`,
//! equality, relational, `|`, `&`, shifts, additive, multiplicative,
//! unary, `^` (right-associative), then postfix call/index/member chains
//! over a primary. Binary levels record flat operand/operator chains; the
//! builder folds them into associativity-correct trees.

use winnow::{
    Parser as _,
    combinator::{alt, opt, repeat, separated},
    error::{AddContext, ContextError, ErrMode},
    stream::{Stream, TokenSlice},
    token::any,
};

use scadtree_core::ast::Modifier;

use crate::{
    cst::{
        ChainOp, CstArgument, CstAssignment, CstComment, CstDirective, CstExpr, CstExprKind,
        CstFunctionDeclaration, CstIdent, CstInstantiation, CstInstantiationKind, CstItem,
        CstModuleDeclaration, CstParameter, CstProgram, CstStatement, CstSuffix, CstVectorElement,
        CstVectorElementKind, UnaryOpToken,
    },
    error::{Diagnostic, ErrorCode, ParseError},
    span::Span,
    tokens::{PositionedToken, Token},
};

/// Context type for parser errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Context {
    /// Description of what is currently being parsed
    Label(&'static str),
    /// Remaining token count (`eof_offset()`) at error start position
    ///
    /// Used to calculate start_offset as: `tokens.len() - start_offset_value`
    StartOffset(usize),
}

type Input<'t, 'src> = TokenSlice<'t, PositionedToken<'src>>;
type IResult<O> = std::result::Result<O, ErrMode<ContextError<Context>>>;

/// Commit to the current rule: a failure inside `f` becomes a `Cut` error
/// carrying the offset where the rule started.
fn cut_err<'t, 'src, O, F>(input: &mut Input<'t, 'src>, f: F) -> IResult<O>
where
    F: FnOnce(&mut Input<'t, 'src>) -> IResult<O>,
{
    let start_remaining = input.eof_offset();
    let checkpoint = input.checkpoint();

    match f(input) {
        Ok(o) => Ok(o),
        Err(ErrMode::Backtrack(e)) | Err(ErrMode::Cut(e)) => {
            let e = e.add_context(input, &checkpoint, Context::StartOffset(start_remaining));
            Err(ErrMode::Cut(e))
        }
        Err(e) => Err(e),
    }
}

/// Helper to create a Cut error with StartOffset context
fn cut_error_with_offset(input: &Input<'_, '_>) -> ErrMode<ContextError<Context>> {
    let e = ContextError::new().add_context(
        input,
        &input.checkpoint(),
        Context::StartOffset(input.eof_offset()),
    );
    ErrMode::Cut(e)
}

/// Match one specific token, yielding its span.
fn t<'t, 'src>(expected: Token<'static>) -> impl FnMut(&mut Input<'t, 'src>) -> IResult<Span>
where
    'src: 't,
{
    move |input: &mut Input<'t, 'src>| {
        any.verify(|token: &PositionedToken<'src>| token.token == expected)
            .map(|token: &PositionedToken<'src>| token.span)
            .parse_next(input)
    }
}

/// Parse one trivia token (whitespace, newline, or comment).
fn trivia(input: &mut Input<'_, '_>) -> IResult<()> {
    any.verify(|token: &PositionedToken<'_>| token.token.is_trivia())
        .void()
        .parse_next(input)
}

/// Parse zero or more trivia tokens.
fn trivia0(input: &mut Input<'_, '_>) -> IResult<()> {
    repeat(0.., trivia).parse_next(input)
}

/// Parse zero or more whitespace/newline tokens, leaving comments alone.
///
/// Used only at the top level, where comments are captured as items.
fn ws_only0(input: &mut Input<'_, '_>) -> IResult<()> {
    repeat(
        0..,
        any.verify(|token: &PositionedToken<'_>| {
            matches!(token.token, Token::Whitespace | Token::Newline)
        })
        .void(),
    )
    .parse_next(input)
}

/// Parse a semicolon with optional leading trivia.
fn semicolon(input: &mut Input<'_, '_>) -> IResult<Span> {
    let _ = trivia0(input)?;
    t(Token::Semicolon)
        .context(Context::Label("semicolon"))
        .parse_next(input)
}

/// Parse a comma separator with optional leading trivia.
fn comma(input: &mut Input<'_, '_>) -> IResult<Span> {
    let _ = trivia0(input)?;
    t(Token::Comma).parse_next(input)
}

/// Parse an identifier with span preservation.
fn identifier<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstIdent<'src>> {
    let _ = trivia0(input)?;
    any.verify_map(|token: &PositionedToken<'src>| match &token.token {
        Token::Identifier(name) => Some(CstIdent {
            name,
            span: token.span,
        }),
        _ => None,
    })
    .context(Context::Label("identifier"))
    .parse_next(input)
}

// --- Argument, parameter, and assignment lists ---

/// Parse `name = expr` where `=` commits to the named form.
fn named_argument<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstArgument<'src>> {
    let name = identifier(input)?;
    let _ = trivia0(input)?;
    let _ = t(Token::Equals).parse_next(input)?;
    let value = cut_err(input, expr)?;
    let span = name.span.union(value.span);
    Ok(CstArgument {
        name: Some(name),
        value,
        span,
    })
}

fn positional_argument<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstArgument<'src>> {
    let value = expr(input)?;
    let span = value.span;
    Ok(CstArgument {
        name: None,
        value,
        span,
    })
}

fn argument<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstArgument<'src>> {
    let _ = trivia0(input)?;
    alt((named_argument, positional_argument))
        .context(Context::Label("argument"))
        .parse_next(input)
}

/// Parse a comma-separated argument list, tolerating one trailing comma.
fn arguments_list<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<Vec<CstArgument<'src>>> {
    let arguments: Vec<CstArgument<'src>> = separated(0.., argument, comma).parse_next(input)?;
    let _ = opt(comma).parse_next(input)?;
    Ok(arguments)
}

/// Parse a declared parameter: `name` or `name = default`.
fn parameter<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstParameter<'src>> {
    let name = identifier(input)?;
    let default = opt(|input: &mut Input<'t, 'src>| {
        let _ = trivia0(input)?;
        let _ = t(Token::Equals).parse_next(input)?;
        cut_err(input, expr)
    })
    .parse_next(input)?;
    let span = match &default {
        Some(default) => name.span.union(default.span),
        None => name.span,
    };
    Ok(CstParameter {
        name,
        default,
        span,
    })
}

/// Parse a comma-separated parameter list, tolerating any number of
/// trailing commas.
fn parameters_list<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<Vec<CstParameter<'src>>> {
    let parameters: Vec<CstParameter<'src>> = separated(0.., parameter, comma).parse_next(input)?;
    let _: () = repeat(0.., comma.void()).parse_next(input)?;
    Ok(parameters)
}

/// Parse `( parameters )`.
fn parameter_block<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<Vec<CstParameter<'src>>> {
    let _ = trivia0(input)?;
    let _ = t(Token::LeftParen)
        .context(Context::Label("parameter list"))
        .parse_next(input)?;
    let parameters = parameters_list(input)?;
    let _ = trivia0(input)?;
    let _ = t(Token::RightParen).parse_next(input)?;
    Ok(parameters)
}

/// Parse `name = expr` in a `let`/`for` header or assignment statement.
fn assignment_expr<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstAssignment<'src>> {
    let name = identifier(input)?;
    let _ = trivia0(input)?;
    let _ = t(Token::Equals).parse_next(input)?;
    let value = cut_err(input, expr)?;
    let span = name.span.union(value.span);
    Ok(CstAssignment { name, value, span })
}

/// Parse a comma-separated assignment list, tolerating one trailing comma.
fn assignments_list<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<Vec<CstAssignment<'src>>> {
    let assignments: Vec<CstAssignment<'src>> =
        separated(0.., assignment_expr, comma).parse_next(input)?;
    let _ = opt(comma).parse_next(input)?;
    Ok(assignments)
}

// --- Expressions ---

/// Parse an expression: the top of the precedence ladder.
fn expr<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    let _ = trivia0(input)?;
    alt((
        let_expr,
        assert_expr,
        echo_expr,
        function_literal,
        ternary_expr,
    ))
    .context(Context::Label("expression"))
    .parse_next(input)
}

/// Parse `let ( assignments ) expr`.
fn let_expr<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    let keyword = t(Token::Let).parse_next(input)?;
    cut_err(input, |input| {
        let _ = trivia0(input)?;
        let _ = t(Token::LeftParen).parse_next(input)?;
        let assignments = assignments_list(input)?;
        let _ = trivia0(input)?;
        let _ = t(Token::RightParen).parse_next(input)?;
        let body = expr(input)?;
        let span = keyword.union(body.span);
        Ok(CstExpr {
            kind: CstExprKind::Let {
                assignments,
                body: Box::new(body),
            },
            span,
        })
    })
}

/// Parse `assert ( arguments ) expr`.
fn assert_expr<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    let keyword = t(Token::Assert).parse_next(input)?;
    cut_err(input, |input| {
        let _ = trivia0(input)?;
        let _ = t(Token::LeftParen).parse_next(input)?;
        let arguments = arguments_list(input)?;
        let _ = trivia0(input)?;
        let _ = t(Token::RightParen).parse_next(input)?;
        let body = expr(input)?;
        let span = keyword.union(body.span);
        Ok(CstExpr {
            kind: CstExprKind::Assert {
                arguments,
                body: Box::new(body),
            },
            span,
        })
    })
}

/// Parse `echo ( arguments ) expr`.
fn echo_expr<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    let keyword = t(Token::Echo).parse_next(input)?;
    cut_err(input, |input| {
        let _ = trivia0(input)?;
        let _ = t(Token::LeftParen).parse_next(input)?;
        let arguments = arguments_list(input)?;
        let _ = trivia0(input)?;
        let _ = t(Token::RightParen).parse_next(input)?;
        let body = expr(input)?;
        let span = keyword.union(body.span);
        Ok(CstExpr {
            kind: CstExprKind::Echo {
                arguments,
                body: Box::new(body),
            },
            span,
        })
    })
}

/// Parse `function ( parameters ) expr`, an anonymous function literal.
fn function_literal<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    let keyword = t(Token::Function).parse_next(input)?;
    cut_err(input, |input| {
        let parameters = parameter_block(input)?;
        let body = expr(input)?;
        let span = keyword.union(body.span);
        Ok(CstExpr {
            kind: CstExprKind::FunctionLiteral {
                parameters,
                body: Box::new(body),
            },
            span,
        })
    })
}

/// Parse `condition ? if_true : if_false`, or fall through to the
/// logical-or level when no `?` follows.
fn ternary_expr<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    let condition = logical_or(input)?;

    let checkpoint = input.checkpoint();
    let _ = trivia0(input)?;
    match t(Token::Question).parse_next(input) {
        Ok(_) => cut_err(input, |input| {
            let if_true = expr(input)?;
            let _ = trivia0(input)?;
            let _ = t(Token::Colon)
                .context(Context::Label("ternary `:`"))
                .parse_next(input)?;
            let if_false = expr(input)?;
            let span = condition.span.union(if_false.span);
            Ok(CstExpr {
                kind: CstExprKind::Ternary {
                    condition: Box::new(condition),
                    if_true: Box::new(if_true),
                    if_false: Box::new(if_false),
                },
                span,
            })
        }),
        Err(_) => {
            input.reset(&checkpoint);
            Ok(condition)
        }
    }
}

/// Parse one binary precedence level: a non-empty operand sequence joined
/// by this level's separator tokens, kept as a flat chain.
fn chain<'t, 'src>(
    input: &mut Input<'t, 'src>,
    next: fn(&mut Input<'t, 'src>) -> IResult<CstExpr<'src>>,
    op_for: fn(&Token<'_>) -> Option<ChainOp>,
) -> IResult<CstExpr<'src>> {
    let first = next(input)?;
    let mut rest: Vec<(ChainOp, CstExpr<'src>)> = Vec::new();

    loop {
        let checkpoint = input.checkpoint();
        let _ = trivia0(input)?;
        let op = match any::<_, ErrMode<ContextError<Context>>>
            .verify_map(|token: &PositionedToken<'src>| op_for(&token.token))
            .parse_next(input)
        {
            Ok(op) => op,
            Err(_) => {
                input.reset(&checkpoint);
                break;
            }
        };
        let operand = cut_err(input, next)?;
        rest.push((op, operand));
    }

    if rest.is_empty() {
        return Ok(first);
    }
    let span = first
        .span
        .union(rest.last().map(|(_, operand)| operand.span).unwrap_or(first.span));
    Ok(CstExpr {
        kind: CstExprKind::Chain {
            first: Box::new(first),
            rest,
        },
        span,
    })
}

fn logical_or<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    chain(input, logical_and, |token| match token {
        Token::LogicalOr => Some(ChainOp::Or),
        _ => None,
    })
}

fn logical_and<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    chain(input, equality, |token| match token {
        Token::LogicalAnd => Some(ChainOp::And),
        _ => None,
    })
}

fn equality<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    chain(input, relational, |token| match token {
        Token::EqualEqual => Some(ChainOp::Eq),
        Token::NotEqual => Some(ChainOp::Ne),
        _ => None,
    })
}

fn relational<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    chain(input, bitwise_or, |token| match token {
        Token::LessEqual => Some(ChainOp::Le),
        Token::GreaterEqual => Some(ChainOp::Ge),
        Token::Less => Some(ChainOp::Lt),
        Token::Greater => Some(ChainOp::Gt),
        _ => None,
    })
}

fn bitwise_or<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    chain(input, bitwise_and, |token| match token {
        Token::BitOr => Some(ChainOp::BitOr),
        _ => None,
    })
}

fn bitwise_and<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    chain(input, shift, |token| match token {
        Token::BitAnd => Some(ChainOp::BitAnd),
        _ => None,
    })
}

fn shift<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    chain(input, additive, |token| match token {
        Token::ShiftLeft => Some(ChainOp::Shl),
        Token::ShiftRight => Some(ChainOp::Shr),
        _ => None,
    })
}

fn additive<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    chain(input, multiplicative, |token| match token {
        Token::Plus => Some(ChainOp::Add),
        Token::Minus => Some(ChainOp::Sub),
        _ => None,
    })
}

fn multiplicative<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    chain(input, unary, |token| match token {
        Token::Star => Some(ChainOp::Mul),
        Token::Slash => Some(ChainOp::Div),
        Token::Percent => Some(ChainOp::Mod),
        _ => None,
    })
}

/// Parse a run of zero or more prefix unary operators and their operand.
fn unary<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    let ops: Vec<(UnaryOpToken, Span)> = repeat(
        0..,
        |input: &mut Input<'t, 'src>| {
            let _ = trivia0(input)?;
            any.verify_map(|token: &PositionedToken<'src>| {
                let op = match token.token {
                    Token::Plus => UnaryOpToken::Plus,
                    Token::Minus => UnaryOpToken::Minus,
                    Token::Not => UnaryOpToken::Not,
                    Token::BitNot => UnaryOpToken::BitNot,
                    _ => return None,
                };
                Some((op, token.span))
            })
            .parse_next(input)
        },
    )
    .parse_next(input)?;

    let operand = exponent(input)?;
    if ops.is_empty() {
        return Ok(operand);
    }
    let span = ops[0].1.union(operand.span);
    Ok(CstExpr {
        kind: CstExprKind::Unary {
            ops: ops.into_iter().map(|(op, _)| op).collect(),
            operand: Box::new(operand),
        },
        span,
    })
}

/// Parse `base ^ exponent` (right-associative via the unary level) or a
/// bare postfix expression.
fn exponent<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    let base = postfix(input)?;

    let checkpoint = input.checkpoint();
    let _ = trivia0(input)?;
    match t(Token::Caret).parse_next(input) {
        Ok(_) => {
            let exponent = cut_err(input, unary)?;
            let span = base.span.union(exponent.span);
            Ok(CstExpr {
                kind: CstExprKind::Exponent {
                    base: Box::new(base),
                    exponent: Box::new(exponent),
                },
                span,
            })
        }
        Err(_) => {
            input.reset(&checkpoint);
            Ok(base)
        }
    }
}

/// Parse a primary expression followed by call/index/member suffixes.
fn postfix<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    let primary = primary(input)?;
    let suffixes: Vec<(CstSuffix<'src>, Span)> = repeat(0.., suffix).parse_next(input)?;
    if suffixes.is_empty() {
        return Ok(primary);
    }
    let span = primary
        .span
        .union(suffixes.last().map(|(_, span)| *span).unwrap_or(primary.span));
    Ok(CstExpr {
        kind: CstExprKind::Postfix {
            primary: Box::new(primary),
            suffixes: suffixes.into_iter().map(|(suffix, _)| suffix).collect(),
        },
        span,
    })
}

fn suffix<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<(CstSuffix<'src>, Span)> {
    let _ = trivia0(input)?;
    alt((call_suffix, index_suffix, member_suffix)).parse_next(input)
}

fn call_suffix<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<(CstSuffix<'src>, Span)> {
    let open = t(Token::LeftParen).parse_next(input)?;
    let arguments = arguments_list(input)?;
    let _ = trivia0(input)?;
    let close = t(Token::RightParen).parse_next(input)?;
    Ok((CstSuffix::Call(arguments), open.union(close)))
}

fn index_suffix<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<(CstSuffix<'src>, Span)> {
    let open = t(Token::LeftBracket).parse_next(input)?;
    let index = expr(input)?;
    let _ = trivia0(input)?;
    let close = t(Token::RightBracket).parse_next(input)?;
    Ok((CstSuffix::Index(index), open.union(close)))
}

fn member_suffix<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<(CstSuffix<'src>, Span)> {
    let dot = t(Token::Period).parse_next(input)?;
    let member = cut_err(input, identifier)?;
    let span = dot.union(member.span);
    Ok((CstSuffix::Member(member), span))
}

/// Parse a primary: parenthesized expression, range literal, bracketed
/// list, literal token, or identifier.
fn primary<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    let _ = trivia0(input)?;
    alt((paren_expr, range_expr, vector_expr, literal_expr))
        .context(Context::Label("expression"))
        .parse_next(input)
}

fn paren_expr<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    let open = t(Token::LeftParen).parse_next(input)?;
    let inner = expr(input)?;
    let _ = trivia0(input)?;
    let close = t(Token::RightParen).parse_next(input)?;
    Ok(CstExpr {
        kind: CstExprKind::Paren(Box::new(inner)),
        span: open.union(close),
    })
}

/// Parse `[start : end]` or `[start : end : step]`.
///
/// Backtracks entirely on failure so the shared `[` prefix can retry as a
/// vector literal.
fn range_expr<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    let open = t(Token::LeftBracket).parse_next(input)?;
    let start = expr(input)?;
    let _ = trivia0(input)?;
    let _ = t(Token::Colon).parse_next(input)?;
    let end = expr(input)?;
    let step = opt(|input: &mut Input<'t, 'src>| {
        let _ = trivia0(input)?;
        let _ = t(Token::Colon).parse_next(input)?;
        expr(input)
    })
    .parse_next(input)?;
    let _ = trivia0(input)?;
    let close = t(Token::RightBracket).parse_next(input)?;

    Ok(CstExpr {
        kind: CstExprKind::Range {
            start: Box::new(start),
            end: Box::new(end),
            step: step.map(Box::new),
        },
        span: open.union(close),
    })
}

/// Parse a bracketed list: vector literal and list comprehension share
/// this one rule.
fn vector_expr<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    let open = t(Token::LeftBracket).parse_next(input)?;
    let elements: Vec<CstVectorElement<'src>> =
        separated(0.., vector_element, comma).parse_next(input)?;
    let _ = opt(comma).parse_next(input)?;
    let _ = trivia0(input)?;
    let close = t(Token::RightBracket).parse_next(input)?;
    Ok(CstExpr {
        kind: CstExprKind::Vector(elements),
        span: open.union(close),
    })
}

fn literal_expr<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstExpr<'src>> {
    any.verify_map(|token: &PositionedToken<'src>| {
        let kind = match &token.token {
            Token::StringLiteral(text) => CstExprKind::String(text),
            Token::NumberLiteral(value) => CstExprKind::Number(*value),
            Token::True => CstExprKind::True,
            Token::False => CstExprKind::False,
            Token::Undef => CstExprKind::Undef,
            Token::Identifier(name) => CstExprKind::Identifier(name),
            _ => return None,
        };
        Some(CstExpr {
            kind,
            span: token.span,
        })
    })
    .parse_next(input)
}

// --- Vector elements and list comprehension forms ---

fn vector_element<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstVectorElement<'src>> {
    let _ = trivia0(input)?;
    alt((listcomp_element, expr_element)).parse_next(input)
}

fn expr_element<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstVectorElement<'src>> {
    let value = expr(input)?;
    let span = value.span;
    Ok(CstVectorElement {
        kind: CstVectorElementKind::Expr(value),
        span,
    })
}

/// Parse a comprehension-control element.
///
/// `let` and `(` are shared prefixes with plain expressions, so those two
/// forms backtrack; `for`/`each`/`if` can never start an expression and
/// commit after their keyword.
fn listcomp_element<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstVectorElement<'src>> {
    let _ = trivia0(input)?;
    alt((
        listcomp_paren,
        listcomp_let,
        listcomp_each,
        listcomp_for,
        listcomp_if,
    ))
    .parse_next(input)
}

fn listcomp_paren<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstVectorElement<'src>> {
    let open = t(Token::LeftParen).parse_next(input)?;
    let inner = listcomp_element(input)?;
    let _ = trivia0(input)?;
    let close = t(Token::RightParen).parse_next(input)?;
    Ok(CstVectorElement {
        kind: CstVectorElementKind::Paren(Box::new(inner)),
        span: open.union(close),
    })
}

/// `let ( assignments ) control-element`; a `let` whose body is a plain
/// expression backtracks and parses as a let expression element instead.
fn listcomp_let<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstVectorElement<'src>> {
    let keyword = t(Token::Let).parse_next(input)?;
    let _ = trivia0(input)?;
    let _ = t(Token::LeftParen).parse_next(input)?;
    let assignments = assignments_list(input)?;
    let _ = trivia0(input)?;
    let _ = t(Token::RightParen).parse_next(input)?;
    let body = listcomp_element(input)?;
    let span = keyword.union(body.span);
    Ok(CstVectorElement {
        kind: CstVectorElementKind::Let {
            assignments,
            body: Box::new(body),
        },
        span,
    })
}

fn listcomp_each<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstVectorElement<'src>> {
    let keyword = t(Token::Each).parse_next(input)?;
    cut_err(input, |input| {
        let body = vector_element(input)?;
        let span = keyword.union(body.span);
        Ok(CstVectorElement {
            kind: CstVectorElementKind::Each(Box::new(body)),
            span,
        })
    })
}

/// Simple and C-style comprehension `for`, split by the header's shape.
fn listcomp_for<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstVectorElement<'src>> {
    let keyword = t(Token::For).parse_next(input)?;
    cut_err(input, |input| {
        let header = for_header(input)?;
        let body = vector_element(input)?;
        let span = keyword.union(body.span);
        let kind = match header.rest {
            None => CstVectorElementKind::For {
                assignments: header.init,
                body: Box::new(body),
            },
            Some((condition, increment)) => CstVectorElementKind::CFor {
                init: header.init,
                condition,
                increment,
                body: Box::new(body),
            },
        };
        Ok(CstVectorElement { kind, span })
    })
}

fn listcomp_if<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstVectorElement<'src>> {
    let keyword = t(Token::If).parse_next(input)?;
    cut_err(input, |input| {
        let _ = trivia0(input)?;
        let _ = t(Token::LeftParen).parse_next(input)?;
        let condition = expr(input)?;
        let _ = trivia0(input)?;
        let _ = t(Token::RightParen).parse_next(input)?;
        let then_body = vector_element(input)?;

        let checkpoint = input.checkpoint();
        let _ = trivia0(input)?;
        match t(Token::Else).parse_next(input) {
            Ok(_) => {
                let else_body = vector_element(input)?;
                let span = keyword.union(else_body.span);
                Ok(CstVectorElement {
                    kind: CstVectorElementKind::IfElse {
                        condition,
                        then_body: Box::new(then_body),
                        else_body: Box::new(else_body),
                    },
                    span,
                })
            }
            Err(_) => {
                input.reset(&checkpoint);
                let span = keyword.union(then_body.span);
                Ok(CstVectorElement {
                    kind: CstVectorElementKind::If {
                        condition,
                        then_body: Box::new(then_body),
                    },
                    span,
                })
            }
        }
    })
}

// --- Statements ---

/// Parse a general statement.
fn statement<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstStatement<'src>> {
    let _ = trivia0(input)?;
    alt((
        empty_statement,
        statement_block,
        module_declaration,
        function_declaration,
        module_instantiation.map(CstStatement::Instantiation),
        assignment_statement,
    ))
    .context(Context::Label("statement"))
    .parse_next(input)
}

fn empty_statement<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstStatement<'src>> {
    t(Token::Semicolon)
        .map(|span| CstStatement::Empty { span })
        .parse_next(input)
}

fn statement_block<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstStatement<'src>> {
    let open = t(Token::LeftBrace).parse_next(input)?;
    cut_err(input, |input| {
        let statements: Vec<CstStatement<'src>> = repeat(0.., statement).parse_next(input)?;
        let _ = trivia0(input)?;
        let close = t(Token::RightBrace)
            .context(Context::Label("closing brace '}'"))
            .parse_next(input)?;
        Ok(CstStatement::Block {
            statements,
            span: open.union(close),
        })
    })
}

fn module_declaration<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstStatement<'src>> {
    let keyword = t(Token::Module).parse_next(input)?;
    cut_err(input, |input| {
        let name = identifier
            .context(Context::Label("module name"))
            .parse_next(input)?;
        let parameters = parameter_block(input)?;
        let body = statement(input)?;
        let span = keyword.union(body.span());
        Ok(CstStatement::ModuleDeclaration(CstModuleDeclaration {
            name,
            parameters,
            body: Box::new(body),
            span,
        }))
    })
}

fn function_declaration<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstStatement<'src>> {
    let keyword = t(Token::Function).parse_next(input)?;
    cut_err(input, |input| {
        let name = identifier
            .context(Context::Label("function name"))
            .parse_next(input)?;
        let parameters = parameter_block(input)?;
        let _ = trivia0(input)?;
        let _ = t(Token::Equals)
            .context(Context::Label("`=` before function body"))
            .parse_next(input)?;
        let body = expr(input)?;
        let end = semicolon(input)?;
        let span = keyword.union(end);
        Ok(CstStatement::FunctionDeclaration(CstFunctionDeclaration {
            name,
            parameters,
            body,
            span,
        }))
    })
}

fn assignment_statement<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstStatement<'src>> {
    let name = identifier(input)?;
    let _ = trivia0(input)?;
    let _ = t(Token::Equals).parse_next(input)?;
    cut_err(input, |input| {
        let value = expr(input)?;
        let end = semicolon(input)?;
        let span = name.span.union(end);
        Ok(CstStatement::Assignment(CstAssignment {
            name,
            value,
            span,
        }))
    })
}

// --- Module instantiations ---

fn module_instantiation<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstInstantiation<'src>> {
    let _ = trivia0(input)?;
    alt((
        modifier_instantiation,
        if_instantiation,
        single_module_instantiation,
    ))
    .parse_next(input)
}

/// Parse a `!`/`#`/`%`/`*` modifier prefix wrapping an inner
/// instantiation.
fn modifier_instantiation<'t, 'src>(
    input: &mut Input<'t, 'src>,
) -> IResult<CstInstantiation<'src>> {
    let (modifier, span) = any
        .verify_map(|token: &PositionedToken<'src>| {
            let modifier = match token.token {
                Token::Not => Modifier::ShowOnly,
                Token::Hash => Modifier::Highlight,
                Token::Percent => Modifier::Background,
                Token::Star => Modifier::Disable,
                _ => return None,
            };
            Some((modifier, token.span))
        })
        .parse_next(input)?;

    cut_err(input, |input| {
        let child = module_instantiation(input)?;
        let span = span.union(child.span);
        Ok(CstInstantiation {
            kind: CstInstantiationKind::Modifier {
                modifier,
                child: Box::new(child),
            },
            span,
        })
    })
}

fn if_instantiation<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstInstantiation<'src>> {
    let keyword = t(Token::If).parse_next(input)?;
    cut_err(input, |input| {
        let _ = trivia0(input)?;
        let _ = t(Token::LeftParen).parse_next(input)?;
        let condition = expr(input)?;
        let _ = trivia0(input)?;
        let _ = t(Token::RightParen).parse_next(input)?;
        let then_body = child_statement(input)?;

        let checkpoint = input.checkpoint();
        let _ = trivia0(input)?;
        match t(Token::Else).parse_next(input) {
            Ok(_) => {
                let else_body = child_statement(input)?;
                let span = keyword.union(else_body.span());
                Ok(CstInstantiation {
                    kind: CstInstantiationKind::IfElse {
                        condition,
                        then_body: Box::new(then_body),
                        else_body: Box::new(else_body),
                    },
                    span,
                })
            }
            Err(_) => {
                input.reset(&checkpoint);
                let span = keyword.union(then_body.span());
                Ok(CstInstantiation {
                    kind: CstInstantiationKind::If {
                        condition,
                        then_body: Box::new(then_body),
                    },
                    span,
                })
            }
        }
    })
}

fn single_module_instantiation<'t, 'src>(
    input: &mut Input<'t, 'src>,
) -> IResult<CstInstantiation<'src>> {
    alt((
        for_instantiation,
        intersection_for_instantiation,
        let_instantiation,
        assert_instantiation,
        echo_instantiation,
        modular_call,
    ))
    .parse_next(input)
}

/// The parenthesized header shared by simple and C-style `for` loops.
///
/// `rest` is `None` for the simple form and `Some((condition, increment))`
/// for the C-style form, so loop flavors are distinct shapes at parse
/// time.
struct ForHeader<'src> {
    init: Vec<CstAssignment<'src>>,
    rest: Option<(CstExpr<'src>, Vec<CstAssignment<'src>>)>,
}

fn for_header<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<ForHeader<'src>> {
    let _ = trivia0(input)?;
    let _ = t(Token::LeftParen).parse_next(input)?;
    let init = assignments_list(input)?;

    let checkpoint = input.checkpoint();
    let _ = trivia0(input)?;
    let rest = match t(Token::Semicolon).parse_next(input) {
        Ok(_) => {
            let condition = expr(input)?;
            let _ = semicolon(input)?;
            let increment = assignments_list(input)?;
            Some((condition, increment))
        }
        Err(_) => {
            input.reset(&checkpoint);
            None
        }
    };

    let _ = trivia0(input)?;
    let _ = t(Token::RightParen).parse_next(input)?;
    Ok(ForHeader { init, rest })
}

fn for_instantiation<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstInstantiation<'src>> {
    let keyword = t(Token::For).parse_next(input)?;
    cut_err(input, |input| {
        let header = for_header(input)?;
        let body = child_statement(input)?;
        let span = keyword.union(body.span());
        let kind = match header.rest {
            None => CstInstantiationKind::For {
                assignments: header.init,
                body: Box::new(body),
            },
            Some((condition, increment)) => CstInstantiationKind::CFor {
                init: header.init,
                condition,
                increment,
                body: Box::new(body),
            },
        };
        Ok(CstInstantiation { kind, span })
    })
}

fn intersection_for_instantiation<'t, 'src>(
    input: &mut Input<'t, 'src>,
) -> IResult<CstInstantiation<'src>> {
    let keyword = t(Token::IntersectionFor).parse_next(input)?;
    cut_err(input, |input| {
        let header = for_header(input)?;
        let body = child_statement(input)?;
        let span = keyword.union(body.span());
        let kind = match header.rest {
            None => CstInstantiationKind::IntersectionFor {
                assignments: header.init,
                body: Box::new(body),
            },
            Some((condition, increment)) => CstInstantiationKind::IntersectionCFor {
                init: header.init,
                condition,
                increment,
                body: Box::new(body),
            },
        };
        Ok(CstInstantiation { kind, span })
    })
}

fn let_instantiation<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstInstantiation<'src>> {
    let keyword = t(Token::Let).parse_next(input)?;
    cut_err(input, |input| {
        let _ = trivia0(input)?;
        let _ = t(Token::LeftParen).parse_next(input)?;
        let assignments = assignments_list(input)?;
        let _ = trivia0(input)?;
        let _ = t(Token::RightParen).parse_next(input)?;
        let body = child_statement(input)?;
        let span = keyword.union(body.span());
        Ok(CstInstantiation {
            kind: CstInstantiationKind::Let {
                assignments,
                body: Box::new(body),
            },
            span,
        })
    })
}

fn assert_instantiation<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstInstantiation<'src>> {
    let keyword = t(Token::Assert).parse_next(input)?;
    cut_err(input, |input| {
        let _ = trivia0(input)?;
        let _ = t(Token::LeftParen).parse_next(input)?;
        let arguments = arguments_list(input)?;
        let _ = trivia0(input)?;
        let _ = t(Token::RightParen).parse_next(input)?;
        let body = child_statement(input)?;
        let span = keyword.union(body.span());
        Ok(CstInstantiation {
            kind: CstInstantiationKind::Assert {
                arguments,
                body: Box::new(body),
            },
            span,
        })
    })
}

fn echo_instantiation<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstInstantiation<'src>> {
    let keyword = t(Token::Echo).parse_next(input)?;
    cut_err(input, |input| {
        let _ = trivia0(input)?;
        let _ = t(Token::LeftParen).parse_next(input)?;
        let arguments = arguments_list(input)?;
        let _ = trivia0(input)?;
        let _ = t(Token::RightParen).parse_next(input)?;
        let body = child_statement(input)?;
        let span = keyword.union(body.span());
        Ok(CstInstantiation {
            kind: CstInstantiationKind::Echo {
                arguments,
                body: Box::new(body),
            },
            span,
        })
    })
}

/// Parse `name ( arguments ) child`, a bare module call.
///
/// The opening parenthesis is the commit point; without it the identifier
/// backtracks so assignment statements can claim it.
fn modular_call<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstInstantiation<'src>> {
    let name = identifier(input)?;
    let _ = trivia0(input)?;
    let _ = t(Token::LeftParen).parse_next(input)?;
    cut_err(input, |input| {
        let arguments = arguments_list(input)?;
        let _ = trivia0(input)?;
        let _ = t(Token::RightParen).parse_next(input)?;
        let body = child_statement(input)?;
        let span = name.span.union(body.span());
        Ok(CstInstantiation {
            kind: CstInstantiationKind::Call {
                name,
                arguments,
                body: Box::new(body),
            },
            span,
        })
    })
}

/// Parse the child of an instantiation: `;`, a block, or a nested
/// instantiation.
fn child_statement<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstStatement<'src>> {
    let _ = trivia0(input)?;
    alt((
        empty_statement,
        statement_block,
        module_instantiation.map(CstStatement::Instantiation),
    ))
    .context(Context::Label("child statement"))
    .parse_next(input)
}

// --- Directives and top level ---

fn directive_path<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<(&'src str, Span)> {
    let _ = trivia0(input)?;
    any.verify_map(|token: &PositionedToken<'src>| match &token.token {
        Token::FilePath(path) => Some((*path, token.span)),
        _ => None,
    })
    .context(Context::Label("file path"))
    .parse_next(input)
}

fn use_directive<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstItem<'src>> {
    let keyword = t(Token::Use).parse_next(input)?;
    cut_err(input, |input| {
        let (path, path_span) = directive_path(input)?;
        Ok(CstItem::Use(CstDirective {
            path,
            span: keyword.union(path_span),
        }))
    })
}

fn include_directive<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstItem<'src>> {
    let keyword = t(Token::Include).parse_next(input)?;
    cut_err(input, |input| {
        let (path, path_span) = directive_path(input)?;
        Ok(CstItem::Include(CstDirective {
            path,
            span: keyword.union(path_span),
        }))
    })
}

/// Capture a top-level comment as an item.
fn comment_item<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstItem<'src>> {
    any.verify_map(|token: &PositionedToken<'src>| match &token.token {
        Token::LineComment(text) => Some(CstItem::Comment(CstComment {
            text,
            block: false,
            span: token.span,
        })),
        Token::BlockComment(text) => Some(CstItem::Comment(CstComment {
            text,
            block: true,
            span: token.span,
        })),
        _ => None,
    })
    .parse_next(input)
}

fn top_level_item<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<CstItem<'src>> {
    alt((
        use_directive,
        include_directive,
        comment_item,
        statement.map(CstItem::Statement),
    ))
    .parse_next(input)
}

/// Parse a complete program to end-of-input.
fn program<'t, 'src>(input: &mut Input<'t, 'src>) -> IResult<Vec<CstItem<'src>>> {
    let items = repeat(0.., |input: &mut Input<'t, 'src>| {
        let _ = ws_only0(input)?;
        top_level_item(input)
    })
    .parse_next(input)?;
    let _ = ws_only0(input)?;

    if !input.is_empty() {
        return Err(cut_error_with_offset(input));
    }

    Ok(items)
}

/// Utility function to convert winnow errors to our diagnostic format.
///
/// Extracts position information from error context (StartOffset) and
/// calculates precise error spans using the token array.
fn convert_error(
    error: ErrMode<ContextError<Context>>,
    tokens: &[PositionedToken],
    current_remaining: usize,
) -> Diagnostic {
    if tokens.is_empty() {
        return Diagnostic::error("incomplete input, more tokens expected")
            .with_code(ErrorCode::E101)
            .with_label(Span::default(), "incomplete");
    }

    // Extract start offset from error context if available
    let start_remaining = match &error {
        ErrMode::Backtrack(e) | ErrMode::Cut(e) => e.context().find_map(|ctx| match ctx {
            Context::StartOffset(n) => Some(*n),
            _ => None,
        }),
        _ => None,
    };

    // Calculate offsets from remaining token counts
    let end_offset = tokens.len() - current_remaining;
    let start_offset = start_remaining.map(|r| tokens.len() - r).unwrap_or(0);

    match error {
        ErrMode::Backtrack(e) | ErrMode::Cut(e) => {
            let contexts: Vec<String> = e
                .context()
                .filter_map(|ctx| match ctx {
                    Context::Label(label) => Some(format!("expected {label}")),
                    _ => None,
                })
                .collect();

            let message = if contexts.is_empty() {
                "unexpected token or end of input".to_string()
            } else {
                contexts.join(" in ")
            };

            // Calculate error span from token positions
            let error_span = {
                let examine_range = if start_offset < end_offset {
                    start_offset..end_offset
                } else if end_offset < tokens.len() {
                    end_offset..end_offset + 1
                } else {
                    0..tokens.len()
                };

                let slice = &tokens[examine_range];
                let first = slice
                    .iter()
                    .find(|t| !t.is_trivia())
                    .map(|t| t.span)
                    .unwrap_or(slice[0].span);
                let last = slice
                    .iter()
                    .rev()
                    .find(|t| !t.is_trivia())
                    .map(|t| t.span)
                    .unwrap_or(slice[slice.len() - 1].span);
                first.union(last)
            };

            Diagnostic::error(format!("unexpected token: {message}"))
                .with_code(ErrorCode::E100)
                .with_label(error_span, "unexpected token")
                .with_help("check syntax and token positioning")
        }
        ErrMode::Incomplete(_) => {
            // Not reachable without streaming input.
            let error_span = if end_offset < tokens.len() {
                tokens[end_offset].span
            } else {
                tokens
                    .iter()
                    .rev()
                    .find(|t| !t.is_trivia())
                    .map(|t| t.span)
                    .unwrap_or(tokens[tokens.len() - 1].span)
            };

            Diagnostic::error("incomplete input, more tokens expected")
                .with_code(ErrorCode::E101)
                .with_label(error_span, "incomplete")
                .with_help("ensure input is complete")
        }
    }
}

/// Parse a token stream into a concrete parse tree.
///
/// A failed parse is a returned value, never a process abort: the
/// [`ParseError`] carries the failing offset and diagnostics.
pub fn parse_program<'t, 'src>(
    tokens: &'t [PositionedToken<'src>],
) -> Result<CstProgram<'src>, ParseError> {
    let mut token_slice = TokenSlice::new(tokens);

    match program(&mut token_slice) {
        Ok(items) => Ok(CstProgram { items }),
        Err(e) => {
            let current_remaining = token_slice.eof_offset();
            Err(convert_error(e, tokens, current_remaining).into())
        }
    }
}
