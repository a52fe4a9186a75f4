//! Lexical analyzer for OpenSCAD source text.
//!
//! The lexer converts source text into a stream of [`Token`]s for parsing.
//! It handles whitespace, comments, string literals, numeric literals
//! (decimal, scientific, and hexadecimal surface forms), and the `<path>`
//! tokens that may only follow a `use` or `include` keyword.
//!
//! String literal interiors are preserved verbatim: escape sequences are
//! recognized so a `\"` does not end the literal, but they are never
//! decoded at this layer.
//!
//! The public entry point is [`tokenize`], which performs error-recovering
//! lexical analysis and collects all diagnostics in a single pass.

use winnow::{
    Parser as _,
    combinator::{alt, cut_err, opt, preceded, repeat, terminated},
    error::{ContextError, ErrMode, ModalResult},
    stream::{LocatingSlice, Location, Stream},
    token::{any, literal, none_of, one_of, take_until, take_while},
};

use crate::{
    error::{Diagnostic, DiagnosticCollector, ErrorCode, ParseError},
    span::Span,
    tokens::{PositionedToken, Token},
};

/// Rich diagnostic information for lexer errors.
///
/// Attached to winnow errors via `.context()` to provide detailed error
/// messages with codes, help text, and precise span information.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LexerDiagnostic {
    pub code: ErrorCode,
    pub message: &'static str,
    pub help: Option<&'static str>,
    /// The error span covers from `start` to the error position.
    pub start: usize,
}

type Input<'a> = LocatingSlice<&'a str>;
type IResult<'a, O> = ModalResult<O, ContextError<LexerDiagnostic>>;

/// Parse a complete string literal with double quotes.
///
/// The interior is kept exactly as written: a backslash always consumes
/// the character after it (so `\"` and `\\` do not terminate the literal),
/// but no escape decoding is performed. Newlines are permitted inside a
/// literal.
fn string_literal<'a>(input: &mut Input<'a>) -> IResult<'a, Token<'a>> {
    let start_pos = input.current_token_start();

    '"'.parse_next(input)
        .map_err(|_: ErrMode<ContextError<LexerDiagnostic>>| {
            ErrMode::Backtrack(ContextError::new())
        })?;

    cut_err(terminated(string_interior, '"'))
        .context(LexerDiagnostic {
            code: ErrorCode::E001,
            message: "unterminated string literal",
            help: Some("add a closing `\"`"),
            start: start_pos,
        })
        .parse_next(input)
        .map(Token::StringLiteral)
}

/// Interior of a string literal: any run of non-quote characters where a
/// backslash skips the following character.
fn string_interior<'a>(input: &mut Input<'a>) -> IResult<'a, &'a str> {
    repeat::<_, _, (), _, _>(
        0..,
        alt((preceded('\\', any).void(), none_of(['"', '\\']).void())),
    )
    .take()
    .parse_next(input)
}

/// Parse the `<path>` of a `use`/`include` directive.
///
/// Only attempted immediately after a `use` or `include` keyword (the
/// [`Lexer`] tracks that one-token context); everywhere else `<` lexes as
/// the less-than operator. The path must close on the same line.
fn file_path<'a>(input: &mut Input<'a>) -> IResult<'a, Token<'a>> {
    let start_pos = input.current_token_start();

    '<'.parse_next(input)
        .map_err(|_: ErrMode<ContextError<LexerDiagnostic>>| {
            ErrMode::Backtrack(ContextError::new())
        })?;

    cut_err(terminated(
        take_while(0.., |c: char| c != '>' && c != '\n'),
        '>',
    ))
    .context(LexerDiagnostic {
        code: ErrorCode::E003,
        message: "unterminated file path",
        help: Some("add a closing `>` on the same line"),
        start: start_pos,
    })
    .parse_next(input)
    .map(Token::FilePath)
}

/// Parse a line comment starting with `//`.
fn line_comment<'a>(input: &mut Input<'a>) -> IResult<'a, Token<'a>> {
    preceded("//", take_while(0.., |c| c != '\n'))
        .map(Token::LineComment)
        .parse_next(input)
}

/// Parse a block comment `/* ... */`, possibly spanning lines.
fn block_comment<'a>(input: &mut Input<'a>) -> IResult<'a, Token<'a>> {
    let start_pos = input.current_token_start();

    literal("/*")
        .parse_next(input)
        .map_err(|_: ErrMode<ContextError<LexerDiagnostic>>| {
            ErrMode::Backtrack(ContextError::new())
        })?;

    cut_err(terminated(take_until(0.., "*/"), "*/"))
        .context(LexerDiagnostic {
            code: ErrorCode::E004,
            message: "unterminated block comment",
            help: Some("add a closing `*/`"),
            start: start_pos,
        })
        .parse_next(input)
        .map(Token::BlockComment)
}

/// Parse a hexadecimal integer literal: `0x1F`, `0XFF`.
fn hex_number<'a>(input: &mut Input<'a>) -> IResult<'a, Token<'a>> {
    preceded(
        alt((literal("0x"), literal("0X"))),
        take_while(1.., |c: char| c.is_ascii_hexdigit()),
    )
    .map(|digits: &str| {
        let value = digits.chars().fold(0.0, |acc, c| {
            acc * 16.0 + c.to_digit(16).expect("hex digit verified by take_while") as f64
        });
        Token::NumberLiteral(value)
    })
    .parse_next(input)
}

fn digits1<'a>(input: &mut Input<'a>) -> IResult<'a, &'a str> {
    take_while(1.., |c: char| c.is_ascii_digit()).parse_next(input)
}

fn digits0<'a>(input: &mut Input<'a>) -> IResult<'a, &'a str> {
    take_while(0.., |c: char| c.is_ascii_digit()).parse_next(input)
}

fn exponent_part<'a>(input: &mut Input<'a>) -> IResult<'a, ()> {
    (one_of(['e', 'E']), opt(one_of(['+', '-'])), digits1)
        .void()
        .parse_next(input)
}

/// Parse a decimal literal: `12`, `1.5`, `5.`, `.25`, `1e-3`, `2.5E+4`.
///
/// The literal is unsigned; a leading sign lexes as a unary operator.
fn decimal_number<'a>(input: &mut Input<'a>) -> IResult<'a, Token<'a>> {
    alt((
        (digits1, opt(('.', digits0)), opt(exponent_part)).take(),
        ('.', digits1, opt(exponent_part)).take(),
    ))
    .verify_map(|text: &str| text.parse::<f64>().ok().map(Token::NumberLiteral))
    .parse_next(input)
}

fn number<'a>(input: &mut Input<'a>) -> IResult<'a, Token<'a>> {
    alt((hex_number, decimal_number)).parse_next(input)
}

/// Parse an identifier or keyword.
///
/// Identifiers match `\$?[_A-Za-z][A-Za-z0-9_]*`. The maximal run is
/// consumed first, so keywords get word boundaries for free (`formula`
/// is an identifier, not `for` followed by `mula`), and `$`-prefixed
/// special variables (`$fn`, `$t`) are never keywords.
fn ident_or_keyword<'a>(input: &mut Input<'a>) -> IResult<'a, Token<'a>> {
    (
        opt('$'),
        take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').verify(|s: &str| {
            s.chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        }),
    )
        .take()
        .map(|name: &str| {
            if name.starts_with('$') {
                return Token::Identifier(name);
            }
            match name {
                "module" => Token::Module,
                "function" => Token::Function,
                "if" => Token::If,
                "else" => Token::Else,
                "for" => Token::For,
                "intersection_for" => Token::IntersectionFor,
                "let" => Token::Let,
                "assert" => Token::Assert,
                "echo" => Token::Echo,
                "each" => Token::Each,
                "use" => Token::Use,
                "include" => Token::Include,
                "true" => Token::True,
                "false" => Token::False,
                "undef" => Token::Undef,
                _ => Token::Identifier(name),
            }
        })
        .parse_next(input)
}

/// Parse multi-character operators (order matters - longest first).
fn multi_char_operator<'a>(input: &mut Input<'a>) -> IResult<'a, Token<'a>> {
    alt((
        literal("||").value(Token::LogicalOr),
        literal("&&").value(Token::LogicalAnd),
        literal("==").value(Token::EqualEqual),
        literal("!=").value(Token::NotEqual),
        literal("<=").value(Token::LessEqual),
        literal(">=").value(Token::GreaterEqual),
        literal("<<").value(Token::ShiftLeft),
        literal(">>").value(Token::ShiftRight),
    ))
    .parse_next(input)
}

/// Parse single character tokens.
fn single_char_token<'a>(input: &mut Input<'a>) -> IResult<'a, Token<'a>> {
    alt((
        alt((
            '!'.value(Token::Not),
            '~'.value(Token::BitNot),
            '|'.value(Token::BitOr),
            '&'.value(Token::BitAnd),
            '<'.value(Token::Less),
            '>'.value(Token::Greater),
            '='.value(Token::Equals),
            '?'.value(Token::Question),
            ':'.value(Token::Colon),
            '+'.value(Token::Plus),
            '-'.value(Token::Minus),
            '*'.value(Token::Star),
            '/'.value(Token::Slash),
        )),
        alt((
            '%'.value(Token::Percent),
            '^'.value(Token::Caret),
            '#'.value(Token::Hash),
            '.'.value(Token::Period),
            '('.value(Token::LeftParen),
            ')'.value(Token::RightParen),
            '{'.value(Token::LeftBrace),
            '}'.value(Token::RightBrace),
            '['.value(Token::LeftBracket),
            ']'.value(Token::RightBracket),
            ';'.value(Token::Semicolon),
            ','.value(Token::Comma),
        )),
    ))
    .parse_next(input)
}

/// Parse whitespace (spaces, tabs, carriage returns, but not newlines).
fn whitespace<'a>(input: &mut Input<'a>) -> IResult<'a, Token<'a>> {
    take_while(1.., |c: char| c.is_whitespace() && c != '\n')
        .value(Token::Whitespace)
        .parse_next(input)
}

/// Parse a newline.
fn newline<'a>(input: &mut Input<'a>) -> IResult<'a, Token<'a>> {
    '\n'.value(Token::Newline).parse_next(input)
}

/// Parse a single token with position tracking.
fn positioned_token<'a>(input: &mut Input<'a>) -> IResult<'a, PositionedToken<'a>> {
    let start_pos = input.current_token_start();

    let token = alt((
        line_comment,        // Must come before single char '/'
        block_comment,       // Must come before single char '/'
        string_literal,      // Must come before any single char
        multi_char_operator, // Must come before single char operators
        number,              // Must come before single char '.'
        ident_or_keyword,    // Maximal-run match gives word boundaries
        single_char_token,   // Single character tokens
        newline,             // Must come before whitespace
        whitespace,          // General whitespace
    ))
    .parse_next(input)?;

    let end_pos = input.current_token_start();
    let span = Span::new(start_pos..end_pos);

    Ok(PositionedToken::new(token, span))
}

/// Parse a `<path>` token with position tracking.
fn positioned_file_path<'a>(input: &mut Input<'a>) -> IResult<'a, PositionedToken<'a>> {
    let start_pos = input.current_token_start();
    let token = file_path.parse_next(input)?;
    let end_pos = input.current_token_start();
    Ok(PositionedToken::new(token, Span::new(start_pos..end_pos)))
}

/// Lexer that accumulates tokens and diagnostics during tokenization.
struct Lexer<'a> {
    tokens: Vec<PositionedToken<'a>>,
    diagnostics: DiagnosticCollector,
}

impl<'a> Lexer<'a> {
    fn new() -> Self {
        Self {
            tokens: Vec::new(),
            diagnostics: DiagnosticCollector::new(),
        }
    }

    /// Tokenize the input, collecting tokens and errors.
    ///
    /// Tracks one token of context: after a `use` or `include` keyword
    /// (trivia in between permitted), a `<` starts a file path token
    /// instead of a less-than operator.
    fn tokenize(&mut self, mut input: Input<'a>) {
        let mut expect_path = false;
        while !input.is_empty() {
            let result = if expect_path {
                match positioned_file_path(&mut input) {
                    Ok(token) => Ok(token),
                    Err(ErrMode::Backtrack(_)) => positioned_token(&mut input),
                    Err(e) => Err(e),
                }
            } else {
                positioned_token(&mut input)
            };

            match result {
                Ok(token) => {
                    if !token.is_trivia() {
                        expect_path = matches!(token.token, Token::Use | Token::Include);
                    }
                    self.tokens.push(token);
                }
                Err(e) => {
                    // Get position before recovery
                    let error_pos = input.current_token_start();

                    let diagnostic = Self::convert_err_mode(e, error_pos);
                    self.diagnostics.emit(diagnostic);

                    // Simple single-character skip recovery.
                    if !input.is_empty() {
                        input.next_token();
                    }
                    expect_path = false;
                }
            }
        }
    }

    /// Finish lexing and return tokens or collected errors.
    fn finish(self) -> Result<Vec<PositionedToken<'a>>, ParseError> {
        self.diagnostics.finish().map(|()| self.tokens)
    }

    /// Convert an ErrMode and error position to a Diagnostic.
    ///
    /// Extracts `LexerDiagnostic` from the error context for rich error info
    /// with code, message, and help. Falls back to E002 (unexpected character)
    /// if no diagnostic context is found.
    fn convert_err_mode(
        err: ErrMode<ContextError<LexerDiagnostic>>,
        error_pos: usize,
    ) -> Diagnostic {
        let context_error = match err {
            ErrMode::Backtrack(ctx) | ErrMode::Cut(ctx) => ctx,
            ErrMode::Incomplete(_) => ContextError::new(),
        };

        if let Some(LexerDiagnostic {
            code,
            message,
            help,
            start,
        }) = context_error.context().next()
        {
            let span = Span::new(*start..error_pos);

            let mut diag = Diagnostic::error(*message)
                .with_code(*code)
                .with_label(span, code.description());
            if let Some(h) = help {
                diag = diag.with_help(*h);
            }
            return diag;
        }

        // Fallback when no context is present
        let span = Span::new(error_pos..error_pos.saturating_add(1));
        Diagnostic::error("unexpected character")
            .with_code(ErrorCode::E002)
            .with_label(span, ErrorCode::E002.description())
    }
}

/// Parse tokens from a string input, collecting multiple errors.
///
/// Attempts to recover from errors and continue tokenizing, collecting
/// all errors encountered, so a single pass can report multiple issues.
///
/// # Returns
///
/// - `Ok(tokens)` - All tokens successfully parsed
/// - `Err(ParseError)` - One or more errors occurred; contains all diagnostics
pub fn tokenize(input: &str) -> Result<Vec<PositionedToken<'_>>, ParseError> {
    let located_input = LocatingSlice::new(input);
    let mut lexer = Lexer::new();
    lexer.tokenize(located_input);
    lexer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_single_token(input: &str, expected: Token<'_>) {
        let mut located_input = LocatingSlice::new(input);
        let result = positioned_token(&mut located_input);
        assert!(result.is_ok(), "Failed to parse: {}", input);
        let positioned = result.unwrap();
        assert_eq!(positioned.token, expected);
    }

    /// Significant (non-trivia) tokens of an input that must lex cleanly.
    fn significant_tokens(input: &str) -> Vec<Token<'_>> {
        tokenize(input)
            .expect("input should tokenize")
            .into_iter()
            .filter(|t| !t.is_trivia())
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_keywords() {
        test_single_token("module", Token::Module);
        test_single_token("function", Token::Function);
        test_single_token("if", Token::If);
        test_single_token("else", Token::Else);
        test_single_token("for", Token::For);
        test_single_token("intersection_for", Token::IntersectionFor);
        test_single_token("let", Token::Let);
        test_single_token("assert", Token::Assert);
        test_single_token("echo", Token::Echo);
        test_single_token("each", Token::Each);
        test_single_token("use", Token::Use);
        test_single_token("include", Token::Include);
        test_single_token("true", Token::True);
        test_single_token("false", Token::False);
        test_single_token("undef", Token::Undef);
    }

    #[test]
    fn test_keyword_word_boundaries() {
        test_single_token("formula", Token::Identifier("formula"));
        test_single_token("iffy", Token::Identifier("iffy"));
        test_single_token("for_each", Token::Identifier("for_each"));
        test_single_token("lettuce", Token::Identifier("lettuce"));
        test_single_token("modules", Token::Identifier("modules"));
    }

    #[test]
    fn test_identifiers() {
        test_single_token("hello", Token::Identifier("hello"));
        test_single_token("_private", Token::Identifier("_private"));
        test_single_token("var123", Token::Identifier("var123"));
        test_single_token("$fn", Token::Identifier("$fn"));
        test_single_token("$children", Token::Identifier("$children"));
    }

    #[test]
    fn test_numbers() {
        test_single_token("1", Token::NumberLiteral(1.0));
        test_single_token("42", Token::NumberLiteral(42.0));
        test_single_token("1.5", Token::NumberLiteral(1.5));
        test_single_token("5.", Token::NumberLiteral(5.0));
        test_single_token(".25", Token::NumberLiteral(0.25));
        test_single_token("1e5", Token::NumberLiteral(1e5));
        test_single_token("2.5e-3", Token::NumberLiteral(2.5e-3));
        test_single_token("1.23E+4", Token::NumberLiteral(1.23e4));
        test_single_token("0x1F", Token::NumberLiteral(31.0));
        test_single_token("0XFF", Token::NumberLiteral(255.0));
    }

    #[test]
    fn test_number_sign_is_separate() {
        // Signs are unary operators, not part of the literal.
        assert_eq!(
            significant_tokens("-1.5"),
            vec![Token::Minus, Token::NumberLiteral(1.5)]
        );
        assert_eq!(
            significant_tokens("+2"),
            vec![Token::Plus, Token::NumberLiteral(2.0)]
        );
    }

    #[test]
    fn test_string_literal_preserves_escapes() {
        // The interior is kept verbatim; `\n` stays two characters.
        test_single_token(r#""a\nb""#, Token::StringLiteral(r"a\nb"));
        test_single_token(r#""quote: \" end""#, Token::StringLiteral(r#"quote: \" end"#));
        test_single_token(r#""back\\slash""#, Token::StringLiteral(r"back\\slash"));
        test_single_token("\"\"", Token::StringLiteral(""));
    }

    #[test]
    fn test_string_literal_spans_newlines() {
        test_single_token("\"line1\nline2\"", Token::StringLiteral("line1\nline2"));
    }

    #[test]
    fn test_file_path_after_use_and_include() {
        assert_eq!(
            significant_tokens("use <lib/shapes.scad>"),
            vec![Token::Use, Token::FilePath("lib/shapes.scad")]
        );
        assert_eq!(
            significant_tokens("include <util.scad>"),
            vec![Token::Include, Token::FilePath("util.scad")]
        );
    }

    #[test]
    fn test_less_than_outside_directive_context() {
        assert_eq!(
            significant_tokens("a < b"),
            vec![
                Token::Identifier("a"),
                Token::Less,
                Token::Identifier("b")
            ]
        );
    }

    #[test]
    fn test_operators() {
        test_single_token("||", Token::LogicalOr);
        test_single_token("&&", Token::LogicalAnd);
        test_single_token("==", Token::EqualEqual);
        test_single_token("!=", Token::NotEqual);
        test_single_token("<=", Token::LessEqual);
        test_single_token(">=", Token::GreaterEqual);
        test_single_token("<<", Token::ShiftLeft);
        test_single_token(">>", Token::ShiftRight);
        test_single_token("^", Token::Caret);
        test_single_token("%", Token::Percent);
        test_single_token("#", Token::Hash);
        test_single_token("~", Token::BitNot);
    }

    #[test]
    fn test_comments() {
        test_single_token("// note", Token::LineComment(" note"));
        test_single_token("//", Token::LineComment(""));
        test_single_token("/* multi\nline */", Token::BlockComment(" multi\nline "));
    }

    #[test]
    fn test_span_tracking() {
        let tokens = tokenize("x = 10;").unwrap();
        let significant: Vec<_> = tokens.iter().filter(|t| !t.is_trivia()).collect();
        assert_eq!(significant[0].span.start(), 0); // x
        assert_eq!(significant[1].span.start(), 2); // =
        assert_eq!(significant[2].span.start(), 4); // 10
        assert_eq!(significant[2].span.end(), 6);
        assert_eq!(significant[3].span.start(), 6); // ;
    }

    #[test]
    fn test_full_statement() {
        assert_eq!(
            significant_tokens("cube([1, 2, 3]);"),
            vec![
                Token::Identifier("cube"),
                Token::LeftParen,
                Token::LeftBracket,
                Token::NumberLiteral(1.0),
                Token::Comma,
                Token::NumberLiteral(2.0),
                Token::Comma,
                Token::NumberLiteral(3.0),
                Token::RightBracket,
                Token::RightParen,
                Token::Semicolon,
            ]
        );
    }

    /// Helper to verify error codes in diagnostics match exactly in order.
    fn assert_error_codes(input: &str, expected_codes: &[ErrorCode]) {
        let result = tokenize(input);
        assert!(result.is_err(), "Expected lexer to fail on input: '{input}'");
        let parse_error = result.unwrap_err();
        let diagnostics = parse_error.diagnostics();
        assert_eq!(
            diagnostics.len(),
            expected_codes.len(),
            "Expected {} errors for input '{input}', got {}",
            expected_codes.len(),
            diagnostics.len()
        );
        for (i, (diag, expected)) in diagnostics.iter().zip(expected_codes).enumerate() {
            assert_eq!(
                diag.code(),
                Some(*expected),
                "Error {i}: expected {expected:?} for input '{input}'"
            );
        }
    }

    #[test]
    fn test_error_code_e001_unterminated_string() {
        assert_error_codes("\"unterminated", &[ErrorCode::E001]);
        assert_error_codes("\"", &[ErrorCode::E001]);
    }

    #[test]
    fn test_error_code_e002_unexpected_character() {
        assert_error_codes("@", &[ErrorCode::E002]);
        assert_error_codes("`", &[ErrorCode::E002]);
    }

    #[test]
    fn test_error_code_e003_unterminated_file_path() {
        assert_error_codes("use <lib.scad\nx = 1;", &[ErrorCode::E003]);
    }

    #[test]
    fn test_error_code_e004_unterminated_block_comment() {
        assert_error_codes("/* never closed", &[ErrorCode::E004]);
    }

    #[test]
    fn test_recovery_continues_after_error() {
        assert_error_codes("@ `", &[ErrorCode::E002, ErrorCode::E002]);
    }

    #[test]
    fn test_unterminated_string_span() {
        let err = tokenize("x = \"oops").unwrap_err();
        let diagnostics = err.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        let span = diagnostics[0].labels()[0].span();
        // Span covers from the opening quote to the end of input.
        assert_eq!(span.start(), 4);
        assert_eq!(span.end(), 9);
    }
}
