//! Plural rule engine: per-locale rule expressions over a count `n`.
//!
//! A rule is a small boolean/arithmetic expression (`%`, comparisons,
//! `&&`/`||`, ternary conditional, parentheses, integer literals, the
//! single free variable `n`) that evaluates to the zero-based index of the
//! plural form to use. Rules are compiled by a recursive-descent parser
//! into an owned AST and interpreted directly; there is no dynamic code
//! generation. Compiled rules are cached by expression text since the same
//! expression recurs across related locales.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::{LinguaError, LinguaResult};
use crate::locale::LocaleId;

/// The trivial rule for locales without a table entry: always form 0.
pub const IDENTITY_RULE: &str = "0";

/// Rule expression for a locale: exact tag first, then primary subtag,
/// then the identity rule.
pub fn rule_for(locale: &LocaleId) -> &'static str {
    table_rule(locale.as_str())
        .or_else(|| table_rule(locale.primary_subtag()))
        .unwrap_or(IDENTITY_RULE)
}

/// Built-in locale-to-rule table.
///
/// Index semantics follow each language's conventional form order, e.g.
/// `[one, many]` for English-like locales and `[one, few, many]` for the
/// East Slavic group.
fn table_rule(tag: &str) -> Option<&'static str> {
    let rule = match tag {
        // Germanic/Romance two-form: 1 is singular
        "en" | "de" | "nl" | "sv" | "da" | "no" | "it" | "es" | "pt" | "el" | "fi" | "et"
        | "hu" | "tr" | "bg" | "he" => "(n != 1 ? 1 : 0)",
        // Two-form where 0 also takes the singular
        "fr" | "hi" => "(n > 1 ? 1 : 0)",
        "pt-br" => "(n > 1 ? 1 : 0)",
        // East Slavic one/few/many
        "ru" | "uk" | "be" | "sr" | "hr" | "bs" => {
            "(n%10==1 && n%100!=11 ? 0 : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2)"
        }
        "pl" => "(n==1 ? 0 : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2)",
        "cs" | "sk" => "(n==1 ? 0 : n>=2 && n<=4 ? 1 : 2)",
        "lt" => "(n%10==1 && n%100!=11 ? 0 : n%10>=2 && (n%100<10 || n%100>=20) ? 1 : 2)",
        "ro" => "(n==1 ? 0 : n==0 || (n%100>0 && n%100<20) ? 1 : 2)",
        "sl" => "(n%100==1 ? 0 : n%100==2 ? 1 : n%100==3 || n%100==4 ? 2 : 3)",
        "ar" => {
            "(n==0 ? 0 : n==1 ? 1 : n==2 ? 2 : n%100>=3 && n%100<=10 ? 3 : n%100>=11 ? 4 : 5)"
        }
        // No grammatical number distinction
        "ja" | "zh" | "ko" | "th" | "vi" | "id" | "ms" => "0",
        _ => return None,
    };
    Some(rule)
}

// ---------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Number(i64), // integer literal
    Count,       // the free variable `n`
    Percent,     // `%`
    EqEq,        // `==`
    NotEq,       // `!=`
    Lt,          // `<`
    Le,          // `<=`
    Gt,          // `>`
    Ge,          // `>=`
    AndAnd,      // `&&`
    OrOr,        // `||`
    Question,    // `?`
    Colon,       // `:`
    OpenParen,   // `(`
    CloseParen,  // `)`
}

#[derive(Debug, Clone, Copy)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

/// Tokenize a rule expression. Errors carry the byte offset of the
/// offending input.
fn tokenize(expression: &str) -> Result<Vec<Token>, (usize, String)> {
    let bytes = expression.as_bytes();
    let mut tokens = Vec::new();
    let mut idx = 0;

    while idx < bytes.len() {
        let start = idx;
        let b = bytes[idx];
        match b {
            b' ' | b'\t' => {
                idx += 1;
            }
            b'(' => {
                idx += 1;
                tokens.push(Token { kind: TokenKind::OpenParen, offset: start });
            }
            b')' => {
                idx += 1;
                tokens.push(Token { kind: TokenKind::CloseParen, offset: start });
            }
            b'%' => {
                idx += 1;
                tokens.push(Token { kind: TokenKind::Percent, offset: start });
            }
            b'?' => {
                idx += 1;
                tokens.push(Token { kind: TokenKind::Question, offset: start });
            }
            b':' => {
                idx += 1;
                tokens.push(Token { kind: TokenKind::Colon, offset: start });
            }
            b'=' => {
                if bytes.get(idx + 1) == Some(&b'=') {
                    idx += 2;
                    tokens.push(Token { kind: TokenKind::EqEq, offset: start });
                } else {
                    return Err((start, "expected '=='".to_string()));
                }
            }
            b'!' => {
                if bytes.get(idx + 1) == Some(&b'=') {
                    idx += 2;
                    tokens.push(Token { kind: TokenKind::NotEq, offset: start });
                } else {
                    return Err((start, "expected '!='".to_string()));
                }
            }
            b'&' => {
                if bytes.get(idx + 1) == Some(&b'&') {
                    idx += 2;
                    tokens.push(Token { kind: TokenKind::AndAnd, offset: start });
                } else {
                    return Err((start, "expected '&&'".to_string()));
                }
            }
            b'|' => {
                if bytes.get(idx + 1) == Some(&b'|') {
                    idx += 2;
                    tokens.push(Token { kind: TokenKind::OrOr, offset: start });
                } else {
                    return Err((start, "expected '||'".to_string()));
                }
            }
            b'<' => {
                if bytes.get(idx + 1) == Some(&b'=') {
                    idx += 2;
                    tokens.push(Token { kind: TokenKind::Le, offset: start });
                } else {
                    idx += 1;
                    tokens.push(Token { kind: TokenKind::Lt, offset: start });
                }
            }
            b'>' => {
                if bytes.get(idx + 1) == Some(&b'=') {
                    idx += 2;
                    tokens.push(Token { kind: TokenKind::Ge, offset: start });
                } else {
                    idx += 1;
                    tokens.push(Token { kind: TokenKind::Gt, offset: start });
                }
            }
            b'0'..=b'9' => {
                while idx < bytes.len() && bytes[idx].is_ascii_digit() {
                    idx += 1;
                }
                let literal = &expression[start..idx];
                let value: i64 = literal
                    .parse()
                    .map_err(|_| (start, format!("integer literal '{literal}' out of range")))?;
                tokens.push(Token { kind: TokenKind::Number(value), offset: start });
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while idx < bytes.len()
                    && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_')
                {
                    idx += 1;
                }
                let name = &expression[start..idx];
                if name == "n" {
                    tokens.push(Token { kind: TokenKind::Count, offset: start });
                } else {
                    // Only `n` may be referenced inside a rule
                    return Err((start, format!("unknown identifier '{name}'")));
                }
            }
            _ => {
                return Err((start, format!("unexpected character '{}'", b as char)));
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Count,
    Literal(i64),
    Mod(Box<Expr>, Box<Expr>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    end: usize,
}

type ParseResult<T> = Result<T, (usize, String)>;

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], end: usize) -> Self {
        Self { tokens, pos: 0, end }
    }

    fn peek(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|t| t.kind)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |t| t.offset)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).copied();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> ParseResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err((self.offset(), format!("expected {what}")))
        }
    }

    /// expr := or ('?' expr ':' expr)?   (right-associative ternary)
    fn parse_expr(&mut self) -> ParseResult<Expr> {
        let condition = self.parse_or()?;
        if self.eat(TokenKind::Question) {
            let then_branch = self.parse_expr()?;
            self.expect(TokenKind::Colon, "':' in conditional")?;
            let else_branch = self.parse_expr()?;
            Ok(Expr::Cond(
                Box::new(condition),
                Box::new(then_branch),
                Box::new(else_branch),
            ))
        } else {
            Ok(condition)
        }
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat(TokenKind::OrOr) {
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_comparison()?;
        while self.eat(TokenKind::AndAnd) {
            let rhs = self.parse_comparison()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// A single, non-chaining comparison.
    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let lhs = self.parse_modulo()?;
        let op = match self.peek() {
            Some(TokenKind::EqEq) => CmpOp::Eq,
            Some(TokenKind::NotEq) => CmpOp::Ne,
            Some(TokenKind::Lt) => CmpOp::Lt,
            Some(TokenKind::Le) => CmpOp::Le,
            Some(TokenKind::Gt) => CmpOp::Gt,
            Some(TokenKind::Ge) => CmpOp::Ge,
            _ => return Ok(lhs),
        };
        self.bump();
        let rhs = self.parse_modulo()?;
        Ok(Expr::Cmp(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_modulo(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_primary()?;
        while self.eat(TokenKind::Percent) {
            let rhs = self.parse_primary()?;
            lhs = Expr::Mod(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let offset = self.offset();
        match self.bump().map(|t| t.kind) {
            Some(TokenKind::Number(value)) => Ok(Expr::Literal(value)),
            Some(TokenKind::Count) => Ok(Expr::Count),
            Some(TokenKind::OpenParen) => {
                let inner = self.parse_expr()?;
                self.expect(TokenKind::CloseParen, "')'")?;
                Ok(inner)
            }
            Some(other) => Err((offset, format!("unexpected token {other:?}"))),
            None => Err((offset, "unexpected end of expression".to_string())),
        }
    }
}

// ---------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------

/// Intermediate value during evaluation. Booleans coerce to 1/0 when an
/// integer is required, so two-category rules like `n != 1` select
/// directly into a two-form array.
#[derive(Debug, Clone, Copy)]
enum Value {
    Int(i64),
    Bool(bool),
}

impl Value {
    fn as_int(self) -> i64 {
        match self {
            Value::Int(i) => i,
            Value::Bool(b) => i64::from(b),
        }
    }

    fn truthy(self) -> bool {
        match self {
            Value::Int(i) => i != 0,
            Value::Bool(b) => b,
        }
    }
}

fn eval(expr: &Expr, n: i64) -> Option<Value> {
    match expr {
        Expr::Count => Some(Value::Int(n)),
        Expr::Literal(value) => Some(Value::Int(*value)),
        Expr::Mod(lhs, rhs) => {
            let lhs = eval(lhs, n)?.as_int();
            let rhs = eval(rhs, n)?.as_int();
            // checked_rem covers both % 0 and the i64::MIN % -1 overflow
            lhs.checked_rem(rhs).map(Value::Int)
        }
        Expr::Cmp(op, lhs, rhs) => {
            let lhs = eval(lhs, n)?.as_int();
            let rhs = eval(rhs, n)?.as_int();
            let result = match op {
                CmpOp::Eq => lhs == rhs,
                CmpOp::Ne => lhs != rhs,
                CmpOp::Lt => lhs < rhs,
                CmpOp::Le => lhs <= rhs,
                CmpOp::Gt => lhs > rhs,
                CmpOp::Ge => lhs >= rhs,
            };
            Some(Value::Bool(result))
        }
        Expr::And(lhs, rhs) => {
            let lhs = eval(lhs, n)?.truthy();
            if !lhs {
                return Some(Value::Bool(false));
            }
            Some(Value::Bool(eval(rhs, n)?.truthy()))
        }
        Expr::Or(lhs, rhs) => {
            let lhs = eval(lhs, n)?.truthy();
            if lhs {
                return Some(Value::Bool(true));
            }
            Some(Value::Bool(eval(rhs, n)?.truthy()))
        }
        Expr::Cond(condition, then_branch, else_branch) => {
            if eval(condition, n)?.truthy() {
                eval(then_branch, n)
            } else {
                eval(else_branch, n)
            }
        }
    }
}

/// A compiled plural rule: the parsed AST of one expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRule {
    expression: String,
    ast: Expr,
}

impl CompiledRule {
    /// The source expression text.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Evaluate the rule for a count. `None` means the expression failed
    /// arithmetically or produced a negative index; callers treat that as
    /// a missing form.
    pub fn evaluate(&self, count: i64) -> Option<usize> {
        let value = eval(&self.ast, count)?;
        let index = value.as_int();
        usize::try_from(index).ok()
    }

    /// Select the plural form for a count, or `None` when the computed
    /// index is out of range of the provided forms.
    pub fn select<'a>(&self, count: i64, forms: &'a [String]) -> Option<&'a str> {
        let index = self.evaluate(count)?;
        forms.get(index).map(String::as_str)
    }
}

/// Compile a rule expression into a [`CompiledRule`].
pub fn compile(expression: &str) -> LinguaResult<CompiledRule> {
    let fail = |(offset, reason): (usize, String)| LinguaError::RuleCompilation {
        expression: expression.to_string(),
        offset,
        reason,
    };

    let tokens = tokenize(expression).map_err(fail)?;
    if tokens.is_empty() {
        return Err(fail((0, "empty expression".to_string())));
    }
    let mut parser = Parser::new(&tokens, expression.len());
    let ast = parser.parse_expr().map_err(fail)?;
    if let Some(token) = parser.bump() {
        return Err(fail((token.offset, "unexpected trailing tokens".to_string())));
    }

    Ok(CompiledRule {
        expression: expression.to_string(),
        ast,
    })
}

// ---------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------

/// Compiles rule expressions on demand and caches them by expression
/// text. One engine instance is shared across all query paths; the cache
/// lives and dies with it.
#[derive(Debug, Default)]
pub struct PluralRuleEngine {
    cache: RwLock<HashMap<String, Arc<CompiledRule>>>,
}

impl PluralRuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the compiled form of an expression, compiling and caching it
    /// on first use.
    pub fn compiled(&self, expression: &str) -> LinguaResult<Arc<CompiledRule>> {
        if let Ok(cache) = self.cache.read() {
            if let Some(rule) = cache.get(expression) {
                return Ok(Arc::clone(rule));
            }
        }

        let rule = Arc::new(compile(expression)?);
        if let Ok(mut cache) = self.cache.write() {
            // A racing compile of the same text may have won; keep the
            // first entry so cached rules stay pointer-stable.
            let entry = cache
                .entry(expression.to_string())
                .or_insert_with(|| Arc::clone(&rule));
            debug!(expression, "compiled plural rule");
            return Ok(Arc::clone(entry));
        }
        Ok(rule)
    }

    /// Compile (or fetch) `expression` and select the form for `count`.
    ///
    /// `Ok(None)` is the missing-form outcome: evaluation failure or an
    /// index beyond `forms`.
    pub fn select<'a>(
        &self,
        expression: &str,
        count: i64,
        forms: &'a [String],
    ) -> LinguaResult<Option<&'a str>> {
        let rule = self.compiled(expression)?;
        Ok(rule.select(count, forms))
    }

    /// Number of distinct expressions compiled so far.
    pub fn cached_rules(&self) -> usize {
        self.cache.read().map(|cache| cache.len()).unwrap_or(0)
    }
}
