//! Lexical view of query text
//!
//! The optimizer never parses SQL. It runs the sqlparser tokenizer and
//! answers a handful of questions from the tokens:
//!
//! - which costed constructs appear (join, group by, order by, distinct)
//! - where hint markers go (after `SELECT`, after `ORDER BY`)
//! - which tables follow `FROM` / `JOIN` / `UPDATE` / `INTO`
//!
//! Literals, quoted identifiers and comments are single tokens, so their
//! contents never count as keywords. Token spans (line, column) are mapped
//! back to byte offsets in the original text.

use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Location, Token, Tokenizer, TokenizerError, Whitespace};

use super::errors::{OptimizerError, OptimizerResult};

/// A token with its byte range in the original query
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Lexeme {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

impl Lexeme {
    fn is_whitespace(&self) -> bool {
        matches!(self.token, Token::Whitespace(_))
    }

    /// Space, tab or newline; comments excluded
    pub fn is_blank(&self) -> bool {
        matches!(
            self.token,
            Token::Whitespace(Whitespace::Space | Whitespace::Tab | Whitespace::Newline)
        )
    }

    /// Unquoted keyword, if this token is one
    fn keyword(&self) -> Option<Keyword> {
        match &self.token {
            Token::Word(w) if w.quote_style.is_none() => Some(w.keyword),
            _ => None,
        }
    }
}

/// Tokenize `query` with byte offsets
pub(crate) fn lex(query: &str) -> Result<Vec<Lexeme>, TokenizerError> {
    let dialect = PostgreSqlDialect {};
    let tokens = Tokenizer::new(&dialect, query).tokenize_with_location()?;
    let offsets = LineOffsets::new(query);

    Ok(tokens
        .into_iter()
        .filter(|t| t.token != Token::EOF)
        .map(|t| Lexeme {
            start: offsets.byte_offset(query, t.span.start),
            end: offsets.byte_offset(query, t.span.end),
            token: t.token,
        })
        .collect())
}

/// Tokens other than whitespace and comments; empty if the text does not lex
fn significant(query: &str) -> Vec<Lexeme> {
    lex(query)
        .map(|all| all.into_iter().filter(|l| !l.is_whitespace()).collect())
        .unwrap_or_default()
}

/// Byte start of each line; tokenizer columns count chars from 1
struct LineOffsets {
    starts: Vec<usize>,
}

impl LineOffsets {
    fn new(query: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(query.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    fn byte_offset(&self, query: &str, loc: Location) -> usize {
        let line = (loc.line.max(1) - 1) as usize;
        let Some(&start) = self.starts.get(line) else {
            return query.len();
        };
        let column = (loc.column.max(1) - 1) as usize;
        query[start..]
            .char_indices()
            .nth(column)
            .map_or(query.len(), |(i, _)| start + i)
    }
}

/// Constructs that influence cost
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryFeatures {
    pub has_join: bool,
    pub has_group_by: bool,
    pub has_order_by: bool,
    pub has_distinct: bool,
}

impl QueryFeatures {
    /// Detect constructs outside of literals, quoted names and comments
    pub fn detect(query: &str) -> Self {
        let tokens = significant(query);
        let has = |kw: Keyword| tokens.iter().any(|t| t.keyword() == Some(kw));
        Self {
            has_join: has(Keyword::JOIN),
            has_group_by: find_pair(&tokens, Keyword::GROUP, Keyword::BY).is_some(),
            has_order_by: find_pair(&tokens, Keyword::ORDER, Keyword::BY).is_some(),
            has_distinct: has(Keyword::DISTINCT),
        }
    }
}

/// Reject empty or structurally broken query text
pub fn validate_query(query: &str) -> OptimizerResult<()> {
    if query.trim().is_empty() {
        return Err(OptimizerError::invalid_query("query text is empty"));
    }
    if query.contains('\0') {
        return Err(OptimizerError::invalid_query("query text contains a NUL byte"));
    }

    let tokens = lex(query).map_err(|e| OptimizerError::invalid_query(e.to_string()))?;

    let mut depth: i64 = 0;
    for lexeme in &tokens {
        match lexeme.token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth -= 1;
                if depth < 0 {
                    return Err(OptimizerError::invalid_query("unbalanced ')'"));
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(OptimizerError::invalid_query("unclosed '('"));
    }
    Ok(())
}

/// Reject empty table names
pub fn validate_tables(tables: &[String]) -> OptimizerResult<()> {
    if tables.iter().any(|t| t.trim().is_empty()) {
        return Err(OptimizerError::invalid_query("table name is empty"));
    }
    Ok(())
}

/// Tables named after `FROM`, `JOIN`, `UPDATE` or `INTO`, in first-seen order.
/// Qualified names (`schema.table`) and quoted names keep their source text.
pub fn referenced_tables(query: &str) -> Vec<String> {
    let tokens = significant(query);
    let mut tables: Vec<String> = Vec::new();

    for (i, lexeme) in tokens.iter().enumerate() {
        if !matches!(
            lexeme.keyword(),
            Some(Keyword::FROM | Keyword::JOIN | Keyword::UPDATE | Keyword::INTO)
        ) {
            continue;
        }
        let Some(first) = tokens.get(i + 1) else {
            continue;
        };
        if !matches!(first.token, Token::Word(_)) || is_reserved(first.keyword()) {
            continue;
        }

        let mut end = first.end;
        let mut j = i + 2;
        while let (Some(dot), Some(part)) = (tokens.get(j), tokens.get(j + 1)) {
            if dot.token != Token::Period || !matches!(part.token, Token::Word(_)) {
                break;
            }
            end = part.end;
            j += 2;
        }

        let table = query[first.start..end].to_string();
        if !tables.contains(&table) {
            tables.push(table);
        }
    }
    tables
}

/// Byte offset just past the first `SELECT` keyword
pub(crate) fn select_anchor(query: &str) -> Option<usize> {
    significant(query)
        .into_iter()
        .find(|t| t.keyword() == Some(Keyword::SELECT))
        .map(|t| t.end)
}

/// Byte offset just past the first `ORDER BY`
pub(crate) fn order_by_anchor(query: &str) -> Option<usize> {
    let tokens = significant(query);
    find_pair(&tokens, Keyword::ORDER, Keyword::BY).map(|i| tokens[i + 1].end)
}

fn find_pair(tokens: &[Lexeme], first: Keyword, second: Keyword) -> Option<usize> {
    tokens
        .windows(2)
        .position(|w| w[0].keyword() == Some(first) && w[1].keyword() == Some(second))
}

fn is_reserved(keyword: Option<Keyword>) -> bool {
    matches!(
        keyword,
        Some(
            Keyword::SELECT
                | Keyword::LATERAL
                | Keyword::ONLY
                | Keyword::WHERE
                | Keyword::VALUES
                | Keyword::UNNEST
                | Keyword::ON
                | Keyword::AS
        )
    )
}
