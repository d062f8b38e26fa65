// crates/sls-client/src/query.rs
// ============================================================================
// Module: Query Canonicalizer
// Description: Rewrites free-form search expressions into quoted-token form.
// Purpose: Produce the strictly quoted conditions the log backend expects.
// Dependencies: none
// ============================================================================

//! ## Overview
//! The canonicalizer scans a search expression left to right and classifies
//! each token, in strict priority order, as one of:
//! 1. an already-quoted phrase;
//! 2. a parenthesis;
//! 3. a whole-word boolean operator (`AND`, `OR`, `NOT`, any case);
//! 4. a bare token.
//!
//! Bare tokens are wrapped in double quotes and everything else passes
//! through. The rewrite never fails and is idempotent. Unbalanced
//! parentheses are not validated.
//!
//! The module also owns the `with_pack_meta` suffix rule and the split
//! between the search stage and the analytic stage of a query.

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Boolean operators recognized as whole words.
const OPERATORS: [&str; 3] = ["AND", "OR", "NOT"];
/// Query stage that asks the backend to attach pack metadata.
pub const PACK_META_STAGE: &str = "with_pack_meta";
/// Wildcard search used when the caller supplies no condition.
pub const MATCH_ALL: &str = "*";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Classified token borrowed from the input expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryToken<'a> {
    /// Double-quoted phrase, quotes included.
    Quoted(&'a str),
    /// Single `(` or `)`.
    Group(&'a str),
    /// Boolean operator in its original spelling.
    Operator(&'a str),
    /// Unquoted search term.
    Bare(&'a str),
}

// ============================================================================
// SECTION: Canonicalization
// ============================================================================

/// Rewrites a search expression so every bare term is double-quoted.
///
/// Blank input is returned unchanged; callers supply their own default.
#[must_use]
pub fn canonicalize_query(input: &str) -> String {
    if input.trim().is_empty() {
        return input.to_string();
    }
    let mut output = String::with_capacity(input.len() + 8);
    let mut rest = input;
    while let Some((token, remainder)) = next_token(rest) {
        match token {
            QueryToken::Quoted(text) | QueryToken::Group(text) | QueryToken::Operator(text) => {
                output.push_str(text);
            }
            QueryToken::Bare(text) => {
                output.push('"');
                output.push_str(text);
                output.push('"');
            }
        }
        output.push(' ');
        rest = remainder;
    }
    output.trim_end().to_string()
}

/// Splits a query at the first `|` outside double quotes.
///
/// Returns the search stage and, when present, the analytic stage without the
/// separating pipe.
#[must_use]
pub fn split_pipeline(query: &str) -> (&str, Option<&str>) {
    let mut in_quotes = false;
    for (index, ch) in query.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '|' if !in_quotes => {
                return (&query[..index], Some(&query[index + 1..]));
            }
            _ => {}
        }
    }
    (query, None)
}

/// Applies the pack-metadata stage to a query.
///
/// Blank queries become `* | with_pack_meta`; queries that already mention the
/// stage are left alone.
#[must_use]
pub fn with_pack_meta(query: &str) -> String {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return format!("{MATCH_ALL} | {PACK_META_STAGE}");
    }
    if trimmed.contains(PACK_META_STAGE) {
        return trimmed.to_string();
    }
    format!("{trimmed} | {PACK_META_STAGE}")
}

/// Builds a search query with a canonical search stage.
///
/// A blank or match-all search stage becomes `*`. An analytic stage is passed
/// through verbatim.
#[must_use]
pub fn prepare_search_query(raw: &str) -> String {
    let (search, analytic) = split_pipeline(raw);
    let search = match search.trim() {
        "" | MATCH_ALL => MATCH_ALL.to_string(),
        text => canonicalize_query(text),
    };
    match analytic.map(str::trim) {
        Some(stage) if !stage.is_empty() => format!("{search} | {stage}"),
        _ => search,
    }
}

/// Builds the query string sent by log-search operations.
///
/// Same as [`prepare_search_query`], plus the pack-metadata stage when there is
/// no analytic stage.
#[must_use]
pub fn prepare_log_query(raw: &str) -> String {
    let has_analytic = split_pipeline(raw).1.is_some_and(|stage| !stage.trim().is_empty());
    let prepared = prepare_search_query(raw);
    if has_analytic { prepared } else { with_pack_meta(&prepared) }
}

// ============================================================================
// SECTION: Scanner
// ============================================================================

/// Reads the next token after leading whitespace.
fn next_token(input: &str) -> Option<(QueryToken<'_>, &str)> {
    let rest = input.trim_start();
    let first = rest.chars().next()?;
    if first == '"' {
        let end = rest[1..].find('"').map_or(rest.len(), |close| close + 2);
        return Some((QueryToken::Quoted(&rest[..end]), &rest[end..]));
    }
    if first == '(' || first == ')' {
        return Some((QueryToken::Group(&rest[..1]), &rest[1..]));
    }
    if let Some(len) = operator_len(rest) {
        return Some((QueryToken::Operator(&rest[..len]), &rest[len..]));
    }
    let end =
        rest.find(|ch: char| ch.is_whitespace() || ch == '(' || ch == ')').unwrap_or(rest.len());
    Some((QueryToken::Bare(&rest[..end]), &rest[end..]))
}

/// Returns the operator length when `input` starts with a whole-word operator.
///
/// Tokens always start after whitespace, a parenthesis, a closing quote, or an
/// operator boundary, so only the trailing boundary needs checking.
fn operator_len(input: &str) -> Option<usize> {
    OPERATORS.iter().find_map(|operator| {
        let head = input.get(..operator.len())?;
        if !head.eq_ignore_ascii_case(operator) {
            return None;
        }
        let boundary = input[operator.len()..].chars().next().is_none_or(|ch| !is_word_char(ch));
        boundary.then_some(operator.len())
    })
}

/// Word characters for operator boundary checks.
fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

// ============================================================================
// SECTION: Tests
// ============================================================================
