//! Recursive descent parser for query strings
//!
//! # Grammar (precedence low to high)
//!
//! ```text
//! query       := or_expr EOF
//! or_expr     := andnot_expr (OR andnot_expr)*
//! andnot_expr := and_expr (ANDNOT and_expr)*
//! and_expr    := not_expr ((AND)? not_expr)*        adjacency means AND
//! not_expr    := NOT not_expr | primary
//! primary     := '(' or_expr ')' | field ':' value | value
//! value       := range | phrase modifiers? | term modifiers?
//! range       := ('[' | '{') bound TO bound (']' | '}')
//! modifiers   := '~' distance? ('/' prefix)?
//! ```
//!
//! Unscoped values are searched across all default fields, combined with
//! OR. Malformed input fails with `QuerySyntax`; nothing is ever partially
//! parsed.

use crate::error::{Result, TagdexError};
use crate::query::ast::QueryNode;
use crate::query::nodes::{
    BoolQuery, FuzzyQuery, PhraseQuery, RangeQuery, TermQuery, WildcardQuery, DEFAULT_MAX_EDITS,
};
use crate::schema::Schema;

use super::lexer::{Lexer, Token};

/// Parser for the query language
pub struct QueryStringParser<'a> {
    lexer: Lexer,
    current_token: Token,
    current_pos: usize,
    schema: &'a Schema,
    default_fields: Vec<String>,
}

/// Parse a query string against a schema and a list of default fields
pub fn parse_query(
    input: &str,
    schema: &Schema,
    default_fields: &[String],
) -> Result<Box<dyn QueryNode>> {
    QueryStringParser::new(input, schema, default_fields)?.parse()
}

impl<'a> QueryStringParser<'a> {
    pub fn new(input: &str, schema: &'a Schema, default_fields: &[String]) -> Result<Self> {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token()?;
        let current_pos = lexer.token_start();

        Ok(Self {
            lexer,
            current_token,
            current_pos,
            schema,
            default_fields: default_fields.to_vec(),
        })
    }

    /// Parse the query string into a query AST
    pub fn parse(mut self) -> Result<Box<dyn QueryNode>> {
        if self.current_token == Token::Eof {
            return Err(TagdexError::syntax(0, "empty query"));
        }

        let query = self.parse_or_expr()?;

        if self.current_token != Token::Eof {
            return Err(TagdexError::syntax(
                self.current_pos,
                format!("unexpected token {:?} after query", self.current_token),
            ));
        }

        Ok(query)
    }

    fn parse_or_expr(&mut self) -> Result<Box<dyn QueryNode>> {
        let mut clauses = vec![self.parse_andnot_expr()?];

        while self.current_token == Token::Or {
            self.advance()?;
            clauses.push(self.parse_andnot_expr()?);
        }

        Ok(combine_should(clauses))
    }

    fn parse_andnot_expr(&mut self) -> Result<Box<dyn QueryNode>> {
        let mut node = self.parse_and_expr()?;

        while self.current_token == Token::AndNot {
            self.advance()?;
            let excluded = self.parse_and_expr()?;
            node = Box::new(
                BoolQuery::new()
                    .must_boxed(node)
                    .must_not_boxed(excluded),
            );
        }

        Ok(node)
    }

    fn parse_and_expr(&mut self) -> Result<Box<dyn QueryNode>> {
        let mut clauses = vec![self.parse_not_expr()?];

        loop {
            if self.current_token == Token::And {
                self.advance()?;
                clauses.push(self.parse_not_expr()?);
            } else if self.current_token == Token::Not || self.is_start_of_primary() {
                // Adjacent atoms are an implicit AND.
                clauses.push(self.parse_not_expr()?);
            } else {
                break;
            }
        }

        if clauses.len() == 1 {
            Ok(clauses.into_iter().next().unwrap())
        } else {
            let mut query = BoolQuery::new();
            for clause in clauses {
                query = query.must_boxed(clause);
            }
            Ok(Box::new(query))
        }
    }

    fn parse_not_expr(&mut self) -> Result<Box<dyn QueryNode>> {
        if self.current_token == Token::Not {
            self.advance()?;
            let inner = self.parse_not_expr()?;
            return Ok(Box::new(BoolQuery::new().must_not_boxed(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Box<dyn QueryNode>> {
        match self.current_token.clone() {
            Token::LeftParen => {
                self.advance()?;
                let expr = self.parse_or_expr()?;
                if self.current_token != Token::RightParen {
                    return Err(TagdexError::syntax(
                        self.current_pos,
                        "expected ')' to close group",
                    ));
                }
                self.advance()?;
                Ok(expr)
            }
            Token::Term(term) => {
                let term_pos = self.current_pos;
                self.advance()?;

                if self.current_token == Token::Colon {
                    self.advance()?;
                    if self.schema.field(&term).is_none() {
                        return Err(TagdexError::syntax(
                            term_pos,
                            format!("unknown field '{}'", term),
                        ));
                    }
                    self.parse_field_value(&term)
                } else {
                    let fields = self.default_fields.clone();
                    self.parse_term_with_modifiers(&fields, term)
                }
            }
            Token::QuotedString(text) => {
                self.advance()?;
                let fields = self.default_fields.clone();
                self.parse_phrase(&fields, text)
            }
            Token::LeftBracket | Token::LeftBrace => {
                let fields = self.default_fields.clone();
                self.parse_range(&fields)
            }
            _ => Err(TagdexError::syntax(
                self.current_pos,
                format!("expected a query expression, got {:?}", self.current_token),
            )),
        }
    }

    /// Parse the value following `field:`
    fn parse_field_value(&mut self, field: &str) -> Result<Box<dyn QueryNode>> {
        let fields = vec![field.to_string()];
        match self.current_token.clone() {
            Token::Term(term) => {
                self.advance()?;
                self.parse_term_with_modifiers(&fields, term)
            }
            Token::QuotedString(text) => {
                self.advance()?;
                self.parse_phrase(&fields, text)
            }
            Token::LeftBracket | Token::LeftBrace => self.parse_range(&fields),
            _ => Err(TagdexError::syntax(
                self.current_pos,
                format!("expected value after '{}:'", field),
            )),
        }
    }

    /// Term atom with optional fuzzy suffix or embedded wildcards
    fn parse_term_with_modifiers(
        &mut self,
        fields: &[String],
        term: String,
    ) -> Result<Box<dyn QueryNode>> {
        if let Token::Tilde { distance, prefix } = self.current_token {
            self.advance()?;
            let max_edits = distance.unwrap_or(DEFAULT_MAX_EDITS);
            let prefix_length = prefix.unwrap_or(0) as usize;
            return Ok(spread(fields, |field| {
                Box::new(
                    FuzzyQuery::new(field, term.clone())
                        .with_max_edits(max_edits)
                        .with_prefix_length(prefix_length),
                )
            }));
        }

        if term.contains('*') || term.contains('?') {
            return Ok(spread(fields, |field| {
                Box::new(WildcardQuery::new(field, term.clone()))
            }));
        }

        Ok(spread(fields, |field| {
            Box::new(TermQuery::new(field, term.clone()))
        }))
    }

    /// Quoted phrase with optional `~N` slop suffix
    fn parse_phrase(&mut self, fields: &[String], text: String) -> Result<Box<dyn QueryNode>> {
        let mut slop = 0;
        if let Token::Tilde { distance, prefix } = self.current_token {
            if prefix.is_some() {
                return Err(TagdexError::syntax(
                    self.current_pos,
                    "prefix length is not allowed on a phrase",
                ));
            }
            self.advance()?;
            slop = distance.unwrap_or(0);
        }

        Ok(spread(fields, |field| {
            Box::new(PhraseQuery::new(field, text.clone()).with_slop(slop))
        }))
    }

    /// Range atom: `[low TO high]`, `{low TO high}` or the mixed forms
    fn parse_range(&mut self, fields: &[String]) -> Result<Box<dyn QueryNode>> {
        let includes_low = self.current_token == Token::LeftBracket;
        self.advance()?;

        let low = self.parse_range_bound()?;

        if self.current_token != Token::To {
            return Err(TagdexError::syntax(
                self.current_pos,
                "expected TO in range",
            ));
        }
        self.advance()?;

        let high = self.parse_range_bound()?;

        let includes_high = match self.current_token {
            Token::RightBracket => true,
            Token::RightBrace => false,
            _ => {
                return Err(TagdexError::syntax(
                    self.current_pos,
                    "expected ']' or '}' to close range",
                ))
            }
        };
        self.advance()?;

        Ok(spread(fields, |field| {
            Box::new(
                RangeQuery::new(field, low.clone(), high.clone())
                    .with_bounds_inclusive(includes_low, includes_high),
            )
        }))
    }

    /// A range bound: a term, a quoted string, or `*` for unbounded
    fn parse_range_bound(&mut self) -> Result<Option<String>> {
        match self.current_token.clone() {
            Token::Term(term) => {
                self.advance()?;
                if term == "*" {
                    Ok(None)
                } else {
                    Ok(Some(term))
                }
            }
            Token::QuotedString(text) => {
                self.advance()?;
                Ok(Some(text))
            }
            _ => Err(TagdexError::syntax(
                self.current_pos,
                format!("expected range bound, got {:?}", self.current_token),
            )),
        }
    }

    fn is_start_of_primary(&self) -> bool {
        matches!(
            self.current_token,
            Token::Term(_)
                | Token::QuotedString(_)
                | Token::LeftParen
                | Token::LeftBracket
                | Token::LeftBrace
        )
    }

    fn advance(&mut self) -> Result<()> {
        self.current_token = self.lexer.next_token()?;
        self.current_pos = self.lexer.token_start();
        Ok(())
    }
}

/// Apply an atom across fields, OR-combined when there is more than one
fn spread<F>(fields: &[String], make: F) -> Box<dyn QueryNode>
where
    F: Fn(&str) -> Box<dyn QueryNode>,
{
    if fields.len() == 1 {
        return make(&fields[0]);
    }
    let mut query = BoolQuery::new();
    for field in fields {
        query = query.should_boxed(make(field));
    }
    Box::new(query)
}

/// Collapse a clause list into a should-combined bool, skipping the wrapper
/// for a single clause
fn combine_should(clauses: Vec<Box<dyn QueryNode>>) -> Box<dyn QueryNode> {
    if clauses.len() == 1 {
        return clauses.into_iter().next().unwrap();
    }
    let mut query = BoolQuery::new();
    for clause in clauses {
        query = query.should_boxed(clause);
    }
    Box::new(query)
}
