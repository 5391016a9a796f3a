//! Query parser for converting string queries to structured query objects.

use std::ops::Bound;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::per_field::PerFieldAnalyzer;
use crate::analysis::token::Channel;
use crate::document::field_value::FieldValue;
use crate::error::{GlaiveError, Result};
use crate::query::boolean::{BooleanClause, BooleanQuery, Occur};
use crate::query::phrase::PhraseQuery;
use crate::query::prefix::PrefixQuery;
use crate::query::query::{MatchAllQuery, Query};
use crate::query::range::RangeQuery;
use crate::query::term::TermQuery;

/// How adjacent clauses without an explicit operator combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Every clause is required.
    #[default]
    And,
    /// Any clause may match.
    Or,
}

/// Parses Lucene-style query strings.
///
/// Supported syntax:
/// - terms: `fox`, `title:fox`, run through the field's analyzer
/// - phrases: `"red fox"`
/// - prefixes: `run*`, matched against unstemmed words
/// - ranges: `date:[20240101 TO 20241231]`, `rank:{1 TO *}`
/// - modifiers: `+required`, `-prohibited`, `NOT prohibited`
/// - operators: `AND`, `OR` (also `&&`, `||`), grouping with parentheses
/// - boosts: `fox^2`, `(red fox)^0.5`
/// - `*:*` for every document, and `\` to escape special characters
///
/// Words analyzed to nothing (stop words) are dropped. An empty query
/// string parses to an empty boolean query, which matches nothing.
#[derive(Clone)]
pub struct QueryParser {
    analyzer: Arc<PerFieldAnalyzer>,
    default_fields: Vec<String>,
    default_operator: Operator,
}

impl std::fmt::Debug for QueryParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryParser")
            .field("default_fields", &self.default_fields)
            .field("default_operator", &self.default_operator)
            .finish()
    }
}

impl QueryParser {
    /// Create a parser searching `default_fields` for unqualified words.
    pub fn new<I, S>(analyzer: Arc<PerFieldAnalyzer>, default_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QueryParser {
            analyzer,
            default_fields: default_fields.into_iter().map(Into::into).collect(),
            default_operator: Operator::And,
        }
    }

    /// Set the operator used between clauses without one.
    pub fn with_default_operator(mut self, operator: Operator) -> Self {
        self.default_operator = operator;
        self
    }

    /// Fields searched by unqualified words.
    pub fn default_fields(&self) -> &[String] {
        &self.default_fields
    }

    /// The operator used between clauses without one.
    pub fn default_operator(&self) -> Operator {
        self.default_operator
    }

    /// Parse a query string.
    pub fn parse(&self, query_str: &str) -> Result<Query> {
        let mut parser = QueryStringParser::new(self, query_str);
        let query = parser.parse_query(None)?;
        if let Some(c) = parser.peek() {
            return Err(parser.error(format!("unexpected '{c}'")));
        }
        Ok(query.unwrap_or_else(|| Query::Boolean(BooleanQuery::new())))
    }

    /// Parse a query string with `field` as the only default field.
    pub fn parse_field(&self, field: &str, query_str: &str) -> Result<Query> {
        let parser = QueryParser {
            default_fields: vec![field.to_string()],
            ..self.clone()
        };
        parser.parse(query_str)
    }

    /// Analyze `text` for one field into a term or phrase query.
    fn field_query(&self, field: &str, text: &str) -> Result<Option<Query>> {
        let tokens: Vec<(u32, String)> = self
            .analyzer
            .analyze_field(field, text)?
            .filter(|token| token.channel == Channel::Main && !token.text.is_empty())
            .map(|token| (token.position, token.text))
            .collect();
        Ok(match tokens.as_slice() {
            [] => None,
            [(_, text)] => Some(TermQuery::new(field, text.as_str()).into()),
            [(base, _), ..] => {
                let base = *base;
                let terms = tokens
                    .into_iter()
                    .map(|(position, text)| (position.saturating_sub(base), text))
                    .collect();
                Some(PhraseQuery::with_positions(field, terms).into())
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conjunction {
    None,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    None,
    Required,
    Prohibited,
}

/// Recursive descent over the characters of one query string.
struct QueryStringParser<'a> {
    config: &'a QueryParser,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> QueryStringParser<'a> {
    fn new(config: &'a QueryParser, query_str: &str) -> Self {
        QueryStringParser {
            config,
            chars: query_str.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: String) -> GlaiveError {
        GlaiveError::query_syntax(format!("{message} at position {}", self.pos))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        self.skip_whitespace();
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{expected}' but found '{c}'"))),
            None => Err(self.error(format!("expected '{expected}' but found end of input"))),
        }
    }

    /// Consume `keyword` if it stands alone at the current position.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let len = keyword.chars().count();
        let matches = keyword
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c));
        let delimited = match self.peek_at(len) {
            None => true,
            Some(c) => c.is_whitespace() || c == '(' || c == '"',
        };
        if matches && delimited {
            self.pos += len;
            true
        } else {
            false
        }
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        let len = symbol.chars().count();
        if symbol.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c)) {
            self.pos += len;
            true
        } else {
            false
        }
    }

    fn parse_conjunction(&mut self) -> Conjunction {
        if self.eat_keyword("AND") || self.eat_symbol("&&") {
            Conjunction::And
        } else if self.eat_keyword("OR") || self.eat_symbol("||") {
            Conjunction::Or
        } else {
            Conjunction::None
        }
    }

    fn parse_modifier(&mut self) -> Modifier {
        match self.peek() {
            Some('+') => {
                self.pos += 1;
                Modifier::Required
            }
            Some('-') | Some('!') => {
                self.pos += 1;
                Modifier::Prohibited
            }
            _ if self.eat_keyword("NOT") => Modifier::Prohibited,
            _ => Modifier::None,
        }
    }

    /// Clauses up to the end of input or a closing parenthesis.
    fn parse_query(&mut self, field: Option<&str>) -> Result<Option<Query>> {
        let mut clauses: Vec<BooleanClause> = Vec::new();
        let mut seen_clause = false;
        loop {
            self.skip_whitespace();
            if matches!(self.peek(), None | Some(')')) {
                break;
            }
            let conjunction = self.parse_conjunction();
            if conjunction != Conjunction::None && !seen_clause {
                return Err(self.error("operator without a left operand".to_string()));
            }
            self.skip_whitespace();
            let modifier = self.parse_modifier();
            self.skip_whitespace();
            if matches!(self.peek(), None | Some(')')) {
                return Err(self.error("expected a term".to_string()));
            }
            let query = self.parse_clause(field)?;
            self.add_clause(&mut clauses, conjunction, modifier, query);
            seen_clause = true;
        }

        Ok(match clauses.len() {
            0 => None,
            1 if clauses[0].occur != Occur::MustNot => clauses.pop().map(|clause| clause.query),
            _ => Some(Query::Boolean(BooleanQuery {
                clauses,
                boost: 1.0,
            })),
        })
    }

    fn add_clause(
        &self,
        clauses: &mut Vec<BooleanClause>,
        conjunction: Conjunction,
        modifier: Modifier,
        query: Option<Query>,
    ) {
        let operator = self.config.default_operator;
        if let Some(last) = clauses.last_mut() {
            if last.occur != Occur::MustNot {
                if conjunction == Conjunction::And {
                    last.occur = Occur::Must;
                } else if conjunction == Conjunction::Or && operator == Operator::And {
                    last.occur = Occur::Should;
                }
            }
        }
        let Some(query) = query else {
            return;
        };

        let prohibited = modifier == Modifier::Prohibited;
        let required = match operator {
            Operator::Or => {
                modifier == Modifier::Required || (conjunction == Conjunction::And && !prohibited)
            }
            Operator::And => {
                !prohibited && (conjunction != Conjunction::Or || modifier == Modifier::Required)
            }
        };
        let occur = if prohibited {
            Occur::MustNot
        } else if required {
            Occur::Must
        } else {
            Occur::Should
        };
        clauses.push(BooleanClause::new(occur, query));
    }

    fn parse_clause(&mut self, field: Option<&str>) -> Result<Option<Query>> {
        let field = match self.parse_field_prefix()? {
            Some(name) => Some(name),
            None => field.map(str::to_string),
        };
        let field = field.as_deref();

        self.skip_whitespace();
        let query = match self.peek() {
            Some('(') => {
                self.pos += 1;
                let inner = self.parse_query(field)?;
                self.expect(')')?;
                inner
            }
            Some('"') => {
                let text = self.read_quoted()?;
                self.for_fields(field, |config, field| config.field_query(field, &text))?
            }
            Some('[') | Some('{') => self.parse_range(field)?,
            _ => {
                let (word, is_prefix) = self.read_word()?;
                if is_prefix {
                    self.prefix_query(field, &word)?
                } else if field == Some("*") {
                    return Err(self.error("'*' field requires '*' as value".to_string()));
                } else {
                    self.for_fields(field, |config, field| config.field_query(field, &word))?
                }
            }
        };

        let boost = self.parse_boost()?;
        Ok(match (query, boost) {
            (Some(query), Some(boost)) => Some(query.with_boost(boost)),
            (query, _) => query,
        })
    }

    /// Consume `name:` if the next word is followed by an unescaped colon.
    fn parse_field_prefix(&mut self) -> Result<Option<String>> {
        let start = self.pos;
        let mut name = String::new();
        while let Some(c) = self.peek() {
            match c {
                ':' => {
                    if name.is_empty() {
                        return Err(self.error("empty field name".to_string()));
                    }
                    self.pos += 1;
                    return Ok(Some(name));
                }
                '\\' => {
                    self.pos += 1;
                    match self.peek() {
                        Some(escaped) => name.push(escaped),
                        None => break,
                    }
                }
                c if is_word_char(c) => name.push(c),
                _ => break,
            }
            self.pos += 1;
        }
        self.pos = start;
        Ok(None)
    }

    /// Read a bare word; returns the unescaped text and whether it ended
    /// with an unescaped `*`.
    fn read_word(&mut self) -> Result<(String, bool)> {
        let mut word = String::new();
        let mut is_prefix = false;
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                let escaped = self
                    .peek()
                    .ok_or_else(|| self.error("dangling escape character".to_string()))?;
                word.push(escaped);
                is_prefix = false;
            } else if is_word_char(c) {
                word.push(c);
                is_prefix = c == '*';
            } else {
                break;
            }
            self.pos += 1;
        }
        if is_prefix {
            word.pop();
        } else if word.is_empty() {
            return Err(match self.peek() {
                Some(c) => self.error(format!("unexpected '{c}'")),
                None => self.error("expected a term".to_string()),
            });
        }
        Ok((word, is_prefix))
    }

    fn read_quoted(&mut self) -> Result<String> {
        self.expect('"')?;
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated phrase".to_string())),
                Some('"') => {
                    self.pos += 1;
                    return Ok(text);
                }
                Some('\\') => {
                    self.pos += 1;
                    let escaped = self
                        .peek()
                        .ok_or_else(|| self.error("dangling escape character".to_string()))?;
                    text.push(escaped);
                }
                Some(c) => text.push(c),
            }
            self.pos += 1;
        }
    }

    fn parse_boost(&mut self) -> Result<Option<f32>> {
        if self.peek() != Some('^') {
            return Ok(None);
        }
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        digits
            .parse::<f32>()
            .map(Some)
            .map_err(|_| self.error(format!("invalid boost '{digits}'")))
    }

    fn prefix_query(&self, field: Option<&str>, prefix: &str) -> Result<Option<Query>> {
        if prefix.is_empty() {
            return match field {
                None | Some("*") => Ok(Some(Query::MatchAll(MatchAllQuery::default()))),
                Some(field) => Err(self.error(format!("empty prefix for field {field}"))),
            };
        }
        let prefix = prefix.to_lowercase();
        self.for_fields(field, |_, field| {
            Ok(Some(PrefixQuery::new(field, prefix.as_str()).into()))
        })
    }

    fn parse_range(&mut self, field: Option<&str>) -> Result<Option<Query>> {
        let lower_inclusive = self.peek() == Some('[');
        self.pos += 1;
        self.skip_whitespace();
        let lower = self.read_range_endpoint()?;
        self.skip_whitespace();
        if !self.eat_keyword("TO") {
            return Err(self.error("expected 'TO' in range".to_string()));
        }
        self.skip_whitespace();
        let upper = self.read_range_endpoint()?;
        self.skip_whitespace();
        let upper_inclusive = match self.peek() {
            Some(']') => true,
            Some('}') => false,
            _ => return Err(self.error("unterminated range".to_string())),
        };
        self.pos += 1;

        let bound = |value: Option<String>, inclusive: bool| match value {
            None => Bound::Unbounded,
            Some(value) if inclusive => Bound::Included(FieldValue::Text(value)),
            Some(value) => Bound::Excluded(FieldValue::Text(value)),
        };
        let lower = bound(lower, lower_inclusive);
        let upper = bound(upper, upper_inclusive);
        self.for_fields(field, |_, field| {
            Ok(Some(RangeQuery::new(field, lower.clone(), upper.clone()).into()))
        })
    }

    /// A range endpoint; `None` for `*`.
    fn read_range_endpoint(&mut self) -> Result<Option<String>> {
        if self.peek() == Some('"') {
            return self.read_quoted().map(Some);
        }
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                let escaped = self
                    .peek()
                    .ok_or_else(|| self.error("dangling escape character".to_string()))?;
                text.push(escaped);
            } else if c.is_whitespace() || matches!(c, ']' | '}') {
                break;
            } else {
                text.push(c);
            }
            self.pos += 1;
        }
        match text.as_str() {
            "" => Err(self.error("expected a range endpoint".to_string())),
            "*" => Ok(None),
            _ => Ok(Some(text)),
        }
    }

    /// Build one query per target field and OR them together.
    fn for_fields<F>(&self, field: Option<&str>, mut build: F) -> Result<Option<Query>>
    where
        F: FnMut(&QueryParser, &str) -> Result<Option<Query>>,
    {
        let fields: Vec<&str> = match field {
            Some(field) => vec![field],
            None if self.config.default_fields.is_empty() => {
                return Err(self.error("no field given and no default field".to_string()));
            }
            None => self.config.default_fields.iter().map(String::as_str).collect(),
        };
        let mut queries = Vec::with_capacity(fields.len());
        for field in fields {
            if let Some(query) = build(self.config, field)? {
                queries.push(query);
            }
        }
        Ok(match queries.len() {
            0 => None,
            1 => queries.pop(),
            _ => {
                let mut boolean = BooleanQuery::new();
                for query in queries {
                    boolean.add(Occur::Should, query);
                }
                Some(boolean.into())
            }
        })
    }
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '"' | '^' | '[' | ']' | '{' | '}' | ':')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::query::testing;

    fn parser() -> QueryParser {
        QueryParser::new(testing::analyzer(), ["body"])
    }

    fn parse(query: &str) -> String {
        parser().parse(query).unwrap().to_string()
    }

    #[test]
    fn test_terms_are_analyzed() {
        assert_eq!(parse("quick"), "body:quick");
        assert_eq!(parse("Running"), "body:run");
        assert_eq!(parse("title:Foxes"), "title:fox");
        assert_eq!(parse("id:A\\:b"), "id:A:b");
    }

    #[test]
    fn test_default_operator() {
        assert_eq!(parse("quick fox"), "+body:quick +body:fox");
        assert_eq!(parse("quick OR fox"), "body:quick body:fox");
        assert_eq!(parse("quick AND fox"), "+body:quick +body:fox");
        let or = parser().with_default_operator(Operator::Or);
        assert_eq!(or.parse("quick fox").unwrap().to_string(), "body:quick body:fox");
        assert_eq!(or.parse("quick AND fox").unwrap().to_string(), "+body:quick +body:fox");
    }

    #[test]
    fn test_modifiers() {
        assert_eq!(parse("+quick -fox cat"), "+body:quick -body:fox +body:cat");
        assert_eq!(parse("NOT fox"), "-body:fox");
        assert_eq!(parse("quick !fox"), "+body:quick -body:fox");
    }

    #[test]
    fn test_phrases_prefixes_and_ranges() {
        assert_eq!(parse("title:\"red fox\"^2"), "title:\"red fox\"^2");
        assert_eq!(parse("Run*"), "body:run*");
        assert_eq!(parse("rank:[1 TO 5}"), "rank:[1 TO 5}");
        assert_eq!(parse("rank:{* TO 5]"), "rank:[* TO 5]");
        assert_eq!(parse("*:*"), "*:*");
        assert_eq!(parse("*"), "*:*");
    }

    #[test]
    fn test_groups() {
        assert_eq!(parse("title:(red fox)"), "+title:red +title:fox");
        assert_eq!(parse("quick (fox OR cat)^3"), "+body:quick +(body:fox body:cat)^3");
    }

    #[test]
    fn test_stop_words_and_empty() {
        assert_eq!(parse(""), "");
        assert_eq!(parse("the"), "");
        assert_eq!(parse("the quick"), "body:quick");
        let query = parser().parse("   ").unwrap();
        assert!(matches!(query, Query::Boolean(ref b) if b.is_empty()));
    }

    #[test]
    fn test_multiple_default_fields() {
        let parser = QueryParser::new(testing::analyzer(), ["t", "v"]);
        assert_eq!(parser.parse("fox").unwrap().to_string(), "t:fox v:fox");
        assert_eq!(parser.parse_field("body", "fox").unwrap().to_string(), "body:fox");
    }

    #[test]
    fn test_syntax_errors() {
        for input in [
            "(quick",
            "quick)",
            "\"quick",
            "quick AND",
            "AND quick",
            "rank:[1 5]",
            "rank:[1 TO 5",
            "quick^x",
            ":quick",
            "quick\\",
            "title:*",
        ] {
            let err = parser().parse(input).unwrap_err();
            assert!(matches!(err, GlaiveError::QuerySyntax(_)), "{input}");
        }
        let no_default = QueryParser::new(testing::analyzer(), Vec::<String>::new());
        assert!(no_default.parse("fox").is_err());
        assert!(no_default.parse("body:fox").is_ok());
    }
}
