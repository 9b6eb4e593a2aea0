//! Recursive descent parser for SCIM filter expressions.
//!
//! Grammar, with `not` binding tighter than `and`, and `and` tighter than `or`:
//!
//! ```text
//! expr       := and_expr ("or" and_expr)*
//! and_expr   := term ("and" term)*
//! term       := "not"? ("(" expr ")" | comparison)
//! comparison := attrPath comparator literal?
//! ```

use super::{ComparisonOperator, FilterExpression};
use crate::error::{ScimError, ScimResult};
use serde_json::{Number, Value};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LeftParen,
    RightParen,
    /// Bare word: attribute path, keyword or non-string literal
    Word(String),
    /// Decoded string literal
    Text(String),
}

/// Parse a filter string.
///
/// An empty or blank filter yields [`FilterExpression::MatchAll`].
pub fn parse(raw: &str) -> ScimResult<FilterExpression> {
    let tokens = tokenize(raw)?;
    if tokens.is_empty() {
        return Ok(FilterExpression::MatchAll);
    }

    let mut parser = Parser {
        raw,
        tokens,
        position: 0,
    };
    let expr = parser.parse_or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(Token::RightParen) => Err(parser.error("unbalanced parentheses")),
        Some(token) => Err(parser.error(&format!("unexpected token {}", describe(token)))),
    }
}

fn tokenize(raw: &str) -> ScimResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = raw.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LeftParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RightParen);
            }
            '"' => {
                chars.next();
                let mut escaped = false;
                let mut end = None;
                for (index, c) in chars.by_ref() {
                    match c {
                        _ if escaped => escaped = false,
                        '\\' => escaped = true,
                        '"' => {
                            end = Some(index);
                            break;
                        }
                        _ => {}
                    }
                }
                let end = end.ok_or_else(|| {
                    ScimError::invalid_filter(format!(
                        "Invalid filter '{}': unterminated string literal",
                        raw
                    ))
                })?;
                let text: String = serde_json::from_str(&raw[start..=end]).map_err(|_| {
                    ScimError::invalid_filter(format!(
                        "Invalid filter '{}': malformed string literal {}",
                        raw,
                        &raw[start..=end]
                    ))
                })?;
                tokens.push(Token::Text(text));
            }
            '[' | ']' | '\'' => {
                return Err(ScimError::invalid_filter(format!(
                    "Invalid filter '{}': unknown token '{}' at position {}",
                    raw, c, start
                )));
            }
            _ => {
                let mut end = raw.len();
                while let Some(&(index, c)) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '"' | '[' | ']') {
                        end = index;
                        break;
                    }
                    chars.next();
                }
                tokens.push(Token::Word(raw[start..end].to_string()));
            }
        }
    }
    Ok(tokens)
}

fn describe(token: &Token) -> String {
    match token {
        Token::LeftParen => "'('".to_string(),
        Token::RightParen => "')'".to_string(),
        Token::Word(word) => format!("'{}'", word),
        Token::Text(text) => format!("\"{}\"", text),
    }
}

fn is_keyword(token: Option<&Token>, keyword: &str) -> bool {
    matches!(token, Some(Token::Word(word)) if word.eq_ignore_ascii_case(keyword))
}

fn is_attribute_path(word: &str) -> bool {
    let mut chars = word.chars();
    let starts_well = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '$' || c == '_');
    starts_well
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '$' | '_' | '-' | ':' | '.'))
}

struct Parser<'a> {
    raw: &'a str,
    tokens: Vec<Token>,
    position: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn error(&self, reason: &str) -> ScimError {
        ScimError::invalid_filter(format!("Invalid filter '{}': {}", self.raw, reason))
    }

    fn parse_or(&mut self) -> ScimResult<FilterExpression> {
        let mut expr = self.parse_and()?;
        while is_keyword(self.peek(), "or") {
            self.position += 1;
            let right = self.parse_and()?;
            expr = expr.or(right);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> ScimResult<FilterExpression> {
        let mut expr = self.parse_term()?;
        while is_keyword(self.peek(), "and") {
            self.position += 1;
            let right = self.parse_term()?;
            expr = expr.and(right);
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> ScimResult<FilterExpression> {
        if is_keyword(self.peek(), "not") {
            self.position += 1;
            return Ok(self.parse_term()?.negate());
        }

        match self.next() {
            Some(Token::LeftParen) => {
                let expr = self.parse_or()?;
                match self.next() {
                    Some(Token::RightParen) => Ok(expr),
                    _ => Err(self.error("unbalanced parentheses")),
                }
            }
            Some(Token::Word(path)) => self.parse_comparison(path),
            Some(token) => Err(self.error(&format!("unexpected token {}", describe(&token)))),
            None => Err(self.error("unexpected end of filter")),
        }
    }

    fn parse_comparison(&mut self, path: String) -> ScimResult<FilterExpression> {
        if !is_attribute_path(&path) {
            return Err(self.error(&format!("'{}' is not a valid attribute path", path)));
        }

        let operator = match self.next() {
            Some(Token::Word(word)) => word
                .parse::<ComparisonOperator>()
                .map_err(|_| self.error(&format!("unknown comparison operator '{}'", word)))?,
            Some(token) => {
                return Err(self.error(&format!(
                    "expected comparison operator after '{}' but found {}",
                    path,
                    describe(&token)
                )));
            }
            None => {
                return Err(self.error(&format!(
                    "missing comparison operator after '{}'",
                    path
                )));
            }
        };

        if operator == ComparisonOperator::Pr {
            return Ok(FilterExpression::comparison(path, operator, Value::Null));
        }

        let value = match self.next() {
            Some(Token::Text(text)) => Value::String(text),
            Some(Token::Word(word)) => self.parse_literal(&word)?,
            Some(token) => {
                return Err(self.error(&format!(
                    "expected literal after '{} {}' but found {}",
                    path,
                    operator,
                    describe(&token)
                )));
            }
            None => {
                return Err(self.error(&format!(
                    "missing literal after '{} {}'",
                    path, operator
                )));
            }
        };
        Ok(FilterExpression::comparison(path, operator, value))
    }

    fn parse_literal(&self, word: &str) -> ScimResult<Value> {
        match word.to_ascii_lowercase().as_str() {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            "null" => return Ok(Value::Null),
            _ => {}
        }
        if let Ok(integer) = word.parse::<i64>() {
            return Ok(Value::Number(integer.into()));
        }
        word.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| self.error(&format!("unknown token '{}'", word)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cmp(path: &str, operator: ComparisonOperator, value: Value) -> FilterExpression {
        FilterExpression::comparison(path, operator, value)
    }

    #[test]
    fn test_simple_comparison() {
        let expr = parse(r#"userName eq "bjensen""#).unwrap();
        assert_eq!(expr, cmp("userName", ComparisonOperator::Eq, json!("bjensen")));
    }

    #[test]
    fn test_empty_filter_matches_all() {
        assert_eq!(parse("").unwrap(), FilterExpression::MatchAll);
        assert_eq!(parse("   ").unwrap(), FilterExpression::MatchAll);
    }

    #[test]
    fn test_operators_are_case_insensitive() {
        let expr = parse(r#"title PR AND userType EQ "Employee""#).unwrap();
        assert_eq!(
            expr,
            cmp("title", ComparisonOperator::Pr, Value::Null).and(cmp(
                "userType",
                ComparisonOperator::Eq,
                json!("Employee")
            ))
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = parse("a eq 1 or b eq 2 and c eq 3").unwrap();
        let expected = cmp("a", ComparisonOperator::Eq, json!(1)).or(cmp(
            "b",
            ComparisonOperator::Eq,
            json!(2),
        )
        .and(cmp("c", ComparisonOperator::Eq, json!(3))));
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let expr = parse("(a eq 1 or b eq 2) and c eq 3").unwrap();
        let expected = cmp("a", ComparisonOperator::Eq, json!(1))
            .or(cmp("b", ComparisonOperator::Eq, json!(2)))
            .and(cmp("c", ComparisonOperator::Eq, json!(3)));
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_left_associative() {
        let expr = parse("a pr or b pr or c pr").unwrap();
        let expected = cmp("a", ComparisonOperator::Pr, Value::Null)
            .or(cmp("b", ComparisonOperator::Pr, Value::Null))
            .or(cmp("c", ComparisonOperator::Pr, Value::Null));
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_not_binds_tightest() {
        let expr = parse("not a eq 1 and b eq 2").unwrap();
        let expected = cmp("a", ComparisonOperator::Eq, json!(1))
            .negate()
            .and(cmp("b", ComparisonOperator::Eq, json!(2)));
        assert_eq!(expr, expected);

        let expr = parse("NOT (a eq 1 or b eq 2)").unwrap();
        assert!(matches!(expr, FilterExpression::Not(_)));
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            parse("n gt 1.5").unwrap(),
            cmp("n", ComparisonOperator::Gt, json!(1.5))
        );
        assert_eq!(
            parse("n le -3").unwrap(),
            cmp("n", ComparisonOperator::Le, json!(-3))
        );
        assert_eq!(
            parse("b eq False").unwrap(),
            cmp("b", ComparisonOperator::Eq, json!(false))
        );
        assert_eq!(
            parse("b ne null").unwrap(),
            cmp("b", ComparisonOperator::Ne, Value::Null)
        );
        assert_eq!(
            parse(r#"s eq "a \"quoted\" é (x)""#).unwrap(),
            cmp("s", ComparisonOperator::Eq, json!("a \"quoted\" é (x)"))
        );
    }

    #[test]
    fn test_qualified_attribute_paths() {
        let expr = parse(
            r#"urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:manager.value eq "1""#,
        )
        .unwrap();
        assert_eq!(
            expr.attribute_paths(),
            vec!["urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:manager.value"]
        );
        assert!(parse(r#"$ref sw "https://""#).is_ok());
    }

    #[test]
    fn test_unbalanced_parentheses() {
        for raw in ["(a eq 1", "a eq 1)", "((a eq 1) or b eq 2", "()"] {
            let error = parse(raw).unwrap_err();
            assert!(
                matches!(error, ScimError::InvalidFilter { .. }),
                "{} should fail",
                raw
            );
        }
    }

    #[test]
    fn test_unknown_tokens() {
        for raw in [
            "a xx 1",
            "a eq",
            "a eq nonsense",
            "a eq 1 and",
            "a eq 1 b eq 2",
            r#"a eq "unterminated"#,
            "a[b eq 1]",
            "\"a\" eq 1",
            "a eq 'single'",
        ] {
            assert!(
                matches!(parse(raw), Err(ScimError::InvalidFilter { .. })),
                "{} should fail",
                raw
            );
        }
    }
}
