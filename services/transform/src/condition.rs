//! Safe replacements for the two spots the original transformer reached for
//! Python's `eval()`: rule conditions (`DataFiltering`, rule gating) and the
//! `calculate_field` enrichment formula. Both are restricted, hand-parsed
//! mini-languages over the record's own fields rather than arbitrary code.

use serde_json::Value;

use crate::path::get_nested_value;

/// Evaluates a condition of the form `<dotted.path> <op> <literal>` or
/// `exists(<dotted.path>)` / `!exists(<dotted.path>)` against `data`.
/// Unparseable or type-mismatched conditions evaluate to `false`, matching
/// the original's catch-all `except: return False`.
pub fn evaluate_condition(data: &Value, condition: &str) -> bool {
    let condition = condition.trim();

    if let Some(path) = condition.strip_prefix("exists(").and_then(|s| s.strip_suffix(')')) {
        return get_nested_value(data, path.trim()).is_some_and(|v| !v.is_null());
    }
    if let Some(path) = condition.strip_prefix("!exists(").and_then(|s| s.strip_suffix(')')) {
        return !get_nested_value(data, path.trim()).is_some_and(|v| !v.is_null());
    }

    const OPS: &[&str] = &["==", "!=", ">=", "<=", ">", "<"];
    for op in OPS {
        if let Some(idx) = condition.find(op) {
            let path = condition[..idx].trim();
            let literal = condition[idx + op.len()..].trim();
            let Some(actual) = get_nested_value(data, path) else { return false };
            return compare(&actual, op, literal);
        }
    }
    false
}

fn compare(actual: &Value, op: &str, literal: &str) -> bool {
    let expected = parse_literal(literal);
    match op {
        "==" => values_eq(actual, &expected),
        "!=" => !values_eq(actual, &expected),
        _ => {
            let (Some(a), Some(b)) = (as_f64(actual), as_f64(&expected)) else { return false };
            match op {
                ">" => a > b,
                ">=" => a >= b,
                "<" => a < b,
                "<=" => a <= b,
                _ => false,
            }
        }
    }
}

fn values_eq(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return (x - y).abs() < f64::EPSILON;
    }
    a == b
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn parse_literal(literal: &str) -> Value {
    if literal == "true" {
        return Value::Bool(true);
    }
    if literal == "false" {
        return Value::Bool(false);
    }
    if literal == "null" {
        return Value::Null;
    }
    if let Ok(n) = literal.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = literal.parse::<f64>() {
        return Value::from(f);
    }
    let unquoted = literal.trim_matches('"').trim_matches('\'');
    Value::String(unquoted.to_string())
}

/// Evaluates a restricted arithmetic formula (`+ - * / ( )`, numeric
/// literals, dotted field identifiers) against `data`'s fields, for the
/// `calculate_field` enrichment.
pub fn evaluate_formula(data: &Value, formula: &str) -> Option<f64> {
    let tokens = tokenize(formula)?;
    let mut parser = FormulaParser { tokens, pos: 0, data };
    let value = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return None;
    }
    Some(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(formula: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = formula.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let num: String = chars[start..i].iter().collect();
                tokens.push(Token::Number(num.parse().ok()?));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            _ => return None,
        }
    }
    Some(tokens)
}

struct FormulaParser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    data: &'a Value,
}

impl<'a> FormulaParser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn parse_expr(&mut self) -> Option<f64> {
        let mut value = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value += self.parse_term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value -= self.parse_term()?;
                }
                _ => break,
            }
        }
        Some(value)
    }

    fn parse_term(&mut self) -> Option<f64> {
        let mut value = self.parse_factor()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    value *= self.parse_factor()?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let divisor = self.parse_factor()?;
                    if divisor == 0.0 {
                        return None;
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Some(value)
    }

    fn parse_factor(&mut self) -> Option<f64> {
        match self.tokens.get(self.pos)?.clone() {
            Token::Number(n) => {
                self.pos += 1;
                Some(n)
            }
            Token::Ident(name) => {
                self.pos += 1;
                let value = get_nested_value(self.data, &name)?;
                as_f64(&value)
            }
            Token::Minus => {
                self.pos += 1;
                self.parse_factor().map(|v| -v)
            }
            Token::LParen => {
                self.pos += 1;
                let value = self.parse_expr()?;
                if self.peek() == Some(&Token::RParen) {
                    self.pos += 1;
                    Some(value)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_comparison_condition() {
        let data = json!({"amount": 150});
        assert!(evaluate_condition(&data, "amount > 100"));
        assert!(!evaluate_condition(&data, "amount < 100"));
    }

    #[test]
    fn string_equality_condition() {
        let data = json!({"status": "active"});
        assert!(evaluate_condition(&data, "status == \"active\""));
        assert!(evaluate_condition(&data, "status != \"inactive\""));
    }

    #[test]
    fn exists_condition() {
        let data = json!({"email": "a@b.com"});
        assert!(evaluate_condition(&data, "exists(email)"));
        assert!(evaluate_condition(&data, "!exists(phone)"));
    }

    #[test]
    fn formula_evaluates_field_arithmetic() {
        let data = json!({"price": 10.0, "quantity": 3.0, "tax": 1.5});
        assert_eq!(evaluate_formula(&data, "price * quantity + tax"), Some(31.5));
    }

    #[test]
    fn formula_rejects_division_by_zero() {
        let data = json!({"a": 1.0, "b": 0.0});
        assert_eq!(evaluate_formula(&data, "a / b"), None);
    }
}
