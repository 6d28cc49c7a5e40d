//! Arithmetic over numeric literals: `+ - * /`, unary sign and parentheses.
//!
//! Grammar:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('+' | '-') unary | primary
//! primary := NUMBER | '(' expr ')'
//! ```

use super::FormulaError;

/// Parentheses plus unary signs allowed around any one operand
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, FormulaError> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
                continue;
            }
            b'+' => tokens.push(Token::Plus),
            b'-' => tokens.push(Token::Minus),
            b'*' => tokens.push(Token::Star),
            b'/' => tokens.push(Token::Slash),
            b'(' => tokens.push(Token::LParen),
            b')' => tokens.push(Token::RParen),
            b'0'..=b'9' | b'.' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                let text = &input[start..i];
                let value = text
                    .parse::<f64>()
                    .map_err(|_| FormulaError::BadNumber(text.to_string()))?;
                tokens.push(Token::Number(value));
                continue;
            }
            other => return Err(FormulaError::UnexpectedChar(other as char)),
        }
        i += 1;
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Run `inner` one nesting level down
    fn nested(
        &mut self,
        inner: impl FnOnce(&mut Self) -> Result<f64, FormulaError>,
    ) -> Result<f64, FormulaError> {
        if self.depth == MAX_DEPTH {
            return Err(FormulaError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let value = inner(self);
        self.depth -= 1;
        value
    }

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expr(&mut self) -> Result<f64, FormulaError> {
        let mut value = self.term()?;
        while let Some(tok @ (Token::Plus | Token::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            if tok == Token::Plus {
                value += rhs;
            } else {
                value -= rhs;
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, FormulaError> {
        let mut value = self.unary()?;
        while let Some(tok @ (Token::Star | Token::Slash)) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            if tok == Token::Star {
                value *= rhs;
            } else {
                value /= rhs;
            }
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, FormulaError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.nested(Self::unary)?)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.nested(Self::unary)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<f64, FormulaError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.nested(Self::expr)?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(FormulaError::UnbalancedParens),
                }
            }
            Some(_) => Err(FormulaError::UnexpectedToken(self.pos)),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }
}

/// Evaluate an arithmetic expression. Division follows IEEE rules, so the
/// result may be infinite or NaN; callers decide how to treat that.
pub fn evaluate(input: &str) -> Result<f64, FormulaError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(FormulaError::UnexpectedEnd);
    }
    let mut parser = Parser::new(tokens);
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(FormulaError::UnexpectedToken(parser.pos));
    }
    Ok(value)
}
