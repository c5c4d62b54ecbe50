//! Recursive-descent filter parser.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or_expr    := and_expr ( 'or' and_expr )*
//! and_expr   := unary_expr ( 'and' unary_expr )*
//! unary_expr := 'not' unary_expr | comparison
//! comparison := primary ( ('eq'|'ne'|'gt'|'ge'|'lt'|'le') primary )?
//! primary    := '(' or_expr ')'
//!             | function '(' or_expr ( ',' or_expr )* ')'
//!             | 'geography' STRING
//!             | 'true' | 'false' | 'null'
//!             | STRING | NUMBER | DATETIME
//!             | property_path
//! ```
//!
//! `not` binds tighter than `and`, which binds tighter than `or`, so
//! `a or b and c` groups as `a or (b and c)` and
//! `not a and b` groups as `(not a) and b`.

use crate::ast::{CompareOp, Expr, Literal, PropertyPath};
use crate::error::{FilterError, Result};
use crate::functions::lookup_function;
use crate::token::{tokenize, SpannedToken, Token};
use obsdb_core::{GeometryValue, Timestamp};

/// Parse a filter string into an AST.
pub fn parse_filter(input: &str) -> Result<Expr> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(FilterError::syntax(0, "empty filter expression"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        input_len: input.len(),
    };
    let expr = parser.or_expr()?;
    if let Some(t) = parser.peek() {
        return Err(FilterError::syntax(
            t.position,
            format!("unexpected trailing input: {:?}", t.token),
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    input_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<SpannedToken> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn position(&self) -> usize {
        self.peek().map(|t| t.position).unwrap_or(self.input_len)
    }

    /// Consume an identifier keyword if it matches.
    fn eat_keyword(&mut self, kw: &str) -> bool {
        if let Some(SpannedToken {
            token: Token::Ident(name),
            ..
        }) = self.peek()
        {
            if name == kw {
                self.pos += 1;
                return true;
            }
        }
        false
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<()> {
        match self.advance() {
            Some(t) if t.token == *expected => Ok(()),
            Some(t) => Err(FilterError::syntax(
                t.position,
                format!("expected {}, got {:?}", what, t.token),
            )),
            None => Err(FilterError::syntax(
                self.input_len,
                format!("expected {}, got end of input", what),
            )),
        }
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.and_expr()?;
        while self.eat_keyword("or") {
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.unary_expr()?;
        while self.eat_keyword("and") {
            let rhs = self.unary_expr()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> Result<Expr> {
        if self.eat_keyword("not") {
            let inner = self.unary_expr()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr> {
        let lhs = self.primary()?;

        let op = match self.peek() {
            Some(SpannedToken {
                token: Token::Ident(name),
                ..
            }) => CompareOp::from_keyword(name),
            _ => None,
        };

        if let Some(op) = op {
            self.pos += 1;
            let rhs = self.primary()?;
            return Ok(Expr::Compare {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }

        Ok(lhs)
    }

    fn primary(&mut self) -> Result<Expr> {
        let Some(t) = self.advance() else {
            return Err(FilterError::syntax(
                self.input_len,
                "expected expression, got end of input",
            ));
        };

        match t.token {
            Token::LParen => {
                let inner = self.or_expr()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::Str(s) => Ok(Expr::Literal(Literal::Text(s))),
            Token::Number(n) => Ok(Expr::Literal(Literal::Number(n))),
            Token::DateTime(text) => {
                let ts = Timestamp::parse(&text)
                    .map_err(|e| FilterError::syntax(t.position, e.to_string()))?;
                Ok(Expr::Literal(Literal::DateTime(ts)))
            }
            Token::Ident(name) => self.ident_expr(name, t.position),
            other => Err(FilterError::syntax(
                t.position,
                format!("unexpected token {:?}", other),
            )),
        }
    }

    /// An identifier begins a literal keyword, a geometry literal, a
    /// function call, or a property path.
    fn ident_expr(&mut self, name: String, position: usize) -> Result<Expr> {
        match name.as_str() {
            "true" => return Ok(Expr::Literal(Literal::Bool(true))),
            "false" => return Ok(Expr::Literal(Literal::Bool(false))),
            "null" => return Ok(Expr::Literal(Literal::Null)),
            "geography" | "geometry" => {
                // geography'POINT(8 51)'
                if let Some(SpannedToken {
                    token: Token::Str(wkt),
                    position: str_pos,
                }) = self.peek().cloned()
                {
                    self.pos += 1;
                    let geom = GeometryValue::parse(&wkt)
                        .map_err(|e| FilterError::syntax(str_pos, e.to_string()))?;
                    return Ok(Expr::Literal(Literal::Geometry(geom)));
                }
                return Err(FilterError::syntax(
                    position,
                    format!("{} literal requires a quoted WKT string", name),
                ));
            }
            _ => {}
        }

        // Function call: identifier directly followed by '('.
        if matches!(
            self.peek(),
            Some(SpannedToken {
                token: Token::LParen,
                ..
            })
        ) {
            let Some(spec) = lookup_function(&name) else {
                return Err(FilterError::unsupported(name));
            };
            self.pos += 1; // consume '('
            let mut args = Vec::new();
            if !matches!(
                self.peek(),
                Some(SpannedToken {
                    token: Token::RParen,
                    ..
                })
            ) {
                loop {
                    args.push(self.or_expr()?);
                    if !matches!(
                        self.peek(),
                        Some(SpannedToken {
                            token: Token::Comma,
                            ..
                        })
                    ) {
                        break;
                    }
                    self.pos += 1; // consume ','
                }
            }
            self.expect(&Token::RParen, "')'")?;

            if args.len() < spec.min_args || args.len() > spec.max_args {
                let expected = if spec.min_args == spec.max_args {
                    spec.min_args.to_string()
                } else {
                    format!("{}..{}", spec.min_args, spec.max_args)
                };
                return Err(FilterError::Arity {
                    name: spec.name,
                    expected,
                    got: args.len(),
                });
            }

            return Ok(Expr::Function {
                func: spec.func,
                args,
            });
        }

        // Property path: name ('/' name)*
        let mut segments = vec![name];
        while matches!(
            self.peek(),
            Some(SpannedToken {
                token: Token::Slash,
                ..
            })
        ) {
            self.pos += 1; // consume '/'
            match self.advance() {
                Some(SpannedToken {
                    token: Token::Ident(seg),
                    ..
                }) => segments.push(seg),
                Some(t) => {
                    return Err(FilterError::syntax(
                        t.position,
                        "expected property name after '/'",
                    ))
                }
                None => {
                    return Err(FilterError::syntax(
                        self.input_len,
                        "expected property name after '/'",
                    ))
                }
            }
        }

        Ok(Expr::Property(PropertyPath::new(segments)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::FilterFunction;

    #[test]
    fn test_parse_simple_comparison() {
        let expr = parse_filter("result gt 20").unwrap();
        match expr {
            Expr::Compare { op, lhs, rhs } => {
                assert_eq!(op, CompareOp::Gt);
                assert_eq!(*lhs, Expr::Property(PropertyPath::new(vec!["result".into()])));
                assert_eq!(*rhs, Expr::Literal(Literal::Number(20.0)));
            }
            other => panic!("unexpected AST: {:?}", other),
        }
    }

    #[test]
    fn test_precedence_or_and() {
        // a or b and c must group as a or (b and c)
        let expr = parse_filter("name eq 'a' or name eq 'b' and result gt 1").unwrap();
        match expr {
            Expr::Or(lhs, rhs) => {
                assert!(matches!(*lhs, Expr::Compare { .. }));
                assert!(matches!(*rhs, Expr::And(_, _)));
            }
            other => panic!("expected Or at root, got {:?}", other),
        }
    }

    #[test]
    fn test_parens_override_precedence() {
        let expr = parse_filter("(name eq 'a' or name eq 'b') and result gt 1").unwrap();
        match expr {
            Expr::And(lhs, _) => assert!(matches!(*lhs, Expr::Or(_, _))),
            other => panic!("expected And at root, got {:?}", other),
        }
    }

    #[test]
    fn test_not_binds_tighter_than_and() {
        let expr = parse_filter("not result gt 5 and name eq 'x'").unwrap();
        match expr {
            Expr::And(lhs, _) => assert!(matches!(*lhs, Expr::Not(_))),
            other => panic!("expected And at root, got {:?}", other),
        }
    }

    #[test]
    fn test_function_call() {
        let expr = parse_filter("contains(name,'Weather')").unwrap();
        match expr {
            Expr::Function { func, args } => {
                assert_eq!(func, FilterFunction::Contains);
                assert_eq!(args.len(), 2);
            }
            other => panic!("unexpected AST: {:?}", other),
        }
    }

    #[test]
    fn test_nested_function() {
        let expr = parse_filter("contains(tolower(name),'weather')").unwrap();
        match expr {
            Expr::Function { args, .. } => {
                assert!(matches!(args[0], Expr::Function { .. }));
            }
            other => panic!("unexpected AST: {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_function_is_distinct_error() {
        let err = parse_filter("fractionalseconds(resultTime) eq 0").unwrap_err();
        assert!(err.is_unsupported_function());
        assert!(matches!(err, FilterError::UnsupportedFunction { ref name } if name == "fractionalseconds"));
    }

    #[test]
    fn test_malformed_is_syntax_error() {
        let err = parse_filter("name eq").unwrap_err();
        assert!(matches!(err, FilterError::Syntax { .. }));
        let err = parse_filter("(name eq 'a'").unwrap_err();
        assert!(matches!(err, FilterError::Syntax { .. }));
    }

    #[test]
    fn test_arity_error() {
        let err = parse_filter("contains(name)").unwrap_err();
        assert!(matches!(err, FilterError::Arity { .. }));
    }

    #[test]
    fn test_geometry_literal() {
        let expr = parse_filter("geo.within(location, geography'POLYGON((0 0,1 0,1 1,0 1,0 0))')")
            .unwrap();
        match expr {
            Expr::Function { func, args } => {
                assert_eq!(func, FilterFunction::GeoWithin);
                assert!(matches!(args[1], Expr::Literal(Literal::Geometry(_))));
            }
            other => panic!("unexpected AST: {:?}", other),
        }
    }

    #[test]
    fn test_datetime_literal() {
        let expr = parse_filter("phenomenonTime ge 2024-01-15T10:30:00Z").unwrap();
        match expr {
            Expr::Compare { rhs, .. } => {
                assert!(matches!(*rhs, Expr::Literal(Literal::DateTime(_))));
            }
            other => panic!("unexpected AST: {:?}", other),
        }
    }

    #[test]
    fn test_navigation_property_path() {
        let expr = parse_filter("Datastream/Thing/name eq 'rover'").unwrap();
        match expr {
            Expr::Compare { lhs, .. } => match *lhs {
                Expr::Property(ref p) => {
                    assert_eq!(p.segments, vec!["Datastream", "Thing", "name"]);
                }
                ref other => panic!("unexpected lhs: {:?}", other),
            },
            other => panic!("unexpected AST: {:?}", other),
        }
    }

    #[test]
    fn test_parsing_is_deterministic() {
        let a = parse_filter("contains(name,'Weather') and result gt 20").unwrap();
        let b = parse_filter("contains(name,'Weather') and result gt 20").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_trailing_input_rejected() {
        assert!(parse_filter("result gt 20 banana").is_err());
    }
}
