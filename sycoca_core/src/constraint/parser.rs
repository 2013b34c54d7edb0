/*!
# Sycoca: Constraint Parser
*/

use crate::SycocaError;
use super::lexer::Token;



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Comparison Operator.
pub(super) enum CmpOp {
	/// # `==`.
	Eq,

	/// # `!=`.
	Ne,

	/// # `<`.
	Lt,

	/// # `<=`.
	Le,

	/// # `>`.
	Gt,

	/// # `>=`.
	Ge,
}

#[derive(Debug, Clone, PartialEq)]
/// # Expression Tree.
pub(super) enum Expr {
	/// # Property Reference.
	Ident(String),

	/// # String Literal.
	Str(String),

	/// # Integer Literal.
	Int(i64),

	/// # Float Literal.
	Double(f64),

	/// # Boolean Literal.
	Bool(bool),

	/// # Logical Negation.
	Not(Box<Expr>),

	/// # Short-Circuit And.
	And(Box<Expr>, Box<Expr>),

	/// # Short-Circuit Or.
	Or(Box<Expr>, Box<Expr>),

	/// # Scalar Comparison.
	Cmp(Box<Expr>, CmpOp, Box<Expr>),

	/// # Case-Insensitive String Equality (`=~`).
	MatchNocase(Box<Expr>, Box<Expr>),

	/// # Containment (`a ~ b`: b contains a); Bool Is Case-Insensitivity.
	Contains(Box<Expr>, Box<Expr>, bool),

	/// # Subsequence; Bool Is Case-Insensitivity.
	Subseq(Box<Expr>, Box<Expr>, bool),

	/// # List Membership.
	In(Box<Expr>, Box<Expr>),

	/// # Property Presence.
	Exist(String),
}

#[derive(Debug, Clone, PartialEq)]
/// # A Parsed Constraint.
pub(crate) enum Constraint {
	/// # Boolean Filter.
	Filter(Expr),

	/// # Rank By Maximum of a Numeric Expression.
	Max(Expr),

	/// # Rank By Minimum of a Numeric Expression.
	Min(Expr),
}

impl Constraint {
	/// # Parse an Expression.
	///
	/// ## Errors
	///
	/// Any lexical or grammatical problem yields [`SycocaError::Parse`];
	/// trader queries translate that into an empty offer list.
	pub(crate) fn parse(raw: &str) -> Result<Self, SycocaError> {
		let tokens = super::lexer::lex(raw)?;
		let mut p = Parser { tokens, pos: 0 };

		// A leading max/min turns the rest into a ranking expression.
		let out = match p.peek() {
			Some(Token::Max) => { p.pos += 1; Self::Max(p.or_expr()?) },
			Some(Token::Min) => { p.pos += 1; Self::Min(p.or_expr()?) },
			_ => Self::Filter(p.or_expr()?),
		};

		// Trailing junk is as fatal as leading junk.
		if p.pos == p.tokens.len() { Ok(out) }
		else { Err(SycocaError::Parse("trailing tokens")) }
	}
}



/// # Recursive-Descent Parser.
///
/// Precedence, loosest first: `or`, `and`, `not`, comparisons.
struct Parser {
	/// # Token Stream.
	tokens: Vec<Token>,

	/// # Cursor.
	pos: usize,
}

impl Parser {
	/// # Peek the Next Token.
	fn peek(&self) -> Option<&Token> { self.tokens.get(self.pos) }

	/// # Take the Next Token.
	fn next(&mut self) -> Option<Token> {
		let out = self.tokens.get(self.pos).cloned();
		if out.is_some() { self.pos += 1; }
		out
	}

	/// # `or`-Level Expression.
	fn or_expr(&mut self) -> Result<Expr, SycocaError> {
		let mut out = self.and_expr()?;
		while self.peek() == Some(&Token::Or) {
			self.pos += 1;
			out = Expr::Or(Box::new(out), Box::new(self.and_expr()?));
		}
		Ok(out)
	}

	/// # `and`-Level Expression.
	fn and_expr(&mut self) -> Result<Expr, SycocaError> {
		let mut out = self.not_expr()?;
		while self.peek() == Some(&Token::And) {
			self.pos += 1;
			out = Expr::And(Box::new(out), Box::new(self.not_expr()?));
		}
		Ok(out)
	}

	/// # `not`-Level Expression.
	fn not_expr(&mut self) -> Result<Expr, SycocaError> {
		if self.peek() == Some(&Token::Not) {
			self.pos += 1;
			Ok(Expr::Not(Box::new(self.not_expr()?)))
		}
		else { self.cmp_expr() }
	}

	/// # Comparison-Level Expression.
	///
	/// At most one comparison per level; chains like `a < b < c` do not
	/// parse, matching the original grammar.
	fn cmp_expr(&mut self) -> Result<Expr, SycocaError> {
		let left = self.primary()?;
		let op = match self.peek() {
			Some(Token::Eq) => CmpOp::Eq,
			Some(Token::Ne) => CmpOp::Ne,
			Some(Token::Lt) => CmpOp::Lt,
			Some(Token::Le) => CmpOp::Le,
			Some(Token::Gt) => CmpOp::Gt,
			Some(Token::Ge) => CmpOp::Ge,
			Some(Token::MatchNocase) => {
				self.pos += 1;
				let right = self.primary()?;
				return Ok(Expr::MatchNocase(Box::new(left), Box::new(right)));
			},
			Some(Token::Contains | Token::ContainsNocase) => {
				let nocase = self.peek() == Some(&Token::ContainsNocase);
				self.pos += 1;
				let right = self.primary()?;
				return Ok(Expr::Contains(Box::new(left), Box::new(right), nocase));
			},
			Some(Token::Subseq | Token::SubseqNocase) => {
				let nocase = self.peek() == Some(&Token::SubseqNocase);
				self.pos += 1;
				let right = self.primary()?;
				return Ok(Expr::Subseq(Box::new(left), Box::new(right), nocase));
			},
			Some(Token::In) => {
				self.pos += 1;
				let right = self.primary()?;
				return Ok(Expr::In(Box::new(left), Box::new(right)));
			},
			_ => return Ok(left),
		};
		self.pos += 1;
		let right = self.primary()?;
		Ok(Expr::Cmp(Box::new(left), op, Box::new(right)))
	}

	/// # Primary Expression.
	fn primary(&mut self) -> Result<Expr, SycocaError> {
		match self.next() {
			Some(Token::Ident(s)) => Ok(Expr::Ident(s)),
			Some(Token::Str(s)) => Ok(Expr::Str(s)),
			Some(Token::Int(n)) => Ok(Expr::Int(n)),
			Some(Token::Double(n)) => Ok(Expr::Double(n)),
			Some(Token::Bool(b)) => Ok(Expr::Bool(b)),
			Some(Token::Exist) => match self.next() {
				Some(Token::Ident(s)) => Ok(Expr::Exist(s)),
				_ => Err(SycocaError::Parse("exist needs a property name")),
			},
			Some(Token::LParen) => {
				let out = self.or_expr()?;
				if self.next() == Some(Token::RParen) { Ok(out) }
				else { Err(SycocaError::Parse("missing )")) }
			},
			_ => Err(SycocaError::Parse("unexpected token")),
		}
	}
}
