/*!
# Sycoca: Constraint Evaluation
*/

use crate::PropertyValue;
use super::parser::{
	CmpOp,
	Expr,
};



/// # Property Source.
///
/// The evaluation context: a service plus whatever property schema the
/// queried service-type chain declares. Keeping this a trait lets the
/// engine be tested without a database.
pub(crate) trait PropertySource {
	/// # Typed Property Lookup.
	///
	/// The implementation applies declared-type coercion before the
	/// value gets here; absent properties are `None`, and a present
	/// property that cannot be read as its declared type is also
	/// `None` (comparisons against it are simply false).
	fn property(&self, name: &str) -> Option<PropertyValue>;

	/// # Is the Property Present At All?
	fn exists(&self, name: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
/// # Evaluation Value.
pub(super) enum Value {
	/// # Unreadable/Absent; Poisons Comparisons to False.
	Invalid,

	/// # Boolean.
	Bool(bool),

	/// # Integer.
	Int(i64),

	/// # Float.
	Double(f64),

	/// # String.
	Str(String),

	/// # String List.
	List(Vec<String>),
}

impl Value {
	/// # Truthiness.
	///
	/// Only booleans are truthy or falsy; everything else (including
	/// `Invalid`) reads as false inside logic operators.
	const fn as_bool(&self) -> bool {
		matches!(self, Self::Bool(true))
	}

	/// # Numeric Reading.
	fn as_f64(&self) -> Option<f64> {
		match self {
			Self::Int(n) => Some(*n as f64),
			Self::Double(n) => Some(*n),
			_ => None,
		}
	}

	/// # Is This Numeric?
	const fn is_numeric(&self) -> bool {
		matches!(self, Self::Int(_) | Self::Double(_))
	}

	/// # String Reading.
	fn as_str(&self) -> Option<&str> {
		if let Self::Str(s) = self { Some(s) } else { None }
	}
}

impl From<PropertyValue> for Value {
	fn from(src: PropertyValue) -> Self {
		match src {
			PropertyValue::Bool(v) => Self::Bool(v),
			PropertyValue::Double(v) => Self::Double(v),
			PropertyValue::Int(v) => Self::Int(v),
			PropertyValue::String(v) => Self::Str(v),
			PropertyValue::StringList(v) => Self::List(v),
		}
	}
}



/// # Evaluate a Filter Expression.
///
/// The only way in is a boolean: anything else at the top level means
/// the candidate does not match.
pub(super) fn matches(expr: &Expr, ctx: &dyn PropertySource) -> bool {
	eval(expr, ctx).as_bool()
}

/// # Evaluate a Ranking Expression.
pub(super) fn rank(expr: &Expr, ctx: &dyn PropertySource) -> Option<f64> {
	eval(expr, ctx).as_f64()
}

/// # Evaluate an Expression.
fn eval(expr: &Expr, ctx: &dyn PropertySource) -> Value {
	match expr {
		Expr::Ident(name) => ctx.property(name).map_or(Value::Invalid, Value::from),
		Expr::Str(s) => Value::Str(s.clone()),
		Expr::Int(n) => Value::Int(*n),
		Expr::Double(n) => Value::Double(*n),
		Expr::Bool(b) => Value::Bool(*b),

		Expr::Not(inner) => Value::Bool(! eval(inner, ctx).as_bool()),
		Expr::And(a, b) =>
			// Short-circuit: the right side never evaluates when the
			// left already failed.
			if eval(a, ctx).as_bool() { Value::Bool(eval(b, ctx).as_bool()) }
			else { Value::Bool(false) },
		Expr::Or(a, b) =>
			if eval(a, ctx).as_bool() { Value::Bool(true) }
			else { Value::Bool(eval(b, ctx).as_bool()) },

		Expr::Cmp(a, op, b) => Value::Bool(compare(&eval(a, ctx), *op, &eval(b, ctx))),

		Expr::MatchNocase(a, b) => Value::Bool(
			match (eval(a, ctx).as_str(), eval(b, ctx).as_str()) {
				(Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
				_ => false,
			}
		),

		Expr::Contains(a, b, nocase) => Value::Bool(contains(
			&eval(a, ctx),
			&eval(b, ctx),
			*nocase,
		)),

		Expr::Subseq(a, b, nocase) => Value::Bool(
			match (eval(a, ctx).as_str(), eval(b, ctx).as_str()) {
				(Some(a), Some(b)) =>
					if *nocase {
						is_subseq(&a.to_lowercase(), &b.to_lowercase())
					}
					else { is_subseq(a, b) },
				_ => false,
			}
		),

		Expr::In(a, b) => Value::Bool(
			match (eval(a, ctx).as_str(), eval(b, ctx)) {
				(Some(needle), Value::List(list)) => list.iter().any(|v| v == needle),
				_ => false,
			}
		),

		Expr::Exist(name) => Value::Bool(ctx.exists(name)),
	}
}

/// # Scalar Comparison.
///
/// When either side is numeric both are coerced to a common float and
/// compared numerically; a non-numeric other side (say, a string
/// property with no numeric declaration) makes the whole comparison
/// false. Otherwise strings compare lexically and booleans support
/// (in)equality.
fn compare(a: &Value, op: CmpOp, b: &Value) -> bool {
	if a.is_numeric() || b.is_numeric() {
		let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) else { return false; };
		return match op {
			CmpOp::Eq => (a - b).abs() < f64::EPSILON,
			CmpOp::Ne => f64::EPSILON <= (a - b).abs(),
			CmpOp::Lt => a < b,
			CmpOp::Le => a <= b,
			CmpOp::Gt => a > b,
			CmpOp::Ge => a >= b,
		};
	}

	match (a, b) {
		(Value::Str(a), Value::Str(b)) => match op {
			CmpOp::Eq => a == b,
			CmpOp::Ne => a != b,
			CmpOp::Lt => a < b,
			CmpOp::Le => a <= b,
			CmpOp::Gt => a > b,
			CmpOp::Ge => a >= b,
		},
		(Value::Bool(a), Value::Bool(b)) => match op {
			CmpOp::Eq => a == b,
			CmpOp::Ne => a != b,
			_ => false,
		},
		_ => false,
	}
}

/// # Containment (`a ~ b`).
///
/// Mind the direction: true when `b` contains `a`. A list on the right
/// means membership instead of substring.
fn contains(a: &Value, b: &Value, nocase: bool) -> bool {
	let Some(needle) = a.as_str() else { return false; };
	match b {
		Value::Str(hay) =>
			if nocase { hay.to_lowercase().contains(&needle.to_lowercase()) }
			else { hay.contains(needle) },
		Value::List(list) =>
			if nocase { list.iter().any(|v| v.eq_ignore_ascii_case(needle)) }
			else { list.iter().any(|v| v == needle) },
		_ => false,
	}
}

/// # Subsequence Test.
///
/// True when every character of `a` appears in `b` in order, gaps
/// allowed. Empty operands never match.
pub(crate) fn is_subseq(a: &str, b: &str) -> bool {
	if a.is_empty() || b.is_empty() { return false; }
	let mut want = a.chars();
	let mut next = want.next();
	for c in b.chars() {
		match next {
			Some(w) if w == c => { next = want.next(); },
			Some(_) => {},
			None => break,
		}
	}
	next.is_none()
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_subseq() {
		// The fixed vectors.
		assert!(! is_subseq("", ""), "both empty");
		assert!(! is_subseq("", "something"), "empty pattern");
		assert!(! is_subseq("something", ""), "empty text");
		assert!(is_subseq("lngfile", "somereallylongfile"), "match ending");
		assert!(is_subseq("somelong", "somereallylongfile"), "match beginning");
		assert!(is_subseq("reallylong", "somereallylongfile"), "match middle");
		assert!(is_subseq("across", "a 23 c @#! r o01 o 5 s_s"), "match across");
		assert!(! is_subseq("nocigar", "soclosebutnociga"), "close but no match");
		assert!(! is_subseq("god", "dog"), "incorrect letter order");
		assert!(! is_subseq("mismatch", "mIsMaTcH"), "case sensitive mismatch");

		// And the case-insensitive complements.
		let ci = |a: &str, b: &str| is_subseq(&a.to_lowercase(), &b.to_lowercase());
		assert!(ci("mismatch", "mIsMaTcH"), "case insensitive match");
		assert!(ci("tryhards", "Try Your Hardest"), "uppercase text");
		assert!(ci("TRYHARDS", "try your hardest"), "uppercase pattern");
	}

	#[test]
	fn t_compare() {
		// Mixed numeric coercion.
		assert!(compare(&Value::Int(5), CmpOp::Ge, &Value::Double(5.0)));
		assert!(compare(&Value::Double(4.56), CmpOp::Gt, &Value::Double(4.559)));

		// Strings only read as numbers through a schema declaration,
		// which happens before values get here; a raw string against a
		// number is always false.
		assert!(! compare(&Value::Str("4.56".to_owned()), CmpOp::Gt, &Value::Double(1.0)));
		assert!(! compare(&Value::Str("nope".to_owned()), CmpOp::Gt, &Value::Double(1.0)));

		// Lexical fallback.
		assert!(compare(
			&Value::Str("abc".to_owned()),
			CmpOp::Lt,
			&Value::Str("abd".to_owned()),
		));

		// Invalid never matches, even for !=.
		assert!(! compare(&Value::Invalid, CmpOp::Ne, &Value::Int(1)));
	}
}
