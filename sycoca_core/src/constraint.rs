/*!
# Sycoca: Trader Constraints

A tiny expression language evaluated against a service's properties to
filter (or rank) trader query candidates. Malformed expressions never
reach callers as errors; the trader turns them into empty offer lists.
*/

pub(crate) mod eval;
pub(crate) mod lexer;
pub(crate) mod parser;

pub(crate) use eval::PropertySource;
pub(crate) use parser::Constraint;



impl Constraint {
	/// # Does the Candidate Match?
	///
	/// Ranking forms (`max`/`min`) do not filter; every candidate
	/// passes and [`Constraint::rank`] orders them afterwards.
	pub(crate) fn matches(&self, ctx: &dyn PropertySource) -> bool {
		match self {
			Self::Filter(expr) => eval::matches(expr, ctx),
			Self::Max(_) | Self::Min(_) => true,
		}
	}

	/// # Ranking Score.
	///
	/// `None` for plain filters, and for candidates whose ranking
	/// expression is non-numeric (those sort last).
	pub(crate) fn rank(&self, ctx: &dyn PropertySource) -> Option<f64> {
		match self {
			Self::Filter(_) => None,
			Self::Max(expr) => eval::rank(expr, ctx),
			Self::Min(expr) => eval::rank(expr, ctx).map(|v| -v),
		}
	}

	/// # Is This a Ranking Form?
	pub(crate) const fn is_ranked(&self) -> bool {
		matches!(self, Self::Max(_) | Self::Min(_))
	}
}
