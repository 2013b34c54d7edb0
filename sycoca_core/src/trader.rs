/*!
# Sycoca: Trader Queries
*/

use crate::{
	constraint::{
		Constraint,
		PropertySource,
	},
	entry::Offer,
	factory::Factories,
	profile::{
		PROFILE_MIME,
		PROFILE_SERVICE_TYPE,
		ServiceTypeProfile,
	},
	PropertyValue,
	Service,
	ServiceList,
	ServiceType,
	SycocaContext,
	SycocaError,
};
use std::sync::Arc;



/// # Maximum Inheritance Depth.
///
/// The builder rejects cycles, but the file on disk is still untrusted
/// input; chain walks give up rather than spin.
const MAX_CHAIN: usize = 64;



/// # Trader Query Over Service Types.
///
/// Default-ordered offers for the type, optionally reshaped by the
/// user profile, then filtered (or ranked) by the constraint. A
/// constraint that fails to parse yields an empty list, never an
/// error; real errors here mean image corruption.
pub(crate) fn query_service_type(
	factories: &Factories,
	ctx: &SycocaContext,
	service_type: &str,
	constraint: Option<&str>,
	profiled: bool,
) -> Result<ServiceList, SycocaError> {
	// Parse before anything else: garbage in, empty out.
	let constraint = match constraint.map(Constraint::parse) {
		None => None,
		Some(Ok(c)) => Some(c),
		Some(Err(_)) => return Ok(ServiceList::new()),
	};

	let Some(st_factory) = factories.service_types() else { return Ok(ServiceList::new()); };
	let Some(st) = st_factory.find_by_key(service_type)? else { return Ok(ServiceList::new()); };

	let chain = type_chain(factories, &st)?;
	let mut offers = resolve_offers(factories, st.offers())?;

	if profiled {
		if let Some(profile) = ServiceTypeProfile::load_from(
			&ctx.profile_path(PROFILE_SERVICE_TYPE),
			service_type,
		) {
			offers = profile.apply(offers);
		}
	}

	Ok(apply_constraint(offers, constraint.as_ref(), &chain))
}

/// # Trader Query Over Mime Types.
///
/// Same shape as the service-type query; the (historical) mime profile
/// file supplies the user overrides, and properties evaluate without a
/// declared schema.
pub(crate) fn query_mime(
	factories: &Factories,
	ctx: &SycocaContext,
	mime: &str,
	constraint: Option<&str>,
) -> Result<ServiceList, SycocaError> {
	let constraint = match constraint.map(Constraint::parse) {
		None => None,
		Some(Ok(c)) => Some(c),
		Some(Err(_)) => return Ok(ServiceList::new()),
	};

	let Some(mime_factory) = factories.mime_types() else { return Ok(ServiceList::new()); };
	let Some(entry) = mime_factory.find_by_key(mime)? else { return Ok(ServiceList::new()); };

	let mut offers = resolve_offers(factories, entry.offers())?;
	if let Some(profile) = ServiceTypeProfile::load_from(&ctx.profile_path(PROFILE_MIME), mime) {
		offers = profile.apply(offers);
	}

	Ok(apply_constraint(offers, constraint.as_ref(), &[]))
}

/// # Does a Service Implement a Type (Inheritance-Aware)?
pub(crate) fn has_service_type(
	factories: &Factories,
	service: &Service,
	want: &str,
) -> Result<bool, SycocaError> {
	for claimed in service.service_types() {
		if claimed == want { return Ok(true); }

		// Walk the parent chain of the claimed type.
		let Some(st_factory) = factories.service_types() else { continue; };
		let Some(mut cur) = st_factory.find_by_key(claimed)? else { continue; };
		for _ in 0..MAX_CHAIN {
			let Some(parent) = cur.parent() else { break; };
			if parent == want { return Ok(true); }
			match st_factory.find_by_key(parent)? {
				Some(next) => { cur = next; },
				None => break,
			}
		}
	}
	Ok(false)
}

/// # Materialize an Offer List.
fn resolve_offers(factories: &Factories, offers: &[Offer]) -> Result<ServiceList, SycocaError> {
	let Some(svc_factory) = factories.services() else { return Ok(ServiceList::new()); };
	offers.iter()
		.map(|o| svc_factory.by_offset(o.service_offset))
		.collect()
}

/// # The Queried Type and Its Ancestors, Derived First.
fn type_chain(
	factories: &Factories,
	st: &Arc<ServiceType>,
) -> Result<Vec<Arc<ServiceType>>, SycocaError> {
	let mut out = vec![st.clone()];
	let Some(st_factory) = factories.service_types() else { return Ok(out); };
	while out.len() < MAX_CHAIN {
		let Some(parent) = out[out.len() - 1].parent() else { break; };
		match st_factory.find_by_key(parent)? {
			Some(next) => out.push(next),
			None => break,
		}
	}
	Ok(out)
}

/// # Filter or Rank.
fn apply_constraint(
	offers: ServiceList,
	constraint: Option<&Constraint>,
	chain: &[Arc<ServiceType>],
) -> ServiceList {
	let Some(constraint) = constraint else { return offers; };

	let mut out: Vec<(Arc<Service>, Option<f64>)> = offers.into_iter()
		.filter_map(|s| {
			let props = ServiceProperties { service: &s, chain };
			if constraint.matches(&props) {
				let score = constraint.rank(&props);
				Some((s, score))
			}
			else { None }
		})
		.collect();

	// Ranking forms reorder; candidates without a usable score sink to
	// the bottom but are not dropped.
	if constraint.is_ranked() {
		out.sort_by(|(_, a), (_, b)| match (a, b) {
			(Some(a), Some(b)) => b.total_cmp(a),
			(Some(_), None) => std::cmp::Ordering::Less,
			(None, Some(_)) => std::cmp::Ordering::Greater,
			(None, None) => std::cmp::Ordering::Equal,
		});
	}

	out.into_iter().map(|(s, _)| s).collect()
}

/// # A Service Seen Through a Schema.
struct ServiceProperties<'a> {
	/// # The Candidate.
	service: &'a Service,

	/// # Queried Type Chain (For Declared Property Types).
	chain: &'a [Arc<ServiceType>],
}

impl PropertySource for ServiceProperties<'_> {
	/// # Typed Property Lookup.
	///
	/// A declaration anywhere along the queried type chain fixes the
	/// property's type; a stored value that will not coerce reads as
	/// absent. Undeclared strings get a conservative guess (booleans
	/// and integers only), everything else passes through as stored.
	fn property(&self, name: &str) -> Option<PropertyValue> {
		let raw = self.service.property(name)?;
		match self.chain.iter().find_map(|st| st.property_type(name)) {
			Some(ty) => raw.coerce(ty),
			None => Some(guess(raw)),
		}
	}

	fn exists(&self, name: &str) -> bool {
		self.service.property(name).is_some()
	}
}

/// # Guess an Undeclared String's Shape.
///
/// Only the unambiguous cases: literal booleans and integers. Floats
/// stay strings; without a declaration there is no telling a version
/// string from a number, and numeric comparisons should fail closed.
fn guess(raw: PropertyValue) -> PropertyValue {
	if let PropertyValue::String(s) = &raw {
		match s.trim() {
			"true" => return PropertyValue::Bool(true),
			"false" => return PropertyValue::Bool(false),
			trimmed =>
				if let Ok(n) = trimmed.parse::<i64>() {
					return PropertyValue::Int(n);
				},
		}
	}
	raw
}
