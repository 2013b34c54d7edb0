/*!
# Sycoca: Service Type Profiles
*/

use crate::{
	ServiceList,
	SycocaContext,
	SycocaError,
};
use std::{
	fmt::Write as _,
	io::Write as _,
	path::Path,
};



/// # Service-Type Profile File.
pub(crate) const PROFILE_SERVICE_TYPE: &str = "servicetype_profilerc";

/// # Mime Profile File (Historical Twin).
pub(crate) const PROFILE_MIME: &str = "profilerc";



#[derive(Debug, Clone, Default, Eq, PartialEq)]
/// # A User Profile For One Service Type.
///
/// User-editable overrides for trader ordering: an ordered preferred
/// list and a disabled set, both keyed by storage id. Disabled
/// services vanish from profiled queries but stay discoverable through
/// the un-profiled default offers.
pub struct ServiceTypeProfile {
	/// # Preferred Storage Ids, Best First.
	preferred: Vec<String>,

	/// # Disabled Storage Ids.
	disabled: Vec<String>,
}

impl ServiceTypeProfile {
	/// # Load the Profile For a Service Type.
	///
	/// Missing files and missing sections both read as "no profile".
	#[must_use]
	pub fn load(ctx: &SycocaContext, service_type: &str) -> Option<Self> {
		Self::load_from(&ctx.profile_path(PROFILE_SERVICE_TYPE), service_type)
	}

	/// # Load From a Specific Profile File.
	pub(crate) fn load_from(path: &Path, section: &str) -> Option<Self> {
		let raw = std::fs::read_to_string(path).ok()?;
		let body = section_body(&raw, section)?;

		// Default_N keys are ordered by N, not file position.
		let mut preferred: Vec<(u32, String)> = Vec::new();
		let mut disabled = Vec::new();
		for line in body {
			let Some((k, v)) = line.split_once('=') else { continue; };
			let (k, v) = (k.trim(), v.trim());
			if let Some(n) = k.strip_prefix("Default_").and_then(|n| n.parse::<u32>().ok()) {
				if ! v.is_empty() { preferred.push((n, v.to_owned())); }
			}
			else if k == "DisabledEntries" {
				disabled = crate::desktop::split_list(v);
			}
		}
		preferred.sort_by_key(|(n, _)| *n);

		Some(Self {
			preferred: preferred.into_iter().map(|(_, v)| v).collect(),
			disabled,
		})
	}

	/// # Any Profile On Record?
	#[must_use]
	pub fn exists(ctx: &SycocaContext, service_type: &str) -> bool {
		Self::load(ctx, service_type).is_some()
	}

	/// # Write (Replace) the Profile For a Service Type.
	///
	/// Other sections of the file are preserved; the write itself goes
	/// through a unique temp file and an atomic rename so concurrent
	/// readers never see a torn profile.
	///
	/// ## Errors
	///
	/// Returns an error if the config directory cannot be created or
	/// the file cannot be written.
	pub fn write(
		ctx: &SycocaContext,
		service_type: &str,
		preferred: &ServiceList,
		disabled: &ServiceList,
	) -> Result<(), SycocaError> {
		let mut section = String::new();
		for (idx, s) in preferred.iter().enumerate() {
			let _ = writeln!(section, "Default_{}={}", idx + 1, s.storage_id());
		}
		if ! disabled.is_empty() {
			let list: Vec<&str> = disabled.iter().map(|s| s.storage_id()).collect();
			let _ = writeln!(section, "DisabledEntries={};", list.join(";"));
		}

		rewrite_section(
			&ctx.profile_path(PROFILE_SERVICE_TYPE),
			service_type,
			Some(&section),
		)
	}

	/// # Delete the Profile For a Service Type.
	///
	/// ## Errors
	///
	/// Returns an error if the file exists but cannot be rewritten.
	pub fn delete(ctx: &SycocaContext, service_type: &str) -> Result<(), SycocaError> {
		let path = ctx.profile_path(PROFILE_SERVICE_TYPE);
		if path.is_file() { rewrite_section(&path, service_type, None) }
		else { Ok(()) }
	}

	/// # Apply to a Default-Ordered Offer List.
	///
	/// Preferred services first, in profile order, then the remaining
	/// non-disabled offers in their default order.
	pub(crate) fn apply(&self, offers: ServiceList) -> ServiceList {
		let mut out = ServiceList::with_capacity(offers.len());
		for want in &self.preferred {
			if let Some(s) = offers.iter().find(|s| s.storage_id() == want) {
				out.push(s.clone());
			}
		}
		for s in offers {
			if ! self.disabled.iter().any(|d| d == s.storage_id()) &&
				! out.iter().any(|o| o.offset() == s.offset()) {
				out.push(s);
			}
		}
		out
	}

	#[must_use]
	/// # Preferred Storage Ids.
	pub fn preferred(&self) -> &[String] { &self.preferred }

	#[must_use]
	/// # Disabled Storage Ids.
	pub fn disabled(&self) -> &[String] { &self.disabled }
}

/// # Extract a Section's Lines.
fn section_body<'a>(raw: &'a str, section: &str) -> Option<Vec<&'a str>> {
	let mut out = None;
	for line in raw.lines() {
		let line = line.trim();
		if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
			if out.is_some() { break; }
			if name.trim() == section { out = Some(Vec::new()); }
		}
		else if let Some(body) = &mut out {
			if ! line.is_empty() && ! line.starts_with('#') { body.push(line); }
		}
	}
	out
}

/// # Rewrite One Section of a Profile File.
///
/// `body` of `None` removes the section entirely.
fn rewrite_section(path: &Path, section: &str, body: Option<&str>)
-> Result<(), SycocaError> {
	let to_err = |p: &Path| SycocaError::ProfileWrite(p.to_string_lossy().into_owned());

	// Copy over every other section verbatim.
	let mut out = String::new();
	if let Ok(raw) = std::fs::read_to_string(path) {
		let mut skipping = false;
		for line in raw.lines() {
			if let Some(name) = line.trim().strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
				skipping = name.trim() == section;
			}
			if ! skipping {
				out.push_str(line);
				out.push('\n');
			}
		}
	}

	// Then ours, if it still has a body.
	if let Some(body) = body {
		if ! out.is_empty() && ! out.ends_with("\n\n") { out.push('\n'); }
		let _ = writeln!(out, "[{section}]");
		out.push_str(body);
	}

	let dir = path.parent().ok_or_else(|| to_err(path))?;
	std::fs::create_dir_all(dir).map_err(|_| to_err(path))?;
	let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|_| to_err(path))?;
	tmp.write_all(out.as_bytes()).map_err(|_| to_err(path))?;
	tmp.persist(path).map_err(|_| to_err(path))?;
	Ok(())
}



#[cfg(test)]
mod test {
	use super::*;
	use std::path::PathBuf;

	/// # A Context Rooted in a Temp Dir.
	fn ctx(dir: &Path) -> SycocaContext {
		SycocaContext::new(
			vec![dir.join("share")],
			dir.join("cache"),
			dir.join("config"),
		)
	}

	#[test]
	fn t_parse() {
		let raw = "\
[SomeOtherType]
Default_1=other.desktop

[FakeBasePart]
# A comment.
Default_2=fakepart.desktop
Default_1=preferredpart.desktop
DisabledEntries=fakepart2.desktop;
";
		let dir = tempfile::TempDir::new().expect("Unable to create temp dir.");
		let path = dir.path().join(PROFILE_SERVICE_TYPE);
		std::fs::write(&path, raw).expect("Unable to write profile.");

		let profile = ServiceTypeProfile::load_from(&path, "FakeBasePart")
			.expect("Unable to load profile.");
		assert_eq!(profile.preferred(), ["preferredpart.desktop", "fakepart.desktop"]);
		assert_eq!(profile.disabled(), ["fakepart2.desktop"]);

		assert!(ServiceTypeProfile::load_from(&path, "Nonesuch").is_none());
		assert!(ServiceTypeProfile::load_from(&PathBuf::from("/nonesuch/rc"), "X").is_none());
	}

	#[test]
	fn t_rewrite() {
		let dir = tempfile::TempDir::new().expect("Unable to create temp dir.");
		let ctx = ctx(dir.path());
		let path = ctx.profile_path(PROFILE_SERVICE_TYPE);

		rewrite_section(&path, "FakeBasePart", Some("Default_1=a.desktop\n"))
			.expect("Unable to write section.");
		rewrite_section(&path, "FakePluginType", Some("Default_1=b.desktop\n"))
			.expect("Unable to write section.");

		// Both sections should resolve.
		assert!(ServiceTypeProfile::load_from(&path, "FakeBasePart").is_some());
		assert!(ServiceTypeProfile::load_from(&path, "FakePluginType").is_some());

		// Replacing one must not clobber the other.
		rewrite_section(&path, "FakeBasePart", Some("Default_1=c.desktop\n"))
			.expect("Unable to rewrite section.");
		let p = ServiceTypeProfile::load_from(&path, "FakeBasePart")
			.expect("Unable to load profile.");
		assert_eq!(p.preferred(), ["c.desktop"]);
		assert!(ServiceTypeProfile::load_from(&path, "FakePluginType").is_some());

		// And deletion only removes its own.
		rewrite_section(&path, "FakeBasePart", None).expect("Unable to delete section.");
		assert!(ServiceTypeProfile::load_from(&path, "FakeBasePart").is_none());
		assert!(ServiceTypeProfile::load_from(&path, "FakePluginType").is_some());
	}
}
