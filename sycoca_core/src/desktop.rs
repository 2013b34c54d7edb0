/*!
# Sycoca: Desktop Entries
*/

use std::path::Path;
use trimothy::TrimMut;



/// # Main Group Name.
const GROUP_MAIN: &str = "Desktop Entry";

/// # Action Group Prefix.
const GROUP_ACTION: &str = "Desktop Action ";

/// # Property Definition Group Prefix.
const GROUP_PROPERTY_DEF: &str = "PropertyDef::";



#[derive(Debug, Clone, Default)]
/// # A Parsed Desktop Entry.
///
/// A light grouped key/value store covering the INI-ish subset the
/// cache builder needs: `[Group]` headers, `Key=Value` lines, `#`
/// comments, and blank lines. Keys are matched exactly, so localized
/// variants like `Name[fr]` never shadow their plain counterparts.
pub struct DesktopEntry {
	/// # Groups, In File Order.
	groups: Vec<(String, Vec<(String, String)>)>,
}

impl DesktopEntry {
	/// # Parse From Raw Text.
	///
	/// Returns `None` when there is no `[Desktop Entry]` group at all;
	/// stray lines before the first header or without a `=` are simply
	/// skipped.
	pub fn parse(raw: &str) -> Option<Self> {
		let mut groups: Vec<(String, Vec<(String, String)>)> = Vec::new();
		for line in raw.lines() {
			let line = line.trim();
			if line.is_empty() || line.starts_with('#') { continue; }

			// A new group.
			if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
				groups.push((name.trim().to_owned(), Vec::new()));
			}
			// A key/value pair for the current group.
			else if let Some((k, v)) = line.split_once('=') {
				if let Some((_, entries)) = groups.last_mut() {
					let mut k = k.to_owned();
					let mut v = v.to_owned();
					k.trim_mut();
					v.trim_mut();
					if ! k.is_empty() { entries.push((k, v)); }
				}
			}
		}

		let out = Self { groups };
		if out.group(GROUP_MAIN).is_some() { Some(out) }
		else { None }
	}

	/// # Parse From a File.
	pub fn from_path(src: &Path) -> Option<Self> {
		let raw = std::fs::read_to_string(src).ok()?;
		Self::parse(&raw)
	}

	/// # A Group's Entries.
	pub fn group(&self, name: &str) -> Option<&[(String, String)]> {
		self.groups.iter()
			.find_map(|(g, entries)| (g == name).then_some(entries.as_slice()))
	}

	/// # Main-Group Value.
	pub fn get(&self, key: &str) -> Option<&str> {
		get_in(self.group(GROUP_MAIN)?, key)
	}

	/// # Main-Group List Value.
	///
	/// Missing keys yield an empty list.
	pub fn get_list(&self, key: &str) -> Vec<String> {
		self.get(key).map(split_list).unwrap_or_default()
	}

	/// # Main-Group Boolean Value.
	pub fn get_bool(&self, key: &str) -> Option<bool> {
		self.get(key).and_then(crate::variant::parse_bool)
	}

	/// # Main-Group Integer Value.
	pub fn get_i32(&self, key: &str) -> Option<i32> {
		self.get(key).and_then(|v| v.trim().parse::<i32>().ok())
	}

	/// # Main-Group Entries.
	///
	/// Localized keys (anything bracketed) are filtered out; the cache
	/// stores only the unlocalized property set.
	pub(crate) fn main_entries(&self) -> impl Iterator<Item = (&str, &str)> {
		self.group(GROUP_MAIN)
			.unwrap_or_default()
			.iter()
			.filter(|(k, _)| ! k.contains('['))
			.map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// # Property Definitions.
	///
	/// Yields `(property name, declared type)` for each
	/// `[PropertyDef::Key]` group carrying a `Type=` entry.
	pub(crate) fn property_defs(&self) -> impl Iterator<Item = (&str, &str)> {
		self.groups.iter().filter_map(|(g, entries)| {
			let name = g.strip_prefix(GROUP_PROPERTY_DEF)?;
			let ty = get_in(entries, "Type")?;
			Some((name, ty))
		})
	}

	/// # Desktop Actions.
	///
	/// Yields `(action name, group entries)` for each
	/// `[Desktop Action X]` group, in file order.
	pub(crate) fn actions(&self) -> impl Iterator<Item = (&str, &[(String, String)])> {
		self.groups.iter().filter_map(|(g, entries)| {
			let name = g.strip_prefix(GROUP_ACTION)?;
			Some((name, entries.as_slice()))
		})
	}
}

/// # Exact-Key Lookup Within a Group.
pub(crate) fn get_in<'a>(entries: &'a [(String, String)], key: &str) -> Option<&'a str> {
	entries.iter()
		.find_map(|(k, v)| (k == key).then_some(v.as_str()))
}

/// # Split a Desktop List Value.
///
/// Both separators seen in the wild are honored: semicolons (mime
/// lists) and commas (service-type lists). Empty segments, including
/// the customary trailing one, are dropped.
pub(crate) fn split_list(raw: &str) -> Vec<String> {
	raw.split(|c| c == ';' || c == ',')
		.map(str::trim)
		.filter(|s| ! s.is_empty())
		.map(str::to_owned)
		.collect()
}
