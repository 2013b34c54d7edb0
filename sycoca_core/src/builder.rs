/*!
# Sycoca: Builder
*/

use crate::{
	DesktopEntry,
	EntryKind,
	entry::Offer,
	FlatSet,
	ImageWriter,
	MimeType,
	Service,
	ServiceGroup,
	ServiceType,
	StringDict,
	SycocaContext,
	SycocaError,
	sycoca::Header,
	utility,
};
use fyi_msg::Msg;
use std::{
	collections::BTreeMap,
	io::Write,
	path::{
		Path,
		PathBuf,
	},
};
use walkdir::WalkDir;



/// # Cache Builder.
///
/// Walks the source directories, parses every desktop entry (skipping,
/// with a warning, any it cannot make sense of), resolves service-type
/// inheritance, computes the offer lists, lays out the binary image,
/// and installs it atomically over the previous generation.
///
/// The reader uses this same type for in-process self-rebuilds; the
/// `sycocabuild` binary is just a thin wrapper over it.
#[derive(Debug, Clone)]
pub struct CacheBuilder {
	/// # Path Context.
	ctx: SycocaContext,

	/// # Reuse the Previous File When Inputs Are Unchanged?
	incremental: bool,

	/// # Validate the Menu Tree Without Writing?
	menu_test: bool,

	/// # Menu Id to Trace.
	track: Option<String>,
}

impl CacheBuilder {
	#[must_use]
	/// # New Builder.
	pub const fn new(ctx: SycocaContext) -> Self {
		Self {
			ctx,
			incremental: true,
			menu_test: false,
			track: None,
		}
	}

	#[must_use]
	/// # Toggle Incremental Mode.
	pub const fn with_incremental(mut self, v: bool) -> Self {
		self.incremental = v;
		self
	}

	#[must_use]
	/// # Toggle Menu-Test Mode.
	pub const fn with_menu_test(mut self, v: bool) -> Self {
		self.menu_test = v;
		self
	}

	#[must_use]
	/// # Trace a Menu Id.
	pub fn with_track<S>(mut self, id: S) -> Self
	where S: Into<String> {
		self.track = Some(id.into());
		self
	}

	/// # Rebuild the Cache.
	///
	/// Returns `true` when a new file was installed, `false` when the
	/// previous one was already current (or menu-test mode ran).
	///
	/// ## Errors
	///
	/// Individual unparseable entries are skipped with a warning; only
	/// output I/O failures (and a missing cache directory) error, in
	/// which case any previous file is left untouched.
	pub fn recreate(&self) -> Result<bool, SycocaError> {
		let sources = self.collect();

		// Nothing to do if the previous file already matches.
		if self.incremental && ! self.menu_test && self.unchanged(&sources) {
			return Ok(false);
		}

		// Parse everything up front.
		let service_types = self.parse_service_types(&sources);
		let services = self.parse_services(&sources);
		let groups = build_menu_tree(&services);

		if let Some(track) = &self.track {
			for s in &services {
				if s.menu_id() == track {
					Msg::info(format!(
						"Tracked {} -> {} (group {}).",
						track,
						s.entry_path(),
						group_of(s.entry_path()),
					)).eprint();
				}
			}
		}

		if self.menu_test {
			print_menu_tree(&groups, &services);
			return Ok(false);
		}

		// Lay out the image and install it.
		let image = write_image(
			&self.ctx,
			&sources,
			services,
			service_types,
			&groups,
			utility::now_ms(),
		);

		let dst = self.ctx.cache_file_path();
		let to_err = || SycocaError::BuildWrite(dst.to_string_lossy().into_owned());
		let dir = dst.parent().ok_or_else(to_err)?;
		std::fs::create_dir_all(dir).map_err(|_| to_err())?;

		// A unique temp name keeps racing builders out of each other's
		// way; the rename makes the swap atomic.
		let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|_| to_err())?;
		tmp.write_all(&image).map_err(|_| to_err())?;
		tmp.persist(&dst).map_err(|_| to_err())?;

		Ok(true)
	}

	/// # Collect Source Files.
	///
	/// Later data dirs override earlier ones keyed by path relative to
	/// the subtree root; a winning entry marked `Hidden` deletes the
	/// ones it shadowed.
	fn collect(&self) -> Sources {
		let mut out = Sources::default();
		for base in self.ctx.data_dirs() {
			overlay(&mut out.service_types, &base.join(crate::DIR_SERVICE_TYPES));
			overlay(&mut out.services, &base.join(crate::DIR_SERVICES));
			overlay(&mut out.applications, &base.join(crate::DIR_APPLICATIONS));
		}

		// The update signature digests what we are about to read, so
		// identical inputs always rebuild to identical bytes (modulo
		// the build timestamp).
		let mut h = crc32fast::Hasher::new();
		for map in [&out.service_types, &out.services, &out.applications] {
			for (rel, full) in map {
				h.update(rel.as_bytes());
				h.update(&utility::mtime_ms(full).to_le_bytes());
			}
		}
		out.signature = h.finalize();

		out.dirs = self.ctx.source_dirs()
			.into_iter()
			.map(|d| (d.to_string_lossy().into_owned(), utility::mtime_ms(&d)))
			.collect();

		out
	}

	/// # Previous File Still Current?
	fn unchanged(&self, sources: &Sources) -> bool {
		let Ok(raw) = std::fs::read(self.ctx.cache_file_path()) else { return false; };
		let Ok(header) = Header::read(&raw) else { return false; };
		header.signature == sources.signature &&
		header.language == self.ctx.language() &&
		header.dirs.iter().map(|(d, _)| d.as_str()).eq(
			sources.dirs.iter().map(|(d, _)| d.as_str())
		)
	}

	/// # Parse Service Types, Resolving Inheritance.
	fn parse_service_types(&self, sources: &Sources) -> Vec<ServiceType> {
		let mut out: Vec<ServiceType> = Vec::new();
		for (rel, full) in &sources.service_types {
			let Some(parsed) = DesktopEntry::from_path(full)
				.and_then(|e| ServiceType::from_desktop(&e)) else {
					Msg::warning(format!("Skipping unparseable service type {rel}.")).eprint();
					continue;
				};
			if parsed.parent() == Some(parsed.name()) ||
				out.iter().any(|o| o.name() == parsed.name()) {
				Msg::warning(format!("Skipping duplicate/degenerate service type {rel}.")).eprint();
				continue;
			}
			out.push(parsed);
		}

		// Inheritance cycles get their whole membership rejected; an
		// unterminated parent chain is useless to every query.
		let cyclic = find_cycles(&out);
		if ! cyclic.is_empty() {
			for name in &cyclic {
				Msg::warning(format!("Rejecting service type {name}: inheritance cycle.")).eprint();
			}
			out.retain(|st| ! cyclic.contains(st.name()));
		}

		out
	}

	/// # Parse Services and Applications.
	fn parse_services(&self, sources: &Sources) -> Vec<Service> {
		let mut out = Vec::new();
		for map in [&sources.services, &sources.applications] {
			for (rel, full) in map {
				let Some(raw) = DesktopEntry::from_path(full) else {
					Msg::warning(format!("Skipping unparseable service {rel}.")).eprint();
					continue;
				};

				// Hidden is an overlay tombstone: the highest-precedence
				// copy won, and it says "no such service".
				if raw.get_bool("Hidden") == Some(true) { continue; }

				match Service::from_desktop(rel, &raw) {
					Some(parsed) => out.push(parsed),
					None => {
						Msg::warning(format!("Skipping invalid service {rel}.")).eprint();
					},
				}
			}
		}
		out
	}
}



#[derive(Debug, Clone, Default)]
/// # Collected Source Files.
struct Sources {
	/// # Service Type Files (Relative Path to Winner).
	service_types: BTreeMap<String, PathBuf>,

	/// # Service Files.
	services: BTreeMap<String, PathBuf>,

	/// # Application Files.
	applications: BTreeMap<String, PathBuf>,

	/// # Update Signature.
	signature: u32,

	/// # Watched Directories and Their Mtimes.
	dirs: Vec<(String, i64)>,
}

/// # Overlay One Source Subtree.
fn overlay(map: &mut BTreeMap<String, PathBuf>, dir: &Path) {
	if ! dir.is_dir() { return; }
	for entry in WalkDir::new(dir).follow_links(true).into_iter().flatten() {
		if ! entry.file_type().is_file() { continue; }
		let Ok(rel) = entry.path().strip_prefix(dir) else { continue; };
		let rel = rel.to_string_lossy().replace('\\', "/");
		if rel.ends_with(crate::DESKTOP_EXT) {
			map.insert(rel, entry.path().to_path_buf());
		}
	}
}

/// # Find Service Types With Cyclic Inheritance.
fn find_cycles(types: &[ServiceType]) -> FlatSet<String> {
	let parents: BTreeMap<&str, &str> = types.iter()
		.filter_map(|st| st.parent().map(|p| (st.name(), p)))
		.collect();

	let mut out = FlatSet::default();
	for st in types {
		let mut seen = vec![st.name()];
		let mut cur = st.name();
		while let Some(&next) = parents.get(cur) {
			if seen.contains(&next) {
				out.extend(seen.iter().map(|s| (*s).to_owned()));
				break;
			}
			seen.push(next);
			cur = next;
		}
	}
	out
}

/// # Menu Group of an Entry Path.
///
/// The directory part with a trailing slash; top-level entries live in
/// the root group "/".
fn group_of(rel: &str) -> String {
	rel.rfind('/').map_or_else(
		|| "/".to_owned(),
		|pos| format!("{}/", &rel[..pos]),
	)
}

/// # Build the Menu Tree.
///
/// Returns group path mapped to (direct subgroup paths, member service
/// indices). Only applications (services with a menu id) are placed;
/// each lands in exactly the group matching its directory.
fn build_menu_tree(services: &[Service]) -> BTreeMap<String, MenuNode> {
	let mut out: BTreeMap<String, MenuNode> = BTreeMap::new();
	out.entry("/".to_owned()).or_default();

	for (idx, s) in services.iter().enumerate() {
		if s.menu_id().is_empty() { continue; }
		let group = group_of(s.entry_path());

		// Ensure the whole ancestor chain exists and is linked up.
		let mut parent = "/".to_owned();
		if group != "/" {
			let mut acc = String::new();
			for part in group.trim_end_matches('/').split('/') {
				acc.push_str(part);
				acc.push('/');
				out.entry(acc.clone()).or_default();
				out.entry(parent.clone()).or_default().subgroups.insert(acc.clone());
				parent = acc.clone();
			}
		}

		out.entry(group).or_default().services.push(idx);
	}

	out
}

#[derive(Debug, Clone, Default)]
/// # One Menu Tree Node.
struct MenuNode {
	/// # Direct Subgroup Paths.
	subgroups: std::collections::BTreeSet<String>,

	/// # Member Services (Indices).
	services: Vec<usize>,
}

/// # Print the Menu Tree (Menu-Test Mode).
fn print_menu_tree(groups: &BTreeMap<String, MenuNode>, services: &[Service]) {
	for (path, node) in groups {
		Msg::info(format!(
			"{path} ({} group(s), {} entr{})",
			node.subgroups.len(),
			node.services.len(),
			if node.services.len() == 1 { "y" } else { "ies" },
		)).eprint();
		for &idx in &node.services {
			Msg::plain(format!("    {} ({})", services[idx].menu_id(), services[idx].entry_path()))
				.eprint();
		}
	}
}

/// # Lay Out the Binary Image.
fn write_image(
	ctx: &SycocaContext,
	sources: &Sources,
	mut services: Vec<Service>,
	mut service_types: Vec<ServiceType>,
	groups: &BTreeMap<String, MenuNode>,
	now_ms: i64,
) -> Vec<u8> {
	let mut w = ImageWriter::new();

	// Version and padding.
	w.write_i32(crate::SYCOCA_VERSION);
	w.write_i32(0);

	// Factory table, offsets backfilled as bodies land.
	let mut table_slots = Vec::with_capacity(EntryKind::ALL.len());
	for kind in EntryKind::ALL {
		w.write_i32(kind.tag());
		table_slots.push((kind, w.reserve_i32()));
	}
	w.write_i32(0);

	// Header.
	let prefixes: Vec<String> = ctx.data_dirs()
		.iter()
		.map(|d| d.to_string_lossy().into_owned())
		.collect();
	w.write_string_list(&prefixes);
	w.write_i64(now_ms);
	w.write_string(ctx.language());
	w.write_u32(sources.signature);
	w.write_i32(i32::try_from(sources.dirs.len()).unwrap_or(i32::MAX));
	for (d, _) in &sources.dirs { w.write_string(d); }
	for (_, mtime) in &sources.dirs { w.write_i64(*mtime); }

	/// # Start a Factory Body.
	fn body(w: &mut ImageWriter, slots: &[(EntryKind, u32)], kind: EntryKind) -> (u32, u32) {
		let pos = w.pos();
		for (k, slot) in slots {
			if *k == kind { w.patch_i32(*slot, pos as i32); }
		}
		(w.reserve_i32(), w.reserve_i32()) // (all list, dict)
	}

	// Services first; every other factory references their offsets.
	let (svc_all, svc_dict) = body(&mut w, &table_slots, EntryKind::Service);
	for s in &mut services { s.write(&mut w); }

	// Now the offers can be pinned to real offsets.
	attach_offers(&services, &mut service_types);
	let mut mimes = mime_entries(&services);

	let (st_all, st_dict) = body(&mut w, &table_slots, EntryKind::ServiceType);
	for st in &mut service_types { st.write(&mut w); }

	// Groups are written leaves-first so parents can embed child
	// offsets directly.
	let (grp_all, grp_dict) = body(&mut w, &table_slots, EntryKind::ServiceGroup);
	let mut written_groups = Vec::with_capacity(groups.len());
	write_group(&mut w, "/", groups, &services, &mut written_groups);

	let (mime_all, mime_dict) = body(&mut w, &table_slots, EntryKind::MimeType);
	for m in &mut mimes { m.write(&mut w); }

	// String dictionaries.
	let mut dict = StringDict::default();
	for s in &services {
		dict.add(s.name(), s.offset());
		dict.add(s.entry_path(), s.offset());
		dict.add(s.storage_id(), s.offset());
		dict.add(s.menu_id(), s.offset());
	}
	save_dict(&mut w, svc_dict, &dict);

	let mut dict = StringDict::default();
	for st in &service_types { dict.add(st.name(), st.offset()); }
	save_dict(&mut w, st_dict, &dict);

	let mut dict = StringDict::default();
	for g in &written_groups { dict.add(g.path(), g.offset()); }
	save_dict(&mut w, grp_dict, &dict);

	let mut dict = StringDict::default();
	for m in &mimes { dict.add(m.name(), m.offset()); }
	save_dict(&mut w, mime_dict, &dict);

	// All-entries lists.
	save_all_list(&mut w, svc_all, services.iter().map(Service::offset));
	save_all_list(&mut w, st_all, service_types.iter().map(ServiceType::offset));
	save_all_list(&mut w, grp_all, written_groups.iter().map(ServiceGroup::offset));
	save_all_list(&mut w, mime_all, mimes.iter().map(MimeType::offset));

	w.into_vec()
}

/// # Save a Dictionary, Patching Its Slot.
fn save_dict(w: &mut ImageWriter, slot: u32, dict: &StringDict) {
	let pos = w.pos();
	dict.save(w);
	w.patch_i32(slot, pos as i32);
}

/// # Save an All-Entries List, Patching Its Slot.
fn save_all_list<I>(w: &mut ImageWriter, slot: u32, offsets: I)
where I: ExactSizeIterator<Item = u32> {
	let pos = w.pos();
	w.write_i32(i32::try_from(offsets.len()).unwrap_or(i32::MAX));
	for off in offsets { w.write_i32(off as i32); }
	w.patch_i32(slot, pos as i32);
}

/// # Write a Group Subtree (Post-Order).
fn write_group(
	w: &mut ImageWriter,
	path: &str,
	tree: &BTreeMap<String, MenuNode>,
	services: &[Service],
	written: &mut Vec<ServiceGroup>,
) -> u32 {
	let node = tree.get(path).cloned().unwrap_or_default();

	let mut children = Vec::with_capacity(node.subgroups.len() + node.services.len());
	for sub in &node.subgroups {
		children.push(write_group(w, sub, tree, services, written));
	}
	for &idx in &node.services {
		children.push(services[idx].offset());
	}

	let mut group = ServiceGroup::new(path.to_owned());
	group.child_offsets = children;
	group.write(w);
	let offset = group.offset();
	written.push(group);
	offset
}

/// # Compute and Attach Service-Type Offers.
///
/// A service claiming a derived type also counts as an offer for every
/// ancestor. Default ordering applies: allowed-as-default first, then
/// initial preference descending, stable on parse order.
fn attach_offers(services: &[Service], service_types: &mut [ServiceType]) {
	let parents: BTreeMap<String, String> = service_types.iter()
		.filter_map(|st| st.parent().map(|p| (st.name().to_owned(), p.to_owned())))
		.collect();

	// Gather (service index) lists per service-type name.
	let mut claims: BTreeMap<String, Vec<usize>> = BTreeMap::new();
	for (idx, s) in services.iter().enumerate() {
		let mut seen = FlatSet::default();
		for claimed in s.service_types() {
			let mut cur = claimed.as_str();
			loop {
				if seen.insert(cur.to_owned()) {
					claims.entry(cur.to_owned()).or_default().push(idx);
				}
				match parents.get(cur) {
					Some(next) => { cur = next.as_str(); },
					None => break,
				}
			}
		}
	}

	for st in service_types {
		let Some(members) = claims.get(st.name()) else { continue; };
		let mut offers: Vec<Offer> = members.iter()
			.map(|&idx| Offer {
				service_offset: services[idx].offset(),
				initial_preference: services[idx].initial_preference(),
				allow_as_default: services[idx].allow_as_default(),
			})
			.collect();
		sort_offers(&mut offers);
		st.offers = offers;
	}
}

/// # Synthesize Mime Type Entries.
fn mime_entries(services: &[Service]) -> Vec<MimeType> {
	let mut claims: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
	for (idx, s) in services.iter().enumerate() {
		for m in s.mime_types() {
			let members = claims.entry(m.as_str()).or_default();
			if ! members.contains(&idx) { members.push(idx); }
		}
	}

	claims.into_iter()
		.map(|(name, members)| {
			let mut out = MimeType::new(name.to_owned());
			out.offers = members.into_iter()
				.map(|idx| Offer {
					service_offset: services[idx].offset(),
					initial_preference: services[idx].initial_preference(),
					allow_as_default: services[idx].allow_as_default(),
				})
				.collect();
			sort_offers(&mut out.offers);
			out
		})
		.collect()
}

/// # Default Offer Ordering.
///
/// Two partitions, allowed-as-default first, each sorted by initial
/// preference descending; the sort is stable so parse order breaks
/// ties.
fn sort_offers(offers: &mut [Offer]) {
	offers.sort_by(|a, b|
		b.allow_as_default.cmp(&a.allow_as_default)
			.then(b.initial_preference.cmp(&a.initial_preference))
	);
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_group_of() {
		assert_eq!(group_of("org.kde.konsole.desktop"), "/");
		assert_eq!(group_of("kde/utils/foo.desktop"), "kde/utils/");
	}

	#[test]
	fn t_sort_offers() {
		let mut offers = vec![
			Offer { service_offset: 1, initial_preference: 5, allow_as_default: false },
			Offer { service_offset: 2, initial_preference: 1, allow_as_default: true },
			Offer { service_offset: 3, initial_preference: 9, allow_as_default: false },
			Offer { service_offset: 4, initial_preference: 1, allow_as_default: true },
		];
		sort_offers(&mut offers);
		let order: Vec<u32> = offers.iter().map(|o| o.service_offset).collect();
		// Defaults first (stable between equals), then the rest by
		// preference.
		assert_eq!(order, vec![2, 4, 3, 1]);
	}

	#[test]
	fn t_find_cycles() {
		let raw = |name: &str, parent: &str| {
			let mut txt = format!(
				"[Desktop Entry]\nType=ServiceType\nX-KDE-ServiceType={name}\n"
			);
			if ! parent.is_empty() {
				txt.push_str(&format!("X-KDE-Derived={parent}\n"));
			}
			ServiceType::from_desktop(&DesktopEntry::parse(&txt).expect("Bad fixture."))
				.expect("Bad service type.")
		};

		// a -> b -> c is fine; d -> e -> d is not.
		let types = vec![
			raw("a", "b"), raw("b", "c"), raw("c", ""),
			raw("d", "e"), raw("e", "d"),
		];
		let cyclic = find_cycles(&types);
		assert!(! cyclic.contains("a"));
		assert!(! cyclic.contains("c"));
		assert!(cyclic.contains("d"));
		assert!(cyclic.contains("e"));
	}

	#[test]
	fn t_menu_tree() {
		let parse = |rel: &str| {
			let raw = "[Desktop Entry]\nName=App\nType=Application\nExec=app\n";
			Service::from_desktop(rel, &DesktopEntry::parse(raw).expect("Bad fixture."))
				.expect("Bad service.")
		};
		let services = vec![
			parse("org.kde.konsole.desktop"),
			parse("kde/utils/org.kde.kcalc.desktop"),
		];
		let tree = build_menu_tree(&services);

		assert!(tree.contains_key("/"));
		assert!(tree.contains_key("kde/"));
		assert!(tree.contains_key("kde/utils/"));
		assert_eq!(tree["/"].services, vec![0]);
		assert_eq!(tree["kde/utils/"].services, vec![1]);
		assert!(tree["/"].subgroups.contains("kde/"));
		assert!(tree["kde/"].subgroups.contains("kde/utils/"));
	}
}
