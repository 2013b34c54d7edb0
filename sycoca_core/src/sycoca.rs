/*!
# Sycoca: Reader
*/

use crate::{
	CacheBuilder,
	EntryKind,
	factory::Factories,
	ImageReader,
	ImageWriter,
	MimeType,
	Service,
	ServiceGroup,
	ServiceList,
	ServiceType,
	SycocaContext,
	SycocaError,
	utility,
};
use std::{
	cell::RefCell,
	ops::Deref,
	path::PathBuf,
	sync::Arc,
	time::Instant,
};



#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
/// # Mapping Strategy.
///
/// How a reader gets at the database bytes. Callers never see the
/// difference; strategies exist because not every platform enjoys
/// memory-mapping a file another process may replace.
pub enum Strategy {
	#[default]
	/// # Memory-Map (Preferred).
	Mmap,

	/// # Slurp Into Process Memory.
	Slurp,

	/// # Plain File Reads.
	///
	/// One read per open; the snapshot then lives on the heap like
	/// [`Strategy::Slurp`], minus the mapping advice.
	File,
}

impl Strategy {
	/// # From a Config String.
	///
	/// Unknown names fall back to the default with a warning, the same
	/// way unknown strategy settings always have.
	#[must_use]
	pub fn from_config(raw: &str) -> Self {
		match raw.trim() {
			"" | "mmap" => Self::Mmap,
			"sharedmem" => Self::Slurp,
			"file" => Self::File,
			other => {
				fyi_msg::Msg::warning(format!("Unknown sycoca strategy: {other}.")).eprint();
				Self::Mmap
			},
		}
	}
}



#[derive(Debug)]
/// # A Database Image.
///
/// The raw bytes of one cache snapshot, shared (refcounted) between
/// the reader and its factories. Mapped images keep the underlying
/// file open for as long as any holder remains.
pub(crate) enum Image {
	/// # Memory-Mapped.
	Mmap(memmap2::Mmap),

	/// # Heap-Resident.
	Heap(Vec<u8>),
}

impl Deref for Image {
	type Target = [u8];
	fn deref(&self) -> &[u8] {
		match self {
			Self::Mmap(m) => m,
			Self::Heap(v) => v,
		}
	}
}



#[derive(Debug, Clone, Default)]
/// # Parsed File Header.
pub(crate) struct Header {
	/// # Factory Table: (Type Tag, Body Offset).
	pub(crate) factories: Vec<(i32, u32)>,

	/// # Source Prefixes (Data Dirs at Build Time).
	pub(crate) prefixes: Vec<String>,

	/// # Build Timestamp (Ms Since the Epoch).
	pub(crate) timestamp_ms: i64,

	/// # Build Language.
	pub(crate) language: String,

	/// # Update Signature.
	pub(crate) signature: u32,

	/// # Watched Directories and Their Recorded Mtimes.
	pub(crate) dirs: Vec<(String, i64)>,
}

impl Header {
	/// # Read the Header.
	///
	/// Rejects any version other than the pinned one before touching
	/// anything else; offsets are only meaningful within a generation.
	pub(crate) fn read(image: &[u8]) -> Result<Self, SycocaError> {
		let mut r = ImageReader::new(image);
		let version = r.read_i32()?;
		if version != crate::SYCOCA_VERSION {
			return Err(SycocaError::Version(version));
		}
		let _dummy = r.read_i32()?;

		let mut factories = Vec::new();
		loop {
			let id = r.read_i32()?;
			if id == 0 { break; }
			let offset = r.read_i32()?;
			if offset <= 0 || EntryKind::ALL.len() < factories.len() {
				return Err(SycocaError::Corrupt("bad factory table"));
			}
			factories.push((id, offset as u32));
		}

		let prefixes = r.read_string_list()?;
		let timestamp_ms = r.read_i64()?;
		let language = r.read_string()?;
		let signature = r.read_u32()?;

		let count = r.read_list_len()?;
		let mut paths = Vec::with_capacity(count);
		for _ in 0..count { paths.push(r.read_string()?); }
		let mut dirs = Vec::with_capacity(count);
		for p in paths { dirs.push((p, r.read_i64()?)); }

		Ok(Self { factories, prefixes, timestamp_ms, language, signature, dirs })
	}

	/// # Body Offset For a Factory Kind.
	pub(crate) fn factory_offset(&self, kind: EntryKind) -> Option<u32> {
		self.factories.iter()
			.find_map(|&(id, off)| (id == kind.tag()).then_some(off))
	}
}



#[derive(Debug)]
/// # One Open Snapshot.
struct State {
	/// # The Image.
	image: Arc<Image>,

	/// # File Path (`None` For the Synthesized Empty Database).
	path: Option<PathBuf>,

	/// # File Mtime At Open.
	mtime_ms: i64,

	/// # Parsed Header.
	header: Header,

	/// # Directories to Watch, With Baseline Stamps.
	watch_dirs: Vec<(String, i64)>,

	/// # The Factories.
	factories: Factories,
}

impl State {
	/// # Open the Best Available Database.
	///
	/// Prefers the user-scope file, falls back to the global one, and
	/// reports `Ok(None)` when neither exists. Version and corruption
	/// problems bubble up so the caller can regenerate.
	fn open(ctx: &SycocaContext, strategy: Strategy) -> Result<Option<Self>, SycocaError> {
		let user_path = ctx.cache_file_path();
		let (path, global) =
			if user_path.is_file() { (user_path, false) }
			else {
				match ctx.global_cache_path().filter(|p| p.is_file()) {
					Some(p) => (p, true),
					None => return Ok(None),
				}
			};

		let mtime_ms = utility::mtime_ms(&path);
		let image = Arc::new(
			load_image(&path, strategy).map_err(|_| SycocaError::Corrupt("unreadable file"))?
		);
		let header = Header::read(&image)?;
		let factories = Factories::open(&image, &header)?;

		// The global database knows nothing about the user's local
		// dirs; watch those too, with the build time as their baseline,
		// so anything created there triggers a local rebuild.
		let mut watch_dirs = header.dirs.clone();
		if global {
			for d in ctx.local_source_dirs() {
				watch_dirs.push((d.to_string_lossy().into_owned(), header.timestamp_ms));
			}
		}

		Ok(Some(Self {
			image,
			path: Some(path),
			mtime_ms,
			header,
			watch_dirs,
			factories,
		}))
	}

	/// # Synthesize the Empty Database.
	///
	/// Enough of an image that every query cleanly answers "nothing":
	/// a valid header, no factories.
	fn dummy() -> Self {
		let mut w = ImageWriter::new();
		w.write_i32(crate::SYCOCA_VERSION);
		w.write_i32(0);
		w.write_i32(0); // Factory table terminator.
		w.write_string_list::<&str>(&[]);
		w.write_i64(0);
		w.write_string("");
		w.write_u32(0);
		w.write_i32(0);

		let image = Arc::new(Image::Heap(w.into_vec()));
		let header = Header::read(&image).unwrap_or_default();
		Self {
			image,
			path: None,
			mtime_ms: 0,
			header,
			watch_dirs: Vec::new(),
			factories: Factories::default(),
		}
	}

	/// # Is This the Synthesized Empty Database?
	const fn is_dummy(&self) -> bool { self.path.is_none() }

	/// # Any Watched Directory Newer Than Recorded?
	fn stale_dirs(&self) -> bool {
		self.watch_dirs.iter()
			.any(|(d, stamp)| utility::dir_newer_than(std::path::Path::new(d), *stamp))
	}
}

/// # Load the Raw Bytes.
fn load_image(path: &std::path::Path, strategy: Strategy) -> std::io::Result<Image> {
	if strategy == Strategy::Mmap {
		let file = std::fs::File::open(path)?;
		#[allow(unsafe_code, reason = "No safe mmap exists.")]
		// Safety: the map is read-only, and writers only ever replace
		// the file via rename, never truncate it in place.
		let map = unsafe { memmap2::Mmap::map(&file) };
		if let Ok(map) = map {
			let _res = map.advise(memmap2::Advice::Sequential);
			let _res = map.advise(memmap2::Advice::WillNeed);
			return Ok(Image::Mmap(map));
		}
	}
	std::fs::read(path).map(Image::Heap)
}



#[derive(Debug, Clone, PartialEq)]
/// # A Menu Group Member.
pub enum GroupEntry {
	/// # A Subgroup.
	Group(Arc<ServiceGroup>),

	/// # A Service.
	Service(Arc<Service>),
}



#[derive(Debug)]
/// # The Cache Reader.
///
/// One per thread; there is no locking anywhere on the query path.
/// Obtain a shared one through [`Sycoca::with`], or construct
/// explicitly with a custom [`SycocaContext`] (tests do).
///
/// Every query first runs the staleness protocol (throttled), so
/// results always come from a reasonably fresh snapshot; entry handles
/// returned to the caller are refcounted and survive any later remap
/// or rebuild.
pub struct Sycoca {
	/// # Path Context.
	ctx: SycocaContext,

	/// # Mapping Strategy.
	strategy: Strategy,

	/// # Minimum Milliseconds Between Staleness Checks.
	ms_between_checks: u64,

	/// # Open Snapshot, If Any.
	state: Option<State>,

	/// # Last Staleness Check.
	last_check: Option<Instant>,
}

thread_local! {
	/// # Per-Thread Shared Reader.
	static LOCAL: RefCell<Option<Sycoca>> = const { RefCell::new(None) };
}

impl Sycoca {
	#[must_use]
	/// # New Reader.
	///
	/// Nothing is opened until the first query (or an explicit
	/// [`Sycoca::ensure_cache_valid`]).
	pub const fn new(ctx: SycocaContext) -> Self {
		Self {
			ctx,
			strategy: Strategy::Mmap,
			ms_between_checks: crate::MS_BETWEEN_CHECKS,
			state: None,
			last_check: None,
		}
	}

	#[must_use]
	/// # Set the Mapping Strategy.
	pub const fn with_strategy(mut self, strategy: Strategy) -> Self {
		self.strategy = strategy;
		self
	}

	/// # Set the Staleness-Check Throttle (Milliseconds).
	///
	/// Zero disables the throttle entirely.
	pub fn set_check_interval(&mut self, ms: u64) {
		self.ms_between_checks = ms;
	}

	/// # Run Against the Calling Thread's Shared Reader.
	///
	/// The reader is created (from the real environment) on first use
	/// and lives as long as the thread.
	pub fn with<F, R>(f: F) -> R
	where F: FnOnce(&mut Self) -> R {
		LOCAL.with(|cell| {
			let mut cell = cell.borrow_mut();
			let sycoca = cell.get_or_insert_with(|| Self::new(SycocaContext::from_env()));
			f(sycoca)
		})
	}

	#[must_use]
	/// # Context.
	pub const fn context(&self) -> &SycocaContext { &self.ctx }

	/// # Is a Real Database Available?
	///
	/// Opens (without rebuilding) if necessary.
	pub fn is_available(&mut self) -> bool {
		self.check_database(false)
	}

	/// # Staleness Check.
	///
	/// Rate-limited: between checks the current snapshot is trusted
	/// as-is. When the check does run, a replaced file causes a remap
	/// on next use, and newer source directories cause an in-process
	/// rebuild.
	pub fn ensure_cache_valid(&mut self) {
		let (dummy, path, mtime_ms) = match &self.state {
			None => {
				self.check_database(true);
				return;
			},
			Some(s) => (s.is_dummy(), s.path.clone().unwrap_or_default(), s.mtime_ms),
		};

		// The dummy stands in for "no database yet"; look for a real
		// one each time.
		if dummy {
			self.close();
			self.check_database(true);
			return;
		}

		// Throttle.
		if 0 < self.ms_between_checks {
			if let Some(last) = self.last_check {
				if (last.elapsed().as_millis() as u64) < self.ms_between_checks { return; }
			}
		}
		self.last_check = Some(Instant::now());

		if utility::mtime_ms(&path) == mtime_ms {
			// Same file; are the sources newer than it knows?
			if self.state.as_ref().is_some_and(State::stale_dirs) {
				self.rebuild();
				self.close();
				self.check_database(true);
			}
		}
		else {
			// Another process installed a new file. Drop everything;
			// the next call remaps.
			self.close();
		}
	}

	/// # Forced Invalidation.
	///
	/// The file-watcher notification path: bypasses the throttle and
	/// drops the current snapshot immediately.
	pub fn notify_database_changed(&mut self) {
		self.last_check = None;
		self.close();
	}

	/// # Does the Cache Need a Rebuild?
	#[must_use]
	pub fn needs_rebuild(&mut self) -> bool {
		if ! self.check_database(false) { return false; }
		self.state.as_ref().is_some_and(State::stale_dirs)
	}

	/// # Close the Current Snapshot.
	///
	/// Outstanding entry handles (and the mapped bytes backing other
	/// holders) stay alive; only this reader forgets them.
	pub fn close(&mut self) {
		self.state = None;
	}
}

/// # Header Accessors.
impl Sycoca {
	/// # Build Timestamp (Ms Since the Epoch).
	pub fn timestamp_ms(&mut self) -> i64 {
		self.header(|h| h.timestamp_ms)
	}

	/// # Build Language.
	pub fn language(&mut self) -> String {
		self.header(|h| h.language.clone())
	}

	/// # Update Signature.
	pub fn update_signature(&mut self) -> u32 {
		self.header(|h| h.signature)
	}

	/// # All Watched Resource Directories.
	pub fn all_resource_dirs(&mut self) -> Vec<String> {
		self.header(|h| h.dirs.iter().map(|(d, _)| d.clone()).collect())
	}

	/// # Read Something From the Header.
	fn header<R: Default>(&mut self, f: impl FnOnce(&Header) -> R) -> R {
		if ! self.check_database(false) { return R::default(); }
		self.state.as_ref().map_or_else(R::default, |s| f(&s.header))
	}
}

/// # Queries.
impl Sycoca {
	/// # Service By (Complete Base) Name.
	pub fn service_by_name(&mut self, name: &str) -> Option<Arc<Service>> {
		self.run_query(|state, _| {
			state.factories.services()
				.map_or(Ok(None), |f| f.find_by_key(name))
		})
	}

	/// # Service By Entry Path.
	pub fn service_by_entry_path(&mut self, path: &str) -> Option<Arc<Service>> {
		self.run_query(|state, _| {
			state.factories.services()
				.map_or(Ok(None), |f| f.find_by_key(path))
		})
	}

	/// # Service By Menu Id.
	///
	/// Exact matches only; the full file name (with extension) is part
	/// of the id.
	pub fn service_by_menu_id(&mut self, menu_id: &str) -> Option<Arc<Service>> {
		self.run_query(|state, _| {
			let Some(f) = state.factories.services() else { return Ok(None); };
			Ok(f.find_by_key(menu_id)?.filter(|s| s.menu_id() == menu_id))
		})
	}

	/// # Service By Storage Id.
	///
	/// Forgiving about the extension: `org.kde.konsole` finds
	/// `org.kde.konsole.desktop`.
	pub fn service_by_storage_id(&mut self, storage_id: &str) -> Option<Arc<Service>> {
		self.run_query(|state, _| {
			let Some(f) = state.factories.services() else { return Ok(None); };
			if let Some(out) = f.find_by_key(storage_id)? { return Ok(Some(out)); }
			f.find_by_key(&format!("{storage_id}{}", crate::DESKTOP_EXT))
		})
	}

	/// # Service By Image Offset.
	pub fn service_by_offset(&mut self, offset: u32) -> Option<Arc<Service>> {
		self.run_query(|state, _| {
			state.factories.services()
				.map_or(Ok(None), |f| f.by_offset(offset).map(Some))
		})
	}

	/// # All Services.
	pub fn all_services(&mut self) -> ServiceList {
		self.run_query(|state, _| {
			state.factories.services().map_or_else(|| Ok(Vec::new()), |f| f.all())
		})
	}

	/// # Service Type By Name.
	pub fn service_type(&mut self, name: &str) -> Option<Arc<ServiceType>> {
		self.run_query(|state, _| {
			state.factories.service_types()
				.map_or(Ok(None), |f| f.find_by_key(name))
		})
	}

	/// # All Service Types.
	pub fn all_service_types(&mut self) -> Vec<Arc<ServiceType>> {
		self.run_query(|state, _| {
			state.factories.service_types().map_or_else(|| Ok(Vec::new()), |f| f.all())
		})
	}

	/// # Mime Type By Name.
	pub fn mime_type(&mut self, name: &str) -> Option<Arc<MimeType>> {
		self.run_query(|state, _| {
			state.factories.mime_types()
				.map_or(Ok(None), |f| f.find_by_key(name))
		})
	}

	/// # Does a Service Implement a Type (Inheritance-Aware)?
	pub fn has_service_type(&mut self, service: &Service, service_type: &str) -> bool {
		self.run_query(|state, _| {
			crate::trader::has_service_type(&state.factories, service, service_type)
		})
	}

	/// # Trader Query.
	///
	/// Offers for the service type: profile-adjusted, constraint-
	/// filtered, preference-ordered. Malformed constraints and unknown
	/// types both yield empty lists.
	pub fn query(&mut self, service_type: &str, constraint: Option<&str>) -> ServiceList {
		self.run_query(|state, ctx| {
			crate::trader::query_service_type(&state.factories, ctx, service_type, constraint, true)
		})
	}

	/// # Trader Query, Un-Profiled.
	///
	/// The computed default ordering, with user-disabled services
	/// still present.
	pub fn default_offers(&mut self, service_type: &str) -> ServiceList {
		self.run_query(|state, ctx| {
			crate::trader::query_service_type(&state.factories, ctx, service_type, None, false)
		})
	}

	/// # Trader Query Over a Mime Type.
	pub fn query_mime(&mut self, mime: &str, constraint: Option<&str>) -> ServiceList {
		self.run_query(|state, ctx| {
			crate::trader::query_mime(&state.factories, ctx, mime, constraint)
		})
	}

	/// # Root Menu Group.
	pub fn root_group(&mut self) -> Option<Arc<ServiceGroup>> {
		self.group("/")
	}

	/// # Menu Group By Path.
	pub fn group(&mut self, path: &str) -> Option<Arc<ServiceGroup>> {
		self.run_query(|state, _| {
			state.factories.groups()
				.map_or(Ok(None), |f| f.find_by_key(path))
		})
	}

	/// # A Group's Members.
	///
	/// Children are stored as bare offsets; the type tag at each one
	/// decides whether it materializes as a subgroup or a service.
	pub fn group_entries(&mut self, group: &ServiceGroup) -> Vec<GroupEntry> {
		let offsets = group.child_offsets().to_vec();
		self.run_query(move |state, _| {
			let mut out = Vec::with_capacity(offsets.len());
			for &off in &offsets {
				let mut r = ImageReader::new(&state.image);
				r.seek(off);
				match EntryKind::from_tag(r.read_i32()?) {
					Some(EntryKind::ServiceGroup) =>
						if let Some(f) = state.factories.groups() {
							out.push(GroupEntry::Group(f.by_offset(off)?));
						},
					Some(EntryKind::Service) =>
						if let Some(f) = state.factories.services() {
							out.push(GroupEntry::Service(f.by_offset(off)?));
						},
					_ => return Err(SycocaError::Corrupt("foreign child in group")),
				}
			}
			Ok(out)
		})
	}
}

/// # Plumbing.
impl Sycoca {
	/// # Ensure Freshness, Run, Recover Once on Corruption.
	///
	/// The read path never surfaces an error: a failing query deletes
	/// the database, rebuilds it in-process, and retries exactly once;
	/// a second failure reads as empty.
	fn run_query<R, F>(&mut self, f: F) -> R
	where
		R: Default,
		F: Fn(&State, &SycocaContext) -> Result<R, SycocaError>,
	{
		self.ensure_cache_valid();
		if ! self.check_database(true) { return R::default(); }

		if let Some(state) = &self.state {
			match f(state, &self.ctx) {
				Ok(out) => return out,
				Err(_) => {
					fyi_msg::Msg::warning("Sycoca database corruption, rebuilding.").eprint();
				},
			}
		}

		// Recovery: scorch the file and regenerate.
		if self.recover() {
			if let Some(state) = &self.state {
				if let Ok(out) = f(state, &self.ctx) { return out; }
			}
		}
		R::default()
	}

	/// # Open a Database (Maybe Building One).
	///
	/// Returns `true` when a real (non-dummy) database is open
	/// afterwards.
	fn check_database(&mut self, recreate: bool) -> bool {
		if let Some(state) = &self.state {
			if ! state.is_dummy() { return true; }
			if ! recreate { return false; }
			self.close();
		}

		match State::open(&self.ctx, self.strategy) {
			Ok(Some(state)) => {
				self.state = Some(state);
				self.last_check = Some(Instant::now());

				// Make sure what we just opened isn't already stale.
				if recreate && self.state.as_ref().is_some_and(State::stale_dirs) {
					self.rebuild();
					if let Ok(Some(fresh)) = State::open(&self.ctx, self.strategy) {
						self.state = Some(fresh);
					}
				}
				true
			},
			Ok(None) =>
				if recreate && self.rebuild() {
					match State::open(&self.ctx, self.strategy) {
						Ok(Some(state)) => {
							self.state = Some(state);
							true
						},
						_ => {
							self.state = Some(State::dummy());
							false
						},
					}
				}
				else {
					self.state = Some(State::dummy());
					false
				},
			// Wrong version or corrupt: recovery is deletion.
			Err(_) => {
				let _res = std::fs::remove_file(self.ctx.cache_file_path());
				if recreate { self.recover() }
				else {
					self.state = Some(State::dummy());
					false
				}
			},
		}
	}

	/// # Rebuild In-Process.
	fn rebuild(&self) -> bool {
		CacheBuilder::new(self.ctx.clone()).recreate().is_ok()
	}

	/// # Delete, Rebuild, Reopen.
	fn recover(&mut self) -> bool {
		self.close();
		let _res = std::fs::remove_file(self.ctx.cache_file_path());
		if ! self.rebuild() { return false; }
		match State::open(&self.ctx, self.strategy) {
			Ok(Some(state)) => {
				self.state = Some(state);
				true
			},
			_ => {
				self.state = Some(State::dummy());
				false
			},
		}
	}
}



#[cfg(test)]
mod test {
	use crate::ServiceTypeProfile;
	use std::path::Path;
	use super::*;

	/// # Write One Fixture File.
	fn put(path: &Path, raw: &str) {
		if let Some(dir) = path.parent() {
			std::fs::create_dir_all(dir).expect("Unable to create fixture dir.");
		}
		std::fs::write(path, raw).expect("Unable to write fixture.");
	}

	/// # Seed a Full Fixture Tree.
	///
	/// The classic cast: three service types (one derived), five
	/// plugin services, and one application with actions.
	fn seed(dir: &Path) -> SycocaContext {
		let sys = dir.join("system/share");
		let user = dir.join("home/share");
		std::fs::create_dir_all(&sys).expect("Unable to create system dir.");

		let st = user.join(crate::DIR_SERVICE_TYPES);
		put(&st.join("fakeplugintype.desktop"), "\
[Desktop Entry]
Comment=Fake Text Plugin
Type=ServiceType
X-KDE-ServiceType=FakePluginType

[PropertyDef::X-KDE-Version]
Type=double
");
		put(&st.join("fakebasepart.desktop"), "\
[Desktop Entry]
Comment=Fake Base Part
Type=ServiceType
X-KDE-ServiceType=FakeBasePart

[PropertyDef::X-KDE-TestList]
Type=stringlist
");
		put(&st.join("fakederivedpart.desktop"), "\
[Desktop Entry]
Comment=Fake Derived Part
Type=ServiceType
X-KDE-ServiceType=FakeDerivedPart
X-KDE-Derived=FakeBasePart
");

		let sv = user.join(crate::DIR_SERVICES);
		put(&sv.join("fakeservice.desktop"), "\
[Desktop Entry]
Name=FakePlugin
Type=Service
X-KDE-Library=fakeservice
X-KDE-Version=4.56
ServiceTypes=FakePluginType
MimeType=text/plain;
");
		put(&sv.join("faketextplugin.desktop"), "\
[Desktop Entry]
Name=FakeTextPlugin
Type=Service
X-KDE-Library=faketextplugin
X-KDE-ServiceTypes=FakePluginType
MimeType=text/plain;
");
		put(&sv.join("fakepart.desktop"), "\
[Desktop Entry]
Name=FakePart
Type=Service
X-KDE-Library=fakepart
X-KDE-Protocols=http,ftp
X-KDE-ServiceTypes=FakeBasePart,FakeDerivedPart
MimeType=text/plain;text/html;
X-KDE-FormFactors=tablet,handset
InitialPreference=5
");
		put(&sv.join("fakepart2.desktop"), "\
[Desktop Entry]
Name=FakePart2
Type=Service
X-KDE-Library=fakepart2
X-KDE-ServiceTypes=FakeBasePart
MimeType=text/plain;
X-KDE-TestList=item1;item2
InitialPreference=1
");
		put(&sv.join("preferredpart.desktop"), "\
[Desktop Entry]
Name=PreferredPart
Type=Service
X-KDE-Library=preferredpart
X-KDE-ServiceTypes=FakeBasePart
MimeType=text/plain;
InitialPreference=9
");
		put(&sv.join("otherpart.desktop"), "\
[Desktop Entry]
Name=OtherPart
Type=Service
X-KDE-Library=otherpart
X-KDE-ServiceTypes=FakeBasePart
MimeType=text/plain;
InitialPreference=3
");

		let apps = user.join(crate::DIR_APPLICATIONS);
		put(&apps.join("org.fake.konsole.desktop"), "\
[Desktop Entry]
Name=Konsole
Type=Application
Exec=konsole
X-DBUS-ServiceType=Unique
InitialPreference=9

[Desktop Action NewTab]
Name=Open a New Tab
Exec=konsole --new-tab
");
		put(&apps.join("utils/org.fake.kcalc.desktop"), "\
[Desktop Entry]
Name=KCalc
Type=Application
Exec=kcalc
");

		SycocaContext::new(
			vec![sys, user],
			dir.join("home/cache"),
			dir.join("home/config"),
		)
	}

	/// # Build the Cache For a Context.
	fn build(ctx: &SycocaContext) {
		assert_eq!(
			crate::CacheBuilder::new(ctx.clone()).recreate(),
			Ok(true),
			"The build should have written a fresh database.",
		);
	}

	/// # A Throttle-Free Reader.
	fn reader(ctx: &SycocaContext) -> Sycoca {
		let mut out = Sycoca::new(ctx.clone());
		out.set_check_interval(0);
		out
	}

	#[test]
	fn t_lookups() {
		let dir = tempfile::TempDir::new().expect("Unable to create temp dir.");
		let ctx = seed(dir.path());
		build(&ctx);
		let mut sycoca = reader(&ctx);
		assert!(sycoca.is_available(), "Database should be available.");

		// By name.
		let st = sycoca.service_type("FakeBasePart").expect("Missing FakeBasePart.");
		assert_eq!(st.name(), "FakeBasePart");
		let part = sycoca.service_by_entry_path("fakepart.desktop").expect("Missing fakepart.");
		assert_eq!(part.display_name(), "FakePart");
		assert_eq!(part.mime_types(), ["text/plain", "text/html"]);

		// Unknowns are simply absent.
		assert!(sycoca.service_by_name("nonesuch").is_none());
		assert!(sycoca.service_type("Nonesuch").is_none());

		// Storage ids are extension-forgiving; menu ids are not.
		assert!(sycoca.service_by_storage_id("org.fake.konsole.desktop").is_some());
		assert!(sycoca.service_by_storage_id("org.fake.konsole").is_some());
		assert!(sycoca.service_by_menu_id("org.fake.konsole.desktop").is_some());
		assert!(sycoca.service_by_menu_id("org.fake.konsole").is_none());
		assert!(sycoca.service_by_menu_id("konsole.desktop").is_none());

		// The application picked up its extras.
		let konsole = sycoca.service_by_menu_id("org.fake.konsole.desktop")
			.expect("Missing konsole.");
		assert!(konsole.is_application());
		assert_eq!(konsole.dbus_startup_type(), crate::DBusStartupType::Unique);
		assert_eq!(konsole.actions().len(), 1);
		assert_eq!(konsole.actions()[0].exec(), "konsole --new-tab");

		// Header bits.
		assert!(0 < sycoca.timestamp_ms(), "The header should carry a build time.");
		assert_eq!(sycoca.language(), "en");
		assert!(! sycoca.all_resource_dirs().is_empty());
	}

	#[test]
	fn t_offset_identity() {
		// Every entry must resolve back to itself by offset, and every
		// claimed service type must actually exist.
		let dir = tempfile::TempDir::new().expect("Unable to create temp dir.");
		let ctx = seed(dir.path());
		build(&ctx);
		let mut sycoca = reader(&ctx);

		let all = sycoca.all_services();
		assert_eq!(all.len(), 8);
		let all_types: Vec<String> = sycoca.all_service_types()
			.iter()
			.map(|st| st.name().to_owned())
			.collect();
		assert_eq!(all_types.len(), 3);

		for s in &all {
			let again = sycoca.service_by_offset(s.offset()).expect("Offset lookup failed.");
			assert_eq!(again.name(), s.name());
			assert_eq!(again.entry_path(), s.entry_path());

			for claimed in s.service_types() {
				assert!(
					all_types.iter().any(|t| t == claimed),
					"{} claims unknown type {claimed}.",
					s.name(),
				);
			}

			// And the dictionary agrees with itself.
			let by_name = sycoca.service_by_entry_path(s.entry_path())
				.expect("Path lookup failed.");
			assert_eq!(by_name.offset(), s.offset());
		}
	}

	#[test]
	fn t_trader() {
		let dir = tempfile::TempDir::new().expect("Unable to create temp dir.");
		let ctx = seed(dir.path());
		build(&ctx);
		let mut sycoca = reader(&ctx);

		// Baseline: no constraint.
		let offers = sycoca.query("FakePluginType", None);
		assert_eq!(offers.len(), 2);
		let has = |offers: &ServiceList, path: &str|
			offers.iter().filter(|s| s.entry_path() == path).count() == 1;
		assert!(has(&offers, "fakeservice.desktop"));
		assert!(has(&offers, "faketextplugin.desktop"));

		// String equality.
		let offers = sycoca.query("FakePluginType", Some("Library == 'faketextplugin'"));
		assert_eq!(offers.len(), 1);
		assert!(has(&offers, "faketextplugin.desktop"));

		// Case-insensitive equality.
		let offers = sycoca.query("FakePluginType", Some("Library =~ 'fAkEteXtpLuGin'"));
		assert_eq!(offers.len(), 1);
		assert!(has(&offers, "faketextplugin.desktop"));

		// Containment reads left-in-right.
		let offers = sycoca.query("FakePluginType", Some("'textplugin' ~ Library"));
		assert_eq!(offers.len(), 1);
		assert!(has(&offers, "faketextplugin.desktop"));

		let offers = sycoca.query("FakePluginType", Some("'teXtPluGin' ~~ Library"));
		assert_eq!(offers.len(), 1);
		assert!(has(&offers, "faketextplugin.desktop"));

		// Subsequences.
		let offers = sycoca.query("FakePluginType", Some("'txtlug' subseq Library"));
		assert_eq!(offers.len(), 1);
		assert!(has(&offers, "faketextplugin.desktop"));

		let offers = sycoca.query("FakePluginType", Some("'tXtLuG' ~subseq Library"));
		assert_eq!(offers.len(), 1);
		assert!(has(&offers, "faketextplugin.desktop"));

		// Floats parse with a dot, whatever the locale.
		let offers = sycoca.query(
			"FakePluginType",
			Some("([X-KDE-Version] > 4.559) and ([X-KDE-Version] < 4.561)"),
		);
		assert_eq!(offers.len(), 1);
		assert!(has(&offers, "fakeservice.desktop"));

		// Garbage in, empty out.
		let offers = sycoca.query(
			"FakePluginType",
			Some("A == B OR C == D AND OR Foo == 'Parse Error'"),
		);
		assert!(offers.is_empty());

		// Unknown type, empty out.
		assert!(sycoca.query("Nonesuch", None).is_empty());
	}

	#[test]
	fn t_trader_ordering() {
		let dir = tempfile::TempDir::new().expect("Unable to create temp dir.");
		let ctx = seed(dir.path());
		build(&ctx);
		let mut sycoca = reader(&ctx);

		// All four base-part services, best preference first, and the
		// derived claimant (fakepart) listed exactly once.
		let offers = sycoca.query("FakeBasePart", None);
		let paths: Vec<&str> = offers.iter().map(|s| s.entry_path()).collect();
		assert_eq!(paths, [
			"preferredpart.desktop",
			"fakepart.desktop",
			"otherpart.desktop",
			"fakepart2.desktop",
		]);

		// Derived types inherit nothing downward: the derived query
		// only sees its own claimants.
		let offers = sycoca.query("FakeDerivedPart", None);
		let paths: Vec<&str> = offers.iter().map(|s| s.entry_path()).collect();
		assert_eq!(paths, ["fakepart.desktop"]);

		// Mime-keyed offers work the same way.
		let offers = sycoca.query_mime("text/html", None);
		let paths: Vec<&str> = offers.iter().map(|s| s.entry_path()).collect();
		assert_eq!(paths, ["fakepart.desktop"]);
		assert_eq!(sycoca.query_mime("text/plain", None).len(), 6);
		assert!(sycoca.query_mime("audio/x-nope", None).is_empty());

		// Ranking forms reorder rather than filter.
		let offers = sycoca.query("FakeBasePart", Some("max InitialPreference"));
		assert_eq!(offers.len(), 4);
		assert_eq!(offers[0].entry_path(), "preferredpart.desktop");
		let offers = sycoca.query("FakeBasePart", Some("min InitialPreference"));
		assert_eq!(offers[0].entry_path(), "fakepart2.desktop");
	}

	#[test]
	fn t_has_service_type() {
		let dir = tempfile::TempDir::new().expect("Unable to create temp dir.");
		let ctx = seed(dir.path());
		build(&ctx);
		let mut sycoca = reader(&ctx);

		let fakepart = sycoca.service_by_entry_path("fakepart.desktop").expect("Missing fakepart.");
		assert!(sycoca.has_service_type(&fakepart, "FakeBasePart"));
		assert!(sycoca.has_service_type(&fakepart, "FakeDerivedPart"));

		let faketextplugin = sycoca.service_by_entry_path("faketextplugin.desktop")
			.expect("Missing faketextplugin.");
		assert!(sycoca.has_service_type(&faketextplugin, "FakePluginType"));
		assert!(! sycoca.has_service_type(&faketextplugin, "FakeBasePart"));

		// fakepart2 claims only the base, so the derived type is out.
		let fakepart2 = sycoca.service_by_entry_path("fakepart2.desktop").expect("Missing fakepart2.");
		assert!(sycoca.has_service_type(&fakepart2, "FakeBasePart"));
		assert!(! sycoca.has_service_type(&fakepart2, "FakeDerivedPart"));
	}

	#[test]
	fn t_profiles() {
		let dir = tempfile::TempDir::new().expect("Unable to create temp dir.");
		let ctx = seed(dir.path());
		build(&ctx);
		let mut sycoca = reader(&ctx);

		let first_default = sycoca.query("FakeBasePart", None)[0].entry_path().to_owned();

		// Prefer two, disable one.
		let preferred = vec![
			sycoca.service_by_entry_path("otherpart.desktop").expect("Missing otherpart."),
			sycoca.service_by_entry_path("fakepart.desktop").expect("Missing fakepart."),
		];
		let disabled = vec![
			sycoca.service_by_entry_path("fakepart2.desktop").expect("Missing fakepart2."),
		];
		ServiceTypeProfile::write(&ctx, "FakeBasePart", &preferred, &disabled)
			.expect("Unable to write profile.");
		assert!(ServiceTypeProfile::exists(&ctx, "FakeBasePart"));

		let offers = sycoca.query("FakeBasePart", None);
		let paths: Vec<&str> = offers.iter().map(|s| s.entry_path()).collect();
		assert_eq!(paths, [
			"otherpart.desktop",
			"fakepart.desktop",
			"preferredpart.desktop",
		]);

		// The un-profiled view still has everything, original order.
		let defaults = sycoca.default_offers("FakeBasePart");
		assert_eq!(defaults.len(), 4);
		assert_eq!(defaults[0].entry_path(), first_default);
		assert!(defaults.iter().any(|s| s.entry_path() == "fakepart2.desktop"));

		// Deleting restores the default query too.
		ServiceTypeProfile::delete(&ctx, "FakeBasePart").expect("Unable to delete profile.");
		assert!(! ServiceTypeProfile::exists(&ctx, "FakeBasePart"));
		let offers = sycoca.query("FakeBasePart", None);
		assert_eq!(offers.len(), 4);
		assert_eq!(offers[0].entry_path(), first_default);
	}

	#[test]
	fn t_deleting_service() {
		let dir = tempfile::TempDir::new().expect("Unable to create temp dir.");
		let ctx = seed(dir.path());
		let doomed = dir.path()
			.join("home/share")
			.join(crate::DIR_SERVICES)
			.join("fakeservice_deleteme.desktop");
		put(&doomed, "\
[Desktop Entry]
Name=FakePlugin
Type=Service
X-KDE-Library=fakeservice
ServiceTypes=FakePluginType
");
		build(&ctx);

		let mut sycoca = reader(&ctx);
		let held = sycoca.service_by_entry_path("fakeservice_deleteme.desktop")
			.expect("Missing doomed service.");

		// Delete and rebuild, as another process would.
		std::fs::remove_file(&doomed).expect("Unable to delete fixture.");
		std::thread::sleep(std::time::Duration::from_millis(25));
		assert_eq!(
			crate::CacheBuilder::new(ctx.clone()).recreate(),
			Ok(true),
			"The rebuild should have written a fresh database.",
		);

		// The reader notices on its next (unthrottled) check.
		assert!(sycoca.service_by_entry_path("fakeservice_deleteme.desktop").is_none());

		// The whole point of refcounting: the held handle is fine.
		assert_eq!(held.name(), "fakeservice_deleteme");
		assert_eq!(held.library(), "fakeservice");
	}

	#[test]
	fn t_staleness() {
		let dir = tempfile::TempDir::new().expect("Unable to create temp dir.");
		let ctx = seed(dir.path());
		build(&ctx);
		let mut sycoca = reader(&ctx);
		assert!(sycoca.service_by_entry_path("latecomer.desktop").is_none());
		assert!(! sycoca.needs_rebuild());

		// Drop a new service into a watched directory.
		std::thread::sleep(std::time::Duration::from_millis(25));
		put(
			&dir.path().join("home/share").join(crate::DIR_SERVICES).join("latecomer.desktop"),
			"[Desktop Entry]\nName=Latecomer\nType=Service\nX-KDE-ServiceTypes=FakePluginType\n",
		);

		// The next check spots the newer dir and rebuilds in-process.
		sycoca.ensure_cache_valid();
		assert!(
			sycoca.service_by_entry_path("latecomer.desktop").is_some(),
			"The new service should appear after revalidation.",
		);
		assert_eq!(sycoca.query("FakePluginType", None).len(), 3);
	}

	#[test]
	fn t_menu_groups() {
		let dir = tempfile::TempDir::new().expect("Unable to create temp dir.");
		let ctx = seed(dir.path());
		build(&ctx);
		let mut sycoca = reader(&ctx);

		let root = sycoca.root_group().expect("Missing root group.");
		assert_eq!(root.path(), "/");
		let entries = sycoca.group_entries(&root);
		assert_eq!(entries.len(), 2); // utils/ and konsole.

		let mut seen_group = false;
		let mut seen_service = false;
		for e in entries {
			match e {
				GroupEntry::Group(g) => {
					assert_eq!(g.path(), "utils/");
					assert_eq!(g.caption(), "utils");
					seen_group = true;

					let inner = sycoca.group_entries(&g);
					assert_eq!(inner.len(), 1);
					let GroupEntry::Service(s) = &inner[0] else {
						panic!("Expected a service in utils/.");
					};
					assert_eq!(s.menu_id(), "utils-org.fake.kcalc.desktop");
				},
				GroupEntry::Service(s) => {
					assert_eq!(s.menu_id(), "org.fake.konsole.desktop");
					seen_service = true;
				},
			}
		}
		assert!(seen_group, "Missing the utils/ subgroup.");
		assert!(seen_service, "Missing the root-level application.");
	}

	#[test]
	fn t_overlay_precedence() {
		let dir = tempfile::TempDir::new().expect("Unable to create temp dir.");
		let ctx = seed(dir.path());

		// A system-level copy of otherpart that the user copy must
		// shadow, plus a system-only service the user hides.
		let sys_sv = dir.path().join("system/share").join(crate::DIR_SERVICES);
		put(&sys_sv.join("otherpart.desktop"), "\
[Desktop Entry]
Name=SystemOtherPart
Type=Service
X-KDE-Library=otherpart-system
X-KDE-ServiceTypes=FakeBasePart
");
		put(&sys_sv.join("doomed.desktop"), "\
[Desktop Entry]
Name=Doomed
Type=Service
X-KDE-ServiceTypes=FakeBasePart
");
		put(
			&dir.path().join("home/share").join(crate::DIR_SERVICES).join("doomed.desktop"),
			"[Desktop Entry]\nName=Doomed\nType=Service\nHidden=true\n",
		);

		build(&ctx);
		let mut sycoca = reader(&ctx);

		// The user copy won.
		let other = sycoca.service_by_entry_path("otherpart.desktop").expect("Missing otherpart.");
		assert_eq!(other.display_name(), "OtherPart");
		assert_eq!(other.library(), "otherpart");

		// And the tombstone killed the system service.
		assert!(sycoca.service_by_entry_path("doomed.desktop").is_none());
	}

	#[test]
	fn t_idempotent_rebuild() {
		let dir = tempfile::TempDir::new().expect("Unable to create temp dir.");
		let ctx = seed(dir.path());
		build(&ctx);
		let path = ctx.cache_file_path();
		let first = std::fs::read(&path).expect("Unable to read database.");

		// Unchanged inputs: the incremental path is a no-op.
		assert_eq!(
			crate::CacheBuilder::new(ctx.clone()).recreate(),
			Ok(false),
			"Nothing changed; nothing should rebuild.",
		);

		// A forced rebuild may only differ in the timestamp field.
		std::thread::sleep(std::time::Duration::from_millis(5));
		assert_eq!(
			crate::CacheBuilder::new(ctx.clone()).with_incremental(false).recreate(),
			Ok(true),
			"The forced rebuild should have written a fresh database.",
		);
		let second = std::fs::read(&path).expect("Unable to read database.");
		assert_eq!(first.len(), second.len(), "Rebuild changed the layout.");

		let diffs: Vec<usize> = first.iter()
			.zip(second.iter())
			.enumerate()
			.filter_map(|(idx, (a, b))| (a != b).then_some(idx))
			.collect();
		assert!(diffs.len() <= 8, "Too many differing bytes: {}.", diffs.len());
		if let (Some(&lo), Some(&hi)) = (diffs.first(), diffs.last()) {
			assert!(hi - lo < 8, "Differences outside the timestamp field.");
		}
	}

	#[test]
	fn t_version_mismatch() {
		let dir = tempfile::TempDir::new().expect("Unable to create temp dir.");
		let ctx = seed(dir.path());

		// Plant a file from the "previous generation".
		let path = ctx.cache_file_path();
		std::fs::create_dir_all(path.parent().expect("Missing cache dir."))
			.expect("Unable to create cache dir.");
		let mut w = ImageWriter::new();
		w.write_i32(crate::SYCOCA_VERSION - 1);
		w.write_i32(0);
		std::fs::write(&path, w.into_vec()).expect("Unable to write stale database.");

		// The reader regenerates without complaint.
		let mut sycoca = reader(&ctx);
		assert!(sycoca.service_by_entry_path("fakepart.desktop").is_some());
	}

	#[test]
	fn t_corruption_recovery() {
		let dir = tempfile::TempDir::new().expect("Unable to create temp dir.");
		let ctx = seed(dir.path());
		build(&ctx);

		// Mangle the file: right version, garbage after.
		let path = ctx.cache_file_path();
		let mut raw = std::fs::read(&path).expect("Unable to read database.");
		raw.truncate(40);
		std::fs::write(&path, raw).expect("Unable to corrupt database.");

		// One recovery cycle later, everything works.
		let mut sycoca = reader(&ctx);
		assert!(sycoca.service_by_entry_path("fakepart.desktop").is_some());
		assert_eq!(sycoca.query("FakePluginType", None).len(), 2);
	}

	#[test]
	fn t_isolation() {
		// Two contexts with different data dirs must not share state.
		let dir = tempfile::TempDir::new().expect("Unable to create temp dir.");
		let ctx_a = seed(&dir.path().join("a"));
		let ctx_b = SycocaContext::new(
			vec![dir.path().join("b/share")],
			dir.path().join("b/cache"),
			dir.path().join("b/config"),
		);
		put(
			&dir.path().join("b/share").join(crate::DIR_SERVICES).join("only-b.desktop"),
			"[Desktop Entry]\nName=OnlyB\nType=Service\n",
		);

		assert_ne!(ctx_a.cache_file_path(), ctx_b.cache_file_path());

		build(&ctx_a);
		build(&ctx_b);

		let mut a = reader(&ctx_a);
		let mut b = reader(&ctx_b);
		assert!(a.service_by_entry_path("fakepart.desktop").is_some());
		assert!(b.service_by_entry_path("fakepart.desktop").is_none());
		assert!(b.service_by_entry_path("only-b.desktop").is_some());

		// Scorching B's database leaves A untouched.
		std::fs::remove_file(ctx_b.cache_file_path()).expect("Unable to remove database.");
		assert!(a.service_by_entry_path("fakepart.desktop").is_some());
	}

	#[test]
	fn t_empty_world() {
		// No sources, no database: every query answers empty.
		let dir = tempfile::TempDir::new().expect("Unable to create temp dir.");
		let ctx = SycocaContext::new(
			vec![dir.path().join("nope/share")],
			dir.path().join("cache"),
			dir.path().join("config"),
		);

		let mut sycoca = reader(&ctx);
		assert!(sycoca.service_by_name("anything").is_none());
		assert!(sycoca.all_services().is_empty());
		assert!(sycoca.query("FakeBasePart", None).is_empty());
		assert!(sycoca.query_mime("text/plain", None).is_empty());
	}

	#[test]
	fn t_strategies() {
		// Every mapping strategy reads the same database.
		let dir = tempfile::TempDir::new().expect("Unable to create temp dir.");
		let ctx = seed(dir.path());
		build(&ctx);

		for strategy in [Strategy::Mmap, Strategy::Slurp, Strategy::File] {
			let mut sycoca = Sycoca::new(ctx.clone()).with_strategy(strategy);
			sycoca.set_check_interval(0);
			assert_eq!(
				sycoca.all_services().len(), 8,
				"Strategy {strategy:?} sees a different world.",
			);
		}

		assert_eq!(Strategy::from_config(""), Strategy::Mmap);
		assert_eq!(Strategy::from_config("sharedmem"), Strategy::Slurp);
		assert_eq!(Strategy::from_config("file"), Strategy::File);
	}
}
