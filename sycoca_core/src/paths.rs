/*!
# Sycoca: Paths and Environment
*/

use std::path::{
	Path,
	PathBuf,
};



#[derive(Debug, Clone)]
/// # Path Context.
///
/// A snapshot of everything the environment contributes: the ordered
/// data-dir search path, the cache and config roots, the language tag,
/// and the optional explicit cache-file override.
///
/// The default context reads the usual XDG variables once; tests build
/// explicit contexts instead so nothing global needs mutating. Two
/// contexts with different data dirs resolve to different cache files,
/// so processes with different search paths never share state.
pub struct SycocaContext {
	/// # Data Dirs, Ascending Precedence (User Dir Last).
	data_dirs: Vec<PathBuf>,

	/// # Cache Root.
	cache_dir: PathBuf,

	/// # User Config Root.
	config_dir: PathBuf,

	/// # Explicit Cache File Override.
	cache_override: Option<PathBuf>,

	/// # Language Tag ("en", "fr", …).
	language: String,
}

impl Default for SycocaContext {
	#[inline]
	fn default() -> Self { Self::from_env() }
}

impl SycocaContext {
	/// # From the Environment.
	///
	/// `XDG_DATA_DIRS` (colon-separated, descending precedence) plus
	/// `XDG_DATA_HOME` form the search path; `XDG_CACHE_HOME` and
	/// `XDG_CONFIG_HOME` locate the writable roots; `SYCOCA_PATH`
	/// pins the cache file explicitly.
	#[must_use]
	pub fn from_env() -> Self {
		let home = std::env::var_os("HOME").map_or_else(
			|| PathBuf::from("/"),
			PathBuf::from,
		);

		// System dirs arrive highest-first; we store ascending so the
		// user dir can simply go last.
		let mut data_dirs: Vec<PathBuf> = match std::env::var("XDG_DATA_DIRS") {
			Ok(raw) if ! raw.trim().is_empty() => raw.split(':')
				.map(str::trim)
				.filter(|s| ! s.is_empty())
				.rev()
				.map(PathBuf::from)
				.collect(),
			_ => vec![
				PathBuf::from("/usr/share"),
				PathBuf::from("/usr/local/share"),
			],
		};
		data_dirs.push(env_dir("XDG_DATA_HOME", || home.join(".local/share")));

		Self {
			data_dirs,
			cache_dir: env_dir("XDG_CACHE_HOME", || home.join(".cache")),
			config_dir: env_dir("XDG_CONFIG_HOME", || home.join(".config")),
			cache_override: std::env::var_os("SYCOCA_PATH")
				.filter(|v| ! v.is_empty())
				.map(PathBuf::from),
			language: language_from_env(),
		}
	}

	/// # Explicit Context.
	///
	/// Data dirs in ascending precedence, the last one being the
	/// user-writable dir. Used by tests and embedders that cannot rely
	/// on process environment.
	#[must_use]
	pub fn new<P>(data_dirs: Vec<PathBuf>, cache_dir: P, config_dir: P) -> Self
	where P: Into<PathBuf> {
		Self {
			data_dirs,
			cache_dir: cache_dir.into(),
			config_dir: config_dir.into(),
			cache_override: None,
			language: "en".to_owned(),
		}
	}

	#[must_use]
	/// # Data Dirs (Ascending Precedence).
	pub fn data_dirs(&self) -> &[PathBuf] { &self.data_dirs }

	#[must_use]
	/// # User Config Root.
	pub fn config_dir(&self) -> &Path { &self.config_dir }

	#[must_use]
	/// # Language Tag.
	pub fn language(&self) -> &str { &self.language }

	/// # Source Directories (Ascending Precedence).
	///
	/// The concrete directories the builder walks and the reader
	/// watches: each data dir crossed with the service-type, service,
	/// and application subtrees.
	pub(crate) fn source_dirs(&self) -> Vec<PathBuf> {
		let mut out = Vec::with_capacity(self.data_dirs.len() * 3);
		for base in &self.data_dirs {
			out.push(base.join(crate::DIR_SERVICE_TYPES));
			out.push(base.join(crate::DIR_SERVICES));
			out.push(base.join(crate::DIR_APPLICATIONS));
		}
		out
	}

	/// # User-Local Source Directories.
	///
	/// The subset of [`SycocaContext::source_dirs`] under the user data
	/// dir; watched separately when reads fall back to the global
	/// database (which knows nothing about them).
	pub(crate) fn local_source_dirs(&self) -> Vec<PathBuf> {
		self.data_dirs.last().map_or_else(Vec::new, |base| vec![
			base.join(crate::DIR_SERVICE_TYPES),
			base.join(crate::DIR_SERVICES),
			base.join(crate::DIR_APPLICATIONS),
		])
	}

	#[must_use]
	/// # Cache File Path.
	///
	/// `<cache_root>/ksycoca<version>_<lang>_<hash>` unless overridden,
	/// where the hash digests the data-dir search path.
	pub fn cache_file_path(&self) -> PathBuf {
		if let Some(p) = &self.cache_override { return p.clone(); }
		self.cache_dir.join(format!(
			"{}{}_{}_{:08x}",
			crate::CACHE_BASE,
			crate::SYCOCA_VERSION,
			self.language,
			self.dirs_hash(),
		))
	}

	#[must_use]
	/// # Global (System) Cache File Path.
	///
	/// The read-only fallback consulted when the user-scope file does
	/// not exist. Lives under the lowest-precedence system data dir;
	/// `None` when the search path has no system component.
	pub fn global_cache_path(&self) -> Option<PathBuf> {
		if self.data_dirs.len() < 2 { return None; }
		Some(self.data_dirs[0].join("sycoca").join(format!(
			"{}{}_{}",
			crate::CACHE_BASE,
			crate::SYCOCA_VERSION,
			self.language,
		)))
	}

	#[must_use]
	/// # Profile File Path.
	pub fn profile_path(&self, file: &str) -> PathBuf {
		self.config_dir.join(file)
	}

	/// # Search-Path Digest.
	fn dirs_hash(&self) -> u32 {
		let mut h = crc32fast::Hasher::new();
		for d in &self.data_dirs {
			h.update(d.to_string_lossy().as_bytes());
			h.update(b":");
		}
		h.finalize()
	}
}

/// # Directory From Env Var, With Fallback.
fn env_dir<F>(key: &str, fallback: F) -> PathBuf
where F: FnOnce() -> PathBuf {
	std::env::var_os(key)
		.filter(|v| ! v.is_empty())
		.map_or_else(fallback, PathBuf::from)
}

/// # Language From the Environment.
///
/// First tag of `LC_ALL`/`LC_MESSAGES`/`LANG` ("fr_FR.utf8" → "fr"),
/// falling back to "en".
fn language_from_env() -> String {
	["LC_ALL", "LC_MESSAGES", "LANG"].iter()
		.find_map(|k| std::env::var(k).ok())
		.and_then(|raw| {
			let tag: String = raw.chars()
				.take_while(char::is_ascii_alphabetic)
				.collect();
			if tag.is_empty() { None }
			else { Some(tag) }
		})
		.unwrap_or_else(|| "en".to_owned())
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_cache_path_isolation() {
		// Different search paths must never share a cache file.
		let a = SycocaContext::new(
			vec![PathBuf::from("/usr/share"), PathBuf::from("/home/a/.local/share")],
			PathBuf::from("/tmp/cache"),
			PathBuf::from("/tmp/config"),
		);
		let b = SycocaContext::new(
			vec![PathBuf::from("/usr/share"), PathBuf::from("/home/b/.local/share")],
			PathBuf::from("/tmp/cache"),
			PathBuf::from("/tmp/config"),
		);
		assert_ne!(a.cache_file_path(), b.cache_file_path());

		// Same search path, same file.
		let c = SycocaContext::new(
			vec![PathBuf::from("/usr/share"), PathBuf::from("/home/a/.local/share")],
			PathBuf::from("/tmp/cache"),
			PathBuf::from("/tmp/config"),
		);
		assert_eq!(a.cache_file_path(), c.cache_file_path());

		// The version and language are part of the file name.
		let name = a.cache_file_path();
		let name = name.file_name().and_then(|n| n.to_str()).unwrap_or_default();
		assert!(
			name.starts_with(&format!("ksycoca{}_en_", crate::SYCOCA_VERSION)),
			"Unexpected cache file name: {name}",
		);
	}

	#[test]
	fn t_source_dirs() {
		let ctx = SycocaContext::new(
			vec![PathBuf::from("/usr/share"), PathBuf::from("/home/a/.local/share")],
			PathBuf::from("/tmp/cache"),
			PathBuf::from("/tmp/config"),
		);
		let dirs = ctx.source_dirs();
		assert_eq!(dirs.len(), 6);
		assert_eq!(dirs[0], PathBuf::from("/usr/share/sycoca/servicetypes"));
		assert_eq!(dirs[5], PathBuf::from("/home/a/.local/share/applications"));
		assert_eq!(ctx.local_source_dirs().len(), 3);
	}
}
