/*!
# Sycoca: Utility
*/

use std::path::Path;
use walkdir::WalkDir;



/// # Modification Time (Milliseconds Since the Epoch).
///
/// Missing or unreadable paths read as zero, which conveniently sorts
/// "older than everything".
pub(crate) fn mtime_ms(path: &Path) -> i64 {
	std::fs::metadata(path)
		.and_then(|m| m.modified())
		.ok()
		.and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
		.and_then(|d| i64::try_from(d.as_millis()).ok())
		.unwrap_or(0)
}

/// # Now (Milliseconds Since the Epoch).
pub(crate) fn now_ms() -> i64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.ok()
		.and_then(|d| i64::try_from(d.as_millis()).ok())
		.unwrap_or(0)
}

/// # Anything Newer In Here?
///
/// Visit a watched directory (itself, its subdirectories, its files)
/// and report whether any of them has been modified after `stamp`.
/// The walk short-circuits on the first hit, so the common "nothing
/// changed" case is the only one paying full price.
pub(crate) fn dir_newer_than(dir: &Path, stamp: i64) -> bool {
	if ! dir.exists() { return false; }
	WalkDir::new(dir)
		.follow_links(true)
		.into_iter()
		.flatten()
		.any(|entry| stamp < mtime_ms(entry.path()))
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_mtime() {
		assert_eq!(mtime_ms(Path::new("/nonesuch/nope")), 0);

		let dir = tempfile::TempDir::new().expect("Unable to create temp dir.");
		let file = dir.path().join("a.desktop");
		std::fs::write(&file, "x").expect("Unable to write file.");
		assert!(0 < mtime_ms(&file), "A real file should have a real mtime.");
	}

	#[test]
	fn t_dir_newer() {
		let dir = tempfile::TempDir::new().expect("Unable to create temp dir.");
		std::fs::write(dir.path().join("a.desktop"), "x").expect("Unable to write file.");

		let now = mtime_ms(dir.path());
		assert!(! dir_newer_than(dir.path(), now + 60_000), "Nothing is from the future.");
		assert!(dir_newer_than(dir.path(), now - 60_000), "The new file should register.");
		assert!(! dir_newer_than(Path::new("/nonesuch/nope"), 0));
	}
}
