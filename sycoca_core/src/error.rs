/*!
# Sycoca: Errors
*/

use fyi_msg::Msg;
use std::{
	error::Error,
	fmt,
};



#[cfg(feature = "bin")]
/// # Help Text.
const HELP: &str = concat!(r#"
   _____
  |     |__     "#, "Sycoca Build v", env!("CARGO_PKG_VERSION"), r#"
  | bld |  |    Rebuild the binary desktop-service
  |_____|__|    metadata cache.

USAGE:
    sycocabuild [OPTIONS]

OPTIONS:
        --menutest      Validate the menu structure without writing a
                        new cache file.
        --noincremental Ignore the previous cache file and re-read
                        everything from scratch.
        --testmode      Resolve all paths from the current environment
                        variables only, for unit-test isolation.
        --track <ID>    Print a trace line to STDERR whenever the
                        given menu id is touched during the build.

COMPATIBILITY (ACCEPTED, NO EFFECT):
        --checkstamps
        --nocheckfiles
        --nosignal

MISCELLANEOUS:
    -h, --help          Print help information to STDOUT and exit.
    -V, --version       Print version information to STDOUT and exit.

Diagnostics are written to STDERR; the exit status is zero on success.
"#);



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Errors.
pub enum SycocaError {
	/// # Build Failure (Output I/O).
	BuildWrite(String),

	/// # Bug!
	Bug(&'static str),

	/// # Cache Directory.
	CacheDir,

	/// # Database Corruption.
	Corrupt(&'static str),

	/// # Service Type Inheritance Cycle.
	InheritanceCycle(String),

	/// # No Database, No Sources.
	NotFound,

	/// # Constraint Parse Failure.
	///
	/// Never escapes a trader query; malformed expressions simply yield
	/// empty offer lists.
	Parse(&'static str),

	/// # Profile Write.
	ProfileWrite(String),

	/// # Wrong Binary Format Version.
	Version(i32),

	#[cfg(feature = "bin")]
	/// # Invalid CLI Value.
	CliParse(&'static str),

	#[cfg(feature = "bin")]
	/// # Print Help (Not an Error).
	PrintHelp,

	#[cfg(feature = "bin")]
	/// # Print Version (Not an Error).
	PrintVersion,
}

impl Error for SycocaError {}

impl From<SycocaError> for Msg {
	#[inline]
	fn from(src: SycocaError) -> Self { Self::error(src.to_string()) }
}

impl fmt::Display for SycocaError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::BuildWrite(s) => write!(f, "Unable to write the cache to {s}."),
			Self::Bug(s) => write!(f, "Bug: {s}."),
			Self::CacheDir => f.write_str("Unable to establish a cache directory."),
			Self::Corrupt(s) => write!(f, "Database corruption: {s}."),
			Self::InheritanceCycle(s) => write!(f, "Service type {s} inherits from itself."),
			Self::NotFound => f.write_str("No database file and no source directories."),
			Self::Parse(s) => write!(f, "Unable to parse constraint: {s}."),
			Self::ProfileWrite(s) => write!(f, "Unable to write the profile to {s}."),
			Self::Version(v) => write!(
				f,
				"Found database version {v}, expected {}.",
				crate::SYCOCA_VERSION,
			),

			#[cfg(feature = "bin")]
			Self::CliParse(s) => write!(f, "Unable to parse {s}."),

			#[cfg(feature = "bin")]
			Self::PrintHelp => f.write_str(HELP),

			#[cfg(feature = "bin")]
			Self::PrintVersion => f.write_str(concat!("Sycoca Build v", env!("CARGO_PKG_VERSION"))),
		}
	}
}
