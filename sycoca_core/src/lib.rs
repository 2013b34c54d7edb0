/*!
# Sycoca: Library
*/

#![deny(
	clippy::allow_attributes_without_reason,
	clippy::correctness,
	unreachable_pub,
	unsafe_code,
)]

#![warn(
	clippy::complexity,
	clippy::nursery,
	clippy::pedantic,
	clippy::perf,
	clippy::style,

	clippy::allow_attributes,
	clippy::clone_on_ref_ptr,
	clippy::create_dir,
	clippy::filetype_is_file,
	clippy::format_push_string,
	clippy::get_unwrap,
	clippy::impl_trait_in_params,
	clippy::lossy_float_literal,
	clippy::missing_assert_message,
	clippy::missing_docs_in_private_items,
	clippy::needless_raw_strings,
	clippy::panic_in_result_fn,
	clippy::pub_without_shorthand,
	clippy::rest_pat_in_fully_bound_structs,
	clippy::semicolon_inside_block,
	clippy::str_to_string,
	clippy::string_to_string,
	clippy::todo,
	clippy::undocumented_unsafe_blocks,
	clippy::unneeded_field_pattern,
	clippy::unseparated_literal_suffix,
	clippy::unwrap_in_result,

	macro_use_extern_crate,
	missing_copy_implementations,
	missing_docs,
	non_ascii_idents,
	trivial_casts,
	trivial_numeric_casts,
	unused_crate_dependencies,
	unused_extern_crates,
	unused_import_braces,
)]

#![expect(clippy::redundant_pub_crate, reason = "Unresolvable.")]

mod builder;
mod codec;
mod constraint;
mod desktop;
mod dict;
mod entry;
mod error;
mod factory;
mod paths;
mod profile;
mod sycoca;
mod trader;
mod utility;
mod variant;

pub use builder::CacheBuilder;
pub(crate) use codec::{
	ImageReader,
	ImageWriter,
};
pub use desktop::DesktopEntry;
pub(crate) use dict::StringDict;
pub use entry::{
	DBusStartupType,
	EntryKind,
	Offer,
	mime_type::MimeType,
	service::{
		Service,
		ServiceAction,
	},
	service_group::ServiceGroup,
	service_type::ServiceType,
};
pub use error::SycocaError;
pub use paths::SycocaContext;
pub use profile::ServiceTypeProfile;
pub use sycoca::{
	GroupEntry,
	Strategy,
	Sycoca,
};
pub use variant::{
	PropertyType,
	PropertyValue,
};
use std::sync::Arc;



/// # Refcounted Service List.
pub type ServiceList = Vec<Arc<Service>>;

/// # In-Memory Map.
pub(crate) type FlatMap<K, V> = ahash::AHashMap<K, V>;

/// # In-Memory Set.
pub(crate) type FlatSet<K> = ahash::AHashSet<K>;



// Format
// ---------------

/// # Binary Format Version.
///
/// Stamped at the head of every cache file; a file carrying any other
/// value is regenerated rather than read, because all recorded offsets
/// belong to this generation's layout.
pub const SYCOCA_VERSION: i32 = 1;

/// # Maximum Serialized String (Bytes).
///
/// Strings, lists, and entry counts are all capped to bound the blast
/// radius of a corrupt database.
pub(crate) const MAX_STRING_BYTES: usize = 8192;

/// # Maximum List Length.
pub(crate) const MAX_LIST_LEN: usize = 1024;

/// # Maximum Entries Per Factory.
pub(crate) const MAX_ENTRIES: usize = 8192;



// Sources
// ---------------

/// # Service Source Subdirectory.
///
/// Relative to each data dir on the search path.
pub(crate) const DIR_SERVICES: &str = "sycoca/services";

/// # Service Type Source Subdirectory.
pub(crate) const DIR_SERVICE_TYPES: &str = "sycoca/servicetypes";

/// # Application Source Subdirectory.
pub(crate) const DIR_APPLICATIONS: &str = "applications";

/// # Desktop Entry Extension.
pub(crate) const DESKTOP_EXT: &str = ".desktop";



// Misc
// ---------------

/// # Cache File Base Name.
///
/// The full file name appends the format version, language, and a hash
/// of the data-dir search path; see [`SycocaContext::cache_file_path`].
pub(crate) const CACHE_BASE: &str = "ksycoca";

/// # Default Milliseconds Between Staleness Checks.
pub(crate) const MS_BETWEEN_CHECKS: u64 = 1500;
