/*!
# Sycoca Build
*/

#![forbid(unsafe_code)]

#![deny(
	clippy::allow_attributes_without_reason,
	clippy::correctness,
	unreachable_pub,
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



use argyle::Argument;
use dactyl::NiceU32;
use fyi_msg::Msg;
use oxford_join::OxfordJoin;
use std::path::PathBuf;
use sycoca_core::{
	CacheBuilder,
	Sycoca,
	SycocaContext,
	SycocaError,
};
use utc2k::{
	FmtUtc2k,
	Utc2k,
};



/// # Main.
///
/// This lets us bubble up startup errors so they can be pretty-printed.
fn main() {
	match _main() {
		Ok(()) => {},
		Err(e @ (SycocaError::PrintHelp | SycocaError::PrintVersion)) => {
			println!("{e}");
		},
		Err(e) => {
			Msg::from(e).eprint();
			std::process::exit(1);
		},
	}
}

#[inline]
/// # Actual Main.
///
/// This does all the stuff.
fn _main() -> Result<(), SycocaError> {
	let args = argyle::args()
		.with_keywords(include!(concat!(env!("OUT_DIR"), "/argyle.rs")));

	let mut incremental = true;
	let mut menu_test = false;
	let mut test_mode = false;
	let mut track = None;
	for arg in args {
		match arg {
			Argument::Key("-h" | "--help") => return Err(SycocaError::PrintHelp),
			Argument::Key("--menutest") => { menu_test = true; },
			Argument::Key("--noincremental") => { incremental = false; },
			Argument::Key("--testmode") => { test_mode = true; },
			Argument::Key("-V" | "--version") => return Err(SycocaError::PrintVersion),

			// Accepted for compatibility; they stopped meaning anything
			// generations ago.
			Argument::Key("--checkstamps" | "--nocheckfiles" | "--nosignal") => {},

			Argument::KeyWithValue("--track", s) => {
				let s = s.trim();
				if s.is_empty() { return Err(SycocaError::CliParse("--track")); }
				track.replace(s.to_owned());
			},

			_ => {},
		}
	}

	let ctx =
		if test_mode { test_context() }
		else { SycocaContext::from_env() };

	Msg::info("sycocabuild running…").eprint();

	let mut builder = CacheBuilder::new(ctx.clone())
		.with_incremental(incremental)
		.with_menu_test(menu_test);
	if let Some(track) = track { builder = builder.with_track(track); }

	let fresh = builder.recreate()?;
	if menu_test { return Ok(()); }

	if fresh { summarize(&ctx); }
	else {
		Msg::success("The cache was already up to date.").eprint();
	}

	Ok(())
}

/// # Test-Mode Context.
///
/// Everything under `~/.sycoca-test` so unit tests can make a mess
/// without touching the real cache.
fn test_context() -> SycocaContext {
	let root = std::env::var_os("HOME")
		.map_or_else(|| PathBuf::from("/tmp"), PathBuf::from)
		.join(".sycoca-test");
	SycocaContext::new(
		vec![root.join("share")],
		root.join("cache"),
		root.join("config"),
	)
}

/// # Print the Post-Build Summary.
fn summarize(ctx: &SycocaContext) {
	let dirs: Vec<String> = ctx.data_dirs()
		.iter()
		.map(|d| d.to_string_lossy().into_owned())
		.collect();

	let mut sycoca = Sycoca::new(ctx.clone());
	let services = u32::try_from(sycoca.all_services().len()).unwrap_or(u32::MAX);
	let types = u32::try_from(sycoca.all_service_types().len()).unwrap_or(u32::MAX);
	let stamp = FmtUtc2k::from(Utc2k::from(
		u32::try_from(sycoca.timestamp_ms() / 1000).unwrap_or_default()
	));

	Msg::success(format!(
		"Indexed {} service(s) and {} service type(s) from {} at {stamp} UTC.",
		NiceU32::from(services),
		NiceU32::from(types),
		dirs.oxford_and(),
	)).eprint();
}
