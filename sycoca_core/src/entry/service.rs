/*!
# Sycoca: Service Entries
*/

use crate::{
	DBusStartupType,
	DesktopEntry,
	EntryKind,
	ImageReader,
	ImageWriter,
	PropertyValue,
	SycocaError,
};
use std::collections::BTreeMap;



/// # Complete Base Name.
///
/// The service name is its file name minus directories and the final
/// `.desktop` extension only, so dotted names survive intact:
/// `apps/a.b.c.desktop` becomes `a.b.c`.
pub(crate) fn complete_basename(path: &str) -> &str {
	let base = path.rsplit('/').next().unwrap_or(path);
	base.strip_suffix(crate::DESKTOP_EXT).unwrap_or(base)
}



#[derive(Debug, Clone, PartialEq)]
/// # A Service.
///
/// An installed application or plugin description, parsed from one
/// desktop entry file and frozen into the cache. Instances are handed
/// out refcounted (`Arc`) and stay valid after the cache they came
/// from has been remapped or rebuilt.
pub struct Service {
	/// # Image Offset (Zero Until Written).
	pub(crate) offset: u32,

	/// # Internal Name (Complete Base Name).
	pub(crate) name: String,

	/// # Path Relative to the Source Subdirectory.
	pub(crate) entry_path: String,

	/// # Menu Id (Applications; Reverse-DNS Style).
	pub(crate) menu_id: String,

	/// # Visible Display Name.
	pub(crate) display_name: String,

	/// # Comment.
	pub(crate) comment: String,

	/// # Icon.
	pub(crate) icon: String,

	/// # Executable Command Line.
	pub(crate) exec: String,

	/// # Plugin Library.
	pub(crate) library: String,

	/// # Implemented Service Type Names.
	pub(crate) service_types: Vec<String>,

	/// # Handled Mime Types.
	pub(crate) mime_types: Vec<String>,

	/// # Supported Protocols.
	pub(crate) protocols: Vec<String>,

	/// # Form Factors.
	pub(crate) form_factors: Vec<String>,

	/// # DBus Activation Policy.
	pub(crate) dbus_startup_type: DBusStartupType,

	/// # Initial Preference.
	pub(crate) initial_preference: i32,

	/// # Allowed as a Default Handler?
	pub(crate) allow_as_default: bool,

	/// # Hidden From Menus?
	pub(crate) no_display: bool,

	/// # Runs in a Terminal?
	pub(crate) terminal: bool,

	/// # Application (vs. Plugin Service)?
	pub(crate) application: bool,

	/// # Leftover Desktop Properties.
	pub(crate) properties: BTreeMap<String, PropertyValue>,

	/// # Desktop Actions.
	pub(crate) actions: Vec<ServiceAction>,
}

impl Service {
	/// # From a Parsed Desktop Entry.
	///
	/// Returns `None` when the entry is not a service at all (wrong or
	/// missing `Type`, missing `Name`); the builder warns and skips
	/// such files.
	pub(crate) fn from_desktop(entry_path: &str, src: &DesktopEntry) -> Option<Self> {
		let application = match src.get("Type") {
			Some("Application") => true,
			Some("Service") => false,
			_ => return None,
		};
		let display_name = src.get("Name")?.to_owned();

		let name = complete_basename(entry_path).to_owned();
		if name.is_empty() { return None; }

		// Applications are addressed by menu id: the path with
		// directory separators flattened to dashes.
		let menu_id =
			if application { entry_path.replace('/', "-") }
			else { String::new() };

		let mut service_types = src.get_list("X-KDE-ServiceTypes");
		if service_types.is_empty() {
			service_types = src.get_list("ServiceTypes");
		}

		// Everything we didn't lift into a dedicated field sticks
		// around as a raw string property.
		let mut properties = BTreeMap::new();
		for (k, v) in src.main_entries() {
			if ! BUILTIN_KEYS.contains(&k) {
				properties.insert(k.to_owned(), PropertyValue::String(v.to_owned()));
			}
		}

		let actions = src.actions()
			.map(|(name, entries)| ServiceAction::from_group(name, entries))
			.collect();

		Some(Self {
			offset: 0,
			name,
			entry_path: entry_path.to_owned(),
			menu_id,
			display_name,
			comment: src.get("Comment").unwrap_or_default().to_owned(),
			icon: src.get("Icon").unwrap_or_default().to_owned(),
			exec: src.get("Exec").unwrap_or_default().to_owned(),
			library: src.get("X-KDE-Library").unwrap_or_default().to_owned(),
			service_types,
			mime_types: src.get_list("MimeType"),
			protocols: src.get_list("X-KDE-Protocols"),
			form_factors: src.get_list("X-KDE-FormFactors"),
			dbus_startup_type: src.get("X-DBUS-ServiceType")
				.or_else(|| src.get("X-KDE-DBUs-ServiceType"))
				.map_or(DBusStartupType::None, DBusStartupType::from_desktop),
			initial_preference: src.get_i32("InitialPreference").unwrap_or(1),
			allow_as_default: src.get_bool("AllowDefault").unwrap_or(true),
			no_display: src.get_bool("NoDisplay").unwrap_or(false),
			terminal: src.get_bool("Terminal").unwrap_or(false),
			application,
			properties,
			actions,
		})
	}

	/// # Serialize (Tag + Payload), Stamping the Offset.
	pub(crate) fn write(&mut self, w: &mut ImageWriter) {
		self.offset = w.pos();
		w.write_i32(EntryKind::Service.tag());
		w.write_string(&self.name);
		w.write_string(&self.entry_path);
		w.write_string(&self.menu_id);
		w.write_string(&self.display_name);
		w.write_string(&self.comment);
		w.write_string(&self.icon);
		w.write_string(&self.exec);
		w.write_string(&self.library);
		w.write_string_list(&self.service_types);
		w.write_string_list(&self.mime_types);
		w.write_string_list(&self.protocols);
		w.write_string_list(&self.form_factors);
		w.write_i32(self.dbus_startup_type.tag());
		w.write_i32(self.initial_preference);
		w.write_bool(self.allow_as_default);
		w.write_bool(self.no_display);
		w.write_bool(self.terminal);
		w.write_bool(self.application);
		w.write_property_map(&self.properties);
		w.write_i32(i32::try_from(self.actions.len()).unwrap_or(i32::MAX));
		for a in &self.actions { a.write(w); }
	}

	/// # Deserialize the Payload.
	///
	/// The caller has already consumed (and verified) the type tag;
	/// `offset` is where that tag began.
	pub(crate) fn read(r: &mut ImageReader, offset: u32) -> Result<Self, SycocaError> {
		Ok(Self {
			offset,
			name: r.read_string()?,
			entry_path: r.read_string()?,
			menu_id: r.read_string()?,
			display_name: r.read_string()?,
			comment: r.read_string()?,
			icon: r.read_string()?,
			exec: r.read_string()?,
			library: r.read_string()?,
			service_types: r.read_string_list()?,
			mime_types: r.read_string_list()?,
			protocols: r.read_string_list()?,
			form_factors: r.read_string_list()?,
			dbus_startup_type: DBusStartupType::from_tag(r.read_i32()?)
				.ok_or(SycocaError::Corrupt("bad dbus policy tag"))?,
			initial_preference: r.read_i32()?,
			allow_as_default: r.read_bool()?,
			no_display: r.read_bool()?,
			terminal: r.read_bool()?,
			application: r.read_bool()?,
			properties: r.read_property_map()?,
			actions: {
				let len = r.read_list_len()?;
				let mut out = Vec::with_capacity(len);
				for _ in 0..len { out.push(ServiceAction::read(r)?); }
				out
			},
		})
	}
}

/// # Getters.
impl Service {
	#[must_use]
	/// # Image Offset.
	pub const fn offset(&self) -> u32 { self.offset }

	#[must_use]
	/// # Internal Name.
	pub fn name(&self) -> &str { &self.name }

	#[must_use]
	/// # Entry Path (Relative).
	pub fn entry_path(&self) -> &str { &self.entry_path }

	#[must_use]
	/// # Storage Id.
	///
	/// The menu id when there is one, otherwise the file basename with
	/// its extension.
	pub fn storage_id(&self) -> &str {
		if self.menu_id.is_empty() {
			self.entry_path.rsplit('/').next().unwrap_or(&self.entry_path)
		}
		else { &self.menu_id }
	}

	#[must_use]
	/// # Menu Id.
	pub fn menu_id(&self) -> &str { &self.menu_id }

	#[must_use]
	/// # Display Name.
	pub fn display_name(&self) -> &str { &self.display_name }

	#[must_use]
	/// # Comment.
	pub fn comment(&self) -> &str { &self.comment }

	#[must_use]
	/// # Icon.
	pub fn icon(&self) -> &str { &self.icon }

	#[must_use]
	/// # Command Line.
	pub fn exec(&self) -> &str { &self.exec }

	#[must_use]
	/// # Plugin Library.
	pub fn library(&self) -> &str { &self.library }

	#[must_use]
	/// # Implemented Service Type Names.
	///
	/// Only the directly-declared types; use
	/// [`Sycoca::has_service_type`](crate::Sycoca::has_service_type)
	/// to honor inheritance.
	pub fn service_types(&self) -> &[String] { &self.service_types }

	#[must_use]
	/// # Handled Mime Types.
	pub fn mime_types(&self) -> &[String] { &self.mime_types }

	#[must_use]
	/// # Supported Protocols.
	pub fn protocols(&self) -> &[String] { &self.protocols }

	#[must_use]
	/// # Form Factors.
	pub fn form_factors(&self) -> &[String] { &self.form_factors }

	#[must_use]
	/// # DBus Activation Policy.
	pub const fn dbus_startup_type(&self) -> DBusStartupType { self.dbus_startup_type }

	#[must_use]
	/// # Initial Preference.
	pub const fn initial_preference(&self) -> i32 { self.initial_preference }

	#[must_use]
	/// # Allowed as a Default Handler?
	pub const fn allow_as_default(&self) -> bool { self.allow_as_default }

	#[must_use]
	/// # Hidden From Menus?
	pub const fn no_display(&self) -> bool { self.no_display }

	#[must_use]
	/// # Runs in a Terminal?
	pub const fn terminal(&self) -> bool { self.terminal }

	#[must_use]
	/// # Application (vs. Plugin Service)?
	pub const fn is_application(&self) -> bool { self.application }

	#[must_use]
	/// # Desktop Actions.
	pub fn actions(&self) -> &[ServiceAction] { &self.actions }

	#[must_use]
	/// # Property Names.
	pub fn property_names(&self) -> Vec<&str> {
		let mut out: Vec<&str> = self.properties.keys().map(String::as_str).collect();
		out.extend(BUILTIN_KEYS);
		out.sort_unstable();
		out
	}

	#[must_use]
	/// # Look Up a Property.
	///
	/// Dedicated fields answer to their desktop key names; anything
	/// else comes out of the leftover property map as stored.
	pub fn property(&self, name: &str) -> Option<PropertyValue> {
		match name {
			"Name" => Some(PropertyValue::String(self.display_name.clone())),
			"Comment" => Some(PropertyValue::String(self.comment.clone())),
			"Icon" => Some(PropertyValue::String(self.icon.clone())),
			"Exec" => Some(PropertyValue::String(self.exec.clone())),
			"Library" | "X-KDE-Library" => Some(PropertyValue::String(self.library.clone())),
			"Type" => Some(PropertyValue::String(
				if self.application { "Application".to_owned() }
				else { "Service".to_owned() }
			)),
			"ServiceTypes" | "X-KDE-ServiceTypes" =>
				Some(PropertyValue::StringList(self.service_types.clone())),
			"MimeType" | "MimeTypes" =>
				Some(PropertyValue::StringList(self.mime_types.clone())),
			"X-KDE-Protocols" => Some(PropertyValue::StringList(self.protocols.clone())),
			"X-KDE-FormFactors" => Some(PropertyValue::StringList(self.form_factors.clone())),
			"InitialPreference" => Some(PropertyValue::Int(i64::from(self.initial_preference))),
			"AllowDefault" => Some(PropertyValue::Bool(self.allow_as_default)),
			"NoDisplay" => Some(PropertyValue::Bool(self.no_display)),
			"Terminal" => Some(PropertyValue::Bool(self.terminal)),
			"DesktopEntryName" => Some(PropertyValue::String(self.name.clone())),
			"DesktopEntryPath" => Some(PropertyValue::String(self.entry_path.clone())),
			_ => self.properties.get(name).cloned(),
		}
	}
}

/// # Desktop Keys With Dedicated Fields.
///
/// These never land in the leftover property map; `property` recreates
/// them from the fields instead.
const BUILTIN_KEYS: [&str; 19] = [
	"Actions",
	"AllowDefault",
	"Comment",
	"Exec",
	"Hidden",
	"Icon",
	"InitialPreference",
	"MimeType",
	"Name",
	"NoDisplay",
	"ServiceTypes",
	"Terminal",
	"Type",
	"X-DBUS-ServiceType",
	"X-KDE-DBUs-ServiceType",
	"X-KDE-FormFactors",
	"X-KDE-Library",
	"X-KDE-Protocols",
	"X-KDE-ServiceTypes",
];



#[derive(Debug, Clone, Eq, PartialEq)]
/// # A Desktop Action.
///
/// One `[Desktop Action X]` group: an alternate invocation the menu
/// system can offer ("New Window", "New Tab"…).
pub struct ServiceAction {
	/// # Action Name (Group Suffix).
	pub(crate) name: String,

	/// # Visible Label.
	pub(crate) label: String,

	/// # Command Line.
	pub(crate) exec: String,

	/// # Icon.
	pub(crate) icon: String,

	/// # Hidden From Menus?
	pub(crate) no_display: bool,
}

impl ServiceAction {
	/// # From a Parsed Group.
	fn from_group(name: &str, entries: &[(String, String)]) -> Self {
		let get = |key: &str| crate::desktop::get_in(entries, key).unwrap_or_default().to_owned();
		Self {
			name: name.to_owned(),
			label: get("Name"),
			exec: get("Exec"),
			icon: get("Icon"),
			no_display: crate::desktop::get_in(entries, "NoDisplay")
				.and_then(crate::variant::parse_bool)
				.unwrap_or(false),
		}
	}

	/// # Serialize.
	fn write(&self, w: &mut ImageWriter) {
		w.write_string(&self.name);
		w.write_string(&self.label);
		w.write_string(&self.exec);
		w.write_string(&self.icon);
		w.write_bool(self.no_display);
	}

	/// # Deserialize.
	fn read(r: &mut ImageReader) -> Result<Self, SycocaError> {
		Ok(Self {
			name: r.read_string()?,
			label: r.read_string()?,
			exec: r.read_string()?,
			icon: r.read_string()?,
			no_display: r.read_bool()?,
		})
	}

	#[must_use]
	/// # Action Name.
	pub fn name(&self) -> &str { &self.name }

	#[must_use]
	/// # Visible Label.
	pub fn label(&self) -> &str { &self.label }

	#[must_use]
	/// # Command Line.
	pub fn exec(&self) -> &str { &self.exec }

	#[must_use]
	/// # Icon.
	pub fn icon(&self) -> &str { &self.icon }

	#[must_use]
	/// # Hidden From Menus?
	pub const fn no_display(&self) -> bool { self.no_display }
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_complete_basename() {
		assert_eq!(complete_basename("fakepart2.desktop"), "fakepart2");
		assert_eq!(complete_basename("org.kde.fakeapp.desktop"), "org.kde.fakeapp");
		assert_eq!(complete_basename("kded/fakekcookiejar.desktop"), "fakekcookiejar");
		assert_eq!(complete_basename("noext"), "noext");
	}

	#[test]
	fn t_from_desktop() {
		let raw = "\
[Desktop Entry]
Name=FakePart
Type=Service
X-KDE-Library=fakepart
X-KDE-Protocols=http,ftp
X-KDE-ServiceTypes=FakeBasePart,FakeDerivedPart
MimeType=text/plain;text/html;
X-KDE-FormFactors=tablet,handset
X-KDE-Kded-autoload=false
";
		let parsed = DesktopEntry::parse(raw).expect("Unable to parse fixture.");
		let service = Service::from_desktop("fakepart.desktop", &parsed)
			.expect("Unable to build service.");

		assert_eq!(service.name(), "fakepart");
		assert_eq!(service.display_name(), "FakePart");
		assert_eq!(service.storage_id(), "fakepart.desktop");
		assert!(service.menu_id().is_empty());
		assert_eq!(service.library(), "fakepart");
		assert_eq!(service.service_types(), ["FakeBasePart", "FakeDerivedPart"]);
		assert_eq!(service.mime_types(), ["text/plain", "text/html"]);
		assert_eq!(service.protocols(), ["http", "ftp"]);
		assert_eq!(
			service.property("X-KDE-Kded-autoload"),
			Some(PropertyValue::String("false".to_owned())),
		);
		assert!(service.property_names().contains(&"X-KDE-Protocols"));
		assert_eq!(service.property("Name[fr]"), None);
	}

	#[test]
	fn t_menu_id() {
		let raw = "[Desktop Entry]\nName=Konsole\nType=Application\nExec=konsole\n";
		let parsed = DesktopEntry::parse(raw).expect("Unable to parse fixture.");
		let service = Service::from_desktop("org.kde.konsole.desktop", &parsed)
			.expect("Unable to build service.");
		assert_eq!(service.menu_id(), "org.kde.konsole.desktop");
		assert_eq!(service.storage_id(), "org.kde.konsole.desktop");
		assert!(service.is_application());

		let nested = Service::from_desktop("kde/org.kde.konsole.desktop", &parsed)
			.expect("Unable to build service.");
		assert_eq!(nested.menu_id(), "kde-org.kde.konsole.desktop");
	}

	#[test]
	fn t_roundtrip() {
		let raw = "\
[Desktop Entry]
Name=Konsole
Type=Application
Exec=konsole
Icon=utilities-terminal
MimeType=text/plain;
X-DBUS-ServiceType=Unique
InitialPreference=9

[Desktop Action NewTab]
Name=Open a New Tab
Exec=konsole --new-tab
";
		let parsed = DesktopEntry::parse(raw).expect("Unable to parse fixture.");
		let mut service = Service::from_desktop("org.kde.konsole.desktop", &parsed)
			.expect("Unable to build service.");

		let mut w = ImageWriter::new();
		w.write_i64(0); // Give it a nonzero offset to stamp.
		service.write(&mut w);
		assert_eq!(service.offset(), 8);

		let buf = w.into_vec();
		let mut r = ImageReader::new(&buf);
		r.seek(service.offset());
		assert_eq!(r.read_i32(), Ok(EntryKind::Service.tag()));
		let back = Service::read(&mut r, service.offset()).expect("Unable to re-read service.");
		assert_eq!(service, back);
		assert_eq!(back.dbus_startup_type(), DBusStartupType::Unique);
		assert_eq!(back.actions().len(), 1);
		assert_eq!(back.actions()[0].exec(), "konsole --new-tab");
	}
}
