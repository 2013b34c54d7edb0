/*!
# Sycoca: Service Type Entries
*/

use crate::{
	DesktopEntry,
	EntryKind,
	entry::Offer,
	ImageReader,
	ImageWriter,
	PropertyType,
	SycocaError,
};
use std::collections::BTreeMap;



#[derive(Debug, Clone, PartialEq)]
/// # A Service Type.
///
/// A named capability interface services may declare implementing,
/// optionally deriving from a single parent type. The offer list
/// (every service claiming this type or one of its descendants) is
/// computed at build time and stored inline.
pub struct ServiceType {
	/// # Image Offset (Zero Until Written).
	pub(crate) offset: u32,

	/// # Capability Name.
	pub(crate) name: String,

	/// # Comment.
	pub(crate) comment: String,

	/// # Parent Type Name.
	pub(crate) parent: Option<String>,

	/// # Declared Property Schema.
	pub(crate) property_defs: BTreeMap<String, PropertyType>,

	/// # Offers, In Default Order.
	pub(crate) offers: Vec<Offer>,
}

impl ServiceType {
	/// # From a Parsed Desktop Entry.
	///
	/// Requires `Type=ServiceType` and an `X-KDE-ServiceType` name.
	pub(crate) fn from_desktop(src: &DesktopEntry) -> Option<Self> {
		if src.get("Type") != Some("ServiceType") { return None; }
		let name = src.get("X-KDE-ServiceType")?.to_owned();
		if name.is_empty() { return None; }

		let property_defs = src.property_defs()
			.map(|(k, ty)| (k.to_owned(), PropertyType::from_declaration(ty)))
			.collect();

		Some(Self {
			offset: 0,
			name,
			comment: src.get("Comment").unwrap_or_default().to_owned(),
			parent: src.get("X-KDE-Derived")
				.map(str::trim)
				.filter(|p| ! p.is_empty())
				.map(str::to_owned),
			property_defs,
			offers: Vec::new(),
		})
	}

	/// # Serialize (Tag + Payload), Stamping the Offset.
	pub(crate) fn write(&mut self, w: &mut ImageWriter) {
		self.offset = w.pos();
		w.write_i32(EntryKind::ServiceType.tag());
		w.write_string(&self.name);
		w.write_string(&self.comment);
		w.write_string(self.parent.as_deref().unwrap_or_default());
		w.write_i32(i32::try_from(self.property_defs.len()).unwrap_or(i32::MAX));
		for (k, ty) in &self.property_defs {
			w.write_string(k);
			w.write_u8(ty.tag());
		}
		Offer::write_list(&self.offers, w);
	}

	/// # Deserialize the Payload.
	pub(crate) fn read(r: &mut ImageReader, offset: u32) -> Result<Self, SycocaError> {
		let name = r.read_string()?;
		let comment = r.read_string()?;
		let parent = Some(r.read_string()?).filter(|p| ! p.is_empty());

		let len = r.read_list_len()?;
		let mut property_defs = BTreeMap::new();
		for _ in 0..len {
			let k = r.read_string()?;
			let ty = PropertyType::from_tag(r.read_u8()?)
				.ok_or(SycocaError::Corrupt("bad property-def tag"))?;
			property_defs.insert(k, ty);
		}

		Ok(Self {
			offset,
			name,
			comment,
			parent,
			property_defs,
			offers: Offer::read_list(r)?,
		})
	}

	#[must_use]
	/// # Image Offset.
	pub const fn offset(&self) -> u32 { self.offset }

	#[must_use]
	/// # Capability Name.
	pub fn name(&self) -> &str { &self.name }

	#[must_use]
	/// # Comment.
	pub fn comment(&self) -> &str { &self.comment }

	#[must_use]
	/// # Parent Type Name.
	pub fn parent(&self) -> Option<&str> { self.parent.as_deref() }

	#[must_use]
	/// # Declared Type of a Property.
	pub fn property_type(&self, name: &str) -> Option<PropertyType> {
		self.property_defs.get(name).copied()
	}

	#[must_use]
	/// # Offers, In Default Order.
	pub fn offers(&self) -> &[Offer] { &self.offers }
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_from_desktop() {
		let raw = "\
[Desktop Entry]
Comment=Fake Derived Part
Type=ServiceType
X-KDE-ServiceType=FakeDerivedPart
X-KDE-Derived=FakeBasePart

[PropertyDef::X-KDE-Version]
Type=double
";
		let parsed = DesktopEntry::parse(raw).expect("Unable to parse fixture.");
		let st = ServiceType::from_desktop(&parsed).expect("Unable to build service type.");
		assert_eq!(st.name(), "FakeDerivedPart");
		assert_eq!(st.parent(), Some("FakeBasePart"));
		assert_eq!(st.property_type("X-KDE-Version"), Some(PropertyType::Double));
		assert_eq!(st.property_type("X-KDE-Nope"), None);

		// Services must not parse as service types.
		let raw = "[Desktop Entry]\nName=FakePart\nType=Service\n";
		let parsed = DesktopEntry::parse(raw).expect("Unable to parse fixture.");
		assert!(ServiceType::from_desktop(&parsed).is_none());
	}

	#[test]
	fn t_roundtrip() {
		let raw = "\
[Desktop Entry]
Comment=Fake Text Plugin
Type=ServiceType
X-KDE-ServiceType=FakePluginType

[PropertyDef::X-KDE-Version]
Type=double
";
		let parsed = DesktopEntry::parse(raw).expect("Unable to parse fixture.");
		let mut st = ServiceType::from_desktop(&parsed).expect("Unable to build service type.");
		st.offers.push(Offer {
			service_offset: 123,
			initial_preference: 5,
			allow_as_default: true,
		});

		let mut w = ImageWriter::new();
		st.write(&mut w);
		let buf = w.into_vec();

		let mut r = ImageReader::new(&buf);
		assert_eq!(r.read_i32(), Ok(EntryKind::ServiceType.tag()));
		let back = ServiceType::read(&mut r, 0).expect("Unable to re-read service type.");
		assert_eq!(st, back);
		assert_eq!(back.offers().len(), 1);
	}
}
