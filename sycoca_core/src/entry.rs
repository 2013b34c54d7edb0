/*!
# Sycoca: Entry Model
*/

pub(crate) mod mime_type;
pub(crate) mod service;
pub(crate) mod service_group;
pub(crate) mod service_type;

use crate::{
	ImageReader,
	ImageWriter,
	SycocaError,
};



#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
/// # Entry Kind.
///
/// The stable discriminator written ahead of every entry's payload.
/// Factory ids in the header table reuse the same values.
pub enum EntryKind {
	/// # Service Type.
	ServiceType,

	/// # Service.
	Service,

	/// # Service (Menu) Group.
	ServiceGroup,

	/// # Mime Type.
	MimeType,
}

impl EntryKind {
	/// # All Kinds, In Header-Table Order.
	pub(crate) const ALL: [Self; 4] = [
		Self::ServiceType,
		Self::Service,
		Self::ServiceGroup,
		Self::MimeType,
	];

	/// # Type Tag.
	#[must_use]
	pub const fn tag(self) -> i32 {
		match self {
			Self::ServiceType => 1,
			Self::Service => 2,
			Self::ServiceGroup => 3,
			Self::MimeType => 4,
		}
	}

	/// # From Type Tag.
	#[must_use]
	pub const fn from_tag(tag: i32) -> Option<Self> {
		match tag {
			1 => Some(Self::ServiceType),
			2 => Some(Self::Service),
			3 => Some(Self::ServiceGroup),
			4 => Some(Self::MimeType),
			_ => None,
		}
	}
}



#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
/// # DBus Activation Policy.
pub enum DBusStartupType {
	#[default]
	/// # No DBus Activation.
	None,

	/// # Multiple Instances.
	Multi,

	/// # Single Unique Instance.
	Unique,

	/// # Wait For Registration.
	Wait,
}

impl DBusStartupType {
	/// # From Desktop Value.
	pub(crate) fn from_desktop(raw: &str) -> Self {
		match raw.trim() {
			"Multi" => Self::Multi,
			"Unique" => Self::Unique,
			"Wait" => Self::Wait,
			_ => Self::None,
		}
	}

	/// # Serialization Tag.
	pub(crate) const fn tag(self) -> i32 {
		match self {
			Self::None => 0,
			Self::Multi => 1,
			Self::Unique => 2,
			Self::Wait => 3,
		}
	}

	/// # From Serialization Tag.
	pub(crate) const fn from_tag(tag: i32) -> Option<Self> {
		match tag {
			0 => Some(Self::None),
			1 => Some(Self::Multi),
			2 => Some(Self::Unique),
			3 => Some(Self::Wait),
			_ => None,
		}
	}
}



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Offer.
///
/// A (service, claimed capability) association, stored inside the
/// service-type or mime-type record it belongs to. The service is
/// referenced by its image offset and resolved lazily.
pub struct Offer {
	/// # Service Offset.
	pub service_offset: u32,

	/// # Initial Preference.
	pub initial_preference: i32,

	/// # Allowed As Default?
	pub allow_as_default: bool,
}

impl Offer {
	/// # Serialize.
	pub(crate) fn write(&self, w: &mut ImageWriter) {
		w.write_i32(self.service_offset as i32);
		w.write_i32(self.initial_preference);
		w.write_bool(self.allow_as_default);
	}

	/// # Deserialize.
	pub(crate) fn read(r: &mut ImageReader) -> Result<Self, SycocaError> {
		let service_offset = r.read_i32()?;
		if service_offset <= 0 {
			return Err(SycocaError::Corrupt("offer without a service"));
		}
		Ok(Self {
			service_offset: service_offset as u32,
			initial_preference: r.read_i32()?,
			allow_as_default: r.read_bool()?,
		})
	}

	/// # Read a List of Offers.
	pub(crate) fn read_list(r: &mut ImageReader) -> Result<Vec<Self>, SycocaError> {
		let len = r.read_list_len()?;
		let mut out = Vec::with_capacity(len);
		for _ in 0..len { out.push(Self::read(r)?); }
		Ok(out)
	}

	/// # Write a List of Offers.
	pub(crate) fn write_list(offers: &[Self], w: &mut ImageWriter) {
		w.write_i32(i32::try_from(offers.len()).unwrap_or(i32::MAX));
		for o in offers { o.write(w); }
	}
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_tags() {
		for kind in EntryKind::ALL {
			assert_eq!(EntryKind::from_tag(kind.tag()), Some(kind));
		}
		assert_eq!(EntryKind::from_tag(0), None);
		assert_eq!(EntryKind::from_tag(99), None);
	}

	#[test]
	fn t_dbus() {
		assert_eq!(DBusStartupType::from_desktop("Unique"), DBusStartupType::Unique);
		assert_eq!(DBusStartupType::from_desktop("nonsense"), DBusStartupType::None);
		for v in [
			DBusStartupType::None,
			DBusStartupType::Multi,
			DBusStartupType::Unique,
			DBusStartupType::Wait,
		] {
			assert_eq!(DBusStartupType::from_tag(v.tag()), Some(v));
		}
	}
}
