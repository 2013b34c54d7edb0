/*!
# Sycoca: Mime Type Entries
*/

use crate::{
	EntryKind,
	entry::Offer,
	ImageReader,
	ImageWriter,
	SycocaError,
};



#[derive(Debug, Clone, PartialEq)]
/// # A Mime Type.
///
/// The cache's view of a mime type is just its association list: the
/// services claiming to handle it, in default preference order. No
/// external mime database is consulted.
pub struct MimeType {
	/// # Image Offset (Zero Until Written).
	pub(crate) offset: u32,

	/// # Mime Name ("text/plain").
	pub(crate) name: String,

	/// # Offers, In Default Order.
	pub(crate) offers: Vec<Offer>,
}

impl MimeType {
	/// # New (In-Memory) Mime Type.
	pub(crate) const fn new(name: String) -> Self {
		Self { offset: 0, name, offers: Vec::new() }
	}

	/// # Serialize (Tag + Payload), Stamping the Offset.
	pub(crate) fn write(&mut self, w: &mut ImageWriter) {
		self.offset = w.pos();
		w.write_i32(EntryKind::MimeType.tag());
		w.write_string(&self.name);
		Offer::write_list(&self.offers, w);
	}

	/// # Deserialize the Payload.
	pub(crate) fn read(r: &mut ImageReader, offset: u32) -> Result<Self, SycocaError> {
		Ok(Self {
			offset,
			name: r.read_string()?,
			offers: Offer::read_list(r)?,
		})
	}

	#[must_use]
	/// # Image Offset.
	pub const fn offset(&self) -> u32 { self.offset }

	#[must_use]
	/// # Mime Name.
	pub fn name(&self) -> &str { &self.name }

	#[must_use]
	/// # Offers, In Default Order.
	pub fn offers(&self) -> &[Offer] { &self.offers }
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_roundtrip() {
		let mut mime = MimeType::new("text/plain".to_owned());
		mime.offers.push(Offer {
			service_offset: 64,
			initial_preference: 3,
			allow_as_default: false,
		});

		let mut w = ImageWriter::new();
		mime.write(&mut w);
		let buf = w.into_vec();

		let mut r = ImageReader::new(&buf);
		assert_eq!(r.read_i32(), Ok(EntryKind::MimeType.tag()));
		let back = MimeType::read(&mut r, 0).expect("Unable to re-read mime type.");
		assert_eq!(mime, back);
	}
}
