/*!
# Sycoca: Service Group Entries
*/

use crate::{
	EntryKind,
	ImageReader,
	ImageWriter,
	SycocaError,
};



#[derive(Debug, Clone, PartialEq)]
/// # A Service (Menu) Group.
///
/// One node of the application menu tree. Children are a mixed list of
/// group and service offsets; materialization reads the type tag at
/// each offset to tell them apart.
pub struct ServiceGroup {
	/// # Image Offset (Zero Until Written).
	pub(crate) offset: u32,

	/// # Relative Path, Trailing Slash ("/" Is the Root).
	pub(crate) path: String,

	/// # Caption.
	pub(crate) caption: String,

	/// # Icon.
	pub(crate) icon: String,

	/// # Hidden From Menus?
	pub(crate) no_display: bool,

	/// # Child Offsets (Groups and Services, Mixed).
	pub(crate) child_offsets: Vec<u32>,
}

impl ServiceGroup {
	/// # New (In-Memory) Group.
	pub(crate) fn new(path: String) -> Self {
		// The default caption is the last path component.
		let caption = path.trim_end_matches('/')
			.rsplit('/')
			.next()
			.unwrap_or_default()
			.to_owned();
		Self {
			offset: 0,
			path,
			caption,
			icon: String::new(),
			no_display: false,
			child_offsets: Vec::new(),
		}
	}

	/// # Serialize (Tag + Payload), Stamping the Offset.
	pub(crate) fn write(&mut self, w: &mut ImageWriter) {
		self.offset = w.pos();
		w.write_i32(EntryKind::ServiceGroup.tag());
		w.write_string(&self.path);
		w.write_string(&self.caption);
		w.write_string(&self.icon);
		w.write_bool(self.no_display);
		w.write_i32(i32::try_from(self.child_offsets.len()).unwrap_or(i32::MAX));
		for &c in &self.child_offsets { w.write_i32(c as i32); }
	}

	/// # Deserialize the Payload.
	pub(crate) fn read(r: &mut ImageReader, offset: u32) -> Result<Self, SycocaError> {
		let path = r.read_string()?;
		let caption = r.read_string()?;
		let icon = r.read_string()?;
		let no_display = r.read_bool()?;
		let len = r.read_list_len()?;
		let mut child_offsets = Vec::with_capacity(len);
		for _ in 0..len {
			let c = r.read_i32()?;
			if c <= 0 { return Err(SycocaError::Corrupt("bad group child offset")); }
			child_offsets.push(c as u32);
		}
		Ok(Self { offset, path, caption, icon, no_display, child_offsets })
	}

	#[must_use]
	/// # Image Offset.
	pub const fn offset(&self) -> u32 { self.offset }

	#[must_use]
	/// # Relative Path.
	pub fn path(&self) -> &str { &self.path }

	#[must_use]
	/// # Group Name (Primary Key).
	///
	/// Groups are keyed by their path.
	pub fn name(&self) -> &str { &self.path }

	#[must_use]
	/// # Caption.
	pub fn caption(&self) -> &str { &self.caption }

	#[must_use]
	/// # Icon.
	pub fn icon(&self) -> &str { &self.icon }

	#[must_use]
	/// # Hidden From Menus?
	pub const fn no_display(&self) -> bool { self.no_display }

	#[must_use]
	/// # Child Offsets.
	pub fn child_offsets(&self) -> &[u32] { &self.child_offsets }
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_caption() {
		assert_eq!(ServiceGroup::new("/".to_owned()).caption(), "");
		assert_eq!(ServiceGroup::new("Office/".to_owned()).caption(), "Office");
		assert_eq!(ServiceGroup::new("Office/Charts/".to_owned()).caption(), "Charts");
	}

	#[test]
	fn t_roundtrip() {
		let mut group = ServiceGroup::new("Office/".to_owned());
		group.icon = "folder-office".to_owned();
		group.child_offsets = vec![40, 80, 120];

		let mut w = ImageWriter::new();
		group.write(&mut w);
		let buf = w.into_vec();

		let mut r = ImageReader::new(&buf);
		assert_eq!(r.read_i32(), Ok(EntryKind::ServiceGroup.tag()));
		let back = ServiceGroup::read(&mut r, 0).expect("Unable to re-read group.");
		assert_eq!(group, back);
	}
}
