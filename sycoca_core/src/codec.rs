/*!
# Sycoca: Codec
*/

use crate::{
	MAX_LIST_LEN,
	MAX_STRING_BYTES,
	PropertyValue,
	SycocaError,
};
use std::collections::BTreeMap;



/// # Size Of i32.
const SIZE_I32: usize = std::mem::size_of::<i32>();

/// # Size Of i64.
const SIZE_I64: usize = std::mem::size_of::<i64>();



#[derive(Debug, Clone, Default)]
/// # Image Writer.
///
/// Serializes the pinned little-endian cache layout into a growable
/// buffer, tracking the write position so entries can stamp their own
/// offsets, and supporting in-place backfill of the forward references
/// (factory table, dict and all-list offsets) that cannot be known
/// until later sections have been laid out.
pub(crate) struct ImageWriter {
	/// # Buffer.
	buf: Vec<u8>,
}

impl ImageWriter {
	/// # New (Empty) Image.
	pub(crate) const fn new() -> Self { Self { buf: Vec::new() } }

	/// # Current Position.
	///
	/// Positions are stored in the image as `i32`, so the writer refuses
	/// to grow past `i32::MAX` by way of a panic-free saturation; real
	/// databases top out in the low megabytes.
	pub(crate) fn pos(&self) -> u32 {
		u32::try_from(self.buf.len()).unwrap_or(u32::MAX)
	}

	/// # Write a Signed 32-Bit Integer.
	pub(crate) fn write_i32(&mut self, v: i32) {
		self.buf.extend_from_slice(v.to_le_bytes().as_slice());
	}

	/// # Write an Unsigned 32-Bit Integer.
	pub(crate) fn write_u32(&mut self, v: u32) {
		self.buf.extend_from_slice(v.to_le_bytes().as_slice());
	}

	/// # Write a Signed 64-Bit Integer.
	pub(crate) fn write_i64(&mut self, v: i64) {
		self.buf.extend_from_slice(v.to_le_bytes().as_slice());
	}

	/// # Write a Byte.
	pub(crate) fn write_u8(&mut self, v: u8) { self.buf.push(v); }

	/// # Write a Boolean.
	pub(crate) fn write_bool(&mut self, v: bool) { self.buf.push(u8::from(v)); }

	/// # Write a String.
	///
	/// Strings are stored as a `u32` byte count followed by UTF-16LE
	/// code units (two bytes each).
	pub(crate) fn write_string(&mut self, v: &str) {
		let start = self.buf.len();
		self.write_u32(0); // Placeholder for the byte count.
		for unit in v.encode_utf16() {
			self.buf.extend_from_slice(unit.to_le_bytes().as_slice());
		}
		let len = u32::try_from(self.buf.len() - start - SIZE_I32).unwrap_or(u32::MAX);
		self.patch_u32(start as u32, len);
	}

	/// # Write a String List.
	pub(crate) fn write_string_list<S>(&mut self, v: &[S])
	where S: AsRef<str> {
		self.write_i32(i32::try_from(v.len()).unwrap_or(i32::MAX));
		for s in v { self.write_string(s.as_ref()); }
	}

	/// # Write a Property Map.
	///
	/// Keys are written in sorted order so identical inputs always
	/// produce identical bytes.
	pub(crate) fn write_property_map(&mut self, v: &BTreeMap<String, PropertyValue>) {
		self.write_i32(i32::try_from(v.len()).unwrap_or(i32::MAX));
		for (k, value) in v {
			self.write_string(k);
			value.write(self);
		}
	}

	/// # Reserve an i32 Slot.
	///
	/// Write a zero and return its position for later backfill.
	pub(crate) fn reserve_i32(&mut self) -> u32 {
		let pos = self.pos();
		self.write_i32(0);
		pos
	}

	/// # Backfill a Signed 32-Bit Integer.
	///
	/// Positions must have been produced by this writer; out-of-range
	/// patches are ignored rather than panicking.
	pub(crate) fn patch_i32(&mut self, pos: u32, v: i32) {
		let pos = pos as usize;
		if let Some(chunk) = self.buf.get_mut(pos..pos + SIZE_I32) {
			chunk.copy_from_slice(v.to_le_bytes().as_slice());
		}
	}

	/// # Backfill an Unsigned 32-Bit Integer.
	pub(crate) fn patch_u32(&mut self, pos: u32, v: u32) {
		let pos = pos as usize;
		if let Some(chunk) = self.buf.get_mut(pos..pos + SIZE_I32) {
			chunk.copy_from_slice(v.to_le_bytes().as_slice());
		}
	}

	/// # Consume, Returning the Bytes.
	pub(crate) fn into_vec(self) -> Vec<u8> { self.buf }
}



#[derive(Debug, Clone, Copy)]
/// # Image Reader.
///
/// A cursor over a (possibly memory-mapped) cache image. Every read is
/// bounds-checked; running off the end or past a sanity limit yields
/// [`SycocaError::Corrupt`] rather than a panic, because the bytes may
/// be anything at all after a partial write or disk fault.
pub(crate) struct ImageReader<'a> {
	/// # The Full Image.
	bytes: &'a [u8],

	/// # Read Cursor.
	pos: usize,
}

impl<'a> ImageReader<'a> {
	/// # New Reader (At Position Zero).
	pub(crate) const fn new(bytes: &'a [u8]) -> Self { Self { bytes, pos: 0 } }

	/// # Current Position.
	pub(crate) const fn pos(&self) -> usize { self.pos }

	/// # Jump to an Absolute Position.
	pub(crate) fn seek(&mut self, pos: u32) { self.pos = pos as usize; }

	/// # Read Raw Bytes.
	fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], SycocaError> {
		let end = self.pos.checked_add(len)
			.filter(|&end| end <= self.bytes.len())
			.ok_or(SycocaError::Corrupt("read past end of image"))?;
		let out = &self.bytes[self.pos..end];
		self.pos = end;
		Ok(out)
	}

	/// # Read a Signed 32-Bit Integer.
	pub(crate) fn read_i32(&mut self) -> Result<i32, SycocaError> {
		let raw = self.read_bytes(SIZE_I32)?;
		Ok(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
	}

	/// # Read an Unsigned 32-Bit Integer.
	pub(crate) fn read_u32(&mut self) -> Result<u32, SycocaError> {
		let raw = self.read_bytes(SIZE_I32)?;
		Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
	}

	/// # Read a Signed 64-Bit Integer.
	pub(crate) fn read_i64(&mut self) -> Result<i64, SycocaError> {
		let raw = self.read_bytes(SIZE_I64)?;
		let mut buf = [0_u8; SIZE_I64];
		buf.copy_from_slice(raw);
		Ok(i64::from_le_bytes(buf))
	}

	/// # Read a Byte.
	pub(crate) fn read_u8(&mut self) -> Result<u8, SycocaError> {
		self.read_bytes(1).map(|raw| raw[0])
	}

	/// # Read a Boolean.
	pub(crate) fn read_bool(&mut self) -> Result<bool, SycocaError> {
		self.read_u8().map(|v| v == 1)
	}

	/// # Read a String.
	pub(crate) fn read_string(&mut self) -> Result<String, SycocaError> {
		let len = self.read_u32()? as usize;
		if MAX_STRING_BYTES < len || 0 != len % 2 {
			return Err(SycocaError::Corrupt("oversized or misaligned string"));
		}
		let raw = self.read_bytes(len)?;
		let units: Vec<u16> = raw.chunks_exact(2)
			.map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
			.collect();
		String::from_utf16(&units)
			.map_err(|_| SycocaError::Corrupt("invalid UTF-16 string"))
	}

	/// # Read a String List.
	pub(crate) fn read_string_list(&mut self) -> Result<Vec<String>, SycocaError> {
		let len = self.read_list_len()?;
		let mut out = Vec::new();
		out.try_reserve_exact(len).map_err(|_| SycocaError::Corrupt("oversized list"))?;
		for _ in 0..len { out.push(self.read_string()?); }
		Ok(out)
	}

	/// # Read a Property Map.
	pub(crate) fn read_property_map(&mut self) -> Result<BTreeMap<String, PropertyValue>, SycocaError> {
		let len = self.read_list_len()?;
		let mut out = BTreeMap::new();
		for _ in 0..len {
			let k = self.read_string()?;
			let v = PropertyValue::read(self)?;
			out.insert(k, v);
		}
		Ok(out)
	}

	/// # Read and Sanity-Check a List Length.
	pub(crate) fn read_list_len(&mut self) -> Result<usize, SycocaError> {
		let len = self.read_i32()?;
		usize::try_from(len)
			.ok()
			.filter(|&len| len <= MAX_LIST_LEN)
			.ok_or(SycocaError::Corrupt("implausible list length"))
	}
}
