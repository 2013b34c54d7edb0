/*!
# Sycoca: Property Values
*/

use crate::{
	ImageReader,
	ImageWriter,
	SycocaError,
};



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Declared Property Type.
///
/// Service types may declare a schema for the properties of the
/// services implementing them (`[PropertyDef::Key]` groups). Values
/// read through such a declaration are coerced to the declared scalar
/// type instead of whatever shape they happened to be stored in.
pub enum PropertyType {
	/// # Boolean.
	Bool,

	/// # Floating Point.
	Double,

	/// # Integer.
	Int,

	/// # String.
	String,

	/// # String List.
	StringList,
}

impl PropertyType {
	/// # From Declaration.
	///
	/// Parse a `Type=` declaration. Unknown declarations fall back to
	/// plain strings rather than failing the build.
	pub(crate) fn from_declaration(raw: &str) -> Self {
		match raw.trim() {
			"bool" => Self::Bool,
			"double" => Self::Double,
			"int" => Self::Int,
			"stringlist" | "QStringList" => Self::StringList,
			_ => Self::String,
		}
	}

	/// # Serialization Tag.
	pub(crate) const fn tag(self) -> u8 {
		match self {
			Self::Bool => 1,
			Self::Double => 2,
			Self::Int => 3,
			Self::String => 4,
			Self::StringList => 5,
		}
	}

	/// # From Serialization Tag.
	pub(crate) const fn from_tag(tag: u8) -> Option<Self> {
		match tag {
			1 => Some(Self::Bool),
			2 => Some(Self::Double),
			3 => Some(Self::Int),
			4 => Some(Self::String),
			5 => Some(Self::StringList),
			_ => None,
		}
	}
}



#[derive(Debug, Clone, PartialEq)]
/// # Property Value.
///
/// The scalar variants a desktop-entry property can hold once typed.
/// Values parsed straight from a desktop file start life as strings or
/// string lists; [`PropertyValue::coerce`] reshapes them on demand.
pub enum PropertyValue {
	/// # Boolean.
	Bool(bool),

	/// # Floating Point.
	Double(f64),

	/// # Integer.
	Int(i64),

	/// # String.
	String(String),

	/// # String List.
	StringList(Vec<String>),
}

impl PropertyValue {
	/// # Coerce to a Declared Type.
	///
	/// Returns `None` when the stored value cannot be read as the
	/// declared type; comparisons against such a value evaluate false.
	///
	/// Numeric parsing always uses `.` as the decimal separator, no
	/// matter the active locale.
	pub(crate) fn coerce(&self, ty: PropertyType) -> Option<Self> {
		match (self, ty) {
			(Self::Bool(_), PropertyType::Bool) |
			(Self::Double(_), PropertyType::Double) |
			(Self::Int(_), PropertyType::Int) |
			(Self::String(_), PropertyType::String) |
			(Self::StringList(_), PropertyType::StringList) => Some(self.clone()),

			(Self::String(s), PropertyType::Bool) => parse_bool(s).map(Self::Bool),
			(Self::String(s), PropertyType::Double) => s.trim().parse::<f64>().ok().map(Self::Double),
			(Self::String(s), PropertyType::Int) => s.trim().parse::<i64>().ok().map(Self::Int),
			(Self::String(s), PropertyType::StringList) =>
				Some(Self::StringList(crate::desktop::split_list(s))),

			(Self::Int(n), PropertyType::Double) => Some(Self::Double(*n as f64)),
			(Self::Int(n), PropertyType::String) => Some(Self::String(n.to_string())),
			(Self::Double(n), PropertyType::String) => Some(Self::String(n.to_string())),
			(Self::Bool(b), PropertyType::String) => Some(Self::String(b.to_string())),

			_ => None,
		}
	}

	/// # Serialize.
	pub(crate) fn write(&self, w: &mut ImageWriter) {
		match self {
			Self::Bool(v) => {
				w.write_u8(PropertyType::Bool.tag());
				w.write_bool(*v);
			},
			Self::Double(v) => {
				w.write_u8(PropertyType::Double.tag());
				w.write_i64(v.to_bits() as i64);
			},
			Self::Int(v) => {
				w.write_u8(PropertyType::Int.tag());
				w.write_i64(*v);
			},
			Self::String(v) => {
				w.write_u8(PropertyType::String.tag());
				w.write_string(v);
			},
			Self::StringList(v) => {
				w.write_u8(PropertyType::StringList.tag());
				w.write_string_list(v);
			},
		}
	}

	/// # Deserialize.
	pub(crate) fn read(r: &mut ImageReader) -> Result<Self, SycocaError> {
		let tag = r.read_u8()?;
		match PropertyType::from_tag(tag) {
			Some(PropertyType::Bool) => r.read_bool().map(Self::Bool),
			Some(PropertyType::Double) =>
				r.read_i64().map(|bits| Self::Double(f64::from_bits(bits as u64))),
			Some(PropertyType::Int) => r.read_i64().map(Self::Int),
			Some(PropertyType::String) => r.read_string().map(Self::String),
			Some(PropertyType::StringList) => r.read_string_list().map(Self::StringList),
			None => Err(SycocaError::Corrupt("unknown property tag")),
		}
	}
}

/// # Parse a Desktop Boolean.
pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
	match raw.trim() {
		"true" | "1" | "on" => Some(true),
		"false" | "0" | "off" => Some(false),
		_ => None,
	}
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_roundtrip() {
		for v in [
			PropertyValue::Bool(true),
			PropertyValue::Double(4.56),
			PropertyValue::Int(-33),
			PropertyValue::String("katepart".to_owned()),
			PropertyValue::StringList(vec!["http".to_owned(), "ftp".to_owned()]),
		] {
			let mut w = crate::ImageWriter::new();
			v.write(&mut w);
			let buf = w.into_vec();
			let mut r = crate::ImageReader::new(&buf);
			assert_eq!(PropertyValue::read(&mut r), Ok(v));
		}
	}

	#[test]
	fn t_coerce() {
		let raw = PropertyValue::String("4.56".to_owned());
		assert_eq!(
			raw.coerce(PropertyType::Double),
			Some(PropertyValue::Double(4.56)),
		);
		assert_eq!(raw.coerce(PropertyType::Int), None);
		assert_eq!(
			PropertyValue::String("true".to_owned()).coerce(PropertyType::Bool),
			Some(PropertyValue::Bool(true)),
		);
		assert_eq!(
			PropertyValue::String("nope".to_owned()).coerce(PropertyType::Bool),
			None,
		);
	}

}
