/*!
# Sycoca: Factories
*/

use crate::{
	EntryKind,
	FlatMap,
	ImageReader,
	MAX_ENTRIES,
	MimeType,
	Service,
	ServiceGroup,
	ServiceType,
	StringDict,
	SycocaError,
	sycoca::{
		Header,
		Image,
	},
};
use std::{
	cell::RefCell,
	sync::Arc,
};



/// # A Factory-Managed Entry.
///
/// The seam between the generic lookup plumbing and the four concrete
/// record types: each kind knows its tag, how to read its payload, and
/// which keys it answers to (dictionary hits are only trusted after
/// re-verification, since absent keys may alias arbitrary slots).
pub(crate) trait FactoryEntry: Sized {
	/// # Entry Kind (Type Tag).
	const KIND: EntryKind;

	/// # Deserialize the Payload (Tag Already Consumed).
	fn read_entry(r: &mut ImageReader, offset: u32) -> Result<Self, SycocaError>;

	/// # Primary Key.
	fn key_name(&self) -> &str;

	/// # Does This Entry Answer to the Key?
	fn matches_key(&self, key: &str) -> bool { self.key_name() == key }
}

impl FactoryEntry for ServiceType {
	const KIND: EntryKind = EntryKind::ServiceType;
	fn read_entry(r: &mut ImageReader, offset: u32) -> Result<Self, SycocaError> {
		Self::read(r, offset)
	}
	fn key_name(&self) -> &str { self.name() }
}

impl FactoryEntry for Service {
	const KIND: EntryKind = EntryKind::Service;
	fn read_entry(r: &mut ImageReader, offset: u32) -> Result<Self, SycocaError> {
		Self::read(r, offset)
	}
	fn key_name(&self) -> &str { self.name() }

	/// # Services Answer to Several Aliases.
	///
	/// Name, entry path, storage id (with or without extension), and
	/// menu id all resolve to the same record.
	fn matches_key(&self, key: &str) -> bool {
		self.name() == key ||
		self.entry_path() == key ||
		self.storage_id() == key ||
		( ! self.menu_id().is_empty() && self.menu_id() == key )
	}
}

impl FactoryEntry for ServiceGroup {
	const KIND: EntryKind = EntryKind::ServiceGroup;
	fn read_entry(r: &mut ImageReader, offset: u32) -> Result<Self, SycocaError> {
		Self::read(r, offset)
	}
	fn key_name(&self) -> &str { self.path() }
}

impl FactoryEntry for MimeType {
	const KIND: EntryKind = EntryKind::MimeType;
	fn read_entry(r: &mut ImageReader, offset: u32) -> Result<Self, SycocaError> {
		Self::read(r, offset)
	}
	fn key_name(&self) -> &str { self.name() }
}



#[derive(Debug)]
/// # A Factory.
///
/// One per entry kind per reader snapshot. Owns the offsets of its
/// dictionary and all-entries list within the image, plus a small
/// cache of already-materialized entries; the image itself is shared
/// (refcounted) with the reader and the sibling factories.
///
/// Factories open with their snapshot and die with it; the `Arc`
/// entries they hand out may live on.
pub(crate) struct Factory<T> {
	/// # The Mapped Image.
	image: Arc<Image>,

	/// # Offset of the All-Entries List.
	all_offset: u32,

	/// # Offset of the Lookup Dictionary.
	dict_offset: u32,

	/// # Materialized Entries, By Offset.
	cache: RefCell<FlatMap<u32, Arc<T>>>,
}

impl<T: FactoryEntry> Factory<T> {
	/// # Open a Factory.
	///
	/// `factory_offset` comes from the header table and points at the
	/// factory body: `[all_entries_offset][dict_offset]`.
	pub(crate) fn open(image: Arc<Image>, factory_offset: u32) -> Result<Self, SycocaError> {
		let mut r = ImageReader::new(&image);
		r.seek(factory_offset);
		let all_offset = r.read_i32()?;
		let dict_offset = r.read_i32()?;
		if all_offset <= 0 || dict_offset <= 0 {
			return Err(SycocaError::Corrupt("bad factory header"));
		}
		Ok(Self {
			all_offset: all_offset as u32,
			dict_offset: dict_offset as u32,
			image,
			cache: RefCell::new(FlatMap::default()),
		})
	}

	/// # Materialize the Entry at an Offset.
	///
	/// The type tag at the offset must match this factory's kind;
	/// anything else is corruption (e.g. a dict slot pointing into the
	/// wrong factory's territory).
	pub(crate) fn by_offset(&self, offset: u32) -> Result<Arc<T>, SycocaError> {
		if let Some(out) = self.cache.borrow().get(&offset) {
			return Ok(out.clone());
		}

		let mut r = ImageReader::new(&self.image);
		r.seek(offset);
		let tag = r.read_i32()?;
		if EntryKind::from_tag(tag) != Some(T::KIND) {
			return Err(SycocaError::Corrupt("type tag mismatch"));
		}

		let out = Arc::new(T::read_entry(&mut r, offset)?);
		self.cache.borrow_mut().insert(offset, out.clone());
		Ok(out)
	}

	/// # Find By Key.
	///
	/// Dictionary lookup, seek, verify, materialize. A clean miss is
	/// `Ok(None)`; only structural damage errors.
	pub(crate) fn find_by_key(&self, key: &str) -> Result<Option<Arc<T>>, SycocaError> {
		if key.is_empty() { return Ok(None); }
		let offset = StringDict::find_string(&self.image, self.dict_offset, key);
		if offset == 0 { return Ok(None); }

		// The dictionary may hand back an arbitrary offset for keys it
		// never saw. A tag mismatch down this path is therefore a miss,
		// not corruption; a key that hashes into a foreign factory is
		// indistinguishable from one that was never added.
		match self.by_offset(offset) {
			Ok(entry) =>
				if entry.matches_key(key) { Ok(Some(entry)) }
				else { Ok(None) },
			Err(_) => Ok(None),
		}
	}

	/// # Every Entry, In Written Order.
	pub(crate) fn all(&self) -> Result<Vec<Arc<T>>, SycocaError> {
		let mut r = ImageReader::new(&self.image);
		r.seek(self.all_offset);
		let count = r.read_i32()?;
		let count = usize::try_from(count)
			.ok()
			.filter(|&c| c <= MAX_ENTRIES)
			.ok_or(SycocaError::Corrupt("implausible entry count"))?;

		let mut offsets = Vec::with_capacity(count);
		for _ in 0..count {
			let off = r.read_i32()?;
			if off <= 0 { return Err(SycocaError::Corrupt("bad all-list offset")); }
			offsets.push(off as u32);
		}

		offsets.into_iter().map(|off| self.by_offset(off)).collect()
	}
}



#[derive(Debug, Default)]
/// # The Four Factories of a Snapshot.
///
/// A factory is absent when the header table has no body for its kind
/// (the synthesized empty database has none at all); queries against
/// an absent factory come up empty rather than failing.
pub(crate) struct Factories {
	/// # Services.
	services: Option<Factory<Service>>,

	/// # Service Types.
	service_types: Option<Factory<ServiceType>>,

	/// # Service Groups.
	groups: Option<Factory<ServiceGroup>>,

	/// # Mime Types.
	mime_types: Option<Factory<MimeType>>,
}

impl Factories {
	/// # Open Every Factory the Header Advertises.
	pub(crate) fn open(image: &Arc<Image>, header: &Header) -> Result<Self, SycocaError> {
		/// # Open One, If Present.
		fn one<T: FactoryEntry>(image: &Arc<Image>, header: &Header)
		-> Result<Option<Factory<T>>, SycocaError> {
			header.factory_offset(T::KIND)
				.map(|off| Factory::open(image.clone(), off))
				.transpose()
		}

		Ok(Self {
			services: one(image, header)?,
			service_types: one(image, header)?,
			groups: one(image, header)?,
			mime_types: one(image, header)?,
		})
	}

	/// # Service Factory.
	pub(crate) const fn services(&self) -> Option<&Factory<Service>> {
		self.services.as_ref()
	}

	/// # Service Type Factory.
	pub(crate) const fn service_types(&self) -> Option<&Factory<ServiceType>> {
		self.service_types.as_ref()
	}

	/// # Service Group Factory.
	pub(crate) const fn groups(&self) -> Option<&Factory<ServiceGroup>> {
		self.groups.as_ref()
	}

	/// # Mime Type Factory.
	pub(crate) const fn mime_types(&self) -> Option<&Factory<MimeType>> {
		self.mime_types.as_ref()
	}
}
