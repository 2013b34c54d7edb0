/*!
# Sycoca: String Dictionary
*/

use crate::{
	ImageReader,
	ImageWriter,
	SycocaError,
};



/// # Maximum Seed Attempts Per Bucket.
///
/// Secondary tables are sized so that a random seed succeeds with high
/// probability; this cap only exists so a pathological input cannot
/// spin forever.
const MAX_SEED_TRIES: u32 = 100_000;



#[derive(Debug, Clone, Default)]
/// # String Dictionary.
///
/// Maps an entry's lookup key to the byte offset of that entry in the
/// image, via a two-level hash laid out for allocation-free reads:
///
/// ```text
/// [n:i32]                            // primary slots, power of two (0 = empty dict)
/// n x [slot:i32]                     // 0 empty; >0 entry offset; <0 -(bucket pos)
/// buckets: [seed:u32][m:i32] m x [slot:i32]
/// ```
///
/// Bucket positions are relative to the dictionary's own start so a
/// saved dictionary works standalone or embedded in a larger image.
///
/// Lookups for keys that were never added may return an arbitrary
/// offset; callers must re-verify the entry they land on.
pub(crate) struct StringDict {
	/// # Key/Offset Pairs (Pre-Serialization Form).
	entries: Vec<(String, u32)>,
}

impl StringDict {
	/// # Add a Key.
	///
	/// One entry may be registered under several alias keys; each key
	/// should be added at most once.
	pub(crate) fn add(&mut self, key: &str, offset: u32) {
		if ! key.is_empty() && 0 != offset {
			self.entries.push((key.to_owned(), offset));
		}
	}

	/// # Remove a Key.
	pub(crate) fn remove(&mut self, key: &str) {
		self.entries.retain(|(k, _)| k != key);
	}

	/// # Number of Keys.
	pub(crate) fn count(&self) -> usize { self.entries.len() }

	/// # Serialize.
	pub(crate) fn save(&self, w: &mut ImageWriter) {
		let base = w.pos();

		// Identical keys cannot be teased apart by any seed; keep the
		// most recently added one, mirroring the in-memory behavior.
		let mut entries: Vec<(&str, u32)> = Vec::with_capacity(self.entries.len());
		for (key, offset) in self.entries.iter().rev() {
			if entries.iter().all(|&(k, _)| k != key.as_str()) {
				entries.push((key.as_str(), *offset));
			}
		}

		if entries.is_empty() {
			w.write_i32(0);
			return;
		}

		// Primary table: double the next power of two keeps the load
		// factor under one half.
		let n = (entries.len().next_power_of_two() * 2).max(2);
		let mask = (n as u32) - 1;

		// Group the keys by primary slot.
		let mut slots: Vec<Vec<usize>> = vec![Vec::new(); n];
		for (idx, (key, _)) in entries.iter().enumerate() {
			slots[(hash(key, 0) & mask) as usize].push(idx);
		}

		// Lay out the primary table with placeholders, then the buckets.
		w.write_i32(n as i32);
		let table_pos = w.pos();
		for _ in 0..n { w.write_i32(0); }

		for (slot_idx, members) in slots.iter().enumerate() {
			let slot_pos = table_pos + (slot_idx as u32) * 4;
			match members.len() {
				0 => {},
				1 => {
					let offset = entries[members[0]].1;
					w.patch_i32(slot_pos, offset as i32);
				},
				_ => {
					let rel = w.pos() - base;
					w.patch_i32(slot_pos, -(rel as i32));
					Self::save_bucket(w, &entries, members);
				},
			}
		}
	}

	/// # Serialize One Collision Bucket.
	///
	/// Searches seeds until every colliding key lands in a distinct
	/// secondary slot; the quadratic table size makes that quick.
	fn save_bucket(w: &mut ImageWriter, entries: &[(&str, u32)], members: &[usize]) {
		let m = (members.len() * members.len()).next_power_of_two();
		let mask = (m as u32) - 1;
		let mut table = vec![0_i32; m];

		let mut seed = 1_u32;
		'seeds: while seed < MAX_SEED_TRIES {
			table.iter_mut().for_each(|v| *v = 0);
			for &idx in members {
				let (key, offset) = entries[idx];
				let slot = (hash(key, seed) & mask) as usize;
				if 0 != table[slot] {
					seed += 1;
					continue 'seeds;
				}
				table[slot] = offset as i32;
			}
			break;
		}

		w.write_u32(seed);
		w.write_i32(m as i32);
		for v in table { w.write_i32(v); }
	}

	/// # Look Up a Key in a Serialized Dictionary.
	///
	/// `base` is the absolute position of the dictionary within the
	/// image. Returns the entry offset, or zero for "no candidate".
	/// Corruption (truncation, nonsense sizes) also reads as zero; the
	/// caller's re-verification covers both cases.
	pub(crate) fn find_string(image: &[u8], base: u32, key: &str) -> u32 {
		find_string_inner(image, base, key).unwrap_or(0)
	}
}

/// # Fallible Lookup Body.
fn find_string_inner(image: &[u8], base: u32, key: &str) -> Result<u32, SycocaError> {
	let mut r = ImageReader::new(image);
	r.seek(base);

	let n = r.read_i32()?;
	if n <= 0 || ! (n as u32).is_power_of_two() { return Ok(0); }
	let mask = (n as u32) - 1;

	r.seek(base + 4 + (hash(key, 0) & mask) * 4);
	let slot = r.read_i32()?;
	if 0 <= slot { return Ok(slot as u32); }

	// Negative values point at a collision bucket.
	let rel = slot.unsigned_abs();
	r.seek(base + rel);
	let seed = r.read_u32()?;
	let m = r.read_i32()?;
	if m <= 0 || ! (m as u32).is_power_of_two() { return Ok(0); }
	let mask = (m as u32) - 1;

	r.seek(base + rel + 8 + (hash(key, seed) & mask) * 4);
	let found = r.read_i32()?;
	if found < 0 { Ok(0) }
	else { Ok(found as u32) }
}

/// # Key Hash.
///
/// Seed zero is the primary hash; buckets re-hash with their own seed.
/// CRC32 is deterministic across builds and processes, which matters
/// because the hashes are baked into the on-disk layout.
fn hash(key: &str, seed: u32) -> u32 {
	let mut h = crc32fast::Hasher::new_with_initial(seed);
	h.update(key.as_bytes());
	h.finalize()
}



#[cfg(test)]
mod test {
	use super::*;

	/// # Save and Reload Helper.
	fn saved(dict: &StringDict) -> Vec<u8> {
		let mut w = ImageWriter::new();
		dict.save(&mut w);
		w.into_vec()
	}

	#[test]
	fn t_standard() {
		// The classic use: entry names to offsets, including a remove
		// and re-add along the way.
		let names = [
			"DictTestPluginType",
			"KUriFilter/Plugin",
			"KDataTool",
			"KCModule",
			"KScan/KScanDialog",
			"Browser/View",
			"Plasma/Applet",
			"Plasma/Runner",
		];

		let mut dict = StringDict::default();
		for (idx, name) in names.iter().enumerate() {
			dict.add(name, (idx as u32 + 1) * 40);
		}
		dict.remove("DictTestPluginType");
		dict.add("DictTestPluginType", 40);
		assert_eq!(dict.count(), names.len());

		let buf = saved(&dict);
		for (idx, name) in names.iter().enumerate() {
			let offset = StringDict::find_string(&buf, 0, name);
			assert_eq!(offset, (idx as u32 + 1) * 40, "Wrong offset for {name}.");
		}

		// Absent keys may return anything; all we can promise is that
		// the call neither panics nor errors.
		let _offset = StringDict::find_string(&buf, 0, "doesnotexist");
	}

	#[test]
	fn t_empty() {
		let dict = StringDict::default();
		let buf = saved(&dict);
		assert_eq!(StringDict::find_string(&buf, 0, "anything"), 0);
	}

	#[test]
	fn t_embedded() {
		// The same dictionary must resolve when parked in the middle of
		// a larger image.
		let mut dict = StringDict::default();
		dict.add("fakeservice", 123);
		dict.add("faketextplugin", 456);

		let mut w = ImageWriter::new();
		w.write_i64(0); // Unrelated leading bytes.
		let base = w.pos();
		dict.save(&mut w);
		let buf = w.into_vec();

		assert_eq!(StringDict::find_string(&buf, base, "fakeservice"), 123);
		assert_eq!(StringDict::find_string(&buf, base, "faketextplugin"), 456);
	}

	#[test]
	fn t_collisions() {
		// Enough keys to force multi-key primary slots.
		let mut dict = StringDict::default();
		let keys: Vec<String> = (0..500).map(|i| format!("service-{i}.desktop")).collect();
		for (idx, key) in keys.iter().enumerate() {
			dict.add(key, idx as u32 + 1);
		}

		let buf = saved(&dict);
		for (idx, key) in keys.iter().enumerate() {
			assert_eq!(
				StringDict::find_string(&buf, 0, key),
				idx as u32 + 1,
				"Wrong offset for {key}.",
			);
		}
	}

	#[test]
	fn t_truncated() {
		let mut dict = StringDict::default();
		dict.add("fakepart", 99);
		let buf = saved(&dict);

		// Chopping the image anywhere should yield zero, not a panic.
		for len in 0..buf.len() {
			let _offset = StringDict::find_string(&buf[..len], 0, "fakepart");
		}
	}
}
