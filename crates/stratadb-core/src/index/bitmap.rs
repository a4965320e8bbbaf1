use roaring::RoaringBitmap;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Sub, SubAssign};
use xxhash_rust::xxh3::Xxh3;

///
/// Bitmap
///
/// Ordered, duplicate-free set of u32 entity primary keys, backed by a
/// compressed roaring encoding. The unit of query evaluation: formulas
/// compute bitmaps, indices store them.
///

#[derive(Clone, Default, PartialEq)]
pub struct Bitmap(RoaringBitmap);

// `RoaringBitmap` implements `PartialEq` but not `Eq`; its equality is a total
// equivalence, so asserting `Eq` for the newtype is sound and preserves the
// `Bitmap: Eq` bound the rest of the crate relies on.
impl Eq for Bitmap {}

impl Bitmap {
    #[must_use]
    pub fn new() -> Self {
        Self(RoaringBitmap::new())
    }

    #[must_use]
    pub fn of(keys: impl IntoIterator<Item = u32>) -> Self {
        Self(keys.into_iter().collect())
    }

    pub fn insert(&mut self, key: u32) -> bool {
        self.0.insert(key)
    }

    pub fn remove(&mut self, key: u32) -> bool {
        self.0.remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: u32) -> bool {
        self.0.contains(key)
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<u32> {
        self.0.min()
    }

    #[must_use]
    pub fn last(&self) -> Option<u32> {
        self.0.max()
    }

    /// Keys in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter()
    }

    /// Materialize the keys into an ascending vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u32> {
        self.0.iter().collect()
    }

    /// Content digest used by structural formula fingerprints.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = Xxh3::new();
        hasher.update(&self.0.len().to_le_bytes());
        for key in &self.0 {
            hasher.update(&key.to_le_bytes());
        }
        hasher.digest()
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.iter()).finish()
    }
}

impl FromIterator<u32> for Bitmap {
    fn from_iter<T: IntoIterator<Item = u32>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl BitAnd for &Bitmap {
    type Output = Bitmap;

    fn bitand(self, rhs: Self) -> Bitmap {
        Bitmap(&self.0 & &rhs.0)
    }
}

impl BitOr for &Bitmap {
    type Output = Bitmap;

    fn bitor(self, rhs: Self) -> Bitmap {
        Bitmap(&self.0 | &rhs.0)
    }
}

impl Sub for &Bitmap {
    type Output = Bitmap;

    fn sub(self, rhs: Self) -> Bitmap {
        Bitmap(&self.0 - &rhs.0)
    }
}

impl BitAndAssign<&Self> for Bitmap {
    fn bitand_assign(&mut self, rhs: &Self) {
        self.0 &= &rhs.0;
    }
}

impl BitOrAssign<&Self> for Bitmap {
    fn bitor_assign(&mut self, rhs: &Self) {
        self.0 |= &rhs.0;
    }
}

impl SubAssign<&Self> for Bitmap {
    fn sub_assign(&mut self, rhs: &Self) {
        self.0 -= &rhs.0;
    }
}

// Storage parts carry bitmaps as portable roaring bytes.

impl Serialize for Bitmap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut bytes = Vec::with_capacity(self.0.serialized_size());
        self.0
            .serialize_into(&mut bytes)
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_bytes(&bytes)
    }
}

impl<'de> Deserialize<'de> for Bitmap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BytesVisitor;

        impl de::Visitor<'_> for BytesVisitor {
            type Value = Bitmap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("portable roaring bitmap bytes")
            }

            fn visit_bytes<E: de::Error>(self, bytes: &[u8]) -> Result<Bitmap, E> {
                RoaringBitmap::deserialize_from(bytes)
                    .map(Bitmap)
                    .map_err(de::Error::custom)
            }

            fn visit_byte_buf<E: de::Error>(self, bytes: Vec<u8>) -> Result<Bitmap, E> {
                self.visit_bytes(&bytes)
            }
        }

        deserializer.deserialize_bytes(BytesVisitor)
    }
}
