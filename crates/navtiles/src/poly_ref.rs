//! Polygon reference encoding
//!
//! A [`PolyRef`] packs `salt | tile index | poly index` into 32 bits. The
//! widths of the tile and poly fields follow the mesh capacities; the salt gets
//! the remaining bits. Salts start at 1 and never wrap to 0, so a live
//! reference is never the null reference.

use super::nav_common::{ilog2, next_pow2};
use super::{PolyRef, Result, Status};

/// Minimum number of salt bits a mesh configuration must leave
pub const MIN_SALT_BITS: u32 = 10;

#[inline]
fn mask(bits: u32) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}

/// Bit layout of the references of one mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefCodec {
    salt_bits: u32,
    tile_bits: u32,
    poly_bits: u32,
}

impl RefCodec {
    /// Derives the layout for the given capacities
    ///
    /// Fails with [`Status::InvalidParam`] when a capacity is zero or when
    /// fewer than [`MIN_SALT_BITS`] remain for the salt.
    pub fn new(max_tiles: usize, max_polys: usize) -> Result<Self> {
        if max_tiles == 0 || max_polys == 0 {
            return Err(Status::InvalidParam);
        }
        let max_tiles = u32::try_from(max_tiles).map_err(|_| Status::InvalidParam)?;
        let max_polys = u32::try_from(max_polys).map_err(|_| Status::InvalidParam)?;
        if max_tiles > 1 << 30 || max_polys > 1 << 30 {
            return Err(Status::InvalidParam);
        }

        let tile_bits = ilog2(next_pow2(max_tiles));
        let poly_bits = ilog2(next_pow2(max_polys));
        let used = tile_bits + poly_bits;
        if used > 32 - MIN_SALT_BITS {
            return Err(Status::InvalidParam);
        }

        Ok(Self {
            salt_bits: 32 - used,
            tile_bits,
            poly_bits,
        })
    }

    pub fn salt_bits(&self) -> u32 {
        self.salt_bits
    }

    pub fn tile_bits(&self) -> u32 {
        self.tile_bits
    }

    pub fn poly_bits(&self) -> u32 {
        self.poly_bits
    }

    /// Number of polygons a single tile can address
    pub fn max_polys(&self) -> usize {
        1usize << self.poly_bits
    }

    /// Packs a reference
    #[inline]
    pub fn encode(&self, salt: u32, tile_index: u32, poly_index: u32) -> PolyRef {
        let salt = salt & mask(self.salt_bits);
        let tile = tile_index & mask(self.tile_bits);
        let poly = poly_index & mask(self.poly_bits);
        PolyRef::new(
            (salt << (self.poly_bits + self.tile_bits)) | (tile << self.poly_bits) | poly,
        )
    }

    /// Unpacks a reference into `(salt, tile_index, poly_index)`
    #[inline]
    pub fn decode(&self, reference: PolyRef) -> (u32, u32, u32) {
        let id = reference.id();
        (
            self.decode_salt(reference),
            (id >> self.poly_bits) & mask(self.tile_bits),
            id & mask(self.poly_bits),
        )
    }

    #[inline]
    pub fn decode_salt(&self, reference: PolyRef) -> u32 {
        (reference.id() >> (self.poly_bits + self.tile_bits)) & mask(self.salt_bits)
    }

    #[inline]
    pub fn decode_tile(&self, reference: PolyRef) -> u32 {
        (reference.id() >> self.poly_bits) & mask(self.tile_bits)
    }

    #[inline]
    pub fn decode_poly(&self, reference: PolyRef) -> u32 {
        reference.id() & mask(self.poly_bits)
    }

    /// Salt that follows `salt` after a tile slot is recycled
    #[inline]
    pub fn next_salt(&self, salt: u32) -> u32 {
        let next = salt.wrapping_add(1) & mask(self.salt_bits);
        if next == 0 {
            1
        } else {
            next
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_widths_round_to_pow2() -> Result<()> {
        let codec = RefCodec::new(100, 1000)?;
        assert_eq!(codec.tile_bits(), 7);
        assert_eq!(codec.poly_bits(), 10);
        assert_eq!(codec.salt_bits(), 15);
        assert_eq!(codec.max_polys(), 1024);
        Ok(())
    }

    #[test]
    fn test_single_tile_layout() -> Result<()> {
        let codec = RefCodec::new(1, 1)?;
        assert_eq!(codec.tile_bits(), 0);
        assert_eq!(codec.poly_bits(), 0);
        assert_eq!(codec.salt_bits(), 32);

        let r = codec.encode(7, 0, 0);
        assert_eq!(codec.decode(r), (7, 0, 0));
        Ok(())
    }

    #[test]
    fn test_rejects_small_salt_budget() {
        assert_eq!(RefCodec::new(1 << 12, 1 << 12), Err(Status::InvalidParam));
        assert_eq!(RefCodec::new(0, 16), Err(Status::InvalidParam));
        assert!(RefCodec::new(1 << 11, 1 << 11).is_ok());
    }

    #[test]
    fn test_encode_decode_fields() -> Result<()> {
        let codec = RefCodec::new(256, 4096)?;
        let r = codec.encode(3, 200, 4000);
        assert_eq!(codec.decode_salt(r), 3);
        assert_eq!(codec.decode_tile(r), 200);
        assert_eq!(codec.decode_poly(r), 4000);
        assert!(r.is_valid());
        Ok(())
    }

    #[test]
    fn test_live_reference_is_never_null() -> Result<()> {
        let codec = RefCodec::new(64, 64)?;
        assert!(codec.encode(1, 0, 0).is_valid());
        Ok(())
    }

    #[test]
    fn test_salt_skips_zero() -> Result<()> {
        let codec = RefCodec::new(1 << 11, 1 << 11)?;
        let max_salt = (1u32 << codec.salt_bits()) - 1;
        assert_eq!(codec.next_salt(1), 2);
        assert_eq!(codec.next_salt(max_salt), 1);
        Ok(())
    }
}
