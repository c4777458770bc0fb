//! A dense bit vector over row indices, used as the result mask of a scan.
//!
//! On disk a [`BitVector`] is an 8-byte little-endian bit length followed by the packed 64-bit
//! words, also little-endian. There is no other header.

use std::{
  fs::File,
  io::{self, BufReader, BufWriter, Read, Write},
  path::Path,
};

use crate::error::{Error, Result};

const WORD_BITS: u64 = 64;
const WORD_BYTES: usize = std::mem::size_of::<u64>();

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitVector {
  nbits: u64,
  words: Vec<u64>,
}

impl BitVector {
  /// Create a bit vector of `nbits` bits, all unset.
  pub fn new(nbits: u64) -> Self {
    let mut bv = BitVector::default();
    bv.resize(nbits);
    bv
  }

  /// Reallocate to `nbits` bits. Every bit is cleared, including the ones that survive the resize.
  pub fn resize(&mut self, nbits: u64) {
    self.nbits = nbits;
    self.words.clear();
    self.words.resize(words_for(nbits), 0);
  }

  pub fn len(&self) -> u64 {
    self.nbits
  }

  pub fn is_empty(&self) -> bool {
    self.nbits == 0
  }

  pub fn set(&mut self, index: u64, bit: bool) -> Result<()> {
    self.check_bounds(index)?;
    let (word, mask) = locate(index);
    if bit {
      self.words[word] |= mask;
    } else {
      self.words[word] &= !mask;
    }
    Ok(())
  }

  pub fn get(&self, index: u64) -> Result<bool> {
    self.check_bounds(index)?;
    let (word, mask) = locate(index);
    Ok(self.words[word] & mask != 0)
  }

  /// Number of set bits.
  pub fn count(&self) -> u64 {
    self.words.iter().map(|w| w.count_ones() as u64).sum()
  }

  pub fn words(&self) -> &[u64] {
    &self.words
  }

  /// Scan kernels fill whole words at once. Callers must leave bits past `len()` unset.
  pub(crate) fn words_mut(&mut self) -> &mut [u64] {
    &mut self.words
  }

  /// Iterate over the indices of set bits in ascending order.
  pub fn iter_ones(&self) -> impl Iterator<Item = u64> + '_ {
    self
      .words
      .iter()
      .enumerate()
      .flat_map(|(word_idx, &word)| {
        let base = word_idx as u64 * WORD_BITS;
        let mut remaining = word;
        std::iter::from_fn(move || {
          if remaining == 0 {
            return None;
          }
          let bit = remaining.trailing_zeros() as u64;
          remaining &= remaining - 1;
          Some(base + bit)
        })
      })
  }

  pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
    writer.write_all(&self.nbits.to_le_bytes())?;
    for word in &self.words {
      writer.write_all(&word.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
  }

  /// Read a bit vector written by [`BitVector::write_to`].
  ///
  /// Fails with [`Error::Format`] when the header or the payload is cut short.
  pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
    let mut header = [0u8; WORD_BYTES];
    read_exact_or(&mut reader, &mut header, "truncated bit vector header")?;
    let nbits = u64::from_le_bytes(header);

    let word_count = words_for(nbits);
    let payload_len = (word_count as u64)
      .checked_mul(WORD_BYTES as u64)
      .ok_or_else(|| Error::Format(format!("bit vector length {nbits} is not addressable")))?;

    // Read through `take` so a corrupt header cannot force a huge allocation up front.
    let mut payload = Vec::new();
    reader.take(payload_len).read_to_end(&mut payload)?;
    if payload.len() as u64 != payload_len {
      return Err(Error::Format(format!(
        "truncated bit vector payload: expected {payload_len} bytes, found {}",
        payload.len()
      )));
    }

    let mut words = Vec::with_capacity(word_count);
    words.extend(payload.chunks_exact(WORD_BYTES).map(|chunk| {
      let mut buf = [0u8; WORD_BYTES];
      buf.copy_from_slice(chunk);
      u64::from_le_bytes(buf)
    }));

    let tail = nbits % WORD_BITS;
    if tail != 0 {
      if let Some(last) = words.last_mut() {
        *last &= (1u64 << tail) - 1;
      }
    }

    Ok(BitVector { nbits, words })
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    let file = File::create(path)?;
    self.write_to(BufWriter::new(file))
  }

  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let file = File::open(path)?;
    Self::read_from(BufReader::new(file))
  }

  fn check_bounds(&self, index: u64) -> Result<()> {
    if index >= self.nbits {
      return Err(Error::OutOfRange {
        index,
        len: self.nbits,
      });
    }
    Ok(())
  }
}

impl FromIterator<bool> for BitVector {
  /// Pack a sequence of bits, one per row, into a bit vector of the same length.
  fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
    let mut nbits = 0u64;
    let mut words = Vec::new();
    let mut acc = 0u64;
    for bit in iter {
      acc |= (bit as u64) << (nbits % WORD_BITS);
      nbits += 1;
      if nbits % WORD_BITS == 0 {
        words.push(acc);
        acc = 0;
      }
    }
    if nbits % WORD_BITS != 0 {
      words.push(acc);
    }
    BitVector { nbits, words }
  }
}

#[inline]
fn words_for(nbits: u64) -> usize {
  nbits.div_ceil(WORD_BITS) as usize
}

#[inline]
fn locate(index: u64) -> (usize, u64) {
  ((index / WORD_BITS) as usize, 1u64 << (index % WORD_BITS))
}

fn read_exact_or<R: Read>(reader: &mut R, buf: &mut [u8], message: &str) -> Result<()> {
  reader.read_exact(buf).map_err(|err| match err.kind() {
    io::ErrorKind::UnexpectedEof => Error::Format(message.to_string()),
    _ => Error::Io(err),
  })
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use rand::{rngs::SmallRng, Rng, SeedableRng};
  use rstest::rstest;

  use super::*;

  #[test]
  fn test_set_get_count() {
    // 17 bits spans a single word with a partial tail
    let mut bv = BitVector::new(17);
    bv.set(0, true).unwrap();
    bv.set(3, true).unwrap();
    bv.set(16, true).unwrap();

    assert!(bv.get(0).unwrap());
    assert!(bv.get(3).unwrap());
    assert!(bv.get(16).unwrap());
    assert!(!bv.get(1).unwrap());
    assert_eq!(3, bv.count());

    bv.set(3, false).unwrap();
    assert!(!bv.get(3).unwrap());
    assert_eq!(2, bv.count());
  }

  #[test]
  fn test_out_of_range() {
    let mut bv = BitVector::new(64);
    assert!(matches!(
      bv.set(64, true),
      Err(Error::OutOfRange { index: 64, len: 64 })
    ));
    assert!(matches!(bv.get(100), Err(Error::OutOfRange { .. })));

    let empty = BitVector::new(0);
    assert!(empty.is_empty());
    assert!(empty.get(0).is_err());
  }

  #[test]
  fn test_resize_clears() {
    let mut bv = BitVector::new(10);
    bv.set(5, true).unwrap();
    bv.resize(130);
    assert_eq!(130, bv.len());
    assert_eq!(3, bv.words().len());
    assert_eq!(0, bv.count());
  }

  #[rstest]
  #[case(0)]
  #[case(1)]
  #[case(63)]
  #[case(64)]
  #[case(65)]
  #[case(1000)]
  fn test_save_load(#[case] nbits: u64) {
    let mut rng = SmallRng::seed_from_u64(nbits);
    let mut bv = BitVector::new(nbits);
    for i in 0..nbits {
      if rng.gen_ratio(1, 3) {
        bv.set(i, true).unwrap();
      }
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mask.bin");
    bv.save(&path).unwrap();

    let loaded = BitVector::load(&path).unwrap();
    assert_eq!(bv, loaded);
    assert_eq!(bv.count(), loaded.count());
  }

  #[test]
  fn test_layout() {
    let mut bv = BitVector::new(65);
    bv.set(0, true).unwrap();
    bv.set(64, true).unwrap();

    let mut bytes = Vec::new();
    bv.write_to(&mut bytes).unwrap();

    assert_eq!(8 + 2 * 8, bytes.len());
    assert_eq!(65u64.to_le_bytes(), bytes[0..8]);
    assert_eq!(1u64.to_le_bytes(), bytes[8..16]);
    assert_eq!(1u64.to_le_bytes(), bytes[16..24]);
  }

  #[test]
  fn test_truncated_header() {
    let err = BitVector::read_from(Cursor::new(vec![1u8, 2, 3])).unwrap_err();
    assert!(matches!(err, Error::Format(msg) if msg.contains("header")));
  }

  #[test]
  fn test_truncated_payload() {
    let mut bytes = 100u64.to_le_bytes().to_vec();
    // 100 bits need two words, supply one and a half
    bytes.extend_from_slice(&[0xff; 12]);
    let err = BitVector::read_from(Cursor::new(bytes)).unwrap_err();
    assert!(matches!(err, Error::Format(msg) if msg.contains("payload")));
  }

  #[test]
  fn test_load_masks_tail_bits() {
    let mut bytes = 3u64.to_le_bytes().to_vec();
    bytes.extend_from_slice(&u64::MAX.to_le_bytes());
    let bv = BitVector::read_from(Cursor::new(bytes)).unwrap();
    assert_eq!(3, bv.count());
  }

  #[rstest]
  #[case(0)]
  #[case(5)]
  #[case(64)]
  #[case(129)]
  fn test_from_iter(#[case] nbits: u64) {
    let bv: BitVector = (0..nbits).map(|i| i % 3 == 0).collect();
    assert_eq!(nbits, bv.len());
    assert_eq!(words_for(nbits), bv.words().len());
    for i in 0..nbits {
      assert_eq!(i % 3 == 0, bv.get(i).unwrap());
    }
    assert_eq!(nbits.div_ceil(3), bv.count());
  }

  #[test]
  fn test_iter_ones() {
    let mut bv = BitVector::new(200);
    for i in [0, 7, 63, 64, 128, 199] {
      bv.set(i, true).unwrap();
    }
    assert_eq!(
      vec![0, 7, 63, 64, 128, 199],
      bv.iter_ones().collect::<Vec<_>>()
    );
  }
}
