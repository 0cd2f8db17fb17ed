use super::*;
use std::io::Cursor;

// -------------------- Construction --------------------

#[test]
fn new_filter_is_empty() {
    let bf = BloomFilter::new();
    assert_eq!(bf.as_bytes().len(), FILTER_BYTES);
    assert_eq!(bf.count_ones(), 0);
}

#[test]
fn empty_filter_rejects_everything() {
    let bf = BloomFilter::new();
    for key in 0..1000u64 {
        assert!(!bf.may_contain(key));
    }
}

// -------------------- Insert / Contains --------------------

#[test]
fn inserted_key_is_found() {
    let mut bf = BloomFilter::new();
    bf.insert(7);
    assert!(bf.may_contain(7));
}

#[test]
fn insert_sets_at_most_k_bits() {
    let mut bf = BloomFilter::new();
    bf.insert(123_456);
    let ones = bf.count_ones();
    assert!(ones >= 1 && ones <= NUM_HASHES as u64);
}

#[test]
fn no_false_negatives_under_heavy_load() {
    // Far more keys than the filter is comfortable with; membership must
    // still hold for every inserted key.
    let keys: Vec<u64> = (0..100_000u64).map(|i| i.wrapping_mul(2_654_435_761)).collect();
    let bf = BloomFilter::from_keys(keys.iter().copied());
    for key in &keys {
        assert!(bf.may_contain(*key), "key {} should be found", key);
    }
}

#[test]
fn boundary_keys_are_found() {
    let bf = BloomFilter::from_keys([0, 1, u64::MAX - 1, u64::MAX]);
    assert!(bf.may_contain(0));
    assert!(bf.may_contain(1));
    assert!(bf.may_contain(u64::MAX - 1));
    assert!(bf.may_contain(u64::MAX));
}

#[test]
fn false_positive_rate_is_low_for_small_runs() {
    let bf = BloomFilter::from_keys(0..1_000u64);

    let mut false_positives = 0;
    for key in 1_000_000..1_010_000u64 {
        if bf.may_contain(key) {
            false_positives += 1;
        }
    }
    assert!(
        false_positives < 100,
        "too many false positives: {} / 10000",
        false_positives
    );
}

// -------------------- Bit access --------------------

#[test]
fn bit_order_is_lsb_first() -> Result<(), BloomError> {
    let mut bf = BloomFilter::new();
    bf.set_bit(9, true)?;
    assert_eq!(bf.as_bytes()[1], 0b0000_0010);
    assert!(bf.bit(9)?);
    assert!(!bf.bit(8)?);

    bf.set_bit(9, false)?;
    assert_eq!(bf.as_bytes()[1], 0);
    Ok(())
}

#[test]
fn last_bit_is_addressable() -> Result<(), BloomError> {
    let mut bf = BloomFilter::new();
    bf.set_bit(FILTER_BITS - 1, true)?;
    assert_eq!(bf.as_bytes()[FILTER_BYTES - 1], 0b1000_0000);
    Ok(())
}

#[test]
fn out_of_range_bit_is_rejected() {
    let mut bf = BloomFilter::new();
    assert_eq!(
        bf.bit(FILTER_BITS),
        Err(BloomError::BitOutOfRange {
            index: FILTER_BITS,
            len: FILTER_BITS
        })
    );
    assert!(bf.set_bit(u64::MAX, true).is_err());
}

// -------------------- Serialization --------------------

#[test]
fn write_read_preserves_membership() {
    let bf = BloomFilter::from_keys((0..500u64).map(|i| i * 3));

    let mut buf = Vec::new();
    bf.write_to(&mut buf).unwrap();
    assert_eq!(buf.len(), FILTER_BYTES);

    let restored = BloomFilter::read_from(&mut Cursor::new(buf)).unwrap();
    assert_eq!(restored, bf);
    for i in 0..500u64 {
        assert!(restored.may_contain(i * 3));
    }
}

#[test]
fn read_from_truncated_input_fails() {
    let short = vec![0u8; FILTER_BYTES - 1];
    assert!(BloomFilter::read_from(&mut Cursor::new(short)).is_err());
}

#[test]
fn from_bytes_checks_length() {
    assert_eq!(
        BloomFilter::from_bytes(vec![0u8; 10]),
        Err(BloomError::BadLength {
            expected: FILTER_BYTES,
            actual: 10
        })
    );
    assert!(BloomFilter::from_bytes(vec![0xff; FILTER_BYTES]).is_ok());
}

#[test]
fn debug_output_reports_load() {
    let bf = BloomFilter::from_keys([1, 2, 3]);
    let dbg = format!("{:?}", bf);
    assert!(dbg.contains("BloomFilter"));
    assert!(dbg.contains("ones"));
}
