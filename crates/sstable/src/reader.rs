use bloom::BloomFilter;
use byteorder::{LittleEndian, ReadBytesExt};
use memtable::Value;
use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::SSTableError;
use crate::format::{Header, INDEX_ENTRY_BYTES, RUN_PREFIX_BYTES};

/// One slot of a run's in-memory index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: u64,
    /// Absolute file offset of the value's first byte.
    pub offset: u32,
}

/// Handle to one immutable run on disk.
///
/// [`open`](SSTableReader::open) loads the header, the filter and the full
/// index into memory; values stay on disk. The file is opened for each read
/// and closed straight after, so a handle holds no descriptor.
pub struct SSTableReader {
    path: PathBuf,
    header: Header,
    filter: BloomFilter,
    index: Vec<IndexEntry>,
    file_len: u64,
}

impl SSTableReader {
    pub(crate) fn from_parts(
        path: PathBuf,
        header: Header,
        filter: BloomFilter,
        index: Vec<IndexEntry>,
        file_len: u64,
    ) -> Self {
        Self {
            path,
            header,
            filter,
            index,
            file_len,
        }
    }

    /// Opens a run file and loads its header, filter and index.
    ///
    /// # Validation
    ///
    /// - The file holds at least the 10272-byte prefix plus the index.
    /// - `pairs` is non-zero and index keys are strictly ascending.
    /// - The first and last index keys match `min_key` and `max_key`.
    /// - Offsets start right after the index, never decrease, and stay
    ///   inside the file.
    ///
    /// # Errors
    ///
    /// [`SSTableError::Corrupt`] on any violation, [`SSTableError::Io`] on
    /// read failure.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SSTableError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |e| SSTableError::io(&path, e);

        let file = File::open(&path).map_err(io_err)?;
        let file_len = file.metadata().map_err(io_err)?.len();
        if file_len < RUN_PREFIX_BYTES {
            return Err(SSTableError::corrupt(
                &path,
                format!("{} bytes is shorter than the run prefix", file_len),
            ));
        }

        let mut r = BufReader::new(file);
        let header = Header::read_from(&mut r).map_err(io_err)?;
        if header.pairs == 0 {
            return Err(SSTableError::corrupt(&path, "header reports zero pairs"));
        }
        let data_start = header
            .pairs
            .checked_mul(INDEX_ENTRY_BYTES)
            .and_then(|n| n.checked_add(RUN_PREFIX_BYTES))
            .filter(|&end| end <= file_len)
            .ok_or_else(|| {
                SSTableError::corrupt(
                    &path,
                    format!("index of {} pairs does not fit in the file", header.pairs),
                )
            })?;

        let filter = BloomFilter::read_from(&mut r).map_err(io_err)?;

        let mut index = Vec::with_capacity(header.pairs as usize);
        for _ in 0..header.pairs {
            let key = r.read_u64::<LittleEndian>().map_err(io_err)?;
            let offset = r.read_u32::<LittleEndian>().map_err(io_err)?;
            index.push(IndexEntry { key, offset });
        }

        Self::validate(&path, &header, &index, data_start, file_len)?;

        Ok(Self {
            path,
            header,
            filter,
            index,
            file_len,
        })
    }

    fn validate(
        path: &Path,
        header: &Header,
        index: &[IndexEntry],
        data_start: u64,
        file_len: u64,
    ) -> Result<(), SSTableError> {
        let (first, last) = match (index.first(), index.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(SSTableError::corrupt(path, "empty index")),
        };
        if first.key != header.min_key || last.key != header.max_key {
            return Err(SSTableError::corrupt(
                path,
                format!(
                    "index spans {}-{} but header says {}-{}",
                    first.key, last.key, header.min_key, header.max_key
                ),
            ));
        }
        if u64::from(first.offset) != data_start {
            return Err(SSTableError::corrupt(
                path,
                format!(
                    "first value offset {} is not the data start {}",
                    first.offset, data_start
                ),
            ));
        }
        for pair in index.windows(2) {
            if pair[0].key >= pair[1].key {
                return Err(SSTableError::corrupt(
                    path,
                    format!("index key {} follows {}", pair[1].key, pair[0].key),
                ));
            }
            if pair[0].offset > pair[1].offset {
                return Err(SSTableError::corrupt(
                    path,
                    format!("value offset {} follows {}", pair[1].offset, pair[0].offset),
                ));
            }
        }
        if u64::from(last.offset) > file_len {
            return Err(SSTableError::corrupt(
                path,
                format!("value offset {} is past end of file", last.offset),
            ));
        }
        Ok(())
    }

    /// Byte range `[start, end)` of the value at index position `pos`.
    fn value_span(&self, pos: usize) -> (u64, u64) {
        let start = u64::from(self.index[pos].offset);
        let end = self
            .index
            .get(pos + 1)
            .map_or(self.file_len, |next| u64::from(next.offset));
        (start, end)
    }

    /// Reads the values of index positions `[from, to)` with one seek.
    fn read_values(&self, from: usize, to: usize) -> Result<Vec<(u64, Value)>, SSTableError> {
        if from >= to {
            return Ok(Vec::new());
        }
        let (start, _) = self.value_span(from);
        let (_, end) = self.value_span(to - 1);

        let io_err = |e| SSTableError::io(&self.path, e);
        let mut file = File::open(&self.path).map_err(io_err)?;
        file.seek(SeekFrom::Start(start)).map_err(io_err)?;
        let mut buf = vec![0u8; (end - start) as usize];
        file.read_exact(&mut buf).map_err(io_err)?;

        Ok((from..to)
            .map(|pos| {
                let (s, e) = self.value_span(pos);
                let bytes = buf[(s - start) as usize..(e - start) as usize].to_vec();
                (self.index[pos].key, Value::decode(bytes))
            })
            .collect())
    }

    /// Point lookup.
    ///
    /// Keys outside `[min_key, max_key]` or rejected by the filter return
    /// `Ok(None)` without touching the disk. A hit may be a tombstone.
    pub fn get(&self, key: u64) -> Result<Option<Value>, SSTableError> {
        if key < self.header.min_key || key > self.header.max_key {
            return Ok(None);
        }
        if !self.filter.may_contain(key) {
            return Ok(None);
        }
        let pos = match self.index.binary_search_by_key(&key, |e| e.key) {
            Ok(pos) => pos,
            // filter false positive
            Err(_) => return Ok(None),
        };
        Ok(self.read_values(pos, pos + 1)?.pop().map(|(_, v)| v))
    }

    /// Every record in key order, tombstones included.
    pub fn full_scan(&self) -> Result<Vec<(u64, Value)>, SSTableError> {
        self.read_values(0, self.index.len())
    }

    /// Records with keys in `[start, end]`, tombstones included.
    ///
    /// # Errors
    ///
    /// [`SSTableError::ScanStartBeyondRun`] if `start > max_key`.
    pub fn range_scan(&self, start: u64, end: u64) -> Result<Vec<(u64, Value)>, SSTableError> {
        if start > self.header.max_key {
            return Err(SSTableError::ScanStartBeyondRun {
                path: self.path.clone(),
                key: start,
                max_key: self.header.max_key,
            });
        }
        let from = self.index.partition_point(|e| e.key < start);
        let to = self.index.partition_point(|e| e.key <= end);
        self.read_values(from, to.max(from))
    }

    /// Consumes the handle and removes its file.
    pub fn delete(self) -> Result<(), SSTableError> {
        fs::remove_file(&self.path).map_err(|e| SSTableError::io(&self.path, e))?;
        debug!(path = %self.path.display(), "deleted run");
        Ok(())
    }

    /// `true` if `[min, max]` intersects this run's key range.
    #[must_use]
    pub fn overlaps(&self, min: u64, max: u64) -> bool {
        self.header.min_key <= max && min <= self.header.max_key
    }

    /// Iterates index keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = u64> + '_ {
        self.index.iter().map(|e| e.key)
    }

    pub fn index(&self) -> &[IndexEntry] {
        &self.index
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn filter(&self) -> &BloomFilter {
        &self.filter
    }

    pub fn timestamp(&self) -> u64 {
        self.header.timestamp
    }

    pub fn min_key(&self) -> u64 {
        self.header.min_key
    }

    pub fn max_key(&self) -> u64 {
        self.header.max_key
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for SSTableReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SSTableReader")
            .field("path", &self.path)
            .field("timestamp", &self.header.timestamp)
            .field("min_key", &self.header.min_key)
            .field("max_key", &self.header.max_key)
            .field("pairs", &self.header.pairs)
            .finish()
    }
}
