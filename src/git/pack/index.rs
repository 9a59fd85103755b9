use crate::error::CoreError;
use crate::sha::{HashValue, HashVersion};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::io::Read;

const IDX_MAGIC: [u8; 4] = [0xFF, 0x74, 0x4F, 0x63];
const IDX_VERSION: u32 = 2;
const LARGE_OFFSET_BIT: u32 = 0x8000_0000;

#[derive(Debug, Clone)]
pub struct PackIndexEntry {
    pub offset: u64,
    pub crc32: u32,
}

/// Parsed `.idx` v2 file: maps sha1 to pack offset/crc, and inverts the
/// offset table for the reverse lookup delta resolution needs.
#[derive(Debug, Clone)]
pub struct PackIndex {
    pub pack_checksum: Vec<u8>,
    pub index_checksum: Vec<u8>,
    dict_offset: HashMap<HashValue, PackIndexEntry>,
    dict_offset_to_sha1: BTreeMap<u64, HashValue>,
}

impl PackIndex {
    pub fn offset_of(&self, sha1: &HashValue) -> Option<u64> {
        self.dict_offset.get(sha1).map(|e| e.offset)
    }

    pub fn entry_of(&self, sha1: &HashValue) -> Option<&PackIndexEntry> {
        self.dict_offset.get(sha1)
    }

    pub fn sha1_at_offset(&self, offset: u64) -> Option<&HashValue> {
        self.dict_offset_to_sha1.get(&offset)
    }

    pub fn len(&self) -> usize {
        self.dict_offset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict_offset.is_empty()
    }

    /// Parses the de-facto v2 `.idx` layout: magic, version, 256-entry
    /// fanout table, sorted sha table, crc table, offset table (with
    /// large-offset indirection), then pack and index checksums.
    pub fn load(data: &[u8], hash_version: HashVersion) -> Result<PackIndex, CoreError> {
        let bad = |msg: &str| CoreError::PackBroken(format!("idx file: {msg}"));
        let hash_len = hash_version.len();

        if data.len() < 8 {
            return Err(bad("too short for header"));
        }
        if data[0..4] != IDX_MAGIC {
            return Err(CoreError::PackBroken(
                "idx v1 (no magic header) is not supported".into(),
            ));
        }
        let version = u32::from_be_bytes(data[4..8].try_into().unwrap());
        if version != IDX_VERSION {
            return Err(CoreError::PackBroken(format!("unsupported idx version {version}")));
        }

        let mut pos = 8usize;
        let fanout_start = pos;
        if data.len() < fanout_start + 256 * 4 {
            return Err(bad("truncated fanout table"));
        }
        let mut fanout = [0u32; 256];
        for i in 0..256 {
            fanout[i] = u32::from_be_bytes(
                data[fanout_start + i * 4..fanout_start + i * 4 + 4]
                    .try_into()
                    .unwrap(),
            );
        }
        pos += 256 * 4;
        let count = fanout[255] as usize;

        let sha_table_start = pos;
        let sha_table_len = count * hash_len;
        if data.len() < sha_table_start + sha_table_len {
            return Err(bad("truncated sha table"));
        }
        let mut shas = Vec::with_capacity(count);
        for i in 0..count {
            let start = sha_table_start + i * hash_len;
            let raw = &data[start..start + hash_len];
            let id = HashValue::from_bytes(&bytes::BytesMut::from(raw))
                .ok_or_else(|| bad("malformed sha table entry"))?;
            shas.push(id);
        }
        pos = sha_table_start + sha_table_len;

        let crc_table_start = pos;
        if data.len() < crc_table_start + count * 4 {
            return Err(bad("truncated crc table"));
        }
        let mut crcs = Vec::with_capacity(count);
        for i in 0..count {
            let start = crc_table_start + i * 4;
            crcs.push(u32::from_be_bytes(data[start..start + 4].try_into().unwrap()));
        }
        pos = crc_table_start + count * 4;

        let offset_table_start = pos;
        if data.len() < offset_table_start + count * 4 {
            return Err(bad("truncated offset table"));
        }
        let mut raw_offsets = Vec::with_capacity(count);
        let mut large_offset_count = 0usize;
        for i in 0..count {
            let start = offset_table_start + i * 4;
            let v = u32::from_be_bytes(data[start..start + 4].try_into().unwrap());
            if v & LARGE_OFFSET_BIT != 0 {
                large_offset_count = large_offset_count.max((v & !LARGE_OFFSET_BIT) as usize + 1);
            }
            raw_offsets.push(v);
        }
        pos = offset_table_start + count * 4;

        let large_table_start = pos;
        let large_table_len = large_offset_count * 8;
        if data.len() < large_table_start + large_table_len {
            return Err(bad("truncated large-offset table"));
        }
        pos = large_table_start + large_table_len;

        if data.len() < pos + hash_len * 2 {
            return Err(bad("truncated trailer"));
        }
        let pack_checksum = data[pos..pos + hash_len].to_vec();
        pos += hash_len;
        let index_checksum = data[pos..pos + hash_len].to_vec();

        let mut dict_offset = HashMap::with_capacity(count);
        let mut dict_offset_to_sha1 = BTreeMap::new();
        for i in 0..count {
            let raw = raw_offsets[i];
            let offset = if raw & LARGE_OFFSET_BIT != 0 {
                let idx = (raw & !LARGE_OFFSET_BIT) as usize;
                let start = large_table_start + idx * 8;
                u64::from_be_bytes(data[start..start + 8].try_into().unwrap())
            } else {
                raw as u64
            };
            dict_offset.insert(
                shas[i].clone(),
                PackIndexEntry {
                    offset,
                    crc32: crcs[i],
                },
            );
            dict_offset_to_sha1.insert(offset, shas[i].clone());
        }

        Ok(PackIndex {
            pack_checksum,
            index_checksum,
            dict_offset,
            dict_offset_to_sha1,
        })
    }

    pub fn load_file(path: &std::path::Path, hash_version: HashVersion) -> Result<PackIndex, CoreError> {
        let mut file = std::fs::File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Self::load(&data, hash_version)
    }
}

/// Verifies a single entry's data against its recorded CRC32.
pub fn verify_crc(entry: &PackIndexEntry, raw_object_bytes: &[u8]) -> bool {
    crc32fast::hash(raw_object_bytes) == entry.crc32
}
