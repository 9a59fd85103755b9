use crate::error::CoreError;
use crate::git::objects::ObjectTrait;
use crate::git::objects::types::ObjectType;
use crate::sha::HashValue;
use crate::varint::read_le7;
use bytes::{Bytes, BytesMut};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfsDelta {
    pub id: HashValue,
    /// Positive distance from this object's pack offset back to its base's
    /// pack offset: `base_offset = this_offset - reverse_offset`.
    pub reverse_offset: u64,
    pub delta_data: Bytes,
}

impl OfsDelta {
    /// Applies a delta instruction stream (base-size varint, result-size
    /// varint, then a sequence of copy/insert opcodes) against a fully
    /// materialized base object.
    pub fn apply_delta(base_obj: &Bytes, obj_bytes: &Bytes) -> Result<Bytes, CoreError> {
        let bad_delta = |msg: &str| CoreError::PackBroken(format!("delta instruction error: {msg}"));

        let (base_size, mut pos) =
            read_le7(obj_bytes).ok_or_else(|| bad_delta("truncated base size"))?;
        let (result_size, consumed) =
            read_le7(&obj_bytes[pos..]).ok_or_else(|| bad_delta("truncated result size"))?;
        pos += consumed;

        if base_size as usize != base_obj.len() {
            return Err(CoreError::PackBroken(format!(
                "delta base size mismatch: header said {base_size}, base object is {}",
                base_obj.len()
            )));
        }

        let mut out = Vec::with_capacity(result_size as usize);

        while pos < obj_bytes.len() {
            let opcode = obj_bytes[pos];
            pos += 1;

            if opcode & 0x80 != 0 {
                let mut copy_offset: u64 = 0;
                let mut copy_size: u64 = 0;
                for (bit, shift) in [(0x01, 0), (0x02, 8), (0x04, 16), (0x08, 24)] {
                    if opcode & bit != 0 {
                        let byte = *obj_bytes.get(pos).ok_or_else(|| bad_delta("truncated copy offset"))?;
                        copy_offset |= (byte as u64) << shift;
                        pos += 1;
                    }
                }
                for (bit, shift) in [(0x10, 0), (0x20, 8), (0x40, 16)] {
                    if opcode & bit != 0 {
                        let byte = *obj_bytes.get(pos).ok_or_else(|| bad_delta("truncated copy size"))?;
                        copy_size |= (byte as u64) << shift;
                        pos += 1;
                    }
                }
                if copy_size == 0 {
                    copy_size = 0x10000;
                }
                let end = copy_offset
                    .checked_add(copy_size)
                    .ok_or_else(|| bad_delta("copy range overflow"))?;
                if end > base_obj.len() as u64 {
                    return Err(bad_delta("copy range exceeds base object"));
                }
                out.extend_from_slice(&base_obj[copy_offset as usize..end as usize]);
            } else if opcode != 0 {
                let insert_size = opcode as usize;
                let end = pos
                    .checked_add(insert_size)
                    .filter(|&e| e <= obj_bytes.len())
                    .ok_or_else(|| bad_delta("truncated insert literal"))?;
                out.extend_from_slice(&obj_bytes[pos..end]);
                pos = end;
            } else {
                return Err(bad_delta("reserved opcode 0"));
            }
        }

        if out.len() as u64 != result_size {
            return Err(CoreError::PackBroken(format!(
                "delta result size mismatch: header said {result_size}, produced {}",
                out.len()
            )));
        }
        Ok(Bytes::from(out))
    }
}

impl OfsDelta {
    pub fn new(reverse_offset: u64, delta_data: Bytes, hash_version: impl Fn(&Bytes) -> HashValue) -> Self {
        let mut hash_input = Vec::new();
        hash_input.extend_from_slice(format!("ofs-delta {}\0", delta_data.len()).as_bytes());
        hash_input.extend_from_slice(&delta_data);
        let id = hash_version(&Bytes::from(hash_input));
        Self {
            id,
            reverse_offset,
            delta_data,
        }
    }

    /// Decodes the ofs-delta reverse-offset encoding: the first byte
    /// contributes its low 7 bits directly; each subsequent continuation
    /// byte adds one (to account for the encoding never producing a
    /// redundant zero byte) before shifting left 7 and adding its own 7
    /// bits. Returns `(reverse_offset, bytes_consumed)`; does not validate
    /// the offset against any particular pack position.
    pub fn read_reverse_offset(input: &[u8]) -> Result<(u64, usize), CoreError> {
        let bad = || CoreError::PackBroken("truncated ofs-delta offset".to_string());
        let mut i = 0usize;
        let first = *input.get(i).ok_or_else(bad)?;
        i += 1;
        let mut offset = (first & 0x7F) as u64;
        let mut more = first & 0x80 != 0;
        while more {
            let byte = *input.get(i).ok_or_else(bad)?;
            i += 1;
            offset += 1;
            offset = (offset << 7) + (byte & 0x7F) as u64;
            more = byte & 0x80 != 0;
        }
        Ok((offset, i))
    }

    pub fn parse(
        mut input: BytesMut,
        current_offset: u64,
        hash_version: impl Fn(&Bytes) -> HashValue,
    ) -> Result<Self, CoreError> {
        let (offset, consumed) = Self::read_reverse_offset(&input)?;
        if offset == 0 || offset > current_offset {
            return Err(CoreError::PackBroken(format!(
                "ofs-delta reverse offset {offset} out of range at pack offset {current_offset}"
            )));
        }
        let delta_data = input.split_off(consumed);
        Ok(OfsDelta::new(offset, Bytes::from(delta_data), hash_version))
    }

    pub fn size(&self) -> usize {
        self.delta_data.len()
    }

    pub fn base_pack_offset(&self, this_offset: u64) -> u64 {
        this_offset - self.reverse_offset
    }
}

impl ObjectTrait for OfsDelta {
    fn get_type(&self) -> ObjectType {
        ObjectType::OfsDelta
    }

    fn get_size(&self) -> usize {
        self.delta_data.len()
    }

    fn get_data(&self) -> Bytes {
        self.delta_data.clone()
    }
}

impl std::fmt::Display for OfsDelta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Type: OfsDelta")?;
        writeln!(f, "Reverse offset: {}", self.reverse_offset)?;
        writeln!(f, "Size: {}", self.delta_data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sha::HashVersion;

    fn sha1(data: &Bytes) -> HashValue {
        HashVersion::Sha1.hash(data.clone())
    }

    #[test]
    fn applies_copy_and_insert_instructions() {
        let base = Bytes::from_static(b"the quick brown fox");
        assert_eq!(base.len(), 19);

        let mut delta = BytesMut::new();
        delta.extend_from_slice(&[19]); // base_size varint
        delta.extend_from_slice(&[22]); // result_size varint
        // copy(offset=0, size=9): opcode 0x80 | 0x01 | 0x10, offset byte 0, size byte 9
        delta.extend_from_slice(&[0b1001_0001, 0, 9]);
        // insert("red ")
        delta.extend_from_slice(&[4]);
        delta.extend_from_slice(b"red ");
        // copy(offset=10, size=9): 0x80|0x01|0x10
        delta.extend_from_slice(&[0b1001_0001, 10, 9]);

        let result = OfsDelta::apply_delta(&base, &delta.freeze()).unwrap();
        assert_eq!(result, Bytes::from_static(b"the quickred brown fox"));
        assert_eq!(result.len(), 22);
    }

    #[test]
    fn copy_size_zero_means_65536() {
        let base = Bytes::from(vec![7u8; 0x10000]);
        let mut delta = BytesMut::new();
        delta.extend_from_slice(&[0x80, 0x80, 0x04]); // base_size = 0x10000 (varint)
        delta.extend_from_slice(&[0x80, 0x80, 0x04]); // result_size = 0x10000
        // copy(offset=0, size=0 -> 65536): mask 0x01 for offset byte, no size bytes
        delta.extend_from_slice(&[0b1000_0001, 0]);
        let result = OfsDelta::apply_delta(&base, &delta.freeze()).unwrap();
        assert_eq!(result.len(), 0x10000);
    }

    #[test]
    fn rejects_base_size_mismatch() {
        let base = Bytes::from_static(b"short");
        let mut delta = BytesMut::new();
        delta.extend_from_slice(&[19]);
        delta.extend_from_slice(&[5]);
        assert!(OfsDelta::apply_delta(&base, &delta.freeze()).is_err());
    }

    #[test]
    fn parses_single_byte_offset() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x05]); // offset = 5, no continuation
        buf.extend_from_slice(b"rest");
        let parsed = OfsDelta::parse(buf, 100, sha1).unwrap();
        assert_eq!(parsed.reverse_offset, 5);
        assert_eq!(parsed.base_pack_offset(100), 95);
        assert_eq!(&parsed.delta_data[..], b"rest");
    }

    #[test]
    fn parses_multi_byte_offset() {
        // two bytes: first=0x81 (cont, low=1), second=0x00
        // offset = 1; then offset = (1+1)<<7 + 0 = 256
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x81, 0x00]);
        let parsed = OfsDelta::parse(buf, 1000, sha1).unwrap();
        assert_eq!(parsed.reverse_offset, 256);
    }

    #[test]
    fn rejects_offset_exceeding_current_pack_offset() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x7F]);
        assert!(OfsDelta::parse(buf, 10, sha1).is_err());
    }
}
