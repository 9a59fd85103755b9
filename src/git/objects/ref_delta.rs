use crate::error::CoreError;
use crate::git::objects::ObjectTrait;
use crate::git::objects::ofs_delta::OfsDelta;
use crate::git::objects::types::ObjectType;
use crate::sha::HashValue;
use bytes::{Bytes, BytesMut};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefDelta {
    pub id: HashValue,
    pub base_sha: HashValue,
    pub delta_data: Bytes,
}

impl RefDelta {
    /// Applies this delta's instruction stream against the already-resolved
    /// base object bytes. The instruction format is identical to ofs-delta's.
    pub fn apply_delta(base_obj: &Bytes, delta_data: &Bytes) -> Result<Bytes, CoreError> {
        OfsDelta::apply_delta(base_obj, delta_data)
    }

    pub fn new(base_sha: HashValue, delta_data: Bytes, hash_version: impl Fn(&Bytes) -> HashValue) -> Self {
        let mut hash_input = Vec::new();
        hash_input.extend_from_slice(format!("ref-delta {}\0", delta_data.len()).as_bytes());
        hash_input.extend_from_slice(&delta_data);
        let id = hash_version(&Bytes::from(hash_input));
        Self {
            id,
            base_sha,
            delta_data,
        }
    }

    /// The first `hash_len` bytes are the base object's raw (binary, not
    /// hex) sha1/sha256; the rest is the compressed instruction stream.
    pub fn parse(
        mut input: BytesMut,
        hash_len: usize,
        hash_version: impl Fn(&Bytes) -> HashValue,
    ) -> Result<Self, CoreError> {
        if input.len() < hash_len {
            return Err(CoreError::PackBroken("truncated ref-delta base sha".into()));
        }
        let base_sha_bytes = input.split_to(hash_len);
        let base_sha = HashValue::from_bytes(&base_sha_bytes)
            .ok_or_else(|| CoreError::PackBroken("malformed ref-delta base sha".into()))?;
        Ok(RefDelta::new(base_sha, Bytes::from(input), hash_version))
    }

    pub fn size(&self) -> usize {
        self.delta_data.len()
    }
}

impl ObjectTrait for RefDelta {
    fn get_type(&self) -> ObjectType {
        ObjectType::RefDelta
    }

    fn get_size(&self) -> usize {
        self.delta_data.len()
    }

    fn get_data(&self) -> Bytes {
        self.delta_data.clone()
    }
}

impl std::fmt::Display for RefDelta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Type: RefDelta")?;
        writeln!(f, "Base SHA: {}", self.base_sha)?;
        writeln!(f, "Size: {}", self.delta_data.len())
    }
}
