use crate::git::objects::types::ObjectType;
use bytes::Bytes;

pub mod blob;
pub mod commit;
pub mod ofs_delta;
pub mod ref_delta;
pub mod signature;
pub mod tag;
pub mod tree;
pub mod types;

pub trait ObjectTrait {
    fn get_type(&self) -> ObjectType;
    fn get_size(&self) -> usize;
    fn get_data(&self) -> Bytes;
}

/// A single delta instruction: copy a span from the fully reconstructed
/// base object, or insert literal bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaInstruction {
    Copy { offset: u64, size: u64 },
    Insert(Bytes),
}
