use crate::error::CoreError;
use crate::git::objects::types::ObjectType;
use crate::sha::{HashValue, HashVersion};
use bytes::Bytes;
use flate2::read::ZlibDecoder;
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// A decoded loose object: the type/size header has been stripped and
/// validated against the inflated body length.
pub struct LooseObject {
    pub object_type: ObjectType,
    pub data: Bytes,
}

/// Reads `.git/objects/XX/YYYY…` loose objects. Enumeration is lazy: only
/// sha1 → path is recorded up front, inflation happens per-read.
pub struct LooseReader {
    objects_dir: PathBuf,
    hash_version: HashVersion,
    paths: HashMap<HashValue, PathBuf>,
}

impl LooseReader {
    pub fn open(objects_dir: &Path, hash_version: HashVersion) -> Result<Self, CoreError> {
        let mut paths = HashMap::new();
        let hex_len = hash_version.len() * 2;
        if objects_dir.is_dir() {
            for top in fs::read_dir(objects_dir)? {
                let top = top?;
                let top_path = top.path();
                let Some(dir_name) = top_path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if dir_name.len() != 2 || dir_name == "pack" || dir_name == "info" {
                    continue;
                }
                if !top_path.is_dir() {
                    continue;
                }
                for inner in fs::read_dir(&top_path)? {
                    let inner = inner?;
                    let file_name = inner.file_name();
                    let Some(rest) = file_name.to_str() else { continue };
                    let hex = format!("{dir_name}{rest}");
                    if hex.len() != hex_len || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                        continue;
                    }
                    if let Some(id) = HashValue::from_str(&hex) {
                        paths.insert(id, inner.path());
                    }
                }
            }
        }
        Ok(LooseReader {
            objects_dir: objects_dir.to_path_buf(),
            hash_version,
            paths,
        })
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    pub fn contains(&self, id: &HashValue) -> bool {
        self.paths.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &HashValue> {
        self.paths.keys()
    }

    /// Inflates the file and parses its `"<type> <size>\0"` header,
    /// validating the declared size against the actual inflated body.
    pub fn read(&self, id: &HashValue) -> Result<LooseObject, CoreError> {
        let path = self
            .paths
            .get(id)
            .ok_or_else(|| CoreError::ObjectBroken(format!("{id} not present as a loose object")))?;
        let file = fs::File::open(path)?;
        let mut decoder = ZlibDecoder::new(file);
        let mut raw = Vec::new();
        decoder
            .read_to_end(&mut raw)
            .map_err(|e| CoreError::ObjectBroken(format!("loose object {id} failed to inflate: {e}")))?;

        let nul = raw
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| CoreError::ObjectBroken(format!("loose object {id} missing header terminator")))?;
        let header = std::str::from_utf8(&raw[..nul])
            .map_err(|_| CoreError::ObjectBroken(format!("loose object {id} has non-utf8 header")))?;
        let (type_str, size_str) = header
            .split_once(' ')
            .ok_or_else(|| CoreError::ObjectBroken(format!("loose object {id} malformed header {header:?}")))?;
        let object_type = ObjectType::from_str(type_str);
        if object_type == ObjectType::Unknown {
            return Err(CoreError::ObjectBroken(format!("loose object {id} unknown type {type_str:?}")));
        }
        let declared_size: usize = size_str
            .parse()
            .map_err(|_| CoreError::ObjectBroken(format!("loose object {id} non-numeric size {size_str:?}")))?;
        let body = &raw[nul + 1..];
        if body.len() != declared_size {
            return Err(CoreError::ObjectBroken(format!(
                "loose object {id} declared size {declared_size}, inflated to {}",
                body.len()
            )));
        }

        let recomputed = self.hash_version.hash(Bytes::from(raw.clone()));
        if &recomputed != id {
            return Err(CoreError::ObjectBroken(format!(
                "loose object {id} content hashes to {recomputed}"
            )));
        }

        Ok(LooseObject {
            object_type,
            data: Bytes::copy_from_slice(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn write_loose_object(dir: &Path, hash_version: &HashVersion, type_str: &str, body: &[u8]) -> HashValue {
        let header = format!("{type_str} {}\0", body.len());
        let mut content = Vec::new();
        content.extend_from_slice(header.as_bytes());
        content.extend_from_slice(body);
        let id = hash_version.hash(Bytes::from(content.clone()));
        let hex = id.to_string();
        let (sub, rest) = hex.split_at(2);
        let sub_dir = dir.join(sub);
        fs::create_dir_all(&sub_dir).unwrap();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&content).unwrap();
        let compressed = encoder.finish().unwrap();
        fs::write(sub_dir.join(rest), compressed).unwrap();
        id
    }

    #[test]
    fn reads_back_a_written_blob() {
        let dir = std::env::temp_dir().join(format!("loose-test-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let id = write_loose_object(&dir, &HashVersion::Sha1, "blob", b"hello loose");

        let reader = LooseReader::open(&dir, HashVersion::Sha1).unwrap();
        assert!(reader.contains(&id));
        let obj = reader.read(&id).unwrap();
        assert_eq!(obj.object_type, ObjectType::Blob);
        assert_eq!(&obj.data[..], b"hello loose");
    }

    #[test]
    fn skips_pack_and_info_directories() {
        let dir = std::env::temp_dir().join(format!("loose-test-skip-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("pack")).unwrap();
        fs::create_dir_all(dir.join("info")).unwrap();
        let reader = LooseReader::open(&dir, HashVersion::Sha1).unwrap();
        assert!(reader.is_empty());
    }
}
