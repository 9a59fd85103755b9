use crate::error::CoreError;
use crate::git::objects::ObjectTrait;
use crate::git::objects::signature::{Signature, SignatureType};
use crate::git::objects::types::ObjectType;
use crate::sha::{HashValue, HashVersion};
use bytes::Bytes;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::io::Write;

#[derive(Eq, Clone, Debug)]
pub struct Tag {
    pub id: HashValue,
    pub object_hash: HashValue,
    pub object_type: ObjectType,
    pub tag_name: String,
    pub tagger: Signature,
    pub message: String,
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Tag {
    /// Headers `object`, `type`, `tag`, `tagger` in that fixed order,
    /// a single `tagger` line (no separate author), followed by a blank
    /// line and the message.
    pub fn parse(input: Bytes, hash_version: HashVersion) -> Result<Tag, CoreError> {
        let input_str = std::str::from_utf8(&input)
            .map_err(|_| CoreError::ObjectBroken("tag body is not utf-8".into()))?;
        let split_index = input_str
            .find("\n\n")
            .ok_or_else(|| CoreError::ObjectBroken("tag missing message separator".into()))?;
        let header_str = &input_str[..split_index];
        let message = &input_str[split_index + 2..];

        let mut object_hash: Option<HashValue> = None;
        let mut object_type: Option<ObjectType> = None;
        let mut tag_name: Option<String> = None;
        let mut tagger: Option<Signature> = None;

        let expected = ["object ", "type ", "tag ", "tagger "];
        for (line, prefix) in header_str.lines().zip(expected.iter()) {
            if !line.starts_with(prefix) {
                return Err(CoreError::ObjectBroken(format!(
                    "expected tag header {prefix:?}, got {line:?}"
                )));
            }
            let rest = line[prefix.len()..].trim();
            match *prefix {
                "object " => {
                    object_hash = Some(
                        HashValue::from_str(rest)
                            .ok_or_else(|| CoreError::ObjectBroken("malformed object sha".into()))?,
                    );
                }
                "type " => object_type = Some(ObjectType::from_str(rest)),
                "tag " => tag_name = Some(rest.to_string()),
                "tagger " => {
                    tagger = Some(Signature::from_data(SignatureType::Tagger, rest.as_bytes())?);
                }
                _ => unreachable!(),
            }
        }

        let object_hash = object_hash.ok_or_else(|| CoreError::ObjectBroken("tag missing object".into()))?;
        let object_type = object_type.ok_or_else(|| CoreError::ObjectBroken("tag missing type".into()))?;
        let tag_name = tag_name.ok_or_else(|| CoreError::ObjectBroken("tag missing tag name".into()))?;
        let tagger = tagger.ok_or_else(|| CoreError::ObjectBroken("tag missing tagger".into()))?;

        let mut hash_input = Vec::new();
        hash_input.extend_from_slice(format!("tag {}\0", input.len()).as_bytes());
        hash_input.extend_from_slice(&input);
        let id = hash_version.hash(Bytes::from(hash_input));

        Ok(Tag {
            id,
            object_hash,
            object_type,
            tag_name,
            tagger,
            message: message.to_string(),
        })
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "object {}", self.object_hash)?;
        writeln!(f, "type {}", self.object_type)?;
        writeln!(f, "tag {}", self.tag_name)?;
        writeln!(f, "tagger {}", self.tagger)?;
        writeln!(f)?;
        write!(f, "{}", self.message)
    }
}

impl ObjectTrait for Tag {
    fn get_type(&self) -> ObjectType {
        ObjectType::Tag
    }

    fn get_size(&self) -> usize {
        self.get_data().len()
    }

    fn get_data(&self) -> Bytes {
        let mut data = Vec::new();
        write!(data, "object {}\n", self.object_hash).unwrap();
        write!(data, "type {}\n", self.object_type).unwrap();
        write!(data, "tag {}\n", self.tag_name).unwrap();
        write!(data, "tagger {}\n", self.tagger).unwrap();
        writeln!(data).unwrap();
        data.extend_from_slice(self.message.as_bytes());
        Bytes::from(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_annotated_tag() {
        let data = Bytes::from(
            "object 7551d4da2e9c1ae9397c47709253b405fb6b6206\n\
             type commit\n\
             tag v1.0.0\n\
             tagger a <a@example.com> 1740189120 +0800\n\n\
             release message\n",
        );
        let tag = Tag::parse(data, HashVersion::Sha1).unwrap();
        assert_eq!(tag.tag_name, "v1.0.0");
        assert_eq!(tag.object_type, ObjectType::Commit);
        assert_eq!(tag.message, "release message\n");
        assert_eq!(tag.tagger.timestamp, 1740189120);
    }

    #[test]
    fn rejects_out_of_order_headers() {
        let data = Bytes::from(
            "type commit\n\
             object 7551d4da2e9c1ae9397c47709253b405fb6b6206\n\
             tag v1.0.0\n\
             tagger a <a@example.com> 1740189120 +0800\n\n\
             release message\n",
        );
        assert!(Tag::parse(data, HashVersion::Sha1).is_err());
    }
}
