use crate::error::CoreError;
use crate::git::objects::ObjectTrait;
use crate::git::objects::types::ObjectType;
use crate::sha::{HashValue, HashVersion};
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::fmt::{Display, Formatter};

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum TreeItemMode {
    Blob,
    BlobExecutable,
    Tree,
    Commit,
    Link,
}

impl Display for TreeItemMode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match *self {
            TreeItemMode::Blob => "blob",
            TreeItemMode::BlobExecutable => "blob executable",
            TreeItemMode::Tree => "tree",
            TreeItemMode::Commit => "commit",
            TreeItemMode::Link => "link",
        };
        write!(f, "{s}")
    }
}

impl TreeItemMode {
    pub fn from_bytes(mode: &[u8]) -> Result<TreeItemMode, CoreError> {
        Ok(match mode {
            b"40000" => TreeItemMode::Tree,
            b"100644" => TreeItemMode::Blob,
            b"100755" => TreeItemMode::BlobExecutable,
            b"120000" => TreeItemMode::Link,
            b"160000" => TreeItemMode::Commit,
            b"100664" => TreeItemMode::Blob,
            b"100640" => TreeItemMode::Blob,
            other => {
                return Err(CoreError::ObjectBroken(format!(
                    "invalid tree entry mode {:?}",
                    String::from_utf8_lossy(other)
                )));
            }
        })
    }

    pub fn to_bytes(self) -> &'static [u8] {
        match self {
            TreeItemMode::Blob => b"100644",
            TreeItemMode::BlobExecutable => b"100755",
            TreeItemMode::Link => b"120000",
            TreeItemMode::Tree => b"40000",
            TreeItemMode::Commit => b"160000",
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Hash)]
pub struct TreeItem {
    pub mode: TreeItemMode,
    pub id: HashValue,
    pub name: String,
}

impl Display for TreeItem {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} {} {}", self.mode, self.name, self.id)
    }
}

impl TreeItem {
    pub fn new(mode: TreeItemMode, id: HashValue, name: String) -> TreeItem {
        TreeItem { mode, id, name }
    }

    pub fn to_data(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(self.mode.to_bytes());
        bytes.push(b' ');
        bytes.extend_from_slice(self.name.as_bytes());
        bytes.push(b'\0');
        bytes.extend_from_slice(&self.id.raw());
        bytes
    }

    pub fn is_tree(&self) -> bool {
        self.mode == TreeItemMode::Tree
    }

    pub fn is_blob(&self) -> bool {
        self.mode == TreeItemMode::Blob
    }

    pub fn is_commit(&self) -> bool {
        self.mode == TreeItemMode::Commit
    }

    pub fn is_link(&self) -> bool {
        self.mode == TreeItemMode::Link
    }

    pub fn is_blob_executable(&self) -> bool {
        self.mode == TreeItemMode::BlobExecutable
    }
}

#[derive(Eq, Debug, Clone)]
pub struct Tree {
    pub id: HashValue,
    pub tree_items: Vec<TreeItem>,
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for item in &self.tree_items {
            writeln!(f, "{} {} {}\t{}", item.mode, item.mode, item.id, item.name)?;
        }
        Ok(())
    }
}

impl ObjectTrait for Tree {
    fn get_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn get_size(&self) -> usize {
        self.tree_items.iter().map(|item| item.to_data().len()).sum()
    }

    fn get_data(&self) -> Bytes {
        let mut data = Vec::new();
        for item in &self.tree_items {
            data.extend_from_slice(&item.to_data());
        }
        Bytes::from(data)
    }
}

impl Tree {
    /// Entries are `mode SP name \0 sha1(20 bytes)`, repeated to EOF.
    pub fn parse(input: Bytes, hash_version: HashVersion) -> Result<Tree, CoreError> {
        let mut tree_items = Vec::new();
        let mut pos = 0;
        let input_len = input.len();
        let hash_len = hash_version.len();
        while pos < input_len {
            let space_pos = input[pos..]
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| CoreError::ObjectBroken("missing space after mode".into()))?;
            let mode = TreeItemMode::from_bytes(&input[pos..pos + space_pos])?;

            pos += space_pos + 1;
            let null_pos = input[pos..]
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| CoreError::ObjectBroken("missing null after filename".into()))?;
            let name = String::from_utf8(input[pos..pos + null_pos].to_vec())
                .map_err(|_| CoreError::ObjectBroken("tree entry name not utf-8".into()))?;

            pos += null_pos + 1;
            if pos + hash_len > input_len {
                return Err(CoreError::ObjectBroken("truncated tree entry hash".into()));
            }
            let id = HashValue::from_bytes(&BytesMut::from(&input[pos..pos + hash_len]))
                .ok_or_else(|| CoreError::ObjectBroken("malformed tree entry hash".into()))?;
            pos += hash_len;
            tree_items.push(TreeItem::new(mode, id, name));
        }

        let mut hash_input = Vec::new();
        hash_input.extend_from_slice(format!("tree {}\0", input.len()).as_bytes());
        hash_input.extend_from_slice(&input);
        let id = hash_version.hash(Bytes::from(hash_input));

        Ok(Tree { id, tree_items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_entry(mode: &[u8], name: &str, sha: [u8; 20]) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(mode);
        v.push(b' ');
        v.extend_from_slice(name.as_bytes());
        v.push(0);
        v.extend_from_slice(&sha);
        v
    }

    #[test]
    fn parses_multiple_entries() {
        let mut body = Vec::new();
        body.extend(encode_entry(b"100644", "a.txt", [1u8; 20]));
        body.extend(encode_entry(b"40000", "sub", [2u8; 20]));
        let tree = Tree::parse(Bytes::from(body), HashVersion::Sha1).unwrap();
        assert_eq!(tree.tree_items.len(), 2);
        assert_eq!(tree.tree_items[0].name, "a.txt");
        assert!(tree.tree_items[0].is_blob());
        assert_eq!(tree.tree_items[1].name, "sub");
        assert!(tree.tree_items[1].is_tree());
    }

    #[test]
    fn rejects_unknown_mode() {
        let body = encode_entry(b"999999", "x", [0u8; 20]);
        assert!(Tree::parse(Bytes::from(body), HashVersion::Sha1).is_err());
    }

    #[test]
    fn rejects_truncated_hash() {
        let mut body = encode_entry(b"100644", "x", [0u8; 20]);
        body.truncate(body.len() - 5);
        assert!(Tree::parse(Bytes::from(body), HashVersion::Sha1).is_err());
    }
}
