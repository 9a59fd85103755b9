use crate::error::CoreError;
use crate::git::objects::ObjectTrait;
use crate::git::objects::signature::{Signature, SignatureType};
use crate::git::objects::types::ObjectType;
use crate::sha::{HashValue, HashVersion};
use bytes::Bytes;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};

#[derive(PartialEq, Eq, Clone)]
pub struct Commit {
    pub hash: HashValue,
    pub message: String,
    pub author: Signature,
    pub committer: Signature,
    pub parents: Vec<HashValue>,
    pub tree: HashValue,
    pub gpgsig: Option<Gpgsig>,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Gpgsig {
    pub signature: String,
}

impl Commit {
    /// `tree` header is mandatory and must be the first header line; zero
    /// or more `parent` lines follow, then `author`, then `committer`.
    /// Everything after the first blank line is the message.
    pub fn parse(input: Bytes, version: HashVersion) -> Result<Commit, CoreError> {
        // Hash the raw bytes before any CRLF normalization done for parsing.
        let mut hash_input = Vec::new();
        hash_input.extend_from_slice(format!("commit {}\0", input.len()).as_bytes());
        hash_input.extend_from_slice(&input);
        let hash = version.hash(Bytes::from(hash_input));

        let input_str = std::str::from_utf8(&input)
            .map_err(|_| CoreError::ObjectBroken("commit body is not utf-8".into()))?;
        let normalized = if input_str.contains("\r\n") {
            input_str.replace("\r\n", "\n")
        } else {
            input_str.to_string()
        };

        let header_end_pos = normalized.find("\n\n").unwrap_or(normalized.len());
        let header = &normalized[..header_end_pos];
        let message = if header_end_pos == normalized.len() {
            ""
        } else {
            &normalized[header_end_pos + 2..]
        };

        let mut tree: Option<HashValue> = None;
        let mut parents: Vec<HashValue> = Vec::new();
        let mut author: Option<Signature> = None;
        let mut committer: Option<Signature> = None;
        let mut gpgsig: Option<String> = None;

        let mut collecting_gpgsig = false;
        let mut gpgsig_lines: Vec<&str> = Vec::new();
        let mut first_header_line = true;

        for line in header.split('\n') {
            if collecting_gpgsig {
                gpgsig_lines.push(line);
                if line.trim_start() == "-----END PGP SIGNATURE-----" {
                    collecting_gpgsig = false;
                    gpgsig = Some(gpgsig_lines.join("\n"));
                    gpgsig_lines.clear();
                }
                continue;
            }

            if let Some(rest) = line.strip_prefix("tree ") {
                if !first_header_line {
                    return Err(CoreError::ObjectBroken(
                        "tree header must be the first commit header line".into(),
                    ));
                }
                tree = Some(
                    HashValue::from_str(rest.trim())
                        .ok_or_else(|| CoreError::ObjectBroken("malformed tree sha".into()))?,
                );
            } else if let Some(rest) = line.strip_prefix("parent ") {
                parents.push(
                    HashValue::from_str(rest.trim())
                        .ok_or_else(|| CoreError::ObjectBroken("malformed parent sha".into()))?,
                );
            } else if let Some(rest) = line.strip_prefix("author ") {
                author = Some(Signature::from_data(SignatureType::Author, rest.trim().as_bytes())?);
            } else if let Some(rest) = line.strip_prefix("committer ") {
                committer = Some(Signature::from_data(
                    SignatureType::Committer,
                    rest.trim().as_bytes(),
                )?);
            } else if line.starts_with("gpgsig ") {
                collecting_gpgsig = true;
                gpgsig_lines.push(line);
            }
            // other header lines (mergetag, encoding, ...) are ignored
            first_header_line = false;
        }

        Ok(Commit {
            hash,
            message: message.to_string(),
            author: author.ok_or_else(|| CoreError::ObjectBroken("commit missing author".into()))?,
            committer: committer
                .ok_or_else(|| CoreError::ObjectBroken("commit missing committer".into()))?,
            parents,
            tree: tree.ok_or_else(|| CoreError::ObjectBroken("commit missing tree".into()))?,
            gpgsig: gpgsig.map(|s| Gpgsig { signature: s }),
        })
    }
}

impl Display for Commit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "tree {}", self.tree)?;
        for parent in &self.parents {
            writeln!(f, "parent {parent}")?;
        }
        writeln!(f, "author {}", self.author)?;
        writeln!(f, "committer {}", self.committer)?;
        if let Some(gpgsig) = &self.gpgsig {
            writeln!(f, "{}", gpgsig.signature)?;
        }
        writeln!(f)?;
        write!(f, "{}", self.message)
    }
}

impl Debug for Commit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl ObjectTrait for Commit {
    fn get_type(&self) -> ObjectType {
        ObjectType::Commit
    }

    fn get_size(&self) -> usize {
        self.get_data().len()
    }

    fn get_data(&self) -> Bytes {
        Bytes::from(self.to_string())
    }
}
