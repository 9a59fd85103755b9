use crate::error::CoreError;
use crate::git::loose::LooseReader;
use crate::git::pack::PackReader;
use crate::sha::{HashValue, HashVersion};
use std::path::Path;

/// Where a sha1 was found: which pack (most-recent-mtime-wins among packs
/// that hold it) or the loose tree, which overrides any pack.
pub(crate) enum ObjectLocation {
    Loose,
    Pack { pack_index: usize, offset: u64 },
}

/// Union over every `.pack`/`.idx` pair plus the loose-object tree under a
/// `.git/objects` directory.
pub struct ObjectStore {
    packs: Vec<PackReader>,
    loose: LooseReader,
    hash_version: HashVersion,
}

impl ObjectStore {
    /// `git_dir` is the repository's `.git` directory (or bare equivalent).
    /// Packs are ordered oldest-to-newest by mtime so a reverse scan finds
    /// the most recent pack containing a given object first.
    pub fn open(git_dir: &Path, hash_version: HashVersion) -> Result<Self, CoreError> {
        let objects_dir = git_dir.join("objects");
        let loose = LooseReader::open(&objects_dir, hash_version.clone())?;

        let pack_dir = objects_dir.join("pack");
        let mut packs = Vec::new();
        if pack_dir.is_dir() {
            for (pack_path, idx_path) in PackReader::discover_pairs(&pack_dir)? {
                packs.push(PackReader::open(&pack_path, &idx_path, hash_version.clone())?);
            }
        }

        Ok(ObjectStore {
            packs,
            loose,
            hash_version,
        })
    }

    pub fn hash_version(&self) -> HashVersion {
        self.hash_version.clone()
    }

    pub fn contains(&self, id: &HashValue) -> bool {
        self.locate(id).is_some()
    }

    pub fn pack_count(&self) -> usize {
        self.packs.len()
    }

    pub(crate) fn locate(&self, id: &HashValue) -> Option<ObjectLocation> {
        if self.loose.contains(id) {
            return Some(ObjectLocation::Loose);
        }
        self.packs
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, p)| p.index.offset_of(id).map(|offset| ObjectLocation::Pack { pack_index: i, offset }))
    }

    pub(crate) fn pack(&self, pack_index: usize) -> &PackReader {
        &self.packs[pack_index]
    }

    pub(crate) fn loose(&self) -> &LooseReader {
        &self.loose
    }
}
