//! Member-side secrets on disk
//!
//! Everything a member must keep between commands lives as JSON under the
//! data directory: unused DE private halves, in-progress DKG sessions and
//! finished key shares.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tss_core::de::{De, DePrivate};
use tss_core::keygen::DkgSession;
use tss_core::{GroupId, MemberShare};

pub struct Keystore {
    dir: PathBuf,
}

impl Keystore {
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let value = serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(value))
    }

    fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let json = serde_json::to_string_pretty(value)?;
        std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))
    }

    pub fn des(&self) -> Result<Vec<DePrivate>> {
        Ok(self.read("des.json")?.unwrap_or_default())
    }

    pub fn add_des(&self, fresh: Vec<DePrivate>) -> Result<usize> {
        let mut des = self.des()?;
        des.extend(fresh);
        self.write("des.json", &des)?;
        Ok(des.len())
    }

    /// Private half matching a committed public DE
    pub fn find_de(&self, public: &De) -> Result<Option<DePrivate>> {
        Ok(self.des()?.into_iter().find(|de| de.public() == *public))
    }

    /// A nonce pair must never sign twice
    pub fn remove_de(&self, public: &De) -> Result<()> {
        let des: Vec<DePrivate> = self
            .des()?
            .into_iter()
            .filter(|de| de.public() != *public)
            .collect();
        self.write("des.json", &des)
    }

    pub fn session(&self, group_id: GroupId) -> Result<Option<DkgSession>> {
        self.read(&format!("dkg.{group_id}.json"))
    }

    pub fn save_session(&self, session: &DkgSession) -> Result<()> {
        self.write(&format!("dkg.{}.json", session.group_id), session)
    }

    pub fn share(&self, group_id: GroupId) -> Result<Option<MemberShare>> {
        self.read(&format!("share.{group_id}.json"))
    }

    pub fn save_share(&self, share: &MemberShare) -> Result<()> {
        self.write(&format!("share.{}.json", share.group_id), share)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use rand::RngCore;
    use tss_core::de::generate_des;

    fn temp_store() -> Keystore {
        let dir = std::env::temp_dir().join(format!("tss-member-{:016x}", OsRng.next_u64()));
        Keystore::open(&dir).unwrap()
    }

    #[test]
    fn test_de_lifecycle() {
        let store = temp_store();
        assert!(store.des().unwrap().is_empty());

        let (privates, publics) = generate_des(3, &mut OsRng);
        assert_eq!(store.add_des(privates).unwrap(), 3);

        assert!(store.find_de(&publics[1]).unwrap().is_some());
        store.remove_de(&publics[1]).unwrap();
        assert!(store.find_de(&publics[1]).unwrap().is_none());
        assert_eq!(store.des().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_session_is_none() {
        let store = temp_store();
        assert!(store.session(4).unwrap().is_none());
        assert!(store.share(4).unwrap().is_none());
    }
}
