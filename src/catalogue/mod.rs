// src/catalogue/mod.rs

//! The add-on catalogue: an in-memory index of every add-on plus the
//! on-disk metadata files backing it.
//!
//! Layout under the server root:
//!
//! ```text
//! data/
//!   <addon-id>/
//!     addon.cfg                      # canonical metadata
//!     full_pack_<digest>.gz          # one per version
//!     full_pack_<digest>.hash.gz     # index sidecar per version
//!     update_pack_<digest>.gz        # one per update pack
//! ```
//!
//! Mutations mark records dirty; `flush` rewrites dirty metadata files
//! atomically. Flush failures keep the record dirty so the periodic
//! timer retries.

pub mod record;

use crate::auth;
use crate::doc::{self, Node};
use crate::error::{Error, Result};
use crate::fscommit::{sweep_stale_temps, AtomicFile};
use crate::pack;
use record::{AddonRecord, VersionEntry};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Filters for list requests.
#[derive(Debug, Default)]
pub struct ListFilter {
    /// Exact identifier match.
    pub name: Option<String>,
    /// Language that must be declared and supported.
    pub language: Option<String>,
    /// Only add-ons modified strictly before this bound.
    pub before: Option<i64>,
    /// Only add-ons modified strictly after this bound.
    pub after: Option<i64>,
}

/// In-memory catalogue of add-ons with dirty tracking.
pub struct Catalogue {
    root: PathBuf,
    addons: BTreeMap<String, AddonRecord>,
    dirty: BTreeSet<String>,
}

impl Catalogue {
    /// Scan `<root>/data` and load every `addon.cfg` found.
    ///
    /// Unreadable metadata is fatal: a half-loaded catalogue would
    /// overwrite good records on the next flush.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let data_dir = root.join("data");

        if !data_dir.exists() {
            fs::create_dir_all(&data_dir)?;
        }
        sweep_stale_temps(&data_dir);

        let mut addons = BTreeMap::new();

        for entry in fs::read_dir(&data_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let dir = entry.path();
            let meta_path = dir.join("addon.cfg");
            if !meta_path.exists() {
                continue;
            }
            sweep_stale_temps(&dir);

            let text = fs::read_to_string(&meta_path)?;
            let node = doc::parse(&text).map_err(|e| {
                Error::Config(format!("cannot parse {}: {}", meta_path.display(), e))
            })?;
            let addon = AddonRecord::from_node(&node);
            if addon.name.is_empty() {
                return Err(Error::Config(format!(
                    "metadata in {} has no add-on name",
                    meta_path.display()
                )));
            }
            addons.insert(addon.name.clone(), addon);
        }

        info!("loaded {} add-ons from {}", addons.len(), data_dir.display());

        Ok(Self {
            root,
            addons,
            dirty: BTreeSet::new(),
        })
    }

    /// Create an empty catalogue rooted at `root` without scanning.
    pub fn empty(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            addons: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.addons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addons.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&AddonRecord> {
        self.addons.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut AddonRecord> {
        self.addons.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AddonRecord> {
        self.addons.values()
    }

    /// Canonical identifier whose lowercase form matches `name`.
    ///
    /// Identifiers are unique under case-insensitive comparison, so at
    /// most one can match.
    pub fn find_case_insensitive(&self, name: &str) -> Option<&str> {
        let lowered = name.to_lowercase();
        self.addons
            .keys()
            .find(|id| id.to_lowercase() == lowered)
            .map(String::as_str)
    }

    /// Absolute directory holding an add-on's pack files.
    pub fn addon_dir(&self, addon: &AddonRecord) -> PathBuf {
        self.root.join(&addon.dirname)
    }

    /// Insert or replace a record and mark it dirty.
    pub fn insert(&mut self, addon: AddonRecord) {
        self.dirty.insert(addon.name.clone());
        self.addons.insert(addon.name.clone(), addon);
    }

    pub fn mark_dirty(&mut self, id: &str) {
        self.dirty.insert(id.to_string());
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Write every dirty record's `addon.cfg` atomically.
    ///
    /// Failures are logged and the record stays dirty; the next flush
    /// retries.
    pub fn flush(&mut self) {
        let pending: Vec<String> = self.dirty.iter().cloned().collect();
        for id in pending {
            let Some(addon) = self.addons.get(&id) else {
                // Deleted since it was marked.
                self.dirty.remove(&id);
                continue;
            };
            if addon.dirname.is_empty() {
                warn!("add-on '{}' has no directory yet, skipping flush", id);
                continue;
            }
            let path = self.root.join(&addon.dirname).join("addon.cfg");
            match write_metadata(&path, addon) {
                Ok(()) => {
                    self.dirty.remove(&id);
                }
                Err(e) => {
                    error!("failed to flush metadata for '{}': {}", id, e);
                }
            }
        }
        debug!("flush complete, {} records still dirty", self.dirty.len());
    }

    /// Remove an add-on: directory tree, index entry, metadata.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        let addon = self
            .addons
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if addon.dirname.is_empty() {
            warn!("add-on '{}' has no directory on record", id);
        } else {
            let dir = self.root.join(&addon.dirname);
            if let Err(e) = fs::remove_dir_all(&dir) {
                error!("could not remove {}: {}", dir.display(), e);
            }
        }

        self.addons.remove(id);
        self.dirty.remove(id);
        info!("deleted add-on '{}'", id);
        Ok(())
    }

    /// Apply list filters. Hidden add-ons are never listed.
    pub fn list(&self, filter: &ListFilter) -> Vec<&AddonRecord> {
        self.addons
            .values()
            .filter(|addon| {
                if addon.hidden {
                    return false;
                }
                if let Some(name) = &filter.name {
                    if name != &addon.name {
                        return false;
                    }
                }
                if let Some(before) = filter.before {
                    if addon.timestamp == 0 || addon.timestamp >= before {
                        return false;
                    }
                }
                if let Some(after) = filter.after {
                    if addon.timestamp == 0 || addon.timestamp <= after {
                        return false;
                    }
                }
                if let Some(language) = &filter.language {
                    if !addon.supports_language(language) {
                        return false;
                    }
                }
                true
            })
            .collect()
    }

    /// Hash any plaintext passphrases left over from old metadata.
    pub fn migrate_plaintext_passphrases(&mut self) {
        let mut migrated = Vec::new();
        for (id, addon) in &mut self.addons {
            if addon.plaintext_passphrase.is_empty() {
                continue;
            }
            info!("add-on '{}' uses an unhashed passphrase, fixing", addon.title);
            let (salt, hash) = auth::generate_hash(&addon.plaintext_passphrase);
            addon.passsalt = salt;
            addon.passhash = hash;
            addon.plaintext_passphrase.clear();
            migrated.push(id.clone());
        }
        for id in migrated {
            self.dirty.insert(id);
        }
    }

    /// Convert legacy single-file entries from the top-level config's
    /// `[campaigns]` section into the per-directory layout.
    ///
    /// Runs once per installation: the section is removed afterwards.
    /// Returns true when anything was migrated.
    pub fn migrate_legacy(&mut self, cfg: &mut Node, compress_level: u32) -> Result<bool> {
        let Some(campaigns) = cfg.child("campaigns") else {
            return Ok(false);
        };
        let entries: Vec<Node> = campaigns.children("campaign").cloned().collect();
        if entries.is_empty() {
            cfg.clear_children("campaigns");
            return Ok(false);
        }

        warn!(
            "old-format add-ons detected in the config, converting {} entries",
            entries.len()
        );

        for campaign in entries {
            let id = campaign.attr_str("name").to_string();
            let legacy_path = campaign.attr_str("filename").to_string();
            let version = campaign.attr_text("version");

            if self.addons.contains_key(&id) {
                return Err(Error::Config(format!(
                    "legacy add-on '{}' already exists in the new layout",
                    id
                )));
            }

            let file = self.root.join(&legacy_path);
            if !file.is_file() {
                return Err(Error::Config(format!(
                    "no file found for legacy add-on '{}' at {}",
                    id,
                    file.display()
                )));
            }

            let mut data = pack::read_pack(&file)?;
            data.remove_attrs(&[
                "title",
                "author",
                "description",
                "version",
                "timestamp",
                "original_timestamp",
                "icon",
                "type",
                "tags",
            ]);
            data.set_attr("name", "");

            let mut addon = AddonRecord::from_node(&campaign);
            addon.dirname = legacy_path.clone();
            addon.upsert_version(VersionEntry {
                version: version.clone(),
                filename: pack::full_pack_filename(&version),
            });

            // The legacy file gives way to a directory of the same name.
            fs::remove_file(&file)?;
            let dir = self.root.join(&legacy_path);
            pack::write_pack(
                dir.join(pack::full_pack_filename(&version)),
                &data,
                compress_level,
            )?;
            pack::write_pack(
                dir.join(pack::index_filename(&version)),
                &pack::hash_index(&data),
                compress_level,
            )?;

            info!("migrated legacy add-on '{}'", id);
            self.insert(addon);
        }

        cfg.clear_children("campaigns");
        Ok(true)
    }
}

fn write_metadata(path: &Path, addon: &AddonRecord) -> Result<()> {
    let mut out = AtomicFile::new(path)?;
    let text = doc::write(&addon.to_node());
    out.write_all(text.as_bytes())
        .map_err(|e| Error::commit(path, e))?;
    out.commit()
}
