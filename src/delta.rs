// src/delta.rs

//! Update pack synthesis and lifecycle.
//!
//! An update pack is a stored `[removelist]`/`[addlist]` pair that
//! rewrites the full pack at `from` into the full pack at `to`. This
//! module computes packs from two fulls, back-fills missing packs
//! between consecutive versions after every upload, and expires stale
//! ones.

use crate::catalogue::record::{AddonRecord, UpdatePackEntry};
use crate::doc::Node;
use crate::error::Result;
use crate::pack;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, error, info};

/// Compute the `(removelist, addlist)` pair transforming `from` into `to`.
///
/// Removals name paths present in `from` and absent from `to`;
/// additions carry every file of `to` that is new or whose contents
/// changed.
pub fn compute_delta(from: &Node, to: &Node) -> (Node, Node) {
    let mut removals = Node::new();
    let mut additions = Node::new();
    diff_level(from, to, &mut removals, &mut additions);
    (removals, additions)
}

fn diff_level(from: &Node, to: &Node, removals: &mut Node, additions: &mut Node) {
    for file in from.children("file") {
        let name = file.attr_str("name");
        if !to.children("file").any(|f| f.attr_str("name") == name) {
            removals.add_child("file").set_attr("name", name);
        }
    }

    for file in to.children("file") {
        let name = file.attr_str("name");
        let old = from.children("file").find(|f| f.attr_str("name") == name);
        let changed = match old {
            Some(old) => old.attr("contents") != file.attr("contents"),
            None => true,
        };
        if changed {
            additions.push_child("file", file.clone());
        }
    }

    for dir in from.children("dir") {
        let name = dir.attr_str("name");
        match to.children("dir").find(|d| d.attr_str("name") == name) {
            Some(new_dir) => {
                let mut sub_removals = Node::new();
                sub_removals.set_attr("name", name);
                let mut sub_additions = Node::new();
                sub_additions.set_attr("name", name);
                diff_level(dir, new_dir, &mut sub_removals, &mut sub_additions);

                if sub_removals.has_child("file") || sub_removals.has_child("dir") {
                    removals.push_child("dir", sub_removals);
                }
                if sub_additions.has_child("file") || sub_additions.has_child("dir") {
                    additions.push_child("dir", sub_additions);
                }
            }
            None => {
                removals.push_child("dir", names_only(dir));
            }
        }
    }

    for dir in to.children("dir") {
        let name = dir.attr_str("name");
        if !from.children("dir").any(|d| d.attr_str("name") == name) {
            additions.push_child("dir", dir.clone());
        }
    }
}

/// Strip contents from a pack subtree, keeping only the name skeleton.
fn names_only(tree: &Node) -> Node {
    let mut out = Node::new();
    out.set_attr("name", tree.attr_str("name"));
    for file in tree.children("file") {
        out.add_child("file").set_attr("name", file.attr_str("name"));
    }
    for dir in tree.children("dir") {
        out.push_child("dir", names_only(dir));
    }
    out
}

/// Write an update pack file: a document with `[removelist]` and
/// `[addlist]` children, committed atomically.
pub fn write_update_pack(
    path: impl AsRef<Path>,
    removals: &Node,
    additions: &Node,
    level: u32,
) -> Result<()> {
    let mut doc = Node::new();
    doc.push_child("removelist", removals.clone());
    doc.push_child("addlist", additions.clone());
    pack::write_pack(path, &doc, level)
}

/// Delete any update packs whose `to` equals the incoming version.
///
/// Needed when the server accepts re-uploads of an existing version
/// number: the old delta no longer describes the stored pack.
pub fn remove_packs_targeting(addon: &mut AddonRecord, dir: &Path, new_version: &str) {
    let mut doomed = BTreeSet::new();
    for pack in &addon.update_packs {
        if pack.to == new_version {
            remove_pack_file(dir, &pack.filename);
            doomed.insert(pack.filename.clone());
        }
    }
    addon.update_packs.retain(|p| !doomed.contains(&p.filename));
}

/// Post-upload expiry sweep.
///
/// Drops update packs that are past their expiry, that start at the
/// version just uploaded, or (for full-pack uploads) that target it.
pub fn expire_update_packs(
    addon: &mut AddonRecord,
    dir: &Path,
    now: i64,
    new_version: &str,
    is_delta_upload: bool,
) {
    let mut doomed = BTreeSet::new();
    for pack in &addon.update_packs {
        let stale = pack.expire <= now
            || pack.from == new_version
            || (!is_delta_upload && pack.to == new_version);
        if stale {
            info!("expiring update pack {} -> {}", pack.from, pack.to);
            remove_pack_file(dir, &pack.filename);
            doomed.insert(pack.filename.clone());
        }
    }
    addon.update_packs.retain(|p| !doomed.contains(&p.filename));
}

/// Back-fill update packs between consecutive versions.
///
/// For every adjacent pair in version order with no recorded pack, the
/// two fulls are read back and diffed. Pairs whose fulls are missing
/// or unreadable are skipped with an error log; the invariant is
/// restored on the next successful upload.
pub fn autogenerate_missing_packs(
    addon: &mut AddonRecord,
    dir: &Path,
    now: i64,
    lifespan: i64,
    level: u32,
) -> Result<()> {
    let ordered: Vec<_> = addon.version_map().into_values().collect();

    for pair in ordered.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);

        let covered = addon
            .update_packs
            .iter()
            .any(|p| p.from == prev.version && p.to == next.version);
        if covered {
            continue;
        }

        let prev_path = dir.join(&prev.filename);
        let next_path = dir.join(&next.filename);

        if pack::file_size(&prev_path).unwrap_or(0) == 0
            || pack::file_size(&next_path).unwrap_or(0) == 0
        {
            error!(
                "cannot generate update pack {} -> {} for '{}': full pack missing",
                prev.version, next.version, addon.name
            );
            continue;
        }

        info!(
            "generating update pack {} -> {} for '{}'",
            prev.version, next.version, addon.name
        );

        let from_tree = match pack::read_pack(&prev_path) {
            Ok(tree) => tree,
            Err(e) => {
                error!("skipping {} -> {}: {}", prev.version, next.version, e);
                continue;
            }
        };
        let to_tree = match pack::read_pack(&next_path) {
            Ok(tree) => tree,
            Err(e) => {
                error!("skipping {} -> {}: {}", prev.version, next.version, e);
                continue;
            }
        };

        let (removals, additions) = compute_delta(&from_tree, &to_tree);
        let filename = pack::update_pack_filename(&prev.version, &next.version);
        write_update_pack(dir.join(&filename), &removals, &additions, level)?;

        addon.update_packs.push(UpdatePackEntry {
            from: prev.version.clone(),
            to: next.version.clone(),
            filename,
            expire: now + lifespan,
        });
    }

    Ok(())
}

fn remove_pack_file(dir: &Path, filename: &str) {
    let path = dir.join(filename);
    match fs::remove_file(&path) {
        Ok(()) => debug!("removed {}", path.display()),
        Err(e) => error!("could not remove {}: {}", path.display(), e),
    }
}
