// src/pack.rs

//! Pack codec: gzipped document trees on disk.
//!
//! A full pack is a document tree whose children are `[file]` nodes
//! (`name`, `contents`) and `[dir]` nodes (`name` plus nested files
//! and dirs). Packs are serialized with the text codec and stored
//! gzip-compressed; writes go through the atomic committer.

use crate::doc::{self, Node, Value};
use crate::error::{Error, Result};
use crate::fscommit::AtomicFile;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use md5::{Digest, Md5};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Default gzip level; levels above 6 cost CPU for little gain here.
pub const DEFAULT_COMPRESS_LEVEL: u32 = 6;

fn md5_hex(input: &str) -> String {
    format!("{:x}", Md5::digest(input.as_bytes()))
}

/// Full pack filename for a version: `full_pack_<md5(version)>.gz`.
/// The digest is for filename uniqueness only.
pub fn full_pack_filename(version: &str) -> String {
    format!("full_pack_{}.gz", md5_hex(version))
}

/// Index sidecar filename for a version: `full_pack_<md5(version)>.hash.gz`.
pub fn index_filename(version: &str) -> String {
    format!("full_pack_{}.hash.gz", md5_hex(version))
}

/// Update pack filename for a version pair: `update_pack_<md5(from+to)>.gz`.
pub fn update_pack_filename(from: &str, to: &str) -> String {
    format!("update_pack_{}.gz", md5_hex(&format!("{from}{to}")))
}

/// Index sidecar counterpart of a full pack filename.
pub fn index_from_pack_filename(pack_filename: &str) -> String {
    match pack_filename.rfind('.') {
        Some(dot) => format!("{}.hash.gz", &pack_filename[..dot]),
        None => format!("{pack_filename}.hash.gz"),
    }
}

/// Serialize a tree and gzip it at the given level (0-9).
pub fn encode(tree: &Node, level: u32) -> Result<Vec<u8>> {
    let text = doc::write(tree);
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder.write_all(text.as_bytes())?;
    Ok(encoder.finish()?)
}

/// Inflate and parse a gzipped tree from a byte buffer.
pub fn decode(bytes: &[u8]) -> std::result::Result<Node, String> {
    let mut text = String::new();
    GzDecoder::new(bytes)
        .read_to_string(&mut text)
        .map_err(|e| e.to_string())?;
    doc::parse(&text).map_err(|e| e.to_string())
}

/// Write a pack file atomically.
pub fn write_pack(path: impl AsRef<Path>, tree: &Node, level: u32) -> Result<()> {
    let path = path.as_ref();
    let mut out = AtomicFile::new(path)?;
    let bytes = encode(tree, level)?;
    out.write_all(&bytes)
        .map_err(|e| Error::commit(path, e))?;
    out.commit()
}

/// Read a pack file; decode failures surface as `CorruptPack`.
pub fn read_pack(path: impl AsRef<Path>) -> Result<Node> {
    let path = path.as_ref();
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    decode(&bytes).map_err(|detail| Error::corrupt(path, detail))
}

/// Size in bytes of a file on disk, or None when unreadable.
pub fn file_size(path: impl AsRef<Path>) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}

fn content_hash(value: &Value) -> String {
    let digest = match value {
        Value::Bytes(b) => Md5::digest(b),
        other => Md5::digest(other.to_text().as_bytes()),
    };
    format!("{:x}", digest)
}

/// Mirror a full pack's directory structure, replacing each file's
/// contents with its content hash.
pub fn hash_index(tree: &Node) -> Node {
    let mut index = Node::new();
    index.set_attr("name", tree.attr_str("name"));

    for (tag, child) in &tree.children {
        match tag.as_str() {
            "file" => {
                let entry = index.add_child("file");
                entry.set_attr("name", child.attr_str("name"));
                let hash = child
                    .attr("contents")
                    .map(content_hash)
                    .unwrap_or_default();
                entry.set_attr("hash", hash);
            }
            "dir" => {
                index.push_child("dir", hash_index(child));
            }
            _ => {}
        }
    }

    index
}

fn named_child_mut<'a>(tree: &'a mut Node, tag: &str, name: &str) -> Option<&'a mut Node> {
    tree.children
        .iter_mut()
        .find(|(t, n)| t == tag && n.attr_str("name") == name)
        .map(|(_, n)| n)
}

/// Remove every path listed in `removals` from `base`. Directories
/// emptied by the removal are dropped as well.
pub fn apply_removals(base: &mut Node, removals: &Node) {
    for file in removals.children("file") {
        let name = file.attr_str("name").to_string();
        base.remove_children("file", |c| c.attr_str("name") == name);
    }

    for dir in removals.children("dir") {
        let name = dir.attr_str("name");
        if let Some(target) = named_child_mut(base, "dir", name) {
            apply_removals(target, dir);
        }
        let name = name.to_string();
        base.remove_children("dir", |c| {
            c.attr_str("name") == name && !c.has_child("file") && !c.has_child("dir")
        });
    }
}

/// Create or replace every path listed in `additions` in `base`.
/// Within the list, a later entry for the same path wins.
pub fn apply_additions(base: &mut Node, additions: &Node) {
    for file in additions.children("file") {
        let name = file.attr_str("name");
        match named_child_mut(base, "file", name) {
            Some(existing) => {
                if let Some(contents) = file.attr("contents") {
                    existing.set_attr("contents", contents.clone());
                }
            }
            None => {
                base.push_child("file", file.clone());
            }
        }
    }

    for dir in additions.children("dir") {
        let name = dir.attr_str("name");
        if named_child_mut(base, "dir", name).is_none() {
            base.add_child("dir").set_attr("name", name);
        }
        if let Some(target) = named_child_mut(base, "dir", name) {
            apply_additions(target, dir);
        }
    }
}

/// Visit every file and directory name in a pack tree.
pub fn each_name<F: FnMut(&str)>(tree: &Node, visit: &mut F) {
    for (tag, child) in &tree.children {
        if tag == "file" || tag == "dir" {
            visit(child.attr_str("name"));
            if tag == "dir" {
                each_name(child, visit);
            }
        }
    }
}

/// Look up a file's contents by slash-separated path, for tests and
/// translation detection.
pub fn find_file<'a>(tree: &'a Node, path: &str) -> Option<&'a Value> {
    let (head, rest) = match path.split_once('/') {
        Some((h, r)) => (h, Some(r)),
        None => (path, None),
    };

    match rest {
        None => tree
            .children("file")
            .find(|f| f.attr_str("name") == head)
            .and_then(|f| f.attr("contents")),
        Some(rest) => tree
            .children("dir")
            .find(|d| d.attr_str("name") == head)
            .and_then(|d| find_file(d, rest)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pack_with(files: &[(&str, &str)]) -> Node {
        let mut tree = Node::new();
        tree.set_attr("name", "");
        for (name, contents) in files {
            tree.add_child("file")
                .set_attr("name", *name)
                .set_attr("contents", *contents);
        }
        tree
    }

    #[test]
    fn test_filenames_are_digest_derived() {
        let full = full_pack_filename("1.0.0");
        assert!(full.starts_with("full_pack_"));
        assert!(full.ends_with(".gz"));
        assert_eq!(full.len(), "full_pack_".len() + 32 + ".gz".len());

        assert_eq!(index_filename("1.0.0"), index_from_pack_filename(&full));
        assert_ne!(
            update_pack_filename("1.0.0", "1.1.0"),
            update_pack_filename("1.1.0", "1.0.0")
        );
    }

    #[test]
    fn test_pack_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("full_pack_test.gz");

        let tree = pack_with(&[("a.cfg", "A1"), ("b.cfg", "B1")]);
        write_pack(&path, &tree, DEFAULT_COMPRESS_LEVEL).unwrap();
        let back = read_pack(&path).unwrap();

        assert_eq!(tree, back);
    }

    #[test]
    fn test_read_garbage_is_corrupt_pack() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.gz");
        std::fs::write(&path, b"not gzip at all").unwrap();

        assert!(matches!(
            read_pack(&path),
            Err(Error::CorruptPack { .. })
        ));
    }

    #[test]
    fn test_hash_index_mirrors_structure() {
        let mut tree = pack_with(&[("a.cfg", "A1")]);
        let sub = tree.add_child("dir");
        sub.set_attr("name", "maps");
        sub.add_child("file")
            .set_attr("name", "m1.map")
            .set_attr("contents", "MAP");

        let index = hash_index(&tree);

        let a = index.children("file").next().unwrap();
        assert_eq!(a.attr_str("name"), "a.cfg");
        assert_eq!(a.attr_str("hash").len(), 32);
        assert!(a.attr("contents").is_none());

        let maps = index.children("dir").next().unwrap();
        assert_eq!(maps.attr_str("name"), "maps");
        assert_eq!(maps.children("file").next().unwrap().attr_str("name"), "m1.map");
    }

    #[test]
    fn test_hash_depends_on_contents() {
        let one = hash_index(&pack_with(&[("a.cfg", "A1")]));
        let two = hash_index(&pack_with(&[("a.cfg", "A2")]));
        assert_ne!(
            one.children("file").next().unwrap().attr_str("hash"),
            two.children("file").next().unwrap().attr_str("hash")
        );
    }

    #[test]
    fn test_apply_removals() {
        let mut base = pack_with(&[("a.cfg", "A"), ("b.cfg", "B")]);
        let removals = pack_with(&[("a.cfg", "")]);

        apply_removals(&mut base, &removals);

        assert!(find_file(&base, "a.cfg").is_none());
        assert!(find_file(&base, "b.cfg").is_some());
    }

    #[test]
    fn test_apply_removals_drops_empty_dirs() {
        let mut base = Node::new();
        let sub = base.add_child("dir");
        sub.set_attr("name", "maps");
        sub.add_child("file")
            .set_attr("name", "m1.map")
            .set_attr("contents", "MAP");

        let mut removals = Node::new();
        let rm_dir = removals.add_child("dir");
        rm_dir.set_attr("name", "maps");
        rm_dir.add_child("file").set_attr("name", "m1.map");

        apply_removals(&mut base, &removals);
        assert!(!base.has_child("dir"));
    }

    #[test]
    fn test_apply_additions_replace_and_create() {
        let mut base = pack_with(&[("a.cfg", "A1")]);
        let additions = pack_with(&[("a.cfg", "A2"), ("c.cfg", "C")]);

        apply_additions(&mut base, &additions);

        assert_eq!(find_file(&base, "a.cfg").unwrap().to_text(), "A2");
        assert_eq!(find_file(&base, "c.cfg").unwrap().to_text(), "C");
        assert_eq!(base.children("file").count(), 2);
    }

    #[test]
    fn test_apply_additions_last_writer_wins() {
        let mut base = Node::new();
        let additions = pack_with(&[("a.cfg", "first"), ("a.cfg", "second")]);

        apply_additions(&mut base, &additions);

        assert_eq!(find_file(&base, "a.cfg").unwrap().to_text(), "second");
        assert_eq!(base.children("file").count(), 1);
    }

    #[test]
    fn test_apply_additions_nested_dir() {
        let mut base = Node::new();
        let mut additions = Node::new();
        let dir = additions.add_child("dir");
        dir.set_attr("name", "units");
        dir.add_child("file")
            .set_attr("name", "axe.cfg")
            .set_attr("contents", "AXE");

        apply_additions(&mut base, &additions);
        assert_eq!(find_file(&base, "units/axe.cfg").unwrap().to_text(), "AXE");
    }

    #[test]
    fn test_each_name_visits_everything() {
        let mut tree = pack_with(&[("a.cfg", "A")]);
        let sub = tree.add_child("dir");
        sub.set_attr("name", "maps");
        sub.add_child("file")
            .set_attr("name", "m1.map")
            .set_attr("contents", "M");

        let mut seen = Vec::new();
        each_name(&tree, &mut |name| seen.push(name.to_string()));
        seen.sort();
        assert_eq!(seen, vec!["a.cfg", "m1.map", "maps"]);
    }
}
