// src/catalogue/record.rs

//! Typed add-on metadata records.
//!
//! An [`AddonRecord`] is the in-memory form of one `addon.cfg`. The
//! document tree is the canonical on-disk representation; the record
//! round-trips through [`AddonRecord::from_node`] / [`AddonRecord::to_node`]
//! so a single serialized blob carries the attributes together with the
//! version and update-pack collections.

use crate::doc::Node;
use crate::version::VersionKey;
use std::collections::BTreeMap;

/// A declared metadata translation for one language.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Translation {
    pub language: String,
    pub title: String,
    pub description: String,
    /// True once the add-on is known to ship a catalogue for the language.
    pub supported: bool,
}

/// Presence of this entry means "this add-on has version `version`".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    pub version: String,
    pub filename: String,
}

/// A persisted delta that transforms the full pack at `from` into the
/// full pack at `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePackEntry {
    pub from: String,
    pub to: String,
    pub filename: String,
    pub expire: i64,
}

/// In-memory metadata for one add-on.
#[derive(Debug, Clone, Default)]
pub struct AddonRecord {
    pub name: String,
    pub title: String,
    pub author: String,
    pub description: String,
    pub email: String,
    pub addon_type: String,
    pub tags: Vec<String>,
    pub dependencies: Vec<String>,
    pub translations: Vec<Translation>,
    pub icon: String,
    pub version: String,
    pub upload_ip: String,
    pub downloads: i64,
    pub uploads: i64,
    pub original_timestamp: i64,
    pub timestamp: i64,
    pub hidden: bool,
    pub passsalt: String,
    pub passhash: String,
    /// Plaintext passphrase found in legacy metadata; cleared by the
    /// startup migration that hashes it.
    pub plaintext_passphrase: String,
    /// Directory holding this add-on's packs, relative to the server root.
    pub dirname: String,
    /// Size in bytes of the newest full pack.
    pub size: i64,
    /// URL-template parameters from the uploader, served back as a
    /// synthesized `feedback_url`.
    pub feedback: Option<Node>,
    pub versions: Vec<VersionEntry>,
    pub update_packs: Vec<UpdatePackEntry>,
}

/// Attributes never shown to clients in list responses.
pub const PRIVATE_ATTRS: &[&str] = &["passphrase", "passhash", "passsalt", "upload_ip", "email"];

impl AddonRecord {
    /// Deserialize from an `addon.cfg` tree.
    pub fn from_node(node: &Node) -> Self {
        let mut record = Self {
            name: node.attr_str("name").to_string(),
            title: node.attr_str("title").to_string(),
            author: node.attr_str("author").to_string(),
            description: node.attr_str("description").to_string(),
            email: node.attr_str("email").to_string(),
            addon_type: node.attr_str("type").to_string(),
            tags: split_list(node.attr_str("tags")),
            dependencies: split_list(node.attr_str("dependencies")),
            icon: node.attr_str("icon").to_string(),
            version: node.attr_text("version"),
            upload_ip: node.attr_str("upload_ip").to_string(),
            downloads: node.attr_int("downloads", 0),
            uploads: node.attr_int("uploads", 0),
            original_timestamp: node.attr_timestamp("original_timestamp", 0),
            timestamp: node.attr_timestamp("timestamp", 0),
            hidden: node.attr_bool("hidden", false),
            passsalt: node.attr_str("passsalt").to_string(),
            passhash: node.attr_str("passhash").to_string(),
            plaintext_passphrase: node.attr_str("passphrase").to_string(),
            dirname: node.attr_str("filename").to_string(),
            size: node.attr_int("size", 0),
            feedback: node.child("feedback").cloned().filter(|f| !f.is_empty()),
            ..Self::default()
        };

        for t in node.children("translation") {
            if t.attr_empty("language") {
                continue;
            }
            record.translations.push(Translation {
                language: t.attr_str("language").to_string(),
                title: t.attr_str("title").to_string(),
                description: t.attr_str("description").to_string(),
                // Old metadata has no flag; treat those as supported.
                supported: t.attr_bool("supported", true),
            });
        }

        for v in node.children("version") {
            record.versions.push(VersionEntry {
                version: v.attr_text("version"),
                filename: v.attr_str("filename").to_string(),
            });
        }

        for p in node.children("update_pack") {
            record.update_packs.push(UpdatePackEntry {
                from: p.attr_text("from"),
                to: p.attr_text("to"),
                filename: p.attr_str("filename").to_string(),
                expire: p.attr_timestamp("expire", 0),
            });
        }

        record
    }

    /// Serialize to the canonical `addon.cfg` tree.
    pub fn to_node(&self) -> Node {
        let mut node = Node::new();
        node.set_attr("name", self.name.as_str());
        node.set_attr("title", self.title.as_str());
        node.set_attr("author", self.author.as_str());
        node.set_attr("description", self.description.as_str());
        node.set_attr("email", self.email.as_str());
        node.set_attr("type", self.addon_type.as_str());
        node.set_attr("tags", self.tags.join(","));
        node.set_attr("dependencies", self.dependencies.join(","));
        node.set_attr("icon", self.icon.as_str());
        node.set_attr("version", self.version.as_str());
        node.set_attr("upload_ip", self.upload_ip.as_str());
        node.set_attr("downloads", self.downloads);
        node.set_attr("uploads", self.uploads);
        node.set_attr("original_timestamp", self.original_timestamp);
        node.set_attr("timestamp", self.timestamp);
        node.set_attr("hidden", self.hidden);
        node.set_attr("passsalt", self.passsalt.as_str());
        node.set_attr("passhash", self.passhash.as_str());
        if !self.plaintext_passphrase.is_empty() {
            node.set_attr("passphrase", self.plaintext_passphrase.as_str());
        }
        node.set_attr("filename", self.dirname.as_str());
        node.set_attr("size", self.size);

        for t in &self.translations {
            let locale = node.add_child("translation");
            locale.set_attr("language", t.language.as_str());
            locale.set_attr("supported", t.supported);
            if !t.title.is_empty() {
                locale.set_attr("title", t.title.as_str());
            }
            if !t.description.is_empty() {
                locale.set_attr("description", t.description.as_str());
            }
        }

        if let Some(feedback) = &self.feedback {
            node.push_child("feedback", feedback.clone());
        }

        for v in &self.versions {
            node.add_child("version")
                .set_attr("version", v.version.as_str())
                .set_attr("filename", v.filename.as_str());
        }

        for p in &self.update_packs {
            node.add_child("update_pack")
                .set_attr("from", p.from.as_str())
                .set_attr("to", p.to.as_str())
                .set_attr("filename", p.filename.as_str())
                .set_attr("expire", p.expire);
        }

        node
    }

    /// Ordered view of the version entries, rebuilt from the list.
    ///
    /// Keys are parsed versions, so iteration order is the semantic
    /// version order regardless of upload order.
    pub fn version_map(&self) -> BTreeMap<VersionKey, VersionEntry> {
        self.versions
            .iter()
            .map(|v| (VersionKey::parse(&v.version), v.clone()))
            .collect()
    }

    /// Replace any entry with the same version string, then add the new one.
    pub fn upsert_version(&mut self, entry: VersionEntry) {
        self.versions.retain(|v| v.version != entry.version);
        self.versions.push(entry);
    }

    /// Whether the declared translation list includes a supported entry
    /// for the given language.
    pub fn supports_language(&self, language: &str) -> bool {
        self.translations
            .iter()
            .any(|t| t.language == language && t.supported)
    }

    /// Client-facing view for list responses: private attributes are
    /// stripped, internal `[update_pack]` and `[feedback]` children are
    /// dropped, and `feedback_url` is synthesized from the server's URL
    /// template (empty when absent, in case clients assume presence).
    pub fn client_node(&self, feedback_url_format: &str) -> Node {
        let mut node = self.to_node();
        node.remove_attrs(PRIVATE_ATTRS);
        node.clear_children("update_pack");

        let url = self
            .feedback
            .as_ref()
            .and_then(|params| crate::feedback::format_feedback_url(feedback_url_format, params))
            .unwrap_or_default();
        node.set_attr("feedback_url", url);
        node.clear_children("feedback");

        node
    }

    /// Mutate one of the admin-settable attributes by key. Returns
    /// false when the key is not a recognized record attribute.
    pub fn set_known_attr(&mut self, key: &str, value: &str) -> bool {
        match key {
            "title" => self.title = value.to_string(),
            "author" => self.author = value.to_string(),
            "description" => self.description = value.to_string(),
            "email" => self.email = value.to_string(),
            "type" => self.addon_type = value.to_string(),
            "tags" => self.tags = split_list(value),
            "dependencies" => self.dependencies = split_list(value),
            "icon" => self.icon = value.to_string(),
            "upload_ip" => self.upload_ip = value.to_string(),
            "downloads" => self.downloads = value.parse().unwrap_or(self.downloads),
            "uploads" => self.uploads = value.parse().unwrap_or(self.uploads),
            "timestamp" => self.timestamp = value.parse().unwrap_or(self.timestamp),
            "original_timestamp" => {
                self.original_timestamp = value.parse().unwrap_or(self.original_timestamp)
            }
            "hidden" => self.hidden = matches!(value, "yes" | "true" | "1"),
            "size" => self.size = value.parse().unwrap_or(self.size),
            _ => return false,
        }
        true
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
