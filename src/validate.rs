// src/validate.rs

//! Upload validation.
//!
//! Checks run in a fixed order and the first failure wins. Each status
//! has a frozen numeric code surfaced to clients in the `status_code`
//! attribute of structured errors -- renumbering is a wire-contract
//! break.

use crate::auth;
use crate::blacklist::Blacklist;
use crate::catalogue::Catalogue;
use crate::doc::Node;
use std::collections::BTreeMap;
use tracing::info;

/// Recognized add-on type tags.
pub const KNOWN_TYPES: &[&str] = &[
    "campaign",
    "campaign_sp_mp",
    "campaign_mp",
    "scenario",
    "scenario_mp",
    "era",
    "faction",
    "map_pack",
    "mod_mp",
    "media",
    "other",
];

/// Characters that start text markup and are banned at the front of
/// names and titles.
const MARKUP_CHARS: &[char] = &['~', '*', '@', '#', '<', '>', '{', '}', '|'];

/// Validation outcome codes. The numeric values are a stable wire
/// contract, grouped by failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CheckStatus {
    Success = 0x0,

    // Pack structure
    EmptyPack = 0x100,
    BadName = 0x101,
    NameHasMarkup = 0x102,
    IllegalFilename = 0x103,
    FilenameCaseConflict = 0x104,
    InvalidUtf8Name = 0x105,
    UnexpectedDelta = 0x106,

    // Publish metadata
    NoTitle = 0x200,
    NoAuthor = 0x201,
    NoVersion = 0x202,
    NoDescription = 0x203,
    NoEmail = 0x204,
    NoPassphrase = 0x205,
    TitleHasMarkup = 0x206,
    BadType = 0x207,
    InvalidUtf8Attribute = 0x208,

    // Authentication and policy
    Unauthorized = 0x300,
    Denied = 0x301,

    // Server-side faults
    ServerReadOnly = 0x400,
    ServerAddonsList = 0x401,
    ServerDeltaNoVersions = 0x402,
    ServerUnspecified = 0x403,
}

impl CheckStatus {
    /// Short human description, used in logs and on the wire.
    pub fn describe(self) -> &'static str {
        match self {
            CheckStatus::Success => "success",
            CheckStatus::EmptyPack => "the add-on contains no files",
            CheckStatus::BadName => "the add-on name contains illegal characters",
            CheckStatus::NameHasMarkup => "the add-on name starts with a formatting character",
            CheckStatus::IllegalFilename => "the add-on contains files with illegal names",
            CheckStatus::FilenameCaseConflict => {
                "the add-on contains files whose names differ only in case"
            }
            CheckStatus::InvalidUtf8Name => "the add-on name is not valid UTF-8",
            CheckStatus::UnexpectedDelta => {
                "an update pack was received for a non-existent add-on"
            }
            CheckStatus::NoTitle => "no add-on title specified",
            CheckStatus::NoAuthor => "no add-on author specified",
            CheckStatus::NoVersion => "no add-on version specified",
            CheckStatus::NoDescription => "no add-on description specified",
            CheckStatus::NoEmail => "no add-on author email specified",
            CheckStatus::NoPassphrase => "no passphrase specified",
            CheckStatus::TitleHasMarkup => "the add-on title starts with a formatting character",
            CheckStatus::BadType => "unknown add-on type",
            CheckStatus::InvalidUtf8Attribute => "an attribute is not valid UTF-8",
            CheckStatus::Unauthorized => "the passphrase is incorrect",
            CheckStatus::Denied => "uploading this add-on is not allowed",
            CheckStatus::ServerReadOnly => "the server is in read-only mode",
            CheckStatus::ServerAddonsList => "server error: the add-ons list is damaged",
            CheckStatus::ServerDeltaNoVersions => {
                "server error: add-on has an empty version table"
            }
            CheckStatus::ServerUnspecified => "unspecified server error",
        }
    }

    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Result of validating one upload request.
#[derive(Debug)]
pub struct UploadCheck {
    pub status: CheckStatus,
    /// Canonical identifier of the existing add-on, when the upload
    /// matched one case-insensitively.
    pub existing_id: Option<String>,
    /// Offending paths for filename failures, newline-joined.
    pub error_data: String,
}

impl UploadCheck {
    fn fail(status: CheckStatus) -> Self {
        info!("validation error: {}", status.describe());
        Self {
            status,
            existing_id: None,
            error_data: String::new(),
        }
    }

    fn fail_for(status: CheckStatus, existing_id: Option<String>) -> Self {
        info!("validation error: {}", status.describe());
        Self {
            status,
            existing_id,
            error_data: String::new(),
        }
    }
}

/// Run every check against an upload request, in order, stopping at
/// the first failure.
pub fn validate_upload(
    catalogue: &Catalogue,
    blacklist: &Blacklist,
    read_only: bool,
    upload: &Node,
    addr: &str,
) -> UploadCheck {
    if read_only {
        return UploadCheck::fail(CheckStatus::ServerReadOnly);
    }

    let name = upload.attr_str("name");

    // Inbound documents are decoded as UTF-8 before they get here, so
    // a name that failed to decode never reaches the validator; the
    // InvalidUtf8Name code stays reserved for the wire contract.

    let existing_id = catalogue
        .find_case_insensitive(name)
        .map(str::to_string);

    let data = upload.child("data");
    let removelist = upload.child("removelist");
    let addlist = upload.child("addlist");
    let is_delta = has_content(removelist) || has_content(addlist);

    if upload.attr_empty("passphrase") {
        return UploadCheck::fail_for(CheckStatus::NoPassphrase, existing_id);
    }

    if let Some(id) = &existing_id {
        let Some(addon) = catalogue.get(id) else {
            return UploadCheck::fail(CheckStatus::ServerAddonsList);
        };
        if !auth::verify_passphrase(
            upload.attr_str("passphrase"),
            &addon.passsalt,
            &addon.passhash,
        ) {
            return UploadCheck::fail_for(CheckStatus::Unauthorized, existing_id);
        }
        if addon.hidden {
            return UploadCheck::fail_for(CheckStatus::Denied, existing_id);
        }
    }

    if blacklist.is_blacklisted(
        name,
        upload.attr_str("title"),
        upload.attr_str("description"),
        upload.attr_str("author"),
        addr,
        upload.attr_str("email"),
    ) {
        info!("validation error: blacklisted uploader or publish information");
        return UploadCheck::fail_for(CheckStatus::Denied, existing_id);
    }

    if !is_delta && !has_content(data) {
        return UploadCheck::fail_for(CheckStatus::EmptyPack, existing_id);
    }

    if !addon_name_legal(name) {
        return UploadCheck::fail_for(CheckStatus::BadName, existing_id);
    }

    if starts_with_markup(name) {
        return UploadCheck::fail_for(CheckStatus::NameHasMarkup, existing_id);
    }

    if upload.attr_empty("title") {
        return UploadCheck::fail_for(CheckStatus::NoTitle, existing_id);
    }

    if starts_with_markup(upload.attr_str("title")) {
        return UploadCheck::fail_for(CheckStatus::TitleHasMarkup, existing_id);
    }

    if !KNOWN_TYPES.contains(&upload.attr_str("type")) {
        return UploadCheck::fail_for(CheckStatus::BadType, existing_id);
    }

    if upload.attr_empty("author") {
        return UploadCheck::fail_for(CheckStatus::NoAuthor, existing_id);
    }
    if upload.attr_empty("version") {
        return UploadCheck::fail_for(CheckStatus::NoVersion, existing_id);
    }
    if upload.attr_empty("description") {
        return UploadCheck::fail_for(CheckStatus::NoDescription, existing_id);
    }
    if upload.attr_empty("email") {
        return UploadCheck::fail_for(CheckStatus::NoEmail, existing_id);
    }

    let trees: Vec<&Node> = [data, addlist, removelist].into_iter().flatten().collect();

    let illegal = find_illegal_names(&trees);
    if !illegal.is_empty() {
        info!(
            "validation error: {} illegal filenames in add-on pack",
            illegal.len()
        );
        return UploadCheck {
            status: CheckStatus::IllegalFilename,
            existing_id,
            error_data: illegal.join("\n"),
        };
    }

    let conflicts = find_case_conflicts(&trees);
    if !conflicts.is_empty() {
        info!(
            "validation error: {} case-conflicting filenames in add-on pack",
            conflicts.len()
        );
        return UploadCheck {
            status: CheckStatus::FilenameCaseConflict,
            existing_id,
            error_data: conflicts.join("\n"),
        };
    }

    if is_delta && existing_id.is_none() {
        return UploadCheck::fail(CheckStatus::UnexpectedDelta);
    }

    UploadCheck {
        status: CheckStatus::Success,
        existing_id,
        error_data: String::new(),
    }
}

fn has_content(node: Option<&Node>) -> bool {
    node.is_some_and(|n| !n.is_empty())
}

/// Legal add-on identifier grammar: ASCII alphanumerics, underscore,
/// dash and dot, no dot-only names.
pub fn addon_name_legal(name: &str) -> bool {
    if name.is_empty() || name.chars().all(|c| c == '.') {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '+'))
}

fn starts_with_markup(text: &str) -> bool {
    text.chars().next().is_some_and(|c| MARKUP_CHARS.contains(&c))
}

/// Windows-reserved device basenames, illegal in portable packs.
const RESERVED_BASENAMES: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// Whether a single path element is acceptable inside a pack.
pub fn filename_legal(name: &str) -> bool {
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }
    if name.contains('/') || name.contains('\\') {
        return false;
    }
    if name
        .chars()
        .any(|c| c.is_control() || matches!(c, '<' | '>' | ':' | '"' | '|' | '?' | '*' | '~' | '$' | ';'))
    {
        return false;
    }
    let base = name.split('.').next().unwrap_or(name).to_lowercase();
    !RESERVED_BASENAMES.contains(&base.as_str())
}

/// Collect every illegal file or directory name across the given pack
/// trees.
pub fn find_illegal_names(trees: &[&Node]) -> Vec<String> {
    let mut bad = Vec::new();
    for tree in trees {
        crate::pack::each_name(tree, &mut |name| {
            if !filename_legal(name) {
                bad.push(name.to_string());
            }
        });
    }
    bad
}

/// Collect names that collide case-insensitively within a directory
/// level. Every member of a colliding group is reported.
pub fn find_case_conflicts(trees: &[&Node]) -> Vec<String> {
    let mut conflicts = Vec::new();
    for tree in trees {
        collect_case_conflicts(tree, &mut conflicts);
    }
    conflicts
}

fn collect_case_conflicts(tree: &Node, out: &mut Vec<String>) {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (tag, child) in &tree.children {
        if tag == "file" || tag == "dir" {
            let name = child.attr_str("name");
            groups
                .entry(name.to_lowercase())
                .or_default()
                .push(name.to_string());
        }
    }
    for (_, names) in groups {
        if names.len() > 1 {
            out.extend(names);
        }
    }
    for dir in tree.children("dir") {
        collect_case_conflicts(dir, out);
    }
}
