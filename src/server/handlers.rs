// src/server/handlers.rs

//! Request dispatch and the seven request handlers.
//!
//! `dispatch` is synchronous: a handler receives the parsed request
//! and returns a [`Response`] describing what to put on the wire. The
//! connection task frames and sends it, then re-arms for the next
//! document. Keeping handlers free of I/O suspension points is what
//! lets the catalogue go unlocked.

use super::{wire, Server};
use crate::catalogue::record::{AddonRecord, Translation, VersionEntry};
use crate::catalogue::ListFilter;
use crate::delta;
use crate::doc::Node;
use crate::pack;
use crate::validate::{self, CheckStatus};
use crate::version::VersionKey;
use chrono::Utc;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;
use tokio::net::TcpStream;
use tracing::{error, info, warn};

/// One parsed request: the tag of the first child of the inbound
/// document, that child's tree, and the peer address.
#[derive(Debug)]
pub struct Request {
    pub tag: String,
    pub body: Node,
    pub addr: String,
}

impl Request {
    pub fn new(tag: impl Into<String>, body: Node, addr: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            body,
            addr: addr.into(),
        }
    }
}

/// What a handler wants sent back.
#[derive(Debug, PartialEq)]
pub enum Response {
    /// A document response.
    Doc(Node),
    /// A stored pack file, framed straight from disk.
    File(PathBuf),
    /// A `[message]` document.
    Message(String),
    /// An `[error]` document with just a message.
    Error(String),
    /// An `[error]` document with `extra_data` and a numeric
    /// `status_code` from the validator enumeration.
    Status {
        message: String,
        extra_data: String,
        code: u32,
    },
}

/// Route a request to its handler.
pub fn dispatch(server: &mut Server, req: &Request) -> Response {
    match req.tag.as_str() {
        "request_campaign_list" => handle_request_campaign_list(server, req),
        "request_campaign" => handle_request_campaign(server, req),
        "request_campaign_hash" => handle_request_campaign_hash(server, req),
        "request_terms" => handle_request_terms(server, req),
        "upload" => handle_upload(server, req),
        "delete" => handle_delete(server, req),
        "change_passphrase" => handle_change_passphrase(server, req),
        other => Response::Error(format!("Unrecognized [{}] request.", other)),
    }
}

fn handle_request_campaign_list(server: &mut Server, req: &Request) -> Response {
    info!("[{} {}] sending add-ons list", req.addr, req.tag);

    let now = Utc::now().timestamp();

    // Bounds are relative to now only when the client asks for it;
    // otherwise they are absolute epochs.
    let epoch = if req.body.attr_str("times_relative_to") == "now" {
        now
    } else {
        0
    };

    let filter = ListFilter {
        name: non_empty(req.body.attr_str("name")),
        language: non_empty(req.body.attr_str("language")),
        before: if req.body.attr_empty("before") {
            None
        } else {
            Some(epoch + req.body.attr_timestamp("before", 0))
        },
        after: if req.body.attr_empty("after") {
            None
        } else {
            Some(epoch + req.body.attr_timestamp("after", 0))
        },
    };

    let mut campaigns = Node::new();
    campaigns.set_attr("timestamp", now);
    for addon in server.catalogue.list(&filter) {
        campaigns.push_child(
            "campaign",
            addon.client_node(&server.config.feedback_url_format),
        );
    }

    let mut response = Node::new();
    response.push_child("campaigns", campaigns);
    Response::Doc(response)
}

fn handle_request_campaign(server: &mut Server, req: &Request) -> Response {
    let name = req.body.attr_str("name").to_string();

    let Some(addon) = server.catalogue.get(&name).filter(|a| !a.hidden) else {
        return Response::Error(format!("Add-on '{}' not found.", name));
    };

    let version_map = addon.version_map();
    if version_map.is_empty() {
        return Response::Error(format!(
            "No versions of the add-on '{}' are available on the server.",
            name
        ));
    }

    let from = req.body.attr_text("from_version");
    let to = match non_empty(&req.body.attr_text("version")) {
        Some(v) => v,
        None => version_map
            .iter()
            .next_back()
            .map(|(_, entry)| entry.version.clone())
            .unwrap_or_default(),
    };

    let to_key = VersionKey::parse(&to);
    let Some(target) = version_map.get(&to_key) else {
        return Response::Error(format!(
            "Could not find requested version {} of the add-on '{}'.",
            to, name
        ));
    };

    let addon_dir = server.catalogue.addon_dir(addon);
    let full_pack_path = addon_dir.join(&target.filename);
    let full_pack_size = pack::file_size(&full_pack_path);

    let mut response = None;

    if !from.is_empty() && version_map.contains_key(&VersionKey::parse(&from)) {
        // Chain consecutive update packs from the client's version to
        // the target. Every adjacent pair should have a pack on disk
        // from the original uploads or the auto-generation pass.
        match build_delta_chain(server, addon, &version_map, &from, &to_key, full_pack_size) {
            Some(chain) => {
                info!(
                    "[{} {}] sending add-on '{}' version: {} -> {} (delta)",
                    req.addr, req.tag, name, from, to
                );
                response = Some(Response::Doc(chain));
            }
            None => {
                // Fall through to the full pack below.
            }
        }
    }

    let response = match response {
        Some(r) => r,
        None => {
            let Some(size) = full_pack_size else {
                return Response::Error(format!(
                    "Add-on '{}' could not be read by the server.",
                    name
                ));
            };
            info!(
                "[{} {}] sending add-on '{}' version: {} size: {} KiB",
                req.addr,
                req.tag,
                name,
                to,
                size / 1024
            );
            Response::File(full_pack_path)
        }
    };

    // Only first-time downloads count towards the statistics; clients
    // doing upgrades tell us via from_version, opt-outs via the flag.
    if from.is_empty()
        && req.body.attr_bool("increase_downloads", true)
        && !server.ignore_address_stats(&req.addr)
    {
        if let Some(addon) = server.catalogue.get_mut(&name) {
            addon.downloads += 1;
            server.catalogue.mark_dirty(&name);
        }
    }

    response
}

/// Assemble the concatenated delta documents for a version chain, or
/// None when the chain is unusable and a full pack must be sent.
fn build_delta_chain(
    server: &Server,
    addon: &AddonRecord,
    version_map: &std::collections::BTreeMap<VersionKey, VersionEntry>,
    from: &str,
    to_key: &VersionKey,
    full_pack_size: Option<u64>,
) -> Option<Node> {
    let from_key = VersionKey::parse(from);
    if from_key > *to_key {
        error!(
            "client version {} is newer than requested version {} for add-on '{}', \
             sending a full pack instead",
            from,
            to_key.as_str(),
            addon.name
        );
        return None;
    }

    let hops: Vec<&VersionEntry> = version_map
        .range(from_key..=to_key.clone())
        .map(|(_, entry)| entry)
        .collect();

    if hops.len() <= 1 {
        error!(
            "bad update sequence bounds {} -> {} for add-on '{}', sending a full pack instead",
            from,
            to_key.as_str(),
            addon.name
        );
        return None;
    }

    let addon_dir = server.catalogue.addon_dir(addon);
    let mut combined = Node::new();
    let mut delivery_size: u64 = 0;

    for pair in hops.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);

        let entry = match addon
            .update_packs
            .iter()
            .find(|p| p.from == prev.version && p.to == next.version)
        {
            Some(entry) => entry,
            None => {
                error!(
                    "no update pack from {} to {} for add-on '{}', sending a full pack instead",
                    prev.version, next.version, addon.name
                );
                return None;
            }
        };

        let pack_path = addon_dir.join(&entry.filename);
        let step = match pack::read_pack(&pack_path) {
            Ok(step) if !step.is_empty() => step,
            _ => {
                error!(
                    "broken update sequence from version {} to {} for add-on '{}', \
                     sending a full pack instead",
                    from,
                    to_key.as_str(),
                    addon.name
                );
                return None;
            }
        };

        combined.append(step);
        delivery_size += pack::file_size(&pack_path).unwrap_or(0);

        // An overlarge delta defeats the point of incremental updates.
        if let Some(full_size) = full_pack_size {
            if full_size > 0 && delivery_size > full_size {
                return None;
            }
        }
    }

    if combined.is_empty() {
        return None;
    }
    Some(combined)
}

fn handle_request_campaign_hash(server: &mut Server, req: &Request) -> Response {
    let name = req.body.attr_str("name").to_string();

    let Some(addon) = server.catalogue.get(&name).filter(|a| !a.hidden) else {
        return Response::Error(format!("Add-on '{}' not found.", name));
    };

    let version_map = addon.version_map();
    if version_map.is_empty() {
        return Response::Error(format!(
            "No versions of the add-on '{}' are available on the server.",
            name
        ));
    }

    let requested = req.body.attr_text("version");
    let entry = if requested.is_empty() {
        version_map.iter().next_back().map(|(_, e)| e)
    } else {
        let key = VersionKey::parse(&requested);
        version_map.get(&key).or_else(|| {
            // Nearest version older than the request, else the newest.
            version_map
                .range(..key)
                .next_back()
                .map(|(_, e)| e)
                .or_else(|| version_map.iter().next_back().map(|(_, e)| e))
        })
    };

    let Some(entry) = entry else {
        return Response::Error(format!(
            "No versions of the add-on '{}' are available on the server.",
            name
        ));
    };

    let index_path = server
        .catalogue
        .addon_dir(addon)
        .join(pack::index_from_pack_filename(&entry.filename));

    let Some(size) = pack::file_size(&index_path) else {
        return Response::Error(format!("Missing index file for the add-on '{}'.", name));
    };

    info!(
        "[{} {}] sending add-on hash index for '{}' size: {} KiB",
        req.addr,
        req.tag,
        name,
        size / 1024
    );
    Response::File(index_path)
}

fn handle_request_terms(server: &mut Server, req: &Request) -> Response {
    // A terms request precedes an upload; refuse it early when uploads
    // are disabled anyway.
    if server.config.read_only {
        info!("in read-only mode, request for upload terms denied");
        return Response::Error(
            "The server is currently in read-only mode, add-on uploads are disabled.".to_string(),
        );
    }

    info!("[{} {}] sending upload terms", req.addr, req.tag);
    Response::Message(server.config.terms.clone())
}

fn handle_upload(server: &mut Server, req: &Request) -> Response {
    let upload_ts = Utc::now().timestamp();
    let upload = &req.body;
    let name = upload.attr_str("name").to_string();

    info!("[{} {}] validating add-on '{}'", req.addr, req.tag, name);

    let check = validate::validate_upload(
        &server.catalogue,
        &server.blacklist,
        server.config.read_only,
        upload,
        &req.addr,
    );

    if check.status != CheckStatus::Success {
        info!("upload of '{}' aborted due to a failed validation check", name);
        return Response::Status {
            message: format!("Add-on rejected: {}", check.status.describe()),
            extra_data: check.error_data,
            code: check.status.code(),
        };
    }

    let full_pack = upload.child("data");
    let delta_remove = upload.child("removelist");
    let delta_add = upload.child("addlist");

    let is_delta_upload = delta_remove.is_some_and(|n| !n.is_empty())
        || delta_add.is_some_and(|n| !n.is_empty());
    let is_existing_upload = check.existing_id.is_some();

    // For existing add-ons the canonical identifier wins over whatever
    // case variant the uploader typed.
    let id = check.existing_id.clone().unwrap_or_else(|| name.clone());

    info!(
        "[{} {}] processing add-on '{}', upload type: {}, {}",
        req.addr,
        req.tag,
        id,
        if is_delta_upload { "delta" } else { "full" },
        if is_existing_upload { "update" } else { "new" },
    );

    let mut addon = match &check.existing_id {
        Some(existing) => server
            .catalogue
            .get(existing)
            .cloned()
            .unwrap_or_default(),
        None => AddonRecord {
            original_timestamp: upload_ts,
            ..AddonRecord::default()
        },
    };

    // General metadata attributes come from the upload every time.
    addon.name = id.clone();
    addon.title = upload.attr_str("title").to_string();
    addon.author = upload.attr_str("author").to_string();
    addon.description = upload.attr_str("description").to_string();
    addon.email = upload.attr_str("email").to_string();
    addon.addon_type = upload.attr_str("type").to_string();
    addon.icon = upload.attr_str("icon").to_string();
    addon.tags = split_list(upload.attr_str("tags"));
    addon.dependencies = split_list(upload.attr_str("dependencies"));
    addon.dirname = format!("data/{}", id);
    addon.upload_ip = req.addr.clone();
    addon.timestamp = upload_ts;
    addon.uploads += 1;

    if !is_existing_upload {
        let (salt, hash) = crate::auth::generate_hash(upload.attr_str("passphrase"));
        addon.passsalt = salt;
        addon.passhash = hash;
    }

    addon.feedback = upload.child("feedback").cloned().filter(|f| !f.is_empty());

    // Declared translations start unsupported until catalogue
    // detection sees the shipped files.
    addon.translations.clear();
    for locale in upload.children("translation") {
        if locale.attr_empty("language") {
            continue;
        }
        addon.translations.push(Translation {
            language: locale.attr_str("language").to_string(),
            title: locale.attr_str("title").to_string(),
            description: locale.attr_str("description").to_string(),
            supported: false,
        });
    }

    let new_version = upload.attr_text("version");
    let addon_dir = server.catalogue.root().join(&addon.dirname);

    let mut rw_full_pack = match full_pack {
        Some(data) if !data.is_empty() => data.clone(),
        _ => Node::new(),
    };

    if is_delta_upload {
        let version_map = addon.version_map();

        if version_map.is_empty() {
            // The validator guarantees the add-on exists, so an empty
            // version table is server-side damage.
            error!("add-on '{}' has an empty version table", id);
            return Response::Status {
                message: "Server error: Cannot process update pack with an empty version table."
                    .to_string(),
                extra_data: String::new(),
                code: CheckStatus::ServerDeltaNoVersions.code(),
            };
        }

        let newest = version_map
            .iter()
            .next_back()
            .map(|(_, e)| e.version.clone())
            .unwrap_or_default();

        let declared = upload.attr_text("from");
        let prev_version = if declared.is_empty() {
            newest.clone()
        } else {
            let key = VersionKey::parse(&declared);
            if version_map.contains_key(&key) {
                declared
            } else {
                // Compatibility behavior: silently re-base onto the
                // newest strictly older version. Logged so broken
                // clients are at least visible server-side.
                let substitute = version_map
                    .range(..key)
                    .next_back()
                    .map(|(_, e)| e.version.clone())
                    .unwrap_or(newest.clone());
                warn!(
                    "delta upload for '{}' declared unknown base version {}, using {} instead",
                    id, declared, substitute
                );
                substitute
            }
        };

        // Replacing a version invalidates any delta that targets it.
        delta::remove_packs_targeting(&mut addon, &addon_dir, &new_version);

        let pack_filename = pack::update_pack_filename(&prev_version, &new_version);
        info!(
            "saving provided update pack for {} -> {}",
            prev_version, new_version
        );

        let empty = Node::new();
        if let Err(e) = delta::write_update_pack(
            addon_dir.join(&pack_filename),
            delta_remove.unwrap_or(&empty),
            delta_add.unwrap_or(&empty),
            server.config.compress_level,
        ) {
            error!("failed to store update pack for '{}': {}", id, e);
            return server_error();
        }

        addon.update_packs.push(crate::catalogue::record::UpdatePackEntry {
            from: prev_version.clone(),
            to: new_version.clone(),
            filename: pack_filename,
            expire: upload_ts + server.config.update_pack_lifespan,
        });

        // Reconstruct the new full pack from the base version.
        let base_entry = version_map
            .get(&VersionKey::parse(&prev_version))
            .cloned();
        let Some(base_entry) = base_entry else {
            error!("previous version dropped off the version map");
            return server_error();
        };

        rw_full_pack = match pack::read_pack(addon_dir.join(&base_entry.filename)) {
            Ok(tree) => tree,
            Err(e) => {
                error!("cannot read base pack for '{}': {}", id, e);
                return server_error();
            }
        };

        if let Some(removals) = delta_remove {
            pack::apply_removals(&mut rw_full_pack, removals);
        }
        if let Some(additions) = delta_add {
            pack::apply_additions(&mut rw_full_pack, additions);
        }
    }

    detect_translations(&rw_full_pack, &mut addon);
    add_license(&mut rw_full_pack);

    addon.version = new_version.clone();
    addon.upsert_version(VersionEntry {
        version: new_version.clone(),
        filename: pack::full_pack_filename(&new_version),
    });

    // The directory serialization expects a present, empty name.
    rw_full_pack.set_attr("name", "");

    let full_pack_path = addon_dir.join(pack::full_pack_filename(&new_version));
    let index_path = addon_dir.join(pack::index_filename(&new_version));

    if let Err(e) = pack::write_pack(&full_pack_path, &rw_full_pack, server.config.compress_level)
    {
        error!("failed to write full pack for '{}': {}", id, e);
        return server_error();
    }
    if let Err(e) = pack::write_pack(
        &index_path,
        &pack::hash_index(&rw_full_pack),
        server.config.compress_level,
    ) {
        error!("failed to write hash index for '{}': {}", id, e);
        return server_error();
    }

    addon.size = pack::file_size(&full_pack_path).unwrap_or(0) as i64;

    delta::expire_update_packs(&mut addon, &addon_dir, upload_ts, &new_version, is_delta_upload);

    if let Err(e) = delta::autogenerate_missing_packs(
        &mut addon,
        &addon_dir,
        upload_ts,
        server.config.update_pack_lifespan,
        server.config.compress_level,
    ) {
        // The upload itself is stored; the gap is back-filled on the
        // next upload.
        error!("update pack auto-generation failed for '{}': {}", id, e);
    }

    server.catalogue.insert(addon);
    server.write_config();

    info!("[{} {}] finished uploading add-on '{}'", req.addr, req.tag, id);

    server.fire_hook("hook_post_upload", &id);

    Response::Message("Add-on accepted.".to_string())
}

fn handle_delete(server: &mut Server, req: &Request) -> Response {
    let id = req.body.attr_str("name").to_string();

    if server.config.read_only {
        info!("in read-only mode, request to delete '{}' denied", id);
        return Response::Error(
            "Cannot delete add-on: The server is currently in read-only mode.".to_string(),
        );
    }

    info!("[{} {}] deleting add-on '{}'", req.addr, req.tag, id);

    let Some(addon) = server.catalogue.get(&id) else {
        return Response::Error("The add-on does not exist.".to_string());
    };

    if req.body.attr_empty("passphrase") {
        return Response::Error("No passphrase was specified.".to_string());
    }

    if !crate::auth::verify_passphrase(
        req.body.attr_str("passphrase"),
        &addon.passsalt,
        &addon.passhash,
    ) {
        return Response::Error("The passphrase is incorrect.".to_string());
    }

    if addon.hidden {
        info!("add-on removal denied - hidden add-on");
        return Response::Error(
            "Add-on deletion denied. Please contact the server administration for assistance."
                .to_string(),
        );
    }

    match server.delete_addon(&id) {
        Ok(()) => Response::Message("Add-on deleted.".to_string()),
        Err(e) => {
            error!("failed to delete '{}': {}", id, e);
            Response::Error("The add-on could not be deleted.".to_string())
        }
    }
}

fn handle_change_passphrase(server: &mut Server, req: &Request) -> Response {
    if server.config.read_only {
        info!("in read-only mode, request to change passphrase denied");
        return Response::Error(
            "Cannot change passphrase: The server is currently in read-only mode.".to_string(),
        );
    }

    let id = req.body.attr_str("name").to_string();

    let Some(addon) = server.catalogue.get_mut(&id) else {
        return Response::Error("No add-on with that name exists.".to_string());
    };

    if !crate::auth::verify_passphrase(
        req.body.attr_str("passphrase"),
        &addon.passsalt,
        &addon.passhash,
    ) {
        return Response::Error("Your old passphrase was incorrect.".to_string());
    }

    if addon.hidden {
        info!("passphrase change denied - hidden add-on");
        return Response::Error(
            "Add-on passphrase change denied. Please contact the server administration \
             for assistance."
                .to_string(),
        );
    }

    if req.body.attr_empty("new_passphrase") {
        return Response::Error("No new passphrase was supplied.".to_string());
    }

    let (salt, hash) = crate::auth::generate_hash(req.body.attr_str("new_passphrase"));
    addon.passsalt = salt;
    addon.passhash = hash;
    server.catalogue.mark_dirty(&id);
    server.write_config();

    Response::Message("Passphrase changed.".to_string())
}

fn server_error() -> Response {
    Response::Status {
        message: "Server error: The add-on could not be stored.".to_string(),
        extra_data: String::new(),
        code: CheckStatus::ServerUnspecified.code(),
    }
}

/// Mark declared translations as supported when the pack ships a
/// `translations/<language>/LC_MESSAGES` path.
fn detect_translations(full_pack: &Node, addon: &mut AddonRecord) {
    let translations_dir = full_pack
        .children("dir")
        .find(|d| d.attr_str("name") == "translations");

    for declared in &mut addon.translations {
        declared.supported = translations_dir.is_some_and(|dir| {
            dir.children("dir")
                .filter(|lang| lang.attr_str("name") == declared.language)
                .any(has_lc_messages)
        });
    }
}

/// A language directory counts only once it contains an `LC_MESSAGES`
/// entry where the catalogues live.
fn has_lc_messages(lang_dir: &Node) -> bool {
    lang_dir
        .children
        .iter()
        .any(|(tag, child)| {
            (tag == "dir" || tag == "file") && child.attr_str("name") == "LC_MESSAGES"
        })
}

const LICENSE_NOTICE: &str = "\
This add-on was uploaded without a COPYING.txt file. Its contents are \
expected to be distributable under the terms the server's upload terms \
describe; contact the author for details.";

/// Inject a default top-level COPYING.txt when the pack has none.
fn add_license(full_pack: &mut Node) {
    let has_license = full_pack
        .children("file")
        .any(|f| f.attr_str("name").eq_ignore_ascii_case("COPYING.txt"));

    if !has_license {
        full_pack
            .add_child("file")
            .set_attr("name", "COPYING.txt")
            .set_attr("contents", LICENSE_NOTICE);
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Serve one client connection: read framed documents, dispatch, send
/// the response, and re-arm until the peer closes.
pub async fn serve_connection(
    state: Rc<RefCell<Server>>,
    mut stream: TcpStream,
    addr: String,
    document_size_limit: u64,
    report_timings: bool,
) {
    loop {
        let doc = match wire::recv_doc(&mut stream, document_size_limit).await {
            Ok(Some(doc)) => doc,
            Ok(None) => return,
            Err(e) => {
                warn!("[{}] {}", addr, e);
                return;
            }
        };

        // Only the first child is the request; the rest is ignored.
        let Some((tag, body)) = doc.children.into_iter().next() else {
            continue;
        };
        let req = Request {
            tag,
            body,
            addr: addr.clone(),
        };

        let started = Instant::now();
        let (response, compress_level) = {
            let mut server = state.borrow_mut();
            let response = dispatch(&mut server, &req);
            (response, server.config.compress_level)
        };

        if report_timings {
            info!(
                "[{} {}] time elapsed: {} ms",
                req.addr,
                req.tag,
                started.elapsed().as_millis()
            );
        }

        if let Err(e) = send_response(&mut stream, &req, response, compress_level).await {
            // Client disconnects mid-response are absorbed; all disk
            // state was committed before we started sending.
            warn!("[{}] failed to send response: {}", addr, e);
            return;
        }
    }
}

async fn send_response(
    stream: &mut TcpStream,
    req: &Request,
    response: Response,
    compress_level: u32,
) -> crate::error::Result<()> {
    match response {
        Response::Doc(doc) => wire::send_doc(stream, &doc, compress_level).await,
        Response::File(path) => wire::send_file(stream, &path).await,
        Response::Message(message) => {
            let mut doc = Node::new();
            doc.add_child("message").set_attr("message", message);
            wire::send_doc(stream, &doc, compress_level).await
        }
        Response::Error(message) => {
            error!("[{}] {}", req.addr, message);
            let mut doc = Node::new();
            doc.add_child("error").set_attr("message", message);
            wire::send_doc(stream, &doc, compress_level).await
        }
        Response::Status {
            message,
            extra_data,
            code,
        } => {
            error!("[{}]: ({:#010X}) {}", req.addr, code, message);
            let mut doc = Node::new();
            doc.add_child("error")
                .set_attr("message", message)
                .set_attr("extra_data", extra_data)
                .set_attr("status_code", code as i64);
            wire::send_doc(stream, &doc, compress_level).await
        }
    }
}
