// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

use addond::{dispatch, Node, Request, Response, Server};
use std::fs;
use tempfile::TempDir;

pub const TEST_ADDR: &str = "198.51.100.7";
pub const TEST_PASS: &str = "hunter2";

/// Create a server rooted in a fresh temp directory.
///
/// Returns (TempDir, Server) - keep the TempDir alive to prevent cleanup.
pub fn setup_server() -> (TempDir, Server) {
    setup_server_with_config("compress_level=6\n")
}

pub fn setup_server_with_config(config: &str) -> (TempDir, Server) {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("server.cfg"), config).unwrap();
    let server = Server::new(tmp.path(), "server.cfg", None).unwrap();
    (tmp, server)
}

/// Dispatch one request against the server with the standard peer address.
pub fn send(server: &mut Server, tag: &str, body: Node) -> Response {
    dispatch(server, &Request::new(tag, body, TEST_ADDR))
}

/// A pack tree built from (name, contents) pairs at the top level.
pub fn pack_tree(files: &[(&str, &str)]) -> Node {
    let mut tree = Node::new();
    tree.set_attr("name", "");
    for (name, contents) in files {
        tree.add_child("file")
            .set_attr("name", *name)
            .set_attr("contents", *contents);
    }
    tree
}

/// A complete, valid full-pack upload request body.
pub fn upload_body(name: &str, version: &str, files: &[(&str, &str)]) -> Node {
    let mut body = Node::new();
    body.set_attr("name", name)
        .set_attr("title", format!("{} (title)", name))
        .set_attr("author", "tester")
        .set_attr("description", "integration test add-on")
        .set_attr("email", "tester@example.net")
        .set_attr("type", "scenario")
        .set_attr("version", version)
        .set_attr("passphrase", TEST_PASS);
    body.push_child("data", pack_tree(files));
    body
}

/// A delta upload request body with optional removals and additions.
pub fn delta_upload_body(
    name: &str,
    version: &str,
    from: Option<&str>,
    removals: &[&str],
    additions: &[(&str, &str)],
) -> Node {
    let mut body = upload_body(name, version, &[]);
    body.clear_children("data");
    if let Some(from) = from {
        body.set_attr("from", from);
    }

    let mut removelist = Node::new();
    removelist.set_attr("name", "");
    for name in removals {
        removelist.add_child("file").set_attr("name", *name);
    }
    body.push_child("removelist", removelist);
    body.push_child("addlist", pack_tree(additions));
    body
}

/// Apply a chained delta document (alternating removelist/addlist
/// children, in order) to a base pack tree.
pub fn apply_chain(base: &mut Node, chain: &Node) {
    for (tag, step) in &chain.children {
        match tag.as_str() {
            "removelist" => addond::pack::apply_removals(base, step),
            "addlist" => addond::pack::apply_additions(base, step),
            _ => {}
        }
    }
}

/// Delta application appends created files at the end of a directory,
/// so a reconstructed pack can list the same files in a different
/// order than a directly-uploaded one. Sorting children makes the
/// comparison order-insensitive.
pub fn canonical(tree: &Node) -> Node {
    let mut out = tree.clone();
    sort_children(&mut out);
    out
}

fn sort_children(node: &mut Node) {
    for (_, child) in node.children.iter_mut() {
        sort_children(child);
    }
    node.children.sort_by(|(tag_a, a), (tag_b, b)| {
        (tag_a.as_str(), a.attr_str("name")).cmp(&(tag_b.as_str(), b.attr_str("name")))
    });
}

/// Deterministic, poorly-compressible filler so full packs stay larger
/// than their deltas.
pub fn incompressible_text(len: usize) -> String {
    let mut state: u64 = 0x2545_F491_4F6C_DD1D;
    let mut out = String::with_capacity(len + 16);
    while out.len() < len {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        out.push_str(&format!("{:016x}", state));
    }
    out.truncate(len);
    out
}

/// Expect a Message response with the given text.
pub fn expect_message(response: &Response, text: &str) {
    match response {
        Response::Message(msg) => assert_eq!(msg, text),
        other => panic!("expected message '{}', got {:?}", text, other),
    }
}

/// Expect an Error response containing the given fragment.
pub fn expect_error(response: &Response, fragment: &str) {
    match response {
        Response::Error(msg) => {
            assert!(
                msg.contains(fragment),
                "error '{}' does not contain '{}'",
                msg,
                fragment
            );
        }
        other => panic!("expected error containing '{}', got {:?}", fragment, other),
    }
}

/// Expect a structured Status error and return its extra_data.
pub fn expect_status(response: &Response, code: u32) -> String {
    match response {
        Response::Status {
            code: got,
            extra_data,
            ..
        } => {
            assert_eq!(*got, code, "unexpected status code");
            extra_data.clone()
        }
        other => panic!("expected status {:#x}, got {:?}", code, other),
    }
}
