// tests/admin_control.rs

//! Admin control channel commands: hide/unhide, setattr and setpass
//! rules, read-only toggling, and shutdown.

mod common;

use addond::server::admin::{self, Outcome};
use addond::{CheckStatus, Node, Response};
use common::*;

#[test]
fn test_hide_and_unhide() {
    let (_tmp, mut server) = setup_server();
    send(
        &mut server,
        "upload",
        upload_body("X", "1.0.0", &[("a.cfg", "A1")]),
    );

    assert_eq!(admin::apply(&mut server, "hide X"), Outcome::Continue);
    assert!(server.catalogue.get("X").unwrap().hidden);

    // Hidden add-ons disappear from the list and from downloads.
    let response = send(&mut server, "request_campaign_list", Node::new());
    let Response::Doc(doc) = response else {
        panic!("expected list document");
    };
    assert_eq!(
        doc.child("campaigns").unwrap().children("campaign").count(),
        0
    );

    let mut req = Node::new();
    req.set_attr("name", "X");
    let response = send(&mut server, "request_campaign", req.clone());
    expect_error(&response, "not found");

    let response = send(&mut server, "request_campaign_hash", req);
    expect_error(&response, "not found");

    // Passphrase-gated operations are refused while hidden.
    let mut body = Node::new();
    body.set_attr("name", "X");
    body.set_attr("passphrase", TEST_PASS);
    let response = send(&mut server, "delete", body);
    expect_error(&response, "denied");

    let response = send(
        &mut server,
        "upload",
        upload_body("X", "1.1.0", &[("a.cfg", "A2")]),
    );
    expect_status(&response, CheckStatus::Denied.code());

    admin::apply(&mut server, "unhide X");
    assert!(!server.catalogue.get("X").unwrap().hidden);

    let response = send(&mut server, "request_campaign_list", Node::new());
    let Response::Doc(doc) = response else {
        panic!("expected list document");
    };
    assert_eq!(
        doc.child("campaigns").unwrap().children("campaign").count(),
        1
    );
}

#[test]
fn test_setattr_rules() {
    let (tmp, mut server) = setup_server();
    send(
        &mut server,
        "upload",
        upload_body("X", "1.0.0", &[("a.cfg", "A1")]),
    );

    admin::apply(&mut server, "setattr X title Renamed");
    assert_eq!(server.catalogue.get("X").unwrap().title, "Renamed");

    // Identity, version, and auth data are off limits.
    admin::apply(&mut server, "setattr X name Other");
    assert!(server.catalogue.get("X").is_some());
    admin::apply(&mut server, "setattr X version 9.9.9");
    assert_eq!(server.catalogue.get("X").unwrap().version, "1.0.0");
    let before_hash = server.catalogue.get("X").unwrap().passhash.clone();
    admin::apply(&mut server, "setattr X passhash junk");
    assert_eq!(server.catalogue.get("X").unwrap().passhash, before_hash);

    // Unknown keys are rejected too.
    admin::apply(&mut server, "setattr X no_such_key value");

    // Accepted changes are flushed immediately.
    let text = std::fs::read_to_string(tmp.path().join("data/X/addon.cfg")).unwrap();
    assert!(text.contains("Renamed"));
}

#[test]
fn test_setpass() {
    let (_tmp, mut server) = setup_server();
    send(
        &mut server,
        "upload",
        upload_body("X", "1.0.0", &[("a.cfg", "A1")]),
    );

    admin::apply(&mut server, "setpass X newsecret");

    let mut body = Node::new();
    body.set_attr("name", "X");
    body.set_attr("passphrase", TEST_PASS);
    let response = send(&mut server, "delete", body);
    expect_error(&response, "The passphrase is incorrect.");

    let mut body = Node::new();
    body.set_attr("name", "X");
    body.set_attr("passphrase", "newsecret");
    let response = send(&mut server, "delete", body);
    expect_message(&response, "Add-on deleted.");

    // A missing passphrase argument leaves the record untouched.
    send(
        &mut server,
        "upload",
        upload_body("Y", "1.0.0", &[("a.cfg", "A1")]),
    );
    admin::apply(&mut server, "setpass Y ");
    let mut body = Node::new();
    body.set_attr("name", "Y");
    body.set_attr("passphrase", TEST_PASS);
    let response = send(&mut server, "delete", body);
    expect_message(&response, "Add-on deleted.");
}

#[test]
fn test_admin_delete() {
    let (tmp, mut server) = setup_server();
    send(
        &mut server,
        "upload",
        upload_body("X", "1.0.0", &[("a.cfg", "A1")]),
    );

    admin::apply(&mut server, "delete X");
    assert!(server.catalogue.get("X").is_none());
    assert!(!tmp.path().join("data/X").exists());

    // Deleting again only logs.
    assert_eq!(admin::apply(&mut server, "delete X"), Outcome::Continue);
}

#[test]
fn test_readonly_toggle() {
    let (_tmp, mut server) = setup_server();

    admin::apply(&mut server, "readonly on");
    let response = send(
        &mut server,
        "upload",
        upload_body("X", "1.0.0", &[("a.cfg", "A1")]),
    );
    expect_status(&response, CheckStatus::ServerReadOnly.code());

    admin::apply(&mut server, "readonly off");
    let response = send(
        &mut server,
        "upload",
        upload_body("X", "1.0.0", &[("a.cfg", "A1")]),
    );
    expect_message(&response, "Add-on accepted.");

    // A bare "readonly" only reports the state, it must not flip it.
    admin::apply(&mut server, "readonly");
    assert!(!server.config.read_only);
    let response = send(
        &mut server,
        "upload",
        upload_body("X", "1.1.0", &[("a.cfg", "A2")]),
    );
    expect_message(&response, "Add-on accepted.");

    admin::apply(&mut server, "readonly on");
    admin::apply(&mut server, "readonly");
    assert!(server.config.read_only);
}

#[test]
fn test_shutdown_and_flush() {
    let (tmp, mut server) = setup_server();
    send(
        &mut server,
        "upload",
        upload_body("X", "1.0.0", &[("a.cfg", "A1")]),
    );

    server.catalogue.get_mut("X").unwrap().downloads = 42;
    server.catalogue.mark_dirty("X");
    assert_eq!(admin::apply(&mut server, "flush"), Outcome::Continue);

    let text = std::fs::read_to_string(tmp.path().join("data/X/addon.cfg")).unwrap();
    assert!(text.contains("downloads=42"));

    assert_eq!(admin::apply(&mut server, "shut_down"), Outcome::Shutdown);

    // Unknown commands are logged, not fatal.
    assert_eq!(admin::apply(&mut server, "frobnicate"), Outcome::Continue);
}

#[test]
fn test_reload_blacklist() {
    let tmp = tempfile::TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("server.cfg"),
        "blacklist_file=\"blacklist.cfg\"\n",
    )
    .unwrap();
    std::fs::write(tmp.path().join("blacklist.cfg"), "").unwrap();
    let mut server = addond::Server::new(tmp.path(), "server.cfg", None).unwrap();

    let response = send(
        &mut server,
        "upload",
        upload_body("Evil_One", "1.0.0", &[("a.cfg", "x")]),
    );
    expect_message(&response, "Add-on accepted.");

    // Tighten the blacklist and reload it without restarting.
    std::fs::write(
        tmp.path().join("blacklist.cfg"),
        "[name]\npattern=\"Evil_*\"\n[/name]\n",
    )
    .unwrap();
    admin::apply(&mut server, "reload blacklist");

    let response = send(
        &mut server,
        "upload",
        upload_body("Evil_Two", "1.0.0", &[("a.cfg", "x")]),
    );
    expect_status(&response, CheckStatus::Denied.code());
}
