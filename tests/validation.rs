// tests/validation.rs

//! Upload validation over the request surface: status codes, check
//! ordering, and the authentication gates on delete and passphrase
//! changes.

mod common;

use addond::{CheckStatus, Node};
use common::*;

#[test]
fn test_case_conflicting_filenames_rejected() {
    let (_tmp, mut server) = setup_server();

    let response = send(
        &mut server,
        "upload",
        upload_body("X", "1.0.0", &[("A.CFG", "x"), ("a.cfg", "y")]),
    );
    let extra = expect_status(&response, CheckStatus::FilenameCaseConflict.code());

    let mut offenders: Vec<&str> = extra.lines().collect();
    offenders.sort_unstable();
    assert_eq!(offenders, vec!["A.CFG", "a.cfg"]);

    // Nothing was stored.
    assert!(server.catalogue.get("X").is_none());
}

#[test]
fn test_illegal_filenames_rejected() {
    let (_tmp, mut server) = setup_server();

    let response = send(
        &mut server,
        "upload",
        upload_body("X", "1.0.0", &[("ok.cfg", "x"), ("bad?.cfg", "y")]),
    );
    let extra = expect_status(&response, CheckStatus::IllegalFilename.code());
    assert_eq!(extra, "bad?.cfg");
}

#[test]
fn test_missing_metadata_statuses() {
    let (_tmp, mut server) = setup_server();

    let mut body = upload_body("X", "1.0.0", &[("a.cfg", "x")]);
    body.set_attr("passphrase", "");
    let response = send(&mut server, "upload", body);
    expect_status(&response, CheckStatus::NoPassphrase.code());

    let mut body = upload_body("X", "1.0.0", &[("a.cfg", "x")]);
    body.set_attr("title", "");
    let response = send(&mut server, "upload", body);
    expect_status(&response, CheckStatus::NoTitle.code());

    let mut body = upload_body("X", "1.0.0", &[("a.cfg", "x")]);
    body.set_attr("type", "not_a_type");
    let response = send(&mut server, "upload", body);
    expect_status(&response, CheckStatus::BadType.code());

    let mut body = upload_body("X", "1.0.0", &[("a.cfg", "x")]);
    body.set_attr("author", "");
    let response = send(&mut server, "upload", body);
    expect_status(&response, CheckStatus::NoAuthor.code());

    let mut body = upload_body("X", "", &[("a.cfg", "x")]);
    body.set_attr("version", "");
    let response = send(&mut server, "upload", body);
    expect_status(&response, CheckStatus::NoVersion.code());
}

#[test]
fn test_empty_pack_and_bad_name() {
    let (_tmp, mut server) = setup_server();

    let mut body = upload_body("X", "1.0.0", &[]);
    body.clear_children("data");
    let response = send(&mut server, "upload", body);
    expect_status(&response, CheckStatus::EmptyPack.code());

    let response = send(
        &mut server,
        "upload",
        upload_body("bad name", "1.0.0", &[("a.cfg", "x")]),
    );
    expect_status(&response, CheckStatus::BadName.code());

    let mut body = upload_body("X", "1.0.0", &[("a.cfg", "x")]);
    body.set_attr("title", "~decorated");
    let response = send(&mut server, "upload", body);
    expect_status(&response, CheckStatus::TitleHasMarkup.code());
}

#[test]
fn test_delta_for_unknown_addon_rejected() {
    let (_tmp, mut server) = setup_server();

    let response = send(
        &mut server,
        "upload",
        delta_upload_body("Ghost", "1.1.0", Some("1.0.0"), &[], &[("a.cfg", "x")]),
    );
    expect_status(&response, CheckStatus::UnexpectedDelta.code());
}

#[test]
fn test_wrong_passphrase_on_reupload() {
    let (_tmp, mut server) = setup_server();
    send(
        &mut server,
        "upload",
        upload_body("X", "1.0.0", &[("a.cfg", "A1")]),
    );

    let mut body = upload_body("X", "1.1.0", &[("a.cfg", "A2")]);
    body.set_attr("passphrase", "wrong");
    let response = send(&mut server, "upload", body);
    expect_status(&response, CheckStatus::Unauthorized.code());

    // The stored add-on is untouched.
    let addon = server.catalogue.get("X").unwrap();
    assert_eq!(addon.version, "1.0.0");
    assert_eq!(addon.uploads, 1);
}

#[test]
fn test_case_insensitive_identity() {
    let (_tmp, mut server) = setup_server();
    send(
        &mut server,
        "upload",
        upload_body("MyAddon", "1.0.0", &[("a.cfg", "A1")]),
    );

    // A different-case upload matches the same record and must
    // authenticate against it.
    let mut body = upload_body("myaddon", "1.1.0", &[("a.cfg", "A2")]);
    body.set_attr("passphrase", "wrong");
    let response = send(&mut server, "upload", body);
    expect_status(&response, CheckStatus::Unauthorized.code());

    let response = send(
        &mut server,
        "upload",
        upload_body("myaddon", "1.1.0", &[("a.cfg", "A2")]),
    );
    expect_message(&response, "Add-on accepted.");

    // Still one add-on, under its original identifier.
    assert_eq!(server.catalogue.len(), 1);
    assert_eq!(server.catalogue.get("MyAddon").unwrap().version, "1.1.0");
}

#[test]
fn test_read_only_mode_rejects_writes() {
    let (_tmp, mut server) = setup_server_with_config("read_only=yes\n");

    let response = send(
        &mut server,
        "upload",
        upload_body("X", "1.0.0", &[("a.cfg", "A1")]),
    );
    expect_status(&response, CheckStatus::ServerReadOnly.code());

    let response = send(&mut server, "request_terms", Node::new());
    expect_error(&response, "read-only");

    let mut body = Node::new();
    body.set_attr("name", "X");
    body.set_attr("passphrase", TEST_PASS);
    let response = send(&mut server, "delete", body);
    expect_error(&response, "read-only");
}

#[test]
fn test_blacklisted_upload_denied() {
    let tmp = tempfile::TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("server.cfg"),
        "blacklist_file=\"blacklist.cfg\"\n",
    )
    .unwrap();
    std::fs::write(
        tmp.path().join("blacklist.cfg"),
        "[name]\npattern=\"Evil_*\"\n[/name]\n",
    )
    .unwrap();
    let mut server = addond::Server::new(tmp.path(), "server.cfg", None).unwrap();

    let response = send(
        &mut server,
        "upload",
        upload_body("Evil_Addon", "1.0.0", &[("a.cfg", "x")]),
    );
    expect_status(&response, CheckStatus::Denied.code());

    let response = send(
        &mut server,
        "upload",
        upload_body("Nice_Addon", "1.0.0", &[("a.cfg", "x")]),
    );
    expect_message(&response, "Add-on accepted.");
}

#[test]
fn test_delete_requires_correct_passphrase() {
    let (_tmp, mut server) = setup_server();
    send(
        &mut server,
        "upload",
        upload_body("X", "1.0.0", &[("a.cfg", "A1")]),
    );

    let mut body = Node::new();
    body.set_attr("name", "X");
    body.set_attr("passphrase", "wrong");
    let response = send(&mut server, "delete", body);
    expect_error(&response, "The passphrase is incorrect.");
    assert!(server.catalogue.get("X").is_some());

    let mut body = Node::new();
    body.set_attr("name", "X");
    let response = send(&mut server, "delete", body);
    expect_error(&response, "No passphrase was specified.");

    let mut body = Node::new();
    body.set_attr("name", "X");
    body.set_attr("passphrase", TEST_PASS);
    let response = send(&mut server, "delete", body);
    expect_message(&response, "Add-on deleted.");
    assert!(server.catalogue.get("X").is_none());

    let dir = server.root().join("data/X");
    assert!(!dir.exists());
}

#[test]
fn test_change_passphrase_flow() {
    let (_tmp, mut server) = setup_server();
    send(
        &mut server,
        "upload",
        upload_body("X", "1.0.0", &[("a.cfg", "A1")]),
    );

    let mut body = Node::new();
    body.set_attr("name", "X");
    body.set_attr("passphrase", "wrong");
    body.set_attr("new_passphrase", "fresh");
    let response = send(&mut server, "change_passphrase", body);
    expect_error(&response, "old passphrase was incorrect");

    let mut body = Node::new();
    body.set_attr("name", "X");
    body.set_attr("passphrase", TEST_PASS);
    body.set_attr("new_passphrase", "");
    let response = send(&mut server, "change_passphrase", body);
    expect_error(&response, "No new passphrase");

    let mut body = Node::new();
    body.set_attr("name", "X");
    body.set_attr("passphrase", TEST_PASS);
    body.set_attr("new_passphrase", "fresh");
    let response = send(&mut server, "change_passphrase", body);
    expect_message(&response, "Passphrase changed.");

    // The old passphrase no longer deletes; the new one does.
    let mut body = Node::new();
    body.set_attr("name", "X");
    body.set_attr("passphrase", TEST_PASS);
    let response = send(&mut server, "delete", body);
    expect_error(&response, "The passphrase is incorrect.");

    let mut body = Node::new();
    body.set_attr("name", "X");
    body.set_attr("passphrase", "fresh");
    let response = send(&mut server, "delete", body);
    expect_message(&response, "Add-on deleted.");
}
