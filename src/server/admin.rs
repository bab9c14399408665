// src/server/admin.rs

//! Admin control channel commands.
//!
//! Lines written to the control FIFO are parsed into a command word
//! plus whitespace-separated arguments. Every state-changing command
//! marks the affected record dirty and flushes immediately, so admin
//! edits survive an unclean exit.

use super::Server;
use crate::auth;
use tracing::{error, info};

/// What the event loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Shutdown,
}

/// A parsed control line.
#[derive(Debug, PartialEq, Eq)]
pub struct ControlLine {
    cmd: String,
    args: Vec<String>,
}

impl ControlLine {
    pub fn parse(line: &str) -> Self {
        let mut parts = line.split_whitespace().map(str::to_string);
        Self {
            cmd: parts.next().unwrap_or_default(),
            args: parts.collect(),
        }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    pub fn args_count(&self) -> usize {
        self.args.len()
    }

    pub fn arg(&self, n: usize) -> &str {
        self.args.get(n).map(String::as_str).unwrap_or("")
    }
}

/// Execute one admin command against the server.
pub fn apply(server: &mut Server, line: &str) -> Outcome {
    let ctl = ControlLine::parse(line);

    match ctl.cmd() {
        "" => {}
        "shut_down" => {
            return Outcome::Shutdown;
        }
        "readonly" => {
            // Without an argument this only reports the current state.
            if ctl.args_count() > 0 {
                let enable = !matches!(ctl.arg(0), "off" | "no" | "false" | "0");
                server.set_read_only(enable);
                server.write_config();
            }
            info!(
                "read only mode: {}",
                if server.config.read_only {
                    "enabled"
                } else {
                    "disabled"
                }
            );
        }
        "flush" => {
            info!("flushing config to disk");
            server.write_config();
        }
        "reload" => match ctl.arg(0) {
            "" => {
                info!("reloading all configuration");
                match server.load_config() {
                    Ok(()) => info!("reloaded configuration"),
                    Err(e) => error!("configuration reload failed: {}", e),
                }
            }
            "blacklist" => {
                info!("reloading blacklist");
                server.load_blacklist();
            }
            other => {
                error!("unrecognized admin reload argument: {}", other);
            }
        },
        "delete" => {
            if ctl.args_count() != 1 {
                error!("incorrect number of arguments for 'delete'");
            } else {
                let id = ctl.arg(0);
                info!("deleting add-on '{}' requested from control pipe", id);
                if let Err(e) = server.delete_addon(id) {
                    error!("cannot delete add-on '{}': {}", id, e);
                }
            }
        }
        cmd @ ("hide" | "unhide") => {
            if ctl.args_count() != 1 {
                error!("incorrect number of arguments for '{}'", cmd);
            } else {
                let id = ctl.arg(0).to_string();
                let hide = cmd == "hide";
                match server.catalogue.get_mut(&id) {
                    Some(addon) => {
                        addon.hidden = hide;
                        server.catalogue.mark_dirty(&id);
                        server.write_config();
                        info!(
                            "add-on '{}' is now {}",
                            id,
                            if hide { "hidden" } else { "unhidden" }
                        );
                    }
                    None => error!("add-on '{}' not found, cannot {}", id, cmd),
                }
            }
        }
        "setpass" => {
            if ctl.args_count() != 2 {
                error!("incorrect number of arguments for 'setpass'");
            } else {
                let id = ctl.arg(0).to_string();
                let newpass = ctl.arg(1);
                if newpass.is_empty() {
                    error!("add-on passphrases may not be empty");
                } else {
                    match server.catalogue.get_mut(&id) {
                        Some(addon) => {
                            let (salt, hash) = auth::generate_hash(newpass);
                            addon.passsalt = salt;
                            addon.passhash = hash;
                            server.catalogue.mark_dirty(&id);
                            server.write_config();
                            info!("new passphrase set for '{}'", id);
                        }
                        None => error!("add-on '{}' not found, cannot set passphrase", id),
                    }
                }
            }
        }
        "setattr" => {
            if ctl.args_count() != 3 {
                error!("incorrect number of arguments for 'setattr'");
            } else {
                set_attribute(server, ctl.arg(0), ctl.arg(1), ctl.arg(2));
            }
        }
        other => {
            error!("unrecognized admin command: {}", other);
        }
    }

    Outcome::Continue
}

fn set_attribute(server: &mut Server, id: &str, key: &str, value: &str) {
    match key {
        "name" | "version" => {
            error!("setattr cannot be used to rename add-ons or change their version");
            return;
        }
        "passphrase" | "passhash" | "passsalt" => {
            error!("setattr cannot be used to set auth data, use setpass instead");
            return;
        }
        _ => {}
    }

    let Some(addon) = server.catalogue.get_mut(id) else {
        error!("add-on '{}' not found, cannot set attribute", id);
        return;
    };

    if !addon.set_known_attr(key, value) {
        error!("attribute '{}' is not a recognized add-on attribute", key);
        return;
    }

    server.catalogue.mark_dirty(id);
    server.write_config();
    info!("set attribute on add-on '{}': {}=\"{}\"", id, key, value);
}
