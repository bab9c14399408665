// src/server/mod.rs

//! The add-on server: configuration, state, and the cooperative
//! event loop.
//!
//! The server is single-threaded: one current-thread runtime drives
//! the TCP accept loop, per-connection framing, the periodic metadata
//! flush, signal handling and the admin control pipe. Handlers run to
//! completion between suspension points, so the catalogue needs no
//! locking.

pub mod admin;
pub mod handlers;
pub mod wire;

use crate::blacklist::Blacklist;
use crate::catalogue::Catalogue;
use crate::doc::{self, Node};
use crate::error::{Error, Result};
use crate::fscommit::AtomicFile;
use crate::pack;
use std::cell::RefCell;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 15008;

/// Default cap on inbound document size. An add-on arrives as a single
/// document, so this bounds the largest acceptable upload.
pub const DEFAULT_DOCUMENT_SIZE_LIMIT: u64 = 100 * 1024 * 1024;

/// Default update pack lifespan: one month.
pub const DEFAULT_UPDATE_PACK_LIFESPAN: i64 = 30 * 24 * 60 * 60;

/// Interval between periodic metadata flushes.
const FLUSH_INTERVAL: Duration = Duration::from_secs(10 * 60);

const DEFAULT_TERMS: &str = "\
All content uploaded to this server must be redistributable under a \
free license. By uploading, you certify that you have the right to \
distribute every file in the add-on under the license named in its \
COPYING.txt, and that you choose to do so.";

/// Parsed view of `server.cfg`. The raw tree stays canonical; this
/// struct only caches the typed values the server consults often.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub read_only: bool,
    pub compress_level: u32,
    pub update_pack_lifespan: i64,
    pub document_size_limit: u64,
    pub blacklist_file: String,
    pub control_socket: String,
    pub hook_post_upload: String,
    pub hook_post_erase: String,
    pub feedback_url_format: String,
    pub stats_exempt_ips: Vec<String>,
    pub terms: String,
}

impl ServerConfig {
    /// Extract typed settings from the config tree.
    pub fn from_node(cfg: &Node) -> Self {
        let feedback_url_format = cfg
            .child("server_info")
            .map(|info| info.attr_str("feedback_url_format").to_string())
            .unwrap_or_default();

        let stats_exempt_ips = cfg
            .attr_str("stats_exempt_ips")
            .split([',', ' '])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let terms = match cfg.attr_str("terms") {
            "" => DEFAULT_TERMS.to_string(),
            custom => custom.to_string(),
        };

        Self {
            port: cfg.attr_int("port", DEFAULT_PORT as i64) as u16,
            read_only: cfg.attr_bool("read_only", false),
            compress_level: cfg.attr_int("compress_level", pack::DEFAULT_COMPRESS_LEVEL as i64)
                as u32,
            update_pack_lifespan: cfg
                .attr_timestamp("update_pack_lifespan", DEFAULT_UPDATE_PACK_LIFESPAN),
            document_size_limit: cfg
                .attr_int("document_size_limit", DEFAULT_DOCUMENT_SIZE_LIMIT as i64)
                as u64,
            blacklist_file: cfg.attr_str("blacklist_file").to_string(),
            control_socket: cfg.attr_str("control_socket").to_string(),
            hook_post_upload: cfg.attr_str("hook_post_upload").to_string(),
            hook_post_erase: cfg.attr_str("hook_post_erase").to_string(),
            feedback_url_format,
            stats_exempt_ips,
            terms,
        }
    }
}

/// Server state: config, catalogue, blacklist.
pub struct Server {
    root: PathBuf,
    cfg_file: PathBuf,
    /// Raw config tree; canonical, written back on flush.
    cfg: Node,
    pub config: ServerConfig,
    pub catalogue: Catalogue,
    pub blacklist: Blacklist,
    /// Command-line port override; never persisted.
    port_override: Option<u16>,
    pub report_timings: bool,
}

impl Server {
    /// Load configuration and catalogue, run startup migrations, and
    /// write the initial state back to disk.
    pub fn new(root: impl Into<PathBuf>, cfg_file: &str, port: Option<u16>) -> Result<Self> {
        let root = root.into();
        let cfg_file = root.join(cfg_file);

        let mut server = Self {
            root: root.clone(),
            cfg_file,
            cfg: Node::new(),
            config: ServerConfig::from_node(&Node::new()),
            catalogue: Catalogue::empty(root),
            blacklist: Blacklist::default(),
            port_override: port,
            report_timings: false,
        };
        server.load_config()?;

        info!("port: {}", server.config.port);
        info!(
            "server directory: {} ({} add-ons)",
            server.root.display(),
            server.catalogue.len()
        );

        if !server.config.read_only {
            server.catalogue.migrate_plaintext_passphrases();
            server.write_config();
        }

        Ok(server)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// (Re)read `server.cfg`, the blacklist, and the catalogue.
    pub fn load_config(&mut self) -> Result<()> {
        info!("reading configuration from {}", self.cfg_file.display());

        let text = fs::read_to_string(&self.cfg_file)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", self.cfg_file.display(), e)))?;
        self.cfg = doc::parse(&text)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", self.cfg_file.display(), e)))?;

        self.config = ServerConfig::from_node(&self.cfg);
        if let Some(port) = self.port_override {
            self.config.port = port;
        }

        if self.config.read_only {
            info!("READ-ONLY MODE ACTIVE");
        }

        // Persist the effective compression level so this instance's
        // output stays stable even if the built-in default changes.
        // The port is deliberately not written back.
        self.cfg
            .set_attr("compress_level", self.config.compress_level as i64);

        self.load_blacklist();

        self.catalogue = Catalogue::load(&self.root)?;
        let migrated = self
            .catalogue
            .migrate_legacy(&mut self.cfg, self.config.compress_level)?;
        if migrated {
            self.write_config();
        }

        Ok(())
    }

    /// Reload just the blacklist file. A missing or unreadable file
    /// clears the list rather than keeping a stale one.
    pub fn load_blacklist(&mut self) {
        self.blacklist.clear();

        if self.config.blacklist_file.is_empty() {
            return;
        }

        let path = self.root.join(&self.config.blacklist_file);
        match fs::read_to_string(&path) {
            Ok(text) => match doc::parse(&text) {
                Ok(node) => {
                    self.blacklist = Blacklist::read(&node);
                    info!("using blacklist from {}", path.display());
                }
                Err(e) => {
                    error!(
                        "failed to parse blacklist {}: {}, blacklist disabled",
                        path.display(),
                        e
                    );
                }
            },
            Err(e) => {
                error!(
                    "failed to read blacklist {}: {}, blacklist disabled",
                    path.display(),
                    e
                );
            }
        }
    }

    /// Write `server.cfg` and all dirty add-on metadata to disk.
    ///
    /// Failures are logged; dirty records stay queued for the next
    /// flush.
    pub fn write_config(&mut self) {
        match write_cfg_file(&self.cfg_file, &self.cfg) {
            Ok(()) => {}
            Err(e) => error!("failed to write {}: {}", self.cfg_file.display(), e),
        }
        self.catalogue.flush();
    }

    /// Flip read-only mode in both the parsed view and the canonical tree.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.config.read_only = read_only;
        self.cfg.set_attr("read_only", read_only);
    }

    /// Delete an add-on, flush, and fire the post-erase hook.
    pub fn delete_addon(&mut self, id: &str) -> Result<()> {
        self.catalogue.delete(id)?;
        self.write_config();
        self.fire_hook("hook_post_erase", id);
        Ok(())
    }

    /// Whether download statistics are suppressed for a peer address.
    ///
    /// Masks are glob patterns over the textual address, matching the
    /// original deployment's configuration format.
    pub fn ignore_address_stats(&self, addr: &str) -> bool {
        self.config.stats_exempt_ips.iter().any(|mask| {
            glob::Pattern::new(mask)
                .map(|p| p.matches(addr))
                .unwrap_or(false)
        })
    }

    /// Run a configured hook script with the add-on id as argument.
    ///
    /// The child shares stdout/stderr; nothing waits on its exit
    /// status. Hooks are advisory and their failures are invisible to
    /// clients.
    pub fn fire_hook(&self, hook: &str, addon_id: &str) {
        let script = match hook {
            "hook_post_upload" => &self.config.hook_post_upload,
            "hook_post_erase" => &self.config.hook_post_erase,
            _ => return,
        };
        if script.is_empty() {
            return;
        }

        match tokio::process::Command::new(script).arg(addon_id).spawn() {
            Ok(mut child) => {
                // Reap in the background so the child never zombifies.
                tokio::spawn(async move {
                    let _ = child.wait().await;
                });
            }
            Err(e) => error!("failed to run {} script '{}': {}", hook, script, e),
        }
    }

    /// Drive the cooperative event loop until shutdown.
    pub async fn run(self) -> Result<()> {
        let limit = self.config.document_size_limit;
        let port = self.config.port;
        let control_socket = self.config.control_socket.clone();
        let timings = self.report_timings;

        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        info!("listening on port {}", port);

        let admin_reader = open_control_pipe(&control_socket);

        let mut flush_timer = tokio::time::interval(FLUSH_INTERVAL);
        flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        flush_timer.tick().await; // first tick completes immediately

        let mut sighup = signal(SignalKind::hangup())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        let state = Rc::new(RefCell::new(self));
        let local = tokio::task::LocalSet::new();

        // Reading lines from the pipe is not cancellation-safe inside
        // select!, so a dedicated task forwards complete lines through
        // a channel.
        let (admin_tx, mut admin_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        if let Some(mut reader) = admin_reader {
            local.spawn_local(async move {
                loop {
                    let mut line = String::new();
                    match reader.read_line(&mut line).await {
                        Ok(0) => {
                            warn!("control pipe closed");
                            break;
                        }
                        Ok(_) => {
                            let line = line.trim_end_matches('\n').to_string();
                            if admin_tx.send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            error!("error reading from control pipe: {}", e);
                            break;
                        }
                    }
                }
            });
        }

        local
            .run_until(async {
                loop {
                    tokio::select! {
                        accepted = listener.accept() => {
                            match accepted {
                                Ok((stream, peer)) => {
                                    let state = Rc::clone(&state);
                                    tokio::task::spawn_local(handlers::serve_connection(
                                        state,
                                        stream,
                                        peer.ip().to_string(),
                                        limit,
                                        timings,
                                    ));
                                }
                                Err(e) => warn!("accept failed: {}", e),
                            }
                        }
                        _ = flush_timer.tick() => {
                            state.borrow_mut().write_config();
                        }
                        _ = sighup.recv() => {
                            info!("SIGHUP caught, reloading config");
                            let mut server = state.borrow_mut();
                            if let Err(e) = server.load_config() {
                                error!("config reload failed: {}", e);
                            } else {
                                info!("reloaded configuration");
                            }
                        }
                        _ = sigint.recv() => {
                            info!("interrupted, shutting down");
                            break;
                        }
                        _ = sigterm.recv() => {
                            info!("terminated, shutting down");
                            break;
                        }
                        Some(cmd) = admin_rx.recv() => {
                            let outcome = admin::apply(&mut state.borrow_mut(), &cmd);
                            if outcome == admin::Outcome::Shutdown {
                                info!("shut down requested by admin, shutting down");
                                break;
                            }
                        }
                    }
                }
            })
            .await;

        state.borrow_mut().write_config();
        Ok(())
    }
}

type AdminReader = BufReader<tokio::net::unix::pipe::Receiver>;

/// Create (if needed) and open the admin FIFO for non-blocking reads.
///
/// Opening read-write keeps the pipe from reaching EOF between
/// writers.
fn open_control_pipe(path: &str) -> Option<AdminReader> {
    if path.is_empty() {
        return None;
    }

    use nix::sys::stat::Mode;
    let mode = Mode::from_bits_truncate(0o660);
    match nix::unistd::mkfifo(Path::new(path), mode) {
        Ok(()) => {}
        Err(nix::errno::Errno::EEXIST) => {}
        Err(e) => {
            error!("could not make fifo at '{}': {}", path, e);
            return None;
        }
    }

    match tokio::net::unix::pipe::OpenOptions::new()
        .read_write(true)
        .open_receiver(path)
    {
        Ok(receiver) => {
            info!(
                "opened fifo at '{}'; server commands may be written to this file",
                path
            );
            Some(BufReader::new(receiver))
        }
        Err(e) => {
            error!("could not open fifo at '{}': {}", path, e);
            None
        }
    }
}

fn write_cfg_file(path: &Path, cfg: &Node) -> Result<()> {
    let mut out = AtomicFile::new(path)?;
    out.write_all(doc::write(cfg).as_bytes())
        .map_err(|e| Error::commit(path, e))?;
    out.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ServerConfig::from_node(&Node::new());
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(!config.read_only);
        assert_eq!(config.compress_level, 6);
        assert_eq!(config.update_pack_lifespan, 30 * 24 * 60 * 60);
        assert_eq!(config.document_size_limit, DEFAULT_DOCUMENT_SIZE_LIMIT);
        assert_eq!(config.terms, DEFAULT_TERMS);
    }

    #[test]
    fn test_config_parsing() {
        let text = "\
port=15999
read_only=yes
compress_level=3
update_pack_lifespan=86400
stats_exempt_ips=\"127.0.0.1, 10.0.0.*\"
terms=\"custom terms\"
[server_info]
\tfeedback_url_format=\"https://forum.example/t%{topic_id}\"
[/server_info]
";
        let config = ServerConfig::from_node(&doc::parse(text).unwrap());
        assert_eq!(config.port, 15999);
        assert!(config.read_only);
        assert_eq!(config.compress_level, 3);
        assert_eq!(config.update_pack_lifespan, 86_400);
        assert_eq!(config.stats_exempt_ips, vec!["127.0.0.1", "10.0.0.*"]);
        assert_eq!(config.terms, "custom terms");
        assert_eq!(
            config.feedback_url_format,
            "https://forum.example/t%{topic_id}"
        );
    }

    #[test]
    fn test_stats_exemption_globs() {
        let mut cfg = Node::new();
        cfg.set_attr("stats_exempt_ips", "192.0.2.* 127.0.0.1");
        let mut server = Server {
            root: PathBuf::from("."),
            cfg_file: PathBuf::from("server.cfg"),
            cfg: Node::new(),
            config: ServerConfig::from_node(&cfg),
            catalogue: Catalogue::empty("."),
            blacklist: Blacklist::default(),
            port_override: None,
            report_timings: false,
        };
        assert!(server.ignore_address_stats("192.0.2.77"));
        assert!(server.ignore_address_stats("127.0.0.1"));
        assert!(!server.ignore_address_stats("198.51.100.1"));

        server.config.stats_exempt_ips.clear();
        assert!(!server.ignore_address_stats("127.0.0.1"));
    }
}
