// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("addond")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Versioned add-on storage and delivery server")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .default_value("server.cfg")
                .help("Path to the server configuration file"),
        )
        .arg(
            Arg::new("server_dir")
                .short('d')
                .long("server-dir")
                .value_name("DIR")
                .help("Server directory (defaults to the current directory)"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Listening port override"),
        )
        .arg(
            Arg::new("timings")
                .long("timings")
                .action(clap::ArgAction::SetTrue)
                .help("Log per-request service times"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    if let Err(e) = fs::write(man_dir.join("addond.8"), buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
