//! Renders the `tickwire(1)` man page from the demo client's clap definition.
//!
//! The page lands in `target/generated-man` unless `TICKWIRE_MAN_DIR` names
//! another directory.

use std::{
    env,
    fs,
    io,
    path::{Path, PathBuf},
};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli.rs"]
#[allow(dead_code, reason = "only the command definition is needed here")]
mod cli;

const MAN_DIR_VAR: &str = "TICKWIRE_MAN_DIR";

fn man_dir() -> PathBuf {
    env::var_os(MAN_DIR_VAR).map_or_else(|| PathBuf::from("target/generated-man"), PathBuf::from)
}

fn render_page(dir: &Path) -> io::Result<()> {
    let command = cli::Cli::command().version(env!("CARGO_PKG_VERSION"));
    let mut page = Vec::new();
    Man::new(command).render(&mut page)?;
    fs::create_dir_all(dir)?;
    fs::write(dir.join("tickwire.1"), page)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-env-changed={MAN_DIR_VAR}");
    render_page(&man_dir())?;
    Ok(())
}
