//! Command implementations for catalog-sync.
//!
//! Each command returns the text to print, already formatted for the
//! selected output format.

mod cache;
mod context;
mod entity;
mod image;
mod queue;

pub use self::cache::cache;
pub use self::context::{parse_display, parse_fields, Context};
pub use self::entity::{create, delete, list, show, update};
pub use self::image::{image, load_image};
pub use self::queue::queue;

use clap::CommandFactory;
use clap_complete::Shell;

use crate::cli::args::Cli;

/// Generate a shell completion script.
#[must_use]
pub fn completions(shell: Shell) -> String {
    let mut cmd = Cli::command();
    let mut buf = Vec::new();
    clap_complete::generate(shell, &mut cmd, "catalog-sync", &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}
