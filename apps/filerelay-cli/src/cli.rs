use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[clap(name = "filerelay")]
#[clap(about = "Send a file to someone through a relay", long_about = None)]
pub struct Cli {
    /// File to send.
    pub file: PathBuf,

    /// Name announced to the receiver. Defaults to the file's own name.
    #[clap(long)]
    pub name: Option<String>,

    /// Relay base URL, overriding the configured one.
    #[clap(long)]
    pub server: Option<String>,

    /// Configuration file to use instead of the default location.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Show sizes in binary units (KiB, MiB, ...).
    #[clap(long)]
    pub iec: bool,
}
