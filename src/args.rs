use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

pub const DEFAULT_SECRET_KEY: &str = "dev";

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Whether flaskr's clients connect to it over https.
    /// If so, the session cookie is sent as a secure cookie.
    #[arg(short, long)]
    secure: bool,

    /// The address flaskr should listen on. By default
    /// flaskr will listen just on the IPv4 loopback.
    #[arg(short, long)]
    address: Option<String>,

    /// The port flaskr listens on.
    #[arg(short, long, default_value_t = 5000)]
    port: u16,

    /// Directory for per-instance data, created if missing.
    #[arg(long, default_value = "instance")]
    instance_path: PathBuf,

    /// SQLite database file, `flaskr.sqlite` in the instance directory by default.
    #[arg(long)]
    database: Option<PathBuf>,

    /// Key used to sign session cookies.
    #[arg(long, default_value = DEFAULT_SECRET_KEY)]
    secret_key: String,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Clear the existing data and create new tables.
    InitDb,
}

impl Args {
    pub fn addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.address
            .as_deref()
            .unwrap_or("127.0.0.1")
            .parse()
            .map(|addr: IpAddr| (addr, self.port).into())
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn command(&self) -> Option<Command> {
        self.command
    }

    pub fn instance_path(&self) -> &Path {
        &self.instance_path
    }

    pub fn database(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| self.instance_path.join("flaskr.sqlite"))
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }
}
