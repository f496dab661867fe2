use clap::Parser;
use openconnect_sso::{LogFormat, LogLevel};
use std::path::PathBuf;

/// Log in to an AnyConnect gateway through its SSO provider and write an
/// OpenConnect cookie file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The OpenConnect VPN server address
    #[arg(long)]
    pub server: String,

    /// Where the OpenConnect config file will be saved
    #[arg(long)]
    pub config: PathBuf,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Log level [WARNING: 'debug' level will print the openconnect login cookie to the console]
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Run the browser without a window (only useful with a pre-authenticated IdP)
    #[arg(long, default_value_t = false)]
    pub headless: bool,

    /// Browser executable to use, either a path or a name on PATH
    #[arg(long, env = "OPENCONNECT_SSO_BROWSER")]
    pub browser: Option<String>,

    /// Give up waiting for the SSO login after this many seconds (0 waits forever)
    #[arg(long, default_value_t = 0)]
    pub login_timeout: u64,

    /// How often to check the browser for the token cookie, in milliseconds
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval: u64,
}
