use super::config::ConfigOverrides;
use clap::Parser;
use std::path::PathBuf;

/// Command line of the `viewcap` binary.
///
/// Every flag can also come from the environment (`PORT`, `CLIENT_URL`,
/// `VIEWCAP_STORAGE_DIR`).
#[derive(Parser, Debug, Clone)]
#[command(name = "viewcap")]
#[command(version)]
#[command(about = "Headless capture service for front and back views of a customized 3D model")]
pub struct CliArgs {
    /// Path to the TOML configuration file; defaults apply when omitted
    pub config_file: Option<PathBuf>,

    /// Port of the HTTP endpoint
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Root URL of the client application rendering the model
    #[arg(long = "render-target-url", env = "CLIENT_URL")]
    pub client_url: Option<String>,

    /// Directory where captured images are written
    #[arg(long, env = "VIEWCAP_STORAGE_DIR")]
    pub storage_dir: Option<PathBuf>,
}

impl CliArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            port: self.port,
            client_url: self.client_url.clone(),
            storage_dir: self.storage_dir.clone(),
        }
    }
}
