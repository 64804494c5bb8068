//! Command line of `fx3ppsd`.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use fx3pps_transport::DeviceRole;

use crate::config::ServiceConfig;

#[derive(Debug, Parser)]
#[command(name = "fx3ppsd")]
#[command(version)]
#[command(about = "Drive FX3 PPS generator boards and feed FX3 receiver edges to chrony")]
pub struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "FX3PPSD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Assert-to-clear separation in nanoseconds (0 to 100000000)
    #[arg(long)]
    pub send_delay_ns: Option<u64>,

    /// Attach only these roles (repeatable)
    #[arg(long = "role", value_enum)]
    pub roles: Vec<RoleArg>,

    /// Publish receiver edges to this chronyd SOCK refclock socket
    #[arg(long)]
    pub chrony_socket: Option<PathBuf>,

    /// Skip the warm-up write burst and use the configured write-time seed
    #[arg(long)]
    pub no_calibrate: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub check_config: bool,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Generator,
    Receiver,
}

impl From<RoleArg> for DeviceRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Generator => DeviceRole::Generator,
            RoleArg::Receiver => DeviceRole::Receiver,
        }
    }
}

impl Cli {
    /// Apply command-line overrides on top of the file configuration.
    pub fn apply(&self, config: &mut ServiceConfig) {
        if let Some(ns) = self.send_delay_ns {
            config.generator.send_delay_ns = ns;
        }
        if !self.roles.is_empty() {
            let mut roles: Vec<DeviceRole> = Vec::new();
            for role in self.roles.iter().copied().map(DeviceRole::from) {
                if !roles.contains(&role) {
                    roles.push(role);
                }
            }
            config.roles = roles;
        }
        if let Some(path) = &self.chrony_socket {
            config.chrony_socket = Some(path.clone());
        }
        if self.no_calibrate {
            config.generator.calibrate_on_attach = false;
        }
    }

    /// Log filter to use when `RUST_LOG` is not set.
    pub fn log_filter(&self, config: &ServiceConfig) -> String {
        match self.verbose {
            0 => config.log_filter.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }
}
