//! Configuration Management Module
//!
//! Handles persistent remote filesystem settings and SSH config lookup.

pub mod settings;
pub mod ssh_config;
pub mod storage;

pub use settings::{expand_home, RemoteFsConfig, CONFIG_VERSION};
pub use ssh_config::{
    default_ssh_config_path, parse_ssh_config, parse_ssh_config_content, HostParams,
    SshConfigError, SshConfigHost, SshConfigHosts,
};
pub use storage::{config_dir, settings_file, ConfigStorage, StorageError};
