//! Browse source for an explorer UI
//!
//! Turns address strings into root entries and directory listings. Bare
//! paths resolve against the session of the last address that named a host.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use super::address;
use super::error::SftpError;
use super::path::RemotePath;
use super::session::SftpSession;
use crate::ssh::ConnectionRegistry;

/// Custom root label builder, given the default label
pub type RootFormatter = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Root entry of a browse
#[derive(Debug, Clone, Serialize)]
pub struct RootCandidate {
    pub display_label: String,
    pub is_directory: bool,
    #[serde(skip)]
    pub handle: RemotePath,
}

/// One child in a listing
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub name: String,
    pub is_directory: bool,
    #[serde(skip)]
    pub handle: RemotePath,
}

pub struct BrowseSource {
    registry: Arc<ConnectionRegistry>,
    current: RwLock<Option<Arc<SftpSession>>>,
    root_formatter: Option<RootFormatter>,
}

impl BrowseSource {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            current: RwLock::new(None),
            root_formatter: None,
        }
    }

    pub fn with_root_formatter(mut self, formatter: RootFormatter) -> Self {
        self.root_formatter = Some(formatter);
        self
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Session bare paths currently resolve against
    pub fn current_session(&self) -> Option<Arc<SftpSession>> {
        self.current.read().clone()
    }

    /// Resolve `address` to a normalized path, connecting if needed
    pub async fn open(&self, address: &str) -> Result<RemotePath, SftpError> {
        let parsed = address::parse(address);

        let session = match &parsed.identity {
            Some(fragment) => {
                let identity = self.registry.identity_for(fragment).await;
                let session = self.registry.resolve(&identity).await?;
                *self.current.write() = Some(session.clone());
                session
            }
            None => self
                .current_session()
                .ok_or_else(|| SftpError::NoActiveSession(address.to_string()))?,
        };

        RemotePath::normalize(session, &parsed.path).await
    }

    pub async fn describe_root(&self, address: &str) -> Result<RootCandidate, SftpError> {
        let handle = self.open(address).await?;
        let label = address::format_root_label(handle.session().identity(), handle.as_str());
        let label = match &self.root_formatter {
            Some(formatter) => formatter(&label),
            None => label,
        };

        debug!("Browse root {}", label);
        Ok(RootCandidate {
            display_label: label.replace('\n', "\\n"),
            is_directory: true,
            handle,
        })
    }

    pub async fn list(&self, dir: &RemotePath) -> Result<Vec<Candidate>, SftpError> {
        let candidates = dir
            .iterdir()
            .await?
            .map(|child| Candidate {
                name: child.name().to_string(),
                is_directory: child.cached_metadata().is_some_and(|m| m.is_dir()),
                handle: child,
            })
            .collect();
        Ok(candidates)
    }
}

impl fmt::Debug for BrowseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowseSource")
            .field("current", &self.current.read().as_ref().map(|s| s.identity().clone()))
            .field("custom_label", &self.root_formatter.is_some())
            .finish()
    }
}
