//! Pipeline configuration resolution.

use async_trait::async_trait;
use std::path::PathBuf;

use conveyor_core::service::{ConfigArgs, ConfigService};
use conveyor_core::{Error, Result};

/// Reads the compiled pipeline for a repository from disk, laid out as
/// `<root>/<namespace>/<name>/<config_path>`. Compilation itself happens
/// upstream of the coordination core.
pub struct FileConfigService {
    root: PathBuf,
}

impl FileConfigService {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl ConfigService for FileConfigService {
    async fn find(&self, args: ConfigArgs<'_>) -> Result<String> {
        let path = self
            .root
            .join(&args.repo.namespace)
            .join(&args.repo.name)
            .join(&args.repo.config_path);
        tokio::fs::read_to_string(&path).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(format!("configuration for {}", args.repo.slug))
            } else {
                Error::Io(err)
            }
        })
    }
}
