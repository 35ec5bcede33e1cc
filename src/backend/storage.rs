use std::{
    io,
    path::{Component, Path, PathBuf},
};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{BackendError, BackendResult};

use super::ObjectStorage;

/// Object storage on the local filesystem. Objects live at
/// `<root>/<bucket>/<path>` and are served under `<public_url>/<bucket>/<path>`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_url: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        let public_url: String = public_url.into();
        Self {
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_owned(),
        }
    }

    fn resolve(&self, bucket: &str, path: &str) -> BackendResult<PathBuf> {
        let relative = Path::new(bucket).join(path);
        let contained = !bucket.is_empty()
            && !path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));

        if !contained {
            return Err(BackendError::Malformed(format!("object path {bucket}/{path}")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> BackendResult<String> {
        let target = self.resolve(bucket, path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;

        debug!(bucket, path, content_type, len = bytes.len(), "stored object");
        Ok(format!("{}/{bucket}/{path}", self.public_url))
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> BackendResult<()> {
        for path in paths {
            let target = self.resolve(bucket, path)?;
            match tokio::fs::remove_file(&target).await {
                Ok(()) => debug!(bucket, path, "removed object"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn object_path(&self, bucket: &str, public_url: &str) -> Option<String> {
        let prefix = format!("{}/{bucket}/", self.public_url);
        public_url
            .strip_prefix(&prefix)
            .filter(|path| !path.is_empty())
            .map(str::to_owned)
    }
}
