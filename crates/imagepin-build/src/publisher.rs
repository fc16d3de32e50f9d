//! 条件付き公開: 認証 → コンテキスト作成 → ビルド → プッシュ

use crate::auth::RegistryAuth;
use crate::builder::{BuildFlags, ImageBuilder};
use crate::context::ContextBuilder;
use crate::error::BuildResult;
use crate::pusher::ImagePusher;
use async_trait::async_trait;
use bollard::Docker;
use std::collections::HashMap;
use std::path::PathBuf;

/// 公開する1つのイメージ
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// `<registry>/<namespace>/<image>:<tag>`
    pub image_ref: String,
    pub build_args: HashMap<String, String>,
    pub context_dir: PathBuf,
    pub dockerfile: PathBuf,
    pub flags: BuildFlags,
}

#[async_trait]
pub trait ImagePublisher: Send + Sync {
    /// ビルドしてプッシュし、公開したイメージ参照を返す
    async fn publish(&self, request: &PublishRequest) -> BuildResult<String>;
}

#[async_trait]
impl<T: ImagePublisher + ?Sized> ImagePublisher for Box<T> {
    async fn publish(&self, request: &PublishRequest) -> BuildResult<String> {
        (**self).publish(request).await
    }
}

/// Docker Engine API (bollard) を使う公開処理
///
/// デーモンへの接続は公開時に行う。SKIP や dry-run では Docker を必要としない。
pub struct DockerPublisher {
    auth: RegistryAuth,
}

impl DockerPublisher {
    pub fn new(auth: RegistryAuth) -> Self {
        Self { auth }
    }
}

#[async_trait]
impl ImagePublisher for DockerPublisher {
    async fn publish(&self, request: &PublishRequest) -> BuildResult<String> {
        // ビルド前に認証情報を確定させる
        let credentials = self.auth.require_credentials(&request.image_ref)?;

        ContextBuilder::validate_paths(&request.context_dir, &request.dockerfile)?;
        let context_data = ContextBuilder::create_context(&request.context_dir, &request.dockerfile)?;

        let docker = Docker::connect_with_local_defaults()?;
        ImageBuilder::new(docker.clone())
            .build_image(
                context_data,
                &request.image_ref,
                &request.build_args,
                request.flags,
            )
            .await?;

        ImagePusher::new(docker)
            .push(&request.image_ref, credentials)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildError;

    fn request(dir: &std::path::Path) -> PublishRequest {
        PublishRequest {
            image_ref: "ghcr.io/scverse/spatialdata:spatialdata0.2.5".to_string(),
            build_args: HashMap::new(),
            context_dir: dir.to_path_buf(),
            dockerfile: dir.join("Dockerfile"),
            flags: BuildFlags::default(),
        }
    }

    #[tokio::test]
    async fn test_publish_without_credentials_fails_before_docker() {
        let temp_dir = tempfile::tempdir().unwrap();
        let publisher =
            DockerPublisher::new(RegistryAuth::with_config_path(temp_dir.path().join("none.json")));

        let err = publisher.publish(&request(temp_dir.path())).await.unwrap_err();
        assert!(matches!(err, BuildError::AuthFailed { .. }));
    }

    #[tokio::test]
    async fn test_publish_missing_dockerfile_fails_before_docker() {
        let temp_dir = tempfile::tempdir().unwrap();
        let auth = RegistryAuth::with_config_path(temp_dir.path().join("none.json"))
            .with_credentials(crate::auth::RegistryCredentials::new("octocat", "token"));

        let err = DockerPublisher::new(auth)
            .publish(&request(temp_dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::DockerfileNotFound(_)));
    }
}
