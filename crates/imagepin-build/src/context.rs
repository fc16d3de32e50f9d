use crate::error::{BuildError, BuildResult};
use flate2::Compression;
use flate2::write::GzEncoder;
use imagepin_config::BuildSettings;
use std::path::{Path, PathBuf};
use tar::Builder;

const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024;

pub struct ContextBuilder;

impl ContextBuilder {
    /// プロジェクトルート基準でコンテキストと Dockerfile のパスを解決
    ///
    /// 存在確認はしない（公開時に `validate_paths` で行う）。
    pub fn resolve_paths(project_root: &Path, settings: &BuildSettings) -> (PathBuf, PathBuf) {
        (
            project_root.join(&settings.context),
            project_root.join(&settings.dockerfile),
        )
    }

    pub fn validate_paths(context: &Path, dockerfile: &Path) -> BuildResult<()> {
        if !context.exists() {
            return Err(BuildError::ContextNotFound(context.to_path_buf()));
        }
        if !context.is_dir() {
            return Err(BuildError::InvalidConfig(format!(
                "Build context is not a directory: {}",
                context.display()
            )));
        }
        if !dockerfile.is_file() {
            return Err(BuildError::DockerfileNotFound(dockerfile.to_path_buf()));
        }
        Ok(())
    }

    /// ビルドコンテキストをtar.gzアーカイブとして作成
    ///
    /// Dockerfile はアーカイブ直下の `Dockerfile` として格納される。
    pub fn create_context(context_path: &Path, dockerfile_path: &Path) -> BuildResult<Vec<u8>> {
        tracing::debug!("Creating build context from: {}", context_path.display());

        let dockerfile_content = std::fs::read(dockerfile_path)?;

        let mut archive_data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut archive_data, Compression::default());
            let mut tar = Builder::new(encoder);

            tar.append_dir_all(".", context_path)?;

            let mut header = tar::Header::new_gnu();
            header.set_path("Dockerfile").map_err(|e| {
                BuildError::InvalidConfig(format!("Failed to set Dockerfile path: {}", e))
            })?;
            header.set_size(dockerfile_content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append(&header, &dockerfile_content[..])?;

            tar.into_inner()?.finish()?;
        }

        tracing::debug!("Build context created: {} bytes", archive_data.len());
        if archive_data.len() > MAX_CONTEXT_SIZE {
            tracing::warn!(
                "ビルドコンテキストが大きすぎます（{}MB）。.dockerignore で不要なファイルを除外してください。",
                archive_data.len() / 1024 / 1024
            );
        }

        Ok(archive_data)
    }
}
