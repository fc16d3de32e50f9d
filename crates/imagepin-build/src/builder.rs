use crate::error::{BuildError, BuildResult};
use bollard::Docker;
use bollard::models::BuildInfo;
use bytes::Bytes;
use colored::Colorize;
use futures_util::stream::StreamExt;
use http_body_util::{Either, Full};
use std::collections::HashMap;

/// ビルド時の挙動
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildFlags {
    pub no_cache: bool,
    /// ベースイメージを常に pull する
    pub pull: bool,
}

pub struct ImageBuilder {
    docker: Docker,
}

impl ImageBuilder {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// tar.gz コンテキストからイメージをビルドし、`image_ref` でタグ付けする
    pub async fn build_image(
        &self,
        context_data: Vec<u8>,
        image_ref: &str,
        build_args: &HashMap<String, String>,
        flags: BuildFlags,
    ) -> BuildResult<()> {
        tracing::info!("Building image: {}", image_ref);

        let build_args_refs: HashMap<&str, &str> = build_args
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        tracing::debug!("Build args: {:?}", build_args);

        #[allow(deprecated)]
        let options = bollard::image::BuildImageOptions {
            dockerfile: "Dockerfile",
            t: image_ref,
            buildargs: build_args_refs,
            nocache: flags.no_cache,
            pull: flags.pull,
            rm: true,
            forcerm: true,
            ..Default::default()
        };

        let body = Full::new(Bytes::from(context_data));
        let mut stream = self
            .docker
            .build_image(options, None, Some(Either::Left(body)));

        while let Some(msg) = stream.next().await {
            let output = msg.map_err(BuildError::DockerConnection)?;
            handle_build_output(output)?;
        }

        tracing::info!("Successfully built: {}", image_ref);
        Ok(())
    }
}

/// ビルド出力の処理
fn handle_build_output(output: BuildInfo) -> BuildResult<()> {
    if let Some(stream) = output.stream {
        print!("{}", stream);
    }

    if let Some(error) = output.error {
        return Err(BuildError::BuildFailed(error));
    }

    if let Some(error_detail) = output.error_detail {
        let error_msg = error_detail
            .message
            .unwrap_or_else(|| "Unknown build error".to_string());
        return Err(BuildError::BuildFailed(error_msg));
    }

    if let Some(status) = output.status {
        println!("{}", status.cyan());
    }

    Ok(())
}
