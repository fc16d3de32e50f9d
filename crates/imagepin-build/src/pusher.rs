//! イメージプッシュ処理

use crate::error::{BuildError, BuildResult};
use bollard::Docker;
use bollard::auth::DockerCredentials;
use bollard::models::PushImageInfo;
use colored::Colorize;
use futures_util::StreamExt;
use std::io::Write;

const MAX_TAG_LEN: usize = 128;

/// イメージプッシュを実行するハンドラ
pub struct ImagePusher {
    docker: Docker,
}

impl ImagePusher {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// タグ付きイメージ参照をレジストリにプッシュ
    pub async fn push(
        &self,
        image_ref: &str,
        credentials: DockerCredentials,
    ) -> BuildResult<String> {
        let (image, tag) = split_image_tag(image_ref);
        validate_tag(&tag)?;

        #[allow(deprecated)]
        let options = bollard::image::PushImageOptions::<String> { tag: tag.clone() };

        println!("  → {}", image_ref.cyan());

        #[allow(deprecated)]
        let mut stream = self.docker.push_image(&image, Some(options), Some(credentials));

        let mut last_status = String::new();
        let mut error_message: Option<String> = None;

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(err) = info.error {
                        error_message = Some(err);
                    } else {
                        handle_progress(&info, &mut last_status);
                    }
                }
                Err(e) => {
                    return Err(BuildError::PushFailed {
                        message: e.to_string(),
                    });
                }
            }
        }

        println!();

        if let Some(err) = error_message {
            return Err(BuildError::PushFailed { message: err });
        }

        tracing::info!("Pushed {}", image_ref);
        Ok(format!("{}:{}", image, tag))
    }
}

/// Docker タグの制約を確認
///
/// 128文字以下、英数字と `.` `-` `_` のみ、先頭は `.` `-` 以外
pub fn validate_tag(tag: &str) -> BuildResult<()> {
    if tag.is_empty() {
        return Err(BuildError::InvalidTag {
            tag: "(empty)".to_string(),
        });
    }

    if tag.len() > MAX_TAG_LEN {
        return Err(BuildError::InvalidTag {
            tag: format!("Tag too long ({} characters, max {})", tag.len(), MAX_TAG_LEN),
        });
    }

    if tag.starts_with('.') || tag.starts_with('-') {
        return Err(BuildError::InvalidTag {
            tag: tag.to_string(),
        });
    }

    if let Some(c) = tag
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '.' && *c != '-' && *c != '_')
    {
        return Err(BuildError::InvalidTag {
            tag: format!("Invalid character '{}' in tag: {}", c, tag),
        });
    }

    Ok(())
}

fn handle_progress(info: &PushImageInfo, last_status: &mut String) {
    let Some(status) = &info.status else {
        return;
    };
    let progress = info.progress.as_deref().unwrap_or("");

    match status.as_str() {
        "Pushing" => {
            print!("\r  ↑ {} {}     ", status, progress);
            std::io::stdout().flush().ok();
        }
        "Pushed" => {
            println!("\r  {} Pushed                    ", "✓".green());
        }
        "Layer already exists" => {
            println!("\r  {} Layer already exists      ", "✓".green());
        }
        "Preparing" | "Waiting" => {}
        _ => {
            if status != last_status {
                println!("\r  ℹ {}                    ", status);
                *last_status = status.clone();
            }
        }
    }
}

/// イメージ名とタグを分離
///
/// - `ghcr.io/org/app:v1.0` -> `("ghcr.io/org/app", "v1.0")`
/// - `ghcr.io/org/app` -> `("ghcr.io/org/app", "latest")`
/// - `localhost:5000/app:dev` -> `("localhost:5000/app", "dev")`
pub fn split_image_tag(image: &str) -> (String, String) {
    if let Some(pos) = image.rfind(':') {
        let potential_tag = &image[pos + 1..];
        let potential_image = &image[..pos];

        // ポート番号は / を含まない純粋な数字
        if !potential_tag.contains('/') && !potential_tag.chars().all(|c| c.is_ascii_digit()) {
            return (potential_image.to_string(), potential_tag.to_string());
        }
    }

    (image.to_string(), "latest".to_string())
}
