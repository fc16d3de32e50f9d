use crate::{setup, utils};
use colored::Colorize;
use imagepin_build::composite_tag;
use imagepin_config::LoadedManifest;

/// 各パッケージの最新バージョンと合成タグを表示（レジストリには問い合わせない）
pub async fn handle(loaded: &LoadedManifest, json: bool) -> anyhow::Result<()> {
    let manifest = &loaded.manifest;
    let versions = setup::resolver(manifest).resolve(&manifest.packages).await?;
    let tag = composite_tag(&versions);

    if json {
        let output = serde_json::json!({
            "versions": versions,
            "composite_tag": tag,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "最新バージョン:".blue());
    utils::print_versions(&versions);
    println!("合成タグ: {}", tag.bold());
    Ok(())
}
