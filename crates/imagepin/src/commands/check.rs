use crate::{setup, utils};
use colored::Colorize;
use imagepin_config::LoadedManifest;

/// 合成タグが公開済みかを確認する。判定結果にかかわらず成功で終了する
pub async fn handle(loaded: &LoadedManifest, json: bool) -> anyhow::Result<()> {
    let manifest = &loaded.manifest;

    let versions = setup::resolver(manifest).resolve(&manifest.packages).await?;
    let decision = setup::checker(manifest).check(versions).await?;
    utils::write_github_output(&decision)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
        return Ok(());
    }

    println!("{}", "タグの公開状況を確認しました".blue());
    utils::print_manifest_source(loaded);
    utils::print_versions(&decision.versions);
    utils::print_decision(&decision);
    Ok(())
}
