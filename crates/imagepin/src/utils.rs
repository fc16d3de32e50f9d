use colored::Colorize;
use imagepin_build::BuildDecision;
use imagepin_config::LoadedManifest;
use std::io::Write;
use std::path::Path;

/// 読み込んだマニフェスト情報を表示
pub fn print_manifest_source(loaded: &LoadedManifest) {
    match &loaded.source {
        Some(path) => println!("📄 マニフェスト: {}", path.display().to_string().cyan()),
        None => println!("📄 マニフェスト: {}", "(既定値)".dimmed()),
    }
    println!(
        "公開先: {}",
        loaded.manifest.image.repository().cyan()
    );
}

/// 解決したバージョンの一覧を表示
pub fn print_versions(versions: &imagepin_build::ResolvedVersions) {
    for entry in versions.iter() {
        println!(
            "  {} {} ({})",
            entry.name.cyan(),
            entry.version.green(),
            entry.build_arg.dimmed()
        );
    }
}

pub fn print_decision(decision: &BuildDecision) {
    println!("合成タグ: {}", decision.composite_tag.bold());
    if decision.already_published {
        println!("{}", "✓ 公開済みのためスキップします".green());
    } else if let Some(image) = &decision.image_reference {
        println!("{} {}", "● 未公開:".yellow(), image.cyan());
    }
}

/// GitHub Actions のステップ出力 (GITHUB_OUTPUT) に判定を書き出す
///
/// 環境変数が無い場合は何もしない
pub fn write_github_output(decision: &BuildDecision) -> std::io::Result<()> {
    match std::env::var_os("GITHUB_OUTPUT") {
        Some(path) => append_outputs(Path::new(&path), decision),
        None => Ok(()),
    }
}

fn append_outputs(path: &Path, decision: &BuildDecision) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    writeln!(file, "tag={}", decision.composite_tag)?;
    writeln!(file, "skip={}", decision.already_published)?;
    if let Some(image) = &decision.image_reference {
        writeln!(file, "image={}", image)?;
    }
    for entry in decision.versions.iter() {
        writeln!(file, "{}={}", entry.build_arg.to_lowercase(), entry.version)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use imagepin_build::ResolvedVersions;
    use imagepin_config::{ImageTarget, PackageSpec};

    fn decision(existing: &[String]) -> BuildDecision {
        let mut versions = ResolvedVersions::new();
        versions.push(&PackageSpec::new("spatialdata"), "0.2.5");
        versions.push(&PackageSpec::new("spatialdata-io"), "0.1.3");
        versions.push(&PackageSpec::new("spatialdata-plot"), "0.2.1");
        BuildDecision::evaluate(versions, existing, &ImageTarget::default())
    }

    #[test]
    fn test_github_output_for_new_tag() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output = temp_dir.path().join("github_output");

        temp_env::with_var("GITHUB_OUTPUT", Some(output.as_os_str()), || {
            write_github_output(&decision(&[])).unwrap();
        });

        let content = std::fs::read_to_string(&output).unwrap();
        assert!(content.contains(
            "tag=spatialdata0.2.5_spatialdata-io0.1.3_spatialdata-plot0.2.1\n"
        ));
        assert!(content.contains("skip=false\n"));
        assert!(content.contains("image=ghcr.io/scverse/spatialdata:"));
        assert!(content.contains("spatialdata_io_version=0.1.3\n"));
    }

    #[test]
    fn test_github_output_for_published_tag() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output = temp_dir.path().join("github_output");
        let existing =
            vec!["spatialdata0.2.5_spatialdata-io0.1.3_spatialdata-plot0.2.1".to_string()];

        append_outputs(&output, &decision(&existing)).unwrap();

        let content = std::fs::read_to_string(&output).unwrap();
        assert!(content.contains("skip=true\n"));
        assert!(!content.contains("image="));
    }

    #[test]
    fn test_github_output_absent_is_noop() {
        temp_env::with_var("GITHUB_OUTPUT", None::<&str>, || {
            assert!(write_github_output(&decision(&[])).is_ok());
        });
    }
}
