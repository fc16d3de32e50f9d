//! 合成タグとビルド判定レコード

use imagepin_config::{ImageTarget, PackageSpec};
use serde::Serialize;
use std::collections::HashMap;

/// 解決済みのパッケージバージョン（マニフェストの package 順）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedVersions {
    entries: Vec<ResolvedPackage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPackage {
    pub name: String,
    pub version: String,
    pub build_arg: String,
}

impl ResolvedVersions {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, spec: &PackageSpec, version: &str) {
        self.entries.push(ResolvedPackage {
            name: spec.name.clone(),
            version: version.to_string(),
            build_arg: spec.build_arg.clone(),
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedPackage> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn version_of(&self, package: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.name == package)
            .map(|e| e.version.as_str())
    }

    /// Dockerfile に渡すビルド引数（値はバージョン文字列そのまま）
    pub fn build_args(&self) -> HashMap<String, String> {
        self.entries
            .iter()
            .map(|e| (e.build_arg.clone(), e.version.clone()))
            .collect()
    }
}

impl Default for ResolvedVersions {
    fn default() -> Self {
        Self::new()
    }
}

/// パッケージ名とバージョンを連結した合成タグ
///
/// `spatialdata0.2.5_spatialdata-io0.1.3_spatialdata-plot0.2.1`
pub fn composite_tag(versions: &ResolvedVersions) -> String {
    versions
        .iter()
        .map(|e| format!("{}{}", e.name, e.version))
        .collect::<Vec<_>>()
        .join("_")
}

/// 1回の実行で作られるビルド判定
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildDecision {
    pub versions: ResolvedVersions,
    pub composite_tag: String,
    pub already_published: bool,
    /// 未公開の場合のみ設定される
    pub image_reference: Option<String>,
}

impl BuildDecision {
    /// 既存タグのどれかが合成タグを部分文字列として含めば公開済みとみなす
    pub fn evaluate(
        versions: ResolvedVersions,
        existing_tags: &[String],
        target: &ImageTarget,
    ) -> Self {
        let composite_tag = composite_tag(&versions);
        let already_published = existing_tags
            .iter()
            .any(|existing| existing.contains(&composite_tag));
        let image_reference = if already_published {
            None
        } else {
            Some(target.reference(&composite_tag))
        };

        Self {
            versions,
            composite_tag,
            already_published,
            image_reference,
        }
    }

    pub fn should_publish(&self) -> bool {
        !self.already_published
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spatialdata_versions(v1: &str, v2: &str, v3: &str) -> ResolvedVersions {
        let mut versions = ResolvedVersions::new();
        versions.push(&PackageSpec::new("spatialdata"), v1);
        versions.push(&PackageSpec::new("spatialdata-io"), v2);
        versions.push(&PackageSpec::new("spatialdata-plot"), v3);
        versions
    }

    #[test]
    fn test_composite_tag_literal_shape() {
        let versions = spatialdata_versions("0.2.5", "0.1.3", "0.2.1");
        assert_eq!(
            composite_tag(&versions),
            "spatialdata0.2.5_spatialdata-io0.1.3_spatialdata-plot0.2.1"
        );
    }

    #[test]
    fn test_build_args_forward_versions_verbatim() {
        let versions = spatialdata_versions("0.2.5", "0.1.3rc1", "0.2.1");
        let args = versions.build_args();
        assert_eq!(args.len(), 3);
        assert_eq!(args["SPATIALDATA_VERSION"], "0.2.5");
        assert_eq!(args["SPATIALDATA_IO_VERSION"], "0.1.3rc1");
        assert_eq!(args["SPATIALDATA_PLOT_VERSION"], "0.2.1");
    }

    #[test]
    fn test_decision_publishes_when_only_older_tag_exists() {
        let existing = vec![
            "spatialdata0.2.4_spatialdata-io0.1.3_spatialdata-plot0.2.1".to_string(),
        ];
        let decision = BuildDecision::evaluate(
            spatialdata_versions("0.2.5", "0.1.3", "0.2.1"),
            &existing,
            &ImageTarget::default(),
        );

        assert!(decision.should_publish());
        assert_eq!(
            decision.image_reference.as_deref(),
            Some(
                "ghcr.io/scverse/spatialdata:spatialdata0.2.5_spatialdata-io0.1.3_spatialdata-plot0.2.1"
            )
        );
    }

    #[test]
    fn test_decision_skips_exact_match() {
        let existing = vec![
            "latest".to_string(),
            "spatialdata0.2.5_spatialdata-io0.1.3_spatialdata-plot0.2.1".to_string(),
        ];
        let decision = BuildDecision::evaluate(
            spatialdata_versions("0.2.5", "0.1.3", "0.2.1"),
            &existing,
            &ImageTarget::default(),
        );

        assert!(decision.already_published);
        assert!(decision.image_reference.is_none());
    }

    #[test]
    fn test_decision_uses_substring_containment() {
        // 0.2.1 の合成タグは 0.2.10 のタグに含まれる
        let existing = vec![
            "spatialdata0.2.5_spatialdata-io0.1.3_spatialdata-plot0.2.10".to_string(),
        ];
        let decision = BuildDecision::evaluate(
            spatialdata_versions("0.2.5", "0.1.3", "0.2.1"),
            &existing,
            &ImageTarget::default(),
        );
        assert!(decision.already_published);
    }

    #[test]
    fn test_decision_is_idempotent() {
        let existing = vec!["spatialdata0.2.4_spatialdata-io0.1.3_spatialdata-plot0.2.1".to_string()];
        let first = BuildDecision::evaluate(
            spatialdata_versions("0.2.5", "0.1.3", "0.2.1"),
            &existing,
            &ImageTarget::default(),
        );
        let second = BuildDecision::evaluate(
            spatialdata_versions("0.2.5", "0.1.3", "0.2.1"),
            &existing,
            &ImageTarget::default(),
        );
        assert_eq!(first, second);
    }

    #[test]
    fn test_decision_with_no_existing_tags() {
        let decision = BuildDecision::evaluate(
            spatialdata_versions("1", "2", "3"),
            &[],
            &ImageTarget::default(),
        );
        assert!(decision.should_publish());
    }
}
