// ─── Launch Arguments ───
// Placeholder substitution and the final JVM + game command line.

use std::path::Path;

use crate::core::version::{Platform, ResolvedVersion};

/// Values for the `${...}` placeholders of argument templates.
#[derive(Debug, Clone)]
pub struct LaunchVariables {
    pub player_name: String,
    pub player_uuid: String,
    pub version_name: String,
    pub game_directory: String,
    pub assets_root: String,
    pub assets_index_name: String,
    pub natives_directory: String,
    pub classpath: String,
}

impl LaunchVariables {
    pub fn new(
        install_dir: &Path,
        resolved: &ResolvedVersion,
        natives_dir: &Path,
        classpath: String,
        player_name: &str,
        player_uuid: &str,
    ) -> Self {
        Self {
            player_name: player_name.to_string(),
            player_uuid: player_uuid.to_string(),
            version_name: resolved.id.clone(),
            game_directory: install_dir.display().to_string(),
            assets_root: install_dir.join("assets").display().to_string(),
            assets_index_name: resolved
                .asset_index
                .as_ref()
                .map(|a| a.id.clone())
                .unwrap_or_default(),
            natives_directory: natives_dir.display().to_string(),
            classpath,
        }
    }

    fn table(&self) -> [(&'static str, &str); 16] {
        [
            ("${auth_player_name}", self.player_name.as_str()),
            ("${auth_access_token}", "0"),
            ("${clientid}", ""),
            ("${version_name}", self.version_name.as_str()),
            ("${game_directory}", self.game_directory.as_str()),
            ("${assets_root}", self.assets_root.as_str()),
            ("${assets_index_name}", self.assets_index_name.as_str()),
            ("${auth_uuid}", self.player_uuid.as_str()),
            ("${auth_xuid}", "0"),
            ("${user_type}", "offline"),
            ("${user_properties}", "{}"),
            ("${version_type}", "release"),
            ("${natives_directory}", self.natives_directory.as_str()),
            ("${classpath}", self.classpath.as_str()),
            ("${resolution_width}", "854"),
            ("${resolution_height}", "480"),
        ]
    }

    /// Replace every known placeholder in `input`. Unknown ones stay as is.
    pub fn substitute(&self, input: &str) -> String {
        self.table()
            .iter()
            .fold(input.to_string(), |acc, (key, value)| acc.replace(key, value))
    }
}

/// `-Xms<min(512, mb)>m -Xmx<mb>m`; nothing when no limit is set.
pub fn memory_args(memory_mb: i64) -> Vec<String> {
    if memory_mb <= 0 {
        return Vec::new();
    }
    vec![
        format!("-Xms{}m", memory_mb.min(512)),
        format!("-Xmx{}m", memory_mb),
    ]
}

/// Game arguments that need an account or feature this launcher never
/// provides. Returns whether the next token is the flag's value.
fn skipped_game_arg(arg: &str) -> Option<bool> {
    if arg.starts_with("--quickPlay") {
        Some(true)
    } else if arg == "--demo" {
        Some(false)
    } else {
        None
    }
}

/// Full Java argument list, in order: memory flags, JVM templates, library
/// path, classpath, main class, game templates.
pub fn build_arguments(
    resolved: &ResolvedVersion,
    vars: &LaunchVariables,
    memory_mb: i64,
    platform: Platform,
) -> Vec<String> {
    let mut args = memory_args(memory_mb);

    for template in &resolved.jvm_args {
        args.extend(template.expand(platform).iter().map(|v| vars.substitute(v)));
    }
    args.push(format!("-Djava.library.path={}", vars.natives_directory));
    args.push("-cp".to_string());
    args.push(vars.classpath.clone());
    args.push(resolved.main_class.clone());

    let mut skip_next = false;
    for token in resolved.game_args.iter().flat_map(|t| t.expand(platform)) {
        if skip_next {
            skip_next = false;
            continue;
        }
        if let Some(takes_value) = skipped_game_arg(&token) {
            skip_next = takes_value;
            continue;
        }
        args.push(vars.substitute(&token));
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::version::{Argument, AssetIndexInfo};

    fn vars() -> LaunchVariables {
        LaunchVariables {
            player_name: "Steve".into(),
            player_uuid: "uuid-1".into(),
            version_name: "1.20.1".into(),
            game_directory: "/game".into(),
            assets_root: "/game/assets".into(),
            assets_index_name: "5".into(),
            natives_directory: "/game/bin/1.20.1".into(),
            classpath: "a.jar:b.jar".into(),
        }
    }

    #[test]
    fn memory_flags() {
        assert_eq!(memory_args(4096), vec!["-Xms512m", "-Xmx4096m"]);
        assert_eq!(memory_args(256), vec!["-Xms256m", "-Xmx256m"]);
        assert!(memory_args(0).is_empty());
        assert!(memory_args(-1).is_empty());
    }

    #[test]
    fn substitutes_known_placeholders_only() {
        let v = vars();
        assert_eq!(
            v.substitute("--username ${auth_player_name} --uuid ${auth_uuid}"),
            "--username Steve --uuid uuid-1"
        );
        assert_eq!(v.substitute("${user_properties}"), "{}");
        assert_eq!(v.substitute("${unknown_thing}"), "${unknown_thing}");
    }

    #[test]
    fn arguments_are_assembled_in_order_with_skips() {
        let resolved = ResolvedVersion {
            id: "1.20.1".into(),
            main_class: "net.minecraft.client.main.Main".into(),
            jvm_args: vec![Argument::Plain("-Dnatives=${natives_directory}".into())],
            game_args: [
                "--username",
                "${auth_player_name}",
                "--demo",
                "--quickPlaySingleplayer",
                "world",
                "--assetIndex",
                "${assets_index_name}",
            ]
            .iter()
            .map(|s| Argument::Plain(s.to_string()))
            .collect(),
            asset_index: Some(AssetIndexInfo {
                id: "5".into(),
                ..AssetIndexInfo::default()
            }),
            ..ResolvedVersion::default()
        };

        let args = build_arguments(&resolved, &vars(), 2048, Platform::Linux);
        assert_eq!(
            args,
            vec![
                "-Xms512m",
                "-Xmx2048m",
                "-Dnatives=/game/bin/1.20.1",
                "-Djava.library.path=/game/bin/1.20.1",
                "-cp",
                "a.jar:b.jar",
                "net.minecraft.client.main.Main",
                "--username",
                "Steve",
                "--assetIndex",
                "5",
            ]
        );
    }
}
