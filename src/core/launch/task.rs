// ─── Launch Task ───
// Spawns the game process with the resolved command line.

use std::path::{Path, PathBuf};
use std::process::Stdio;

#[cfg(target_os = "windows")]
use std::os::windows::process::CommandExt;

use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::arguments::{build_arguments, LaunchVariables};
use super::classpath::build_classpath;
use super::natives::extract_natives;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::InstallLayout;
use crate::core::retry::check_cancelled;
use crate::core::version::{resolve_version, Platform};

/// Everything needed to start one game session.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub install_dir: PathBuf,
    pub version_id: String,
    pub java_path: PathBuf,
    pub player_name: String,
    pub player_uuid: String,
    pub memory_mb: u32,
    pub console_enabled: bool,
}

/// Resolve, unpack natives and spawn Java. Returns the running child without
/// waiting for it.
#[instrument(skip(request, cancel), fields(version = %request.version_id))]
pub async fn launch_game(request: &LaunchRequest, cancel: &CancellationToken) -> LauncherResult<Child> {
    check_cancelled(cancel)?;
    let layout = InstallLayout::new(request.install_dir.clone());
    let platform = Platform::current();

    let resolved = resolve_version(&layout.versions_dir(), &request.version_id)?;
    if resolved.main_class.is_empty() {
        return Err(LauncherError::Loader(format!(
            "{} has no main class",
            resolved.id
        )));
    }

    let natives_dir = layout.natives_dir(&resolved.id);
    let libraries_dir = layout.libraries_dir();
    let extracted = {
        let libraries = resolved.libraries.clone();
        let libraries_dir = libraries_dir.clone();
        let natives_dir = natives_dir.clone();
        tokio::task::spawn_blocking(move || {
            extract_natives(&libraries, &libraries_dir, &natives_dir, platform)
        })
        .await??
    };
    debug!("Unpacked {} native jars into {:?}", extracted, natives_dir);

    let classpath = build_classpath(&libraries_dir, &layout.versions_dir(), &resolved)?;
    let vars = LaunchVariables::new(
        &request.install_dir,
        &resolved,
        &natives_dir,
        classpath,
        &request.player_name,
        &request.player_uuid,
    );
    let args = build_arguments(&resolved, &vars, i64::from(request.memory_mb), platform);

    check_cancelled(cancel)?;
    let mut cmd = Command::new(&request.java_path);
    cmd.args(&args).current_dir(&request.install_dir);
    configure_native_library_env(&mut cmd, &natives_dir);
    configure_console(&mut cmd, request.console_enabled);

    debug!("Command: {}", format_command_for_logs(&request.java_path, &args));
    let child = cmd
        .spawn()
        .map_err(|e| LauncherError::io(&request.java_path, e))?;

    info!(
        "Started {} as {} (pid {:?})",
        resolved.id,
        request.player_name,
        child.id()
    );
    Ok(child)
}

fn configure_native_library_env(cmd: &mut Command, natives_dir: &Path) {
    let native_path = natives_dir.display().to_string();
    let var = if cfg!(target_os = "windows") {
        "PATH"
    } else if cfg!(target_os = "macos") {
        "DYLD_LIBRARY_PATH"
    } else {
        "LD_LIBRARY_PATH"
    };
    cmd.env(var, append_env_path(var, &native_path));
}

fn configure_console(cmd: &mut Command, console_enabled: bool) {
    if console_enabled {
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        return;
    }

    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    #[cfg(target_os = "windows")]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
}

fn append_env_path(var_name: &str, value: &str) -> String {
    let separator = if cfg!(target_os = "windows") { ";" } else { ":" };
    match std::env::var(var_name) {
        Ok(existing) if !existing.trim().is_empty() => {
            format!("{}{}{}", value, separator, existing)
        }
        _ => value.to_string(),
    }
}

fn format_command_for_logs(program: &Path, args: &[String]) -> String {
    std::iter::once(program.display().to_string())
        .chain(args.iter().map(|a| shell_escape(a)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_escape(raw: &str) -> String {
    if raw.is_empty() {
        return "\"\"".to_string();
    }
    if raw.chars().all(|ch| {
        ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '\\' | '=')
    }) {
        return raw.to_string();
    }
    format!("\"{}\"", raw.replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn append_env_path_prefixes_new_value() {
        let merged = append_env_path("KEYSTONE_SURELY_UNSET_VAR", "/tmp/natives");
        assert_eq!(merged, "/tmp/natives");
    }

    #[test]
    fn shell_escape_quotes_spaces_only_when_needed() {
        assert_eq!(shell_escape("-Xmx4096m"), "-Xmx4096m");
        assert_eq!(shell_escape("a b"), "\"a b\"");
        assert_eq!(shell_escape(""), "\"\"");
    }

    #[tokio::test]
    async fn missing_version_record_fails_before_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let request = LaunchRequest {
            install_dir: dir.path().to_path_buf(),
            version_id: "1.20.1".into(),
            java_path: PathBuf::from("java"),
            player_name: "Steve".into(),
            player_uuid: "uuid".into(),
            memory_mb: 1024,
            console_enabled: false,
        };
        assert!(matches!(
            launch_game(&request, &CancellationToken::new()).await,
            Err(LauncherError::Io { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn spawns_java_in_install_dir_with_resolved_arguments() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let layout = InstallLayout::new(dir.path());
        let version_path = layout.version_json("1.20.1");
        std::fs::create_dir_all(version_path.parent().unwrap()).unwrap();
        std::fs::write(
            &version_path,
            serde_json::to_vec(&json!({
                "id": "1.20.1",
                "mainClass": "net.minecraft.client.main.Main",
                "assetIndex": {"id": "5"},
                "arguments": {
                    "game": ["--username", "${auth_player_name}", "--quickPlayPath", "x", "--demo"],
                    "jvm": ["-Dfoo=bar"]
                }
            }))
            .unwrap(),
        )
        .unwrap();

        let java = dir.path().join("fake-java");
        std::fs::write(&java, "#!/bin/sh\nprintf '%s\\n' \"$@\" > args.txt\n").unwrap();
        std::fs::set_permissions(&java, std::fs::Permissions::from_mode(0o755)).unwrap();

        let request = LaunchRequest {
            install_dir: dir.path().to_path_buf(),
            version_id: "1.20.1".into(),
            java_path: java,
            player_name: "Steve".into(),
            player_uuid: "uuid".into(),
            memory_mb: 2048,
            console_enabled: false,
        };
        let mut child = launch_game(&request, &CancellationToken::new())
            .await
            .unwrap();
        assert!(child.wait().await.unwrap().success());

        let written = std::fs::read_to_string(dir.path().join("args.txt")).unwrap();
        let args: Vec<&str> = written.lines().collect();
        assert_eq!(&args[..3], &["-Xms512m", "-Xmx2048m", "-Dfoo=bar"]);
        assert!(args.contains(&"net.minecraft.client.main.Main"));
        assert_eq!(&args[args.len() - 2..], &["--username", "Steve"]);
        assert!(!args.contains(&"--demo"));
        assert!(layout.natives_dir("1.20.1").is_dir());
    }
}
