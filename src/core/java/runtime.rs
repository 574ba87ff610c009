// ─── Java Detection ───
// Required major per game version, `-version` probing, and lookup of
// runtimes under `<install>/java/java<major>`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

#[cfg(target_os = "windows")]
use std::os::windows::process::CommandExt;

use tokio::process::Command;
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

/// Executable names in preference order.
const JAVA_EXECUTABLES: [&str; 3] = ["javaw.exe", "java.exe", "java"];

/// Java major a game version needs, or 0 when the version is not a
/// `1.x[.y]` release.
pub fn required_java_major(game_version: &str) -> u32 {
    let Some(rest) = game_version.trim().strip_prefix("1.") else {
        return 0;
    };
    let mut parts = rest.splitn(2, '.');
    let Some(minor) = parts.next().and_then(leading_number) else {
        return 0;
    };
    let patch = parts.next().and_then(leading_number).unwrap_or(0);

    match minor {
        0..=16 => 8,
        17 => 16,
        m if m > 20 => 21,
        20 if patch >= 5 => 21,
        _ => 17,
    }
}

fn leading_number(raw: &str) -> Option<u32> {
    let digits: String = raw.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Major version from `java -version` output. `1.x` maps to `x`.
pub fn parse_java_major(output: &str) -> Option<u32> {
    let start = output.find("version \"")? + "version \"".len();
    let quoted = &output[start..];
    let mut numbers = quoted.split(|c: char| !c.is_ascii_digit());
    let major: u32 = numbers.next()?.parse().ok()?;
    if major != 1 {
        return Some(major);
    }
    // `1.8.0_301`: the second component is the real major.
    let after_dot = quoted.strip_prefix("1.")?;
    leading_number(after_dot).or(Some(1))
}

/// Run `<java> -version` and parse the reported major.
pub async fn probe_major(java: &Path) -> Option<u32> {
    let program = console_less(java);
    let mut cmd = Command::new(&program);
    cmd.arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(target_os = "windows")]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    let output = match cmd.output().await {
        Ok(output) => output,
        Err(e) => {
            debug!("Probing {:?} failed: {}", program, e);
            return None;
        }
    };
    let combined = format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stderr),
        String::from_utf8_lossy(&output.stdout)
    );
    let major = parse_java_major(&combined);
    debug!("Probed {:?}: {:?}", program, major);
    major
}

/// On Windows, probe through `javaw.exe` so no console flashes up.
fn console_less(java: &Path) -> PathBuf {
    if cfg!(target_os = "windows") && java.file_name().and_then(|n| n.to_str()) == Some("java.exe") {
        let javaw = java.with_file_name("javaw.exe");
        if javaw.exists() {
            return javaw;
        }
    }
    java.to_path_buf()
}

pub fn java_version_dir(java_dir: &Path, major: u32) -> PathBuf {
    java_dir.join(format!("java{}", major))
}

/// Find a managed runtime. With a known `major` only `java/java<major>` is
/// searched and the binary must report that major. With `major == 0` every
/// subdirectory of `java/` is accepted without probing.
pub async fn find_installed(java_dir: &Path, major: u32) -> Option<PathBuf> {
    if major > 0 {
        return find_in_tree(&java_version_dir(java_dir, major), major).await;
    }

    let mut dirs: Vec<PathBuf> = std::fs::read_dir(java_dir)
        .ok()?
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.path())
        .collect();
    dirs.sort();
    for dir in dirs {
        if let Some(found) = find_in_tree(&dir, 0).await {
            return Some(found);
        }
    }
    None
}

/// `<dir>/bin/<java>` first, then any `bin/<java>` deeper in the tree.
pub async fn find_in_tree(dir: &Path, major: u32) -> Option<PathBuf> {
    let bin = dir.join("bin");
    if let Some(direct) = JAVA_EXECUTABLES.iter().map(|n| bin.join(n)).find(|p| p.is_file()) {
        if matches_major(&direct, major).await {
            return Some(direct);
        }
    }

    let mut candidates = Vec::new();
    collect_bin_executables(dir, &mut candidates);
    candidates.sort_by_key(|(rank, path)| (*rank, path.clone()));
    for (_, path) in candidates {
        if matches_major(&path, major).await {
            return Some(path);
        }
    }
    None
}

async fn matches_major(java: &Path, major: u32) -> bool {
    major == 0 || probe_major(java).await == Some(major)
}

fn collect_bin_executables(dir: &Path, out: &mut Vec<(usize, PathBuf)>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            collect_bin_executables(&path, out);
            continue;
        }
        let in_bin = dir
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.eq_ignore_ascii_case("bin"))
            .unwrap_or(false);
        if !in_bin {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_ascii_lowercase();
        if let Some(rank) = JAVA_EXECUTABLES.iter().position(|n| *n == name) {
            out.push((rank, path));
        }
    }
}

/// First Java on `PATH`, in the usual preference order.
pub fn system_java() -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    JAVA_EXECUTABLES.iter().find_map(|name| {
        std::env::split_paths(&path_var)
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

/// Managed runtime for `major`, else a system Java reporting the same
/// major.
pub async fn locate_java(java_dir: &Path, major: u32) -> LauncherResult<PathBuf> {
    if let Some(managed) = find_installed(java_dir, major).await {
        return Ok(managed);
    }
    let Some(system) = system_java() else {
        return Err(LauncherError::JavaNotFound(major));
    };
    if major == 0 {
        return Ok(system);
    }
    match probe_major(&system).await {
        Some(found) if found == major => Ok(system),
        Some(found) => Err(LauncherError::JavaVersionMismatch {
            required: major,
            found,
        }),
        None => Err(LauncherError::JavaNotFound(major)),
    }
}
