// ─── Processor Runner ───
// Runs an installer's client-side processors with the provided Java.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::data::{format_processor_arg, DataTable};
use super::profile::Processor;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::launch::classpath::classpath_separator;
use crate::core::maven::MavenArtifact;
use crate::core::retry::check_cancelled;

/// Installed profile libraries by coordinate.
pub type LibraryPaths = HashMap<MavenArtifact, PathBuf>;

/// Read `Main-Class` from a jar's manifest. The manifest entry name is
/// matched case-insensitively and wrapped header lines are joined.
pub fn read_main_class_from_jar(path: &Path) -> LauncherResult<String> {
    let file = std::fs::File::open(path).map_err(|e| LauncherError::io(path, e))?;
    let mut archive = zip::ZipArchive::new(file)?;
    let index = (0..archive.len()).find(|&i| {
        archive
            .name_for_index(i)
            .map(|n| n.eq_ignore_ascii_case("META-INF/MANIFEST.MF"))
            .unwrap_or(false)
    });
    let Some(index) = index else {
        return Err(LauncherError::Loader(format!(
            "manifest not found in {}",
            path.display()
        )));
    };

    let mut text = String::new();
    archive.by_index(index)?.read_to_string(&mut text)?;
    parse_main_class(&text).ok_or_else(|| {
        LauncherError::Loader(format!("Main-Class missing in {}", path.display()))
    })
}

fn parse_main_class(manifest: &str) -> Option<String> {
    let mut main_class: Option<String> = None;
    let mut in_main_class = false;
    for line in manifest.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix(' ') {
            if in_main_class {
                if let Some(value) = main_class.as_mut() {
                    value.push_str(rest.trim_end());
                }
            }
            continue;
        }

        in_main_class = false;
        if let Some((key, value)) = line.split_once(':') {
            if key.trim() == "Main-Class" && main_class.is_none() {
                main_class = Some(value.trim().to_string());
                in_main_class = true;
            }
        }
    }
    main_class.filter(|m| !m.is_empty())
}

/// The Java binary processors run with: on Windows the console-less
/// `javaw.exe` next to the given `java.exe`.
fn processor_java(java_path: &Path) -> PathBuf {
    if cfg!(windows) {
        if let Some(name) = java_path.file_name().and_then(|n| n.to_str()) {
            if name.eq_ignore_ascii_case("java.exe") {
                return java_path.with_file_name("javaw.exe");
            }
        }
    }
    java_path.to_path_buf()
}

/// Command line for one processor, after the Java binary.
pub fn processor_command(
    processor: &Processor,
    libraries: &LibraryPaths,
    libraries_dir: &Path,
    data: &DataTable,
    main_class: &str,
) -> LauncherResult<Vec<String>> {
    let jar = libraries.get(&processor.jar).ok_or_else(|| {
        LauncherError::Loader(format!("processor jar missing: {}", processor.jar))
    })?;

    let mut classpath = vec![jar.display().to_string()];
    for dep in &processor.classpath {
        let path = libraries.get(dep).ok_or_else(|| {
            LauncherError::Loader(format!("processor classpath missing: {}", dep))
        })?;
        classpath.push(path.display().to_string());
    }

    let mut args = vec![
        "-cp".to_string(),
        classpath.join(classpath_separator()),
        main_class.to_string(),
    ];
    args.extend(
        processor
            .args
            .iter()
            .map(|arg| format_processor_arg(arg, libraries_dir, data))
            .filter(|arg| !arg.is_empty()),
    );
    Ok(args)
}

pub struct ProcessorRunner<'a> {
    pub java_path: &'a Path,
    pub libraries: &'a LibraryPaths,
    pub libraries_dir: &'a Path,
    pub data: &'a DataTable,
}

impl ProcessorRunner<'_> {
    /// Run every client-side processor in order, stopping at the first
    /// failure.
    pub async fn run_all(&self, processors: &[Processor], cancel: &CancellationToken) -> LauncherResult<usize> {
        let mut ran = 0;
        for processor in processors.iter().filter(|p| p.runs_on_client()) {
            check_cancelled(cancel)?;
            self.run_one(processor, cancel).await?;
            ran += 1;
        }
        Ok(ran)
    }

    async fn run_one(&self, processor: &Processor, cancel: &CancellationToken) -> LauncherResult<()> {
        let jar = self.libraries.get(&processor.jar).ok_or_else(|| {
            LauncherError::Loader(format!("processor jar missing: {}", processor.jar))
        })?;
        let jar_path = jar.clone();
        let main_class =
            tokio::task::spawn_blocking(move || read_main_class_from_jar(&jar_path)).await??;
        let args = processor_command(processor, self.libraries, self.libraries_dir, self.data, &main_class)?;

        info!("Running processor {} ({})", processor.jar, main_class);
        debug!("Processor args: {:?}", args);

        let java = processor_java(self.java_path);
        let mut cmd = tokio::process::Command::new(&java);
        cmd.args(&args)
            .current_dir(self.libraries_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        configure_processor_spawn(&mut cmd);

        let child = cmd.spawn().map_err(|e| LauncherError::io(&java, e))?;
        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(LauncherError::Cancelled),
            output = child.wait_with_output() => output.map_err(|e| LauncherError::io(&java, e))?,
        };

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(LauncherError::ProcessFailed {
                program: processor.jar.to_string(),
                code: output.status.code(),
                output: combined,
            });
        }
        Ok(())
    }
}

fn configure_processor_spawn(cmd: &mut tokio::process::Command) {
    #[cfg(target_os = "windows")]
    {
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(target_os = "windows"))]
    let _ = cmd;
}
