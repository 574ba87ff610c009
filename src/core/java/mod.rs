pub mod install;
pub mod runtime;

pub use install::{acquire_runtime, archive_name, RuntimePackage};
pub use runtime::{
    find_installed, java_version_dir, locate_java, parse_java_major, probe_major,
    required_java_major, system_java,
};
