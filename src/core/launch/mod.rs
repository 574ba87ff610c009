pub mod arguments;
pub mod classpath;
pub mod natives;
pub mod task;

pub use arguments::{build_arguments, memory_args, LaunchVariables};
pub use classpath::{build_classpath, classpath_separator};
pub use natives::extract_natives;
pub use task::{launch_game, LaunchRequest};
