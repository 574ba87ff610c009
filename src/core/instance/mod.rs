pub mod layout;
pub mod model;

pub use layout::InstallLayout;
pub use model::LoaderKind;
