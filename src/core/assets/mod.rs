mod asset_index;

pub use asset_index::{AssetIndex, AssetObject, AssetSync, DEFAULT_ASSET_WORKERS};
