// ─── Inheritance Resolution ───
// Flattens a `inheritsFrom` chain of locally persisted version records.

use std::path::Path;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::{Argument, AssetIndexInfo, Library, VersionJson};

const MAX_INHERITANCE_DEPTH: usize = 8;

/// A version record with its whole parent chain merged in.
#[derive(Debug, Clone, Default)]
pub struct ResolvedVersion {
    pub id: String,
    pub main_class: String,
    /// Parent libraries first, then child.
    pub libraries: Vec<Library>,
    pub jvm_args: Vec<Argument>,
    pub game_args: Vec<Argument>,
    pub asset_index: Option<AssetIndexInfo>,
    /// Root-most id; its jar is the game client.
    pub client_version: String,
}

/// Resolve `versions/<id>/<id>.json` and every ancestor below `versions_dir`.
pub fn resolve_version(versions_dir: &Path, id: &str) -> LauncherResult<ResolvedVersion> {
    resolve_at_depth(versions_dir, id, 0)
}

pub fn load_version(versions_dir: &Path, id: &str) -> LauncherResult<VersionJson> {
    let path = versions_dir.join(id).join(format!("{}.json", id));
    let raw = std::fs::read_to_string(&path).map_err(|e| LauncherError::io(&path, e))?;
    VersionJson::parse(&raw)
}

fn resolve_at_depth(versions_dir: &Path, id: &str, depth: usize) -> LauncherResult<ResolvedVersion> {
    if depth >= MAX_INHERITANCE_DEPTH {
        return Err(LauncherError::Loader(format!(
            "inheritance chain deeper than {} at {}",
            MAX_INHERITANCE_DEPTH, id
        )));
    }

    let record = load_version(versions_dir, id)?;
    let parent = match record.inherits_from.as_deref().map(str::trim) {
        Some(parent_id) if !parent_id.is_empty() => {
            Some(resolve_at_depth(versions_dir, parent_id, depth + 1)?)
        }
        _ => None,
    };
    Ok(merge(record, parent, id))
}

/// Merge one record onto its already-resolved parent.
pub fn merge(record: VersionJson, parent: Option<ResolvedVersion>, requested_id: &str) -> ResolvedVersion {
    let own_id = if record.id.is_empty() {
        requested_id.to_string()
    } else {
        record.id.clone()
    };
    let args = record.normalized_arguments();
    let asset_index = record.asset_index.filter(|a| !a.id.is_empty());

    let Some(parent) = parent else {
        return ResolvedVersion {
            client_version: own_id.clone(),
            id: own_id,
            main_class: record.main_class,
            libraries: record.libraries,
            jvm_args: args.jvm,
            game_args: args.game,
            asset_index,
        };
    };

    let mut libraries = parent.libraries;
    libraries.extend(record.libraries);
    let mut jvm_args = parent.jvm_args;
    jvm_args.extend(args.jvm);
    let mut game_args = parent.game_args;
    game_args.extend(args.game);

    ResolvedVersion {
        id: own_id,
        main_class: if record.main_class.is_empty() {
            parent.main_class
        } else {
            record.main_class
        },
        libraries,
        jvm_args,
        game_args,
        asset_index: asset_index.or(parent.asset_index),
        client_version: if parent.client_version.is_empty() {
            requested_id.to_string()
        } else {
            parent.client_version
        },
    }
}
