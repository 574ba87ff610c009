/// Upstream service locations. Mirror lists are tried in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub version_manifest: String,
    pub libraries: String,
    pub resources: String,
    pub fabric_meta: Vec<String>,
    pub forge_maven: Vec<String>,
    pub neoforge_maven: Vec<String>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            version_manifest: "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json"
                .to_string(),
            libraries: "https://libraries.minecraft.net".to_string(),
            resources: "https://resources.download.minecraft.net".to_string(),
            fabric_meta: vec![
                "https://meta.fabricmc.net".to_string(),
                "https://maven.fabricmc.net".to_string(),
            ],
            forge_maven: vec![
                "https://maven.minecraftforge.net".to_string(),
                "https://files.minecraftforge.net/maven".to_string(),
                "https://forge.fastmcmirror.org".to_string(),
            ],
            neoforge_maven: vec![
                "https://maven.neoforged.net/releases".to_string(),
                "https://maven.neoforged.net".to_string(),
            ],
        }
    }
}
