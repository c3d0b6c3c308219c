//! Fish tier catalog.
//!
//! Loaded once from a JSON document at startup and read-only afterwards.
//! The same document is served verbatim to render clients so both sides
//! work from identical tier data.

use std::collections::HashMap;
use std::path::Path;

use anyhow::bail;
use protocol::FishStats;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One fish definition as it appears under a tier entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FishDefinition {
    pub name: String,
    /// Model asset path, consumed by render clients.
    pub model: String,
    pub animations: Animations,
    pub stats: FishStats,
}

/// Animation clip names per fish model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Animations {
    pub default: String,
    pub swim: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogFile {
    fish_tiers: Vec<TierEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TierEntry {
    tier: u32,
    default_fish: FishDefinition,
}

/// Tier -> definition lookup, plus the raw document for HTTP serving.
#[derive(Debug)]
pub struct FishCatalog {
    tiers: HashMap<u32, FishDefinition>,
    raw: String,
}

impl FishCatalog {
    /// Load the catalog from disk. Any failure here is startup-fatal; the
    /// room refuses to run without valid tier data.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let catalog = Self::parse(&contents)?;
        info!("Loaded {} fish tiers from {:?}", catalog.tier_count(), path);
        Ok(catalog)
    }

    /// Parse and validate a catalog document.
    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        let file: CatalogFile = serde_json::from_str(contents)?;

        let mut tiers = HashMap::with_capacity(file.fish_tiers.len());
        for entry in file.fish_tiers {
            validate_stats(entry.tier, &entry.default_fish.stats)?;
            if tiers.insert(entry.tier, entry.default_fish).is_some() {
                bail!("Duplicate tier {} in catalog", entry.tier);
            }
        }

        // Tier 1 is the join default; without it no session can spawn.
        if !tiers.contains_key(&1) {
            bail!("Catalog has no tier 1");
        }

        Ok(Self {
            tiers,
            raw: contents.to_string(),
        })
    }

    /// Look up a tier definition.
    pub fn lookup(&self, tier: u32) -> Option<&FishDefinition> {
        self.tiers.get(&tier)
    }

    /// Copy of a tier's base stat block.
    pub fn base_stats(&self, tier: u32) -> Option<FishStats> {
        self.tiers.get(&tier).map(|def| def.stats)
    }

    /// Number of tiers defined.
    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// The document exactly as loaded, for serving to clients.
    pub fn raw_document(&self) -> &str {
        &self.raw
    }
}

/// Every stat field is a magnitude or a rate; a negative value anywhere
/// is a load error.
fn validate_stats(tier: u32, stats: &FishStats) -> anyhow::Result<()> {
    let fields = [
        ("speed", stats.speed),
        ("dashSpeed", stats.dash_speed),
        ("hitboxSize", stats.hitbox_size),
        ("baseScale", stats.base_scale),
        ("maxScale", stats.max_scale),
        ("xpThreshold", stats.xp_threshold),
        ("decayRate", stats.decay_rate),
        ("xpDecayRate", stats.xp_decay_rate),
        ("xpSapRate", stats.xp_sap_rate),
        ("damage", stats.damage),
        ("energy", stats.energy),
        ("xp", stats.xp),
        ("hp", stats.hp),
        ("scale", stats.scale),
    ];
    for (field, value) in fields {
        if value < 0.0 {
            bail!("Tier {} has negative {}: {}", tier, field, value);
        }
    }
    Ok(())
}
