//! Per-tier fish stat block.

use serde::{Deserialize, Serialize};

/// Stat block carried by every tier definition and by every live player.
///
/// A player's copy starts as a verbatim copy of its tier's base stats and
/// then drifts (`energy`, `xp`) under the simulation. Any tier transition
/// replaces the whole block with the new tier's base stats.
///
/// Serialized in camelCase to match the catalog file and the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FishStats {
    /// Cruising speed, consumed by render clients.
    pub speed: f32,
    /// Speed while dashing, consumed by render clients.
    pub dash_speed: f32,
    pub hitbox_size: f32,
    pub base_scale: f32,
    pub max_scale: f32,
    /// XP needed before the client offers evolution to the next tier.
    pub xp_threshold: f32,
    /// Energy lost per second.
    pub decay_rate: f32,
    /// XP lost per second. Doubled while dashing.
    pub xp_decay_rate: f32,
    /// Fraction of the host's XP a parasite siphons per second.
    pub xp_sap_rate: f32,
    pub damage: f32,
    pub energy: f32,
    pub xp: f32,
    pub hp: f32,
    pub scale: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_camel_case_keys() {
        let json = r#"{
            "speed": 4.0, "dashSpeed": 8.0, "hitboxSize": 0.5,
            "baseScale": 1.0, "maxScale": 2.0, "xpThreshold": 100.0,
            "decayRate": 0.5, "xpDecayRate": 1.0, "xpSapRate": 0.05,
            "damage": 10.0, "energy": 100.0, "xp": 0.0, "hp": 50.0,
            "scale": 1.0
        }"#;

        let stats: FishStats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.dash_speed, 8.0);
        assert_eq!(stats.xp_sap_rate, 0.05);

        let out = serde_json::to_string(&stats).unwrap();
        assert!(out.contains("\"xpDecayRate\":1.0"));
        assert!(!out.contains("xp_decay_rate"));
    }

    #[test]
    fn rejects_missing_fields() {
        let json = r#"{"speed": 4.0}"#;
        assert!(serde_json::from_str::<FishStats>(json).is_err());
    }
}
