//! Room state and simulation loop.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use protocol::messages::{ClientMessage, PlayerSnapshot, ServerMessage};
use protocol::{FishStats, PlayVolume, Position, SessionId, SESSION_ID_LEN};
use rand::distr::Alphanumeric;
use rand::Rng;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::catalog::FishCatalog;

use super::player::Player;
use super::{StateBroadcast, TargetedEvent};

/// Tier every new session starts at.
pub const JOIN_TIER: u32 = 1;
/// The non-progressing parasite tier.
pub const PARASITE_TIER: u32 = 0;
/// Fraction of the lower tier's threshold granted after a downgrade.
const DOWNGRADE_XP_CUSHION: f32 = 0.8;

/// Pending broadcasts to send after releasing the room lock.
pub struct PendingBroadcasts {
    /// Snapshot of every player, keyed by session id.
    pub players: BTreeMap<SessionId, PlayerSnapshot>,
    /// Addressed events queued by this tick.
    pub events: Vec<TargetedEvent>,
}

/// Why an intent was dropped.
///
/// Rejections never reach the wire: the sender sees no reply and no state
/// change. They exist so the reasons stay testable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Unknown session")]
    UnknownSession,
    #[error("Movement is locked while attached")]
    MoveWhileAttached,
    #[error("Only parasites can attach")]
    NotAParasite,
    #[error("Parasites cannot evolve")]
    ParasiteEvolve,
    #[error("Attach target is not in the room")]
    UnknownTarget,
    #[error("Attach would close a host cycle")]
    AttachCycle,
    #[error("Tier {0} is not in the catalog")]
    UnknownTier(u32),
}

/// Main room state.
pub struct Room {
    pub catalog: Arc<FishCatalog>,
    pub players: HashMap<SessionId, Player>,
    pub tick_count: u64,
    /// Exponential moving average of tick duration in milliseconds.
    pub tick_time_avg: f64,
    /// Base stats handed to every new session.
    join_stats: FishStats,
    state_tx: broadcast::Sender<StateBroadcast>,
    event_tx: broadcast::Sender<TargetedEvent>,
}

impl Room {
    /// Create the room around a loaded catalog.
    pub fn new(
        catalog: Arc<FishCatalog>,
        state_tx: broadcast::Sender<StateBroadcast>,
        event_tx: broadcast::Sender<TargetedEvent>,
    ) -> anyhow::Result<Self> {
        let join_stats = catalog
            .base_stats(JOIN_TIER)
            .ok_or_else(|| anyhow::anyhow!("Catalog has no tier {}", JOIN_TIER))?;

        Ok(Self {
            catalog,
            players: HashMap::new(),
            tick_count: 0,
            tick_time_avg: 0.0,
            join_stats,
            state_tx,
            event_tx,
        })
    }

    /// Add a new player at a random spawn, returning its session id.
    pub fn add_player(&mut self, addr: SocketAddr) -> SessionId {
        let id = self.generate_session_id();
        let position = Self::spawn_position();
        let player = Player::new(id.clone(), addr, position, JOIN_TIER, self.join_stats);
        self.players.insert(id.clone(), player);
        info!("Player {} joined from {}", id, addr);
        id
    }

    /// Remove a player. Parasites still pointing at it self-heal on the
    /// next tick through the missing-host rule.
    pub fn remove_player(&mut self, id: &SessionId) {
        if let Some(player) = self.players.remove(id) {
            info!("Player {} ({}) left", id, player.addr);
        }
    }

    /// Handle a decoded message from a session.
    pub fn handle_message(&mut self, session_id: &SessionId, message: ClientMessage) {
        if let Err(rejection) = self.apply_message(session_id, &message) {
            debug!("Dropped {:?} from {}: {}", message, session_id, rejection);
        }
    }

    fn apply_message(
        &mut self,
        session_id: &SessionId,
        message: &ClientMessage,
    ) -> Result<(), Rejection> {
        let player = self
            .players
            .get_mut(session_id)
            .ok_or(Rejection::UnknownSession)?;
        player.touch();

        self.validate_intent(session_id, message)?;

        match message {
            ClientMessage::Move { dx, dy, dz } => {
                if let Some(player) = self.players.get_mut(session_id) {
                    player.position += Position::new(*dx, *dy, *dz);
                }
            }
            ClientMessage::StartDash => {
                if let Some(player) = self.players.get_mut(session_id) {
                    player.is_dashing = true;
                }
                self.shake_off_parasites(session_id);
            }
            ClientMessage::EndDash => {
                if let Some(player) = self.players.get_mut(session_id) {
                    player.is_dashing = false;
                }
            }
            ClientMessage::Attach { target_id } => {
                if let Some(player) = self.players.get_mut(session_id) {
                    player.attached_to = Some(target_id.clone());
                }
            }
            ClientMessage::Detach => {
                if let Some(player) = self.players.get_mut(session_id) {
                    player.attached_to = None;
                }
            }
            ClientMessage::Evolve { tier } => {
                if let Some(stats) = self.catalog.base_stats(*tier) {
                    if let Some(player) = self.players.get_mut(session_id) {
                        debug!(
                            "Player {} evolved from tier {} to {}",
                            session_id, player.tier, tier
                        );
                        player.tier = *tier;
                        player.stats = stats;
                    }
                }
            }
        }

        Ok(())
    }

    /// Check an intent against the current state without mutating anything.
    ///
    /// Every rule that can reject an intent lives here, including the
    /// stated trust gaps: move deltas are not clamped and evolve does not
    /// check thresholds or adjacency.
    fn validate_intent(
        &self,
        session_id: &SessionId,
        message: &ClientMessage,
    ) -> Result<(), Rejection> {
        let player = self
            .players
            .get(session_id)
            .ok_or(Rejection::UnknownSession)?;

        match message {
            ClientMessage::Move { .. } => {
                // Attached players derive their position from the host.
                if player.attached_to.is_some() {
                    return Err(Rejection::MoveWhileAttached);
                }
            }
            ClientMessage::StartDash | ClientMessage::EndDash => {}
            ClientMessage::Attach { target_id } => {
                if player.tier != PARASITE_TIER {
                    return Err(Rejection::NotAParasite);
                }
                if !self.players.contains_key(target_id) {
                    return Err(Rejection::UnknownTarget);
                }
                if self.attach_would_cycle(session_id, target_id) {
                    return Err(Rejection::AttachCycle);
                }
            }
            ClientMessage::Detach => {
                if player.tier != PARASITE_TIER {
                    return Err(Rejection::NotAParasite);
                }
            }
            ClientMessage::Evolve { tier } => {
                if player.tier == PARASITE_TIER {
                    return Err(Rejection::ParasiteEvolve);
                }
                if self.catalog.lookup(*tier).is_none() {
                    return Err(Rejection::UnknownTier(*tier));
                }
            }
        }

        Ok(())
    }

    /// Walk the attachment chain from `target`; reaching `caller` means
    /// the attach would close a cycle. Catches `target == caller` too.
    fn attach_would_cycle(&self, caller: &SessionId, target: &SessionId) -> bool {
        let mut current = Some(target);
        while let Some(id) = current {
            if id == caller {
                return true;
            }
            current = self.players.get(id).and_then(|p| p.attached_to.as_ref());
        }
        false
    }

    /// Force every parasite latched onto `host_id` off and tell each one.
    fn shake_off_parasites(&mut self, host_id: &SessionId) {
        let Some(host) = self.players.get(host_id) else {
            return;
        };
        if host.tier == PARASITE_TIER {
            return;
        }

        let mut shaken = Vec::new();
        for (id, player) in self.players.iter_mut() {
            if player.attached_to.as_ref() == Some(host_id) {
                player.attached_to = None;
                shaken.push(id.clone());
            }
        }

        for id in shaken {
            debug!("Parasite {} shaken off {}", id, host_id);
            let _ = self.event_tx.send(TargetedEvent {
                session_id: id,
                message: ServerMessage::Detach,
            });
        }
    }

    /// Run a single simulation tick and return the pending broadcasts.
    pub fn tick(&mut self, dt: f32) -> PendingBroadcasts {
        self.tick_count += 1;

        let mut events = Vec::new();

        // Decay and downgrade pass.
        for player in self.players.values_mut() {
            let stats = &mut player.stats;
            stats.energy = (stats.energy - stats.decay_rate * dt).clamp(0.0, stats.energy);

            let xp_rate = if player.is_dashing {
                stats.xp_decay_rate * 2.0
            } else {
                stats.xp_decay_rate
            };
            stats.xp = (stats.xp - xp_rate * dt).max(0.0);

            // Starved above the floor: drop a tier and restart from the
            // cushion.
            if player.stats.xp <= 0.0 && player.tier > JOIN_TIER {
                let lower = player.tier - 1;
                if let Some(base) = self.catalog.base_stats(lower) {
                    player.tier = lower;
                    player.stats = base;
                    player.stats.xp = DOWNGRADE_XP_CUSHION * base.xp_threshold;
                    events.push(TargetedEvent {
                        session_id: player.id.clone(),
                        message: ServerMessage::TierDowngrade {
                            id: player.id.clone(),
                            tier: player.tier,
                            xp: player.stats.xp,
                        },
                    });
                }
            }
        }

        // Siphon pass, in id order, against live host xp.
        let mut parasites: Vec<SessionId> = self
            .players
            .values()
            .filter(|p| p.tier == PARASITE_TIER && p.attached_to.is_some())
            .map(|p| p.id.clone())
            .collect();
        parasites.sort();

        for id in &parasites {
            let Some(parasite) = self.players.get(id) else {
                continue;
            };
            let sap_rate = parasite.stats.xp_sap_rate;
            let Some(host_id) = parasite.attached_to.clone() else {
                continue;
            };

            // A dangling reference to a disconnected host skips the
            // transfer; the record heals when the parasite re-attaches.
            let Some(host) = self.players.get_mut(&host_id) else {
                continue;
            };
            let sapped = host.stats.xp * sap_rate * dt;
            host.stats.xp -= sapped;
            if let Some(parasite) = self.players.get_mut(id) {
                parasite.stats.xp += sapped;
            }
        }

        let players: BTreeMap<SessionId, PlayerSnapshot> = self
            .players
            .values()
            .map(|p| (p.id.clone(), p.snapshot()))
            .collect();

        if self.tick_count % 400 == 0 {
            debug!(
                "Tick #{}: {} players, avg {:.2}ms",
                self.tick_count,
                players.len(),
                self.tick_time_avg
            );
        }

        PendingBroadcasts { players, events }
    }

    fn generate_session_id(&self) -> SessionId {
        loop {
            let id: String = rand::rng()
                .sample_iter(&Alphanumeric)
                .take(SESSION_ID_LEN)
                .map(char::from)
                .collect();
            let id = SessionId::new(id);
            if !self.players.contains_key(&id) {
                return id;
            }
        }
    }

    fn spawn_position() -> Position {
        let volume = PlayVolume::CHUNK;
        let mut rng = rand::rng();
        Position::new(
            rng.random_range(volume.min.x..volume.max.x),
            rng.random_range(volume.min.y..volume.max.y),
            rng.random_range(volume.min.z..volume.max.z),
        )
    }
}

/// Run the fixed-interval simulation loop.
pub async fn run_room_loop(room: Arc<RwLock<Room>>, tick_interval_ms: u64) {
    let start = Instant::now() + Duration::from_millis(tick_interval_ms);
    let mut ticker = interval_at(start, Duration::from_millis(tick_interval_ms));
    // Skip missed ticks; dt stays fixed at the configured interval.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let dt = tick_interval_ms as f32 / 1000.0;

    loop {
        let scheduled = ticker.tick().await;

        // Hibernate while the room is empty to reduce CPU usage.
        {
            let room = room.read().await;
            if room.players.is_empty() {
                drop(room);
                sleep(Duration::from_millis((tick_interval_ms * 4).max(100))).await;
                continue;
            }
        }

        // Drain any backlog of tick events so we always process the most
        // recent tick.
        let mut skipped = 0u32;
        while ticker.tick().now_or_never().is_some() {
            skipped += 1;
        }
        if skipped > 0 {
            debug!(
                "Skipped {} ticks to stay current (lag: {:?})",
                skipped,
                Instant::now().saturating_duration_since(scheduled)
            );
        }

        // Run the tick and extract pending broadcasts.
        let (broadcasts, state_tx, event_tx) = {
            let mut room = room.write().await;
            let tick_start = std::time::Instant::now();
            let broadcasts = room.tick(dt);
            let tick_ms = tick_start.elapsed().as_secs_f64() * 1000.0;

            // Exponential moving average, weight 0.5.
            room.tick_time_avg = room.tick_time_avg * 0.5 + tick_ms * 0.5;

            let tick_budget = tick_interval_ms as f64 * 0.9;
            if tick_ms > tick_budget {
                warn!(
                    "Slow tick #{}: {:.3}ms (budget: {:.1}ms) - {} players",
                    room.tick_count,
                    tick_ms,
                    tick_budget,
                    room.players.len()
                );
            }

            (broadcasts, room.state_tx.clone(), room.event_tx.clone())
        }; // Write lock released here

        // Encode once; every connection fans out the same frame.
        let message = ServerMessage::State {
            players: broadcasts.players,
        };
        match message.encode() {
            Ok(frame) => {
                let _ = state_tx.send(StateBroadcast { frame });
            }
            Err(e) => warn!("Failed to encode state frame: {}", e),
        }

        for event in broadcasts.events {
            let _ = event_tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "fishTiers": [
            {
                "tier": 0,
                "defaultFish": {
                    "name": "Remora",
                    "model": "remora.glb",
                    "animations": { "default": "Idle", "swim": "Swim" },
                    "stats": {
                        "speed": 3.0, "dashSpeed": 6.0, "hitboxSize": 0.3,
                        "baseScale": 0.5, "maxScale": 0.8, "xpThreshold": 0.0,
                        "decayRate": 1.0, "xpDecayRate": 0.0, "xpSapRate": 0.5,
                        "damage": 2.0, "energy": 60.0, "xp": 0.0,
                        "hp": 20.0, "scale": 0.5
                    }
                }
            },
            {
                "tier": 1,
                "defaultFish": {
                    "name": "Sprat",
                    "model": "sprat.glb",
                    "animations": { "default": "Idle", "swim": "Swim" },
                    "stats": {
                        "speed": 4.0, "dashSpeed": 8.0, "hitboxSize": 0.5,
                        "baseScale": 1.0, "maxScale": 1.6, "xpThreshold": 100.0,
                        "decayRate": 1.0, "xpDecayRate": 2.0, "xpSapRate": 0.0,
                        "damage": 5.0, "energy": 100.0, "xp": 0.0,
                        "hp": 40.0, "scale": 1.0
                    }
                }
            },
            {
                "tier": 2,
                "defaultFish": {
                    "name": "Mackerel",
                    "model": "mackerel.glb",
                    "animations": { "default": "Idle", "swim": "Swim" },
                    "stats": {
                        "speed": 5.0, "dashSpeed": 10.0, "hitboxSize": 0.8,
                        "baseScale": 1.4, "maxScale": 2.2, "xpThreshold": 250.0,
                        "decayRate": 1.5, "xpDecayRate": 5.0, "xpSapRate": 0.0,
                        "damage": 12.0, "energy": 120.0, "xp": 40.0,
                        "hp": 70.0, "scale": 1.4
                    }
                }
            }
        ]
    }"#;

    fn test_room() -> (
        Room,
        broadcast::Receiver<StateBroadcast>,
        broadcast::Receiver<TargetedEvent>,
    ) {
        let catalog = Arc::new(FishCatalog::parse(CATALOG).unwrap());
        let (state_tx, state_rx) = broadcast::channel(16);
        let (event_tx, event_rx) = broadcast::channel(16);
        let room = Room::new(catalog, state_tx, event_tx).unwrap();
        (room, state_rx, event_rx)
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    /// Join + evolve-to-0 + attach, the only wire path to a latched parasite.
    fn latch_parasite(room: &mut Room, host_id: &SessionId) -> SessionId {
        let id = room.add_player(addr());
        room.handle_message(&id, ClientMessage::Evolve { tier: 0 });
        room.handle_message(
            &id,
            ClientMessage::Attach {
                target_id: host_id.clone(),
            },
        );
        assert_eq!(room.players[&id].attached_to.as_ref(), Some(host_id));
        id
    }

    #[test]
    fn join_spawns_tier_one_inside_volume() {
        let (mut room, _state_rx, _event_rx) = test_room();
        let id = room.add_player(addr());

        let player = &room.players[&id];
        assert_eq!(player.tier, JOIN_TIER);
        assert_eq!(player.stats, room.catalog.base_stats(JOIN_TIER).unwrap());
        assert!(PlayVolume::CHUNK.contains(player.position));
        assert_eq!(id.as_str().len(), SESSION_ID_LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn move_applies_delta() {
        let (mut room, ..) = test_room();
        let id = room.add_player(addr());
        let start = room.players[&id].position;

        room.handle_message(
            &id,
            ClientMessage::Move {
                dx: 1.0,
                dy: 2.0,
                dz: -3.0,
            },
        );

        assert_eq!(
            room.players[&id].position,
            start + Position::new(1.0, 2.0, -3.0)
        );
    }

    #[test]
    fn move_is_ignored_while_attached() {
        let (mut room, ..) = test_room();
        let host = room.add_player(addr());
        let parasite = latch_parasite(&mut room, &host);
        let start = room.players[&parasite].position;

        room.handle_message(
            &parasite,
            ClientMessage::Move {
                dx: 5.0,
                dy: 0.0,
                dz: 0.0,
            },
        );

        assert_eq!(room.players[&parasite].position, start);
    }

    #[test]
    fn messages_from_unknown_sessions_are_dropped() {
        let (mut room, ..) = test_room();
        room.handle_message(
            &SessionId::new("notinroom"),
            ClientMessage::Move {
                dx: 1.0,
                dy: 0.0,
                dz: 0.0,
            },
        );
        assert!(room.players.is_empty());
    }

    #[test]
    fn evolve_swaps_stats_and_keeps_position() {
        let (mut room, ..) = test_room();
        let id = room.add_player(addr());
        let position = room.players[&id].position;

        room.handle_message(&id, ClientMessage::Evolve { tier: 2 });

        let player = &room.players[&id];
        assert_eq!(player.tier, 2);
        assert_eq!(player.stats, room.catalog.base_stats(2).unwrap());
        assert_eq!(player.position, position);
    }

    #[test]
    fn evolve_rejects_unknown_tier() {
        let (mut room, ..) = test_room();
        let id = room.add_player(addr());

        room.handle_message(&id, ClientMessage::Evolve { tier: 99 });

        let player = &room.players[&id];
        assert_eq!(player.tier, JOIN_TIER);
        assert_eq!(player.stats, room.catalog.base_stats(JOIN_TIER).unwrap());
    }

    #[test]
    fn parasites_cannot_evolve_back_out() {
        let (mut room, ..) = test_room();
        let id = room.add_player(addr());
        room.handle_message(&id, ClientMessage::Evolve { tier: 0 });
        assert_eq!(room.players[&id].tier, 0);

        room.handle_message(&id, ClientMessage::Evolve { tier: 2 });
        assert_eq!(room.players[&id].tier, 0);
    }

    #[test]
    fn attach_requires_parasite_tier_and_known_target() {
        let (mut room, ..) = test_room();
        let a = room.add_player(addr());
        let b = room.add_player(addr());

        // Tier-1 caller.
        room.handle_message(&a, ClientMessage::Attach { target_id: b.clone() });
        assert_eq!(room.players[&a].attached_to, None);

        // Parasite caller, unknown target.
        room.handle_message(&a, ClientMessage::Evolve { tier: 0 });
        room.handle_message(
            &a,
            ClientMessage::Attach {
                target_id: SessionId::new("notinroom"),
            },
        );
        assert_eq!(room.players[&a].attached_to, None);
    }

    #[test]
    fn attach_rejects_self_and_cycles() {
        let (mut room, ..) = test_room();
        let a = room.add_player(addr());
        let b = room.add_player(addr());
        room.handle_message(&a, ClientMessage::Evolve { tier: 0 });
        room.handle_message(&b, ClientMessage::Evolve { tier: 0 });

        // Self.
        room.handle_message(&a, ClientMessage::Attach { target_id: a.clone() });
        assert_eq!(room.players[&a].attached_to, None);

        // a -> b, then b -> a would close the loop.
        room.handle_message(&a, ClientMessage::Attach { target_id: b.clone() });
        assert_eq!(room.players[&a].attached_to, Some(b.clone()));
        room.handle_message(&b, ClientMessage::Attach { target_id: a.clone() });
        assert_eq!(room.players[&b].attached_to, None);
    }

    #[test]
    fn detach_clears_host() {
        let (mut room, ..) = test_room();
        let host = room.add_player(addr());
        let parasite = latch_parasite(&mut room, &host);

        room.handle_message(&parasite, ClientMessage::Detach);

        assert_eq!(room.players[&parasite].attached_to, None);
    }

    #[test]
    fn start_dash_shakes_off_parasites() {
        let (mut room, _state_rx, mut event_rx) = test_room();
        let host = room.add_player(addr());
        let parasite = latch_parasite(&mut room, &host);

        room.handle_message(&host, ClientMessage::StartDash);

        assert!(room.players[&host].is_dashing);
        assert_eq!(room.players[&parasite].attached_to, None);

        let event = event_rx.try_recv().unwrap();
        assert_eq!(event.session_id, parasite);
        assert_eq!(event.message, ServerMessage::Detach);
        assert!(event_rx.try_recv().is_err());
    }

    #[test]
    fn parasite_dash_does_not_shake_its_own_attachers() {
        let (mut room, _state_rx, mut event_rx) = test_room();
        let a = room.add_player(addr());
        let b = room.add_player(addr());
        room.handle_message(&a, ClientMessage::Evolve { tier: 0 });
        room.handle_message(&b, ClientMessage::Evolve { tier: 0 });
        room.handle_message(&a, ClientMessage::Attach { target_id: b.clone() });

        room.handle_message(&b, ClientMessage::StartDash);

        assert!(room.players[&b].is_dashing);
        assert_eq!(room.players[&a].attached_to, Some(b.clone()));
        assert!(event_rx.try_recv().is_err());
    }

    #[test]
    fn tick_decays_energy_monotonically() {
        let (mut room, ..) = test_room();
        let id = room.add_player(addr());

        room.tick(0.5);
        assert_eq!(room.players[&id].stats.energy, 99.5);

        // Clamp at zero, never negative.
        room.players.get_mut(&id).unwrap().stats.energy = 0.3;
        room.tick(0.5);
        assert_eq!(room.players[&id].stats.energy, 0.0);
        room.tick(0.5);
        assert_eq!(room.players[&id].stats.energy, 0.0);
    }

    #[test]
    fn dashing_doubles_xp_decay() {
        let (mut room, ..) = test_room();
        let idle = room.add_player(addr());
        let dasher = room.add_player(addr());
        room.players.get_mut(&idle).unwrap().stats.xp = 10.0;
        room.players.get_mut(&dasher).unwrap().stats.xp = 10.0;
        room.handle_message(&dasher, ClientMessage::StartDash);

        room.tick(0.5);

        assert_eq!(room.players[&idle].stats.xp, 9.0);
        assert_eq!(room.players[&dasher].stats.xp, 8.0);

        room.handle_message(&dasher, ClientMessage::EndDash);
        room.tick(0.5);
        assert_eq!(room.players[&dasher].stats.xp, 7.0);
    }

    #[test]
    fn downgrade_fires_on_the_tick_xp_hits_zero() {
        let (mut room, ..) = test_room();
        let id = room.add_player(addr());
        room.handle_message(&id, ClientMessage::Evolve { tier: 2 });
        room.players.get_mut(&id).unwrap().stats.xp = 5.0;

        let broadcasts = room.tick(1.0);

        let player = &room.players[&id];
        assert_eq!(player.tier, 1);
        assert_eq!(player.stats.xp, 80.0);
        assert_eq!(player.stats.energy, 100.0);

        assert_eq!(broadcasts.events.len(), 1);
        assert_eq!(broadcasts.events[0].session_id, id);
        assert_eq!(
            broadcasts.events[0].message,
            ServerMessage::TierDowngrade {
                id: id.clone(),
                tier: 1,
                xp: 80.0,
            }
        );
    }

    #[test]
    fn tier_one_floors_at_zero_without_downgrade() {
        let (mut room, ..) = test_room();
        let id = room.add_player(addr());
        room.players.get_mut(&id).unwrap().stats.xp = 1.0;

        let broadcasts = room.tick(1.0);

        assert_eq!(room.players[&id].tier, 1);
        assert_eq!(room.players[&id].stats.xp, 0.0);
        assert!(broadcasts.events.is_empty());

        let broadcasts = room.tick(1.0);
        assert_eq!(room.players[&id].tier, 1);
        assert!(broadcasts.events.is_empty());
    }

    #[test]
    fn siphon_conserves_xp_pairwise() {
        let (mut room, ..) = test_room();
        let host = room.add_player(addr());
        let parasite = latch_parasite(&mut room, &host);

        // Silence the host's own decay so only the siphon moves xp.
        let host_stats = &mut room.players.get_mut(&host).unwrap().stats;
        host_stats.xp = 100.0;
        host_stats.xp_decay_rate = 0.0;

        room.tick(0.5);

        // sap = 100 * 0.5 * 0.5
        assert_eq!(room.players[&host].stats.xp, 75.0);
        assert_eq!(room.players[&parasite].stats.xp, 25.0);
    }

    #[test]
    fn siphon_skips_missing_host() {
        let (mut room, ..) = test_room();
        let host = room.add_player(addr());
        let parasite = latch_parasite(&mut room, &host);

        room.remove_player(&host);
        room.tick(0.5);

        let player = &room.players[&parasite];
        assert_eq!(player.stats.xp, 0.0);
        assert_eq!(player.attached_to, Some(host.clone()));
    }

    #[test]
    fn snapshot_carries_every_player() {
        let (mut room, ..) = test_room();
        let a = room.add_player(addr());
        let b = room.add_player(addr());

        let broadcasts = room.tick(0.5);

        assert_eq!(broadcasts.players.len(), 2);
        let snap = &broadcasts.players[&a];
        assert_eq!(snap.id, a);
        assert_eq!(snap.tier, JOIN_TIER);
        assert_eq!(snap.attached_to, None);
        assert!(!snap.is_dashing);
        assert!(broadcasts.players.contains_key(&b));
    }

    #[test]
    fn intents_refresh_activity() {
        let (mut room, ..) = test_room();
        let id = room.add_player(addr());
        let joined_at = room.players[&id].last_activity;

        std::thread::sleep(Duration::from_millis(5));
        room.handle_message(&id, ClientMessage::StartDash);

        assert!(room.players[&id].last_activity > joined_at);
    }
}
