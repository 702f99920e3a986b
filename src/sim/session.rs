//! Frame-driven game session
//!
//! Ties the world, the merge detector and the spawner together: drops the
//! queued tier, applies merge events, keeps score and decides game over. One
//! `frame` call per rendered frame; `restart` rebuilds everything but the
//! spawner's random stream.

use serde::{Deserialize, Serialize};

use super::body::BodyId;
use super::merge::{MergeEvent, MergeSystem};
use super::spawner::Spawner;
use super::world::PhysicsWorld;
use crate::tuning::{ConfigError, GameConfig, Tier};

/// Current phase of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Playing,
    GameOver,
}

/// What happened during one `frame` call
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    /// Merges applied this frame
    pub merges: Vec<AppliedMerge>,
    /// Points gained this frame
    pub score_delta: u64,
    /// Some ball that sank into the jar pokes above the warning line
    pub warning: bool,
    /// The session ended during this frame
    pub game_over: bool,
}

/// A merge event together with the body that replaced its sources
#[derive(Debug, Clone)]
pub struct AppliedMerge {
    pub event: MergeEvent,
    pub result: BodyId,
}

/// One play-through of the jar
#[derive(Debug)]
pub struct Session {
    config: GameConfig,
    world: PhysicsWorld,
    merge: MergeSystem,
    spawner: Spawner,
    next_tier: Tier,
    score: u64,
    phase: SessionPhase,
    /// Seconds spent with a ball above the line (decays when clear)
    danger: f32,
}

impl Session {
    pub fn new(config: GameConfig, seed: Option<u64>) -> Result<Self, ConfigError> {
        let spawner = Spawner::new(seed, &config);
        Self::with_spawner(config, spawner)
    }

    /// Start a session with an existing spawner (e.g. seeded from a string)
    ///
    /// The spawner keeps its seed and stream but takes its weights and drop
    /// disk from `config`.
    pub fn with_spawner(config: GameConfig, mut spawner: Spawner) -> Result<Self, ConfigError> {
        let world = PhysicsWorld::new(&config)?;
        spawner.reconfigure(&config);
        let merge = MergeSystem::new(config.tiers.clone(), config.merge.clone());
        let next_tier = spawner.next_tier();
        Ok(Self {
            config,
            world,
            merge,
            spawner,
            next_tier,
            score: 0,
            phase: SessionPhase::Playing,
            danger: 0.0,
        })
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn spawner(&self) -> &Spawner {
        &self.spawner
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Tier that the next drop will release
    pub fn next_tier(&self) -> Tier {
        self.next_tier
    }

    pub fn is_game_over(&self) -> bool {
        self.phase == SessionPhase::GameOver
    }

    /// Move the drop point by (dx, dz)
    pub fn nudge(&mut self, dx: f32, dz: f32) {
        if !self.is_game_over() {
            self.spawner.nudge(dx, dz);
        }
    }

    pub fn set_drop_position(&mut self, x: f32, z: f32) {
        if !self.is_game_over() {
            self.spawner.set_xz_absolute(x, z);
        }
    }

    /// Release the queued tier at the drop point and roll the next one
    pub fn drop_current(&mut self) -> Option<BodyId> {
        if self.is_game_over() {
            return None;
        }
        let (x, z) = self.spawner.xz();
        let y = self.world.container().spawn_y;
        let id = match self.world.add_ball(self.next_tier, x, y, z) {
            Ok(id) => id,
            Err(e) => {
                log::error!("Drop failed: {e}");
                return None;
            }
        };
        log::debug!("Dropped {} at ({x:.2}, {z:.2})", self.next_tier);
        self.next_tier = self.spawner.next_tier();
        Some(id)
    }

    /// Advance one rendered frame
    pub fn frame(&mut self, dt: f32) -> FrameReport {
        let mut report = FrameReport::default();
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };

        if !self.is_game_over() {
            self.world.step(dt);
            self.merge.update(dt, &self.world);
        }

        for event in self.merge.consume() {
            if let Some(applied) = self.apply_merge(event) {
                report.score_delta += applied.event.score as u64;
                report.merges.push(applied);
            }
        }
        self.score += report.score_delta;

        report.warning = self.check_danger(dt, &mut report);
        report
    }

    /// Throw the jar away and start over; the spawner keeps its stream
    pub fn restart(&mut self) -> Result<(), ConfigError> {
        self.world = PhysicsWorld::new(&self.config)?;
        self.merge = MergeSystem::new(self.config.tiers.clone(), self.config.merge.clone());
        self.score = 0;
        self.danger = 0.0;
        self.phase = SessionPhase::Playing;
        self.spawner.set_xz_absolute(0.0, 0.0);
        self.next_tier = self.spawner.next_tier();
        log::info!("Session restarted");
        Ok(())
    }

    fn apply_merge(&mut self, event: MergeEvent) -> Option<AppliedMerge> {
        // Both sources must still exist; a stale event is dropped whole
        if self.world.body(event.source_a).is_none() || self.world.body(event.source_b).is_none() {
            log::warn!(
                "Skipping stale merge {:?}+{:?}",
                event.source_a,
                event.source_b
            );
            return None;
        }
        self.world.remove_body(event.source_a);
        self.world.remove_body(event.source_b);

        let p = event.result_position;
        let result = match self.world.add_ball(event.result_tier, p.x, p.y, p.z) {
            Ok(id) => id,
            Err(e) => {
                log::error!("Merge result rejected: {e}");
                return None;
            }
        };
        self.world.set_velocity(result, event.result_velocity);
        Some(AppliedMerge { event, result })
    }

    /// Update the danger timer; returns whether any ball is over the line
    fn check_danger(&mut self, dt: f32, report: &mut FrameReport) -> bool {
        let warn_y = self.world.container().warn_y;
        let settled_speed = self.config.session.settled_speed;

        let mut any_over = false;
        let mut settled_over = false;
        for (body, meta) in self.world.balls() {
            if !meta.entered_warning_zone || body.top() <= warn_y {
                continue;
            }
            any_over = true;
            if body.velocity.length() < settled_speed {
                settled_over = true;
            }
        }

        if self.is_game_over() {
            return any_over;
        }
        if settled_over {
            self.end_game(report);
        } else if any_over {
            self.danger += dt;
            if self.danger > self.config.session.danger_limit {
                self.end_game(report);
            }
        } else {
            self.danger = (self.danger - dt * 0.5).max(0.0);
        }
        any_over
    }

    fn end_game(&mut self, report: &mut FrameReport) {
        self.phase = SessionPhase::GameOver;
        report.game_over = true;
        log::info!(
            "Game over: score {} with {} balls in the jar",
            self.score,
            self.world.ball_count()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use glam::Vec3;

    fn session() -> Session {
        Session::new(GameConfig::default(), Some(11)).unwrap()
    }

    #[test]
    fn test_drop_spawns_at_spawn_height() {
        let mut s = session();
        let first = s.next_tier();
        s.set_drop_position(0.4, -0.2);
        let id = s.drop_current().unwrap();
        let body = s.world().body(id).unwrap();
        assert_eq!(body.position.y, s.world().container().spawn_y);
        assert!((body.position.x - 0.4).abs() < 1e-6);
        assert_eq!(s.world().meta(id).unwrap().tier, first);
    }

    /// Weightless jar with one Skull straddling the warning line
    fn floating_ball(velocity: Vec3) -> Session {
        let mut config = GameConfig::default();
        config.physics.gravity = Vec3::ZERO;
        let mut s = Session::new(config, Some(11)).unwrap();
        let id = s.world.add_ball(Tier::MIN, 0.0, 1.9, 0.0).unwrap();
        s.world.set_velocity(id, velocity);
        s
    }

    #[test]
    fn test_fresh_drop_warns_only_after_entering() {
        let mut s = session();
        let id = s.drop_current().unwrap();

        let mut entered_at = None;
        for frame in 0..240 {
            let report = s.frame(SIM_DT);
            assert!(!report.game_over);
            let entered = s.world().meta(id).unwrap().entered_warning_zone;
            if !entered {
                assert!(!report.warning);
                assert_eq!(s.danger, 0.0);
            } else if entered_at.is_none() {
                entered_at = Some(frame);
            }
        }
        assert!(entered_at.is_some_and(|f| f > 0));
        assert!(!s.frame(SIM_DT).warning);
        assert_eq!(s.phase(), SessionPhase::Playing);
    }

    #[test]
    fn test_moving_ball_over_line_ends_after_limit() {
        let mut s = floating_ball(Vec3::new(0.1, 0.0, 0.0));
        let limit = s.config.session.danger_limit;

        let mut frames = 0;
        loop {
            let report = s.frame(SIM_DT);
            frames += 1;
            assert!(report.warning);
            if report.game_over {
                break;
            }
            assert!(s.danger <= limit);
            assert!(frames < 120, "never ended");
        }
        // 1.5 s at 60 Hz, give or take float accumulation
        assert!((90..=91).contains(&frames), "ended after {frames} frames");
        assert!(s.danger > limit);
        assert!(s.is_game_over());
    }

    #[test]
    fn test_danger_decays_once_clear() {
        // Sinks below the line after about 0.6 s
        let mut s = floating_ball(Vec3::new(0.0, -0.5, 0.0));

        let mut peak = 0.0;
        loop {
            let report = s.frame(SIM_DT);
            if !report.warning {
                break;
            }
            peak = s.danger;
            assert!(peak < 1.0, "ball never cleared the line");
        }
        assert!(peak > 0.5 && peak < 0.7, "peak {peak}");
        assert!((s.danger - (peak - SIM_DT * 0.5)).abs() < 1e-5);

        for _ in 0..59 {
            assert!(!s.frame(SIM_DT).warning);
        }
        assert!((s.danger - (peak - 0.5)).abs() < 1e-4, "danger {}", s.danger);

        for _ in 0..120 {
            s.frame(SIM_DT);
        }
        assert_eq!(s.danger, 0.0);
        assert_eq!(s.phase(), SessionPhase::Playing);
    }

    #[test]
    fn test_with_spawner_adopts_config() {
        let mut narrow = GameConfig::default();
        narrow.container.inner_diameter = 2.0;
        let mut spawner = Spawner::new(Some(4), &GameConfig::default());
        spawner.set_xz_absolute(1.25, 0.0);

        let s = Session::with_spawner(narrow, spawner).unwrap();
        assert!((s.spawner().limit() - 0.95).abs() < 1e-6);
        assert!(s.spawner().xz().0 <= 0.95 + 1e-6);
        assert_eq!(s.spawner().seed(), 4);
    }

    #[test]
    fn test_merge_applied_and_scored() {
        let mut s = session();
        // Place two Skulls side by side on the floor
        let t1 = Tier::new(1).unwrap();
        let a = s.world.add_ball(t1, -0.29, 0.3, 0.0).unwrap();
        let b = s.world.add_ball(t1, 0.29, 0.3, 0.0).unwrap();

        let mut merges = Vec::new();
        for _ in 0..10 {
            merges.extend(s.frame(SIM_DT).merges);
        }
        assert_eq!(merges.len(), 1);
        assert_eq!(s.score(), 5);
        assert!(s.world().body(a).is_none() && s.world().body(b).is_none());
        let result = s.world().meta(merges[0].result).unwrap();
        assert_eq!(result.tier, Tier::new(2).unwrap());
    }

    #[test]
    fn test_settled_ball_above_line_ends_game() {
        let mut s = session();
        let t5 = Tier::new(5).unwrap();
        // Build a column of top-tier balls that cannot merge
        for i in 0..4 {
            s.world.add_ball(t5, 0.0, 0.82 + i as f32 * 1.64, 0.0).unwrap();
        }
        let mut ended = false;
        for _ in 0..600 {
            if s.frame(SIM_DT).game_over {
                ended = true;
                break;
            }
        }
        assert!(ended);
        assert!(s.is_game_over());
        assert!(s.drop_current().is_none());
    }

    #[test]
    fn test_restart_resets_but_keeps_stream() {
        let mut s = session();
        s.drop_current();
        s.nudge(0.5, 0.5);
        for _ in 0..10 {
            s.frame(SIM_DT);
        }
        s.score = 99;

        let mut replay = Spawner::new(Some(11), &GameConfig::default());
        replay.next_tier();
        replay.next_tier();
        let expected = replay.next_tier();

        s.restart().unwrap();
        assert_eq!(s.score(), 0);
        assert_eq!(s.world().ball_count(), 0);
        assert_eq!(s.spawner().xz(), (0.0, 0.0));
        assert_eq!(s.phase(), SessionPhase::Playing);
        assert_eq!(s.next_tier(), expected);
    }
}
