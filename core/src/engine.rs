//! The simulation engine: the heart of the arena.
//!
//! PHASES: Setup → Running → Finished.
//!   Setup:    validate config, generate the grid, load or build the
//!             visibility index, shuffle spawn points, attach bots.
//!   Running:  one `tick()` per exchange round until `max_ticks`.
//!   Finished: bots shut down, outcome computed.
//!
//! TICK ORDER (fixed, documented, never reordered):
//!   1. Observed beacon fields (jitter, then fade)
//!   2. Reveal what bot 0 sees
//!   3. Per bot, in list order: build observation
//!   4.   send it, read one command, apply it
//!   5. Advance the clock; stop on the last tick
//!   6. Captures (initiative first), aging, spawn roll
//!
//! RULES:
//!   - All randomness flows through the engine's single ArenaRng.
//!   - Every state change is recorded in the event log.
//!   - Any error that ends a round shuts every bot down first.

use crate::{
    beacon::{Beacon, BeaconField},
    cache::VisibilityCache,
    channel::{BotChannel, StopHook, SHUTDOWN_GRACE},
    clock::RoundPhase,
    config::ArenaConfig,
    error::{SimError, SimResult},
    event::SimEvent,
    grid::Grid,
    maze::MazeSource,
    protocol::{round6, BotCommand, ConfigBlock, Observation, VisibleBeacon},
    rng::ArenaRng,
    state::{Bot, SimulationState},
    stats::{percent, RoundOutcome},
    types::{BotIndex, Tick, Tile},
    visibility::VisibilityIndex,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared flag for user-requested interrupts. Checked at the start of
/// every tick. Cancelling also runs every registered stop hook, so a bot
/// the engine is blocked on gets closed, then killed after the grace
/// period.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<CancelInner>);

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    hooks: Mutex<Vec<StopHook>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag and stop every registered bot. Later calls do nothing.
    pub fn cancel(&self) {
        if self.0.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let hooks = std::mem::take(&mut *self.hooks());
        log::info!("cancel requested; stopping {} bot(s)", hooks.len());
        for hook in hooks {
            hook();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Run `hook` on cancellation, or right away if already cancelled.
    pub fn on_cancel(&self, hook: StopHook) {
        let mut hooks = self.hooks();
        if self.is_cancelled() {
            drop(hooks);
            hook();
        } else {
            hooks.push(hook);
        }
    }

    fn hooks(&self) -> MutexGuard<'_, Vec<StopHook>> {
        match self.0.hooks.lock() {
            Ok(hooks) => hooks,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

pub struct SimEngine {
    config: ArenaConfig,
    grid: Grid,
    floor_tiles: Vec<Tile>,
    visibility: Arc<VisibilityIndex>,
    spawn_points: Vec<Tile>,
    state: SimulationState,
    rng: ArenaRng,
    channels: Vec<Box<dyn BotChannel>>,
    events: Vec<SimEvent>,
    cancel: CancelToken,
}

impl SimEngine {
    /// Validate `config`, build the arena and enter Setup.
    /// Nothing external is started before validation passes.
    pub fn setup(
        config: ArenaConfig,
        maze: &dyn MazeSource,
        cache: Option<&VisibilityCache>,
    ) -> SimResult<Self> {
        config.validate()?;

        let grid = maze.generate(&config)?;
        if grid.width() != config.width || grid.height() != config.height {
            return Err(SimError::MalformedGrid(format!(
                "expected {}x{}, got {}x{}",
                config.width,
                config.height,
                grid.width(),
                grid.height()
            )));
        }
        let floor_tiles = grid.floor_tiles();
        if floor_tiles.len() < 2 {
            return Err(SimError::MalformedGrid(format!(
                "need at least 2 floor tiles for spawn points, found {}",
                floor_tiles.len()
            )));
        }

        let mut rng = ArenaRng::new(config.seed);
        let mut shuffled = floor_tiles.clone();
        rng.shuffle(&mut shuffled);
        let mut spawn_points = vec![shuffled[0], shuffled[1]];
        if config.swap_bots {
            spawn_points.reverse();
        }

        let visibility = Arc::new(VisibilityCache::load_or_build(cache, &grid, config.vis_radius));
        let grid_hash = grid.content_hash();
        log::info!(
            "round setup: seed={} {}x{} generator={} floor={} hash={}",
            config.seed,
            config.width,
            config.height,
            config.generator,
            floor_tiles.len(),
            &grid_hash[..12]
        );

        let events = vec![SimEvent::RoundInitialized {
            seed: config.seed,
            grid_hash,
            spawn_points: spawn_points.clone(),
        }];

        Ok(Self {
            state: SimulationState::new(config.max_ticks),
            config,
            grid,
            floor_tiles,
            visibility,
            spawn_points,
            rng,
            channels: Vec::new(),
            events,
            cancel: CancelToken::new(),
        })
    }

    /// Attach the next bot; it starts on the next unused spawn point.
    pub fn add_bot(&mut self, channel: Box<dyn BotChannel>) -> SimResult<BotIndex> {
        self.expect_phase(RoundPhase::Setup)?;
        let index = self.channels.len();
        let Some(&position) = self.spawn_points.get(index) else {
            return Err(SimError::Config(format!(
                "at most {} bots per round",
                self.spawn_points.len()
            )));
        };
        log::info!("bot {index} '{}' spawns at {position}", channel.label());
        if let Some(hook) = channel.stop_hook() {
            self.cancel.on_cancel(hook);
        }
        self.state.bots.push(Bot { position, score: 0 });
        self.channels.push(channel);
        Ok(index)
    }

    /// Share an external interrupt flag. Bots already attached are
    /// registered with it too.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        for hook in self.channels.iter().filter_map(|c| c.stop_hook()) {
            token.on_cancel(hook);
        }
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Put a bot on a specific floor tile before the round starts.
    /// Used by tests and replay tooling.
    pub fn place_bot(&mut self, index: BotIndex, tile: Tile) -> SimResult<()> {
        self.expect_phase(RoundPhase::Setup)?;
        if !self.grid.is_floor(tile) {
            return Err(SimError::Config(format!("{tile} is not a floor tile")));
        }
        let bot = self
            .state
            .bots
            .get_mut(index)
            .ok_or_else(|| SimError::Config(format!("no bot {index}")))?;
        bot.position = tile;
        Ok(())
    }

    /// Spawn a beacon on a specific free floor tile, outside the random
    /// spawn roll. Counts toward spawned ttl like any other beacon.
    pub fn place_beacon(&mut self, tile: Tile) -> SimResult<()> {
        if self.state.clock.is_finished() {
            return Err(self.phase_error(RoundPhase::Running));
        }
        if !self.grid.is_floor(tile) || self.state.is_occupied(tile) {
            return Err(SimError::Config(format!("{tile} is not a free floor tile")));
        }
        let beacon = Beacon::spawn(&self.grid, tile, &self.config);
        self.events.push(SimEvent::BeaconSpawned {
            tick: self.state.tick(),
            position: tile,
            ttl: beacon.ttl,
        });
        self.state.add_beacon(beacon);
        Ok(())
    }

    /// Play ticks until the round is over, then shut the bots down.
    pub fn run(&mut self) -> SimResult<RoundOutcome> {
        log::info!(
            "round start: {} bot(s), {} ticks",
            self.channels.len(),
            self.config.max_ticks
        );
        while !self.state.clock.is_finished() {
            self.tick()?;
        }
        self.shutdown_bots();
        let outcome = self.outcome();
        log::info!(
            "round finished: scores={:?}",
            self.state.bots.iter().map(|b| b.score).collect::<Vec<_>>()
        );
        Ok(outcome)
    }

    /// Advance one tick. This is the core simulation step.
    /// Any error shuts every bot down before it is returned.
    pub fn tick(&mut self) -> SimResult<Vec<SimEvent>> {
        match self.step() {
            Ok(events) => {
                for event in &events {
                    log::trace!("{}: {event:?}", event.type_name());
                }
                self.events.extend(events.iter().cloned());
                Ok(events)
            }
            Err(e) => {
                log::warn!("round aborted at tick {}: {e}", self.state.tick());
                self.shutdown_bots();
                self.state.clock.finish();
                Err(e)
            }
        }
    }

    fn step(&mut self) -> SimResult<Vec<SimEvent>> {
        match self.state.clock.phase {
            RoundPhase::Setup => {
                if self.channels.is_empty() {
                    return Err(SimError::Config("no bots attached".into()));
                }
                self.state.clock.start();
            }
            RoundPhase::Running => {}
            RoundPhase::Finished => return Err(self.phase_error(RoundPhase::Running)),
        }

        let tick = self.state.tick();
        if self.cancel.is_cancelled() {
            return Err(SimError::Cancelled { tick });
        }
        let mut events = vec![SimEvent::TickStarted { tick }];

        // 1. What bots sense this tick.
        let observed: Vec<BeaconField> = self
            .state
            .beacons
            .iter()
            .map(|b| b.observe(&self.config, &mut self.rng))
            .collect();

        // 2. Coverage bookkeeping for bot 0.
        if let Some(first) = self.state.bots.first() {
            let seen = self.visibility.visible_from(first.position);
            self.state.reveal(seen);
        }

        // 3–4. Observe, exchange, apply.
        let initiative = self.state.initiative(self.config.swap_bots);
        for i in 0..self.channels.len() {
            let observation = self.observation(i, tick, initiative, &observed);
            let request = observation.to_line()?;
            let response = self.channels[i].exchange(&request).map_err(|e| {
                // A bot stopped by an interrupt looks like a hang-up.
                if self.cancel.is_cancelled() {
                    SimError::Cancelled { tick }
                } else {
                    SimError::BotDisconnected { bot: i, reason: e.to_string() }
                }
            })?;
            self.apply(i, tick, &response, &mut events);
        }
        self.forward_diagnostics();

        // 5. Clock.
        let now = self.state.clock.advance();
        if self.state.clock.is_finished() {
            events.push(SimEvent::TickCompleted { tick });
            return Ok(events);
        }

        // 6. Beacon lifecycle.
        for capture in self.state.resolve_captures(initiative) {
            log::debug!("tick={now} bot {} captured beacon at {} (+{})", capture.bot, capture.position, capture.reward);
            events.push(SimEvent::BeaconCaptured {
                tick: now,
                bot: capture.bot,
                position: capture.position,
                reward: capture.reward,
            });
        }
        for position in self.state.age_beacons() {
            events.push(SimEvent::BeaconExpired { tick: now, position });
        }
        if let Some(beacon) = self.roll_spawn() {
            events.push(SimEvent::BeaconSpawned {
                tick: now,
                position: beacon.position,
                ttl: beacon.ttl,
            });
            self.state.add_beacon(beacon);
        }

        log::debug!(
            "tick={tick} beacons={} scores={:?}",
            self.state.beacons.len(),
            self.state.bots.iter().map(|b| b.score).collect::<Vec<_>>()
        );
        events.push(SimEvent::TickCompleted { tick });
        Ok(events)
    }

    fn observation(
        &self,
        i: BotIndex,
        tick: Tick,
        initiative: BotIndex,
        observed: &[BeaconField],
    ) -> Observation {
        let position = self.state.bots[i].position;
        let seen = self.visibility.visible_from(position);
        let (wall, floor): (Vec<Tile>, Vec<Tile>) =
            seen.iter().copied().partition(|&t| self.grid.is_wall(t));
        let visible_beacons = self
            .state
            .beacons
            .iter()
            .filter(|b| seen.binary_search(&b.position).is_ok())
            .map(|b| VisibleBeacon { position: b.position, ttl: b.ttl })
            .collect();
        let level: f64 = observed.iter().filter_map(|f| f.level_at(position)).sum();

        Observation {
            config: (tick == 0).then(|| ConfigBlock::from_config(&self.config)),
            tick,
            bot: position,
            wall,
            floor,
            initiative: i == initiative,
            visible_beacons,
            beacon_level: round6(level),
        }
    }

    fn apply(&mut self, i: BotIndex, tick: Tick, response: &str, events: &mut Vec<SimEvent>) {
        match BotCommand::parse(response) {
            Some(BotCommand::Move(dir)) => match self.state.try_move(i, dir, &self.grid) {
                Some((from, to)) => events.push(SimEvent::BotMoved { tick, bot: i, from, to }),
                None => events.push(SimEvent::BotBlocked {
                    tick,
                    bot: i,
                    at: self.state.bots[i].position,
                }),
            },
            Some(BotCommand::Wait) => {}
            None => {
                log::warn!("tick={tick} bot {i} sent an invalid command: {response:?}");
                events.push(SimEvent::InvalidCommand { tick, bot: i, line: response.to_string() });
            }
        }
    }

    /// Always draws the spawn roll; draws the location only when a
    /// beacon will actually spawn.
    fn roll_spawn(&mut self) -> Option<Beacon> {
        let roll = self.rng.chance(self.config.beacon_spawn);
        if !roll || self.state.beacons.len() >= self.config.max_beacons {
            return None;
        }
        let free: Vec<Tile> = self
            .floor_tiles
            .iter()
            .copied()
            .filter(|&t| !self.state.is_occupied(t))
            .collect();
        let &position = self.rng.pick(&free)?;
        Some(Beacon::spawn(&self.grid, position, &self.config))
    }

    fn forward_diagnostics(&mut self) {
        for (i, channel) in self.channels.iter_mut().enumerate() {
            for line in channel.drain_diagnostics() {
                log::debug!("bot {i} says: {line}");
            }
        }
    }

    /// Close every bot: stdin first, a short grace period, then kill.
    pub fn shutdown_bots(&mut self) {
        for channel in &mut self.channels {
            channel.shutdown(SHUTDOWN_GRACE);
        }
        self.forward_diagnostics();
    }

    /// Bot 0's score, plus coverage and beacon metrics when profiling.
    pub fn outcome(&self) -> RoundOutcome {
        let score = self.state.bots.first().map(|b| b.score).unwrap_or(0);
        if !self.config.profile {
            return RoundOutcome::score_only(score);
        }
        let covered = self
            .floor_tiles
            .iter()
            .filter(|t| self.state.revealed.contains(t))
            .count();
        RoundOutcome {
            score,
            tile_coverage: percent(covered as u64, self.floor_tiles.len() as u64),
            ticks_to_first_capture: self.state.first_capture,
            beacon_utilization: percent(score, self.state.spawned_ttl),
        }
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn visibility(&self) -> Arc<VisibilityIndex> {
        Arc::clone(&self.visibility)
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn spawn_points(&self) -> &[Tile] {
        &self.spawn_points
    }

    /// The full timeline so far.
    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn phase(&self) -> RoundPhase {
        self.state.clock.phase
    }

    fn expect_phase(&self, expected: RoundPhase) -> SimResult<()> {
        if self.state.clock.phase == expected {
            Ok(())
        } else {
            Err(self.phase_error(expected))
        }
    }

    fn phase_error(&self, expected: RoundPhase) -> SimError {
        SimError::InvalidPhase {
            expected: expected.name(),
            actual: self.state.clock.phase.name(),
        }
    }
}

impl Drop for SimEngine {
    fn drop(&mut self) {
        self.shutdown_bots();
    }
}
