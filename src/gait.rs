// Crawl gait: one leg moves while the other three stay planted
//
// Each leg steps through Lift -> SwingForward -> PlaceAndPush. Legs take turns in diagonal
// order (FL, BR, FR, BL) so the moving leg's diagonal partner is planted the longest.
// Timing is open loop: each stage holds for a fixed duration and nothing confirms that the
// servos actually reached their setpoints.

use std::time::Duration;

use tracing::{info, warn};

use crate::commander::LegCommander;
use crate::config::{
    DEFAULT_STEP_DURATION, DEFAULT_STEPS, LIFT_BOTTOM, NEUTRAL_SETTLE, STANCE_BOTTOM, STANCE_TOP,
    SWING_BACK, SWING_FORWARD,
};
use crate::error::{Result, RobotError};
use crate::legs::{LegId, PhysicalLeg};
use crate::servo::ActuatorDriver;
use crate::stop::StopSignal;

/// Order legs take their step in
pub const STEP_ORDER: [PhysicalLeg; 4] = [
    PhysicalLeg::FrontLeft,
    PhysicalLeg::BackRight,
    PhysicalLeg::FrontRight,
    PhysicalLeg::BackLeft,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaitPhase {
    Lift,
    SwingForward,
    PlaceAndPush,
}

impl GaitPhase {
    pub const CYCLE: [GaitPhase; 3] = [
        GaitPhase::Lift,
        GaitPhase::SwingForward,
        GaitPhase::PlaceAndPush,
    ];
}

/// One `move_leg` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegMove {
    pub leg: LegId,
    pub top: i32,
    pub bottom: i32,
}

impl LegMove {
    fn new(leg: impl Into<LegId>, top: i32, bottom: i32) -> Self {
        Self {
            leg: leg.into(),
            top,
            bottom,
        }
    }
}

/// Moves issued together, followed by a hold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Stepping leg and its phase, `None` for the neutral stance
    pub phase: Option<(PhysicalLeg, GaitPhase)>,
    pub moves: Vec<LegMove>,
    pub hold: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GaitParams {
    /// Number of full cycles (every leg steps once per cycle)
    pub steps: u32,
    pub step_duration: Duration,
    /// Hold after the neutral stance at start and end
    pub settle: Duration,
}

impl Default for GaitParams {
    fn default() -> Self {
        Self {
            steps: DEFAULT_STEPS,
            step_duration: DEFAULT_STEP_DURATION,
            settle: NEUTRAL_SETTLE,
        }
    }
}

pub struct GaitSequencer {
    params: GaitParams,
}

impl GaitSequencer {
    pub fn new(params: GaitParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &GaitParams {
        &self.params
    }

    /// Moves for one phase of the stepping leg
    pub fn phase_moves(active: PhysicalLeg, phase: GaitPhase) -> Vec<LegMove> {
        match phase {
            GaitPhase::Lift => vec![LegMove::new(active, STANCE_TOP, LIFT_BOTTOM)],
            GaitPhase::SwingForward => vec![LegMove::new(active, SWING_FORWARD, LIFT_BOTTOM)],
            GaitPhase::PlaceAndPush => {
                let mut moves = vec![LegMove::new(active, SWING_FORWARD, STANCE_BOTTOM)];
                // Support legs push the body forward
                moves.extend(
                    PhysicalLeg::ALL
                        .iter()
                        .filter(|&&leg| leg != active)
                        .map(|&leg| LegMove::new(leg, SWING_BACK, STANCE_BOTTOM)),
                );
                moves
            }
        }
    }

    fn neutral_stage(&self) -> Stage {
        Stage {
            phase: None,
            moves: vec![LegMove::new(LegId::All, STANCE_TOP, STANCE_BOTTOM)],
            hold: self.params.settle,
        }
    }

    fn phase_stage(&self, active: PhysicalLeg, phase: GaitPhase) -> Stage {
        Stage {
            phase: Some((active, phase)),
            moves: Self::phase_moves(active, phase),
            hold: self.params.step_duration,
        }
    }

    fn cycle_stages(&self) -> impl Iterator<Item = Stage> + '_ {
        STEP_ORDER.iter().flat_map(move |&leg| {
            GaitPhase::CYCLE
                .iter()
                .map(move |&phase| self.phase_stage(leg, phase))
        })
    }

    /// Every stage of a full walk, in order
    pub fn plan(&self) -> Vec<Stage> {
        let mut stages = vec![self.neutral_stage()];
        for _ in 0..self.params.steps {
            stages.extend(self.cycle_stages());
        }
        stages.push(self.neutral_stage());
        stages
    }

    /// Walk forward for the configured number of cycles
    ///
    /// A stop request ends the walk at the next hold; the legs are then put back in the
    /// neutral stance and `Cancelled` is returned.
    pub async fn walk<D: ActuatorDriver>(
        &self,
        commander: &mut LegCommander<D>,
        stop: &StopSignal,
    ) -> Result<()> {
        info!("Walking forward for {} steps...", self.params.steps);

        match self.run(commander, stop).await {
            Err(RobotError::Cancelled) => {
                warn!("Walk stopped, returning to neutral stance");
                commander.neutral()?;
                Err(RobotError::Cancelled)
            }
            Err(e) => Err(e),
            Ok(()) => {
                info!("Walk complete!");
                Ok(())
            }
        }
    }

    async fn run<D: ActuatorDriver>(
        &self,
        commander: &mut LegCommander<D>,
        stop: &StopSignal,
    ) -> Result<()> {
        self.run_stage(commander, stop, &self.neutral_stage()).await?;

        for step in 0..self.params.steps {
            info!("Step {}/{}", step + 1, self.params.steps);
            for stage in self.cycle_stages() {
                self.run_stage(commander, stop, &stage).await?;
            }
        }

        info!("Returning to neutral stance...");
        self.run_stage(commander, stop, &self.neutral_stage()).await
    }

    async fn run_stage<D: ActuatorDriver>(
        &self,
        commander: &mut LegCommander<D>,
        stop: &StopSignal,
        stage: &Stage,
    ) -> Result<()> {
        if stop.is_triggered() {
            return Err(RobotError::Cancelled);
        }
        for m in &stage.moves {
            commander.move_leg(m.leg, m.top, m.bottom)?;
        }
        stop.hold(stage.hold).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{CalibrationStore, Offsets};
    use crate::config::{CHANNEL_PULSES, LEG_WIRING};
    use crate::legs::ActuatorMap;
    use crate::servo::SimulatedDriver;
    use tokio::time::Instant;

    fn commander() -> LegCommander<SimulatedDriver> {
        LegCommander::new(
            SimulatedDriver::new(&CHANNEL_PULSES),
            ActuatorMap::new(LEG_WIRING).unwrap(),
            CalibrationStore::with_offsets("unused.json", Offsets::default()),
        )
    }

    fn one_step() -> GaitSequencer {
        GaitSequencer::new(GaitParams {
            steps: 1,
            ..GaitParams::default()
        })
    }

    #[test]
    fn test_plan_single_step_structure() {
        let plan = one_step().plan();
        // neutral + 4 legs * 3 phases + neutral
        assert_eq!(plan.len(), 14);

        let neutral = LegMove::new(LegId::All, 90, 90);
        assert_eq!(plan[0].moves, vec![neutral]);
        assert_eq!(plan[0].hold, Duration::from_millis(500));
        assert_eq!(plan[13].moves, vec![neutral]);
        assert_eq!(plan[13].hold, Duration::from_millis(500));

        let stepping: Vec<PhysicalLeg> = plan[1..13]
            .chunks(3)
            .map(|chunk| {
                let phases: Vec<_> = chunk.iter().map(|s| s.phase.unwrap()).collect();
                let leg = phases[0].0;
                assert!(phases.iter().all(|(l, _)| *l == leg));
                assert_eq!(
                    phases.iter().map(|(_, p)| *p).collect::<Vec<_>>(),
                    GaitPhase::CYCLE.to_vec()
                );
                leg
            })
            .collect();
        assert_eq!(stepping, STEP_ORDER.to_vec());
    }

    #[test]
    fn test_phase_angles() {
        let fl = PhysicalLeg::FrontLeft;
        assert_eq!(
            GaitSequencer::phase_moves(fl, GaitPhase::Lift),
            vec![LegMove::new(fl, 90, 60)]
        );
        assert_eq!(
            GaitSequencer::phase_moves(fl, GaitPhase::SwingForward),
            vec![LegMove::new(fl, 110, 60)]
        );
    }

    #[test]
    fn test_place_and_push_moves_other_legs() {
        let moves = GaitSequencer::phase_moves(PhysicalLeg::BackRight, GaitPhase::PlaceAndPush);
        assert_eq!(
            moves,
            vec![
                LegMove::new(PhysicalLeg::BackRight, 110, 90),
                LegMove::new(PhysicalLeg::FrontLeft, 70, 90),
                LegMove::new(PhysicalLeg::FrontRight, 70, 90),
                LegMove::new(PhysicalLeg::BackLeft, 70, 90),
            ]
        );
    }

    #[test]
    fn test_default_params() {
        let params = GaitParams::default();
        assert_eq!(params.steps, 4);
        assert_eq!(params.step_duration, Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_walk_single_step_writes() {
        let mut cmd = commander();
        let stop = StopSignal::new();
        let start = Instant::now();

        one_step().walk(&mut cmd, &stop).await.unwrap();

        // 2 * 0.5 s settle + 12 * 0.3 s
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(4600), "walk took {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(4700), "walk took {:?}", elapsed);

        let history = cmd.driver().history();
        // neutral (8) + 4 legs * (2 + 2 + 8) + neutral (8)
        assert_eq!(history.len(), 64);

        // Neutral: FL/BL straight, FR/BR mirrored 180 - 90 = 90
        let neutral: [(u8, u8); 8] = [(0, 90), (4, 90), (1, 90), (5, 90), (3, 90), (7, 90), (2, 90), (6, 90)];
        assert_eq!(&history[..8], &neutral);
        assert_eq!(&history[56..], &neutral);

        // Front left lifts first (channels 0/4), back right next (2/6, mirrored)
        assert_eq!(&history[8..10], &[(0, 90), (4, 60)]);
        assert_eq!(&history[20..22], &[(2, 90), (6, 120)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_walk_zero_steps_only_neutral() {
        let mut cmd = commander();
        let sequencer = GaitSequencer::new(GaitParams {
            steps: 0,
            ..GaitParams::default()
        });
        sequencer.walk(&mut cmd, &StopSignal::new()).await.unwrap();
        assert_eq!(cmd.driver().history().len(), 16);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_between_phases() {
        let mut cmd = commander();
        let stop = StopSignal::new();
        let remote = stop.clone();
        tokio::spawn(async move {
            // Lands during the first lift hold (0.5 s settle, then 0.3 s lift)
            tokio::time::sleep(Duration::from_millis(650)).await;
            remote.trigger();
        });

        let result = GaitSequencer::new(GaitParams::default())
            .walk(&mut cmd, &stop)
            .await;
        assert!(matches!(result, Err(RobotError::Cancelled)));

        // neutral + lift + neutral on stop
        let history = cmd.driver().history();
        assert_eq!(history.len(), 8 + 2 + 8);
        assert_eq!(&history[8..10], &[(0, 90), (4, 60)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_walk_already_stopped_moves_nothing_but_neutral() {
        let mut cmd = commander();
        let stop = StopSignal::new();
        stop.trigger();

        let result = one_step().walk(&mut cmd, &stop).await;
        assert!(matches!(result, Err(RobotError::Cancelled)));
        assert_eq!(cmd.driver().history().len(), 8);
    }
}
