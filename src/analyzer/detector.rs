use crate::config::DetectionConfig;
use tracing::{debug, info, trace};

/// Thresholds that drive the detector, fixed for the process lifetime
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorSettings {
    /// Score at or above which a frame counts as motion
    pub threshold: f64,
    /// Consecutive motion frames needed to start
    pub threshold_frames: u32,
    /// Consecutive quiet frames needed to stop
    pub stop_frames: u32,
    /// Idle frames that must pass after a stop before the next start
    pub cooldown_frames: u32,
}

impl DetectorSettings {
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self {
            threshold: config.threshold,
            threshold_frames: config.threshold_frames.max(1),
            stop_frames: config.effective_stop_frames().max(1),
            cooldown_frames: config.cooldown_frames,
        }
    }
}

/// Edge events emitted by the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Start,
    Stop,
}

/// Hysteresis state with its run-length counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    Idle {
        /// Consecutive scores at or above threshold
        above: u32,
        /// Idle frames still to pass before a start is allowed
        cooldown: u32,
    },
    Recording {
        /// Consecutive scores below threshold
        below: u32,
    },
}

impl Default for MotionState {
    fn default() -> Self {
        MotionState::Idle {
            above: 0,
            cooldown: 0,
        }
    }
}

impl MotionState {
    /// Advance by exactly one score.
    ///
    /// Every call evaluates a single transition, so a `Stop` can never be
    /// followed by a `Start` for the same score.
    pub fn step(self, score: f64, settings: &DetectorSettings) -> (MotionState, Option<Trigger>) {
        let is_motion = score >= settings.threshold;

        match self {
            MotionState::Idle { above, cooldown } => {
                let above = if is_motion { above.saturating_add(1) } else { 0 };
                let cooldown = cooldown.saturating_sub(1);

                if above >= settings.threshold_frames && cooldown == 0 {
                    (MotionState::Recording { below: 0 }, Some(Trigger::Start))
                } else {
                    (MotionState::Idle { above, cooldown }, None)
                }
            }
            MotionState::Recording { below } => {
                let below = if is_motion { 0 } else { below.saturating_add(1) };

                if below >= settings.stop_frames {
                    (
                        MotionState::Idle {
                            above: 0,
                            cooldown: settings.cooldown_frames,
                        },
                        Some(Trigger::Stop),
                    )
                } else {
                    (MotionState::Recording { below }, None)
                }
            }
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, MotionState::Recording { .. })
    }
}

/// Counters for detector monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectorStats {
    pub scores_processed: u64,
    pub starts: u64,
    pub stops: u64,
    pub forced_stops: u64,
}

/// Stateful classifier turning movement scores into start/stop triggers
#[derive(Debug, Clone)]
pub struct MotionDetector {
    settings: DetectorSettings,
    state: MotionState,
    stats: DetectorStats,
}

impl MotionDetector {
    pub fn new(settings: DetectorSettings) -> Self {
        info!(
            "Motion detector ready (threshold {}, start after {} frames, stop after {} frames, cooldown {})",
            settings.threshold,
            settings.threshold_frames,
            settings.stop_frames,
            settings.cooldown_frames
        );

        Self {
            settings,
            state: MotionState::default(),
            stats: DetectorStats::default(),
        }
    }

    /// Feed one movement score
    pub fn process(&mut self, score: f64) -> Option<Trigger> {
        let (next, trigger) = self.state.step(score, &self.settings);
        trace!("Score {:.2}: {:?} -> {:?}", score, self.state, next);

        self.state = next;
        self.stats.scores_processed += 1;

        match trigger {
            Some(Trigger::Start) => {
                self.stats.starts += 1;
                debug!("Motion start triggered at score {:.2}", score);
            }
            Some(Trigger::Stop) => {
                self.stats.stops += 1;
                debug!("Motion stop triggered at score {:.2}", score);
            }
            None => {}
        }

        trigger
    }

    /// Synthetic stop, used when recording has to halt regardless of motion.
    /// Returns `None` when the detector was already idle.
    pub fn force_stop(&mut self) -> Option<Trigger> {
        if !self.state.is_recording() {
            return None;
        }

        self.state = MotionState::Idle {
            above: 0,
            cooldown: self.settings.cooldown_frames,
        };
        self.stats.stops += 1;
        self.stats.forced_stops += 1;
        info!("Motion detector forced back to idle");

        Some(Trigger::Stop)
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state.is_recording()
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    pub fn stats(&self) -> DetectorStats {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(threshold: f64, threshold_frames: u32, stop_frames: u32) -> DetectorSettings {
        DetectorSettings {
            threshold,
            threshold_frames,
            stop_frames,
            cooldown_frames: 0,
        }
    }

    fn run(detector: &mut MotionDetector, scores: &[f64]) -> Vec<(usize, Trigger)> {
        scores
            .iter()
            .enumerate()
            .filter_map(|(i, score)| detector.process(*score).map(|t| (i, t)))
            .collect()
    }

    /// Deterministic pseudo-random scores around the threshold
    fn noisy_scores(seed: u64, count: usize) -> Vec<f64> {
        let mut state = seed;
        (0..count)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                ((state >> 33) % 31) as f64
            })
            .collect()
    }

    #[test]
    fn test_scenario_start_and_stop_indices() {
        let mut detector = MotionDetector::new(settings(15.0, 2, 3));
        let events = run(&mut detector, &[5.0, 20.0, 22.0, 3.0, 3.0, 3.0]);

        assert_eq!(events, vec![(2, Trigger::Start), (5, Trigger::Stop)]);
        assert!(!detector.is_recording());
    }

    #[test]
    fn test_start_fires_exactly_at_threshold_frames() {
        for threshold_frames in 1..6u32 {
            let mut detector = MotionDetector::new(settings(10.0, threshold_frames, 4));
            let scores = vec![50.0; 10];
            let events = run(&mut detector, &scores);
            assert_eq!(events[0], ((threshold_frames - 1) as usize, Trigger::Start));
        }
    }

    #[test]
    fn test_quiet_score_resets_above_counter() {
        let mut detector = MotionDetector::new(settings(10.0, 3, 4));
        let events = run(&mut detector, &[11.0, 11.0, 2.0, 11.0, 11.0, 11.0]);
        assert_eq!(events, vec![(5, Trigger::Start)]);
    }

    #[test]
    fn test_stop_fires_exactly_at_stop_frames() {
        let mut detector = MotionDetector::new(settings(10.0, 1, 5));
        let mut scores = vec![20.0];
        scores.extend(vec![1.0; 8]);
        let events = run(&mut detector, &scores);
        assert_eq!(events, vec![(0, Trigger::Start), (5, Trigger::Stop)]);
    }

    #[test]
    fn test_motion_score_resets_below_counter() {
        let mut detector = MotionDetector::new(settings(10.0, 1, 3));
        let events = run(&mut detector, &[20.0, 1.0, 1.0, 12.0, 1.0, 1.0, 1.0]);
        assert_eq!(events, vec![(0, Trigger::Start), (6, Trigger::Stop)]);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut detector = MotionDetector::new(settings(15.0, 1, 1));
        assert_eq!(detector.process(15.0), Some(Trigger::Start));
        assert_eq!(detector.process(14.99), Some(Trigger::Stop));
    }

    #[test]
    fn test_no_restart_on_the_stopping_score() {
        let mut detector = MotionDetector::new(settings(10.0, 1, 1));
        assert_eq!(detector.process(20.0), Some(Trigger::Start));
        assert_eq!(detector.process(0.0), Some(Trigger::Stop));
        // The next motion score is a new evaluation and may start again
        assert_eq!(detector.process(20.0), Some(Trigger::Start));
    }

    #[test]
    fn test_triggers_strictly_alternate() {
        for seed in 1..20 {
            let mut detector = MotionDetector::new(settings(15.0, 2, 3));
            let events = run(&mut detector, &noisy_scores(seed, 500));

            let mut expected = Trigger::Start;
            for (_, trigger) in events {
                assert_eq!(trigger, expected, "seed {}", seed);
                expected = match trigger {
                    Trigger::Start => Trigger::Stop,
                    Trigger::Stop => Trigger::Start,
                };
            }
        }
    }

    #[test]
    fn test_pure_step_function() {
        let s = settings(15.0, 2, 2);
        let (state, trigger) = MotionState::default().step(20.0, &s);
        assert_eq!(state, MotionState::Idle { above: 1, cooldown: 0 });
        assert_eq!(trigger, None);

        let (state, trigger) = state.step(20.0, &s);
        assert_eq!(state, MotionState::Recording { below: 0 });
        assert_eq!(trigger, Some(Trigger::Start));

        let (state, trigger) = state.step(1.0, &s);
        assert_eq!(state, MotionState::Recording { below: 1 });
        assert_eq!(trigger, None);
    }

    #[test]
    fn test_nan_score_counts_as_quiet() {
        let mut detector = MotionDetector::new(settings(5.0, 1, 2));
        assert_eq!(detector.process(f64::NAN), None);
        assert_eq!(detector.process(6.0), Some(Trigger::Start));
        assert_eq!(detector.process(f64::NAN), None);
        assert_eq!(detector.process(f64::NAN), Some(Trigger::Stop));
    }

    #[test]
    fn test_force_stop() {
        let mut detector = MotionDetector::new(settings(10.0, 1, 10));
        assert_eq!(detector.force_stop(), None);

        detector.process(20.0);
        assert!(detector.is_recording());
        assert_eq!(detector.force_stop(), Some(Trigger::Stop));
        assert!(!detector.is_recording());
        assert_eq!(detector.force_stop(), None);

        let stats = detector.stats();
        assert_eq!(stats.starts, 1);
        assert_eq!(stats.stops, 1);
        assert_eq!(stats.forced_stops, 1);
    }

    #[test]
    fn test_cooldown_delays_restart() {
        let mut detector = MotionDetector::new(DetectorSettings {
            threshold: 10.0,
            threshold_frames: 1,
            stop_frames: 1,
            cooldown_frames: 3,
        });

        assert_eq!(detector.process(20.0), Some(Trigger::Start));
        assert_eq!(detector.process(0.0), Some(Trigger::Stop));
        assert_eq!(detector.process(20.0), None);
        assert_eq!(detector.process(20.0), None);
        assert_eq!(detector.process(20.0), Some(Trigger::Start));
    }

    #[test]
    fn test_settings_from_config() {
        let config = crate::config::MotionCamConfig::default();
        let settings = DetectorSettings::from_config(&config.detection);
        assert_eq!(settings.threshold, 15.0);
        assert_eq!(settings.threshold_frames, 1);
        assert_eq!(settings.stop_frames, 15);
        assert_eq!(settings.cooldown_frames, 0);
    }
}
