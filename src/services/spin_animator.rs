use std::time::Duration;

use chrono::Utc;
use futures_util::{Stream, StreamExt, stream};
use rand::Rng;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::config::SpinConfig;
use crate::error::{AppError, AppResult};
use crate::external::RenderSurface;
use crate::models::{SpinResult, WheelLayout};
use crate::services::AngleResolver;

/// Everything about one spin that is decided before the wheel moves.
#[derive(Debug, Clone, PartialEq)]
pub struct SpinPlan {
    pub sector_index: usize,
    pub full_turns: u32,
    /// Jittered stop angle in [0, 360).
    pub desired_stop_deg: f64,
    /// `full_turns * 360 + desired_stop_deg`.
    pub total_rotation: f64,
    pub duration: Duration,
}

/// 缓出三次曲线: 1 - (1 - p)^3
pub fn ease_out_cubic(progress: f64) -> f64 {
    let p = progress.clamp(0.0, 1.0);
    1.0 - (1.0 - p).powi(3)
}

/// Rotation shown `elapsed` into the animation.
pub fn rotation_at(plan: &SpinPlan, elapsed: Duration) -> f64 {
    let progress = if plan.duration.is_zero() {
        1.0
    } else {
        elapsed.as_secs_f64() / plan.duration.as_secs_f64()
    };
    plan.total_rotation * ease_out_cubic(progress)
}

struct FrameState {
    interval: Option<Interval>,
    started: Option<Instant>,
    finished: bool,
}

/// Drives the wheel animation towards an outcome fixed in advance.
#[derive(Debug, Clone)]
pub struct SpinAnimator {
    layout: WheelLayout,
    resolver: AngleResolver,
    min_turns: u32,
    max_turns: u32,
    min_duration_ms: u64,
    max_duration_ms: u64,
    frame_interval: Duration,
}

impl SpinAnimator {
    pub fn new(layout: WheelLayout, config: &SpinConfig) -> Self {
        let resolver = AngleResolver::new(&layout, config.jitter_fraction);
        Self {
            layout,
            resolver,
            min_turns: config.min_turns,
            max_turns: config.max_turns.max(config.min_turns),
            min_duration_ms: config.min_duration_ms,
            max_duration_ms: config.max_duration_ms.max(config.min_duration_ms),
            frame_interval: Duration::from_millis(config.frame_interval_ms.max(1)),
        }
    }

    pub fn resolver(&self) -> &AngleResolver {
        &self.resolver
    }

    pub fn layout(&self) -> &WheelLayout {
        &self.layout
    }

    /// Picks the turn count, the jittered stop angle and the duration.
    pub fn plan<R: Rng + ?Sized>(&self, sector_index: usize, rng: &mut R) -> AppResult<SpinPlan> {
        let desired_stop_deg = self.resolver.jittered_angle_for_sector(sector_index, rng)?;
        let full_turns = rng.gen_range(self.min_turns..=self.max_turns);
        let duration_ms = rng.gen_range(self.min_duration_ms..=self.max_duration_ms);

        Ok(SpinPlan {
            sector_index,
            full_turns,
            desired_stop_deg,
            total_rotation: f64::from(full_turns) * 360.0 + desired_stop_deg,
            duration: Duration::from_millis(duration_ms),
        })
    }

    /// One rotation value per frame tick. The last item is always exactly
    /// `plan.total_rotation`.
    pub fn frames(&self, plan: &SpinPlan) -> impl Stream<Item = f64> + Send + 'static {
        let plan = plan.clone();
        let period = self.frame_interval;
        let state = FrameState {
            interval: None,
            started: None,
            finished: false,
        };

        stream::unfold(state, move |mut state| {
            let plan = plan.clone();
            async move {
                if state.finished {
                    return None;
                }
                let interval = state.interval.get_or_insert_with(|| {
                    let mut interval = tokio::time::interval(period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    interval
                });
                interval.tick().await;

                let now = Instant::now();
                let started = *state.started.get_or_insert(now);
                let elapsed = now.duration_since(started);
                if elapsed >= plan.duration {
                    state.finished = true;
                    return Some((plan.total_rotation, state));
                }
                Some((rotation_at(&plan, elapsed), state))
            }
        })
    }

    /// Plays the animation on `surface` and reports the realized outcome.
    ///
    /// Once started the animation always runs to the end. The sector is
    /// decoded from the final angle and must equal the planned one.
    pub async fn run<S: RenderSurface + ?Sized>(
        &self,
        plan: &SpinPlan,
        surface: &S,
    ) -> AppResult<SpinResult> {
        let mut frames = std::pin::pin!(self.frames(plan));
        let mut stop_angle = 0.0;
        while let Some(rotation) = frames.next().await {
            surface.draw_frame(rotation);
            stop_angle = rotation;
        }

        let realized = self.resolver.sector_for_angle(stop_angle);
        if realized != plan.sector_index {
            log::error!(
                "Wheel stopped on sector {realized} but sector {} was selected (angle {stop_angle:.3})",
                plan.sector_index
            );
            return Err(AppError::InternalError(format!(
                "decoded sector {realized} does not match selected sector {}",
                plan.sector_index
            )));
        }

        let category = self.layout.category_of(realized)?;
        surface.show_outcome(&category.label, stop_angle);

        Ok(SpinResult {
            sector_index: realized,
            label: category.label.clone(),
            payout: category.payout,
            stop_angle,
            completed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WheelConfig;
    use crate::external::RecordingSurface;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn animator() -> SpinAnimator {
        let layout = WheelLayout::from_config(&WheelConfig::default()).unwrap();
        SpinAnimator::new(layout, &SpinConfig::default())
    }

    #[test]
    fn test_ease_out_cubic_endpoints() {
        assert_eq!(ease_out_cubic(0.0), 0.0);
        assert_eq!(ease_out_cubic(1.0), 1.0);
        assert_eq!(ease_out_cubic(2.0), 1.0);
        assert_eq!(ease_out_cubic(0.5), 0.875);
    }

    #[test]
    fn test_plan_respects_configured_ranges() {
        let animator = animator();
        let mut rng = StdRng::seed_from_u64(9);
        for index in 0..8 {
            let plan = animator.plan(index, &mut rng).unwrap();
            assert!((6..=8).contains(&plan.full_turns));
            assert!(plan.duration >= Duration::from_millis(3000));
            assert!(plan.duration <= Duration::from_millis(3600));
            assert_eq!(
                plan.total_rotation,
                f64::from(plan.full_turns) * 360.0 + plan.desired_stop_deg
            );
            assert_eq!(animator.resolver().sector_for_angle(plan.total_rotation), index);
        }
    }

    #[test]
    fn test_plan_rejects_unknown_sector() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(animator().plan(8, &mut rng).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_lands_on_selected_sector() {
        let animator = animator();
        let surface = RecordingSurface::new();
        let mut rng = StdRng::seed_from_u64(21);

        let plan = animator.plan(3, &mut rng).unwrap();
        let result = animator.run(&plan, &surface).await.unwrap();

        assert_eq!(result.sector_index, 3);
        assert_eq!(result.label, crate::config::SKULL);
        assert_eq!(result.stop_angle, plan.total_rotation);
        assert_eq!(surface.outcomes(), vec![crate::config::SKULL.to_string()]);

        let frames = surface.frames();
        assert!(frames.len() > 100);
        assert_eq!(frames.first().copied(), Some(0.0));
        assert_eq!(frames.last().copied(), Some(plan.total_rotation));
        // 每一帧只会向前转
        assert!(frames.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_takes_planned_duration() {
        let animator = animator();
        let plan = animator.plan(0, &mut StdRng::seed_from_u64(2)).unwrap();
        let start = Instant::now();
        animator.run(&plan, &RecordingSurface::new()).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= plan.duration);
        assert!(elapsed < plan.duration + Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_mismatch_is_internal_error() {
        let animator = animator();
        let surface = RecordingSurface::new();
        let mut plan = animator.plan(0, &mut StdRng::seed_from_u64(4)).unwrap();
        plan.total_rotation = 6.0 * 360.0 + animator.resolver().angle_for_sector(2).unwrap();

        let result = animator.run(&plan, &surface).await;
        assert!(matches!(result, Err(AppError::InternalError(_))));
        assert!(surface.outcomes().is_empty());
    }
}
