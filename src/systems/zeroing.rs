//! Zeroing solver - launch elevation needed to land at a given distance.
//!
//! The closed-form solution ignores air. The drag-aware solver simulates
//! trajectories numerically: it first brackets the maximum achievable range by
//! sampling elevations between 0° and 45°, then bisects the bracket of each
//! target distance. All targets of a batch share the range-bracketing
//! simulations.

use std::f32::consts::{FRAC_PI_4, PI};

use bevy::prelude::*;
use bevy::tasks::{block_on, futures_lite::future, AsyncComputeTaskPool, Task, TaskPool};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::systems::kinematics::rk4_step;
use crate::types::ZeroingResult;

/// Distance sentinel marking a target as proven unreachable, and the landing
/// distance reported for trajectories still airborne when their lifetime ends.
pub const UNREACHABLE: f32 = -1.0;

/// Numeric inputs of the drag-aware solver.
///
/// # Fields
/// * `speed` - Muzzle speed (m/s)
/// * `radius` - Projectile radius (m)
/// * `mass` - Projectile mass (kg)
/// * `gravity` - Gravitational acceleration magnitude (m/s²)
/// * `drag_coefficient` - Dimensionless drag coefficient
/// * `lifetime` - Simulated flight time limit (s)
/// * `air_density` - Air density (kg/m³)
/// * `time_step` - Integration step (s)
#[derive(Clone, Copy, Debug, PartialEq, Reflect, Serialize, Deserialize)]
pub struct ZeroingParams {
    pub speed: f32,
    pub radius: f32,
    pub mass: f32,
    pub gravity: f32,
    pub drag_coefficient: f32,
    pub lifetime: f32,
    pub air_density: f32,
    pub time_step: f32,
}

impl Default for ZeroingParams {
    /// The default rifle bullet at sea level, 10 s lifetime, 100 Hz steps.
    fn default() -> Self {
        Self {
            speed: 400.0,
            radius: 0.0056,
            mass: 0.01,
            gravity: 9.81,
            drag_coefficient: 0.3,
            lifetime: 10.0,
            air_density: 1.225,
            time_step: 0.01,
        }
    }
}

impl ZeroingParams {
    /// `0.5 * ρ * Cd * A / m`, the drag deceleration per squared speed.
    pub fn drag_factor(&self) -> f32 {
        if self.mass <= 0.0 {
            return 0.0;
        }
        let area = PI * self.radius * self.radius;
        0.5 * self.air_density * self.drag_coefficient * area / self.mass
    }
}

/// Tuning of the drag-aware solver.
#[derive(Clone, Copy, Debug, PartialEq, Reflect, Serialize, Deserialize)]
pub struct ZeroingSettings {
    /// Uniform elevation samples per range-bracketing pass
    pub samples_per_pass: u32,
    /// Number of range-bracketing passes
    pub refinement_passes: u32,
    /// Bisection stops once a bound is this close to the target (m)
    pub distance_tolerance: f32,
    /// Bisection iteration limit per target
    pub max_bisection_iterations: u32,
}

impl Default for ZeroingSettings {
    fn default() -> Self {
        Self {
            samples_per_pass: 16,
            refinement_passes: 4,
            distance_tolerance: 0.05,
            max_bisection_iterations: 40,
        }
    }
}

/// Per-target bisection state.
///
/// Once both bounds are observed, `undershoot_distance <= target <=
/// overshoot_distance`. Both distances equal [`UNREACHABLE`] for targets
/// beyond the maximum range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrajectorySample {
    pub target: f32,
    pub undershoot_angle: f32,
    pub undershoot_distance: f32,
    pub overshoot_angle: f32,
    pub overshoot_distance: f32,
}

impl TrajectorySample {
    pub fn new(target: f32) -> Self {
        Self {
            target,
            // A flat shot from ground level lands immediately
            undershoot_angle: 0.0,
            undershoot_distance: 0.0,
            overshoot_angle: FRAC_PI_4,
            overshoot_distance: f32::INFINITY,
        }
    }

    /// Tightens whichever bound a landed shot improves.
    pub fn observe(&mut self, angle: f32, distance: f32) {
        if self.is_unreachable() || distance < 0.0 {
            return;
        }
        if distance <= self.target && distance > self.undershoot_distance {
            self.undershoot_angle = angle;
            self.undershoot_distance = distance;
        }
        if distance >= self.target && distance < self.overshoot_distance {
            self.overshoot_angle = angle;
            self.overshoot_distance = distance;
        }
    }

    pub fn mark_unreachable(&mut self) {
        self.undershoot_distance = UNREACHABLE;
        self.overshoot_distance = UNREACHABLE;
    }

    pub fn is_unreachable(&self) -> bool {
        self.undershoot_distance == UNREACHABLE && self.overshoot_distance == UNREACHABLE
    }

    /// Distance error of the closer bound.
    pub fn best_error(&self) -> f32 {
        (self.target - self.undershoot_distance)
            .abs()
            .min((self.overshoot_distance - self.target).abs())
    }

    pub fn result(&self) -> ZeroingResult {
        if self.is_unreachable() {
            return ZeroingResult::unreachable(self.target);
        }

        let under = (self.target - self.undershoot_distance).abs();
        let over = (self.overshoot_distance - self.target).abs();
        let angle = if under <= over {
            self.undershoot_angle
        } else {
            self.overshoot_angle
        };

        ZeroingResult {
            distance: self.target,
            angle,
            reachable: true,
        }
    }
}

/// Closed-form zeroing angle without drag.
///
/// `0.5 * asin(|g·d| / v²)`, the lower of the two solutions.
///
/// # Returns
/// The elevation in radians, or None if `distance` is out of range
pub fn zeroing_angle_no_drag(distance: f32, speed: f32, gravity: f32) -> Option<f32> {
    if speed <= 0.0 || !distance.is_finite() {
        return None;
    }
    let ratio = (gravity * distance).abs() / (speed * speed);
    (ratio <= 1.0).then(|| 0.5 * ratio.asin())
}

/// Range of a drag-free shot fired from and landing at ground level.
pub fn range_no_drag(angle: f32, speed: f32, gravity: f32) -> f32 {
    speed * speed * (2.0 * angle).sin() / gravity.abs()
}

/// Landing distance of a shot fired from ground level at `angle`.
///
/// Integrates gravity and quadratic drag with RK4 and interpolates the
/// ground crossing linearly between steps.
///
/// # Returns
/// The horizontal distance at touchdown, or [`UNREACHABLE`] if the shot is
/// still airborne when its lifetime ends
pub fn simulate_landing_distance(angle: f32, params: &ZeroingParams) -> f32 {
    let gravity = Vec2::new(0.0, -params.gravity.abs());
    let drag = params.drag_factor();
    let acceleration = |velocity: Vec2| gravity - velocity * velocity.length() * drag;

    let dt = params.time_step.max(1.0e-4);
    let steps = (params.lifetime / dt).ceil() as u32;

    let mut position = Vec2::ZERO;
    let mut velocity = Vec2::from_angle(angle) * params.speed;

    for _ in 0..steps {
        let previous = position;
        (position, velocity) = rk4_step(position, velocity, dt, &acceleration);

        if position.y < 0.0 {
            let t = previous.y / (previous.y - position.y);
            return previous.x + (position.x - previous.x) * t;
        }
    }

    UNREACHABLE
}

/// Bracket the maximum range, updating every sample with each shot.
///
/// # Returns
/// The converged maximum landing distance, or [`UNREACHABLE`] when no shot
/// landed within its lifetime
fn bracket_max_range(
    samples: &mut [TrajectorySample],
    params: &ZeroingParams,
    settings: &ZeroingSettings,
) -> f32 {
    let count = settings.samples_per_pass.max(2);
    let mut shots = Vec::with_capacity(count as usize);
    let mut low = 0.0_f32;
    let mut high = FRAC_PI_4;
    let mut max_range = UNREACHABLE;

    for _ in 0..settings.refinement_passes.max(1) {
        let step = (high - low) / (count - 1) as f32;
        shots.clear();

        let mut pass_best = (low, UNREACHABLE);
        for i in 0..count {
            let angle = low + step * i as f32;
            let distance = simulate_landing_distance(angle, params);
            shots.push((angle, distance));
            if distance > pass_best.1 {
                pass_best = (angle, distance);
            }
        }

        if pass_best.1 < 0.0 {
            break;
        }
        max_range = max_range.max(pass_best.1);

        // Only the ascending branch brackets the low solution
        for &(angle, distance) in shots.iter().filter(|(angle, _)| *angle <= pass_best.0) {
            for sample in samples.iter_mut() {
                sample.observe(angle, distance);
            }
        }

        low = (pass_best.0 - step).max(0.0);
        high = (pass_best.0 + step).min(FRAC_PI_4);
    }

    max_range
}

/// Bisect one target's bracket until it is within tolerance.
fn bisect(sample: &mut TrajectorySample, params: &ZeroingParams, settings: &ZeroingSettings) {
    for _ in 0..settings.max_bisection_iterations {
        if sample.best_error() <= settings.distance_tolerance {
            return;
        }

        let angle = 0.5 * (sample.undershoot_angle + sample.overshoot_angle);
        let distance = simulate_landing_distance(angle, params);
        if distance < 0.0 {
            return;
        }

        if distance <= sample.target {
            sample.undershoot_angle = angle;
            sample.undershoot_distance = distance;
        } else {
            sample.overshoot_angle = angle;
            sample.overshoot_distance = distance;
        }
    }
}

/// Solve a batch of zeroing targets on the calling thread.
///
/// # Arguments
/// * `distances` - Target distances (m), in any order
/// * `params` - Projectile and environment parameters
/// * `settings` - Solver tuning
///
/// # Returns
/// One result per distance, in input order
pub fn solve_zeroing_batch(
    distances: &[f32],
    params: &ZeroingParams,
    settings: &ZeroingSettings,
) -> Vec<ZeroingResult> {
    let mut samples: Vec<TrajectorySample> =
        distances.iter().copied().map(TrajectorySample::new).collect();

    let max_range = bracket_max_range(&mut samples, params, settings);

    for sample in samples.iter_mut() {
        if !sample.target.is_finite() || sample.target < 0.0 || sample.target >= max_range {
            sample.mark_unreachable();
            continue;
        }
        bisect(sample, params, settings);
    }

    samples.iter().map(TrajectorySample::result).collect()
}

/// Completion handle of a zeroing batch running on the async compute pool.
///
/// Results must be read through [`ZeroingJob::complete`] or
/// [`ZeroingJob::try_complete`]. Dropping an unfinished job blocks until the
/// worker is done; a dispatched batch is never cancelled.
pub struct ZeroingJob {
    task: Option<Task<Vec<ZeroingResult>>>,
}

impl ZeroingJob {
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Polls once; returns the results if the batch is done.
    ///
    /// Returns None on every call after the results have been taken.
    pub fn try_complete(&mut self) -> Option<Vec<ZeroingResult>> {
        let task = self.task.as_mut()?;
        let results = block_on(future::poll_once(task))?;
        self.task = None;
        Some(results)
    }

    /// Blocks until the batch is done and returns its results.
    ///
    /// Returns an empty `Vec` if [`ZeroingJob::try_complete`] already took
    /// the results.
    pub fn complete(mut self) -> Vec<ZeroingResult> {
        self.task
            .take()
            .map(|task| block_on(task))
            .unwrap_or_default()
    }
}

impl Drop for ZeroingJob {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            block_on(task);
        }
    }
}

/// Dispatch a drag-aware zeroing batch to the async compute pool.
///
/// The job owns copies of its inputs, so independent batches never share
/// state.
///
/// # Example
/// ```
/// use bevy_ballistics_core::systems::zeroing::{
///     zeroing_angles_with_drag, ZeroingParams, ZeroingSettings,
/// };
///
/// let params = ZeroingParams { speed: 100.0, lifetime: 30.0, ..Default::default() };
/// let job = zeroing_angles_with_drag(&[50.0, 100.0], params, ZeroingSettings::default());
/// let results = job.complete();
/// assert_eq!(results.len(), 2);
/// ```
pub fn zeroing_angles_with_drag(
    distances: &[f32],
    params: ZeroingParams,
    settings: ZeroingSettings,
) -> ZeroingJob {
    let distances = distances.to_vec();
    debug!("Dispatching zeroing batch for {} distances", distances.len());

    let pool = AsyncComputeTaskPool::get_or_init(TaskPool::default);
    let task = pool.spawn(async move { solve_zeroing_batch(&distances, &params, &settings) });

    ZeroingJob { task: Some(task) }
}

/// Errors raised when encoding or decoding a [`ZeroingTable`].
#[derive(Debug, Error)]
pub enum ZeroingError {
    #[error("failed to encode zeroing table: {0}")]
    Encode(#[source] bincode::Error),
    #[error("failed to decode zeroing table: {0}")]
    Decode(#[source] bincode::Error),
}

/// Pre-solved zeroing angles for one projectile, sorted by distance.
///
/// Baked once per weapon and looked up at runtime with linear interpolation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZeroingTable {
    pub params: ZeroingParams,
    pub entries: Vec<ZeroingResult>,
}

impl ZeroingTable {
    pub fn new(params: ZeroingParams, mut entries: Vec<ZeroingResult>) -> Self {
        entries.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Self { params, entries }
    }

    /// Solve `distances` synchronously and store the results.
    pub fn bake(distances: &[f32], params: ZeroingParams, settings: &ZeroingSettings) -> Self {
        Self::new(params, solve_zeroing_batch(distances, &params, settings))
    }

    /// Largest reachable distance in the table.
    pub fn max_reachable_distance(&self) -> Option<f32> {
        self.entries
            .iter()
            .filter(|entry| entry.reachable)
            .map(|entry| entry.distance)
            .last()
    }

    /// Interpolated elevation for `distance`.
    ///
    /// Distances below the first entry interpolate from a flat shot at zero
    /// distance. Returns None past the last reachable entry.
    pub fn angle_for(&self, distance: f32) -> Option<f32> {
        if distance < 0.0 || distance > self.max_reachable_distance()? {
            return None;
        }

        let mut previous = (0.0_f32, 0.0_f32);
        for entry in self.entries.iter().filter(|entry| entry.reachable) {
            if distance <= entry.distance {
                let span = entry.distance - previous.0;
                if span <= f32::EPSILON {
                    return Some(entry.angle);
                }
                let t = (distance - previous.0) / span;
                return Some(previous.1 + (entry.angle - previous.1) * t);
            }
            previous = (entry.distance, entry.angle);
        }

        None
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ZeroingError> {
        bincode::serialize(self).map_err(ZeroingError::Encode)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ZeroingError> {
        bincode::deserialize(bytes).map_err(ZeroingError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vacuum(speed: f32) -> ZeroingParams {
        ZeroingParams {
            speed,
            drag_coefficient: 0.0,
            lifetime: 30.0,
            ..Default::default()
        }
    }

    fn cannonball() -> ZeroingParams {
        ZeroingParams {
            speed: 100.0,
            radius: 0.05,
            mass: 1.0,
            drag_coefficient: 0.47,
            lifetime: 30.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_drag_reference_values() {
        let angle = zeroing_angle_no_drag(500.0, 300.0, 9.81).unwrap();
        assert!((angle - 0.027_27).abs() < 1e-4);
        assert!((angle.to_degrees() - 1.5625).abs() < 1e-2);

        assert_eq!(zeroing_angle_no_drag(1.0e7, 300.0, 9.81), None);
        assert_eq!(zeroing_angle_no_drag(100.0, 0.0, 9.81), None);
    }

    #[test]
    fn test_no_drag_reproduces_distance() {
        for (distance, speed, gravity) in [
            (10.0, 50.0, 9.81),
            (250.0, 80.0, 9.81),
            (900.0, 300.0, 1.62),
            (1019.0, 100.0, 9.81),
        ] {
            let angle = zeroing_angle_no_drag(distance, speed, gravity).unwrap();
            let range = range_no_drag(angle, speed, gravity);
            assert!((range - distance).abs() < distance * 1e-3, "{range} vs {distance}");
        }
    }

    #[test]
    fn test_simulation_matches_vacuum_range() {
        let params = vacuum(100.0);
        let angle = 30.0_f32.to_radians();
        let simulated = simulate_landing_distance(angle, &params);
        let expected = range_no_drag(angle, 100.0, 9.81);
        assert!((simulated - expected).abs() < 0.1, "{simulated} vs {expected}");
    }

    #[test]
    fn test_drag_shortens_range() {
        let angle = 30.0_f32.to_radians();
        let with_drag = simulate_landing_distance(angle, &cannonball());
        let without = simulate_landing_distance(angle, &vacuum(100.0));
        assert!(with_drag > 0.0);
        assert!(with_drag < without);
    }

    #[test]
    fn test_short_lifetime_reports_airborne() {
        let params = ZeroingParams {
            lifetime: 0.5,
            ..vacuum(100.0)
        };
        assert_eq!(simulate_landing_distance(FRAC_PI_4, &params), UNREACHABLE);
    }

    #[test]
    fn test_observe_keeps_bracket_ordered() {
        let mut sample = TrajectorySample::new(100.0);
        sample.observe(0.1, 80.0);
        sample.observe(0.3, 150.0);
        sample.observe(0.2, 120.0);
        sample.observe(0.05, 40.0);
        sample.observe(0.4, UNREACHABLE);

        assert_eq!((sample.undershoot_angle, sample.undershoot_distance), (0.1, 80.0));
        assert_eq!((sample.overshoot_angle, sample.overshoot_distance), (0.2, 120.0));
        // Equal errors prefer the undershoot
        assert_eq!(sample.result().angle, 0.1);
    }

    #[test]
    fn test_zero_drag_batch_matches_closed_form() {
        let params = vacuum(100.0);
        let distances = [100.0, 500.0, 900.0];
        let results = solve_zeroing_batch(&distances, &params, &ZeroingSettings::default());

        for result in results {
            let expected = zeroing_angle_no_drag(result.distance, 100.0, 9.81).unwrap();
            let angle = result.elevation().unwrap();
            assert!((angle - expected).abs() < 2e-3, "{angle} vs {expected}");
        }
    }

    #[test]
    fn test_ascending_batch_is_monotonic_then_unreachable() {
        let distances = [25.0, 50.0, 100.0, 150.0, 200.0, 300.0, 400.0, 600.0, 5000.0];
        let results = solve_zeroing_batch(&distances, &cannonball(), &ZeroingSettings::default());

        assert!(results[0].reachable);
        assert!(!results[distances.len() - 1].reachable);
        assert_eq!(results[distances.len() - 1].angle, 0.0);

        let mut seen_unreachable = false;
        let mut last_angle = 0.0;
        for result in &results {
            match result.elevation() {
                Some(angle) => {
                    assert!(!seen_unreachable, "reachable after unreachable at {}", result.distance);
                    assert!(angle >= last_angle, "angle decreased at {}", result.distance);
                    last_angle = angle;
                }
                None => seen_unreachable = true,
            }
        }
    }

    #[test]
    fn test_invalid_targets_are_unreachable() {
        let results = solve_zeroing_batch(
            &[-5.0, f32::NAN, 0.0],
            &vacuum(100.0),
            &ZeroingSettings::default(),
        );
        assert!(!results[0].reachable);
        assert!(!results[1].reachable);
        assert_eq!(results[2].elevation(), Some(0.0));
    }

    #[test]
    fn test_job_completes_off_thread() {
        let job = zeroing_angles_with_drag(&[200.0, 1.0e6], vacuum(100.0), ZeroingSettings::default());
        let results = job.complete();

        assert_eq!(results.len(), 2);
        let expected = zeroing_angle_no_drag(200.0, 100.0, 9.81).unwrap();
        assert!((results[0].angle - expected).abs() < 2e-3);
        assert!(!results[1].reachable);
    }

    #[test]
    fn test_job_try_complete_and_drop() {
        let mut job = zeroing_angles_with_drag(&[150.0], cannonball(), ZeroingSettings::default());
        let mut results = None;
        for _ in 0..10_000 {
            if let Some(done) = job.try_complete() {
                results = Some(done);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(results.map(|r| r.len()), Some(1));
        assert!(job.is_finished());
        assert!(job.try_complete().is_none());
        // Results already taken
        assert!(job.complete().is_empty());

        // Dropping an unread job waits for it instead of freeing under the worker
        let unread = zeroing_angles_with_drag(&[100.0, 200.0], cannonball(), ZeroingSettings::default());
        drop(unread);
    }

    #[test]
    fn test_table_interpolates_and_encodes() {
        let params = vacuum(100.0);
        let table = ZeroingTable::new(
            params,
            vec![
                ZeroingResult { distance: 200.0, angle: 0.2, reachable: true },
                ZeroingResult { distance: 100.0, angle: 0.1, reachable: true },
                ZeroingResult::unreachable(5000.0),
            ],
        );

        assert_eq!(table.max_reachable_distance(), Some(200.0));
        assert!((table.angle_for(150.0).unwrap() - 0.15).abs() < 1e-6);
        assert!((table.angle_for(50.0).unwrap() - 0.05).abs() < 1e-6);
        assert_eq!(table.angle_for(300.0), None);

        let bytes = table.to_bytes().unwrap();
        assert_eq!(ZeroingTable::from_bytes(&bytes).unwrap(), table);
        assert!(ZeroingTable::from_bytes(&bytes[..3]).is_err());
    }
}
