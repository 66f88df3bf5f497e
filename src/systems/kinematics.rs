//! Kinematics system - RK4 integration over the active compute slots.

use std::ops::{Add, Mul};

use bevy::prelude::*;

use crate::components::{ProjectileKinematics, ProjectileSlots};
use crate::resources::BallisticsEnvironment;

/// One RK4 step of position and velocity under a velocity-dependent
/// acceleration.
///
/// Exact for constant acceleration, so drag-free trajectories match the
/// closed-form parabola.
///
/// # Arguments
/// * `position` - Current position
/// * `velocity` - Current velocity
/// * `dt` - Time step
/// * `acceleration` - Acceleration as a function of velocity
///
/// # Returns
/// The `(position, velocity)` pair after `dt`
pub fn rk4_step<V>(position: V, velocity: V, dt: f32, acceleration: impl Fn(V) -> V) -> (V, V)
where
    V: Copy + Add<Output = V> + Mul<f32, Output = V>,
{
    let half = dt * 0.5;

    let k1v = acceleration(velocity);
    let k1p = velocity;
    let k2p = velocity + k1v * half;
    let k2v = acceleration(k2p);
    let k3p = velocity + k2v * half;
    let k3v = acceleration(k3p);
    let k4p = velocity + k3v * dt;
    let k4v = acceleration(k4p);

    let sixth = dt / 6.0;
    let new_velocity = velocity + (k1v + k2v * 2.0 + k3v * 2.0 + k4v) * sixth;
    let new_position = position + (k1p + k2p * 2.0 + k3p * 2.0 + k4p) * sixth;
    (new_position, new_velocity)
}

/// Acceleration from gravity and aerodynamic drag.
///
/// Uses the drag equation `F = 0.5 * ρ * v² * Cd * A`, with `0.5 * Cd * A / m`
/// precomputed in `drag_factor`.
///
/// # Arguments
/// * `drag_factor` - Per-projectile drag factor
/// * `velocity` - Current velocity vector
/// * `env` - Ballistics environment
/// * `air_density` - Effective air density
///
/// # Returns
/// The acceleration vector acting on the projectile
pub fn calculate_acceleration(
    drag_factor: f32,
    velocity: Vec3,
    env: &BallisticsEnvironment,
    air_density: f32,
) -> Vec3 {
    // Velocity relative to air (accounting for wind)
    let relative = velocity - env.wind;
    let speed = relative.length();

    if speed < 0.001 {
        return env.gravity;
    }

    env.gravity - relative * (speed * air_density * drag_factor)
}

/// Advance every active compute record by `dt`.
///
/// Free slots are never touched.
pub fn integrate_active_slots(slots: &mut ProjectileSlots, dt: f32, env: &BallisticsEnvironment) {
    let air_density = env.effective_air_density();
    let (active, compute) = slots.active_compute_mut();

    for &slot in active {
        integrate(&mut compute[slot], dt, env, air_density);
    }
}

fn integrate(
    kinematics: &mut ProjectileKinematics,
    dt: f32,
    env: &BallisticsEnvironment,
    air_density: f32,
) {
    let drag_factor = kinematics.drag_factor;
    kinematics.previous_position = kinematics.position;
    (kinematics.position, kinematics.velocity) = rk4_step(
        kinematics.position,
        kinematics.velocity,
        dt,
        |velocity| calculate_acceleration(drag_factor, velocity, env, air_density),
    );
}

/// Integrate all in-flight projectiles.
///
/// Runs in FixedUpdate for deterministic simulation.
pub fn update_slot_kinematics(
    time: Res<Time>,
    env: Res<BallisticsEnvironment>,
    mut slots: ResMut<ProjectileSlots>,
) {
    integrate_active_slots(&mut slots, time.delta_secs(), &env);
}
