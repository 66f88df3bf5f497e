//! Projectile logic systems - spawn streaming, retirement and weapon zeroing.

use bevy::ecs::message::MessageWriter;
use bevy::prelude::*;

use crate::components::{ProjectileSlots, WeaponZeroing, ZeroingRequest, ZeroingTask};
use crate::events::{ProjectileRetired, RetireReason, ZeroingResolved};
use crate::resources::{BallisticsConfig, ProjectileSpawnQueue};
use crate::systems::zeroing::zeroing_angles_with_drag;

/// Stream queued spawns into free projectile slots.
///
/// Spawns that do not fit stay queued and are retried on the next tick.
///
/// # Arguments
/// * `queue` - Pending spawns and the resume cursor
/// * `slots` - Projectile slot store
pub fn drain_spawn_queue(mut queue: ResMut<ProjectileSpawnQueue>, mut slots: ResMut<ProjectileSlots>) {
    if queue.pending_count() == 0 {
        if !queue.pending.is_empty() {
            queue.pending.clear();
            queue.cursor = 0;
        }
        return;
    }

    let cursor = slots.insert(&queue.pending, queue.cursor);
    queue.cursor = cursor;

    if cursor == queue.pending.len() {
        queue.pending.clear();
        queue.cursor = 0;
    } else {
        debug!(
            "Projectile slots full, {} spawns deferred",
            queue.pending_count()
        );
    }
}

/// Age every in-flight projectile and retire the expired or out-of-range ones.
///
/// # Arguments
/// * `time` - Fixed timestep clock
/// * `config` - Ballistics configuration resource
/// * `slots` - Projectile slot store
/// * `retired` - Message writer for retirement notifications
/// * `scratch` - Reused buffer of slots to retire
pub fn retire_projectiles(
    time: Res<Time>,
    config: Res<BallisticsConfig>,
    mut slots: ResMut<ProjectileSlots>,
    mut retired: MessageWriter<ProjectileRetired>,
    mut scratch: Local<Vec<(usize, RetireReason)>>,
) {
    let dt = time.delta_secs();
    let max_distance_sq = config.max_projectile_distance * config.max_projectile_distance;

    scratch.clear();
    {
        let (active, logic, compute) = slots.active_records_mut();
        for &slot in active {
            let record = &mut logic[slot];
            record.age += dt;

            let reason = if record.age >= record.lifetime {
                RetireReason::Expired
            } else if compute[slot].position.distance_squared(record.origin) > max_distance_sq {
                RetireReason::OutOfRange
            } else {
                continue;
            };
            scratch.push((slot, reason));
        }
    }

    for &(slot, reason) in scratch.iter() {
        if slots.mark_free(slot).is_err() {
            continue;
        }
        let owner = slots.logic(slot).and_then(|record| record.owner);
        let position = slots.compute(slot).map_or(Vec3::ZERO, |k| k.position);
        retired.write(ProjectileRetired {
            slot,
            owner,
            position,
            reason,
        });
    }
}

/// Dispatch drag-aware zeroing jobs for new requests.
///
/// # Arguments
/// * `commands` - Bevy Commands for component changes
/// * `config` - Ballistics configuration resource (solver tuning)
/// * `requests` - Weapons with a pending `ZeroingRequest`
pub fn start_zeroing_requests(
    mut commands: Commands,
    config: Res<BallisticsConfig>,
    requests: Query<(Entity, &ZeroingRequest)>,
) {
    for (entity, request) in requests.iter() {
        let job = zeroing_angles_with_drag(&[request.distance], request.params, config.zeroing);
        commands
            .entity(entity)
            .remove::<ZeroingRequest>()
            .insert(ZeroingTask {
                distance: request.distance,
                job,
            });
    }
}

/// Apply finished zeroing jobs to their weapons.
///
/// Unreachable distances are reported and keep the previous pitch.
///
/// # Arguments
/// * `commands` - Bevy Commands for component changes
/// * `resolved` - Message writer for zeroing notifications
/// * `tasks` - Weapons with an in-flight zeroing job
pub fn poll_zeroing_jobs(
    mut commands: Commands,
    mut resolved: MessageWriter<ZeroingResolved>,
    mut tasks: Query<(Entity, &mut ZeroingTask, Option<&mut WeaponZeroing>)>,
) {
    for (entity, mut task, zeroing) in tasks.iter_mut() {
        let Some(results) = task.job.try_complete() else {
            continue;
        };

        let distance = task.distance;
        let angle = results.first().and_then(|result| result.elevation());

        if angle.is_none() {
            warn!("Zeroing distance {distance} m is out of range; keeping previous pitch");
        }

        match zeroing {
            Some(mut zeroing) => {
                zeroing.distance = distance;
                zeroing.reachable = angle.is_some();
                if let Some(angle) = angle {
                    zeroing.pitch_adjustment = angle;
                }
            }
            None => {
                commands.entity(entity).insert(WeaponZeroing {
                    distance,
                    pitch_adjustment: angle.unwrap_or(0.0),
                    reachable: angle.is_some(),
                });
            }
        }

        commands.entity(entity).remove::<ZeroingTask>();
        resolved.write(ZeroingResolved {
            weapon: entity,
            distance,
            angle,
        });
    }
}
