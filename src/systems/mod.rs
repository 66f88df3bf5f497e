//! Systems module - solvers and ECS systems for the ballistics core.

pub mod exit_ray;
pub mod kinematics;
pub mod logic;
pub mod zeroing;
