//! Ray/shape intersection core: a reference-counted invertible matrix type,
//! ray differentials with derivative reconstruction, a bump-allocated hit
//! arena, closest-hit and all-hits testers, and the low-discrepancy pixel
//! samplers that drive them. Grounded in the `iris`/`iris_advanced`/
//! `iris_camera` toolkits; see `DESIGN.md` for the module-by-module
//! grounding ledger.

pub mod arena;
pub mod direction;
pub mod error;
pub mod hit_tester;
pub mod image_sampler;
pub mod intersection;
pub mod matrix;
pub mod point;
pub mod ray;
pub mod ray_differential;
pub mod ray_tracer;
pub mod sequence;
pub mod vector;

#[cfg(test)]
#[macro_use]
pub mod test_utils;

pub mod demo_scene;
