//! Scheduler limits and LOD tuning defaults.
//!
//! The values match the long-standing defaults of the Potree web loader so
//! datasets tuned for it stream the same way here.
//!
//! # Budgets
//!
//! ```text
//! ┌──────────────────────────────┬──────────────┬──────────────────────────────┐
//! │ Limit                        │ Default      │ Scope                        │
//! ├──────────────────────────────┼──────────────┼──────────────────────────────┤
//! │ point budget                 │ 1 000 000    │ all clouds, per frame        │
//! │ promotions to GPU            │ 2            │ all clouds, per frame        │
//! │ concurrent node fetches      │ 4            │ all clouds, in flight        │
//! │ min node pixel size          │ 50 px        │ per cloud                    │
//! └──────────────────────────────┴──────────────┴──────────────────────────────┘
//! ```
//!
//! # Weight Tiers
//!
//! Near-camera tiers scale the `1 / distance` term of a child's queue weight.
//! They were tuned empirically; treat them as configuration, not law.
//!
//! ```text
//! distance < 10 && level < 7  → × 10.0
//! distance < 15 && level < 5  → × 7.5
//! distance < 30 && level < 2  → × 5.0
//! otherwise                   → × 1.0
//! ```

/// Global cap on simultaneously rendered points.
pub const DEFAULT_POINT_BUDGET: u64 = 1_000_000;

/// Maximum geometry nodes promoted to GPU-resident per frame.
pub const MAX_LOADS_TO_GPU: usize = 2;

/// Maximum node fetches in flight at once.
pub const MAX_NUM_NODES_LOADING: usize = 4;

/// Children projecting smaller than this (in pixels) are not traversed.
pub const DEFAULT_MIN_NODE_PIXEL_SIZE: f64 = 50.0;

/// Queue weight of root nodes and of nodes containing the camera.
pub const MAX_WEIGHT: f64 = f64::MAX;

/// Octree fan-out.
pub const MAX_CHILDREN: usize = 8;

/// Default near-camera weight tiers as `(max_distance, max_level, multiplier)`.
pub const DEFAULT_WEIGHT_TIERS: [(f64, u32, f64); 3] = [(10.0, 7, 10.0), (15.0, 5, 7.5), (30.0, 2, 5.0)];

/// Pick window edge length in pixels.
pub const DEFAULT_PICK_WINDOW_SIZE: f64 = 15.0;

/// Frames averaged by the adaptive point budget.
pub const DEFAULT_FRAME_WINDOW: usize = 10;

/// Update timings kept by the scheduler metrics.
pub const UPDATE_TIMING_WINDOW: usize = 128;

/// Frame rate the adaptive point budget steers towards.
pub const DEFAULT_TARGET_FPS: f64 = 60.0;

/// Points added or removed per adaptive budget adjustment.
pub const DEFAULT_BUDGET_STEP: u64 = 100;

/// Sub-directory holding per-node files in Potree 1.x datasets.
pub const DEFAULT_OCTREE_DIR: &str = "data";

#[cfg(test)]
#[path = "constants_test.rs"]
mod constants_test;
