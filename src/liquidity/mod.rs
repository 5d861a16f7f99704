//! Concentrated-liquidity position planning
//!
//! - Tick and sqrt-price conversion
//! - 512-bit liquidity arithmetic
//! - Pool address derivation and fee tiers
//! - Mint planning against live pool state

pub mod math;
pub mod planner;
pub mod pool;
pub mod position;
pub mod tick_math;

pub use planner::{tick_range, LiquidityPositionPlanner, PositionSpec, MINT_SIGNATURE};
pub use pool::{compute_pool_address, sort_tokens, FeeTier, PoolState, POOL_INIT_CODE_HASH};
pub use position::Position;
pub use tick_math::nearest_usable_tick;
