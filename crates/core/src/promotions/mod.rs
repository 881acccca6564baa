//! Promotion synthesis: category affinity turned into discounted, time-boxed offers.

mod generator;
mod policy;

pub use generator::{PromotionGenerator, SweepFailure, SweepReport};
pub use policy::{
    PromotionPolicy, DEFAULT_DISCOUNT_PCT, DEFAULT_MAX_PER_USER, DEFAULT_VALIDITY_DAYS,
};
