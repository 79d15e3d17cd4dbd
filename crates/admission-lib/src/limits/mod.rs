//! Limit handling: namespace limit ranges and proportional limit derivation

mod limit_range;
mod proportional;

pub use limit_range::{
    LimitRangeCalculator, NoopLimitRangeCalculator, StaticLimitRangeCalculator,
    LIMIT_TYPE_CONTAINER,
};
pub use proportional::{proportional_limits, NamespaceLimits, ProportionalLimits};
