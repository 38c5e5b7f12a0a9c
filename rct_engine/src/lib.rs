//! Core engine for randomized-control-trial mailing lists.
//!
//! The engine is deliberately free of I/O: it splits a filtered voter list
//! into disjoint control and treatment arms ([`split_groups`],
//! [`split_stratified`]), consolidates person records into household mail
//! pieces ([`group_households`]), generates block-randomized synthetic
//! outcomes for exercising the analysis ([`block_outcomes`]), and runs the
//! two-proportion significance and power analyses ([`ab_test`],
//! [`power_analysis`]). Storage, notification and voter-file parsing live in
//! the calling binary.

mod config;
mod household;
mod simulate;
mod split;
mod stats;

pub use crate::config::*;
pub use crate::household::{group_households, household_count, invalid_address_count};
pub use crate::simulate::{arm_rate, block_outcomes, draw_lift, BLOCK_SIZE, DEFAULT_LIFT_RANGE};
pub use crate::split::{
    split_groups, split_stratified, MAX_CONTROL_FRACTION, MIN_CONTROL_FRACTION,
};
pub use crate::stats::{
    ab_test, check_candidate, check_subgroups, cohen_h, normal_cdf, normal_ppf, power_analysis,
    AbTestReport, SampleSizeRequirement, SizeCheck,
};
