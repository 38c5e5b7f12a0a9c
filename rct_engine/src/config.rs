// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// One person-level mailing record, as derived from a voter universe.
///
/// Line 2 of the address is optional in the underlying data and is kept as an
/// empty string when missing. All fields are carried verbatim; trimming
/// happens at the aggregation boundary.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct MailPerson {
    pub full_name: String,
    pub address_line1: String,
    pub address_line2: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl MailPerson {
    /// The single-line address used in person-level exports.
    /// A missing line 2 contributes nothing, not the string "None".
    pub fn display_address(&self) -> String {
        let l1 = self.address_line1.trim();
        let l2 = self.address_line2.trim();
        if l2.is_empty() {
            l1.to_string()
        } else {
            format!("{} {}", l1, l2)
        }
    }
}

/// How large the control group should be.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum ControlSizing {
    /// Fraction of the whole list, accepted in [0.10, 0.50].
    Fraction(f64),
    /// Absolute control size, capped at the list size.
    Count(usize),
}

impl ControlSizing {
    pub const DEFAULT_FRACTION: f64 = 0.10;

    pub const DEFAULT: ControlSizing = ControlSizing::Fraction(Self::DEFAULT_FRACTION);
}

// ******** Output data structures *********

/// The two arms of an experiment.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Arm {
    Control,
    Treatment,
}

impl Display for Arm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arm::Control => write!(f, "control"),
            Arm::Treatment => write!(f, "treatment"),
        }
    }
}

/// A disjoint, exhaustive partition of an input list.
///
/// Invariant: `control.len() + treatment.len()` equals the input length and
/// no record appears in both arms.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SplitGroups<T> {
    pub control: Vec<T>,
    pub treatment: Vec<T>,
}

/// One household-level mailing row.
///
/// The key is the trimmed (line 1, city, state, zip) tuple. Line 2 is
/// deliberately not part of the key: separate units at one street address
/// collapse into a single mail piece.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Household {
    pub address_line1: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    /// "Household of <name1> and <name2> ...", members in encounter order.
    pub display_name: String,
    pub member_count: usize,
    /// False when line 1, city or zip is blank; such rows are kept but are
    /// not deliverable.
    pub valid_mailing: bool,
}

// ********* Errors **********

/// Errors surfaced by the engine.
///
/// `Validation` problems are caller mistakes and are never retried.
/// `DataIntegrity` means a partition or grouping invariant was violated and
/// the current request must not persist anything. `StatisticalPrecondition`
/// rejects analyzer inputs that would otherwise produce NaN or infinity.
#[derive(PartialEq, Debug, Clone)]
pub enum EngineError {
    EmptyGroup,
    InvalidControlFraction(f64),
    CountWithStratification,
    PartitionMismatch {
        expected: usize,
        control: usize,
        treatment: usize,
    },
    RateOutOfRange(f64),
    ZeroSampleSize,
    CountExceedsSize {
        count: u64,
        size: u64,
    },
    ZeroVariance,
    ZeroEffectSize,
    InvalidLiftRange(f64, f64),
}

impl Error for EngineError {}

impl Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::EmptyGroup => write!(f, "the input group is empty"),
            EngineError::InvalidControlFraction(x) => {
                write!(f, "control fraction {} is outside [0.10, 0.50]", x)
            }
            EngineError::CountWithStratification => {
                write!(
                    f,
                    "an absolute control size cannot be combined with stratification; use a fraction"
                )
            }
            EngineError::PartitionMismatch {
                expected,
                control,
                treatment,
            } => write!(
                f,
                "partition invariant violated: {} + {} != {}",
                control, treatment, expected
            ),
            EngineError::RateOutOfRange(x) => {
                write!(f, "rate {} is outside [0, 1]", x)
            }
            EngineError::ZeroSampleSize => write!(f, "sample size is zero"),
            EngineError::CountExceedsSize { count, size } => {
                write!(f, "positive count {} exceeds sample size {}", count, size)
            }
            EngineError::ZeroVariance => {
                write!(f, "pooled variance is zero, the z statistic is undefined")
            }
            EngineError::ZeroEffectSize => {
                write!(f, "the minimum detectable lift must be non-zero")
            }
            EngineError::InvalidLiftRange(lo, hi) => {
                write!(f, "lift range [{}, {}] is empty or reversed", lo, hi)
            }
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
