//! Training infrastructure: boosting, coordinate descent and their shared
//! callbacks, logging and sampling.

mod callback;
pub mod gbdt;
mod linear;
mod logger;
mod sampling;

pub use callback::EarlyStopping;
pub use gbdt::{GainParams, GbdtParams, GbdtTrainer, GrowthStrategy, TrainingSummary};
pub use linear::{LinearModel, LinearParams, LinearTrainer};
pub use logger::{TrainingLogger, Verbosity};
pub use sampling::{ColumnSampler, RowSampler};
