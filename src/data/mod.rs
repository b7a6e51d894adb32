//! Raw data: schema constants, the columnar [`Frame`], typed records,
//! CSV loading and seeded splits.

mod frame;
mod loader;
mod record;
pub mod schema;
mod split;

pub use frame::{CellKey, Column, Frame};
pub use loader::{load_csv, read_csv};
pub use record::{records_to_frame, PropertyRecord};
pub use split::{holdout_split, KFold};
