mod bbox;
mod sjoin;
mod table;

pub use sjoin::{sjoin, JoinHow, JoinOptions, Predicate};
pub use table::{JoinRecord, JoinedTable};
