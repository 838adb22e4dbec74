pub mod sqlite;
pub mod table;
pub mod traits;

pub use sqlite::SqliteSink;
pub use table::TableLoader;
pub use traits::{Destination, LoadReport, TableRef, TableSink};
