///! Member directory module
///!
///! Parses the member list CSV into records and keeps them as an
///! immutable in-memory directory.

pub mod types;
pub mod parser;
pub mod directory;

pub use types::{ColumnMap, MemberRecord, SchemaVersion};
pub use parser::{MemberParser, split_fields};
pub use directory::Directory;
