/// Database Module
///
/// The driver core, organized into focused submodules:
/// - **Connection** (`connection.rs`): owns the SQLite session and creates commands
/// - **Command** (`command.rs`): binds parameters and executes in reader or non-query mode
/// - **Reader** (`reader.rs`): forward-only cursor over result rows
/// - **Values** (`value.rs`): bind/row values and typecasting
/// - **Query text** (`query.rs`): statement classification and log rendering
///
/// All operations return the crate-wide `Result` with `DoError`.
pub mod command;
pub mod connection;
pub mod query;
pub mod reader;
pub mod value;

pub use command::*;
pub use connection::*;
pub use query::*;
pub use reader::*;
pub use value::*;
