// Readflow Infrastructure - System Adapters
// Implements: CommandRunner, FileStore

pub mod object_store;
pub mod subprocess_runner;

pub use object_store::LocalObjectStore;
pub use subprocess_runner::SubprocessRunner;
