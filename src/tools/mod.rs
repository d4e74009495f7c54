//! Tool system: registries, in-process tools, and the dispatcher.

pub mod arguments;
pub mod dispatcher;
pub mod registry;
pub mod tool;
pub mod types;

pub use arguments::ToolArguments;
pub use dispatcher::{is_success, ToolDispatcher, ToolExecutionResult, ERROR_MARKER};
pub use registry::{LocalToolRegistry, ToolRegistry};
pub use tool::{FnTool, Tool};
pub use types::ToolParameters;
