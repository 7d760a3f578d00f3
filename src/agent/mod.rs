pub mod dispatcher;

pub use dispatcher::{ToolCall, ToolDispatcher, ToolResponse};
