pub mod coordinator;
pub mod dispatcher;
pub mod safety;
pub mod text_input;

pub use dispatcher::{ActionExecutor, ActionOutcome, ExecutorTiming};
