pub mod dispatcher;
pub mod transport;
pub mod types;

pub use dispatcher::{ExecutorSettings, MlExecutor};
pub use transport::{HttpReply, ReqwestTransport, Transport};
pub use types::{DispatchResult, EndpointRegistry, ExecutionMode, Operation, RetryPolicy};
