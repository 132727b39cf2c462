mod completion;
mod console;
mod orchestrator;
mod paths;
mod resolver;
mod store;

pub use completion::{CompletionProtocol, CompletionReport};
pub use console::{Console, MenuKey};
pub use orchestrator::{
    OperationOrchestrator, OperationReport, SessionOutcome, CACHE_VOLUME, DATA_VOLUME,
};
pub use paths::SessionPaths;
pub use resolver::{ArgumentResolver, ArgumentSource, ResolvedCommand};
pub use store::{ControlBlockStore, FileControlBlockStore};
