pub mod ancestry;
pub mod collect;
pub mod config;
pub mod error;
pub mod http;
pub mod member;
pub mod model;
pub mod output;
pub mod pab;
pub mod privesc;
pub mod processor;
pub mod registry;
pub mod roles;
pub mod store;
pub mod uri;

pub use config::{Mode, ProcessorConfig};
pub use error::Error;
pub use output::AnalysisOutput;
pub use processor::{HierarchyProcessor, ServiceClients};
