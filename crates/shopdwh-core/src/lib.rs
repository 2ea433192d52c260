pub mod clients;
pub mod config;
pub mod credentials;
pub mod error;
pub mod observer;
pub mod pipeline;
pub mod registry;
pub mod rowset;
pub mod table_ref;
pub mod transforms;

pub use clients::{ClientError, DestinationClient, LoadAck, SourceClient};
pub use credentials::Credentials;
pub use error::{PipelineError, Result};
pub use pipeline::{DestinationEndpoint, Pipeline, SourceEndpoint, Stage};
pub use registry::{registry, DestinationTable, TransformRegistry};
pub use table_ref::TableRef;
