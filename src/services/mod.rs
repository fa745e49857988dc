//! Service modules for the photo restoration workflow

pub mod cleanup;
pub mod enhancement;
pub mod imaging;
pub mod openai_client;
pub mod replicate_client;
pub mod restoration;

pub use openai_client::{DamageLevel, OpenAiClient, OpenAiError, RestorationAnalysis};
pub use replicate_client::{ReplicateClient, ReplicateError};
pub use restoration::{HostedEnhancer, RemoteEnhancer, RestorationMode, RestorationPipeline};
