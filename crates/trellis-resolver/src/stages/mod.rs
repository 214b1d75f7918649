//! Built-in pipeline stages.
//!
//! External tools contribute their own stages through
//! [`PluginPipeline::register`](crate::PluginPipeline::register); the
//! stages here ship with the resolver itself.

pub mod resolved;

pub use resolved::ResolvedStage;
