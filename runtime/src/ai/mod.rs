pub mod generator;
pub mod prompts;
pub mod responses;

pub use generator::{GenerationRequest, TextGenerator};
pub use responses::ResponsesClient;
