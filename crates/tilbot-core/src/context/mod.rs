mod builder;

pub use builder::{compose_prompt, ContextBuilder};
