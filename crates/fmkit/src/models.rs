//! These models represent the objects passed around by the agent
//!
//! There are two related formats we need to interact with:
//! - chat-completion messages/tools, sent from the agent to the model endpoint
//! - tool requests and results, passed between the agent loop and the tool registry
//!
//! We always immediately convert the wire format into the internal structs using the
//! helpers in [`crate::providers::utils`], so the loop never handles raw JSON.
pub mod message;
pub mod role;
pub mod tool;
