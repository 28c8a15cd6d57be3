pub mod agent;
pub mod chain;
pub mod group;
pub mod image;
pub mod registry;
pub mod user_input;

pub use agent::{Agent, AgentBuilder};
pub use chain::{AgentChain, AgentChainBuilder};
pub use group::{AgentGroup, AgentGroupBuilder};
pub use image::{DynImageProvider, ImageAgent, ImageProvider};
pub use registry::AgentRoster;
pub use user_input::UserInputAgent;
