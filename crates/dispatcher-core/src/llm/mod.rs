//! In-process local model access and remote generation model access.

pub mod local;
pub mod remote;

pub use local::LocalModelClient;
pub use remote::RemoteModelClient;
