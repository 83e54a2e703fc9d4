pub mod error;
pub mod http_remote_client;

pub use error::RemoteError;
pub use http_remote_client::HttpRemoteClient;
