
pub use mock_remote::*;
