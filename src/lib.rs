// vnvram - Pool allocator and virtual NVRAM
// Board-support core for a wireless SoC with no general-purpose heap

#![warn(rust_2018_idioms)]

pub mod config;
pub mod nvram;
pub mod platform;
pub mod pool;
pub mod transport;

// Re-exports for convenience
pub use crate::config::PlatformConfig;
pub use nvram::VirtualNvram;
pub use platform::bring_up;
pub use pool::{PoolAllocator, PoolClass};
pub use transport::{HostLink, HostTransport};

/// vnvram error types
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum Error {
        #[error("Invalid argument: {0}")]
        InvalidArgument(String),

        #[error("Not found: key 0x{0:04x}")]
        NotFound(u16),

        #[error("Buffer too small: {required} bytes needed, {capacity} available")]
        TooSmall { required: usize, capacity: usize },

        #[error("No memory: no free block for {0} bytes")]
        NoMemory(usize),

        #[error("Initialization failure: {0}")]
        InitializationFailure(String),

        #[error("Decode error: {0}")]
        Decode(String),

        #[error("Transport error: {0}")]
        Transport(String),

        #[error("Configuration error: {0}")]
        Config(String),
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::error::Error;

    #[test]
    fn test_error_messages() {
        assert_eq!(Error::NotFound(0x1f).to_string(), "Not found: key 0x001f");
        assert_eq!(
            Error::TooSmall {
                required: 5,
                capacity: 3
            }
            .to_string(),
            "Buffer too small: 5 bytes needed, 3 available"
        );
    }
}
