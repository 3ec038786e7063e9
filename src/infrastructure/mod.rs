pub mod bluetooth;
pub mod host;
pub mod logging;
pub mod shutdown;
