//! Bluetooth Module
//!
//! Provides the BLE side of the bridge.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       BleSession                         │
//! │   (Discover → Connect → Subscribe → write commands)      │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼──────────────┐
//!         │             │              │
//!         ▼             ▼              ▼
//! ┌─────────────┐ ┌──────────────┐ ┌──────────┐
//! │  Transport  │ │ Notification │ │ Protocol │
//! │             │ │              │ │          │
//! │ - WinRT     │ │ - decode     │ │ - UUIDs  │
//! │ - btleplug  │ │ - forward    │ │ - codec  │
//! └─────────────┘ └──────────────┘ └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - UUIDs, wire codec and frame conversion
//! - [`transport`] - central/link traits implemented per platform
//! - [`notification`] - pose notification handler
//! - [`session`] - the session state machine

pub mod notification;
pub mod protocol;
pub mod session;
pub mod transport;

#[cfg(not(windows))]
pub mod btle;
#[cfg(test)]
pub mod mock;
#[cfg(windows)]
pub mod winrt;

#[cfg(not(windows))]
pub use btle::BtleCentral as PlatformCentral;
#[cfg(windows)]
pub use winrt::WinrtCentral as PlatformCentral;

pub use session::{BleSession, SessionConfig};
