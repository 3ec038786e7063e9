//! Picomni Rover Protocol
//!
//! The rover exposes one characteristic. It notifies pose updates and
//! accepts velocity writes, both as the same 12-byte frame:
//!
//! ```text
//! [0-3]   : a (f32 little-endian)
//! [4-7]   : b (f32 little-endian)
//! [8-11]  : c (f32 little-endian)
//! ```
//!
//! Pose notifications carry `(x, y, yaw)` in the rover frame (x right,
//! y forward). Velocity writes carry `(-linear_y, linear_x, angular_z)`,
//! i.e. the host command (x forward, y left) rotated into the rover frame.

use crate::domain::models::{Command, DevicePose, HostPose, Point, Quaternion};
use thiserror::Error;
use uuid::Uuid;

/// Rover BLE Service UUID, advertised by the peripheral
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x69321c59_8017_488e_b5e2_b6d30c834bc5);

/// Pose notify / velocity write characteristic UUID
pub const CHAR_UUID: Uuid = Uuid::from_u128(0x87bc2dc5_2207_408d_99f6_3d35573c4472);

/// Size of every frame in either direction
pub const FRAME_LEN: usize = 12;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid packet size: {actual} (expected {expected})")]
    BadLength { expected: usize, actual: usize },
}

/// Encode a host-frame command as a rover-frame velocity write
pub fn encode_command(command: &Command) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[0..4].copy_from_slice(&(-command.linear_y).to_le_bytes());
    frame[4..8].copy_from_slice(&command.linear_x.to_le_bytes());
    frame[8..12].copy_from_slice(&command.angular_z.to_le_bytes());
    frame
}

/// Parse a pose notification, still in the rover frame
pub fn decode_pose(bytes: &[u8]) -> Result<DevicePose, DecodeError> {
    if bytes.len() != FRAME_LEN {
        return Err(DecodeError::BadLength {
            expected: FRAME_LEN,
            actual: bytes.len(),
        });
    }

    let x = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let y = f32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let yaw = f32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);

    Ok(DevicePose { x, y, yaw })
}

/// Rover frame (x right, y forward) to host frame (x forward, y left)
pub fn pose_to_host(pose: &DevicePose) -> HostPose {
    HostPose {
        position: Point {
            x: pose.y as f64,
            y: -pose.x as f64,
            z: 0.0,
        },
        orientation: Quaternion::from_yaw(pose.yaw as f64),
    }
}

/// Inverse of [`pose_to_host`]; yaw comes back in `(-π, π]`
#[cfg(test)]
pub fn host_to_device(pose: &HostPose) -> DevicePose {
    DevicePose {
        x: -pose.position.y as f32,
        y: pose.position.x as f32,
        yaw: pose.orientation.yaw() as f32,
    }
}
