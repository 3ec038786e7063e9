use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Velocity command in the host frame (x forward, y left, z yaw rate)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Command {
    pub linear_x: f32,
    pub linear_y: f32,
    pub angular_z: f32,
}

impl Command {
    pub const STOP: Command = Command {
        linear_x: 0.0,
        linear_y: 0.0,
        angular_z: 0.0,
    };

    pub fn new(linear_x: f32, linear_y: f32, angular_z: f32) -> Self {
        Self {
            linear_x,
            linear_y,
            angular_z,
        }
    }
}

/// Pose as reported by the rover, in its own frame (x right, y forward)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DevicePose {
    pub x: f32,
    pub y: f32,
    pub yaw: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Linear and angular velocity, shaped like `geometry_msgs/Twist`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Twist {
    #[serde(default)]
    pub linear: Vector3,
    #[serde(default)]
    pub angular: Vector3,
}

impl From<Twist> for Command {
    fn from(twist: Twist) -> Self {
        // Only the planar components reach the rover
        Command::new(
            twist.linear.x as f32,
            twist.linear.y as f32,
            twist.angular.z as f32,
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

impl Quaternion {
    /// Pure rotation of `yaw` radians about the vertical axis
    pub fn from_yaw(yaw: f64) -> Self {
        let half = yaw / 2.0;
        Self {
            x: 0.0,
            y: 0.0,
            z: half.sin(),
            w: half.cos(),
        }
    }

    /// Yaw angle in `(-π, π]`, assuming roll and pitch are zero
    #[cfg(test)]
    pub fn yaw(&self) -> f64 {
        let yaw = 2.0 * self.z.atan2(self.w);
        if yaw > std::f64::consts::PI {
            yaw - 2.0 * std::f64::consts::PI
        } else if yaw <= -std::f64::consts::PI {
            yaw + 2.0 * std::f64::consts::PI
        } else {
            yaw
        }
    }
}

/// Pose in the host reference frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HostPose {
    pub position: Point,
    pub orientation: Quaternion,
}

/// Wall-clock timestamp, shaped like `builtin_interfaces/Time`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Time {
    pub sec: i32,
    pub nanosec: u32,
}

impl Time {
    pub fn now() -> Self {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            sec: elapsed.as_secs() as i32,
            nanosec: elapsed.subsec_nanos(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub stamp: Time,
    pub frame_id: String,
}

/// Outbound pose message, shaped like `geometry_msgs/PoseStamped`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseStamped {
    pub header: Header,
    pub pose: HostPose,
}

/// Lifecycle of a BLE session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Discovering,
    Connecting,
    Subscribing,
    Active,
    Terminated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twist_to_command_keeps_planar_components() {
        let twist = Twist {
            linear: Vector3 {
                x: 0.4,
                y: -0.2,
                z: 9.0,
            },
            angular: Vector3 {
                x: 1.0,
                y: 2.0,
                z: 0.75,
            },
        };
        assert_eq!(Command::from(twist), Command::new(0.4, -0.2, 0.75));
    }

    #[test]
    fn test_quaternion_yaw_wraps_into_half_open_range() {
        let q = Quaternion::from_yaw(std::f64::consts::PI);
        assert!((q.yaw() - std::f64::consts::PI).abs() < 1e-9);

        let q = Quaternion::from_yaw(-std::f64::consts::FRAC_PI_2);
        assert!((q.yaw() + std::f64::consts::FRAC_PI_2).abs() < 1e-9);

        let q = Quaternion::from_yaw(3.0 * std::f64::consts::FRAC_PI_2);
        assert!((q.yaw() + std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn test_twist_deserializes_with_missing_fields() {
        let twist: Twist = serde_json::from_str(r#"{"linear":{"x":1.0,"y":0.0,"z":0.0}}"#)
            .unwrap();
        assert_eq!(twist.linear.x, 1.0);
        assert_eq!(twist.angular, Vector3::default());
    }
}
