// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port addressing and the payloads that flow through ports.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a port within one direction of a node's port list
pub type PortIndex = usize;

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

impl PortDirection {
    /// The direction on the other end of a connection
    pub fn opposite(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }
}

/// Data type that can flow through ports
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// 4D vector
    Vector4,
    /// Color (RGBA)
    Color,
    /// String value
    String,
    /// Any type (for generic nodes)
    Any,
    /// Custom type
    Custom(String),
}

impl PortType {
    /// Check if this type can connect to another type
    pub fn can_connect_to(&self, other: &PortType) -> bool {
        if matches!(self, Self::Any) || matches!(other, Self::Any) {
            return true;
        }

        if self == other {
            return true;
        }

        // Implicit conversions
        match (self, other) {
            (Self::Int, Self::Float) | (Self::Float, Self::Int) => true,
            (Self::Float, Self::Vector2 | Self::Vector3 | Self::Vector4) => true,
            (Self::Vector2, Self::Vector3 | Self::Vector4) => true,
            (Self::Vector3, Self::Vector4) => true,
            (Self::Color, Self::Vector4) | (Self::Vector4, Self::Color) => true,
            _ => false,
        }
    }
}

/// Value carried from an output port to the inputs connected to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PortValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// 2D vector
    Vector2([f64; 2]),
    /// 3D vector
    Vector3([f64; 3]),
    /// 4D vector
    Vector4([f64; 4]),
    /// Color
    Color([f64; 4]),
    /// String
    String(String),
}

impl PortValue {
    /// Get the port type for this value
    pub fn port_type(&self) -> PortType {
        match self {
            Self::Bool(_) => PortType::Bool,
            Self::Int(_) => PortType::Int,
            Self::Float(_) => PortType::Float,
            Self::Vector2(_) => PortType::Vector2,
            Self::Vector3(_) => PortType::Vector3,
            Self::Vector4(_) => PortType::Vector4,
            Self::Color(_) => PortType::Color,
            Self::String(_) => PortType::String,
        }
    }

    /// Numeric view of scalar values
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }
}

impl fmt::Display for PortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Vector2([x, y]) => write!(f, "({x}, {y})"),
            Self::Vector3([x, y, z]) => write!(f, "({x}, {y}, {z})"),
            Self::Vector4([x, y, z, w]) | Self::Color([x, y, z, w]) => {
                write!(f, "({x}, {y}, {z}, {w})")
            }
            Self::String(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implicit_conversions() {
        assert!(PortType::Int.can_connect_to(&PortType::Float));
        assert!(PortType::Float.can_connect_to(&PortType::Vector3));
        assert!(PortType::Any.can_connect_to(&PortType::Custom("mesh".into())));
        assert!(!PortType::Vector3.can_connect_to(&PortType::Float));
        assert!(!PortType::String.can_connect_to(&PortType::Bool));
    }

    #[test]
    fn test_value_as_float() {
        assert_eq!(PortValue::Int(3).as_float(), Some(3.0));
        assert_eq!(PortValue::Bool(true).as_float(), Some(1.0));
        assert_eq!(PortValue::String("x".into()).as_float(), None);
        assert_eq!(PortValue::Float(2.5).port_type(), PortType::Float);
    }

    #[test]
    fn test_direction_opposite() {
        assert_eq!(PortDirection::Input.opposite(), PortDirection::Output);
        assert_eq!(PortDirection::Output.opposite(), PortDirection::Input);
    }
}
