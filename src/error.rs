//! Error types for motion-core.
//!
//! Provides unified error handling across configuration, kinematics, queueing,
//! homing and motion admission.

use core::fmt;

use crate::kinematics::Axis;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all motion-core operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration parsing or validation error
    Config(ConfigError),
    /// Target outside the machine envelope
    Kinematics(KinematicsError),
    /// Move queue admission error
    Queue(QueueError),
    /// Homing sequence error
    Homing(HomingError),
    /// Motion admission or machine state error
    Motion(MotionError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// Steps per millimeter must be > 0
    InvalidStepsPerUnit {
        /// Offending axis
        axis: Axis,
        /// Configured value
        value: f32,
    },
    /// Max feedrate must be > 0
    InvalidMaxFeedrate {
        /// Offending axis
        axis: Axis,
        /// Configured value
        value: f32,
    },
    /// Max acceleration must be > 0
    InvalidMaxAcceleration {
        /// Offending axis
        axis: Axis,
        /// Configured value
        value: f32,
    },
    /// Homing feedrate must be > 0
    InvalidHomingFeedrate {
        /// Offending axis
        axis: Axis,
        /// Configured value
        value: f32,
    },
    /// Axis travel range must satisfy min < max
    InvalidTravel {
        /// Offending axis
        axis: Axis,
        /// Minimum position
        min: f32,
        /// Maximum position
        max: f32,
    },
    /// Jerk budgets must be > 0
    InvalidJerk(f32),
    /// Queue capacity outside the supported range
    InvalidQueueCapacity(usize),
    /// Segments per second must be > 0
    InvalidSegmentsPerSecond(f32),
    /// Tick frequency must be >= the step doubling threshold
    InvalidTickFrequency {
        /// Configured tick frequency
        tick_hz: u32,
        /// Configured step doubler threshold
        doubler_hz: u32,
    },
    /// Distortion degrade heights must satisfy start < end
    InvalidDegradeHeights {
        /// Height where fading starts
        start: f32,
        /// Height where correction reaches zero
        end: f32,
    },
    /// Homing order string contains an unknown or misplaced token
    InvalidHomingOrder(char),
    /// Kinematics mode requires a section that is missing or invalid
    InvalidKinematics(&'static str),
    /// Retest reduction factor must be >= 1
    InvalidRetestFactor {
        /// Offending axis
        axis: Axis,
        /// Configured value
        value: f32,
    },
    /// Distortion grid edge outside the supported range
    InvalidGridPoints(usize),
    /// Leveling method needs more probe points than configured
    InvalidLevelingPoints(usize),
    /// Distortion grid area or value limit is empty
    InvalidDistortionGrid,
    /// Feedrate multiplier must be > 0
    InvalidFeedrateMultiplier(f32),
    /// Jam slowdown must be 1-100 percent
    InvalidJamSlowdown(u8),
    /// Homing travel factor must be >= 1
    InvalidMaxTravelFactor(f32),
    /// A required builder input was not provided
    MissingField(&'static str),
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError(heapless::String<128>),
}

/// Geometry errors raised before a move is queued.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KinematicsError {
    /// Target lies outside the physically reachable envelope.
    Unreachable {
        /// Target X in mm
        x: f32,
        /// Target Y in mm
        y: f32,
        /// Target Z in mm
        z: f32,
    },
    /// Actuator position does not fit the step counter.
    StepOverflow(Axis),
}

/// Move queue errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QueueError {
    /// Not enough free slots; back off and retry after the scheduler drains.
    Full {
        /// Slots the move needs
        needed: usize,
        /// Slots currently free
        free: usize,
    },
}

/// Homing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomingError {
    /// The endstop did not trigger within the maximum travel.
    EndstopNotFound {
        /// Axis that failed to home
        axis: Axis,
    },
    /// A homing session is already running.
    InProgress,
    /// Axis cannot be homed (no endstop configured).
    NoEndstop {
        /// Axis that was requested
        axis: Axis,
    },
    /// The session was aborted by an emergency stop.
    Aborted,
}

/// Motion admission errors.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionError {
    /// Move touches an axis that is not homed.
    AxisNotHomed {
        /// The unhomed axis
        axis: Axis,
    },
    /// Target exceeds the axis soft limits under the `Reject` policy.
    SoftLimit {
        /// Offending axis
        axis: Axis,
        /// Requested position in mm
        position: f32,
        /// Minimum position
        min: f32,
        /// Maximum position
        max: f32,
    },
    /// Emergency stop latched; a re-home is required.
    EmergencyStopped,
    /// Paused, door open or homing: new moves are not admitted.
    AdmissionClosed,
    /// Operation requires an idle machine.
    Busy,
    /// Requested feedrate must be > 0.
    InvalidFeedrate(f32),
    /// Flags reserved for moves the core issues itself.
    ReservedFlags,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Kinematics(e) => write!(f, "Kinematics error: {}", e),
            Error::Queue(e) => write!(f, "Queue error: {}", e),
            Error::Homing(e) => write!(f, "Homing error: {}", e),
            Error::Motion(e) => write!(f, "Motion error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::InvalidStepsPerUnit { axis, value } => {
                write!(f, "Invalid steps per mm for {}: {}. Must be > 0", axis, value)
            }
            ConfigError::InvalidMaxFeedrate { axis, value } => {
                write!(f, "Invalid max feedrate for {}: {}. Must be > 0", axis, value)
            }
            ConfigError::InvalidMaxAcceleration { axis, value } => {
                write!(f, "Invalid max acceleration for {}: {}. Must be > 0", axis, value)
            }
            ConfigError::InvalidHomingFeedrate { axis, value } => {
                write!(f, "Invalid homing feedrate for {}: {}. Must be > 0", axis, value)
            }
            ConfigError::InvalidTravel { axis, min, max } => {
                write!(f, "Invalid travel for {}: min ({}) must be < max ({})", axis, min, max)
            }
            ConfigError::InvalidJerk(v) => write!(f, "Invalid jerk: {}. Must be > 0", v),
            ConfigError::InvalidQueueCapacity(v) => {
                write!(
                    f,
                    "Invalid queue capacity: {}. Must be {}-{}",
                    v,
                    crate::motion::MIN_QUEUE_CAPACITY,
                    crate::motion::MAX_QUEUE_CAPACITY
                )
            }
            ConfigError::InvalidSegmentsPerSecond(v) => {
                write!(f, "Invalid segments per second: {}. Must be > 0", v)
            }
            ConfigError::InvalidTickFrequency { tick_hz, doubler_hz } => write!(
                f,
                "Tick frequency {} Hz must be >= step doubler frequency {} Hz",
                tick_hz, doubler_hz
            ),
            ConfigError::InvalidDegradeHeights { start, end } => {
                write!(f, "Invalid degrade heights: start ({}) must be < end ({})", start, end)
            }
            ConfigError::InvalidHomingOrder(c) => write!(f, "Invalid homing order token '{}'", c),
            ConfigError::InvalidKinematics(msg) => write!(f, "Invalid kinematics: {}", msg),
            ConfigError::InvalidRetestFactor { axis, value } => {
                write!(f, "Invalid retest factor for {}: {}. Must be >= 1", axis, value)
            }
            ConfigError::InvalidGridPoints(v) => write!(
                f,
                "Invalid distortion grid size: {}. Must be 2-{}",
                v,
                crate::config::MAX_GRID_POINTS
            ),
            ConfigError::InvalidLevelingPoints(v) => {
                write!(f, "Too few probe points for the leveling method: {}", v)
            }
            ConfigError::InvalidDistortionGrid => {
                write!(f, "Invalid distortion grid: area and value limit must be non-empty")
            }
            ConfigError::InvalidFeedrateMultiplier(v) => {
                write!(f, "Invalid feedrate multiplier: {}. Must be > 0", v)
            }
            ConfigError::InvalidJamSlowdown(v) => {
                write!(f, "Invalid jam slowdown: {}%. Must be 1-100", v)
            }
            ConfigError::InvalidMaxTravelFactor(v) => {
                write!(f, "Invalid homing travel factor: {}. Must be >= 1", v)
            }
            ConfigError::MissingField(name) => write!(f, "{} is required", name),
            #[cfg(feature = "std")]
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for KinematicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KinematicsError::Unreachable { x, y, z } => {
                write!(f, "Position ({}, {}, {}) is unreachable", x, y, z)
            }
            KinematicsError::StepOverflow(axis) => {
                write!(f, "Step position overflow on axis {}", axis)
            }
        }
    }
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Full { needed, free } => {
                write!(f, "Move queue full: need {} slots, {} free", needed, free)
            }
        }
    }
}

impl fmt::Display for HomingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HomingError::EndstopNotFound { axis } => {
                write!(f, "Endstop for axis {} not found within max travel", axis)
            }
            HomingError::InProgress => write!(f, "Homing already in progress"),
            HomingError::NoEndstop { axis } => write!(f, "Axis {} has no endstop", axis),
            HomingError::Aborted => write!(f, "Homing aborted"),
        }
    }
}

impl fmt::Display for MotionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionError::AxisNotHomed { axis } => write!(f, "Axis {} is not homed", axis),
            MotionError::SoftLimit { axis, position, min, max } => write!(
                f,
                "Axis {} target {} exceeds soft limits [{}, {}]",
                axis, position, min, max
            ),
            MotionError::EmergencyStopped => {
                write!(f, "Emergency stop active, re-home required")
            }
            MotionError::AdmissionClosed => write!(f, "New moves are not admitted"),
            MotionError::Busy => write!(f, "Machine is busy"),
            MotionError::InvalidFeedrate(v) => write!(f, "Invalid feedrate: {}", v),
            MotionError::ReservedFlags => write!(f, "Homing moves are issued by the core only"),
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<KinematicsError> for Error {
    fn from(e: KinematicsError) -> Self {
        Error::Kinematics(e)
    }
}

impl From<QueueError> for Error {
    fn from(e: QueueError) -> Self {
        Error::Queue(e)
    }
}

impl From<HomingError> for Error {
    fn from(e: HomingError) -> Self {
        Error::Homing(e)
    }
}

impl From<MotionError> for Error {
    fn from(e: MotionError) -> Self {
        Error::Motion(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for KinematicsError {}

#[cfg(feature = "std")]
impl std::error::Error for QueueError {}

#[cfg(feature = "std")]
impl std::error::Error for HomingError {}

#[cfg(feature = "std")]
impl std::error::Error for MotionError {}
