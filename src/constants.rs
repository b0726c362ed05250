//! Calibration constants used throughout the decision pipeline.
//!
//! These values were tuned by hand against recorded sessions. They are data,
//! not logic: keep them exactly as they are.

/// Number of tracked body joints
pub const NUM_JOINTS: usize = 13;

/// Number of raw kinematic features per frame
pub const NUM_RAW_FEATURES: usize = 16;

/// Number of engineered features per frame
pub const NUM_ENHANCED_FEATURES: usize = 24;

/// Number of velocity features in the raw vector
pub const NUM_VELOCITIES: usize = 11;

/// Index of the first velocity in the raw vector
pub const VELOCITY_OFFSET: usize = 5;

/// History capacities
pub const POSITION_HISTORY_CAPACITY: usize = 5;
pub const BODY_SCALE_HISTORY_CAPACITY: usize = 10;
pub const FEATURE_WINDOW_CAPACITY: usize = 30;
pub const PREDICTION_HISTORY_CAPACITY: usize = 5;
pub const MOTION_HISTORY_CAPACITY: usize = 30;

/// Angle returned when a ray has zero length
pub const DEGENERATE_ANGLE: f64 = 180.0;

/// Defaults for joints that are not visible
pub const DEFAULT_KNEE_ANGLE: f64 = 175.0;
pub const DEFAULT_HIP_ANGLE: f64 = 170.0;
pub const DEFAULT_TRUNK_INCLINATION: f64 = 0.0;
pub const DEFAULT_BODY_SCALE: f64 = 0.5;

/// Scale trend
pub const SCALE_TREND_SAMPLES: usize = 5;
pub const SCALE_TREND_SLOPE: f64 = 0.002;

/// Static filter
pub const STATIC_MEAN_VELOCITY: f64 = 0.008;
pub const STATIC_MAX_VELOCITY: f64 = 0.025;
pub const MOTIONLESS_CONFIDENCE: f64 = 0.95;

/// Walking criterion
pub const WALKING_MEAN_VELOCITY: f64 = 0.015;
pub const WALKING_LEG_VELOCITY: f64 = 0.02;
pub const WALKING_MAX_VELOCITY: f64 = 0.3;
/// Raw feature indices averaged as "leg velocity"
pub const LEG_VELOCITY_INDICES: [usize; 4] = [9, 10, 11, 12];

/// Squat detection (partial tier)
pub const SQUAT_PARTIAL_KNEE: f64 = 145.0;
pub const SQUAT_PARTIAL_HIP: f64 = 150.0;
pub const SQUAT_PARTIAL_ASYMMETRY: f64 = 40.0;
pub const SQUAT_STANDING_KNEE: f64 = 160.0;

/// Squat detection (clear tier)
pub const SQUAT_CLEAR_KNEE: f64 = 130.0;
pub const SQUAT_CLEAR_HIP: f64 = 130.0;
pub const SQUAT_CLEAR_ASYMMETRY: f64 = 30.0;

/// Squat override
pub const SQUAT_PROMOTE_BELOW: f64 = 0.65;
pub const SQUAT_PROMOTED_CONFIDENCE: f64 = 0.78;
pub const SQUAT_FORCED_CONFIDENCE: f64 = 0.75;

/// Generic bend gate
pub const BEND_TRUNK_INCLINATION: f64 = 12.0;
pub const BEND_HIP_ANGLE: f64 = 155.0;
pub const BEND_HIP_ASYMMETRY: f64 = 15.0;

/// Forward bend
pub const FORWARD_BEND_HIP: f64 = 140.0;
pub const FORWARD_BEND_TRUNK: f64 = 15.0;
pub const FORWARD_BEND_KNEE_ASYMMETRY: f64 = 35.0;
pub const FORWARD_BEND_CONFIDENCE: f64 = 0.80;

/// Lateral bend
pub const LATERAL_BEND_ASYMMETRY: f64 = 15.0;
pub const LATERAL_DIRECTION_MARGIN: f64 = 10.0;
pub const LATERAL_BEND_CONFIDENCE: f64 = 0.75;

/// Slight bend
pub const SLIGHT_BEND_TRUNK: f64 = 12.0;
pub const SLIGHT_BEND_HIP: f64 = 155.0;
pub const SLIGHT_BEND_CONFIDENCE: f64 = 0.65;

/// Bend override promotion limits
pub const BEND_PROMOTE_BELOW: f64 = 0.65;
pub const SLIGHT_BEND_PROMOTE_BELOW: f64 = 0.60;

/// Confidence-gap filter
pub const CONFIDENCE_GAP: f64 = 0.03;
pub const CONFIDENCE_GAP_TOP: f64 = 0.5;

/// Anti-bias filter
pub const ANTI_BIAS_CONFIDENCE: f64 = 0.4;

/// Temporal smoothing
pub const SMOOTHING_WINDOW: usize = 3;
pub const SMOOTHING_CONFIDENCE: f64 = 0.6;

/// Confidence floor
pub const CONFIDENCE_FLOOR: f64 = 0.2;

/// Left/right velocity ratio guard
pub const VELOCITY_RATIO_EPSILON: f64 = 0.001;

/// Fallback standardisation guard when no scaler is supplied
pub const BASIC_NORMALIZATION_EPSILON: f64 = 1e-8;

/// Motion level bucket edges on the combined score
pub const MOTION_LEVEL_STATIC: f64 = 1.0;
pub const MOTION_LEVEL_MINIMAL: f64 = 3.0;
pub const MOTION_LEVEL_MODERATE: f64 = 8.0;
/// Divisor applied to the frame difference percentage in the combined score
pub const MOTION_PERCENT_DIVISOR: f64 = 10.0;

/// Average flow magnitude above which flow counts as detected
pub const FLOW_DETECTED_MAGNITUDE: f64 = 1.0;

/// Number of motion samples used for the trailing trend
pub const MOTION_TREND_WINDOW: usize = 10;

/// Validation thresholds
pub const WALKING_MIN_FLOW: f64 = 2.0;
pub const SQUAT_MIN_LOWER_BODY_MOTION: f64 = 10.0;
pub const MIN_CONFIDENCE_ADJUSTMENT: f64 = 0.5;

/// Guard on the upper/lower body motion ratio
pub const REGION_RATIO_EPSILON: f64 = 1e-6;
