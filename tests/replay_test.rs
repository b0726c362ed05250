//! Headless replay of recorded joint sequences

mod test_helpers;

use activity_recognition::{
    app::{load_joint_sequence, AppConfig, ReplayApp},
    decision_engine::ActivityLabel,
    joints::JointFrame,
    Result,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use test_helpers::{flexed_pose, mock_engine};

fn write_sequence(dir: &Path, name: &str, frames: &[Option<JointFrame>]) -> Result<PathBuf> {
    let path = dir.join(name);
    let yaml = serde_yaml::to_string(frames)
        .map_err(|e| activity_recognition::Error::InvalidInput(e.to_string()))?;
    std::fs::write(&path, yaml)?;
    Ok(path)
}

#[test]
fn test_replay_without_video() -> Result<()> {
    let mut frames: Vec<Option<JointFrame>> = (0..40)
        .map(|i| {
            let wave = if i % 2 == 0 { 0.05 } else { -0.05 };
            Some(flexed_pose(175.0, wave))
        })
        .collect();
    frames[35] = None;
    let temp_dir = TempDir::new()?;
    let path = write_sequence(temp_dir.path(), "sequence.yaml", &frames)?;

    let engine = mock_engine(&[("stand", 0.7), ("walk", 0.2), ("sit", 0.1)])?;
    let config = AppConfig {
        joints_path: path,
        video_path: None,
        display: false,
    };
    let mut app = ReplayApp::new(config, engine)?;
    let summary = app.run()?;

    assert_eq!(summary.frames(), 40);
    assert!(matches!(summary.predictions[0].label, ActivityLabel::Initializing { remaining: 29 }));
    assert_eq!(summary.predictions[30].label.to_string(), "stand");
    assert_eq!(summary.predictions[35].label, ActivityLabel::Idle);
    // Nothing is validated without video
    assert_eq!(summary.stats.total, 0);
    Ok(())
}

#[test]
fn test_load_joint_sequence_roundtrip() -> Result<()> {
    let frames = vec![Some(flexed_pose(120.0, 0.0)), None, Some(JointFrame::new())];
    let temp_dir = TempDir::new()?;
    let path = write_sequence(temp_dir.path(), "roundtrip.yaml", &frames)?;

    let loaded = load_joint_sequence(&path)?;

    assert_eq!(loaded.len(), 3);
    assert!(loaded[1].is_none());
    assert_eq!(loaded[0].as_ref().map(JointFrame::len), Some(13));
    Ok(())
}

#[test]
fn test_invalid_sequence_is_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("invalid.yaml");
    std::fs::write(&path, "not: [a, joint, list")?;

    assert!(load_joint_sequence(&path).is_err());
    Ok(())
}
