use dim_config::load_toml;
use rstest::rstest;

const VALID: &str = r#"
[work_area]
floor_depth_mm = 1805
min_object_height_mm = 15
use_color_mask = true
color_mask = [[0.2, 0.2], [0.2, 0.8], [0.8, 0.8], [0.8, 0.2]]
use_depth_mask = true
enable_dm = true
enable_perspective_dm = false
enable_rgb = true
range_meter_correction_mm = -12

[algorithm]
sample_count = 3
require_barcode = true
weight_units = "kg"
enable_auto_timer = true
time_to_start_ms = 1500
enable_pallet_subtraction = true
pallet_weight_gr = 21000.0
pallet_height_mm = 144

[timeouts]
sample_ms = 3000
supervisor_tick_ms = 200

[general]
photos_dir = "photos"
counter_file = "counters.txt"
"#;

#[test]
fn accepts_complete_config() {
    let cfg = load_toml(VALID).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.algorithm.sample_count, 3);
    assert_eq!(cfg.work_area.range_meter_correction_mm, -12);
    assert!(!cfg.work_area.enable_perspective_dm);
}

#[test]
fn accepts_sample_timeout_alias() {
    let cfg = load_toml("[timeouts]\nsample_timeout_ms = 750\n").expect("parse TOML");
    assert_eq!(cfg.timeouts.sample_ms, 750);
}

#[rstest]
#[case("[algorithm]\nsample_count = 0\n", "sample_count must be >= 1")]
#[case("[work_area]\nfloor_depth_mm = 0\n", "floor_depth_mm must be > 0")]
#[case(
    "[work_area]\nfloor_depth_mm = 100\nmin_object_height_mm = 100\n",
    "min_object_height_mm must be in"
)]
#[case("[timeouts]\nsample_ms = 0\n", "sample_ms must be >= 1")]
#[case("[timeouts]\nsupervisor_tick_ms = 0\n", "supervisor_tick_ms must be >= 1")]
#[case(
    "[algorithm]\nenable_auto_timer = true\ntime_to_start_ms = 0\n",
    "time_to_start_ms must be >= 1"
)]
#[case("[algorithm]\npallet_height_mm = -1\n", "pallet_height_mm must be >= 0")]
#[case(
    "[work_area]\ncolor_mask = [[0.1, 0.1], [0.9, 0.9]]\n",
    "color_mask needs at least 3 points"
)]
#[case(
    "[work_area]\ndepth_mask = [[0.1, 0.1], [1.5, 0.9], [0.2, 0.2]]\n",
    "depth_mask coordinates must be in"
)]
#[case("[hardware]\nframe_rate_hz = 0\n", "frame_rate_hz must be > 0")]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(needle),
        "expected '{needle}', got: {err}"
    );
}

#[test]
fn zero_auto_start_delay_is_fine_when_timer_disabled() {
    let cfg = load_toml("[algorithm]\nenable_auto_timer = false\ntime_to_start_ms = 0\n")
        .expect("parse TOML");
    cfg.validate().expect("disabled timer ignores delay");
}
