#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = dim_config::load_toml(data) {
        if cfg.validate().is_ok() {
            // A valid config must also satisfy the core's own checks.
            let settings = dim_core::Settings::from(&cfg);
            assert!(settings.check().is_ok(), "validated config rejected by core");
        }
    }
});
