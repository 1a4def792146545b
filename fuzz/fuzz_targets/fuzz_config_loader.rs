#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = toml::from_str::<crane_config::Config>(data) {
        if cfg.validate().is_ok() {
            // Conversions into core types must not panic either.
            let _decider: crane_core::DeciderCfg = (&cfg.decider).into();
            let _bus: crane_core::BusCfg = (&cfg).into();
        }
    }
});
