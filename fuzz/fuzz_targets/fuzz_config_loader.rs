#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // TOML parsing and validation of arbitrary input must never panic;
    // parse errors and validation rejections are both fine.
    match toml::from_str::<heimdall_config::Config>(data) {
        Ok(cfg) => {
            let _ = cfg.validate();
            let _ = cfg.far_sentinel_cm();
        }
        Err(_e) => {
            // parse error is acceptable
        }
    }
});
