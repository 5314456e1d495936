//! Fuzz target: deserialize arbitrary input as a `DriverConfig` from TOML.
//! Uses lossy UTF-8 conversion since config files are text-based.
//! Must not panic regardless of input.

#![no_main]

use libfuzzer_sys::fuzz_target;

use courier::config::DriverConfig;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    if let Ok(config) = toml::from_str::<DriverConfig>(&text) {
        let _ = config.reply_retrier();
    }
});
