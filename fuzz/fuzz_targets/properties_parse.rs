#![no_main]

use libfuzzer_sys::fuzz_target;
use minibatis::DataSourceConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(config) = DataSourceConfig::from_properties(text) {
            assert!(config.pool.validate().is_ok());
            let _ = config.connect_options();
        }
    }
});
