#![no_main]

use libfuzzer_sys::fuzz_target;
use minibatis::{ParsedTemplate, extract_placeholders, to_positional_sql};

fuzz_target!(|data: &[u8]| {
    if let Ok(template) = std::str::from_utf8(data) {
        let sql = to_positional_sql(template);
        let placeholders = extract_placeholders(template);

        // every placeholder becomes exactly one marker, numbered from 1
        for (i, p) in placeholders.iter().enumerate() {
            assert_eq!(p.index, i + 1);
        }
        assert!(sql.matches('?').count() >= placeholders.len());

        if let Ok(parsed) = ParsedTemplate::parse(template, "fuzz") {
            assert_eq!(parsed.positional_sql(), sql);
            assert_eq!(parsed.param_count(), placeholders.len());
        }
    }
});
