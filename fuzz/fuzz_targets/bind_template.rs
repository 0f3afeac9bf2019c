#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use minibatis::{MappingEntry, ParamMap, Params};

#[derive(Debug, Arbitrary)]
struct Input {
    template: String,
    params: Vec<(String, i64)>,
    snake_case: bool,
}

fuzz_target!(|input: Input| {
    let Ok(entry) = MappingEntry::new("fuzz.statement", input.template) else {
        return;
    };
    let entry = entry.snake_case_identifiers(input.snake_case);

    let map: ParamMap = input.params.into_iter().collect();
    if let Ok(bound) = entry.bind(&Params::from(map)) {
        assert_eq!(bound.params().len(), entry.parsed().param_count());
    }
});
