#![no_main]
use dim_traits::DimensionEstimate;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|samples: Vec<(i32, i32, i32)>| {
    let samples: Vec<DimensionEstimate> = samples
        .into_iter()
        .map(|(l, w, h)| DimensionEstimate::new(l, w, h))
        .collect();
    match dim_core::aggregate(&samples) {
        None => assert!(samples.is_empty()),
        Some(out) => {
            assert!(samples.iter().any(|s| s.length_mm == out.length_mm));
            assert!(samples.iter().any(|s| s.width_mm == out.width_mm));
            assert!(samples.iter().any(|s| s.height_mm == out.height_mm));
        }
    }
});
