#![no_main]
use feedlint_core::parse_csv_table;
use feedlint_model::{StopTime, Trip};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Malformed tables must surface as errors, never panics.
    if let Ok(table) = parse_csv_table::<StopTime>("stop_times.txt", data) {
        assert_eq!(table.rows.len(), table.row_numbers.len());
    }
    let _ = parse_csv_table::<Trip>("trips.txt", data);
});
