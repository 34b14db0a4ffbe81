#![no_main]
use libfuzzer_sys::fuzz_target;
use spotcheck_core::{PaddedCell, PaddedCellType};
use std::path::Path;

// Maps input bytes to a step that permutes a small state space, so every
// orbit converges, cycles or diverges within the bound.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let table: Vec<u8> = data[1..].iter().take(16).map(|b| b % 16).collect();
    let start = (data[0] % 16).to_string();
    let bound = 2 + (data[0] as usize % 12);

    let result = PaddedCell::check_with(Path::new("fuzz"), &start, bound, |input| {
        let n: usize = input.parse().unwrap_or(0);
        Ok(table.get(n).copied().unwrap_or(0).to_string())
    });
    let Ok(cell) = result else {
        return;
    };
    match cell.kind() {
        PaddedCellType::Diverge => assert!(cell.canonical().is_err()),
        PaddedCellType::Converge | PaddedCellType::Cycle => {
            let canonical = cell.canonical().map(str::to_string);
            assert!(canonical.is_ok());
            assert!(cell.steps().iter().any(|s| Some(s) == canonical.as_ref().ok()));
        }
    }
});
