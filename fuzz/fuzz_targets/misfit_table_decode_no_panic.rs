// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

use libfuzzer_sys::fuzz_target;
use misfit_core::{BinaryBuffer, Chi2Matrix, Chi2Request, MisfitError, ObservationSource};
use misfit_table::MisfitTable;

struct NoObservations;

impl ObservationSource for NoObservations {
    fn observation_keys(&self) -> Vec<String> {
        Vec::new()
    }

    fn evaluate_chi2(
        &self,
        _request: &Chi2Request<'_>,
        _valid: &mut [bool],
        _out: &mut Chi2Matrix,
    ) -> Result<(), MisfitError> {
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let mut buffer = BinaryBuffer::from_bytes(data.to_vec());
    let Ok(table) = MisfitTable::buffer_fread_alloc(&mut buffer, &NoObservations) else {
        return;
    };

    let mut first = BinaryBuffer::new();
    if table.buffer_fwrite(&mut first).is_err() {
        return;
    }
    let first = first.into_bytes();
    let mut reader = BinaryBuffer::from_bytes(first.clone());
    let reloaded = MisfitTable::buffer_fread_alloc(&mut reader, &NoObservations)
        .expect("re-encoded table must decode");

    let mut second = BinaryBuffer::new();
    reloaded
        .buffer_fwrite(&mut second)
        .expect("reloaded table must encode");
    assert_eq!(second.as_bytes(), first.as_slice());
});
