use crate::utils::error::WaveError;

/// Probe positions of a regular raster from `start` towards `end` (excluded),
/// `gpts` positions per axis. The y coordinate varies fastest.
pub fn grid_scan(start: [f64; 2], end: [f64; 2], gpts: [usize; 2]) -> Result<Vec<[f64; 2]>, WaveError> {
    if gpts.iter().any(|&n| n == 0) {
        return Err(WaveError::invalid("scan gpts", gpts));
    }
    if start.iter().chain(end.iter()).any(|v| !v.is_finite()) {
        return Err(WaveError::invalid("scan bounds", [start, end]));
    }

    let step = [0, 1].map(|i| (end[i] - start[i]) / gpts[i] as f64);

    let mut positions = Vec::with_capacity(gpts[0] * gpts[1]);
    for i in 0..gpts[0] {
        for j in 0..gpts[1] {
            positions.push([
                start[0] + i as f64 * step[0],
                start[1] + j as f64 * step[1],
            ]);
        }
    }
    Ok(positions)
}

#[test]
fn test_grid_scan_is_row_major_and_excludes_end() {
    let positions = grid_scan([0.0, 0.0], [4.0, 2.0], [2, 2]).unwrap();
    assert_eq!(
        positions,
        vec![[0.0, 0.0], [0.0, 1.0], [2.0, 0.0], [2.0, 1.0]]
    );
}

#[test]
fn test_grid_scan_rejects_empty_raster() {
    assert!(matches!(
        grid_scan([0.0, 0.0], [1.0, 1.0], [0, 3]),
        Err(WaveError::InvalidParameter { .. })
    ));
    assert!(grid_scan([0.0, f64::NAN], [1.0, 1.0], [2, 2]).is_err());
}
