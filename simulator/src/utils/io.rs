use ndarray::{ArrayBase, ArrayD, Data, Dimension, Zip};
use ndarray_npy::{read_npy, write_npy, WritableElement};
use num::complex::Complex64;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

use super::{error::WaveError, grid::Grid};
use crate::{energy::Energy, waves::WaveField, waves::Waves};

/// Everything besides the array needed to rebuild waves from disk
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct WaveMetadata {
    pub energy: f64,
    pub extent: [f64; 2],
    pub shape: Vec<usize>,
}

/// Writes `waves` as `{base}_real.npy`, `{base}_imag.npy` and `{base}_meta.toml`.
/// The real and imaginary parts are written in parallel.
pub fn dump_waves<S>(waves: &WaveField<S>, base: &str) -> Result<(), WaveError>
where
    S: Data<Elem = Complex64>,
{
    let timer = Instant::now();
    create_parent(base)?;

    let real = waves.array().mapv(|z| z.re);
    let imag = waves.array().mapv(|z| z.im);
    let real_path = format!("{base}_real.npy");
    let imag_path = format!("{base}_imag.npy");

    std::thread::scope(|scope| {
        let real_handle = scope.spawn(|| array_to_disk(&real_path, &real));
        let imag_handle = scope.spawn(|| array_to_disk(&imag_path, &imag));
        for handle in [real_handle, imag_handle] {
            handle
                .join()
                .map_err(|_| WaveError::MetadataError("npy writer thread panicked".to_string()))??;
        }
        Ok::<(), WaveError>(())
    })?;

    let metadata = WaveMetadata {
        energy: waves.energy().value(),
        extent: waves.extent(),
        shape: waves.array().shape().to_vec(),
    };
    let metadata =
        toml::to_string(&metadata).map_err(|err| WaveError::MetadataError(err.to_string()))?;
    std::fs::write(format!("{base}_meta.toml"), metadata)?;

    log::info!(
        "wrote waves of shape {:?} to {base} in {} ms",
        waves.array().shape(),
        timer.elapsed().as_millis()
    );
    Ok(())
}

/// Reads waves written by [`dump_waves`]
pub fn load_waves(base: &str) -> Result<Waves, WaveError> {
    let metadata = std::fs::read_to_string(format!("{base}_meta.toml"))?;
    let metadata: WaveMetadata =
        toml::from_str(&metadata).map_err(|err| WaveError::MetadataError(err.to_string()))?;

    let real: ArrayD<f64> = read_npy(format!("{base}_real.npy"))?;
    let imag: ArrayD<f64> = read_npy(format!("{base}_imag.npy"))?;
    for found in [real.shape(), imag.shape()] {
        if found != metadata.shape.as_slice() {
            return Err(WaveError::ShapeMismatch {
                expected: metadata.shape.clone(),
                found: found.to_vec(),
            });
        }
    }

    let array = Zip::from(&real)
        .and(&imag)
        .map_collect(|&re, &im| Complex64::new(re, im));
    let gpts = match metadata.shape.as_slice() {
        [.., nx, ny] => [*nx, *ny],
        _ => {
            return Err(WaveError::ShapeMismatch {
                expected: vec![1, 1],
                found: metadata.shape.clone(),
            })
        }
    };

    log::info!("loaded waves of shape {:?} from {base}", metadata.shape);
    Waves::with_grid(
        array,
        Grid::new(metadata.extent, gpts)?,
        Energy::new(metadata.energy)?,
    )
}

/// Writes any real array to `path` in npy format
pub fn array_to_disk<A, S, D>(path: &str, array: &ArrayBase<S, D>) -> Result<(), WaveError>
where
    A: WritableElement,
    S: Data<Elem = A>,
    D: Dimension,
{
    create_parent(path)?;
    write_npy(path, array)?;
    log::debug!("wrote {path}");
    Ok(())
}

fn create_parent(path: &str) -> Result<(), WaveError> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[test]
fn test_dump_and_load_waves() {
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;

    let array = Array3::from_shape_fn((2, 8, 6), |(b, i, j)| {
        Complex64::new(b as f64 + i as f64 * 0.5, j as f64 - 1.0)
    });
    let waves = Waves::new(array, [4.0, 3.0], 200e3).unwrap();

    let directory = std::env::temp_dir().join(format!("mslice-io-{}", std::process::id()));
    let base = directory.join("waves");
    let base = base.to_str().unwrap();

    dump_waves(&waves, base).unwrap();
    let loaded = load_waves(base).unwrap();

    assert_eq!(loaded.array().shape(), &[2, 8, 6]);
    assert_eq!(loaded.grid(), waves.grid());
    assert_eq!(loaded.energy(), waves.energy());
    assert_abs_diff_eq!(
        (loaded.array() - waves.array()).map(|z| z.norm()).sum(),
        0.0,
        epsilon = 1e-12
    );

    std::fs::remove_dir_all(directory).unwrap();
}

#[test]
fn test_load_missing_waves() {
    let base = std::env::temp_dir().join("mslice-io-missing/waves");
    assert!(matches!(
        load_waves(base.to_str().unwrap()),
        Err(WaveError::IOError(_))
    ));
}
