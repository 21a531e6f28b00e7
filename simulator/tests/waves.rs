use approx::assert_abs_diff_eq;
use mslice_simulator::{Energy, Grid, PlaneWave, Probe, WaveBuilder, WaveError, Waves};
use ndarray::{Array2, Array4};
use num::complex::Complex64;

#[test]
fn test_sampling_over_many_grids() {
    for gpts in [1usize, 7, 64, 100, 513] {
        for extent in [0.3, 1.0, 10.0, 123.456] {
            let grid = Grid::new(extent, gpts).unwrap();
            for axis in 0..2 {
                assert_abs_diff_eq!(
                    grid.sampling()[axis] * gpts as f64,
                    extent,
                    epsilon = 1e-10
                );
            }
        }
    }
}

#[test]
fn test_plane_wave_512() {
    let grid = Grid::new(10.0, 512usize).unwrap();
    let waves = PlaneWave::new(grid, Energy::new(300e3).unwrap())
        .build()
        .unwrap();

    assert_eq!(waves.gpts(), [512, 512]);
    assert!(waves
        .array()
        .iter()
        .all(|z| *z == Complex64::new(1.0, 0.0)));
}

#[test]
fn test_waves_from_array() {
    let array = Array2::<Complex64>::zeros((512, 512));
    let pointer = array.as_ptr();

    let waves = Waves::new(array, 10.0, 300e3).unwrap();
    assert_eq!(waves.sampling(), [0.01953125, 0.01953125]);
    assert_eq!(waves.array().as_ptr(), pointer);
    assert_abs_diff_eq!(waves.wavelength(), 0.0196875, epsilon = 1e-7);
}

#[test]
fn test_halving_sampling_doubles_cutoff() {
    let energy = Energy::new(300e3).unwrap();
    let coarse = PlaneWave::new(Grid::from_sampling(10.0, 0.1).unwrap(), energy)
        .build()
        .unwrap();
    let fine = PlaneWave::new(Grid::from_sampling(10.0, 0.05).unwrap(), energy)
        .build()
        .unwrap();

    for axis in 0..2 {
        assert_abs_diff_eq!(
            fine.cutoff_scattering_angles()[axis],
            2.0 * coarse.cutoff_scattering_angles()[axis],
            epsilon = 1e-9
        );
    }
    // 2/3 λ / (2 Δx) in mrad
    assert_abs_diff_eq!(
        coarse.cutoff_scattering_angles()[0],
        2.0 / 3.0 * energy.wavelength() / 0.2 * 1e3,
        epsilon = 1e-9
    );
}

#[test]
fn test_probe_scan_batch() {
    let grid = Grid::new(5.0, 100usize).unwrap();
    let waves = Probe::new(grid, Energy::new(300e3).unwrap())
        .semiangle_cutoff(20.0)
        .build_at(&[[0.0, 0.0], [2.5, 2.5], [5.0, 5.0]])
        .unwrap();

    assert_eq!(waves.batch_shape(), &[3]);
    let second = waves.get(1).unwrap();
    assert_eq!(second.array().shape(), &[100, 100]);
    assert_eq!(second.grid(), waves.grid());
    assert!(matches!(
        waves.get(3),
        Err(WaveError::IndexOutOfBounds { index: 3, len: 3 })
    ));

    // Probes at (0, 0) and (5, 5) coincide on a periodic 5 Å grid
    let first = waves.get(0).unwrap();
    let last = waves.get(2).unwrap();
    assert_abs_diff_eq!(
        (first.array() - last.array()).map(|z| z.norm()).sum(),
        0.0,
        epsilon = 1e-9
    );
}

#[test]
fn test_writes_through_views_reach_the_parent() {
    let array = Array4::<Complex64>::zeros((2, 3, 16, 16));
    let mut waves = Waves::new(array, 4.0, 100e3).unwrap();

    {
        let mut outer = waves.get_mut(1).unwrap();
        let mut inner = outer.get_mut(2).unwrap();
        inner.array_mut()[[5, 7]] = Complex64::new(3.0, -1.0);
    }
    assert_eq!(waves.array()[[1, 2, 5, 7]], Complex64::new(3.0, -1.0));

    let mut copy = waves.get(1).unwrap().to_owned();
    copy.array_mut().fill(Complex64::new(9.0, 0.0));
    assert_eq!(waves.array()[[1, 0, 0, 0]], Complex64::new(0.0, 0.0));
}

#[test]
fn test_aberrated_probe_stays_normalized() {
    let grid = Grid::new(8.0, 128usize).unwrap();
    let mut probe = Probe::new(grid, Energy::new(200e3).unwrap())
        .semiangle_cutoff(25.0)
        .rolloff(0.1)
        .focal_spread(20.0)
        .angular_spread(0.5)
        .defocus(60.0);
    probe.set_aberration("Cs", -2e4).unwrap();
    probe.set_aberration("astigmatism", 10.0).unwrap();

    let waves = probe.build().unwrap();
    assert!(waves.is_finite());
    let total: f64 = waves.intensity().sum();
    assert_abs_diff_eq!(total, 1.0, epsilon = 1e-10);
    assert_eq!(probe.ctf().aberrations.c30, -2e4);
}
