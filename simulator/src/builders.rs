//! Builders for the incoming electron wave.

use mslice_common::{ScanParameters, WaveParameters};
use ndarray::{Array3, Axis};
use num::complex::Complex64;
use std::f64::consts::PI;

use crate::{
    energy::Energy,
    scan::grid_scan,
    transfer::{Aberrations, Ctf},
    utils::{
        complex::{complex_constant, complex_exponential},
        error::WaveError,
        fft::ifft2_inplace,
        grid::Grid,
    },
    waves::Waves,
};

/// Something that produces [`Waves`] on a grid at a beam energy
pub trait WaveBuilder {
    fn grid(&self) -> &Grid;

    fn energy(&self) -> Energy;

    fn build(&self) -> Result<Waves, WaveError>;
}

/// Unit amplitude plane wave travelling along the optical axis
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaneWave {
    grid: Grid,
    energy: Energy,
}

impl PlaneWave {
    pub fn new(grid: Grid, energy: Energy) -> PlaneWave {
        PlaneWave { grid, energy }
    }
}

impl WaveBuilder for PlaneWave {
    fn grid(&self) -> &Grid {
        &self.grid
    }

    fn energy(&self) -> Energy {
        self.energy
    }

    fn build(&self) -> Result<Waves, WaveError> {
        let array = complex_constant(Complex64::new(1.0, 0.0), &self.grid.gpts());
        Waves::with_grid(array, self.grid, self.energy)
    }
}

/// Convergent beam probe formed by the objective lens. The probe is the inverse
/// Fourier transform of the lens [`Ctf`], shifted to the requested positions and
/// normalized to unit total intensity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Probe {
    grid: Grid,
    energy: Energy,
    ctf: Ctf,
}

impl Probe {
    pub fn new(grid: Grid, energy: Energy) -> Probe {
        Probe {
            grid,
            energy,
            ctf: Ctf::default(),
        }
    }

    /// Aperture semiangle [mrad]
    pub fn semiangle_cutoff(mut self, semiangle_cutoff: f64) -> Probe {
        self.ctf.semiangle_cutoff = semiangle_cutoff;
        self
    }

    /// Aperture edge taper as a fraction of the cutoff
    pub fn rolloff(mut self, rolloff: f64) -> Probe {
        self.ctf.rolloff = rolloff;
        self
    }

    /// Defocus spread [Å]
    pub fn focal_spread(mut self, focal_spread: f64) -> Probe {
        self.ctf.focal_spread = focal_spread;
        self
    }

    /// Convergence angle spread [mrad]
    pub fn angular_spread(mut self, angular_spread: f64) -> Probe {
        self.ctf.angular_spread = angular_spread;
        self
    }

    /// Defocus [Å], sets `C10 = -defocus`
    pub fn defocus(mut self, defocus: f64) -> Probe {
        self.ctf.aberrations.c10 = -defocus;
        self
    }

    pub fn aberrations(mut self, aberrations: Aberrations) -> Probe {
        self.ctf.aberrations = aberrations;
        self
    }

    /// Sets one aberration coefficient by symbol or alias
    pub fn set_aberration(&mut self, symbol: &str, value: f64) -> Result<(), WaveError> {
        self.ctf.aberrations.set(symbol, value)
    }

    pub fn ctf(&self) -> &Ctf {
        &self.ctf
    }

    /// One probe per position [Å], stacked along a leading batch axis.
    pub fn build_at(&self, positions: &[[f64; 2]]) -> Result<Waves, WaveError> {
        self.ctf.validate()?;
        if positions.is_empty() {
            return Err(WaveError::invalid("positions", positions));
        }
        if let Some(position) = positions.iter().find(|p| !(p[0].is_finite() && p[1].is_finite())) {
            return Err(WaveError::invalid("positions", position));
        }

        let [nx, ny] = self.grid.gpts();
        log::debug!(
            "building {} probe(s) on a {nx}x{ny} grid at {} eV",
            positions.len(),
            self.energy.value()
        );

        let ctf = self.ctf.evaluate(&self.grid, self.energy);
        let [kx, ky] = self.grid.spatial_frequencies();

        let mut array = Array3::<Complex64>::zeros((positions.len(), nx, ny));
        for (mut probe, position) in array.outer_iter_mut().zip(positions) {
            log::trace!("probe at ({}, {})", position[0], position[1]);
            probe.indexed_iter_mut().for_each(|((i, j), value)| {
                let phase = -2.0 * PI * (kx[i] * position[0] + ky[j] * position[1]);
                *value = ctf[[i, j]] * complex_exponential(phase);
            });
        }
        ifft2_inplace(&mut array);

        let mut waves = Waves::with_grid(array, self.grid, self.energy)?;
        waves.normalize();
        Ok(waves)
    }
}

impl WaveBuilder for Probe {
    fn grid(&self) -> &Grid {
        &self.grid
    }

    fn energy(&self) -> Energy {
        self.energy
    }

    /// A single probe at the centre of the grid, without a batch axis
    fn build(&self) -> Result<Waves, WaveError> {
        let [x, y] = self.grid.extent();
        let waves = self.build_at(&[[x / 2.0, y / 2.0]])?;
        let array = waves.into_array().index_axis_move(Axis(0), 0);
        Waves::with_grid(array, self.grid, self.energy)
    }
}

/// Builds the waves described by a run file
pub fn from_parameters(
    parameters: &WaveParameters,
    grid: Grid,
    energy: Energy,
) -> Result<Waves, WaveError> {
    match parameters {
        WaveParameters::PlaneWave => PlaneWave::new(grid, energy).build(),
        WaveParameters::Probe {
            semiangle_cutoff,
            rolloff,
            focal_spread,
            angular_spread,
            defocus,
            positions,
            aberrations,
            scan,
        } => {
            let mut probe = Probe::new(grid, energy)
                .semiangle_cutoff(semiangle_cutoff.unwrap_or(f64::INFINITY))
                .rolloff(*rolloff)
                .focal_spread(*focal_spread)
                .angular_spread(*angular_spread);
            for (symbol, value) in aberrations {
                probe.set_aberration(symbol, *value)?;
            }
            if *defocus != 0.0 {
                probe = probe.defocus(*defocus);
            }

            match (positions, scan) {
                (Some(positions), _) => probe.build_at(positions),
                (
                    None,
                    Some(ScanParameters {
                        start,
                        end,
                        gpts,
                    }),
                ) => probe.build_at(&grid_scan(*start, *end, *gpts)?),
                (None, None) => probe.build(),
            }
        }
    }
}

#[test]
fn test_plane_wave_is_uniform() {
    let grid = Grid::new(10.0, 512usize).unwrap();
    let waves = PlaneWave::new(grid, Energy::new(300e3).unwrap())
        .build()
        .unwrap();

    assert_eq!(waves.array().shape(), &[512, 512]);
    assert_eq!(waves.sampling(), [0.01953125, 0.01953125]);
    assert!(waves
        .array()
        .iter()
        .all(|&z| z == Complex64::new(1.0, 0.0)));
}

#[test]
fn test_probe_batch_over_positions() {
    use approx::assert_abs_diff_eq;

    let grid = Grid::new(5.0, 100usize).unwrap();
    let probe = Probe::new(grid, Energy::new(300e3).unwrap())
        .semiangle_cutoff(30.0)
        .defocus(10.0);

    let positions = [[0.0, 0.0], [2.5, 2.5], [5.0, 5.0]];
    let waves = probe.build_at(&positions).unwrap();

    assert_eq!(waves.array().shape(), &[3, 100, 100]);
    assert_eq!(waves.batch_shape(), &[3]);
    assert_eq!(waves.get(1).unwrap().array().shape(), &[100, 100]);

    for view in waves.iter_batch() {
        let total: f64 = view.array().iter().map(|z| z.norm_sqr()).sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-10);
    }
}

#[test]
fn test_probe_intensity_peaks_at_position() {
    let grid = Grid::new(5.0, 100usize).unwrap();
    let probe = Probe::new(grid, Energy::new(200e3).unwrap()).semiangle_cutoff(25.0);

    let waves = probe.build_at(&[[2.5, 1.0]]).unwrap();
    let intensity = waves.intensity();

    let (argmax, _) = intensity
        .indexed_iter()
        .fold((None, f64::MIN), |(best, max), (index, &value)| {
            if value > max {
                (Some(index), value)
            } else {
                (best, max)
            }
        });
    let argmax = argmax.unwrap();
    // sampling 0.05 Å
    assert_eq!((argmax[1], argmax[2]), (50, 20));
}

#[test]
fn test_probe_build_is_centred_without_batch_axis() {
    let grid = Grid::new(4.0, 64usize).unwrap();
    let waves = Probe::new(grid, Energy::new(100e3).unwrap())
        .semiangle_cutoff(20.0)
        .build()
        .unwrap();

    assert_eq!(waves.array().shape(), &[64, 64]);
    assert!(waves.batch_shape().is_empty());
    let centre = waves.array()[[32, 32]].norm_sqr();
    assert!(waves.intensity().iter().all(|&value| value <= centre + 1e-12));
}

#[test]
fn test_probe_rejects_bad_input() {
    let grid = Grid::new(4.0, 32usize).unwrap();
    let probe = Probe::new(grid, Energy::new(100e3).unwrap());

    assert!(matches!(
        probe.build_at(&[]),
        Err(WaveError::InvalidParameter { name: "positions", .. })
    ));
    assert!(probe.build_at(&[[f64::NAN, 0.0]]).is_err());
    assert!(probe.semiangle_cutoff(-5.0).build().is_err());

    let mut probe = probe;
    assert!(matches!(
        probe.set_aberration("C7", 1.0),
        Err(WaveError::UnknownAberration(_))
    ));
}

#[test]
fn test_from_parameters() {
    use mslice_common::parse_toml;

    let toml = r#"
        sim_name = "probe"
        energy = 300e3
        extent = 5.0
        gpts = 50

        [waves]
        type = "Probe"
        semiangle_cutoff = 20.0
        defocus = 30.0
        aberrations = { Cs = -1e4 }
        scan = { start = [0.0, 0.0], end = [5.0, 5.0], gpts = [2, 3] }
    "#;
    let parameters = parse_toml(toml).unwrap();
    let grid = Grid::resolve(parameters.extent, parameters.gpts, parameters.sampling).unwrap();
    let energy = Energy::new(parameters.energy).unwrap();

    let waves = from_parameters(&parameters.waves, grid, energy).unwrap();
    assert_eq!(waves.array().shape(), &[6, 50, 50]);

    let plane = from_parameters(&WaveParameters::PlaneWave, grid, energy).unwrap();
    assert_eq!(plane.array().shape(), &[50, 50]);
}
