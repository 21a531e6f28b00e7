use approx::assert_abs_diff_eq;
use mslice_common::{parse_toml, WaveParameters};
use mslice_simulator::{
    builders::from_parameters,
    utils::io::{dump_waves, load_waves},
    AnnularDetector, Energy, Grid,
};

const PROBE_SCAN: &str = r#"
sim_name = "probe-scan"
energy = 300e3
extent = [6.0, 4.0]
sampling = 0.1

[waves]
type = "Probe"
semiangle_cutoff = 20.0
focal_spread = 30.0
defocus = 50.0
positions = "(0, 0), (2.5, 2.5), (5, 3)"

[detector]
inner = 0.0
outer = 40.0
"#;

#[test]
fn test_probe_scan_run_file() {
    let parameters = parse_toml(PROBE_SCAN).unwrap();
    let grid = Grid::resolve(parameters.extent, parameters.gpts, parameters.sampling).unwrap();
    assert_eq!(grid.gpts(), [60, 40]);

    let energy = Energy::new(parameters.energy).unwrap();
    let waves = from_parameters(&parameters.waves, grid, energy).unwrap();
    assert_eq!(waves.array().shape(), &[3, 60, 40]);

    let detector = AnnularDetector::from_parameters(&parameters.detector.unwrap()).unwrap();
    let detected = detector.detect(&waves);
    assert_eq!(detected.shape(), &[3]);
    // The detector covers the whole 20 mrad aperture
    for &value in detected.iter() {
        assert_abs_diff_eq!(value, 1.0, epsilon = 1e-10);
    }
}

#[test]
fn test_plane_wave_run_file_round_trips_through_disk() {
    let parameters = parse_toml(
        r#"
        sim_name = "plane"
        energy = 100e3
        gpts = [32, 48]
        sampling = 0.25

        [waves]
        type = "PlaneWave"
        "#,
    )
    .unwrap();
    assert_eq!(parameters.waves, WaveParameters::PlaneWave);

    let grid = Grid::resolve(parameters.extent, parameters.gpts, parameters.sampling).unwrap();
    let waves = from_parameters(&parameters.waves, grid, Energy::new(parameters.energy).unwrap())
        .unwrap();

    let base = std::env::temp_dir()
        .join(format!("mslice-run-file-{}", std::process::id()))
        .join("waves");
    let base = base.to_str().unwrap();
    dump_waves(&waves, base).unwrap();
    let loaded = load_waves(base).unwrap();

    assert_eq!(loaded.extent(), [8.0, 12.0]);
    assert_eq!(loaded.array(), waves.array());
}
