use anyhow::Result;
use clap::Parser;
use mslice_common::{read_toml, TomlParameters};
use mslice_simulator::{
    builders::from_parameters,
    utils::io::{array_to_disk, dump_waves},
    AnnularDetector, Energy, Grid,
};
use std::time::Instant;

#[derive(Parser)]
pub struct CommandLineArguments {
    #[clap(long, short)]
    toml: String,
    #[clap(long, short)]
    verbose: bool,
    /// Build the waves and report, without writing anything
    #[clap(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    env_logger::builder().format_timestamp_secs().init();

    // Start timer
    let now = Instant::now();

    // Parse path to toml
    let args = CommandLineArguments::parse();
    let toml: TomlParameters = read_toml(&args.toml)?;

    let grid = Grid::resolve(toml.extent, toml.gpts, toml.sampling)?;
    let energy = Energy::new(toml.energy)?;

    if args.verbose {
        println!("Working on simulation {}", toml.sim_name);
        println!(
            "extent = {:?} Å, gpts = {:?}, sampling = {:?} Å",
            grid.extent(),
            grid.gpts(),
            grid.sampling()
        );
        println!(
            "energy = {:.1} keV, wavelength = {:.5e} Å",
            energy.value() / 1e3,
            energy.wavelength()
        );
    }

    let waves = from_parameters(&toml.waves, grid, energy)?;
    if !waves.is_finite() {
        anyhow::bail!("waves of {} contain NaN or Inf", toml.sim_name);
    }
    log::info!(
        "built waves of shape {:?}, cutoff angles {:?} mrad",
        waves.array().shape(),
        waves.cutoff_scattering_angles()
    );

    let detected = toml
        .detector
        .as_ref()
        .map(AnnularDetector::from_parameters)
        .transpose()?
        .map(|detector| detector.detect(&waves));

    if let Some(ref detected) = detected {
        if args.verbose {
            println!("Detected fraction\n{detected}");
        }
    }

    if !args.dry_run {
        dump_waves(&waves, &format!("{}/waves", toml.sim_name))?;
        if let Some(ref detected) = detected {
            array_to_disk(&format!("{}/detected.npy", toml.sim_name), detected)?;
        }
    }

    if args.verbose {
        println!(
            "Finished {} in {} ms",
            toml.sim_name,
            now.elapsed().as_millis()
        );
    }

    Ok(())
}
