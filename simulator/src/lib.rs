pub mod builders;
pub mod detect;
pub mod energy;
pub mod scan;
pub mod transfer;
pub mod utils;
pub mod waves;

pub use builders::{PlaneWave, Probe, WaveBuilder};
pub use detect::AnnularDetector;
pub use energy::Energy;
pub use transfer::{Aberrations, Ctf};
pub use utils::{error::WaveError, grid::Grid};
pub use waves::{WaveField, Waves, WavesView, WavesViewMut};
