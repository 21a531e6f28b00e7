pub mod complex;
pub mod error;
pub mod fft;
pub mod grid;
pub mod io;
