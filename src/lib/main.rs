mod geo;
mod geocode;
mod marker;
mod panel;
mod surface;

pub use geo::*;
pub use geocode::*;
pub use marker::*;
pub use panel::*;
pub use surface::*;
