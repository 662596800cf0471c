pub mod geometry;
pub mod observation;
pub mod sensor;
