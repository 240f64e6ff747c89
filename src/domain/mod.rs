// Domain layer: the record model and the ports every backend implements.

pub mod model;
pub mod ports;
