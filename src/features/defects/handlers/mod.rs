mod defect_handler;

pub use defect_handler::*;
