mod defect_dto;

pub use defect_dto::*;
