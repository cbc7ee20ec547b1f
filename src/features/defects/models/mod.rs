mod defect;

pub use defect::{Defect, DefectDetail, DefectMode, PdfFile};
