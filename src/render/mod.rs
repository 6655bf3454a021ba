pub(crate) mod still;
pub(crate) mod raster;
pub(crate) mod surface;
