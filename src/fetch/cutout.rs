//! Cutout URL construction and artifact layout.

use crate::config::CutoutConfig;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use url::Url;

/// Parameters of a cutout request that do not depend on the galaxy
#[derive(Debug, Clone)]
pub struct CutoutRequest {
    base: Url,
    layer: String,
    size: u32,
    pixscale: f64,
    bands: String,
}

impl CutoutRequest {
    /// Build from configuration, validating the base URL once
    pub fn from_config(config: &CutoutConfig) -> Result<Self> {
        let base = Url::parse(&config.cutout_base_url).map_err(|e| {
            Error::config(
                "cutout_base_url",
                format!("invalid cutout base URL: {e}"),
            )
        })?;

        Ok(Self {
            base,
            layer: config.cutout_layer.clone(),
            size: config.cutout_size,
            pixscale: config.cutout_pixscale,
            bands: config.cutout_bands.clone(),
        })
    }

    /// Retrieval URL for the given sky coordinates
    ///
    /// The same coordinates always produce the same URL.
    pub fn url(&self, ra: f64, dec: f64) -> String {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("ra", &ra.to_string())
            .append_pair("dec", &dec.to_string())
            .append_pair("layer", &self.layer)
            .append_pair("size", &self.size.to_string())
            .append_pair("pixscale", &self.pixscale.to_string())
            .append_pair("bands", &self.bands);
        url.into()
    }
}

/// Location of a galaxy's FITS file: `{data_path}/b{bin_id}/{source_id}.fits`
pub fn artifact_path(data_path: &Path, bin_id: i64, source_id: &str) -> PathBuf {
    data_path
        .join(format!("b{bin_id}"))
        .join(format!("{source_id}.fits"))
}
