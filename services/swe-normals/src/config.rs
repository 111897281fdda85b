//! Pipeline configuration.
//!
//! The two deployed dataset families are built in. A YAML file can replace
//! them (see `config/swe-normals.yaml`); credentials are resolved from the
//! environment once, when the [`PipelineConfig`] is built.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use grid_processor::{DimensionNames, EmptyNormalsPolicy, SourceDescriptor};
use serde::Deserialize;
use swe_common::{
    BoundingBox, CrsCode, SweError, SweResult, TargetPeriod, TemporalAnchorConvention,
};
use tracing::{debug, warn};

/// Storage account hosting both datasets.
pub const DEFAULT_ENDPOINT: &str = "https://climatedataprod.blob.core.windows.net";

/// Root of the YAML configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub endpoint: String,
    pub families: Vec<FamilyConfig>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            families: vec![FamilyConfig::snodas(), FamilyConfig::copernicus()],
        }
    }
}

/// One dataset family as written in the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct FamilyConfig {
    pub name: String,
    /// Overrides the top-level endpoint for this family.
    #[serde(default)]
    pub endpoint: Option<String>,
    pub container: String,
    pub prefix: String,
    pub variable: String,
    /// Environment variable holding the SAS token.
    pub credential_env: String,
    pub bbox: BoundingBox,
    pub anchor_hour: u32,
    pub earliest_valid_year: i32,
    #[serde(default)]
    pub crs: CrsCode,
    #[serde(default)]
    pub empty_normals: EmptyNormalsPolicy,
    #[serde(default)]
    pub dimensions: DimensionNames,
}

impl FamilyConfig {
    /// SNODAS daily grids over the western US.
    pub fn snodas() -> Self {
        Self {
            name: "snodas".to_string(),
            endpoint: None,
            container: "snodas-v1".to_string(),
            prefix: "snodas.zarr".to_string(),
            variable: "1034".to_string(),
            credential_env: "SNODAS_SAS".to_string(),
            bbox: BoundingBox::from_ranges(
                (-14528544.60, -10528544.60),
                (5915989.877651, 7255989.877651),
            ),
            anchor_hour: TemporalAnchorConvention::REGIONAL.anchor_hour,
            earliest_valid_year: TemporalAnchorConvention::REGIONAL.earliest_valid_year,
            crs: CrsCode::Epsg3857,
            empty_normals: EmptyNormalsPolicy::default(),
            dimensions: DimensionNames::default(),
        }
    }

    /// Copernicus global SWE.
    pub fn copernicus() -> Self {
        Self {
            name: "copernicus".to_string(),
            endpoint: None,
            container: "copernicus".to_string(),
            prefix: "copernicus.zarr".to_string(),
            variable: "swe".to_string(),
            credential_env: "COPERNICUS_SAS".to_string(),
            bbox: BoundingBox::from_ranges((-15029545.0, -10929545.0), (5963905.0, 8263905.0)),
            anchor_hour: TemporalAnchorConvention::GLOBAL.anchor_hour,
            earliest_valid_year: TemporalAnchorConvention::GLOBAL.earliest_valid_year,
            crs: CrsCode::Epsg3857,
            empty_normals: EmptyNormalsPolicy::default(),
            dimensions: DimensionNames::default(),
        }
    }
}

impl FileConfig {
    /// Load a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: FileConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(path = %path.display(), families = config.families.len(), "Loaded config");
        Ok(config)
    }

    fn validate(&self) -> SweResult<()> {
        if self.families.is_empty() {
            return Err(SweError::InvalidConfig("no dataset families configured".into()));
        }

        let mut names = HashSet::new();
        for family in &self.families {
            let invalid = |msg: String| SweError::InvalidConfig(format!("{}: {}", family.name, msg));

            if family.name.trim().is_empty() {
                return Err(SweError::InvalidConfig("family name is empty".into()));
            }
            if !names.insert(family.name.as_str()) {
                return Err(invalid("duplicate family name".into()));
            }
            if family.container.trim().is_empty() {
                return Err(invalid("container is empty".into()));
            }
            if family.variable.trim().is_empty() {
                return Err(invalid("variable is empty".into()));
            }
            if !family.bbox.is_valid() {
                return Err(invalid(format!("bounding box {} has min > max", family.bbox)));
            }
            if family.anchor_hour > 23 {
                return Err(invalid(format!("anchor_hour {} is not 0-23", family.anchor_hour)));
            }
        }
        Ok(())
    }
}

/// A fully resolved dataset family, ready to run.
#[derive(Debug, Clone)]
pub struct DatasetFamily {
    pub name: String,
    pub source: SourceDescriptor,
    pub bbox: BoundingBox,
    pub convention: TemporalAnchorConvention,
    pub crs: CrsCode,
    pub empty_normals: EmptyNormalsPolicy,
}

impl DatasetFamily {
    /// `{family}_prcnt_of_norm_{mon}_{year}.tif`
    pub fn output_filename(&self, period: &TargetPeriod) -> String {
        format!(
            "{}_prcnt_of_norm_{}_{}.tif",
            self.name,
            period.month_abbrev(),
            period.year()
        )
    }
}

/// Everything a run needs, built once at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub families: Vec<DatasetFamily>,
    pub output_dir: PathBuf,
}

impl PipelineConfig {
    /// Validate `file` and resolve each family's credential with `lookup`.
    pub fn resolve(
        file: FileConfig,
        output_dir: PathBuf,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> SweResult<Self> {
        file.validate()?;

        let families = file
            .families
            .into_iter()
            .map(|family| {
                let credential = lookup(&family.credential_env).filter(|v| !v.trim().is_empty());
                if credential.is_none() {
                    warn!(
                        dataset = %family.name,
                        env = %family.credential_env,
                        "No credential set; this family will fail"
                    );
                }

                DatasetFamily {
                    source: SourceDescriptor {
                        endpoint: family.endpoint.unwrap_or_else(|| file.endpoint.clone()),
                        container: family.container,
                        prefix: family.prefix,
                        variable: family.variable,
                        credential,
                        dimensions: family.dimensions,
                    },
                    name: family.name,
                    bbox: family.bbox,
                    convention: TemporalAnchorConvention::new(
                        family.anchor_hour,
                        family.earliest_valid_year,
                    ),
                    crs: family.crs,
                    empty_normals: family.empty_normals,
                }
            })
            .collect();

        Ok(Self {
            families,
            output_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_match_deployment() {
        let config = PipelineConfig::resolve(FileConfig::default(), PathBuf::from("."), |k| {
            (k == "SNODAS_SAS").then(|| "sv=1&sig=x".to_string())
        })
        .unwrap();

        assert_eq!(config.families.len(), 2);
        let snodas = &config.families[0];
        assert_eq!(snodas.name, "snodas");
        assert_eq!(snodas.source.container, "snodas-v1");
        assert_eq!(snodas.source.variable, "1034");
        assert_eq!(snodas.source.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(snodas.convention, TemporalAnchorConvention::REGIONAL);
        assert_eq!(snodas.crs, CrsCode::Epsg3857);
        assert!(snodas.source.credential.is_some());

        let copernicus = &config.families[1];
        assert_eq!(copernicus.source.prefix, "copernicus.zarr");
        assert_eq!(copernicus.convention, TemporalAnchorConvention::GLOBAL);
        assert!(copernicus.source.credential.is_none());
    }

    #[test]
    fn test_output_filename() {
        let config =
            PipelineConfig::resolve(FileConfig::default(), PathBuf::from("."), no_env).unwrap();
        let period = TargetPeriod::new(2023, 3).unwrap();
        assert_eq!(
            config.families[0].output_filename(&period),
            "snodas_prcnt_of_norm_mar_2023.tif"
        );
        assert_eq!(
            config.families[1].output_filename(&TargetPeriod::new(2020, 12).unwrap()),
            "copernicus_prcnt_of_norm_dec_2020.tif"
        );
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
endpoint: https://example.blob.core.windows.net
families:
  - name: test
    container: swe-test
    prefix: test.zarr
    variable: swe
    credential_env: TEST_SAS
    bbox: { min_x: 0.0, min_y: 0.0, max_x: 10.0, max_y: 10.0 }
    anchor_hour: 12
    earliest_valid_year: 2010
    crs: "EPSG:4326"
    empty_normals: missing_grid
    dimensions: { time: t, y: lat, x: lon }
"#;
        let file: FileConfig = serde_yaml::from_str(yaml).unwrap();
        let config = PipelineConfig::resolve(file, PathBuf::from("/tmp"), |_| {
            Some("token".to_string())
        })
        .unwrap();

        let family = &config.families[0];
        assert_eq!(family.source.endpoint, "https://example.blob.core.windows.net");
        assert_eq!(family.convention, TemporalAnchorConvention::new(12, 2010));
        assert_eq!(family.crs, CrsCode::Epsg4326);
        assert_eq!(family.empty_normals, EmptyNormalsPolicy::MissingGrid);
        assert_eq!(family.source.dimensions.x, "lon");
        assert_eq!(family.source.credential.as_deref(), Some("token"));
    }

    #[test]
    fn test_sample_config_matches_builtin_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/swe-normals.yaml");
        let sample = PipelineConfig::resolve(FileConfig::load(&path).unwrap(), ".".into(), no_env)
            .unwrap();
        let builtin =
            PipelineConfig::resolve(FileConfig::default(), ".".into(), no_env).unwrap();

        for (a, b) in sample.families.iter().zip(&builtin.families) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.bbox, b.bbox);
            assert_eq!(a.convention, b.convention);
            assert_eq!(a.source.location(), b.source.location());
        }
        assert_eq!(sample.families.len(), builtin.families.len());
    }

    #[test]
    fn test_missing_sections_fall_back_to_defaults() {
        let file: FileConfig = serde_yaml::from_str("endpoint: https://other").unwrap();
        assert_eq!(file.families.len(), 2);
        assert_eq!(file.endpoint, "https://other");
    }

    #[test]
    fn test_validation_rejects_bad_families() {
        let mut file = FileConfig::default();
        file.families[1].name = "snodas".to_string();
        assert!(matches!(
            PipelineConfig::resolve(file, PathBuf::from("."), no_env),
            Err(SweError::InvalidConfig(_))
        ));

        let mut file = FileConfig::default();
        file.families[0].anchor_hour = 24;
        assert!(PipelineConfig::resolve(file, PathBuf::from("."), no_env).is_err());

        let mut file = FileConfig::default();
        file.families[0].bbox = BoundingBox::new(1.0, 0.0, 0.0, 1.0);
        assert!(PipelineConfig::resolve(file, PathBuf::from("."), no_env).is_err());

        let mut file = FileConfig::default();
        file.families[0].variable = " ".to_string();
        assert!(PipelineConfig::resolve(file, PathBuf::from("."), no_env).is_err());

        let file = FileConfig {
            families: vec![],
            ..FileConfig::default()
        };
        assert!(PipelineConfig::resolve(file, PathBuf::from("."), no_env).is_err());
    }

    #[test]
    fn test_blank_credential_is_treated_as_missing() {
        let config = PipelineConfig::resolve(FileConfig::default(), PathBuf::from("."), |_| {
            Some("  ".to_string())
        })
        .unwrap();
        assert!(config.families.iter().all(|f| f.source.credential.is_none()));
    }
}
