//! Per-family pipeline: fetch, normals, ratio, write.

use std::path::{Path, PathBuf};

use grid_processor::{compute_normals, percent_of_normal, DatasetAccessor, RasterSink};
use swe_common::{SweError, SweResult, TargetPeriod};
use tracing::{error, info};

use crate::config::{DatasetFamily, PipelineConfig};

/// Result of one family's branch.
#[derive(Debug)]
pub struct FamilyOutcome {
    pub family: String,
    pub result: SweResult<PathBuf>,
}

/// Outcomes of every configured family, in configuration order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<FamilyOutcome>,
}

impl RunReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &SweError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.family.as_str(), e)))
    }
}

/// Produce the percent-of-normal raster for one family and return its path.
pub async fn run_family(
    family: &DatasetFamily,
    period: &TargetPeriod,
    output_dir: &Path,
    accessor: &dyn DatasetAccessor,
    sink: &dyn RasterSink,
) -> SweResult<PathBuf> {
    let dataset = family.name.as_str();
    info!(dataset, period = %period, location = %family.source.location(), "Processing dataset family");

    let series = accessor
        .fetch(&family.source, &family.bbox)
        .await
        .map_err(|e| e.into_swe(dataset))?;

    let normals = compute_normals(&series, period, &family.convention, family.empty_normals)
        .map_err(|e| e.into_swe(dataset))?;
    info!(dataset, anchors = normals.anchor_count(), "Normals ready");

    let ratio = percent_of_normal(&series, &normals, period, &family.convention)
        .map_err(|e| e.into_swe(dataset))?;

    let path = output_dir.join(family.output_filename(period));
    sink.write(&ratio.grid, family.crs, &path)
        .map_err(|e| e.into_swe(dataset))?;

    info!(dataset, path = %path.display(), "Wrote percent-of-normal raster");
    Ok(path)
}

/// Run every family in turn. A failing family does not stop the others.
pub async fn run_all(
    config: &PipelineConfig,
    period: &TargetPeriod,
    accessor: &dyn DatasetAccessor,
    sink: &dyn RasterSink,
) -> RunReport {
    let mut report = RunReport::default();

    for family in &config.families {
        let result = run_family(family, period, &config.output_dir, accessor, sink).await;
        match &result {
            Ok(path) => println!("Saved percent-of-normal raster to: {}", path.display()),
            Err(e) => error!(dataset = %family.name, kind = e.kind(), error = %e, "Dataset family failed"),
        }
        report.outcomes.push(FamilyOutcome {
            family: family.name.clone(),
            result,
        });
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FamilyConfig, FileConfig};
    use chrono::{DateTime, TimeZone, Utc};
    use grid_processor::{
        EmptyNormalsPolicy, GeoTiffWriter, GridGeometry, InMemoryAccessor,
    };
    use swe_common::TemporalAnchorConvention;

    const WIDTH: usize = 4;
    const HEIGHT: usize = 3;

    fn config(dir: &Path) -> PipelineConfig {
        let mut snodas = FamilyConfig::snodas();
        snodas.bbox = swe_common::BoundingBox::new(-1000.0, -1000.0, 1000.0, 1000.0);
        let file = FileConfig {
            families: vec![snodas],
            ..FileConfig::default()
        };
        PipelineConfig::resolve(file, dir.to_path_buf(), |_| Some("sig".to_string())).unwrap()
    }

    /// March anchors 2008..=2023 at 05:00; year y holds (y - 2007) everywhere.
    fn regional_accessor() -> InMemoryAccessor {
        let times: Vec<DateTime<Utc>> = (2008..=2023)
            .map(|y| Utc.with_ymd_and_hms(y, 3, 1, 5, 0, 0).unwrap())
            .collect();
        let steps = (2008..=2023)
            .map(|y| vec![(y - 2007) as f32; WIDTH * HEIGHT])
            .collect();
        InMemoryAccessor::new(
            times,
            GridGeometry::new(
                vec![0.0, 10.0, 20.0, 30.0],
                vec![20.0, 10.0, 0.0],
            ),
            steps,
        )
    }

    #[tokio::test]
    async fn test_run_family_writes_raster() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let period = TargetPeriod::new(2023, 3).unwrap();

        let path = run_family(
            &config.families[0],
            &period,
            dir.path(),
            &regional_accessor(),
            &GeoTiffWriter::new(),
        )
        .await
        .unwrap();

        assert_eq!(path, dir.path().join("snodas_prcnt_of_norm_mar_2023.tif"));
        let mut decoder =
            tiff::decoder::Decoder::new(std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (WIDTH as u32, HEIGHT as u32));
        match decoder.read_image().unwrap() {
            // normal = mean(1..=15) = 8, target = 16
            tiff::decoder::DecodingResult::F32(data) => {
                assert!(data.iter().all(|&v| v == 200.0))
            }
            _ => panic!("expected Float32 raster"),
        }
    }

    #[tokio::test]
    async fn test_undefined_normal_for_first_year() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let period = TargetPeriod::new(2008, 3).unwrap();

        let err = run_family(
            &config.families[0],
            &period,
            dir.path(),
            &regional_accessor(),
            &GeoTiffWriter::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SweError::UndefinedNormal { year: 2008, month: 3, .. }));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_missing_grid_policy_yields_nan_raster() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.families[0].empty_normals = EmptyNormalsPolicy::MissingGrid;
        let period = TargetPeriod::new(2008, 3).unwrap();

        let path = run_family(
            &config.families[0],
            &period,
            dir.path(),
            &regional_accessor(),
            &GeoTiffWriter::new(),
        )
        .await
        .unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_missing_target_period() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let period = TargetPeriod::new(2024, 3).unwrap();

        let err = run_family(
            &config.families[0],
            &period,
            dir.path(),
            &regional_accessor(),
            &GeoTiffWriter::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SweError::MissingTargetPeriod { .. }));
    }

    #[tokio::test]
    async fn test_failed_family_does_not_stop_others() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        let mut global = config.families[0].clone();
        global.name = "copernicus".to_string();
        global.convention = TemporalAnchorConvention::GLOBAL;
        config.families.insert(0, global);
        let period = TargetPeriod::new(2023, 3).unwrap();

        // Global anchors sit at 00:00 and the data is stamped at 05:00, so the
        // global branch fails; the regional branch must still complete.
        let report = run_all(&config, &period, &regional_accessor(), &GeoTiffWriter::new()).await;

        assert!(!report.all_succeeded());
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "copernicus");
        assert!(report.outcomes[1].result.is_ok());
        assert!(dir.path().join("snodas_prcnt_of_norm_mar_2023.tif").exists());
    }

    #[tokio::test]
    async fn test_data_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let period = TargetPeriod::new(2023, 3).unwrap();

        let report = run_all(
            &config,
            &period,
            &InMemoryAccessor::unavailable("403 Forbidden"),
            &GeoTiffWriter::new(),
        )
        .await;

        match &report.outcomes[0].result {
            Err(SweError::DataSourceUnavailable { dataset, message }) => {
                assert_eq!(dataset, "snodas");
                assert!(message.contains("403"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
