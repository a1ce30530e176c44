//! Orchestration of one indexing run: walk the catalog, filter for band
//! completeness, normalize, build documents and upsert them.

use std::ops::RangeInclusive;

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, error, info, warn};

use crate::catalog::{CatalogApi, ImageFilter};
use crate::document::build_document;
use crate::error::{IndexError, Result};
use crate::index::DatasetIndex;
use crate::parser::{Platform, RECORD_PREFIX};
use crate::walker::CatalogWalker;

/// Transient counters for one walk. Logged at the end of the walk and
/// discarded; a re-run recomputes everything from the catalog.
#[derive(Clone, Debug, Default)]
pub struct IndexerProgress {
    pub records: u64,
    pub eligible: u64,
    pub skipped: u64,
    pub pages: u32,
    pub last_token: Option<String>,
    pub window: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

/// Drives scenes from the catalog into the dataset index.
pub struct Indexer<'a, C, I> {
    catalog: &'a C,
    index: &'a I,
}

impl<'a, C: CatalogApi, I: DatasetIndex> Indexer<'a, C, I> {
    pub fn new(catalog: &'a C, index: &'a I) -> Self {
        Self { catalog, index }
    }

    /// Indexes every eligible record the filter matches and returns how many
    /// there were. Eligibility is band completeness: each band the product
    /// declares must be present on the record. Eligible records count even
    /// when their dataset turns out defective or already indexed, so a
    /// re-run over unchanged data reports the same number.
    pub async fn index(
        &self,
        asset: &str,
        product_name: &str,
        filter: &ImageFilter,
        update_existing: bool,
    ) -> Result<u64> {
        let Some(product) = self.index.find_product(product_name).await? else {
            let known: Vec<String> = self
                .index
                .list_products()
                .await?
                .into_iter()
                .map(|product| product.name)
                .collect();
            error!(product = %product_name, known = ?known, "product is not registered");
            return Err(IndexError::MissingProduct(product_name.to_owned()));
        };
        let platform =
            Platform::from_code(&product.platform).ok_or_else(|| IndexError::UnknownPlatform {
                product: product.name.clone(),
                platform: product.platform.clone(),
            })?;

        let mut progress = IndexerProgress {
            window: filter.start_time.zip(filter.end_time),
            ..Default::default()
        };
        let mut walker = CatalogWalker::new(self.catalog, asset, filter.clone());

        while let Some(image) = walker.next_scene().await? {
            progress.records += 1;
            if !platform.has_required_bands(&image, &product) {
                progress.skipped += 1;
                continue;
            }
            progress.eligible += 1;

            let uri = format!("{RECORD_PREFIX}:{}", image.name);
            let metadata = match platform.parse(&image, Some(&product)) {
                Ok(metadata) => metadata,
                Err(defect) => {
                    warn!(uri = %uri, error = %defect, "skipping defective scene");
                    continue;
                }
            };
            let document = build_document(&metadata);
            let dataset = self.index.resolve(&document, &uri).await?;

            if update_existing && self.index.get(dataset.id).await?.is_some() {
                self.index.update(dataset).await?;
                debug!(uri = %uri, "updated dataset");
            } else {
                match self.index.add(dataset).await {
                    Ok(()) => debug!(uri = %uri, "added dataset"),
                    Err(IndexError::DuplicateDataset(id)) => {
                        warn!(uri = %uri, id = %id, "dataset already indexed")
                    }
                    Err(other) => return Err(other),
                }
            }
        }

        progress.pages = walker.pages_fetched();
        progress.last_token = walker.last_token().map(str::to_owned);
        info!(
            records = progress.records,
            eligible = progress.eligible,
            skipped = progress.skipped,
            pages = progress.pages,
            last_token = ?progress.last_token,
            window = ?progress.window,
            "finished indexing walk"
        );
        Ok(progress.eligible)
    }

    /// Bulk indexing in calendar-month windows across the given years,
    /// summing the per-window eligible counts.
    pub async fn index_windows(
        &self,
        asset: &str,
        product_name: &str,
        filter: &ImageFilter,
        years: RangeInclusive<i32>,
        update_existing: bool,
    ) -> Result<u64> {
        let months: Vec<(i32, u32)> = years
            .clone()
            .flat_map(|year| (1..=12).map(move |month| (year, month)))
            .chain(std::iter::once((years.end() + 1, 1)))
            .collect();
        let bounds: Vec<DateTime<Utc>> = months
            .into_iter()
            .filter_map(|(year, month)| Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single())
            .collect();

        let mut total = 0;
        for bound in bounds.windows(2) {
            info!(start = %bound[0], end = %bound[1], "indexing window");
            let windowed = filter.windowed(bound[0], bound[1]);
            total += self
                .index(asset, product_name, &windowed, update_existing)
                .await?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use chrono::Datelike;

    use super::*;
    use crate::catalog::{AffineTransform, Geometry, Grid, GridDimensions, ImagePage, RawBand, RawImage};
    use crate::index::{InMemoryIndex, ProductDescriptor};
    use crate::parser::scene_identity;

    fn utm_grid() -> Grid {
        Grid {
            dimensions: Some(GridDimensions {
                width: 7611,
                height: 7761,
            }),
            affine_transform: Some(AffineTransform {
                scale_x: 30.0,
                scale_y: -30.0,
                translate_x: 542_685.0,
                translate_y: 4_258_215.0,
                ..Default::default()
            }),
            crs_code: Some("EPSG:32610".to_owned()),
            crs_wkt: None,
        }
    }

    fn ls8_image(name: &str) -> RawImage {
        RawImage {
            name: name.to_owned(),
            start_time: Some("2017-04-12T18:20:15Z".parse().unwrap()),
            end_time: None,
            geometry: Some(Geometry {
                kind: "Polygon".to_owned(),
                coordinates: vec![vec![
                    [-122.0, 45.0],
                    [-120.5, 45.4],
                    [-120.1, 44.1],
                    [-121.6, 43.7],
                    [-122.0, 45.0],
                ]],
            }),
            bands: ["B1", "B2", "B3", "B4", "B5", "B6", "B7", "pixel_qa"]
                .iter()
                .map(|id| RawBand {
                    id: (*id).to_owned(),
                    grid: Some(utm_grid()),
                })
                .collect(),
            properties: Default::default(),
        }
    }

    fn ls8_index() -> InMemoryIndex {
        let mut index = InMemoryIndex::new();
        index.register_product(ProductDescriptor {
            name: "ls8_test".to_owned(),
            platform: "LANDSAT_8".to_owned(),
            bands: ["blue", "green", "red", "nir"]
                .iter()
                .map(|band| (*band).to_owned())
                .collect(),
        });
        index
    }

    struct FakeCatalog {
        pages: Vec<ImagePage>,
        calls: RefCell<u32>,
    }

    impl FakeCatalog {
        fn single_page(images: Vec<RawImage>) -> Self {
            Self {
                pages: vec![ImagePage {
                    images,
                    next_page_token: None,
                }],
                calls: RefCell::new(0),
            }
        }

        fn paged(pages: Vec<ImagePage>) -> Self {
            Self {
                pages,
                calls: RefCell::new(0),
            }
        }
    }

    impl CatalogApi for FakeCatalog {
        async fn list_images(self: &Self, _asset: &str, filter: &ImageFilter) -> Result<ImagePage> {
            *self.calls.borrow_mut() += 1;
            let index = match &filter.page_token {
                None => 0,
                Some(token) => token.parse::<usize>().unwrap(),
            };
            Ok(self.pages[index].clone())
        }
    }

    /// One record per configured month, everything else empty.
    struct SeasonalCatalog {
        by_month: HashMap<u32, RawImage>,
        requests: RefCell<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    }

    impl CatalogApi for SeasonalCatalog {
        async fn list_images(self: &Self, _asset: &str, filter: &ImageFilter) -> Result<ImagePage> {
            let start = filter.start_time.unwrap();
            let end = filter.end_time.unwrap();
            self.requests.borrow_mut().push((start, end));
            Ok(ImagePage {
                images: self.by_month.get(&start.month()).cloned().into_iter().collect(),
                next_page_token: None,
            })
        }
    }

    const ASSET: &str = "LANDSAT/LC08/C01/T1_SR";

    #[tokio::test]
    async fn test_superset_record_indexes_one_dataset() {
        let name = "projects/earth/assets/LANDSAT/LC08/01/T1_SR/LC08_044034_20170412";
        let catalog = FakeCatalog::single_page(vec![ls8_image(name)]);
        let index = ls8_index();
        let indexer = Indexer::new(&catalog, &index);

        let count = indexer
            .index(ASSET, "ls8_test", &ImageFilter::default(), false)
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(index.dataset_count().await, 1);
        let id = scene_identity(Some("ls8_test"), name);
        let dataset = index.get(id).await.unwrap().unwrap();
        // Only the product's four bands are mapped, each with a layered path.
        assert_eq!(dataset.document.image.bands.len(), 4);
        assert_eq!(
            dataset.document.image.bands["nir"].path,
            format!("EEDAI:{name}:B5")
        );
        assert_eq!(dataset.uri, format!("EEDAI:{name}"));
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let catalog = FakeCatalog::single_page(vec![ls8_image("projects/earth/assets/L/one")]);
        let index = ls8_index();
        let indexer = Indexer::new(&catalog, &index);

        let first = indexer
            .index(ASSET, "ls8_test", &ImageFilter::default(), false)
            .await
            .unwrap();
        let second = indexer
            .index(ASSET, "ls8_test", &ImageFilter::default(), false)
            .await
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 1);
        assert_eq!(index.dataset_count().await, 1);
    }

    #[tokio::test]
    async fn test_incomplete_records_are_skipped_without_counting() {
        let mut incomplete = ls8_image("projects/earth/assets/L/partial");
        incomplete.bands.retain(|band| band.id != "B5");
        let catalog = FakeCatalog::single_page(vec![incomplete]);
        let index = ls8_index();
        let indexer = Indexer::new(&catalog, &index);

        let count = indexer
            .index(ASSET, "ls8_test", &ImageFilter::default(), false)
            .await
            .unwrap();

        assert_eq!(count, 0);
        assert_eq!(index.dataset_count().await, 0);
    }

    #[tokio::test]
    async fn test_missing_product_aborts_before_any_request() {
        let catalog = FakeCatalog::single_page(vec![ls8_image("projects/earth/assets/L/one")]);
        let index = ls8_index();
        let indexer = Indexer::new(&catalog, &index);

        let err = indexer
            .index(ASSET, "ls9_test", &ImageFilter::default(), false)
            .await
            .unwrap_err();

        assert!(matches!(err, IndexError::MissingProduct(name) if name == "ls9_test"));
        assert_eq!(*catalog.calls.borrow(), 0);
    }

    #[tokio::test]
    async fn test_unknown_platform_aborts_before_any_request() {
        let catalog = FakeCatalog::single_page(vec![ls8_image("projects/earth/assets/L/one")]);
        let mut index = InMemoryIndex::new();
        index.register_product(ProductDescriptor {
            name: "modis_test".to_owned(),
            platform: "MODIS".to_owned(),
            bands: vec!["red".to_owned()],
        });
        let indexer = Indexer::new(&catalog, &index);

        let err = indexer
            .index(ASSET, "modis_test", &ImageFilter::default(), false)
            .await
            .unwrap_err();

        assert!(matches!(err, IndexError::UnknownPlatform { platform, .. } if platform == "MODIS"));
        assert_eq!(*catalog.calls.borrow(), 0);
    }

    #[tokio::test]
    async fn test_defective_scene_counts_eligible_but_adds_nothing() {
        let mut defective = ls8_image("projects/earth/assets/L/defective");
        defective.geometry = None;
        let catalog = FakeCatalog::single_page(vec![defective]);
        let index = ls8_index();
        let indexer = Indexer::new(&catalog, &index);

        let count = indexer
            .index(ASSET, "ls8_test", &ImageFilter::default(), false)
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(index.dataset_count().await, 0);
    }

    #[tokio::test]
    async fn test_update_flag_controls_whether_changes_land() {
        let name = "projects/earth/assets/L/changing";
        let catalog = FakeCatalog::single_page(vec![ls8_image(name)]);
        let index = ls8_index();
        let indexer = Indexer::new(&catalog, &index);
        indexer
            .index(ASSET, "ls8_test", &ImageFilter::default(), false)
            .await
            .unwrap();

        let mut revised = ls8_image(name);
        revised.start_time = Some("2018-01-01T00:00:00Z".parse().unwrap());
        let id = scene_identity(Some("ls8_test"), name);

        // Without the flag the original document stays.
        let catalog = FakeCatalog::single_page(vec![revised.clone()]);
        let indexer = Indexer::new(&catalog, &index);
        indexer
            .index(ASSET, "ls8_test", &ImageFilter::default(), false)
            .await
            .unwrap();
        let stored = index.get(id).await.unwrap().unwrap();
        assert_eq!(
            stored.document.creation_dt,
            "2017-04-12T18:20:15Z".parse::<DateTime<Utc>>().unwrap()
        );

        // With it the revision replaces the document.
        indexer
            .index(ASSET, "ls8_test", &ImageFilter::default(), true)
            .await
            .unwrap();
        let stored = index.get(id).await.unwrap().unwrap();
        assert_eq!(
            stored.document.creation_dt,
            "2018-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[tokio::test]
    async fn test_walk_covers_every_page() {
        let catalog = FakeCatalog::paged(vec![
            ImagePage {
                images: vec![ls8_image("projects/earth/assets/L/a")],
                next_page_token: Some("1".to_owned()),
            },
            ImagePage {
                images: vec![ls8_image("projects/earth/assets/L/b")],
                next_page_token: None,
            },
        ]);
        let index = ls8_index();
        let indexer = Indexer::new(&catalog, &index);

        let count = indexer
            .index(ASSET, "ls8_test", &ImageFilter::default(), false)
            .await
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(index.dataset_count().await, 2);
        assert_eq!(*catalog.calls.borrow(), 2);
    }

    #[tokio::test]
    async fn test_ambiguous_resolution_aborts_the_run() {
        let catalog = FakeCatalog::single_page(vec![ls8_image("projects/earth/assets/L/one")]);
        let mut index = ls8_index();
        index.register_product(ProductDescriptor {
            name: "ls8_twin".to_owned(),
            platform: "LANDSAT_8".to_owned(),
            bands: vec!["blue".to_owned()],
        });
        let indexer = Indexer::new(&catalog, &index);

        let err = indexer
            .index(ASSET, "ls8_test", &ImageFilter::default(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Resolve { .. }));
    }

    #[tokio::test]
    async fn test_monthly_windows_cover_the_year_and_sum_counts() {
        let mut by_month = HashMap::new();
        by_month.insert(3, ls8_image("projects/earth/assets/L/march"));
        by_month.insert(7, ls8_image("projects/earth/assets/L/july"));
        let catalog = SeasonalCatalog {
            by_month,
            requests: RefCell::new(Vec::new()),
        };
        let index = ls8_index();
        let indexer = Indexer::new(&catalog, &index);

        let total = indexer
            .index_windows(ASSET, "ls8_test", &ImageFilter::default(), 2019..=2019, false)
            .await
            .unwrap();

        assert_eq!(total, 2);
        assert_eq!(index.dataset_count().await, 2);

        let requests = catalog.requests.borrow();
        assert_eq!(requests.len(), 12);
        assert_eq!(
            requests[0],
            (
                "2019-01-01T00:00:00Z".parse().unwrap(),
                "2019-02-01T00:00:00Z".parse().unwrap()
            )
        );
        // December closes against January of the next year.
        assert_eq!(
            requests[11],
            (
                "2019-12-01T00:00:00Z".parse().unwrap(),
                "2020-01-01T00:00:00Z".parse().unwrap()
            )
        );
    }
}
