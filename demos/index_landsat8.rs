use anyhow::{Context, Result};

use eo_indexer::catalog::{region_polygon, EarthCatalog, ImageFilter};
use eo_indexer::config::Settings;
use eo_indexer::credentials::{CredentialManager, StaticTokenFile};
use eo_indexer::index::{InMemoryIndex, ProductDescriptor};
use eo_indexer::indexer::Indexer;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::default();
    let key = settings
        .service_account_file()
        .context("set EO_INDEXER_CREDENTIALS to a service-account token file")?;
    let manager = CredentialManager::service(StaticTokenFile::new(key)).await?;

    let mut index = InMemoryIndex::new();
    index.register_product(ProductDescriptor {
        name: "ls8_test".to_owned(),
        platform: "LANDSAT_8".to_owned(),
        bands: vec!["blue".into(), "green".into(), "red".into(), "nir".into()],
    });

    let catalog = EarthCatalog::new(&settings.endpoint, &settings.project, manager.handle());
    let indexer = Indexer::new(&catalog, &index);

    let filter = ImageFilter {
        region: Some(region_polygon((-4.15, -3.90), (39.50, 39.75))),
        start_time: Some("2020-01-01T00:00:00Z".parse()?),
        end_time: Some("2020-02-01T00:00:00Z".parse()?),
        ..Default::default()
    };
    let count = indexer
        .index("LANDSAT/LC08/C01/T1_SR", "ls8_test", &filter, false)
        .await?;
    println!("{count} eligible scenes indexed");

    manager.shutdown().await;
    Ok(())
}
