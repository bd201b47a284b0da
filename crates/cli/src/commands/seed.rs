//! Seed a development database with a sample catalog.
//!
//! Categories are created first (existing slugs are left alone), then the
//! products are upserted like any other supplier sync, so seeding twice
//! updates rows instead of duplicating them.

use std::path::Path;

use tracing::info;

use emporium_core::Slug;
use emporium_storefront::db::CategoryRepository;
use emporium_storefront::db::categories::CategoryRecord;
use emporium_storefront::sync::{SampleCatalog, SampleCategory, run_sync};

/// Load `file` (or the built-in catalog) into the database.
///
/// # Errors
///
/// Returns an error if the file can't be read or parsed, or the database
/// is unreachable.
pub async fn run(file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = match file {
        Some(path) => {
            info!(path = %path.display(), "Loading catalog from file");
            SampleCatalog::from_file(path)?
        }
        None => SampleCatalog::builtin()?,
    };

    info!(
        categories = catalog.categories.len(),
        products = catalog.len(),
        "Parsed catalog"
    );

    let pool = super::connect().await?;

    let created = ensure_categories(&CategoryRepository::new(&pool), &catalog.categories).await?;
    info!(created, "Categories ready");

    let report = run_sync(&pool, &catalog).await?;

    info!("Seeding complete!");
    info!("  {report}");

    Ok(())
}

/// Create the categories whose slug doesn't exist yet.
async fn ensure_categories(
    repo: &CategoryRepository<'_>,
    categories: &[SampleCategory],
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut created = 0;

    for category in categories {
        let slug = Slug::from_title(&category.name)?;
        if repo.get_by_slug(slug.as_str()).await?.is_some() {
            continue;
        }

        repo.create(&CategoryRecord {
            name: category.name.trim().to_owned(),
            slug,
            description: category.description.clone(),
            image_url: None,
            parent_id: None,
        })
        .await?;
        created += 1;
    }

    Ok(created)
}
