//! Dataset publishing command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use t2i_eval::dataset::{LocalDatasetLoader, LocalDatasetStore, PublishOptions, publish_dataset};

pub struct PublishArgs {
    pub dataset: String,
    pub store: PathBuf,
    pub name: Option<String>,
    pub split: String,
    pub limit: Option<usize>,
    pub prompt_column: Option<String>,
    pub ground_truth_column: Option<String>,
    pub return_reference: bool,
}

impl PublishArgs {
    fn options(&self) -> Result<PublishOptions> {
        let mut builder = PublishOptions::builder()
            .split(self.split.clone())
            .return_reference(self.return_reference);
        if let Some(name) = &self.name {
            builder = builder.dataset_name(name.clone());
        }
        if let Some(limit) = self.limit {
            builder = builder.data_limit(limit);
        }
        if let Some(column) = &self.prompt_column {
            builder = builder.prompt_column(column.clone());
        }
        if let Some(column) = &self.ground_truth_column {
            builder = builder.ground_truth_image_column(column.clone());
        }
        builder.build().context("Invalid publish options")
    }
}

pub fn run(args: PublishArgs) -> Result<()> {
    let options = args.options()?;

    let mut store = LocalDatasetStore::new(&args.store);
    let reference = publish_dataset(&LocalDatasetLoader, &mut store, &args.dataset, options)
        .with_context(|| format!("Failed to publish {}", args.dataset))?;

    if let Some(reference) = reference {
        println!("Published {reference}");
        println!("  Path: {}", reference.path.display());
    }
    Ok(())
}
