/// Assets, categories, and the catalog.
pub mod asset;
