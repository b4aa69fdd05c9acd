//! Category to converter routing table.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::config::ConverterConfig;
use super::traits::Converter;
use super::{ArchiveConverter, FfmpegConverter, ImageMagickConverter, LibreOfficeConverter};
use crate::job::Category;

/// Error building a [`ConverterRegistry`].
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("a converter is already registered for {0}")]
    DuplicateCategory(Category),

    #[error("converters cannot be registered for the unknown category")]
    UnknownCategory,
}

/// Immutable map from [`Category`] to the converter that handles it.
///
/// Built once at startup and shared by all workers.
pub struct ConverterRegistry {
    converters: BTreeMap<Category, Arc<dyn Converter>>,
}

impl ConverterRegistry {
    pub fn builder() -> ConverterRegistryBuilder {
        ConverterRegistryBuilder {
            converters: BTreeMap::new(),
        }
    }

    /// Registry with the tool-backed converters for every category.
    pub fn with_tools(config: &ConverterConfig) -> Self {
        let mut converters: BTreeMap<Category, Arc<dyn Converter>> = BTreeMap::new();
        converters.insert(
            Category::Image,
            Arc::new(ImageMagickConverter::new(config.clone())),
        );
        converters.insert(
            Category::Video,
            Arc::new(FfmpegConverter::video(config.clone())),
        );
        converters.insert(
            Category::Audio,
            Arc::new(FfmpegConverter::audio(config.clone())),
        );
        converters.insert(
            Category::Document,
            Arc::new(LibreOfficeConverter::new(config.clone())),
        );
        converters.insert(
            Category::Archive,
            Arc::new(ArchiveConverter::new(config.clone())),
        );
        Self { converters }
    }

    /// The converter for `category`, if one is registered.
    pub fn get(&self, category: Category) -> Option<Arc<dyn Converter>> {
        self.converters.get(&category).cloned()
    }

    /// Registered categories in a stable order.
    pub fn categories(&self) -> Vec<Category> {
        self.converters.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    /// All registered converters.
    pub fn converters(&self) -> impl Iterator<Item = &Arc<dyn Converter>> {
        self.converters.values()
    }
}

/// Builder for [`ConverterRegistry`].
pub struct ConverterRegistryBuilder {
    converters: BTreeMap<Category, Arc<dyn Converter>>,
}

impl ConverterRegistryBuilder {
    /// Adds a converter under its own category.
    pub fn register(
        mut self,
        converter: Arc<dyn Converter>,
    ) -> Result<Self, RegistryError> {
        let category = converter.category();
        if category == Category::Unknown {
            return Err(RegistryError::UnknownCategory);
        }
        if self.converters.contains_key(&category) {
            return Err(RegistryError::DuplicateCategory(category));
        }
        self.converters.insert(category, converter);
        Ok(self)
    }

    pub fn build(self) -> ConverterRegistry {
        ConverterRegistry {
            converters: self.converters,
        }
    }
}
