//! Local filesystem tile source.
//!
//! Scans a run folder once and resolves tile files against that snapshot, so
//! repeated lookups never touch the filesystem and always agree with each other.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{ProductKind, TileSource};
use crate::error::{MosaicError, Result};
use crate::tile_grid::TileGrid;

/// Options for scanning a run folder.
#[derive(Debug, Clone, Default)]
pub struct LocalSourceOptions {
    /// Maximum directory depth to scan (None = unlimited)
    pub max_depth: Option<usize>,
    /// Whether to follow symbolic links
    pub follow_links: bool,
    /// Prefix the run put in front of its file names, if any
    pub run_name: Option<String>,
}

impl LocalSourceOptions {
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    #[must_use]
    pub fn with_run_name(mut self, name: impl Into<String>) -> Self {
        self.run_name = Some(name.into());
        self
    }
}

/// Tile source backed by a directory tree.
///
/// Files are located through path templates relative to the root. Templates
/// may use these placeholders:
///
/// | placeholder | expands to |
/// |---|---|
/// | `{run}` | run name followed by `_`, or nothing without a run name |
/// | `{tile}` | tile name, e.g. `Col03_Row11` |
/// | `{index}` | tile index |
/// | `{row}` / `{col}` | 0-based row / column |
///
/// Several templates may be registered per product; the first one naming a
/// file that exists wins.
#[derive(Debug)]
pub struct LocalTileSource {
    root: PathBuf,
    name: String,
    grid: TileGrid,
    files: HashSet<PathBuf>,
    templates: HashMap<ProductKind, Vec<String>>,
}

impl LocalTileSource {
    /// Scan `root` for files.
    ///
    /// # Errors
    /// Returns [`MosaicError::Io`] if the root directory does not exist.
    pub fn scan<P: AsRef<Path>>(root: P, grid: TileGrid, options: &LocalSourceOptions) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(MosaicError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Directory does not exist: {}", root.display()),
            )));
        }

        let mut walker = WalkDir::new(root).min_depth(1).follow_links(options.follow_links);
        if let Some(max) = options.max_depth {
            walker = walker.max_depth(max);
        }

        let mut files = HashSet::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(root) {
                files.insert(relative.to_path_buf());
            }
        }

        let name = options.run_name.clone().unwrap_or_default();
        debug!(root = %root.display(), files = files.len(), run = %name, "Scanned run folder");

        Ok(Self {
            root: root.to_path_buf(),
            name,
            grid,
            files,
            templates: HashMap::new(),
        })
    }

    /// Register a path template for `product`. Earlier templates take precedence.
    #[must_use]
    pub fn with_template(mut self, product: ProductKind, template: impl Into<String>) -> Self {
        self.templates.entry(product).or_default().push(template.into());
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Expand a template for one tile. `None` if the index is outside the grid.
    #[must_use]
    pub fn expand(&self, template: &str, index: usize) -> Option<PathBuf> {
        let (row, col) = self.grid.row_col(index)?;
        let tile = self.grid.tile_name(index)?;
        let run = if self.name.is_empty() {
            String::new()
        } else {
            format!("{}_", self.name)
        };
        let expanded = template
            .replace("{run}", &run)
            .replace("{tile}", &tile)
            .replace("{index}", &index.to_string())
            .replace("{row}", &row.to_string())
            .replace("{col}", &col.to_string());
        Some(PathBuf::from(expanded))
    }

    /// Count scanned files and, per registered product, tiles that resolve to a file.
    #[must_use]
    pub fn stats(&self) -> LocalSourceStats {
        let mut products: Vec<(ProductKind, usize)> = self
            .templates
            .keys()
            .map(|product| {
                let count = (0..self.grid.tile_count())
                    .filter(|&i| self.resolve(product, i).is_some())
                    .count();
                (product.clone(), count)
            })
            .collect();
        products.sort_by(|a, b| a.0.name().cmp(b.0.name()));

        LocalSourceStats {
            file_count: self.files.len(),
            tiles_with_data: self.grid.tiles_with_data(),
            products,
        }
    }
}

impl TileSource for LocalTileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn grid(&self) -> &TileGrid {
        &self.grid
    }

    fn resolve(&self, product: &ProductKind, index: usize) -> Option<PathBuf> {
        self.templates
            .get(product)?
            .iter()
            .filter_map(|t| self.expand(t, index))
            .find(|relative| self.files.contains(relative))
            .map(|relative| self.root.join(relative))
    }
}

/// Statistics about a scanned run folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSourceStats {
    /// Number of files found under the root
    pub file_count: usize,
    /// Tiles the layout marks as having data
    pub tiles_with_data: usize,
    /// Tiles with a file, per registered product, sorted by product name
    pub products: Vec<(ProductKind, usize)>,
}
