//! Discovery of the netCDF files to process.

use ignore::WalkBuilder;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Fixed-frequency files carry no time axis and are never collected.
static FIXED_FREQUENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(_fx_|_fixed_|_fx\.|_fixed\.|_.fx_)").expect("fixed frequency pattern is valid")
});

/// Default pattern for directories to skip: hidden folders.
pub const DEFAULT_IGNORE_DIR: &str = r"^.*/\.[\w]*.*$";

/// Ordered filename rules: every inclusive rule must match, no exclusive rule may.
#[derive(Debug, Clone)]
pub struct FileFilter {
    rules: Vec<(Regex, bool)>,
}

static NETCDF_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.*\.nc$").expect("netCDF pattern is valid"));
static HIDDEN_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\..*$").expect("hidden file pattern is valid"));

impl Default for FileFilter {
    /// netCDF files that are not hidden.
    fn default() -> Self {
        Self::with_rules(&[], &[])
    }
}

impl FileFilter {
    pub const fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// User rules replace the default of their kind: any include replaces the
    /// `.nc` include, any exclude replaces the hidden file exclude.
    pub fn with_rules(includes: &[Regex], excludes: &[Regex]) -> Self {
        let mut filter = Self::empty();
        if includes.is_empty() {
            filter.include(NETCDF_FILE.clone());
        }
        for regex in includes {
            filter.include(regex.clone());
        }
        if excludes.is_empty() {
            filter.exclude(HIDDEN_FILE.clone());
        }
        for regex in excludes {
            filter.exclude(regex.clone());
        }
        filter
    }

    pub fn include(&mut self, regex: Regex) -> &mut Self {
        self.rules.push((regex, true));
        self
    }

    pub fn exclude(&mut self, regex: Regex) -> &mut Self {
        self.rules.push((regex, false));
        self
    }

    pub fn matches(&self, filename: &str) -> bool {
        !FIXED_FREQUENCY.is_match(filename)
            && self
                .rules
                .iter()
                .all(|(regex, inclusive)| regex.is_match(filename) == *inclusive)
    }
}

/// Walks the input paths and yields the files to process, sorted by path.
#[derive(Debug, Clone)]
pub struct Collector {
    sources: Vec<PathBuf>,
    file_filter: FileFilter,
    dir_filter: Option<Regex>,
}

impl Collector {
    pub fn new(sources: Vec<PathBuf>) -> Self {
        Self {
            sources,
            file_filter: FileFilter::default(),
            dir_filter: Regex::new(DEFAULT_IGNORE_DIR).ok(),
        }
    }

    #[must_use]
    pub fn with_file_filter(mut self, filter: FileFilter) -> Self {
        self.file_filter = filter;
        self
    }

    /// Directories matching `regex` are not descended into. The regex sees the path
    /// below the input directory, with a leading `/`.
    #[must_use]
    pub fn with_dir_filter(mut self, regex: Option<Regex>) -> Self {
        self.dir_filter = regex;
        self
    }

    /// Every matching file under the sources, sorted and deduplicated.
    pub fn collect(&self) -> Vec<PathBuf> {
        let Some((first, rest)) = self.sources.split_first() else {
            return Vec::new();
        };
        let mut builder = WalkBuilder::new(first);
        for source in rest {
            builder.add(source);
        }

        let dir_filter = self.dir_filter.clone();
        let roots = self.sources.clone();
        builder
            .standard_filters(false)
            .follow_links(true)
            .sort_by_file_path(Path::cmp)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                if !is_dir || entry.depth() == 0 {
                    return true;
                }
                let Some(re) = dir_filter.as_ref() else {
                    return true;
                };
                // Matched below the walked root so hidden parents of the inputs don't count.
                let relative = roots
                    .iter()
                    .find_map(|root| entry.path().strip_prefix(root).ok())
                    .unwrap_or_else(|| entry.path());
                !re.is_match(&format!("/{}", relative.to_string_lossy()))
            });

        let mut files: Vec<PathBuf> = builder
            .build()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| self.file_filter.matches(name))
            })
            .map(ignore::DirEntry::into_path)
            .collect();

        files.sort();
        files.dedup();
        tracing::debug!(count = files.len(), "Collected files");
        files
    }
}
