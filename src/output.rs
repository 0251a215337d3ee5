//! Output folders holding the results of a run
//!
//! ```text
//! proxies/{http,socks4,socks5}.txt                        host:port
//! proxies_anonymous/...                                   host:port
//! proxies_geolocation/...                                 host:port::country::region::city
//! proxies_geolocation_anonymous/...                       host:port::country::region::city
//! ```

use crate::error::HarvestError;
use crate::proxy::models::Protocol;
use crate::Result;
use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// One of the four output folders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    All,
    Anonymous,
    Geolocation,
    GeolocationAnonymous,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::All,
        Category::Anonymous,
        Category::Geolocation,
        Category::GeolocationAnonymous,
    ];

    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::All => "proxies",
            Category::Anonymous => "proxies_anonymous",
            Category::Geolocation => "proxies_geolocation",
            Category::GeolocationAnonymous => "proxies_geolocation_anonymous",
        }
    }

    pub fn is_geolocation(&self) -> bool {
        matches!(self, Category::Geolocation | Category::GeolocationAnonymous)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

fn persistence_error(path: &Path) -> impl FnOnce(std::io::Error) -> HarvestError + '_ {
    move |source| HarvestError::Persistence {
        path: path.to_path_buf(),
        source,
    }
}

/// Writer owning the output folders under a root directory
#[derive(Debug, Clone)]
pub struct OutputWriter {
    root: PathBuf,
}

impl OutputWriter {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.root.join(category.dir_name())
    }

    pub fn file_path(&self, category: Category, protocol: Protocol) -> PathBuf {
        self.category_dir(category).join(protocol.file_name())
    }

    /// Remove all four folders left by a previous run and recreate the ones
    /// this run fills. Geolocation folders are only created when `geolocation`
    /// is set.
    pub fn reset(&self, geolocation: bool) -> Result<Vec<Category>> {
        for category in Category::ALL {
            let dir = self.category_dir(category);
            match fs::remove_dir_all(&dir) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(persistence_error(&dir)(e)),
            }
        }

        let active: Vec<_> = Category::ALL
            .into_iter()
            .filter(|c| geolocation || !c.is_geolocation())
            .collect();
        for category in &active {
            let dir = self.category_dir(*category);
            fs::create_dir_all(&dir).map_err(persistence_error(&dir))?;
        }
        Ok(active)
    }

    /// Write `lines` in order, one per line, replacing the file
    pub fn write<I, S>(&self, category: Category, protocol: Protocol, lines: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let path = self.file_path(category, protocol);
        let file = fs::File::create(&path).map_err(persistence_error(&path))?;
        let mut writer = BufWriter::new(file);

        let mut count = 0;
        for line in lines {
            writeln!(writer, "{}", line.as_ref()).map_err(persistence_error(&path))?;
            count += 1;
        }
        writer.flush().map_err(persistence_error(&path))?;
        Ok(count)
    }
}
