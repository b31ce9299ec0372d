//! Source list reader with automatic gzip decompression
//!
//! ```rust,no_run
//! use iplist2mmdb::file_reader;
//! use std::io::BufRead;
//!
//! let reader = file_reader::open("ip_list.txt.gz")?;
//! for line in reader.lines() {
//!     println!("{}", line?);
//! }
//! # Ok::<(), std::io::Error>(())
//! ```

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, stdin, BufRead, BufReader};
use std::path::Path;

const BUFFER_SIZE: usize = 64 * 1024;

/// Open `path` for line-by-line reading
///
/// `-` reads stdin. Files ending in `.gz` (any case) are decompressed.
pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();

    if path.to_str() == Some("-") {
        return Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, stdin())));
    }

    let file = File::open(path)?;
    Ok(from_file(file, is_gzip(path)))
}

/// Wrap an already-open file, decompressing when `gzip` is set
pub fn from_file(file: File, gzip: bool) -> Box<dyn BufRead + Send> {
    if gzip {
        Box::new(BufReader::with_capacity(BUFFER_SIZE, GzDecoder::new(file)))
    } else {
        Box::new(BufReader::with_capacity(BUFFER_SIZE, file))
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}
