use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;

///
/// Get a reader for either a gzip'd or a plain text file.
///
/// # Arguments
///
/// - path: path to the file to read
///
pub fn get_dynamic_reader(path: &Path) -> std::io::Result<BufReader<Box<dyn Read>>> {
    let is_gzipped = path.extension() == Some(OsStr::new("gz"));
    let file = File::open(path).map_err(|e| {
        std::io::Error::new(e.kind(), format!("Failed to open file {:?}: {}", path, e))
    })?;
    let file: Box<dyn Read> = match is_gzipped {
        true => Box::new(MultiGzDecoder::new(file)),
        false => Box::new(file),
    };

    Ok(BufReader::new(file))
}

///
/// Whether a line of a tabular input carries no record: blank lines,
/// `#` comments and BED `track`/`browser` headers.
///
pub fn is_skippable_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty()
        || trimmed.starts_with('#')
        || trimmed.starts_with("track")
        || trimmed.starts_with("browser")
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{BufRead, Write};

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    fn test_reads_plain_and_gzipped() {
        let dir = tempfile::tempdir().unwrap();

        let plain = dir.path().join("loci.bed");
        std::fs::write(&plain, "chr1\t10\t20\n").unwrap();

        let gz = dir.path().join("loci.bed.gz");
        let mut encoder = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        encoder.write_all(b"chr1\t10\t20\n").unwrap();
        encoder.finish().unwrap();

        for path in [plain, gz] {
            let lines: Vec<String> = get_dynamic_reader(&path)
                .unwrap()
                .lines()
                .map(|l| l.unwrap())
                .collect();
            assert_eq!(lines, vec!["chr1\t10\t20".to_string()]);
        }
    }

    #[rstest]
    fn test_missing_file_is_io_error() {
        let result = get_dynamic_reader(Path::new("/nonexistent/loci.bed"));
        assert!(result.is_err());
    }

    #[rstest]
    #[case("", true)]
    #[case("# comment", true)]
    #[case("track name=peaks", true)]
    #[case("chr1\t1\t2", false)]
    fn test_is_skippable_line(#[case] line: &str, #[case] expected: bool) {
        assert_eq!(is_skippable_line(line), expected);
    }
}
