// CSV/TSV import

use std::io::Read;
use std::path::Path;

use tuition_recon::CellValue;

use crate::{Grid, ReadError};

pub fn read(path: &Path) -> Result<Grid, ReadError> {
    let content = read_file_as_utf8(path)?;
    let delimiter = if is_tsv(path) { b'\t' } else { sniff_delimiter(&content) };
    log::debug!("Reading {} with delimiter {:?}", path.display(), delimiter as char);
    parse(&content, delimiter)
}

fn is_tsv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tsv"))
}

/// Candidates in tie-break order: billing exports from pt-BR spreadsheets
/// are usually semicolon separated.
const DELIMITERS: [u8; 4] = [b';', b'\t', b',', b'|'];

/// Lines looked at when sniffing.
const SNIFF_LINES: usize = 10;

/// Pick the delimiter that splits the header into the most columns and keeps
/// that column count across the sample. Comma loses half its score when the
/// sample holds `1.500,00`-style amounts outside quotes.
pub fn sniff_delimiter(content: &str) -> u8 {
    let sample: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();
    let comma_decimals: usize = sample.iter().map(|l| decimal_commas(l)).sum();

    let mut best = (b',', 0usize);
    for delim in DELIMITERS {
        let mut score = split_score(&sample, delim);
        if delim == b',' && comma_decimals > 0 {
            score /= 2;
        }
        if score > best.1 {
            best = (delim, score);
        }
    }
    best.0
}

/// Header width times the rows that match it; 0 when the header does not split.
fn split_score(sample: &[&str], delim: u8) -> usize {
    let widths: Vec<usize> = sample
        .iter()
        .map(|line| {
            csv::ReaderBuilder::new()
                .delimiter(delim)
                .has_headers(false)
                .flexible(true)
                .from_reader(line.as_bytes())
                .records()
                .next()
                .and_then(|r| r.ok())
                .map_or(1, |r| r.len())
        })
        .collect();

    match widths.first() {
        Some(&header) if header > 1 => header * widths.iter().filter(|&&w| w == header).count(),
        _ => 0,
    }
}

/// Occurrences of a digit, a comma and exactly two digits (`900,00`) outside
/// double quotes.
fn decimal_commas(line: &str) -> usize {
    let bytes = line.as_bytes();
    let mut quoted = false;
    let mut found = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'"' {
            quoted = !quoted;
            continue;
        }
        if quoted || b != b',' || i == 0 || !bytes[i - 1].is_ascii_digit() {
            continue;
        }
        let cents = bytes.get(i + 1..i + 3).is_some_and(|d| d.iter().all(u8::is_ascii_digit));
        let closed = bytes.get(i + 3).map_or(true, |b| !b.is_ascii_digit());
        if cents && closed {
            found += 1;
        }
    }
    found
}

/// Read file and convert to UTF-8 if needed (Excel exports are often Windows-1252).
pub fn read_file_as_utf8(path: &Path) -> Result<String, ReadError> {
    let mut file = std::fs::File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    let bytes = match bytes.strip_prefix(b"\xEF\xBB\xBF") {
        Some(rest) => rest.to_vec(),
        None => bytes,
    };

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            log::debug!("{} is not UTF-8, decoding as Windows-1252", path.display());
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

/// Parse delimited text into a grid. Plain numerals become numbers; the
/// rest stays text, empty fields become empty cells.
pub fn parse(content: &str, delimiter: u8) -> Result<Grid, ReadError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut grid = Grid::new();
    for result in reader.records() {
        let record = result.map_err(|e| ReadError::Csv(e.to_string()))?;
        grid.push(record.iter().map(infer_cell).collect());
    }
    Ok(grid)
}

/// `1500`, `-12`, `1500.5` are numbers. A dot followed by exactly three
/// digits (`1.500`) reads as a thousands group and stays text, as do
/// comma decimals and currency strings.
fn infer_cell(field: &str) -> CellValue {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return CellValue::Empty;
    }

    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };

    let int_ok = !int_part.is_empty() && int_part.bytes().all(|b| b.is_ascii_digit());
    let frac_ok = match frac_part {
        None => true,
        Some(f) => !f.is_empty() && f.len() != 3 && f.bytes().all(|b| b.is_ascii_digit()),
    };

    if int_ok && frac_ok {
        if let Ok(n) = trimmed.parse::<f64>() {
            // Hundreds of digits overflow; leave those to the normalizer as text
            if n.is_finite() {
                return CellValue::Number(n);
            }
        }
    }
    CellValue::Text(field.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_sniff_semicolon_delimiter() {
        let content = "Nome;Valor;Vencimento\nAna;R$ 1.500,00;05/03/2024\nBruno;R$ 900,00;10/03/2024\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_sniff_prefers_semicolon_over_decimal_commas() {
        // Comma splits every line into three consistent fields here
        let content = "Aluno, turma;Valor, R$\nAna, 5A;1.500,00\nBia, 6B;980,50\nCaio, 7C;2.000,00\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_decimal_comma_count() {
        assert_eq!(decimal_commas("Ana;1.500,00;980,5"), 1);
        assert_eq!(decimal_commas("Ana;\"1.500,00\";x"), 0);
        assert_eq!(decimal_commas("1,234,567"), 0);
        assert_eq!(decimal_commas("a,b,c"), 0);
        assert_eq!(decimal_commas("R$ 900,00"), 1);
    }

    #[test]
    fn test_sniff_comma_delimiter() {
        let content = "Name,Age,City\nAlice,30,Paris\nBob,25,London\n";
        assert_eq!(sniff_delimiter(content), b',');
    }

    #[test]
    fn test_sniff_tab_delimiter() {
        let content = "Name\tAge\tCity\nAlice\t30\tParis\n";
        assert_eq!(sniff_delimiter(content), b'\t');
    }

    #[test]
    fn test_sniff_single_column_defaults_to_comma() {
        assert_eq!(sniff_delimiter("Name\nAlice\nBob\n"), b',');
        assert_eq!(sniff_delimiter(""), b',');
    }

    #[test]
    fn test_infer_cells() {
        assert_eq!(infer_cell("2000"), CellValue::Number(2000.0));
        assert_eq!(infer_cell("-12.5"), CellValue::Number(-12.5));
        assert_eq!(infer_cell(" 45358 "), CellValue::Number(45358.0));
        assert_eq!(infer_cell("1.500"), CellValue::text("1.500"));
        assert_eq!(infer_cell("1500,00"), CellValue::text("1500,00"));
        assert_eq!(infer_cell("R$ 1.500,00"), CellValue::text("R$ 1.500,00"));
        assert_eq!(infer_cell("05/03/2024"), CellValue::text("05/03/2024"));
        assert_eq!(infer_cell("1e5"), CellValue::text("1e5"));
        assert_eq!(infer_cell(""), CellValue::Empty);
        assert_eq!(infer_cell("-"), CellValue::text("-"));
        let huge = "9".repeat(400);
        assert_eq!(infer_cell(&huge), CellValue::text(huge.clone()));
    }

    #[test]
    fn test_read_windows_1252() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        // "Série;João\n" in Windows-1252
        fs::write(&path, b"S\xe9rie;Jo\xe3o\n5A;Ana\n").unwrap();

        let grid = read(&path).unwrap();
        assert_eq!(grid[0], vec![CellValue::text("Série"), CellValue::text("João")]);
        assert_eq!(grid[1][1], CellValue::text("Ana"));
    }

    #[test]
    fn test_read_utf8_bom_and_ragged_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bom.csv");
        fs::write(&path, "\u{feff}a,b,c\n1,2\n,,,x\n").unwrap();

        let grid = read(&path).unwrap();
        assert_eq!(grid[0][0], CellValue::text("a"));
        assert_eq!(grid[1], vec![CellValue::Number(1.0), CellValue::Number(2.0)]);
        assert_eq!(grid[2][3], CellValue::text("x"));
        assert_eq!(grid[2][0], CellValue::Empty);
    }

    #[test]
    fn test_tsv_extension_forces_tab() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.tsv");
        fs::write(&path, "a,b\tc\n1,5\t2\n").unwrap();

        let grid = read(&path).unwrap();
        assert_eq!(grid[0], vec![CellValue::text("a,b"), CellValue::text("c")]);
        assert_eq!(grid[1][1], CellValue::Number(2.0));
    }
}
