use pdf_split::{parse_ranges, Document};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() != 4 {
        eprintln!("PDF page splitter");
        eprintln!("Usage: {} <input.pdf> <ranges> <output.pdf>", args[0]);
        eprintln!();
        eprintln!("Ranges are 1-based and inclusive, e.g. \"2-4,7\" extracts");
        eprintln!("pages 2, 3, 4 and 7 in that order.");
        process::exit(1);
    }

    let input = &args[1];
    let spec = &args[2];
    let output = PathBuf::from(&args[3]);

    let ranges = match parse_ranges(spec) {
        Ok(ranges) => ranges,
        Err(e) => {
            eprintln!("Error: bad range specification: {}", e);
            process::exit(1);
        }
    };

    let doc = match Document::open_file(input) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error: cannot open {}: {}", input, e);
            process::exit(1);
        }
    };

    let bytes = match doc.split_ranges(&ranges) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: split failed: {}", e);
            process::exit(1);
        }
    };

    // Write via a sibling temp file renamed into place, so a failure never
    // leaves a partial output visible.
    let tmp = output.with_file_name(format!(
        "{}.tmp",
        output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output.pdf".to_string())
    ));
    if let Err(e) = fs::write(&tmp, &bytes).and_then(|_| fs::rename(&tmp, &output)) {
        let _ = fs::remove_file(&tmp);
        eprintln!("Error: cannot write {}: {}", output.display(), e);
        process::exit(1);
    }

    let extracted: usize = ranges
        .iter()
        .map(|(start, end)| start.max(end) - start.min(end) + 1)
        .sum();
    println!(
        "{}: {} pages -> {}: {} pages",
        input,
        doc.page_count(),
        output.display(),
        extracted
    );
}
