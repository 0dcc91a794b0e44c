use pnl_hierarchy::{ExtractionReport, ExtractorConfig, HierarchyExtractor};
use std::env;
use std::process;

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("usage: extract_workbook <workbook.xlsx|.csv>... [--config tuning.json] [--csv|--json]");
        process::exit(2);
    }

    let mut files = Vec::new();
    let mut config = ExtractorConfig::default();
    let mut format = "markdown";
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let Some(path) = iter.next() else {
                    eprintln!("--config needs a path");
                    process::exit(2);
                };
                config = ExtractorConfig::from_file(path).unwrap_or_else(|e| {
                    eprintln!("{}", e);
                    process::exit(2);
                });
            }
            "--csv" => format = "csv",
            "--json" => format = "json",
            _ => files.push(arg.clone()),
        }
    }

    let extractor = HierarchyExtractor::new(config).expect("configuration was validated on load");
    let years = extractor.extract_files(&files);
    if years.is_empty() {
        eprintln!("No data extracted");
        process::exit(1);
    }

    let report = ExtractionReport::new(&years);
    let output = match format {
        "csv" => report.to_csv(),
        "json" => report.to_json(),
        _ => Ok(report.to_markdown()),
    };

    match output {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}
