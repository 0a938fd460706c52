use std::io::{self, Read, Write};
use std::path::PathBuf;

use repofeat::{
    build_dataset_from_path, init_logging, log_app_start, log_store_selected,
    logging_config_from_env, DatasetOutput, DatasetRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Csv,
}

impl OutputFormat {
    fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start(&logging_cfg);

    let store_path = std::env::var("REPOFEAT_STORE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/repos.sqlite"));
    let format = output_format_from_env()?;
    log_store_selected(&store_path, format.as_str());

    let raw = read_request()?;
    let mut request = DatasetRequest::from_json(&raw)?;
    if request.expected_schema_fingerprint.is_none() {
        request.expected_schema_fingerprint =
            std::env::var("REPOFEAT_EXPECTED_FINGERPRINT").ok();
    }
    let output = build_dataset_from_path(&store_path, &request)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Json => {
            serde_json::to_writer(&mut out, &output.pairs)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => write_csv(&mut out, &output)?,
    }
    out.flush()?;

    Ok(())
}

fn output_format_from_env() -> Result<OutputFormat, Box<dyn std::error::Error>> {
    match std::env::var("REPOFEAT_OUTPUT_FORMAT") {
        Err(_) => Ok(OutputFormat::Json),
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "" | "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!("unsupported REPOFEAT_OUTPUT_FORMAT `{other}`").into()),
        },
    }
}

/// Request JSON comes from the file named by the first argument, else stdin.
fn read_request() -> Result<String, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut raw = String::new();
            io::stdin().read_to_string(&mut raw)?;
            Ok(raw)
        }
    }
}

fn write_csv<W: Write>(out: W, output: &DatasetOutput) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = csv::Writer::from_writer(out);

    let mut header = vec!["repo_id".to_string(), "label".to_string()];
    for idx in 0..output.schema.vector_len {
        header.push(
            output
                .schema
                .column_name(idx)
                .ok_or("schema column index out of range")?,
        );
    }
    writer.write_record(&header)?;

    for pair in &output.pairs {
        let mut record = Vec::with_capacity(pair.features.len() + 2);
        record.push(pair.repo_id.to_string());
        record.push(pair.label.to_string());
        record.extend(pair.features.iter().map(|value| value.to_string()));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}
