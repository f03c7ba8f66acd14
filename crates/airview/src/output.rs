use std::io::{self, IsTerminal, Write};

use airview_frame::{parse_response, RawMessage};
use airview_session::{DeviceInfo, ProbeReport, ScanSample};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn render_device_info(info: &DeviceInfo, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(info),
        OutputFormat::Table => {
            let mut table = new_table(vec!["FIELD", "VALUE"]);
            table
                .add_row(vec!["USB ID".to_string(), info.usb_id.clone()])
                .add_row(vec!["Firmware".to_string(), info.firmware_version.clone()])
                .add_row(vec!["Firmware date".to_string(), info.firmware_date.clone()])
                .add_row(vec!["Hardware".to_string(), info.hardware_version.clone()])
                .add_row(vec!["RF start".to_string(), format!("{} MHz", info.rf_start_mhz)])
                .add_row(vec!["RF end".to_string(), format!("{} MHz", info.rf_end_mhz)])
                .add_row(vec![
                    "Channel spacing".to_string(),
                    format!("{} MHz", info.rf_channel_spacing_mhz),
                ])
                .add_row(vec![
                    "Samples per scan".to_string(),
                    info.rf_sample_count.to_string(),
                ]);
            table.to_string()
        }
        OutputFormat::Pretty => [
            "Device Info:".to_string(),
            format!("  USB ID:           {}", info.usb_id),
            format!(
                "  Firmware:         {} ({})",
                info.firmware_version, info.firmware_date
            ),
            format!("  Hardware:         {}", info.hardware_version),
            format!(
                "  RF range:         {} - {} MHz, {} MHz spacing",
                info.rf_start_mhz, info.rf_end_mhz, info.rf_channel_spacing_mhz
            ),
            format!("  Samples per scan: {}", info.rf_sample_count),
        ]
        .join("\n"),
        OutputFormat::Raw => info.usb_id.clone(),
    }
}

pub fn print_device_info(info: &DeviceInfo, format: OutputFormat) {
    println!("{}", render_device_info(info, format));
}

#[derive(Serialize)]
struct SampleOutput<'a> {
    batch: u64,
    samples: usize,
    rssi: &'a [i32],
}

pub fn render_sample(batch: u64, sample: &ScanSample, format: OutputFormat) -> String {
    let peak = sample
        .rssi
        .iter()
        .enumerate()
        .max_by_key(|(_, rssi)| **rssi);
    let min = sample.rssi.iter().min();

    match format {
        OutputFormat::Json => to_json(&SampleOutput {
            batch,
            samples: sample.len(),
            rssi: &sample.rssi,
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["BATCH", "SAMPLES", "MIN", "PEAK", "PEAK BIN"]);
            table.add_row(vec![
                batch.to_string(),
                sample.len().to_string(),
                optional(min),
                optional(peak.map(|(_, rssi)| rssi)),
                optional(peak.map(|(bin, _)| bin)),
            ]);
            table.to_string()
        }
        OutputFormat::Pretty => format!(
            "batch={} samples={} min={} peak={} peak_bin={}",
            batch,
            sample.len(),
            optional(min),
            optional(peak.map(|(_, rssi)| rssi)),
            optional(peak.map(|(bin, _)| bin)),
        ),
        OutputFormat::Raw => sample
            .rssi
            .iter()
            .map(i32::to_string)
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Write one batch to stdout. Fails once the reader of stdout is gone.
pub fn print_sample(batch: u64, sample: &ScanSample, format: OutputFormat) -> io::Result<()> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", render_sample(batch, sample, format))?;
    out.flush()
}

#[derive(Serialize)]
struct ParsedOutput {
    command_id: String,
    info: String,
    payload: String,
}

#[derive(Serialize)]
struct ResponseOutput<'a> {
    command: &'a str,
    response: String,
    parsed: Option<ParsedOutput>,
}

fn response_output<'a>(command: &'a str, response: &RawMessage) -> ResponseOutput<'a> {
    let parsed = parse_response(response).ok().map(|parsed| ParsedOutput {
        payload: String::from_utf8_lossy(&parsed.payload).into_owned(),
        command_id: parsed.command_id,
        info: parsed.info,
    });
    ResponseOutput {
        command,
        response: response.to_text(),
        parsed,
    }
}

pub fn render_response(command: &str, response: &RawMessage, format: OutputFormat) -> String {
    let out = response_output(command, response);
    match format {
        OutputFormat::Json => to_json(&out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["COMMAND", "ID", "INFO", "PAYLOAD"]);
            match &out.parsed {
                Some(parsed) => table.add_row(vec![
                    command.to_string(),
                    parsed.command_id.clone(),
                    parsed.info.clone(),
                    parsed.payload.clone(),
                ]),
                None => table.add_row(vec![
                    command.to_string(),
                    "-".to_string(),
                    "-".to_string(),
                    out.response.clone(),
                ]),
            };
            table.to_string()
        }
        OutputFormat::Pretty => match &out.parsed {
            Some(parsed) => format!(
                "{command}: id={} info={} payload={}",
                parsed.command_id, parsed.info, parsed.payload
            ),
            None => format!("{command}: unparsed response {:?}", out.response),
        },
        OutputFormat::Raw => out.response,
    }
}

pub fn print_response(command: &str, response: &RawMessage, format: OutputFormat) {
    println!("{}", render_response(command, response, format));
}

#[derive(Serialize)]
struct ProbeOutput<'a> {
    checked: u64,
    cancelled: bool,
    found: Vec<ResponseOutput<'a>>,
}

pub fn render_probe(report: &ProbeReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(&ProbeOutput {
            checked: report.checked,
            cancelled: report.cancelled,
            found: report
                .found
                .iter()
                .map(|(command, response)| response_output(command, response))
                .collect(),
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["COMMAND", "RESPONSE"]);
            for (command, response) in &report.found {
                table.add_row(vec![command.clone(), response.to_text()]);
            }
            format!(
                "{table}\nchecked {} commands, {} answered{}",
                report.checked,
                report.found.len(),
                if report.cancelled { " (cancelled)" } else { "" }
            )
        }
        OutputFormat::Pretty => {
            let mut lines = vec![format!(
                "Found {} commands in {} probes{}:",
                report.found.len(),
                report.checked,
                if report.cancelled { " (cancelled)" } else { "" }
            )];
            lines.extend(
                report
                    .found
                    .iter()
                    .map(|(command, response)| format!("  {command}: {response}")),
            );
            lines.join("\n")
        }
        OutputFormat::Raw => report
            .found
            .iter()
            .map(|(command, _)| command.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

pub fn print_probe(report: &ProbeReport, format: OutputFormat) {
    println!("{}", render_probe(report, format));
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
