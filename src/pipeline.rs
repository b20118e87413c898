//! End-to-end processing of one archive file
//!
//! read -> unpack -> decode -> report. Side outputs (raw and decoded dumps)
//! are best-effort: a failed write is logged and the run carries on.

use crate::archive::{Archive, PayloadSource};
use crate::config::Config;
use crate::error::PipelineError;
use crate::pickle::repr::{DEFAULT_INDENT, DEFAULT_WIDTH};
use crate::pickle::{disassemble, loads, pretty};
use crate::report::{build_report, ReportOptions};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub report_path: PathBuf,
    pub version: u8,
    pub source: PayloadSource,
    pub sphere_count: usize,
    pub unresolved_slots: Vec<i64>,
    /// Side outputs that were actually written
    pub raw_dump: Option<PathBuf>,
    pub decoded_dump: Option<PathBuf>,
}

pub fn run(config: &Config) -> Result<Outcome, PipelineError> {
    info!("Processing: {}", config.input.display());
    let archive = Archive::open(&config.input)?;

    let raw_dump = if config.write_raw_dump {
        write_side_output("raw stream", &config.raw_dump_path, &archive.payload)
    } else {
        None
    };

    let graph = match loads(&archive.payload) {
        Ok(graph) => graph,
        Err(format_error) => {
            return Err(match archive.inflate_error {
                Some(inflate) => PipelineError::Decompression {
                    inflate,
                    fallback: format_error,
                },
                None => PipelineError::Format(format_error),
            })
        }
    };
    if archive.source == PayloadSource::Raw {
        warn!("Input was decoded as an uncompressed stream, not as an archive");
    }
    info!("Unpickling successful ({} objects)", graph.len());

    let decoded_dump = if config.write_decoded_dump {
        let text = pretty(&graph, graph.root(), DEFAULT_WIDTH, DEFAULT_INDENT);
        write_side_output("decoded dump", &config.decoded_dump_path, text.as_bytes())
    } else {
        None
    };

    let options = ReportOptions {
        ranking: config.ranking,
    };
    let report = build_report(&graph, &config.source_name(), &options)?;

    if !report.unresolved_slots.is_empty() {
        warn!(
            "{} player slot(s) could not be resolved: {:?}; stream head follows\n{}",
            report.unresolved_slots.len(),
            report.unresolved_slots,
            disassemble(&archive.payload, config.disassembly_bytes)
        );
    }

    fs::write(&config.report_path, &report.text).map_err(|e| PipelineError::Io {
        path: config.report_path.clone(),
        source: e,
    })?;
    info!("Report written to {}", config.report_path.display());

    Ok(Outcome {
        report_path: config.report_path.clone(),
        version: archive.version,
        source: archive.source,
        sphere_count: report.sphere_count,
        unresolved_slots: report.unresolved_slots,
        raw_dump,
        decoded_dump,
    })
}

/// Best-effort write; returns the path only if the file was written
fn write_side_output(what: &str, path: &Path, bytes: &[u8]) -> Option<PathBuf> {
    match fs::write(path, bytes) {
        Ok(()) => {
            info!("Wrote {} to {}", what, path.display());
            Some(path.to_path_buf())
        }
        Err(e) => {
            warn!("Could not write {} to {}: {}", what, path.display(), e);
            None
        }
    }
}
