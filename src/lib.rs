#![crate_name = "worldpicker"]

pub mod archive;
pub mod config;
pub mod error;
pub mod pickle;
pub mod pipeline;
pub mod report;

pub use config::Config;
pub use error::{FormatError, FormatErrorKind, PipelineError, ReportError};
pub use pipeline::{run, Outcome};

#[cfg(test)]
mod tests {
    use crate::archive::Archive;
    use crate::pickle::{loads, Node};
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::prelude::*;

    use log;
    use test_log::test;

    #[test]
    fn decode_minimal_archive() {
        // {'spheres': []}
        let stream = b"\x80\x04\x95\x10\x00\x00\x00\x00\x00\x00\x00}\x94\x8c\x07spheres\x94]\x94s.";
        let mut encoder = ZlibEncoder::new(vec![3u8], Compression::best());
        encoder.write_all(stream).unwrap();
        let bytes = encoder.finish().unwrap();

        let archive = Archive::from_bytes(bytes);
        let graph = loads(&archive.payload).unwrap();
        log::info!("{}", crate::pickle::repr(&graph, graph.root()));

        let spheres = graph.item(graph.root(), "spheres").unwrap();
        assert!(matches!(graph.deref(spheres), Some(Node::List(items)) if items.is_empty()));
    }
}
