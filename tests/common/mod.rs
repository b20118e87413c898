//! Shared helpers for the integration tests: a small protocol 4 stream
//! writer and archive/scratch-directory utilities.

#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Hand-assembles a serialized stream opcode by opcode
pub struct PickleWriter {
    buf: Vec<u8>,
}

impl PickleWriter {
    /// Starts with PROTO 4
    pub fn new() -> Self {
        PickleWriter {
            buf: vec![0x80, 4],
        }
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn mark(&mut self) -> &mut Self {
        self.raw(b"(")
    }

    pub fn none(&mut self) -> &mut Self {
        self.raw(b"N")
    }

    pub fn int(&mut self, v: i64) -> &mut Self {
        if (0..=0xff).contains(&v) {
            self.raw(&[b'K', v as u8])
        } else if let Ok(small) = i32::try_from(v) {
            self.raw(b"J").raw(&small.to_le_bytes())
        } else {
            self.raw(&[0x8a, 8]).raw(&v.to_le_bytes())
        }
    }

    pub fn str(&mut self, s: &str) -> &mut Self {
        if s.len() < 256 {
            self.raw(&[0x8c, s.len() as u8]).raw(s.as_bytes())
        } else {
            self.raw(b"X")
                .raw(&(s.len() as u32).to_le_bytes())
                .raw(s.as_bytes())
        }
    }

    pub fn empty_dict(&mut self) -> &mut Self {
        self.raw(b"}")
    }

    pub fn empty_list(&mut self) -> &mut Self {
        self.raw(b"]")
    }

    pub fn empty_set(&mut self) -> &mut Self {
        self.raw(&[0x8f])
    }

    pub fn tuple2(&mut self) -> &mut Self {
        self.raw(&[0x86])
    }

    pub fn append(&mut self) -> &mut Self {
        self.raw(b"a")
    }

    pub fn setitem(&mut self) -> &mut Self {
        self.raw(b"s")
    }

    pub fn setitems(&mut self) -> &mut Self {
        self.raw(b"u")
    }

    pub fn additems(&mut self) -> &mut Self {
        self.raw(&[0x90])
    }

    /// STACK_GLOBAL module.name
    pub fn global(&mut self, module: &str, name: &str) -> &mut Self {
        self.str(module).str(name).raw(&[0x93])
    }

    pub fn newobj(&mut self) -> &mut Self {
        self.raw(&[0x81])
    }

    pub fn build(&mut self) -> &mut Self {
        self.raw(b"b")
    }

    pub fn memoize(&mut self) -> &mut Self {
        self.raw(&[0x94])
    }

    pub fn get(&mut self, id: u32) -> &mut Self {
        match u8::try_from(id) {
            Ok(small) => self.raw(&[b'h', small]),
            Err(_) => self.raw(b"j").raw(&id.to_le_bytes()),
        }
    }

    /// Appends STOP and returns the stream
    pub fn stop(&mut self) -> Vec<u8> {
        self.raw(b".");
        self.buf.clone()
    }
}

/// `NetUtils.NetworkSlot(name, game)`
pub fn network_slot(w: &mut PickleWriter, name: &str, game: &str) {
    w.global("NetUtils", "NetworkSlot")
        .str(name)
        .str(game)
        .tuple2()
        .newobj();
}

/// Session with one game, one player and one sphere:
///
/// ```text
/// {'datapackage': {'GameA': {'location_name_to_id': {'End': 101, 'Start': 100}}},
///  'slot_info': {1: NetworkSlot('Alice', 'GameA')},
///  'spheres': [{1: {101, 100}}]}
/// ```
pub fn alice_session() -> Vec<u8> {
    let mut w = PickleWriter::new();
    w.empty_dict().mark();

    w.str("datapackage")
        .empty_dict()
        .str("GameA")
        .empty_dict()
        .str("location_name_to_id")
        .empty_dict()
        .mark()
        .str("End")
        .int(101)
        .str("Start")
        .int(100)
        .setitems()
        .setitem()
        .setitem();

    w.str("slot_info").empty_dict().int(1);
    network_slot(&mut w, "Alice", "GameA");
    w.setitem();

    w.str("spheres")
        .empty_list()
        .empty_dict()
        .int(1)
        .empty_set()
        .mark()
        .int(101)
        .int(100)
        .additems()
        .setitem()
        .append();

    w.setitems().stop()
}

/// Version tag followed by the zlib-compressed stream
pub fn archive_bytes(version: u8, stream: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(vec![version], Compression::default());
    encoder.write_all(stream).unwrap();
    encoder.finish().unwrap()
}

/// Fresh per-test directory under the system temp dir
pub fn scratch_dir(test_name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "worldpicker-{}-{}",
        test_name,
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}
