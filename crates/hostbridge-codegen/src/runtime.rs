//! The C++ handle registry shipped next to every generated bridge.

use hostbridge_core::HostType;

use crate::emit::OutputFile;
use crate::summary::{EntryKind, EntryParam, EntryPoint};

pub const HEADER_NAME: &str = "hb_runtime.h";
pub const SOURCE_NAME: &str = "hb_runtime.cpp";

const HEADER: &str = include_str!("../runtime/hb_runtime.h");
const SOURCE: &str = include_str!("../runtime/hb_runtime.cpp");

pub fn files() -> [OutputFile; 2] {
    [
        OutputFile {
            name: HEADER_NAME.to_string(),
            contents: HEADER.to_string(),
        },
        OutputFile {
            name: SOURCE_NAME.to_string(),
            contents: SOURCE.to_string(),
        },
    ]
}

/// Registry lifecycle symbols exported by the runtime itself.
pub fn entry_points() -> Vec<EntryPoint> {
    let lifecycle = |name: &str, params: Vec<EntryParam>| EntryPoint {
        symbol: format!("hb_{name}"),
        display_name: name.to_string(),
        kind: EntryKind::Runtime,
        native: None,
        params,
        returns: HostType::Number,
        unsupported: vec![],
    };
    vec![
        lifecycle("init", vec![]),
        lifecycle("shutdown", vec![]),
        lifecycle(
            "release",
            vec![EntryParam {
                name: "handle".to_string(),
                host_type: HostType::String,
            }],
        ),
        lifecycle("flush", vec![]),
    ]
}
