//! Constructor and accessor shims for residual native types.

use hostbridge_core::decl::strip_namespace;
use hostbridge_core::{HostType, NativeKind, NativeType};

use crate::emit::CppWriter;
use crate::naming;
use crate::summary::{EntryKind, EntryParam, EntryPoint};

fn param(name: &str, host_type: HostType) -> EntryParam {
    EntryParam {
        name: name.to_string(),
        host_type,
    }
}

/// `hb_create_T` for every native type, plus get/set for scalars.
pub fn emit_native(w: &mut CppWriter, native: &NativeType, namespace: &str) -> Vec<EntryPoint> {
    let ty = &native.name;
    let tag = naming::cxx_string(&naming::tag(ty));
    let display = naming::ident(&strip_namespace(ty, namespace));
    let entry = |symbol: String, display_name: String, kind, params, returns| EntryPoint {
        symbol,
        display_name,
        kind,
        native: Some(ty.clone()),
        params,
        returns,
        unsupported: vec![],
    };
    let lookup = format!("auto* hb_v = static_cast<{ty}*>(hb::Registry::instance().retrieve(handle));");

    let create = entry(
        naming::create(ty),
        format!("create_{display}"),
        EntryKind::Create,
        vec![],
        HostType::String,
    );
    w.open(format!("HB_EXPORT {} {{", create.prototype()));
    w.line(format!("return hb::store_pointer({tag}, new {ty}());"));
    w.close("}");
    w.blank();

    let (value_type, read, write) = match native.kind {
        NativeKind::Opaque => return vec![create],
        NativeKind::Numeric => (
            HostType::Number,
            "return static_cast<double>(*hb_v);".to_string(),
            format!("*hb_v = static_cast<{ty}>(value);"),
        ),
        NativeKind::Oversized => {
            let (wide, parse) = if naming::is_unsigned(ty) {
                ("std::uint64_t", "hb::parse_u64")
            } else {
                ("std::int64_t", "hb::parse_i64")
            };
            (
                HostType::String,
                "return hb::ret_text(std::to_string(*hb_v));".to_string(),
                format!(
                    "{wide} hb_t = 0;\nif (!{parse}(value, hb_t)) return HB_NAN;\n*hb_v = static_cast<{ty}>(hb_t);"
                ),
            )
        }
    };

    let get = entry(
        naming::getter(ty),
        format!("{display}_get"),
        EntryKind::Get,
        vec![param("handle", HostType::String)],
        value_type,
    );
    let miss = match value_type {
        HostType::Number => "HB_NAN",
        HostType::String => "\"\"",
    };
    w.open(format!("HB_EXPORT {} {{", get.prototype()));
    w.line(&lookup);
    w.line(format!("if (!hb_v) return {miss};"));
    w.line(read);
    w.close("}");
    w.blank();

    let set = entry(
        naming::setter(ty),
        format!("{display}_set"),
        EntryKind::Set,
        vec![param("handle", HostType::String), param("value", value_type)],
        HostType::Number,
    );
    w.open(format!("HB_EXPORT {} {{", set.prototype()));
    w.line(&lookup);
    w.line("if (!hb_v) return HB_NAN;");
    for line in write.lines() {
        w.line(line);
    }
    w.line("return 1.0;");
    w.close("}");
    w.blank();

    vec![create, get, set]
}
