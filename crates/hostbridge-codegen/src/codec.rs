//! Per-struct JSON codecs and struct entry points.
//!
//! Each reachable struct `S` gets static `hb_encode_S`/`hb_decode_S`
//! functions over `nlohmann::json`, plus exported constructor and
//! to/from-JSON entry points that operate on registry handles. Fixed arrays
//! are addressed through their flattened element pointer so their capacity
//! always comes from `sizeof`, whatever expression declared it.

use std::collections::BTreeSet;

use hostbridge_core::ctype::ANONYMOUS;
use hostbridge_core::decl::strip_namespace;
use hostbridge_core::{ClassifiedField, ClassifiedStruct, HostType, MarshalCategory, TypeClassification};

use crate::emit::CppWriter;
use crate::naming;
use crate::summary::{EntryKind, EntryParam, EntryPoint};

/// How one stored value is carried in JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Storage {
    Number { is_enum: bool },
    DecimalText { unsigned: bool },
    /// Nested by-value struct with its own codec.
    Nested(String),
    /// Pointer or function pointer exported as a handle.
    Handle(String),
    /// Unresolved by-value storage: handle to the field's address.
    Address(String),
    Skip(&'static str),
}

fn storage(class: &TypeClassification, codecs: &BTreeSet<&str>) -> Storage {
    if class.canonical_type == ANONYMOUS {
        return Storage::Skip("anonymous type");
    }
    match class.category {
        MarshalCategory::Numeric => Storage::Number {
            is_enum: class.is_enum,
        },
        MarshalCategory::OversizedNumeric => Storage::DecimalText {
            unsigned: naming::is_unsigned(&class.canonical_type),
        },
        MarshalCategory::StringRef if class.has_pointer || class.is_function_pointer => {
            Storage::Handle(naming::tag(&class.canonical_type))
        }
        MarshalCategory::StringRef if class.is_struct_value() && codecs.contains(class.canonical_type.as_str()) => {
            Storage::Nested(class.canonical_type.clone())
        }
        MarshalCategory::StringRef => Storage::Address(naming::tag(&class.canonical_type)),
        MarshalCategory::Void => Storage::Skip("void storage"),
    }
}

/// JSON value for an lvalue `x`.
fn encode_expr(storage: &Storage, x: &str) -> String {
    match storage {
        Storage::Number { is_enum: true } => format!("static_cast<std::int64_t>({x})"),
        Storage::Number { is_enum: false } => x.to_string(),
        Storage::DecimalText { .. } => format!("std::to_string({x})"),
        Storage::Nested(name) => format!("{}({x})", naming::encoder(name)),
        Storage::Handle(tag) => format!(
            "{x} ? hb::Registry::instance().store({}, (void*){x}) : std::string()",
            naming::cxx_string(tag)
        ),
        Storage::Address(tag) => format!(
            "hb::Registry::instance().store({}, (void*)&{x})",
            naming::cxx_string(tag)
        ),
        Storage::Skip(_) => "nullptr".to_string(),
    }
}

/// Assign JSON value `j` into lvalue `x`.
fn decode_stmt(w: &mut CppWriter, storage: &Storage, x: &str, j: &str) {
    let target = format!("std::remove_reference_t<decltype({x})>");
    match storage {
        Storage::Number { is_enum: true } => {
            w.line(format!("{x} = static_cast<{target}>({j}.get<std::int64_t>());"));
        }
        Storage::Number { is_enum: false } => {
            w.line(format!("{x} = static_cast<{target}>({j}.get<double>());"));
        }
        Storage::DecimalText { unsigned } => {
            let (ty, parse) = if *unsigned {
                ("std::uint64_t", "hb::parse_u64")
            } else {
                ("std::int64_t", "hb::parse_i64")
            };
            w.open("{");
            w.line(format!("{ty} hb_t = 0;"));
            w.open(format!(
                "if ({j}.is_string() && {parse}({j}.get_ref<const std::string&>().c_str(), hb_t)) {{"
            ));
            w.line(format!("{x} = static_cast<{target}>(hb_t);"));
            w.close("}");
            w.close("}");
        }
        Storage::Nested(name) => {
            w.line(format!("{}({j}, {x});", naming::decoder(name)));
        }
        Storage::Handle(_) => {
            w.line(format!(
                "{x} = ({target})hb::Registry::instance().retrieve({j}.get<std::string>().c_str());"
            ));
        }
        Storage::Address(_) => {
            w.open("{");
            w.line(format!(
                "void* hb_src = hb::Registry::instance().retrieve({j}.get<std::string>().c_str());"
            ));
            w.open("if (hb_src) {");
            w.line(format!("{x} = *static_cast<{target}*>(hb_src);"));
            w.close("}");
            w.close("}");
        }
        Storage::Skip(_) => {}
    }
}

fn is_char_array(field: &ClassifiedField) -> bool {
    field
        .element
        .as_ref()
        .is_some_and(|e| e.canonical_type == "char" && !e.has_pointer)
}

/// Read-only storage cannot be decoded into.
fn is_const_storage(class: &TypeClassification) -> bool {
    class.has_const && !class.has_pointer
}

fn encode_field(w: &mut CppWriter, field: &ClassifiedField, codecs: &BTreeSet<&str>) {
    let key = naming::cxx_string(&field.name);
    let member = format!("v.{}", field.name);
    let Some(element) = field.element.as_ref().filter(|_| field.array_size.is_some()) else {
        match storage(&field.classification, codecs) {
            Storage::Skip(reason) => {
                w.line(format!("// {}: {reason}", field.name));
            }
            s => {
                w.line(format!("j[{key}] = {};", encode_expr(&s, &member)));
            }
        }
        return;
    };

    let elem = storage(element, codecs);
    if let Storage::Skip(reason) = elem {
        w.line(format!("// {}: {reason}", field.name));
        return;
    }
    w.open("{");
    w.line(format!(
        "const auto* hb_p = reinterpret_cast<const std::remove_all_extents_t<decltype({member})>*>(&{member});"
    ));
    w.line(format!("const std::size_t hb_count = sizeof({member}) / sizeof(*hb_p);"));
    if is_char_array(field) {
        let array = format!("std::remove_reference_t<decltype({member})>");
        w.line(format!("constexpr std::size_t hb_rank = std::rank_v<{array}>;"));
        w.line(format!("constexpr std::size_t hb_row = std::extent_v<{array}, hb_rank - 1>;"));
        w.open("if constexpr (hb_rank == 1) {");
        w.line(format!("j[{key}] = std::string(hb_p, strnlen(hb_p, hb_count));"));
        w.close_open("} else {");
        w.line("nlohmann::json hb_a = nlohmann::json::array();");
        w.open("for (std::size_t hb_i = 0; hb_i + hb_row <= hb_count; hb_i += hb_row) {");
        w.line("hb_a.push_back(std::string(hb_p + hb_i, strnlen(hb_p + hb_i, hb_row)));");
        w.close("}");
        w.line(format!("j[{key}] = std::move(hb_a);"));
        w.close("}");
    } else {
        w.line("nlohmann::json hb_a = nlohmann::json::array();");
        w.open("for (std::size_t hb_i = 0; hb_i < hb_count; ++hb_i) {");
        w.line(format!("hb_a.push_back({});", encode_expr(&elem, "hb_p[hb_i]")));
        w.close("}");
        w.line(format!("j[{key}] = std::move(hb_a);"));
    }
    w.close("}");
}

fn decode_field(w: &mut CppWriter, field: &ClassifiedField, codecs: &BTreeSet<&str>) {
    let key = naming::cxx_string(&field.name);
    let member = format!("v.{}", field.name);
    let Some(element) = field.element.as_ref().filter(|_| field.array_size.is_some()) else {
        let s = storage(&field.classification, codecs);
        if matches!(s, Storage::Skip(_)) || is_const_storage(&field.classification) {
            return;
        }
        w.open(format!("if (j.contains({key})) {{"));
        w.line(format!("const nlohmann::json& hb_j = j.at({key});"));
        decode_stmt(w, &s, &member, "hb_j");
        w.close("}");
        return;
    };

    let elem = storage(element, codecs);
    if matches!(elem, Storage::Skip(_)) || is_const_storage(element) {
        return;
    }
    let elem_type = format!("std::remove_all_extents_t<decltype({member})>");
    if is_char_array(field) {
        let array = format!("std::remove_reference_t<decltype({member})>");
        w.open(format!("if (j.contains({key})) {{"));
        w.line(format!("const nlohmann::json& hb_j = j.at({key});"));
        w.line(format!("auto* hb_p = reinterpret_cast<{elem_type}*>(&{member});"));
        w.line(format!("const std::size_t hb_count = sizeof({member}) / sizeof(*hb_p);"));
        w.line(format!("constexpr std::size_t hb_rank = std::rank_v<{array}>;"));
        w.line(format!("constexpr std::size_t hb_row = std::extent_v<{array}, hb_rank - 1>;"));
        w.open("auto hb_put = [&](std::size_t hb_at, const std::string& hb_s) {");
        w.line("const std::size_t hb_n = std::min(hb_s.size(), hb_row - 1);");
        w.line("std::memcpy(hb_p + hb_at, hb_s.data(), hb_n);");
        w.line("hb_p[hb_at + hb_n] = '\\0';");
        w.close("};");
        w.open("if (hb_rank == 1 && hb_j.is_string()) {");
        w.line("hb_put(0, hb_j.get_ref<const std::string&>());");
        w.close_open("} else if (hb_rank > 1 && hb_j.is_array()) {");
        w.line("std::memset(hb_p, 0, hb_count * sizeof(*hb_p));");
        w.open("for (std::size_t hb_i = 0; hb_i < hb_j.size() && (hb_i + 1) * hb_row <= hb_count; ++hb_i) {");
        w.open("if (hb_j[hb_i].is_string()) {");
        w.line("hb_put(hb_i * hb_row, hb_j[hb_i].get_ref<const std::string&>());");
        w.close("}");
        w.close("}");
        w.close("}");
        w.close("}");
        return;
    }
    w.open(format!("if (j.contains({key}) && j.at({key}).is_array()) {{"));
    w.line(format!("const nlohmann::json& hb_j = j.at({key});"));
    w.line(format!("auto* hb_p = reinterpret_cast<{elem_type}*>(&{member});"));
    w.line(format!("const std::size_t hb_count = sizeof({member}) / sizeof(*hb_p);"));
    w.line("const std::size_t hb_n = std::min(hb_j.size(), hb_count);");
    w.open("for (std::size_t hb_i = 0; hb_i < hb_n; ++hb_i) {");
    decode_stmt(w, &elem, "hb_p[hb_i]", "hb_j[hb_i]");
    w.close("}");
    w.open("for (std::size_t hb_i = hb_n; hb_i < hb_count; ++hb_i) {");
    w.line(format!("hb_p[hb_i] = {elem_type}{{}};"));
    w.close("}");
    w.close("}");
}

/// Static encode/decode pair for one struct. Nested codecs must already be emitted.
pub fn emit_codec(w: &mut CppWriter, s: &ClassifiedStruct, codecs: &BTreeSet<&str>) {
    let name = &s.name;
    w.open(format!("static nlohmann::json {}(const {name}& v) {{", naming::encoder(name)));
    w.line("nlohmann::json j = nlohmann::json::object();");
    for field in &s.fields {
        encode_field(w, field, codecs);
    }
    w.line("return j;");
    w.close("}");
    w.blank();

    w.open(format!(
        "static void {}(const nlohmann::json& j, {name}& v) {{",
        naming::decoder(name)
    ));
    if s.fields.is_empty() {
        w.line("(void)j;");
        w.line("(void)v;");
    }
    for field in &s.fields {
        decode_field(w, field, codecs);
    }
    w.close("}");
    w.blank();
}

fn handle_param(name: &str) -> EntryParam {
    EntryParam {
        name: name.to_string(),
        host_type: HostType::String,
    }
}

/// Exported constructor and JSON accessors for one struct.
pub fn emit_struct_entry_points(w: &mut CppWriter, s: &ClassifiedStruct, namespace: &str) -> Vec<EntryPoint> {
    let name = &s.name;
    let tag = naming::cxx_string(&naming::tag(name));
    let display = strip_namespace(name, namespace);

    let create = EntryPoint {
        symbol: naming::create(name),
        display_name: format!("create_{display}"),
        kind: EntryKind::Create,
        native: Some(name.clone()),
        params: vec![],
        returns: HostType::String,
        unsupported: vec![],
    };
    w.open(format!("HB_EXPORT {} {{", create.prototype()));
    w.line(format!("return hb::store_pointer({tag}, new {name}());"));
    w.close("}");
    w.blank();

    let to_json = EntryPoint {
        symbol: naming::to_json(name),
        display_name: format!("{display}_to_json"),
        kind: EntryKind::ToJson,
        native: Some(name.clone()),
        params: vec![handle_param("handle")],
        returns: HostType::String,
        unsupported: vec![],
    };
    w.open(format!("HB_EXPORT {} {{", to_json.prototype()));
    w.line(format!(
        "auto* hb_v = static_cast<{name}*>(hb::Registry::instance().retrieve(handle));"
    ));
    w.line("if (!hb_v) return \"\";");
    w.line(format!("return hb::ret_text({}(*hb_v).dump());", naming::encoder(name)));
    w.close("}");
    w.blank();

    let from_json = EntryPoint {
        symbol: naming::from_json(name),
        display_name: format!("{display}_from_json"),
        kind: EntryKind::FromJson,
        native: Some(name.clone()),
        params: vec![handle_param("handle"), handle_param("json")],
        returns: HostType::Number,
        unsupported: vec![],
    };
    w.open(format!("HB_EXPORT {} {{", from_json.prototype()));
    w.line(format!(
        "auto* hb_v = static_cast<{name}*>(hb::Registry::instance().retrieve(handle));"
    ));
    w.line("if (!hb_v || !json) return HB_NAN;");
    w.line("nlohmann::json hb_j = nlohmann::json::parse(json, nullptr, false);");
    w.line("if (hb_j.is_discarded() || !hb_j.is_object()) return HB_NAN;");
    w.open("try {");
    w.line(format!(
        "hb::decode_into(*hb_v, [&]({name}& hb_next) {{ {}(hb_j, hb_next); }});",
        naming::decoder(name)
    ));
    w.close_open("} catch (const nlohmann::json::exception&) {");
    w.line("return HB_NAN;");
    w.close("}");
    w.line("return 1.0;");
    w.close("}");
    w.blank();

    vec![create, to_json, from_json]
}
