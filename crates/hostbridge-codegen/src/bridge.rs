//! Exported wrappers around native functions.
//!
//! A wrapper takes host values (`double` or `const char*`), converts each
//! argument, calls the native function and converts the result back. Any
//! conversion failure returns the wrapper's sentinel before the native call:
//! NaN for numeric results and the empty string for textual ones.

use hostbridge_core::decl::strip_namespace;
use hostbridge_core::{ArraySize, ClassifiedFunction, ClassifiedParam, HostType, MarshalCategory};

use crate::emit::CppWriter;
use crate::naming;
use crate::summary::{EntryKind, EntryParam, EntryPoint};

/// How an argument crosses into native code.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Arg {
    Number,
    /// Numeric argument passed as decimal text.
    NumberText,
    Oversized { unsigned: bool },
    CString,
    /// Pointer or function pointer cast from the registry address.
    Address,
    /// Referenced object; `rvalue` moves out of it.
    Reference { target: String, rvalue: bool },
    /// By-value object copied out of the registry: structs, handle
    /// aliases, 64-bit handles and unresolved types.
    Value,
}

fn arg_kind(param: &ClassifiedParam) -> Arg {
    let class = &param.classification;
    match class.category {
        MarshalCategory::Numeric if param.force_string => Arg::NumberText,
        MarshalCategory::Numeric | MarshalCategory::Void => Arg::Number,
        MarshalCategory::OversizedNumeric => Arg::Oversized {
            unsigned: naming::is_unsigned(&class.canonical_type),
        },
        MarshalCategory::StringRef => {
            if let Some((target, rvalue)) = naming::strip_reference(&param.declared_type) {
                Arg::Reference {
                    target: target.to_string(),
                    rvalue,
                }
            } else if class.is_c_string {
                Arg::CString
            } else if class.has_pointer || class.is_function_pointer {
                Arg::Address
            } else {
                Arg::Value
            }
        }
    }
}

fn sentinel(ret: HostType) -> &'static str {
    match ret {
        HostType::Number => "HB_NAN",
        HostType::String => "\"\"",
    }
}

/// Emit argument conversion; returns the expression passed to the native call.
fn convert_arg(w: &mut CppWriter, param: &ClassifiedParam, fail: &str) -> String {
    let name = &param.name;
    let local = format!("hb_{name}");
    let declared = &param.declared_type;
    let retrieve = format!("hb::Registry::instance().retrieve({name})");
    match arg_kind(param) {
        Arg::Number if param.classification.canonical_type == "double" => name.clone(),
        Arg::Number => format!("static_cast<{declared}>({name})"),
        Arg::NumberText => {
            w.line(format!("double {local} = 0;"));
            w.line(format!("if (!hb::parse_f64({name}, {local})) return {fail};"));
            format!("static_cast<{declared}>({local})")
        }
        Arg::Oversized { unsigned } => {
            let (ty, parse) = if unsigned {
                ("std::uint64_t", "hb::parse_u64")
            } else {
                ("std::int64_t", "hb::parse_i64")
            };
            w.line(format!("{ty} {local} = 0;"));
            w.line(format!("if (!{parse}({name}, {local})) return {fail};"));
            format!("static_cast<{declared}>({local})")
        }
        Arg::CString => name.clone(),
        Arg::Address => {
            w.line(format!("void* {local} = {retrieve};"));
            w.line(format!("if (!{local}) return {fail};"));
            format!("({declared}){local}")
        }
        Arg::Reference { target, rvalue } => {
            w.line(format!("auto* {local} = static_cast<{target}*>({retrieve});"));
            w.line(format!("if (!{local}) return {fail};"));
            if rvalue {
                format!("std::move(*{local})")
            } else {
                format!("*{local}")
            }
        }
        Arg::Value => {
            w.line(format!("auto* {local} = static_cast<{declared}*>({retrieve});"));
            w.line(format!("if (!{local}) return {fail};"));
            format!("*{local}")
        }
    }
}

fn emit_return(w: &mut CppWriter, f: &ClassifiedFunction, call: &str) {
    let ret = &f.ret;
    let tag = naming::cxx_string(&naming::tag(&ret.canonical_type));
    match ret.category {
        MarshalCategory::Void => {
            w.line(format!("{call};"));
            w.line("return \"ok\";");
        }
        MarshalCategory::Numeric => {
            w.line(format!("return static_cast<double>({call});"));
        }
        MarshalCategory::OversizedNumeric => {
            w.line(format!("return hb::ret_text(std::to_string({call}));"));
        }
        MarshalCategory::StringRef if naming::strip_reference(&f.return_type).is_some() => {
            w.line(format!("auto&& hb_result = {call};"));
            w.line(format!("return hb::store_pointer({tag}, &hb_result);"));
        }
        MarshalCategory::StringRef if ret.is_c_string => {
            w.line(format!("const char* hb_result = {call};"));
            w.line("return hb_result ? hb_result : \"\";");
        }
        MarshalCategory::StringRef if ret.has_pointer || ret.is_function_pointer => {
            w.line(format!("return hb::store_pointer({tag}, {call});"));
        }
        MarshalCategory::StringRef => {
            w.line(format!("return hb::store_pointer({tag}, new auto({call}));"));
        }
    }
}

fn signature(f: &ClassifiedFunction) -> String {
    let params = f
        .params
        .iter()
        .map(|p| format!("{} {}", p.declared_type, p.name))
        .collect::<Vec<_>>()
        .join(", ");
    let dots = match (f.is_variadic, f.params.is_empty()) {
        (true, true) => "...",
        (true, false) => ", ...",
        (false, _) => "",
    };
    format!("{}({params}{dots}) -> {}", f.name, f.return_type)
}

/// Emit the wrapper for one native function.
pub fn emit_wrapper(w: &mut CppWriter, f: &ClassifiedFunction, namespace: &str) -> EntryPoint {
    let returns = f.ret.host_type();
    let fail = sentinel(returns);
    let unsupported: Vec<String> = f.unresolved_params().into_iter().map(str::to_string).collect();
    let entry = EntryPoint {
        symbol: naming::wrapper(&f.name),
        display_name: strip_namespace(&f.name, namespace),
        kind: EntryKind::Function,
        native: Some(f.name.clone()),
        params: f
            .params
            .iter()
            .map(|p| EntryParam {
                name: p.name.clone(),
                host_type: p.host_type(),
            })
            .collect(),
        returns,
        unsupported,
    };

    w.line(format!("// {}", signature(f)));
    w.open(format!("HB_EXPORT {} {{", entry.prototype()));
    for ty in &entry.unsupported {
        w.line(format!("HB_UNSUPPORTED({});", naming::cxx_string(ty)));
    }
    let args: Vec<String> = f.params.iter().map(|p| convert_arg(w, p, fail)).collect();
    if f.is_variadic {
        w.line("// variadic arguments are not forwarded");
    }
    let call = format!("{}({})", f.name, args.join(", "));
    emit_return(w, f, &call);
    w.close("}");
    w.blank();
    entry
}

/// Trailing writable `char` array that the native function fills in.
fn output_buffer(f: &ClassifiedFunction) -> Option<&ArraySize> {
    let last = f.params.last()?;
    let size = last.array_size.as_ref()?;
    let class = &last.classification;
    (class.canonical_type == "char" && class.pointer_depth == 1 && !class.has_const).then_some(size)
}

/// Emit the buffer variant of `f`, if its last parameter is an output `char`
/// array: the host omits that argument and receives the filled text instead.
pub fn emit_buffer_wrapper(w: &mut CppWriter, f: &ClassifiedFunction, namespace: &str) -> Option<EntryPoint> {
    let size = output_buffer(f)?;
    let fixed = &f.params[..f.params.len() - 1];
    let entry = EntryPoint {
        symbol: naming::buffer_wrapper(&f.name),
        display_name: format!("{}_text", strip_namespace(&f.name, namespace)),
        kind: EntryKind::Function,
        native: Some(f.name.clone()),
        params: fixed
            .iter()
            .map(|p| EntryParam {
                name: p.name.clone(),
                host_type: p.host_type(),
            })
            .collect(),
        returns: HostType::String,
        unsupported: fixed
            .iter()
            .filter(|p| p.classification.unresolved)
            .map(|p| p.declared_type.clone())
            .collect(),
    };

    w.line(format!("// {} with a bridge-owned buffer", signature(f)));
    w.open(format!("HB_EXPORT {} {{", entry.prototype()));
    for ty in &entry.unsupported {
        w.line(format!("HB_UNSUPPORTED({});", naming::cxx_string(ty)));
    }
    let mut args: Vec<String> = fixed.iter().map(|p| convert_arg(w, p, "\"\"")).collect();
    w.line(format!("char hb_buf[{size}] = {{}};"));
    args.push("hb_buf".to_string());
    w.line(format!("{}({});", f.name, args.join(", ")));
    w.line("return hb::ret_text(std::string(hb_buf, strnlen(hb_buf, sizeof(hb_buf))));");
    w.close("}");
    w.blank();
    Some(entry)
}
