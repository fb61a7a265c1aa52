use serde::Deserialize;
use std::{collections::BTreeMap, env, fs, path::PathBuf};

/// Flags of one architecture. Values are numeric literals kept as strings so hex can be used.
#[derive(Deserialize)]
struct ArchFlags {
    #[serde(flatten)]
    values: BTreeMap<String, String>,
}

fn parse_number(value: &str) -> Result<u64, std::num::ParseIntError> {
    let clean = value.trim().replace('_', "");
    match clean.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => clean.parse(),
    }
}

fn main() {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let target_arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap();
    let flags_path = PathBuf::from(manifest_dir).join("../../flags.json");
    let flags_str = fs::read_to_string(&flags_path).unwrap();
    let mut flagmap: BTreeMap<String, ArchFlags> = serde_json::from_str(&flags_str).unwrap();
    let mut flags = match flagmap.remove("default") {
        Some(value) => value.values,
        None => panic!("flags.json has no \"default\" section."),
    };
    if let Some(arch) = flagmap.remove(target_arch.as_str()) {
        flags.extend(arch.values);
    }
    make_flags(&target_arch, &flags);
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../../flags.json");
}

fn make_flags(arch: &str, flags: &BTreeMap<String, String>) {
    let mut s = String::new();
    s += "/// Target architecture the flags were selected for.\n";
    s += &format!("pub const ARCH: &str = {:?};\n", arch);
    for (key, value) in flags {
        let value = parse_number(value)
            .unwrap_or_else(|err| panic!("Invalid value of flag {}: {:?}", key, err));
        s += &format!("/// Build flag `{}`.\n", key);
        s += &format!("pub const {}: usize = {:#x};\n", key, value);
    }
    let out_dir = env::var("OUT_DIR").unwrap();
    let path = PathBuf::from(out_dir).join("build_flags.rs");
    fs::write(path, s).unwrap();
}
