//! Detection report model and selection logic.
//!
//! ## Contents
//! - symbol tables for architecture/OS/compiler indicator macros
//! - `Defines` — the set of macros the toolchain defined, with values
//! - `Report` — selection (`from_defines`) and fixed-format rendering
//! - probe source generation and probe output parsing for the build script
//!
//! ## Conventions
//! - Everything here is pure and self-contained (std only): the file is
//!   shared with `build.rs` through a `#[path]` module include.
//! - Selection is first-match-wins against the fixed priority order below;
//!   ARCH and OS fall back to `unknown`, never to an absent line.

use std::collections::BTreeMap;

/// Architecture rules in priority order. The first entry whose symbol list
/// has a defined member wins.
pub const ARCH_RULES: &[(&str, &[&str])] = &[
    ("amd64", &["__x86_64__", "_M_X64"]),
    ("x86", &["__i386__", "_M_IX86"]),
    ("ia64", &["__ia64__", "_M_IA64"]),
    ("arm", &["__arm__", "_M_ARM"]),
    ("arm64", &["__aarch64__", "_M_ARM64"]),
    (
        "powerpc",
        &["__ppc__", "__PPC__", "__ppc64__", "__PPC64__", "_M_PPC"],
    ),
    ("mips", &["__mips__"]),
];

/// OS rules in priority order.
pub const OS_RULES: &[(&str, &[&str])] = &[
    ("windows", &["_WIN32"]),
    ("linux", &["__linux__"]),
    ("macos", &["__APPLE__"]),
    ("android", &["__ANDROID__"]),
];

/// Every macro the probe echoes, in a fixed order. Probe lines carry the
/// index into this table, so the order is part of the probe wire format.
pub const PROBE_SYMBOLS: &[&str] = &[
    "__x86_64__",
    "_M_X64",
    "__i386__",
    "_M_IX86",
    "__ia64__",
    "_M_IA64",
    "__arm__",
    "_M_ARM",
    "__aarch64__",
    "_M_ARM64",
    "__ppc__",
    "__PPC__",
    "__ppc64__",
    "__PPC64__",
    "_M_PPC",
    "__mips__",
    "_WIN32",
    "__linux__",
    "__APPLE__",
    "__ANDROID__",
    "__PIC__",
    "__PIE__",
    "__GNUC__",
    "__GNUC_MINOR__",
    "__GNUC_PATCHLEVEL__",
    "__clang__",
    "__clang_major__",
    "__clang_minor__",
    "__clang_patchlevel__",
    "_MSC_VER",
];

/// Macros the toolchain defined, with their expanded values.
#[derive(Debug, Default)]
pub struct Defines {
    map: BTreeMap<String, String>,
}

impl Defines {
    pub fn insert(&mut self, name: &str, value: &str) {
        self.map.insert(name.to_string(), value.trim().to_string());
    }

    pub fn defined(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }
}

/// One resolved detection report. Built once per compilation; never changes
/// afterwards.
#[derive(Debug, PartialEq, Eq)]
pub struct Report {
    pub arch: &'static str,
    pub os: &'static str,
    pub pic: Option<String>,
    pub pie: Option<String>,
    pub gcc: Option<String>,
    pub clang: Option<String>,
    pub msvc: Option<String>,
}

impl Report {
    /// Apply the selection rules to a set of defined macros.
    ///
    /// Compiler families are independent: every family whose identification
    /// macro is defined gets a line. clang defines `__GNUC__` too, so clang
    /// builds carry both a GCC and a CLANG line; that quirk is part of the
    /// fixture contract.
    pub fn from_defines(defines: &Defines) -> Self {
        Report {
            arch: first_match(ARCH_RULES, defines),
            os: first_match(OS_RULES, defines),
            pic: defines.value("__PIC__").map(str::to_string),
            pie: defines.value("__PIE__").map(str::to_string),
            gcc: family_version(
                defines,
                "__GNUC__",
                ["__GNUC__", "__GNUC_MINOR__", "__GNUC_PATCHLEVEL__"],
            ),
            clang: family_version(
                defines,
                "__clang__",
                ["__clang_major__", "__clang_minor__", "__clang_patchlevel__"],
            ),
            msvc: defines.value("_MSC_VER").map(str::to_string),
        }
    }

    /// Serialize into the fixed text block, trailing newline included.
    ///
    /// Line order is fixed: ARCH, OS, then PIC, PIE, GCC, CLANG, MSVC for
    /// whichever are present, between the `DETECT_BEG`/`DETECT_END`
    /// sentinel lines.
    pub fn render(&self) -> String {
        let mut out = String::from("DETECT_BEG\n");
        out.push_str(&format!("ARCH:{}\n", self.arch));
        out.push_str(&format!("OS:{}\n", self.os));
        let optional = [
            ("PIC", &self.pic),
            ("PIE", &self.pie),
            ("GCC", &self.gcc),
            ("CLANG", &self.clang),
            ("MSVC", &self.msvc),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                out.push_str(&format!("{key}:{value}\n"));
            }
        }
        out.push_str("DETECT_END\n");
        out
    }
}

fn first_match(rules: &[(&'static str, &[&str])], defines: &Defines) -> &'static str {
    rules
        .iter()
        .find(|(_, symbols)| symbols.iter().any(|s| defines.defined(s)))
        .map(|(name, _)| *name)
        .unwrap_or("unknown")
}

/// Version string for one compiler family, gated on its identification
/// macro. Missing components render as `0`; values are otherwise passed
/// through verbatim, with no normalization.
fn family_version(defines: &Defines, gate: &str, parts: [&str; 3]) -> Option<String> {
    if !defines.defined(gate) {
        return None;
    }
    let part = |name| defines.value(name).unwrap_or("0");
    Some(format!(
        "{}.{}.{}",
        part(parts[0]),
        part(parts[1]),
        part(parts[2])
    ))
}

/// C translation unit that echoes every recognized macro.
///
/// Each stanza preprocesses to `D<i>=<expanded value>` when the macro is
/// defined and to nothing otherwise, so the output is parseable from both
/// gnu-like (`-E -P`) and msvc-like (`/EP`) drivers.
pub fn probe_source() -> String {
    let mut src = String::new();
    for (i, sym) in PROBE_SYMBOLS.iter().enumerate() {
        src.push_str(&format!("#if defined({sym})\nD{i}={sym}\n#endif\n"));
    }
    src
}

/// Recover the defined-macro map from preprocessed probe text. Blank lines
/// and stray whitespace from the preprocessor are tolerated; anything that
/// does not look like a probe line is skipped.
pub fn parse_probe_output(output: &str) -> Defines {
    let mut defines = Defines::default();
    for line in output.lines() {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('D') else {
            continue;
        };
        let Some((index, value)) = rest.split_once('=') else {
            continue;
        };
        let Ok(index) = index.trim().parse::<usize>() else {
            continue;
        };
        if let Some(sym) = PROBE_SYMBOLS.get(index) {
            defines.insert(sym, value);
        }
    }
    defines
}

/// Fallback when no C toolchain is usable: synthesize the indicator macros
/// from cargo's target strings. PIC/PIE and compiler versions are only
/// known to a real toolchain, so this path never produces them.
pub fn defines_for_target(arch: &str, os: &str) -> Defines {
    let mut defines = Defines::default();
    let arch_symbol = match arch {
        "x86_64" => Some("__x86_64__"),
        "x86" => Some("__i386__"),
        "arm" => Some("__arm__"),
        "aarch64" => Some("__aarch64__"),
        "powerpc" => Some("__ppc__"),
        "powerpc64" => Some("__ppc64__"),
        "mips" | "mips64" => Some("__mips__"),
        _ => None,
    };
    let os_symbol = match os {
        "windows" => Some("_WIN32"),
        "linux" => Some("__linux__"),
        "macos" | "ios" => Some("__APPLE__"),
        "android" => Some("__ANDROID__"),
        _ => None,
    };
    if let Some(sym) = arch_symbol {
        defines.insert(sym, "1");
    }
    if let Some(sym) = os_symbol {
        defines.insert(sym, "1");
    }
    defines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs(pairs: &[(&str, &str)]) -> Defines {
        let mut d = Defines::default();
        for (name, value) in pairs {
            d.insert(name, value);
        }
        d
    }

    #[test]
    fn gcc_on_amd64_linux() {
        let d = defs(&[
            ("__x86_64__", "1"),
            ("__linux__", "1"),
            ("__GNUC__", "11"),
            ("__GNUC_MINOR__", "2"),
            ("__GNUC_PATCHLEVEL__", "0"),
        ]);
        assert_eq!(
            Report::from_defines(&d).render(),
            "DETECT_BEG\nARCH:amd64\nOS:linux\nGCC:11.2.0\nDETECT_END\n"
        );
    }

    #[test]
    fn pie_on_arm64_with_unknown_os() {
        let d = defs(&[("__aarch64__", "1"), ("__PIE__", "2")]);
        assert_eq!(
            Report::from_defines(&d).render(),
            "DETECT_BEG\nARCH:arm64\nOS:unknown\nPIE:2\nDETECT_END\n"
        );
    }

    #[test]
    fn empty_defines_fall_back_to_unknown() {
        let report = Report::from_defines(&Defines::default());
        assert_eq!(report.arch, "unknown");
        assert_eq!(report.os, "unknown");
        assert_eq!(
            report.render(),
            "DETECT_BEG\nARCH:unknown\nOS:unknown\nDETECT_END\n"
        );
    }

    #[test]
    fn arch_selection_is_first_match() {
        // Both defined: amd64 outranks mips.
        let d = defs(&[("__mips__", "1"), ("__x86_64__", "1")]);
        assert_eq!(Report::from_defines(&d).arch, "amd64");
    }

    #[test]
    fn msvc_symbol_spellings_are_recognized() {
        let d = defs(&[("_M_X64", "100"), ("_WIN32", "1"), ("_MSC_VER", "1929")]);
        assert_eq!(
            Report::from_defines(&d).render(),
            "DETECT_BEG\nARCH:amd64\nOS:windows\nMSVC:1929\nDETECT_END\n"
        );
    }

    #[test]
    fn clang_emits_gcc_line_first() {
        let d = defs(&[
            ("__x86_64__", "1"),
            ("__APPLE__", "1"),
            ("__GNUC__", "4"),
            ("__GNUC_MINOR__", "2"),
            ("__GNUC_PATCHLEVEL__", "1"),
            ("__clang__", "1"),
            ("__clang_major__", "17"),
            ("__clang_minor__", "0"),
            ("__clang_patchlevel__", "6"),
        ]);
        let rendered = Report::from_defines(&d).render();
        assert_eq!(
            rendered,
            "DETECT_BEG\nARCH:amd64\nOS:macos\nGCC:4.2.1\nCLANG:17.0.6\nDETECT_END\n"
        );
    }

    #[test]
    fn pic_and_pie_are_independent() {
        let only_pic = defs(&[("__PIC__", "2")]);
        let rendered = Report::from_defines(&only_pic).render();
        assert!(rendered.contains("PIC:2\n"));
        assert!(!rendered.contains("PIE:"));

        let both = defs(&[("__PIC__", "2"), ("__PIE__", "2")]);
        let rendered = Report::from_defines(&both).render();
        assert!(rendered.contains("PIC:2\nPIE:2\n"));
    }

    #[test]
    fn missing_version_components_render_as_zero() {
        let d = defs(&[("__GNUC__", "11")]);
        assert_eq!(Report::from_defines(&d).gcc.as_deref(), Some("11.0.0"));
    }

    #[test]
    fn probe_source_guards_every_symbol() {
        let src = probe_source();
        for sym in PROBE_SYMBOLS {
            assert!(src.contains(&format!("#if defined({sym})")), "missing {sym}");
        }
    }

    #[test]
    fn probe_output_parsing_survives_preprocessor_noise() {
        // Index 22 is __GNUC__, 16 is _WIN32; msvc /EP leaves blank lines
        // where directives were.
        let output = "\n\nD16=1\n\n  D22 = 13 \n\nnot a probe line\nD9999=1\n";
        let d = parse_probe_output(output);
        assert!(d.defined("_WIN32"));
        assert_eq!(d.value("__GNUC__"), Some("13"));
        assert!(!d.defined("__linux__"));
    }

    #[test]
    fn target_fallback_maps_cargo_strings() {
        let d = defines_for_target("x86_64", "linux");
        let report = Report::from_defines(&d);
        assert_eq!((report.arch, report.os), ("amd64", "linux"));
        assert!(report.gcc.is_none() && report.pic.is_none());

        let d = defines_for_target("riscv64", "freebsd");
        let report = Report::from_defines(&d);
        assert_eq!((report.arch, report.os), ("unknown", "unknown"));
    }
}
